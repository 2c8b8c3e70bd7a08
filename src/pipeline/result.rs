//! Result types for the evaluation pipeline.

use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::domain::answer::AnswerSet;
use crate::domain::key::KeyMismatch;
use crate::domain::score::ScoreResult;
use crate::pipeline::orientation::Rotation;
use crate::pipeline::rectify::RectifyOutcome;

/// The outcome of evaluating one sheet image.
///
/// Created at the start of an image's processing, appended to the batch
/// output, never mutated afterward. A failed image still gets a record: the
/// `error` field carries the reason and the detection fields stay empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    /// Source identifier, normally the input file path.
    pub source: String,
    /// Student code derived from the file stem of the source.
    pub student_code: String,
    /// Position of the image in the batch input order.
    pub index: usize,
    /// Sheet version label from the run configuration.
    pub sheet_version: Option<String>,
    /// Orientation correction that was applied, when the pipeline got that
    /// far.
    pub rotation: Option<Rotation>,
    /// Whether perspective rectification was applied or skipped.
    pub rectified: Option<RectifyOutcome>,
    /// Detected answers, one per resolved question.
    pub answers: Option<AnswerSet>,
    /// Score tallies; None when no key was supplied or the image failed.
    pub score: Option<ScoreResult>,
    /// Key inconsistencies reported for this image (structured, non-fatal).
    pub key_mismatches: Vec<KeyMismatch>,
    /// Failure reason when the pipeline could not complete for this image.
    pub error: Option<String>,
}

impl EvaluationRecord {
    /// Creates a failure record for an image the pipeline could not process.
    pub fn failure(
        source: impl Into<String>,
        index: usize,
        sheet_version: Option<String>,
        error: impl Into<String>,
    ) -> Self {
        let source = source.into();
        let student_code = student_code_from(&source);
        Self {
            source,
            student_code,
            index,
            sheet_version,
            rotation: None,
            rectified: None,
            answers: None,
            score: None,
            key_mismatches: Vec::new(),
            error: Some(error.into()),
        }
    }

    /// Returns true if the pipeline could not complete for this image.
    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

/// Derives the student code from a source identifier: the file stem, or the
/// identifier itself when it has none.
pub fn student_code_from(source: &str) -> String {
    Path::new(source)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(source)
        .to_string()
}

/// The outcome of one batch run: exactly one record per accepted input
/// image, in input order.
#[derive(Debug)]
pub struct BatchResult {
    /// Per-image records, sorted by input index.
    pub records: Vec<EvaluationRecord>,
    /// Diagnostic overlay for the designated image, when one was requested
    /// and could be rendered.
    pub overlay: Option<RgbImage>,
    /// Number of inputs dropped because the batch cap was exceeded.
    pub truncated: usize,
}

impl BatchResult {
    /// Number of records in the batch.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the batch produced no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterates over the records that completed successfully.
    pub fn successes(&self) -> impl Iterator<Item = &EvaluationRecord> {
        self.records.iter().filter(|r| !r.is_failure())
    }

    /// Iterates over the failure records.
    pub fn failures(&self) -> impl Iterator<Item = &EvaluationRecord> {
        self.records.iter().filter(|r| r.is_failure())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn student_code_is_the_file_stem() {
        assert_eq!(student_code_from("scans/sheet_042.jpg"), "sheet_042");
        assert_eq!(student_code_from("sheet_042"), "sheet_042");
        assert_eq!(student_code_from(""), "");
    }

    #[test]
    fn failure_records_carry_the_reason() {
        let record = EvaluationRecord::failure("bad.png", 3, Some("Set A".into()), "image load");
        assert!(record.is_failure());
        assert_eq!(record.index, 3);
        assert_eq!(record.student_code, "bad");
        assert!(record.answers.is_none());
        assert!(record.score.is_none());
    }
}
