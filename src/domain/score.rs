//! Score tallies derived from answers and a key.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tally for one subject (or for the whole sheet).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectScore {
    /// Questions answered correctly.
    pub correct: u32,
    /// Questions where some mark was made (single or ambiguous).
    pub attempted: u32,
    /// Keyed questions counted toward this tally.
    pub total: u32,
}

impl SubjectScore {
    /// Fraction of keyed questions answered correctly, or None when the
    /// tally covers no questions.
    pub fn accuracy(&self) -> Option<f32> {
        if self.total == 0 {
            None
        } else {
            Some(self.correct as f32 / self.total as f32)
        }
    }
}

/// Per-subject and overall correctness tallies for one sheet.
///
/// Derived deterministically from the answer set and the key; immutable once
/// computed. Per-subject correct counts always sum to the overall count.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    /// Tally per subject tag, in subject order.
    pub subjects: BTreeMap<String, SubjectScore>,
    /// Tally over all keyed questions.
    pub total: SubjectScore,
}

impl ScoreResult {
    /// The tally for one subject, if any of its questions were keyed.
    pub fn subject(&self, name: &str) -> Option<&SubjectScore> {
        self.subjects.get(name)
    }

    /// Sum of per-subject correct counts; equals `total.correct` by
    /// construction.
    pub fn subject_correct_sum(&self) -> u32 {
        self.subjects.values().map(|s| s.correct).sum()
    }
}

impl std::fmt::Display for ScoreResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (subject, score) in &self.subjects {
            writeln!(
                f,
                "{}: {}/{} correct ({} attempted)",
                subject, score.correct, score.total, score.attempted
            )?;
        }
        write!(
            f,
            "total: {}/{} correct ({} attempted)",
            self.total.correct, self.total.total, self.total.attempted
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accuracy_handles_empty_tally() {
        assert!(SubjectScore::default().accuracy().is_none());
        let score = SubjectScore {
            correct: 3,
            attempted: 4,
            total: 4,
        };
        assert!((score.accuracy().unwrap() - 0.75).abs() < 1e-6);
    }

    #[test]
    fn display_lists_subjects_then_total() {
        let mut result = ScoreResult::default();
        result.subjects.insert(
            "Python".to_string(),
            SubjectScore {
                correct: 2,
                attempted: 3,
                total: 5,
            },
        );
        result.total = SubjectScore {
            correct: 2,
            attempted: 3,
            total: 5,
        };
        let text = result.to_string();
        assert!(text.contains("Python: 2/5"));
        assert!(text.ends_with("total: 2/5 correct (3 attempted)"));
    }
}
