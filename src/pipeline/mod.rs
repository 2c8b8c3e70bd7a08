//! The sheet evaluation pipeline.
//!
//! Each image runs through the same stages: orientation normalization,
//! perspective rectification, ROI resolution, mark detection, and (when a key
//! is supplied) scoring. A run is a pure computation over that image's
//! buffers — no state is shared mutably between images, which makes batch
//! evaluation embarrassingly parallel. The batch runner tags every result
//! with its input index and sorts afterwards, so output order always matches
//! input order.
//!
//! Per-image failures (a file that will not decode, a corrupt buffer) become
//! failure records; the batch always yields exactly one record per accepted
//! input. Only configuration-level problems, detected before the first image
//! is touched, abort a run.

pub mod detect;
pub mod orientation;
pub mod rectify;
pub mod result;
pub mod roi;
pub mod scoring;

pub use detect::MarkDetector;
pub use orientation::{Rotation, detect_orientation, normalize_orientation};
pub use rectify::{CANONICAL_HEIGHT, CANONICAL_WIDTH, RectifyOutcome, rectify_perspective};
pub use result::{BatchResult, EvaluationRecord};
pub use roi::{ResolvedQuestion, RoiSource};
pub use scoring::score_answers;

use image::RgbImage;
use rayon::prelude::*;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::core::config::EvaluationConfig;
use crate::core::errors::{OmrError, OmrResult, ProcessingStage};
use crate::domain::key::{AnswerKey, KeyMismatch};
use crate::pipeline::result::student_code_from;
use crate::utils::image::{load_image, rgb_to_gray};
use crate::utils::visualization::{OverlayConfig, render_overlay};

/// A configured evaluation run: the tunables, the ROI strategy, and the
/// optional answer key, shared read-only across all per-image workers.
#[derive(Debug, Clone)]
pub struct OmrPipeline {
    config: Arc<EvaluationConfig>,
    roi: Arc<RoiSource>,
    key: Option<Arc<AnswerKey>>,
    run_key_mismatches: Arc<Vec<KeyMismatch>>,
}

impl OmrPipeline {
    /// Creates a pipeline for one run.
    ///
    /// Validates the configuration and the ROI source up front; a failure
    /// here is fatal before any image is processed. Key/question
    /// inconsistencies are NOT fatal: they are logged, retained, and attached
    /// to every record so the affected questions can be excluded from
    /// scoring.
    ///
    /// # Errors
    ///
    /// Returns `OmrError::ConfigError` when the configuration or layout is
    /// structurally invalid.
    pub fn new(
        config: EvaluationConfig,
        roi: RoiSource,
        key: Option<AnswerKey>,
    ) -> OmrResult<Self> {
        config.validate()?;
        match &roi {
            RoiSource::TemplateGuided { template, .. } => template.validate()?,
            RoiSource::GridEstimated(layout) => layout.validate()?,
        }

        let run_key_mismatches = match &key {
            Some(key) => {
                let mismatches = key.mismatches(roi.question_option_counts());
                for mismatch in &mismatches {
                    warn!("answer key inconsistency: {}", mismatch);
                }
                mismatches
            }
            None => Vec::new(),
        };

        Ok(Self {
            config: Arc::new(config),
            roi: Arc::new(roi),
            key: key.map(Arc::new),
            run_key_mismatches: Arc::new(run_key_mismatches),
        })
    }

    /// The run configuration.
    pub fn config(&self) -> &EvaluationConfig {
        &self.config
    }

    /// Key inconsistencies detected against the declared layout before any
    /// image was processed.
    pub fn run_key_mismatches(&self) -> &[KeyMismatch] {
        &self.run_key_mismatches
    }

    /// Evaluates one decoded sheet image.
    ///
    /// Runs the full stage sequence and never panics or errors: every
    /// stage is either infallible or falls back to a best-effort result, so
    /// the record always carries answers. `index` is the image's position in
    /// the batch; `source` its identifier (normally the file path).
    pub fn evaluate_image(&self, image: &RgbImage, index: usize, source: &str) -> EvaluationRecord {
        let (oriented, rotation) = normalize_orientation(image);
        if rotation != Rotation::R0 {
            debug!("{}: corrected orientation by {}", source, rotation);
        }

        let (rectified, rectify_outcome) = rectify_perspective(&oriented);
        let (width, height) = rectified.dimensions();

        let questions = self.roi.resolve(width, height);
        let gray = rgb_to_gray(&rectified);
        let answers = MarkDetector::from_config(&self.config).detect(&gray, &questions);

        let (score, key_mismatches) = match &self.key {
            Some(key) => {
                let (score, mismatches) = score_answers(&answers, key);
                (Some(score), mismatches)
            }
            None => (None, Vec::new()),
        };

        EvaluationRecord {
            source: source.to_string(),
            student_code: student_code_from(source),
            index,
            sheet_version: self.config.sheet_version.clone(),
            rotation: Some(rotation),
            rectified: Some(rectify_outcome),
            answers: Some(answers),
            score,
            key_mismatches,
            error: None,
        }
    }

    /// Evaluates a batch of image files.
    ///
    /// Decode failures become per-image failure records; the batch continues.
    /// Inputs beyond the configured cap are dropped with a warning and
    /// counted in the result. Output order matches input order.
    pub fn evaluate_paths<P: AsRef<Path> + Sync>(&self, paths: &[P]) -> BatchResult {
        let accepted = paths.len().min(self.config.max_images);
        let truncated = paths.len() - accepted;
        if truncated > 0 {
            warn!(
                "batch of {} images exceeds the cap of {}; evaluating the first {} only",
                paths.len(),
                self.config.max_images,
                accepted
            );
        }
        let accepted_paths = &paths[..accepted];

        let evaluate_one = |(index, path): (usize, &P)| -> EvaluationRecord {
            let path = path.as_ref();
            let source = path.display().to_string();
            match load_image(path) {
                Ok(image) => self.evaluate_image(&image, index, &source),
                Err(error) => {
                    warn!("{}: {}", source, error);
                    EvaluationRecord::failure(
                        source,
                        index,
                        self.config.sheet_version.clone(),
                        error.to_string(),
                    )
                }
            }
        };

        let mut records: Vec<EvaluationRecord> =
            if accepted_paths.len() > self.config.parallel.image_threshold {
                match self.worker_pool() {
                    Some(pool) => pool.install(|| {
                        accepted_paths
                            .par_iter()
                            .enumerate()
                            .map(evaluate_one)
                            .collect()
                    }),
                    None => accepted_paths
                        .par_iter()
                        .enumerate()
                        .map(evaluate_one)
                        .collect(),
                }
            } else {
                accepted_paths.iter().enumerate().map(evaluate_one).collect()
            };
        records.sort_by_key(|record| record.index);

        let overlay = self.render_batch_overlay(accepted_paths);

        info!(
            "batch complete: {} record(s), {} failure(s)",
            records.len(),
            records.iter().filter(|r| r.is_failure()).count()
        );

        BatchResult {
            records,
            overlay,
            truncated,
        }
    }

    /// Renders the diagnostic overlay for one sheet image.
    ///
    /// Runs the preparation stages (orientation, rectification, ROI
    /// resolution, detection) on the image and draws every option region on
    /// the rectified copy, with the detected selections distinguished.
    /// Diagnostic only; the input image is not modified.
    ///
    /// # Errors
    ///
    /// Returns a processing error when the resolved layout has no questions.
    pub fn render_overlay(&self, image: &RgbImage, config: &OverlayConfig) -> OmrResult<RgbImage> {
        let (oriented, _) = normalize_orientation(image);
        let (rectified, _) = rectify_perspective(&oriented);
        let (width, height) = rectified.dimensions();

        let questions = self.roi.resolve(width, height);
        if questions.is_empty() {
            return Err(OmrError::processing_error(
                ProcessingStage::Overlay,
                "no questions resolved for overlay",
                OmrError::invalid_input("empty layout"),
            ));
        }
        let gray = rgb_to_gray(&rectified);
        let answers = MarkDetector::from_config(&self.config).detect(&gray, &questions);
        Ok(render_overlay(&rectified, &questions, &answers, config))
    }

    /// Builds the dedicated worker pool when the policy caps thread count.
    fn worker_pool(&self) -> Option<rayon::ThreadPool> {
        let threads = self.config.parallel.max_threads?;
        match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
            Ok(pool) => Some(pool),
            Err(error) => {
                warn!("failed to build worker pool ({}); using the global pool", error);
                None
            }
        }
    }

    /// Renders the overlay for the designated batch image, if any.
    fn render_batch_overlay<P: AsRef<Path> + Sync>(&self, paths: &[P]) -> Option<RgbImage> {
        let index = self.config.overlay_index?;
        let path = paths.get(index)?.as_ref();
        let image = match load_image(path) {
            Ok(image) => image,
            Err(error) => {
                warn!("overlay skipped, {}: {}", path.display(), error);
                return None;
            }
        };
        match self.render_overlay(&image, &OverlayConfig::with_system_font()) {
            Ok(overlay) => Some(overlay),
            Err(error) => {
                warn!("overlay skipped, {}: {}", path.display(), error);
                None
            }
        }
    }
}
