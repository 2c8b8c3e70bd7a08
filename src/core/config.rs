//! Run-wide evaluation configuration.
//!
//! All tunables for a batch run live in [`EvaluationConfig`]: the mark
//! detector's fill threshold and minimum margin, the template alignment
//! adjustment, the batch cap, and the parallelism policy. The config is
//! validated once, then shared immutably by reference across all per-image
//! workers — no ambient mutable state.

use serde::{Deserialize, Serialize};

use crate::core::errors::{OmrError, OmrResult};
use crate::core::parallel::ParallelPolicy;
use crate::domain::template::AlignmentAdjustment;

/// Default fill threshold: minimum fraction of dark pixels for an option to
/// count as marked.
pub const DEFAULT_FILL_THRESHOLD: f32 = 0.45;

/// Default minimum margin between the top two fill fractions required to
/// accept the top option as the sole answer.
pub const DEFAULT_MIN_MARGIN: f32 = 0.12;

/// Default cap on the number of images evaluated in one batch.
pub const DEFAULT_MAX_IMAGES: usize = 500;

/// Immutable configuration for one evaluation run.
///
/// Supplied once per batch, never per image. Workers share it by reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Minimum fraction of dark pixels within an option region to consider it
    /// marked. Domain (0, 1).
    #[serde(default = "EvaluationConfig::default_fill_threshold")]
    pub fill_threshold: f32,

    /// Minimum difference between the top-two fill fractions required to
    /// accept the top one as the sole answer. Domain [0, 1).
    #[serde(default = "EvaluationConfig::default_min_margin")]
    pub min_margin: f32,

    /// Affine fine-tuning applied to every template option geometry at
    /// sampling time.
    #[serde(default)]
    pub alignment: AlignmentAdjustment,

    /// Maximum number of images accepted per batch; the remainder is dropped
    /// with a warning and reported in the batch result.
    #[serde(default = "EvaluationConfig::default_max_images")]
    pub max_images: usize,

    /// Index (into the batch input order) of the one image for which a
    /// diagnostic overlay is rendered. None disables overlay rendering.
    #[serde(default)]
    pub overlay_index: Option<usize>,

    /// Free-form sheet version label carried into every record (e.g. the
    /// answer-key set name).
    #[serde(default)]
    pub sheet_version: Option<String>,

    /// Parallel processing policy for the batch.
    #[serde(default)]
    pub parallel: ParallelPolicy,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            fill_threshold: Self::default_fill_threshold(),
            min_margin: Self::default_min_margin(),
            alignment: AlignmentAdjustment::default(),
            max_images: Self::default_max_images(),
            overlay_index: None,
            sheet_version: None,
            parallel: ParallelPolicy::default(),
        }
    }
}

impl EvaluationConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the fill threshold.
    pub fn with_fill_threshold(mut self, threshold: f32) -> Self {
        self.fill_threshold = threshold;
        self
    }

    /// Sets the minimum margin between the top two fill fractions.
    pub fn with_min_margin(mut self, margin: f32) -> Self {
        self.min_margin = margin;
        self
    }

    /// Sets the alignment adjustment applied to template geometry.
    pub fn with_alignment(mut self, alignment: AlignmentAdjustment) -> Self {
        self.alignment = alignment;
        self
    }

    /// Sets the batch image cap.
    pub fn with_max_images(mut self, max_images: usize) -> Self {
        self.max_images = max_images;
        self
    }

    /// Designates the image (by batch input index) that gets a diagnostic
    /// overlay.
    pub fn with_overlay_index(mut self, index: Option<usize>) -> Self {
        self.overlay_index = index;
        self
    }

    /// Sets the sheet version label.
    pub fn with_sheet_version(mut self, version: impl Into<String>) -> Self {
        self.sheet_version = Some(version.into());
        self
    }

    /// Sets the parallel processing policy.
    pub fn with_parallel(mut self, parallel: ParallelPolicy) -> Self {
        self.parallel = parallel;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `OmrError::ConfigError` if any tunable is outside its domain.
    /// Validation runs before any image is processed; a failure here is fatal
    /// to the whole run.
    pub fn validate(&self) -> OmrResult<()> {
        if !self.fill_threshold.is_finite() || !(0.0..1.0).contains(&self.fill_threshold)
            || self.fill_threshold == 0.0
        {
            return Err(OmrError::config_error_with_context(
                "fill_threshold",
                &self.fill_threshold.to_string(),
                "must be in the open interval (0, 1)",
            ));
        }
        if !self.min_margin.is_finite() || !(0.0..1.0).contains(&self.min_margin) {
            return Err(OmrError::config_error_with_context(
                "min_margin",
                &self.min_margin.to_string(),
                "must be in the half-open interval [0, 1)",
            ));
        }
        self.alignment.validate()?;
        if self.max_images == 0 {
            return Err(OmrError::config_error_with_context(
                "max_images",
                "0",
                "batch must accept at least one image",
            ));
        }
        Ok(())
    }

    fn default_fill_threshold() -> f32 {
        DEFAULT_FILL_THRESHOLD
    }

    fn default_min_margin() -> f32 {
        DEFAULT_MIN_MARGIN
    }

    fn default_max_images() -> usize {
        DEFAULT_MAX_IMAGES
    }
}
