//! Error types for the OMR evaluation pipeline.
//!
//! This module defines the error types that can occur while evaluating answer
//! sheets, including image loading errors, per-stage processing errors, and
//! configuration errors. It also provides utility functions for creating these
//! errors with appropriate context.

use thiserror::Error;

/// Enum representing different stages of processing in the OMR pipeline.
///
/// This enum is used to identify which stage of the pipeline an error occurred in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProcessingStage {
    /// Error occurred while normalizing image orientation.
    Orientation,
    /// Error occurred during perspective rectification.
    Rectification,
    /// Error occurred while resolving option sampling regions.
    RoiResolution,
    /// Error occurred during mark detection.
    MarkDetection,
    /// Error occurred while scoring answers against a key.
    Scoring,
    /// Error occurred while rendering the diagnostic overlay.
    Overlay,
    /// Error occurred during batch processing.
    BatchProcessing,
    /// Generic processing error.
    Generic,
}

impl std::fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessingStage::Orientation => write!(f, "orientation normalization"),
            ProcessingStage::Rectification => write!(f, "perspective rectification"),
            ProcessingStage::RoiResolution => write!(f, "roi resolution"),
            ProcessingStage::MarkDetection => write!(f, "mark detection"),
            ProcessingStage::Scoring => write!(f, "scoring"),
            ProcessingStage::Overlay => write!(f, "overlay rendering"),
            ProcessingStage::BatchProcessing => write!(f, "batch processing"),
            ProcessingStage::Generic => write!(f, "processing"),
        }
    }
}

/// Enum representing the errors that can occur in the OMR pipeline.
///
/// Per-image failures are caught at the batch boundary and turned into
/// failure records; only configuration-level errors are fatal to a run.
#[derive(Error, Debug)]
pub enum OmrError {
    /// Error occurred while decoding or loading a sheet image.
    #[error("image load")]
    ImageLoad(#[source] image::ImageError),

    /// Error occurred during a pipeline processing stage.
    #[error("{kind} failed: {context}")]
    Processing {
        /// The stage of processing where the error occurred.
        kind: ProcessingStage,
        /// Additional context about the error.
        context: String,
        /// The underlying error that caused this error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Error indicating invalid input.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// A message describing the invalid input.
        message: String,
    },

    /// Error indicating a run-level configuration problem.
    ///
    /// Configuration errors are detected before any image is processed and
    /// are fatal to the whole run.
    #[error("configuration: {message}")]
    ConfigError {
        /// A message describing the configuration error.
        message: String,
    },

    /// Error parsing a structured document (template or answer key).
    #[error("document parse")]
    DocumentParse(#[from] serde_json::Error),

    /// IO error.
    #[error("io")]
    Io(#[from] std::io::Error),
}

/// Result alias used throughout the crate.
pub type OmrResult<T> = Result<T, OmrError>;

impl OmrError {
    /// Creates an OmrError for a processing stage failure.
    ///
    /// # Arguments
    ///
    /// * `kind` - The stage of processing where the error occurred.
    /// * `context` - Additional context about the error.
    /// * `error` - The underlying error that caused this error.
    pub fn processing_error(
        kind: ProcessingStage,
        context: &str,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Processing {
            kind,
            context: context.to_string(),
            source: Box::new(error),
        }
    }

    /// Creates an OmrError for invalid input.
    ///
    /// # Arguments
    ///
    /// * `message` - A message describing the invalid input.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Creates an OmrError for configuration errors.
    ///
    /// # Arguments
    ///
    /// * `message` - A message describing the configuration error.
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Creates an OmrError for configuration errors with field context.
    ///
    /// # Arguments
    ///
    /// * `field` - The field where the error occurred.
    /// * `value` - The value of the field.
    /// * `reason` - The reason for the error.
    pub fn config_error_with_context(field: &str, value: &str, reason: &str) -> Self {
        Self::ConfigError {
            message: format!(
                "Configuration error in field '{}' with value '{}': {}",
                field, value, reason
            ),
        }
    }

    /// Creates an OmrError for validation errors.
    ///
    /// # Arguments
    ///
    /// * `component` - The component where the error occurred.
    /// * `field` - The field where the error occurred.
    /// * `expected` - The expected value.
    /// * `actual` - The actual value.
    pub fn validation_error(component: &str, field: &str, expected: &str, actual: &str) -> Self {
        Self::InvalidInput {
            message: format!(
                "Validation failed in {}: field '{}' expected {}, but got '{}'",
                component, field, expected, actual
            ),
        }
    }
}

impl From<image::ImageError> for OmrError {
    fn from(error: image::ImageError) -> Self {
        Self::ImageLoad(error)
    }
}
