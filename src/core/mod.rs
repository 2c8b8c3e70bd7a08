//! Core infrastructure: error handling, run configuration, and parallelism
//! policy shared by every pipeline stage.

pub mod config;
pub mod errors;
pub mod parallel;

pub use config::{
    DEFAULT_FILL_THRESHOLD, DEFAULT_MAX_IMAGES, DEFAULT_MIN_MARGIN, EvaluationConfig,
};
pub use errors::{OmrError, OmrResult, ProcessingStage};
pub use parallel::ParallelPolicy;
