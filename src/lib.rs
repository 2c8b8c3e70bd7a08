//! # omr-eval
//!
//! A Rust library that evaluates scanned or photographed multiple-choice
//! answer sheets (OMR sheets): given a raster image of a filled sheet, it
//! determines which option (if any) was marked for each question, then scores
//! the answers against an answer key.
//!
//! ## Features
//!
//! - Content-based orientation correction (0°/90°/180°/270° capture errors)
//! - Best-effort perspective rectification onto a canonical sheet frame
//! - Template-guided or template-free (grid-estimated) option regions
//! - Threshold-and-margin mark classification with explicit ambiguity
//! - Per-subject and overall scoring against an optional answer key
//! - Parallel batch evaluation with one record per input, in input order
//! - Diagnostic overlay rendering for visual verification
//!
//! ## Modules
//!
//! * [`core`] - Error handling, run configuration, and parallelism policy
//! * [`domain`] - Sheet layouts, geometry, answer keys, verdicts, and scores
//! * [`pipeline`] - The per-image stage sequence and the batch runner
//! * [`utils`] - Image loading helpers and overlay rendering
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use omr_eval::prelude::*;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Tunables for the whole run, shared by every worker.
//! let config = EvaluationConfig::new()
//!     .with_fill_threshold(0.45)
//!     .with_min_margin(0.12)
//!     .with_sheet_version("Set A");
//!
//! // Template-free evaluation against the standard grid layout.
//! let pipeline = OmrPipeline::new(
//!     config,
//!     RoiSource::grid(GridLayout::default()),
//!     None,
//! )?;
//!
//! let batch = pipeline.evaluate_paths(&["sheets/student_001.jpg", "sheets/student_002.jpg"]);
//! for record in &batch.records {
//!     match &record.error {
//!         Some(reason) => println!("{}: failed ({reason})", record.source),
//!         None => println!("{}: {} answers", record.source, record.answers.as_ref().unwrap().len()),
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Template-guided runs
//!
//! ```rust,no_run
//! use omr_eval::prelude::*;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let template = Template::from_json(&std::fs::read_to_string("template.json")?)?;
//! let adjustment = AlignmentAdjustment::new(1.01, 0.99, 0.002, -0.001);
//!
//! let key: AnswerKey = [(0u32, 1u8), (1, 2), (2, 0)].into_iter().collect();
//!
//! let pipeline = OmrPipeline::new(
//!     EvaluationConfig::new().with_overlay_index(Some(0)),
//!     RoiSource::from_template(template, adjustment),
//!     Some(key),
//! )?;
//! let batch = pipeline.evaluate_paths(&["sheets/student_001.jpg"]);
//! if let Some(overlay) = &batch.overlay {
//!     overlay.save("overlay.png")?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod domain;
pub mod pipeline;
pub mod utils;

/// Prelude module for convenient imports.
///
/// Bring the essentials into scope with a single use statement:
///
/// ```rust
/// use omr_eval::prelude::*;
/// ```
///
/// Included items focus on the most common tasks: building a pipeline
/// ([`OmrPipeline`], [`EvaluationConfig`], [`RoiSource`]), describing layouts
/// ([`Template`], [`GridLayout`], [`AlignmentAdjustment`]), keys and results
/// ([`AnswerKey`], [`EvaluationRecord`], [`BatchResult`]), and the essential
/// error types ([`OmrError`], [`OmrResult`]).
///
/// For advanced customization (individual stages, overlay configuration),
/// import directly from the respective modules (e.g. `omr_eval::pipeline`,
/// `omr_eval::utils`).
pub mod prelude {
    // Pipeline (essential)
    pub use crate::pipeline::{BatchResult, EvaluationRecord, OmrPipeline, RoiSource};

    // Layouts and tunables
    pub use crate::core::EvaluationConfig;
    pub use crate::domain::{AlignmentAdjustment, AnswerKey, GridLayout, Template, Verdict};

    // Error handling (essential)
    pub use crate::core::{OmrError, OmrResult};

    // Image utility (minimal)
    pub use crate::utils::load_image;
}
