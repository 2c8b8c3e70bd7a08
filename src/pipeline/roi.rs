//! Region-of-interest resolution.
//!
//! Produces, for each question, the pixel regions to sample on the rectified
//! image. Two interchangeable strategies exist, selected once per run:
//! template-guided (a declared layout plus the run's alignment adjustment)
//! and grid-estimated (a fixed assumed layout derived purely from the image
//! dimensions). Both emit the same [`ResolvedQuestion`] shape, so the mark
//! detector never knows which strategy produced its input.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::domain::geometry::PixelRegion;
use crate::domain::grid::GridLayout;
use crate::domain::template::{AlignmentAdjustment, Question, Template};

/// One question with its option sampling regions resolved to pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedQuestion {
    /// Stable question index.
    pub index: u32,
    /// Subject tag for per-subject scoring.
    pub subject: String,
    /// Sampling region per option, in option order. Options whose geometry
    /// falls entirely outside the image resolve to an empty region and read
    /// as unfilled.
    pub options: Vec<PixelRegion>,
}

/// The ROI resolution strategy for a run.
#[derive(Debug, Clone)]
pub enum RoiSource {
    /// Declared layout, adjusted by the run's alignment fine-tuning.
    TemplateGuided {
        /// The declared sheet layout, shared read-only across workers.
        template: Arc<Template>,
        /// Alignment fine-tuning applied at sampling time.
        adjustment: AlignmentAdjustment,
    },
    /// Fixed assumed layout derived from image dimensions alone.
    GridEstimated(GridLayout),
}

impl RoiSource {
    /// Creates a template-guided source.
    pub fn from_template(template: Template, adjustment: AlignmentAdjustment) -> Self {
        Self::TemplateGuided {
            template: Arc::new(template),
            adjustment,
        }
    }

    /// Creates a grid-estimated source.
    pub fn grid(layout: GridLayout) -> Self {
        Self::GridEstimated(layout)
    }

    /// Number of questions this source will resolve.
    pub fn question_count(&self) -> usize {
        match self {
            Self::TemplateGuided { template, .. } => template.len(),
            Self::GridEstimated(layout) => layout.question_count() as usize,
        }
    }

    /// `(question index, option count)` pairs, for key consistency checks
    /// that run before any image is processed.
    pub fn question_option_counts(&self) -> Vec<(u32, usize)> {
        match self {
            Self::TemplateGuided { template, .. } => template
                .questions
                .iter()
                .map(|q| (q.index, q.options.len()))
                .collect(),
            Self::GridEstimated(layout) => (0..layout.question_count())
                .map(|i| (i, layout.options_per_question as usize))
                .collect(),
        }
    }

    /// Resolves the ordered questions for an image of the given dimensions.
    ///
    /// Output is in ascending question index order regardless of strategy.
    pub fn resolve(&self, width: u32, height: u32) -> Vec<ResolvedQuestion> {
        match self {
            Self::TemplateGuided {
                template,
                adjustment,
            } => resolve_questions(&template.questions, *adjustment, width, height),
            Self::GridEstimated(layout) => resolve_questions(
                &layout.questions(),
                AlignmentAdjustment::IDENTITY,
                width,
                height,
            ),
        }
    }
}

/// Resolves declared questions into pixel regions, applying the adjustment
/// to every option geometry.
fn resolve_questions(
    questions: &[Question],
    adjustment: AlignmentAdjustment,
    width: u32,
    height: u32,
) -> Vec<ResolvedQuestion> {
    questions
        .iter()
        .map(|question| {
            let options = question
                .options
                .iter()
                .map(|shape| {
                    let adjusted = if adjustment.is_identity() {
                        shape.clone()
                    } else {
                        adjustment.apply_shape(shape)
                    };
                    PixelRegion::from_shape(&adjusted, width, height)
                        .unwrap_or_else(PixelRegion::empty)
                })
                .collect();
            ResolvedQuestion {
                index: question.index,
                subject: question.subject.clone(),
                options,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::geometry::OptionShape;

    fn two_question_template() -> Template {
        Template::new(vec![
            Question {
                index: 1,
                subject: "EDA".to_string(),
                options: vec![
                    OptionShape::rect(0.1, 0.5, 0.1, 0.1),
                    OptionShape::rect(0.3, 0.5, 0.1, 0.1),
                ],
            },
            Question {
                index: 0,
                subject: "Python".to_string(),
                options: vec![
                    OptionShape::rect(0.1, 0.1, 0.1, 0.1),
                    OptionShape::rect(0.3, 0.1, 0.1, 0.1),
                ],
            },
        ])
        .unwrap()
    }

    #[test]
    fn template_questions_resolve_in_index_order() {
        let source = RoiSource::from_template(
            two_question_template(),
            AlignmentAdjustment::IDENTITY,
        );
        let resolved = source.resolve(100, 100);
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].index, 0);
        assert_eq!(resolved[0].subject, "Python");
        assert_eq!(resolved[1].index, 1);
        assert_eq!(resolved[0].options[0].left, 10);
        assert_eq!(resolved[0].options[0].top, 10);
    }

    #[test]
    fn adjustment_shifts_resolved_regions() {
        let adjustment = AlignmentAdjustment::new(1.0, 1.0, 0.1, 0.0);
        let source = RoiSource::from_template(two_question_template(), adjustment);
        let resolved = source.resolve(100, 100);
        assert_eq!(resolved[0].options[0].left, 20);
        assert_eq!(resolved[0].options[0].top, 10);
    }

    #[test]
    fn off_image_options_resolve_empty_but_keep_their_slot() {
        let adjustment = AlignmentAdjustment::new(1.0, 1.0, 2.0, 0.0);
        let source = RoiSource::from_template(two_question_template(), adjustment);
        let resolved = source.resolve(100, 100);
        assert_eq!(resolved[0].options.len(), 2);
        assert!(resolved[0].options.iter().all(|r| r.is_empty()));
    }

    #[test]
    fn grid_resolution_covers_every_question() {
        let layout = GridLayout::default();
        let source = RoiSource::grid(layout.clone());
        let resolved = source.resolve(1240, 1754);
        assert_eq!(resolved.len(), 100);
        for (i, question) in resolved.iter().enumerate() {
            assert_eq!(question.index, i as u32);
            assert_eq!(question.options.len(), 4);
            assert!(question.options.iter().all(|r| !r.is_empty()));
        }
    }

    #[test]
    fn grid_and_equivalent_template_resolve_identically() {
        let layout = GridLayout::default();
        let grid_resolved = RoiSource::grid(layout.clone()).resolve(800, 1100);
        let template_resolved = RoiSource::from_template(
            layout.to_template().unwrap(),
            AlignmentAdjustment::IDENTITY,
        )
        .resolve(800, 1100);
        assert_eq!(grid_resolved, template_resolved);
    }

    #[test]
    fn option_counts_match_resolution() {
        let source = RoiSource::from_template(
            two_question_template(),
            AlignmentAdjustment::IDENTITY,
        );
        assert_eq!(source.question_option_counts(), vec![(0, 2), (1, 2)]);
        assert_eq!(source.question_count(), 2);
    }
}
