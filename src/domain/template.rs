//! Declared sheet layouts and their alignment fine-tuning.
//!
//! A [`Template`] maps question and option indices to normalized geometry on
//! the canonical sheet frame. Templates come from a JSON document of the form
//!
//! ```json
//! {
//!   "questions": [
//!     {
//!       "index": 0,
//!       "subject": "Python",
//!       "options": [
//!         {"x": 0.10, "y": 0.20, "w": 0.03, "h": 0.02},
//!         {"x": 0.15, "y": 0.20, "w": 0.03, "h": 0.02}
//!       ]
//!     }
//!   ]
//! }
//! ```
//!
//! Questions are sorted by ascending index on load and are immutable for the
//! run. The [`AlignmentAdjustment`] compensates residual misalignment at
//! sampling time without mutating the template itself.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::core::errors::{OmrError, OmrResult};
use crate::domain::geometry::OptionShape;

/// One question's declared layout: a stable index, a subject tag for
/// per-subject scoring, and the ordered option geometries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// Stable question index; defines answer-key alignment and output order.
    pub index: u32,
    /// Subject tag grouping this question for per-subject scoring.
    #[serde(default)]
    pub subject: String,
    /// Ordered option geometries in the normalized canonical frame.
    pub options: Vec<OptionShape>,
}

/// An ordered sheet layout: the sequence of questions with their option
/// geometries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    /// The questions, kept sorted by ascending index.
    pub questions: Vec<Question>,
}

impl Template {
    /// Builds a template from a list of questions, sorting by index.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the layout is structurally invalid;
    /// see [`Template::validate`].
    pub fn new(mut questions: Vec<Question>) -> OmrResult<Self> {
        questions.sort_by_key(|q| q.index);
        let template = Self { questions };
        template.validate()?;
        Ok(template)
    }

    /// Parses a template from its JSON document.
    ///
    /// # Errors
    ///
    /// Returns `OmrError::DocumentParse` for malformed JSON and
    /// `OmrError::ConfigError` for structurally invalid layouts. Both are
    /// fatal to the run: a broken template would corrupt every sheet.
    pub fn from_json(json: &str) -> OmrResult<Self> {
        let parsed: Template = serde_json::from_str(json)?;
        Self::new(parsed.questions)
    }

    /// Validates the structural invariants of the layout.
    ///
    /// Invariants: at least one question, unique question indices, at least
    /// two options per question, all geometry inside the normalized frame.
    pub fn validate(&self) -> OmrResult<()> {
        if self.questions.is_empty() {
            return Err(OmrError::config_error("template declares no questions"));
        }
        let mut seen = HashSet::new();
        for question in &self.questions {
            if !seen.insert(question.index) {
                return Err(OmrError::config_error(format!(
                    "template declares duplicate question index {}",
                    question.index
                )));
            }
            if question.options.len() < 2 {
                return Err(OmrError::config_error(format!(
                    "question {} declares {} option(s); at least 2 are required",
                    question.index,
                    question.options.len()
                )));
            }
            for (option_idx, shape) in question.options.iter().enumerate() {
                if !shape.is_normalized() {
                    return Err(OmrError::config_error(format!(
                        "question {} option {} geometry is outside the normalized sheet frame",
                        question.index, option_idx
                    )));
                }
            }
        }
        Ok(())
    }

    /// Number of questions in the template.
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// Returns true if the template has no questions.
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

/// Per-run affine correction applied to every template option geometry.
///
/// Scales about the canonical frame origin, then translates. Applied at
/// sampling time; the template itself is never mutated. The identity
/// adjustment is `(1.0, 1.0, 0.0, 0.0)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlignmentAdjustment {
    /// Horizontal scale factor.
    pub scale_x: f32,
    /// Vertical scale factor.
    pub scale_y: f32,
    /// Horizontal offset, fraction of sheet width.
    pub offset_x: f32,
    /// Vertical offset, fraction of sheet height.
    pub offset_y: f32,
}

impl Default for AlignmentAdjustment {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl AlignmentAdjustment {
    /// The identity adjustment: no scaling, no offset.
    pub const IDENTITY: Self = Self {
        scale_x: 1.0,
        scale_y: 1.0,
        offset_x: 0.0,
        offset_y: 0.0,
    };

    /// Creates an adjustment from its four scalars.
    pub fn new(scale_x: f32, scale_y: f32, offset_x: f32, offset_y: f32) -> Self {
        Self {
            scale_x,
            scale_y,
            offset_x,
            offset_y,
        }
    }

    /// Returns true if this adjustment leaves geometry unchanged.
    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// Validates the adjustment scalars.
    ///
    /// Scales must be finite and strictly positive; offsets finite.
    pub fn validate(&self) -> OmrResult<()> {
        if !(self.scale_x.is_finite() && self.scale_x > 0.0)
            || !(self.scale_y.is_finite() && self.scale_y > 0.0)
        {
            return Err(OmrError::config_error_with_context(
                "alignment.scale",
                &format!("({}, {})", self.scale_x, self.scale_y),
                "scale factors must be finite and positive",
            ));
        }
        if !self.offset_x.is_finite() || !self.offset_y.is_finite() {
            return Err(OmrError::config_error_with_context(
                "alignment.offset",
                &format!("({}, {})", self.offset_x, self.offset_y),
                "offsets must be finite",
            ));
        }
        Ok(())
    }

    /// Applies the adjustment to a normalized coordinate pair: scale about
    /// the origin, then translate.
    #[inline]
    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            x * self.scale_x + self.offset_x,
            y * self.scale_y + self.offset_y,
        )
    }

    /// Applies the adjustment to a whole option shape, producing the adjusted
    /// normalized geometry used for sampling.
    pub fn apply_shape(&self, shape: &OptionShape) -> OptionShape {
        match shape {
            OptionShape::Rect { x, y, w, h } => {
                let (nx, ny) = self.apply(*x, *y);
                OptionShape::Rect {
                    x: nx,
                    y: ny,
                    w: w * self.scale_x,
                    h: h * self.scale_y,
                }
            }
            OptionShape::Polygon { points } => OptionShape::Polygon {
                points: points
                    .iter()
                    .map(|p| {
                        let (nx, ny) = self.apply(p.x, p.y);
                        crate::domain::geometry::Point::new(nx, ny)
                    })
                    .collect(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::geometry::Point;

    fn sample_question(index: u32) -> Question {
        Question {
            index,
            subject: "Python".to_string(),
            options: vec![
                OptionShape::rect(0.10, 0.20, 0.03, 0.02),
                OptionShape::rect(0.15, 0.20, 0.03, 0.02),
            ],
        }
    }

    #[test]
    fn parses_and_sorts_questions_by_index() {
        let json = r#"{
            "questions": [
                {"index": 2, "subject": "EDA", "options": [
                    {"x": 0.1, "y": 0.5, "w": 0.03, "h": 0.02},
                    {"x": 0.2, "y": 0.5, "w": 0.03, "h": 0.02}
                ]},
                {"index": 0, "subject": "Python", "options": [
                    {"x": 0.1, "y": 0.2, "w": 0.03, "h": 0.02},
                    {"x": 0.2, "y": 0.2, "w": 0.03, "h": 0.02}
                ]}
            ]
        }"#;
        let template = Template::from_json(json).unwrap();
        assert_eq!(template.len(), 2);
        assert_eq!(template.questions[0].index, 0);
        assert_eq!(template.questions[1].index, 2);
        assert_eq!(template.questions[1].subject, "EDA");
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(
            Template::from_json("{not json"),
            Err(OmrError::DocumentParse(_))
        ));
    }

    #[test]
    fn rejects_empty_template() {
        assert!(Template::new(vec![]).is_err());
    }

    #[test]
    fn rejects_duplicate_indices() {
        let result = Template::new(vec![sample_question(1), sample_question(1)]);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_single_option_question() {
        let mut question = sample_question(0);
        question.options.truncate(1);
        assert!(Template::new(vec![question]).is_err());
    }

    #[test]
    fn rejects_out_of_frame_geometry() {
        let mut question = sample_question(0);
        question.options[0] = OptionShape::rect(0.9, 0.9, 0.5, 0.1);
        assert!(Template::new(vec![question]).is_err());
    }

    #[test]
    fn identity_adjustment_is_noop() {
        let adjustment = AlignmentAdjustment::default();
        assert!(adjustment.is_identity());
        let shape = OptionShape::rect(0.1, 0.2, 0.05, 0.04);
        assert_eq!(adjustment.apply_shape(&shape), shape);
    }

    #[test]
    fn adjustment_scales_then_translates() {
        let adjustment = AlignmentAdjustment::new(1.1, 0.9, 0.01, -0.02);
        let (x, y) = adjustment.apply(0.5, 0.5);
        assert!((x - 0.56).abs() < 1e-6);
        assert!((y - 0.43).abs() < 1e-6);

        let shape = OptionShape::rect(0.2, 0.4, 0.1, 0.1);
        if let OptionShape::Rect { x, y, w, h } = adjustment.apply_shape(&shape) {
            assert!((x - 0.23).abs() < 1e-6);
            assert!((y - 0.34).abs() < 1e-6);
            assert!((w - 0.11).abs() < 1e-6);
            assert!((h - 0.09).abs() < 1e-6);
        } else {
            panic!("rect adjusted into non-rect");
        }
    }

    #[test]
    fn adjustment_maps_polygon_vertices() {
        let adjustment = AlignmentAdjustment::new(2.0, 2.0, 0.0, 0.0);
        let shape = OptionShape::polygon(vec![Point::new(0.1, 0.1), Point::new(0.2, 0.1), Point::new(0.15, 0.2)]);
        if let OptionShape::Polygon { points } = adjustment.apply_shape(&shape) {
            assert!((points[0].x - 0.2).abs() < 1e-6);
            assert!((points[2].y - 0.4).abs() < 1e-6);
        } else {
            panic!("polygon adjusted into non-polygon");
        }
    }

    #[test]
    fn adjustment_validation() {
        assert!(AlignmentAdjustment::IDENTITY.validate().is_ok());
        assert!(AlignmentAdjustment::new(0.0, 1.0, 0.0, 0.0).validate().is_err());
        assert!(AlignmentAdjustment::new(1.0, -1.0, 0.0, 0.0).validate().is_err());
        assert!(AlignmentAdjustment::new(1.0, 1.0, f32::NAN, 0.0).validate().is_err());
    }
}
