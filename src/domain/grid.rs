//! Template-free grid layout estimation.
//!
//! When no template document is supplied, option regions are derived purely
//! from the rectified image dimensions and a fixed assumed sheet layout: a
//! header band at the top, then one block of bubble rows per subject, side by
//! side. Lower precision than a declared template, but requires no external
//! input.

use serde::{Deserialize, Serialize};

use crate::core::errors::{OmrError, OmrResult};
use crate::domain::geometry::OptionShape;
use crate::domain::template::{Question, Template};

/// Fraction of the sheet width where the bubble field starts.
const FIELD_LEFT: f32 = 0.06;
/// Fraction of the sheet width where the bubble field ends.
const FIELD_RIGHT: f32 = 0.94;
/// Fraction of the sheet height where the bubble field starts (below the
/// header band).
const FIELD_TOP: f32 = 0.18;
/// Fraction of the sheet height where the bubble field ends.
const FIELD_BOTTOM: f32 = 0.96;
/// Horizontal gap between adjacent subject blocks, fraction of sheet width.
const COLUMN_GUTTER: f32 = 0.02;
/// Fraction of each option cell trimmed from every side before sampling, so
/// the region covers the bubble rather than the cell borders.
const CELL_INSET: f32 = 0.2;

/// A fixed, assumed sheet layout used when no template is available.
///
/// The default reproduces the standard 100-question sheet: five subject
/// blocks of twenty questions each, four options per question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridLayout {
    /// Question rows per subject block.
    pub rows: u32,
    /// Number of subject blocks laid out side by side.
    pub columns: u32,
    /// Options per question.
    pub options_per_question: u32,
    /// Subject tag per block, in left-to-right order; length equals `columns`.
    pub subjects: Vec<String>,
}

impl Default for GridLayout {
    fn default() -> Self {
        Self {
            rows: 20,
            columns: 5,
            options_per_question: 4,
            subjects: ["Python", "EDA", "SQL", "Power BI", "Statistics"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl GridLayout {
    /// Creates a grid layout, validating its shape.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the grid has no rows or columns,
    /// fewer than two options per question, or a subject list whose length
    /// does not match the column count.
    pub fn new(
        rows: u32,
        columns: u32,
        options_per_question: u32,
        subjects: Vec<String>,
    ) -> OmrResult<Self> {
        let layout = Self {
            rows,
            columns,
            options_per_question,
            subjects,
        };
        layout.validate()?;
        Ok(layout)
    }

    /// Validates the grid dimensions and subject list.
    pub fn validate(&self) -> OmrResult<()> {
        if self.rows == 0 || self.columns == 0 {
            return Err(OmrError::config_error(
                "grid layout requires at least one row and one column",
            ));
        }
        if self.options_per_question < 2 {
            return Err(OmrError::config_error(format!(
                "grid layout declares {} option(s) per question; at least 2 are required",
                self.options_per_question
            )));
        }
        if self.subjects.len() != self.columns as usize {
            return Err(OmrError::config_error(format!(
                "grid layout declares {} subject(s) for {} column(s)",
                self.subjects.len(),
                self.columns
            )));
        }
        Ok(())
    }

    /// Total number of questions in the grid.
    pub fn question_count(&self) -> u32 {
        self.rows * self.columns
    }

    /// Generates the synthetic questions for this layout.
    ///
    /// Questions get sequential indices starting at 0, numbered down each
    /// subject block before moving to the next, so index `rows * c + r` is
    /// row `r` of block `c`. The produced geometry is shaped exactly like a
    /// declared template's, so downstream stages cannot tell the strategies
    /// apart.
    pub fn questions(&self) -> Vec<Question> {
        let field_width = FIELD_RIGHT - FIELD_LEFT;
        let field_height = FIELD_BOTTOM - FIELD_TOP;
        let gutter_total = COLUMN_GUTTER * (self.columns.saturating_sub(1)) as f32;
        let block_width = (field_width - gutter_total) / self.columns as f32;
        let row_height = field_height / self.rows as f32;
        let cell_width = block_width / self.options_per_question as f32;

        let mut questions = Vec::with_capacity(self.question_count() as usize);
        for column in 0..self.columns {
            let block_left = FIELD_LEFT + column as f32 * (block_width + COLUMN_GUTTER);
            let subject = self.subjects[column as usize].clone();
            for row in 0..self.rows {
                let cell_top = FIELD_TOP + row as f32 * row_height;
                let options = (0..self.options_per_question)
                    .map(|option| {
                        let cell_left = block_left + option as f32 * cell_width;
                        OptionShape::rect(
                            cell_left + cell_width * CELL_INSET,
                            cell_top + row_height * CELL_INSET,
                            cell_width * (1.0 - 2.0 * CELL_INSET),
                            row_height * (1.0 - 2.0 * CELL_INSET),
                        )
                    })
                    .collect();
                questions.push(Question {
                    index: column * self.rows + row,
                    subject: subject.clone(),
                    options,
                });
            }
        }
        questions
    }

    /// Expresses the grid as an equivalent declared template.
    ///
    /// Useful for comparing the two ROI strategies on the same sheet.
    pub fn to_template(&self) -> OmrResult<Template> {
        Template::new(self.questions())
    }
}
