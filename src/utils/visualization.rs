//! Diagnostic overlay rendering.
//!
//! Projects the resolved option regions and detection results back onto the
//! rectified sheet image for visual verification: every option region is
//! outlined, the detected selection is drawn in a distinct color, and
//! ambiguous questions get a warning color on their top candidates. The
//! overlay is diagnostic only — it never feeds back into scoring, and the
//! input image is never modified.

use ab_glyph::FontVec;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_line_segment_mut, draw_text_mut};
use imageproc::rect::Rect;
use std::path::Path;
use tracing::{debug, info};

use crate::domain::answer::{AnswerSet, Verdict};
use crate::domain::geometry::PixelRegion;
use crate::pipeline::roi::ResolvedQuestion;

/// Outline color for unselected option regions.
const OUTLINE_COLOR: Rgb<u8> = Rgb([66, 133, 244]);
/// Outline color for the detected selection.
const SELECTED_COLOR: Rgb<u8> = Rgb([0, 200, 83]);
/// Outline color for the top candidates of an ambiguous question.
const AMBIGUOUS_COLOR: Rgb<u8> = Rgb([244, 67, 54]);
/// Color for question index labels.
const LABEL_COLOR: Rgb<u8> = Rgb([33, 33, 33]);

/// Configuration for overlay rendering.
///
/// Holds the font used for question index labels and the outline styling.
/// Without a font, label rendering is skipped and regions are still drawn.
pub struct OverlayConfig {
    /// The font used for question labels. If None, labels are skipped.
    pub font: Option<FontVec>,

    /// The scale factor for label text. Defaults to 14.0.
    pub font_scale: f32,

    /// The thickness of region outlines. Defaults to 2.
    pub outline_thickness: i32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            font: None,
            font_scale: 14.0,
            outline_thickness: 2,
        }
    }
}

impl OverlayConfig {
    /// Creates an OverlayConfig with a font loaded from the specified path.
    ///
    /// # Errors
    ///
    /// Returns an error if the font file cannot be read or parsed.
    pub fn with_font_path(font_path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let font_data = std::fs::read(font_path)?;
        let font = FontVec::try_from_vec(font_data)
            .map_err(|_| format!("Failed to parse font file: {}", font_path.display()))?;

        Ok(Self {
            font: Some(font),
            ..Self::default()
        })
    }

    /// Creates an OverlayConfig with a system font.
    ///
    /// Attempts to load a font from common system locations, falling back to
    /// the default (label-free) configuration when none is found.
    pub fn with_system_font() -> Self {
        let font_paths = [
            "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
            "/System/Library/Fonts/Arial.ttf",
            "C:\\Windows\\Fonts\\arial.ttf",
        ];

        for path in &font_paths {
            if let Ok(font_data) = std::fs::read(path)
                && let Ok(font) = FontVec::try_from_vec(font_data)
            {
                info!("Loaded system font: {}", path);
                return Self {
                    font: Some(font),
                    ..Self::default()
                };
            }
        }

        debug!("No system font found, question labels will be skipped");
        Self::default()
    }
}

/// Renders the diagnostic overlay: an annotated copy of the rectified image
/// with every option region outlined and the detection verdicts visually
/// distinguished.
///
/// The input image is cloned, never mutated.
pub fn render_overlay(
    image: &RgbImage,
    questions: &[ResolvedQuestion],
    answers: &AnswerSet,
    config: &OverlayConfig,
) -> RgbImage {
    let mut overlay = image.clone();
    let bounds = (overlay.width() as i32, overlay.height() as i32);

    for question in questions {
        let answer = answers.get(question.index);
        let highlight = answer.map(|a| highlight_options(a.verdict, &a.fills));

        for (option_idx, region) in question.options.iter().enumerate() {
            if region.is_empty() {
                continue;
            }
            let color = match &highlight {
                Some(HighlightSet::Selected(i)) if *i == option_idx => SELECTED_COLOR,
                Some(HighlightSet::Ambiguous(top)) if top.contains(&option_idx) => {
                    AMBIGUOUS_COLOR
                }
                _ => OUTLINE_COLOR,
            };
            draw_region_outline(&mut overlay, region, color, config.outline_thickness, bounds);
        }

        if let Some(font) = &config.font
            && let Some(first) = question.options.first().filter(|r| !r.is_empty())
        {
            let x = first.left as i32 - (config.font_scale * 2.5) as i32;
            let y = first.top as i32;
            if x >= 0 && y >= 0 && x < bounds.0 && y < bounds.1 {
                draw_text_mut(
                    &mut overlay,
                    LABEL_COLOR,
                    x,
                    y,
                    config.font_scale,
                    font,
                    &question.index.to_string(),
                );
            }
        }
    }

    overlay
}

/// Which options of one question deserve a highlight color.
enum HighlightSet {
    Selected(usize),
    Ambiguous(Vec<usize>),
    None,
}

/// Determines the highlighted options from a verdict and its fill fractions.
///
/// For ambiguous questions the top two fills get the warning color, which is
/// what a human checking the sheet wants to look at.
fn highlight_options(verdict: Verdict, fills: &[f32]) -> HighlightSet {
    match verdict {
        Verdict::Selected(option) => HighlightSet::Selected(option as usize),
        Verdict::NoneMarked => HighlightSet::None,
        Verdict::AmbiguousMultiple => {
            let mut ranked: Vec<usize> = (0..fills.len()).collect();
            ranked.sort_by(|&a, &b| {
                fills[b]
                    .partial_cmp(&fills[a])
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.cmp(&b))
            });
            HighlightSet::Ambiguous(ranked.into_iter().take(2).collect())
        }
    }
}

/// Draws a region outline with the configured thickness, clipped to the
/// image bounds. Rectangular regions use hollow rects; polygonal regions are
/// traced edge by edge.
fn draw_region_outline(
    img: &mut RgbImage,
    region: &PixelRegion,
    color: Rgb<u8>,
    thickness: i32,
    bounds: (i32, i32),
) {
    match &region.polygon {
        Some(points) if points.len() >= 3 => {
            for i in 0..points.len() {
                let a = points[i];
                let b = points[(i + 1) % points.len()];
                draw_line_segment_mut(img, (a.x, a.y), (b.x, b.y), color);
            }
        }
        _ => {
            let rect = Rect::at(region.left as i32, region.top as i32)
                .of_size(region.width, region.height);
            for t in 0..thickness {
                let grown = Rect::at(rect.left() - t, rect.top() - t)
                    .of_size(rect.width() + (2 * t) as u32, rect.height() + (2 * t) as u32);
                if is_rect_in_bounds(&grown, bounds.0, bounds.1) {
                    draw_hollow_rect_mut(img, grown, color);
                }
            }
        }
    }
}

/// Checks that a rectangle lies fully inside the image.
fn is_rect_in_bounds(rect: &Rect, img_width: i32, img_height: i32) -> bool {
    rect.left() >= 0 && rect.top() >= 0 && rect.right() < img_width && rect.bottom() < img_height
}
