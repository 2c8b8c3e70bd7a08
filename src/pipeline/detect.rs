//! Mark detection.
//!
//! For each question, computes a fill fraction per option (share of pixels
//! within the option region classified as ink) and turns the fractions into a
//! verdict with two tunables: the fill threshold (minimum fraction to count
//! as marked at all) and the minimum margin (required gap between the top two
//! fractions to accept the top one as the sole answer).
//!
//! The classifier is the crux of whole-system accuracy, so its contract is
//! strict: it depends only on the question's own fill fractions and the two
//! tunables, it is deterministic for identical pixel input, ties among
//! non-top options never change the verdict, and it is monotonic — raising
//! the threshold can only turn marked verdicts into none-marked, raising the
//! margin can only turn single selections into ambiguous ones. Detection is a
//! pure function of the image and parameters; there are no retries.

use image::GrayImage;
use imageproc::contrast::otsu_level;
use itertools::Itertools;
use std::cmp::Ordering;

use crate::core::config::EvaluationConfig;
use crate::domain::answer::{Answer, AnswerSet, Verdict};
use crate::domain::geometry::PixelRegion;
use crate::pipeline::roi::ResolvedQuestion;

/// Classifies marks from per-option fill fractions.
#[derive(Debug, Clone, Copy)]
pub struct MarkDetector {
    fill_threshold: f32,
    min_margin: f32,
}

impl MarkDetector {
    /// Creates a detector from explicit tunables.
    pub fn new(fill_threshold: f32, min_margin: f32) -> Self {
        Self {
            fill_threshold,
            min_margin,
        }
    }

    /// Creates a detector from the run configuration.
    pub fn from_config(config: &EvaluationConfig) -> Self {
        Self::new(config.fill_threshold, config.min_margin)
    }

    /// Detects marks for every resolved question of one sheet.
    ///
    /// Ink classification uses a single global Otsu level computed from the
    /// grayscale image, so the result is deterministic for identical pixels.
    /// Each question's verdict depends only on its own option regions.
    pub fn detect(&self, gray: &GrayImage, questions: &[ResolvedQuestion]) -> AnswerSet {
        let level = otsu_level(gray);
        let answers = questions
            .iter()
            .map(|question| {
                let fills: Vec<f32> = question
                    .options
                    .iter()
                    .map(|region| fill_fraction(gray, level, region))
                    .collect();
                Answer {
                    question: question.index,
                    subject: question.subject.clone(),
                    verdict: self.classify(&fills),
                    fills,
                }
            })
            .collect();
        AnswerSet::new(answers)
    }

    /// Turns one question's fill fractions into a verdict.
    ///
    /// Options are ranked by fill fraction descending, ties broken by
    /// ascending option index so the result does not depend on the order of
    /// equal non-top options.
    pub fn classify(&self, fills: &[f32]) -> Verdict {
        let ranked: Vec<(usize, f32)> = fills
            .iter()
            .copied()
            .enumerate()
            .sorted_by(|a, b| {
                b.1.partial_cmp(&a.1)
                    .unwrap_or(Ordering::Equal)
                    .then(a.0.cmp(&b.0))
            })
            .collect();

        let Some(&(top_index, top_fill)) = ranked.first() else {
            return Verdict::NoneMarked;
        };
        if top_fill < self.fill_threshold {
            return Verdict::NoneMarked;
        }
        let second_fill = ranked.get(1).map(|&(_, f)| f).unwrap_or(0.0);
        if top_fill - second_fill < self.min_margin {
            return Verdict::AmbiguousMultiple;
        }
        Verdict::Selected(top_index as u8)
    }
}

/// Fraction of a region's pixels at or below the ink level.
///
/// Empty regions (options resolved outside the image) read as unfilled.
fn fill_fraction(gray: &GrayImage, level: u8, region: &PixelRegion) -> f32 {
    if region.is_empty() {
        return 0.0;
    }
    let (img_w, img_h) = gray.dimensions();
    let right = (region.left + region.width).min(img_w);
    let bottom = (region.top + region.height).min(img_h);

    let mut inside: u32 = 0;
    let mut dark: u32 = 0;
    for y in region.top.min(img_h)..bottom {
        for x in region.left.min(img_w)..right {
            if region.contains(x, y) {
                inside += 1;
                if gray.get_pixel(x, y)[0] <= level {
                    dark += 1;
                }
            }
        }
    }
    if inside == 0 {
        0.0
    } else {
        dark as f32 / inside as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn detector() -> MarkDetector {
        MarkDetector::new(0.45, 0.12)
    }

    #[test]
    fn clear_single_mark_is_selected() {
        // Top 0.80, runner-up 0.10: well past threshold and margin.
        assert_eq!(
            detector().classify(&[0.80, 0.10, 0.05]),
            Verdict::Selected(0)
        );
    }

    #[test]
    fn close_top_two_are_ambiguous() {
        // Margin 0.04 < 0.12.
        assert_eq!(
            detector().classify(&[0.50, 0.46, 0.02]),
            Verdict::AmbiguousMultiple
        );
    }

    #[test]
    fn faint_marks_are_none() {
        // Top 0.30 < threshold 0.45.
        assert_eq!(detector().classify(&[0.30, 0.20]), Verdict::NoneMarked);
    }

    #[test]
    fn selection_is_not_always_option_zero() {
        assert_eq!(
            detector().classify(&[0.05, 0.10, 0.85, 0.02]),
            Verdict::Selected(2)
        );
    }

    #[test]
    fn ties_among_non_top_options_are_irrelevant() {
        let verdict = detector().classify(&[0.80, 0.10, 0.10, 0.10]);
        assert_eq!(verdict, Verdict::Selected(0));
        // Permuting the equal tail cannot change the verdict.
        let verdict = detector().classify(&[0.80, 0.10, 0.10, 0.10]);
        assert_eq!(verdict, Verdict::Selected(0));
    }

    #[test]
    fn exact_tie_at_the_top_is_ambiguous() {
        assert_eq!(
            detector().classify(&[0.60, 0.60]),
            Verdict::AmbiguousMultiple
        );
    }

    #[test]
    fn empty_fill_list_is_none_marked() {
        assert_eq!(detector().classify(&[]), Verdict::NoneMarked);
    }

    #[test]
    fn raising_threshold_only_unmarks() {
        let fills = [0.50, 0.20, 0.10];
        let lenient = MarkDetector::new(0.30, 0.12).classify(&fills);
        let strict = MarkDetector::new(0.60, 0.12).classify(&fills);
        assert_eq!(lenient, Verdict::Selected(0));
        assert_eq!(strict, Verdict::NoneMarked);

        // Sweep: once none-marked, higher thresholds stay none-marked.
        let mut seen_none = false;
        for step in 0..20 {
            let threshold = 0.05 + step as f32 * 0.045;
            let verdict = MarkDetector::new(threshold, 0.12).classify(&fills);
            if seen_none {
                assert_eq!(verdict, Verdict::NoneMarked);
            }
            seen_none = verdict == Verdict::NoneMarked;
        }
    }

    #[test]
    fn raising_margin_only_makes_ambiguous() {
        let fills = [0.70, 0.50, 0.10];
        let tight = MarkDetector::new(0.45, 0.05).classify(&fills);
        let wide = MarkDetector::new(0.45, 0.30).classify(&fills);
        assert_eq!(tight, Verdict::Selected(0));
        assert_eq!(wide, Verdict::AmbiguousMultiple);

        let mut seen_ambiguous = false;
        for step in 0..20 {
            let margin = step as f32 * 0.05;
            let verdict = MarkDetector::new(0.45, margin).classify(&fills);
            if seen_ambiguous {
                assert_eq!(verdict, Verdict::AmbiguousMultiple);
            }
            seen_ambiguous = verdict == Verdict::AmbiguousMultiple;
        }
    }

    /// Builds a white image with two questions of two options each, filling
    /// the requested options solid black.
    fn sheet_with_marks(filled: &[(usize, usize)]) -> (GrayImage, Vec<ResolvedQuestion>) {
        let mut gray = GrayImage::from_pixel(100, 100, Luma([255]));
        let region = |left, top| PixelRegion {
            left,
            top,
            width: 10,
            height: 10,
            polygon: None,
        };
        let questions = vec![
            ResolvedQuestion {
                index: 0,
                subject: "Python".to_string(),
                options: vec![region(10, 10), region(30, 10)],
            },
            ResolvedQuestion {
                index: 1,
                subject: "Python".to_string(),
                options: vec![region(10, 40), region(30, 40)],
            },
        ];
        for &(q, o) in filled {
            let r = &questions[q].options[o];
            for y in r.top..r.top + r.height {
                for x in r.left..r.left + r.width {
                    gray.put_pixel(x, y, Luma([0]));
                }
            }
        }
        (gray, questions)
    }

    #[test]
    fn detect_reads_filled_bubbles() {
        let (gray, questions) = sheet_with_marks(&[(0, 1)]);
        let answers = detector().detect(&gray, &questions);
        assert_eq!(answers.len(), 2);
        assert_eq!(answers.answers[0].verdict, Verdict::Selected(1));
        assert_eq!(answers.answers[1].verdict, Verdict::NoneMarked);
        assert!(answers.answers[0].fills[1] > 0.9);
        assert!(answers.answers[0].fills[0] < 0.1);
    }

    #[test]
    fn double_mark_is_ambiguous() {
        let (gray, questions) = sheet_with_marks(&[(0, 0), (0, 1)]);
        let answers = detector().detect(&gray, &questions);
        assert_eq!(answers.answers[0].verdict, Verdict::AmbiguousMultiple);
    }

    #[test]
    fn verdicts_are_isolated_between_questions() {
        // Question 0's verdict must not change when question 1's marks do.
        let (gray_a, questions) = sheet_with_marks(&[(0, 0)]);
        let (gray_b, _) = sheet_with_marks(&[(0, 0), (1, 1)]);
        let a = detector().detect(&gray_a, &questions);
        let b = detector().detect(&gray_b, &questions);
        assert_eq!(a.answers[0].verdict, b.answers[0].verdict);
        assert_eq!(a.answers[0].fills, b.answers[0].fills);
    }

    #[test]
    fn detection_is_idempotent() {
        let (gray, questions) = sheet_with_marks(&[(0, 0), (1, 1)]);
        let first = detector().detect(&gray, &questions);
        let second = detector().detect(&gray, &questions);
        assert_eq!(first, second);
    }

    #[test]
    fn empty_regions_read_as_unfilled() {
        let gray = GrayImage::from_pixel(50, 50, Luma([0]));
        let fraction = fill_fraction(&gray, 128, &PixelRegion::empty());
        assert_eq!(fraction, 0.0);
    }
}
