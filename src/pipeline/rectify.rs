//! Perspective rectification.
//!
//! Locates the sheet boundary in the oriented image and warps it onto a
//! fixed canonical frame, so that ROI geometry (normalized to that frame)
//! samples the right pixels even on skewed photographs. The stage is
//! best-effort and non-fatal: every confidence gate that fails returns the
//! input unchanged, because a degenerate warp would silently corrupt every
//! downstream sample, which is worse than no warp at all.
//!
//! Corner detection: Otsu-binarize the blurred grayscale (a lit sheet is the
//! bright foreground), trace contours, take the one with the largest bounding
//! area, and pick its four extremal points by the coordinate sum/difference
//! rule. The quad must be convex, cover a reasonable share of the image, and
//! have well-separated corners before a projective transform is accepted.

use image::{Rgb, RgbImage};
use imageproc::contours::find_contours;
use imageproc::contrast::{ThresholdType, otsu_level, threshold};
use imageproc::filter::gaussian_blur_f32;
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::geometry::Point;
use crate::utils::image::rgb_to_gray;

/// Width of the canonical rectified sheet frame, in pixels.
pub const CANONICAL_WIDTH: u32 = 1240;
/// Height of the canonical rectified sheet frame, in pixels.
pub const CANONICAL_HEIGHT: u32 = 1754;

/// Minimum input side length for rectification to be attempted.
const MIN_RECTIFY_DIM: u32 = 64;
/// Minimum share of the image area the detected quad must cover.
const MIN_QUAD_AREA_FRACTION: f32 = 0.2;
/// Minimum pairwise corner distance, as a fraction of the smaller image side.
const MIN_CORNER_SEPARATION: f32 = 0.05;
/// Gaussian blur sigma applied before thresholding.
const BLUR_SIGMA: f32 = 1.4;

/// Whether rectification was applied or skipped for an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RectifyOutcome {
    /// The sheet boundary was found and the image warped to the canonical
    /// frame.
    Applied,
    /// Detection was not confident; the image passed through unchanged.
    Skipped,
}

/// Rectifies the sheet onto the canonical frame, best effort.
///
/// Returns the rectified image (or an unchanged clone) together with the
/// outcome. Never fails.
pub fn rectify_perspective(image: &RgbImage) -> (RgbImage, RectifyOutcome) {
    match detect_sheet_corners(image) {
        Some(corners) => match warp_to_canonical(image, &corners) {
            Some(rectified) => (rectified, RectifyOutcome::Applied),
            None => {
                debug!("projective transform rejected; keeping original image");
                (image.clone(), RectifyOutcome::Skipped)
            }
        },
        None => (image.clone(), RectifyOutcome::Skipped),
    }
}

/// Detects the four sheet corners, ordered top-left, top-right,
/// bottom-right, bottom-left.
///
/// Returns None whenever any confidence gate fails.
pub fn detect_sheet_corners(image: &RgbImage) -> Option<[Point; 4]> {
    let (width, height) = image.dimensions();
    if width < MIN_RECTIFY_DIM || height < MIN_RECTIFY_DIM {
        debug!("image {}x{} too small for rectification", width, height);
        return None;
    }

    let gray = rgb_to_gray(image);
    let blurred = gaussian_blur_f32(&gray, BLUR_SIGMA);
    let level = otsu_level(&blurred);
    let binary = threshold(&blurred, level, ThresholdType::Binary);

    let contours = find_contours::<u32>(&binary);
    let sheet = contours
        .iter()
        .filter(|c| c.points.len() >= 4)
        .max_by_key(|c| contour_bounding_area(&c.points))?;

    let corners = extremal_corners(&sheet.points);

    let min_side = width.min(height) as f32;
    let min_separation = min_side * MIN_CORNER_SEPARATION;
    for i in 0..4 {
        for j in (i + 1)..4 {
            if distance(corners[i], corners[j]) < min_separation {
                debug!("sheet corners too close together; skipping rectification");
                return None;
            }
        }
    }

    if !is_convex(&corners) {
        debug!("detected boundary is not convex; skipping rectification");
        return None;
    }

    let quad_area = quad_area(&corners);
    let image_area = width as f32 * height as f32;
    if quad_area < image_area * MIN_QUAD_AREA_FRACTION {
        debug!(
            "sheet quad covers {:.1}% of the image, below the {:.0}% gate",
            100.0 * quad_area / image_area,
            100.0 * MIN_QUAD_AREA_FRACTION
        );
        return None;
    }

    Some(corners)
}

/// Warps the detected quad onto the canonical frame.
fn warp_to_canonical(image: &RgbImage, corners: &[Point; 4]) -> Option<RgbImage> {
    let from = [
        (corners[0].x, corners[0].y),
        (corners[1].x, corners[1].y),
        (corners[2].x, corners[2].y),
        (corners[3].x, corners[3].y),
    ];
    let to = [
        (0.0, 0.0),
        (CANONICAL_WIDTH as f32, 0.0),
        (CANONICAL_WIDTH as f32, CANONICAL_HEIGHT as f32),
        (0.0, CANONICAL_HEIGHT as f32),
    ];
    let projection = Projection::from_control_points(from, to)?;

    let mut rectified = RgbImage::new(CANONICAL_WIDTH, CANONICAL_HEIGHT);
    warp_into(
        image,
        &projection,
        Interpolation::Bilinear,
        Rgb([255, 255, 255]),
        &mut rectified,
    );
    Some(rectified)
}

/// Bounding-box area of a contour, used to select the sheet outline.
fn contour_bounding_area(points: &[imageproc::point::Point<u32>]) -> u64 {
    let (mut min_x, mut max_x, mut min_y, mut max_y) = (u32::MAX, 0u32, u32::MAX, 0u32);
    for p in points {
        min_x = min_x.min(p.x);
        max_x = max_x.max(p.x);
        min_y = min_y.min(p.y);
        max_y = max_y.max(p.y);
    }
    (max_x.saturating_sub(min_x) as u64) * (max_y.saturating_sub(min_y) as u64)
}

/// Picks the four extremal contour points by the sum/difference rule:
/// top-left minimizes x + y, bottom-right maximizes it, top-right maximizes
/// x - y, bottom-left minimizes it. Ties keep the first point encountered,
/// so the result is deterministic.
fn extremal_corners(points: &[imageproc::point::Point<u32>]) -> [Point; 4] {
    let mut tl = points[0];
    let mut tr = points[0];
    let mut br = points[0];
    let mut bl = points[0];
    for &p in points {
        let sum = p.x as i64 + p.y as i64;
        let diff = p.x as i64 - p.y as i64;
        if sum < tl.x as i64 + tl.y as i64 {
            tl = p;
        }
        if sum > br.x as i64 + br.y as i64 {
            br = p;
        }
        if diff > tr.x as i64 - tr.y as i64 {
            tr = p;
        }
        if diff < bl.x as i64 - bl.y as i64 {
            bl = p;
        }
    }
    [
        Point::new(tl.x as f32, tl.y as f32),
        Point::new(tr.x as f32, tr.y as f32),
        Point::new(br.x as f32, br.y as f32),
        Point::new(bl.x as f32, bl.y as f32),
    ]
}

/// Euclidean distance between two points.
fn distance(a: Point, b: Point) -> f32 {
    ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt()
}

/// Checks that the ordered quad is convex: all edge cross products share a
/// sign.
fn is_convex(corners: &[Point; 4]) -> bool {
    let mut sign = 0.0f32;
    for i in 0..4 {
        let a = corners[i];
        let b = corners[(i + 1) % 4];
        let c = corners[(i + 2) % 4];
        let cross = (b.x - a.x) * (c.y - b.y) - (b.y - a.y) * (c.x - b.x);
        if cross == 0.0 {
            return false;
        }
        if sign == 0.0 {
            sign = cross.signum();
        } else if cross.signum() != sign {
            return false;
        }
    }
    true
}

/// Shoelace area of the ordered quad.
fn quad_area(corners: &[Point; 4]) -> f32 {
    let mut area = 0.0;
    for i in 0..4 {
        let j = (i + 1) % 4;
        area += corners[i].x * corners[j].y;
        area -= corners[j].x * corners[i].y;
    }
    area.abs() / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use imageproc::drawing::draw_polygon_mut;
    use imageproc::point::Point as IPoint;

    /// Dark background with a bright, slightly rotated sheet quad.
    fn skewed_sheet() -> RgbImage {
        let mut img = RgbImage::from_pixel(400, 400, Rgb([20, 20, 20]));
        let quad = [
            IPoint::new(60i32, 40),
            IPoint::new(350, 70),
            IPoint::new(330, 360),
            IPoint::new(50, 330),
        ];
        draw_polygon_mut(&mut img, &quad, Rgb([245, 245, 245]));
        img
    }

    #[test]
    fn rectifies_a_skewed_sheet_to_canonical_frame() {
        let img = skewed_sheet();
        let (rectified, outcome) = rectify_perspective(&img);
        assert_eq!(outcome, RectifyOutcome::Applied);
        assert_eq!(rectified.dimensions(), (CANONICAL_WIDTH, CANONICAL_HEIGHT));
        // The canonical center lands well inside the bright sheet.
        let center = rectified.get_pixel(CANONICAL_WIDTH / 2, CANONICAL_HEIGHT / 2);
        assert!(center[0] > 200);
    }

    #[test]
    fn corners_are_ordered_clockwise_from_top_left() {
        let img = skewed_sheet();
        let corners = detect_sheet_corners(&img).unwrap();
        assert!(corners[0].x < corners[1].x);
        assert!(corners[0].y < corners[3].y);
        assert!(corners[2].x > corners[3].x);
        assert!(corners[2].y > corners[1].y);
    }

    #[test]
    fn featureless_image_is_passed_through() {
        let img = RgbImage::from_pixel(200, 200, Rgb([0, 0, 0]));
        let (out, outcome) = rectify_perspective(&img);
        assert_eq!(outcome, RectifyOutcome::Skipped);
        assert_eq!(out, img);
    }

    #[test]
    fn tiny_image_is_passed_through() {
        let img = RgbImage::from_pixel(32, 32, Rgb([255, 255, 255]));
        let (out, outcome) = rectify_perspective(&img);
        assert_eq!(outcome, RectifyOutcome::Skipped);
        assert_eq!(out.dimensions(), (32, 32));
    }

    #[test]
    fn small_bright_blob_fails_the_area_gate() {
        let mut img = RgbImage::from_pixel(400, 400, Rgb([10, 10, 10]));
        let quad = [
            IPoint::new(180i32, 180),
            IPoint::new(220, 180),
            IPoint::new(220, 220),
            IPoint::new(180, 220),
        ];
        draw_polygon_mut(&mut img, &quad, Rgb([250, 250, 250]));
        let (_, outcome) = rectify_perspective(&img);
        assert_eq!(outcome, RectifyOutcome::Skipped);
    }

    #[test]
    fn convexity_check_rejects_crossed_quads() {
        let convex = [
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
        ];
        assert!(is_convex(&convex));
        let crossed = [
            Point::new(0.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(10.0, 0.0),
            Point::new(0.0, 10.0),
        ];
        assert!(!is_convex(&crossed));
    }

    #[test]
    fn quad_area_matches_rectangle() {
        let quad = [
            Point::new(0.0, 0.0),
            Point::new(4.0, 0.0),
            Point::new(4.0, 3.0),
            Point::new(0.0, 3.0),
        ];
        assert!((quad_area(&quad) - 12.0).abs() < 1e-4);
    }
}
