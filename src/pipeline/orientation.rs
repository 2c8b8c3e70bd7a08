//! Orientation normalization.
//!
//! Photographed sheets frequently arrive rotated by a multiple of 90° (the
//! capture device was held sideways or upside down). This stage detects that
//! coarse rotation from image content and undoes it before any
//! geometry-dependent step runs. It only ever chooses among the four
//! right-angle rotations; arbitrary skew is the perspective rectifier's job.
//!
//! Detection is a deterministic two-step vote: the dark-ink row/column
//! profile variances decide upright vs sideways (bubble rows leave a strongly
//! striped profile along the reading axis), then the ink-mass balance picks
//! the member of the pair (the bubble field outweighs the header band). Any
//! sub-decision short of its dominance margin falls back to the identity —
//! orientation correction never aborts the pipeline.

use image::{GrayImage, RgbImage, imageops};
use imageproc::contrast::otsu_level;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::utils::image::rgb_to_gray;

/// Images whose largest side exceeds this are downscaled before analysis.
const DETECT_MAX_DIM: u32 = 512;
/// Minimum image side length for detection to be attempted.
const MIN_DETECT_DIM: u32 = 16;
/// How much one profile variance must dominate the other to call the axis.
const VARIANCE_DOMINANCE: f32 = 1.15;
/// How much one half's ink mass must dominate the other to pick a direction.
const MASS_DOMINANCE: f32 = 1.10;

/// A right-angle rotation correction.
///
/// The variant names the rotation *applied* to normalize the image: `R90`
/// means the sheet needs a 90° clockwise turn to come upright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rotation {
    /// Image is already upright.
    R0,
    /// Rotate 90° clockwise to normalize.
    R90,
    /// Rotate 180° to normalize.
    R180,
    /// Rotate 270° clockwise to normalize.
    R270,
}

impl Rotation {
    /// The correction angle in degrees.
    pub fn degrees(&self) -> u32 {
        match self {
            Self::R0 => 0,
            Self::R90 => 90,
            Self::R180 => 180,
            Self::R270 => 270,
        }
    }

    /// Applies the rotation, producing a new image buffer.
    ///
    /// `R0` returns a clone; the pipeline never mutates input images in
    /// place.
    pub fn apply(&self, image: &RgbImage) -> RgbImage {
        match self {
            Self::R0 => image.clone(),
            Self::R90 => imageops::rotate90(image),
            Self::R180 => imageops::rotate180(image),
            Self::R270 => imageops::rotate270(image),
        }
    }
}

impl std::fmt::Display for Rotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// Detects the right-angle rotation needed to bring a sheet upright.
///
/// Deterministic for a given input. Returns `Rotation::R0` whenever the
/// content gives no confident signal.
pub fn detect_orientation(image: &RgbImage) -> Rotation {
    let (width, height) = image.dimensions();
    if width < MIN_DETECT_DIM || height < MIN_DETECT_DIM {
        debug!("image {}x{} too small for orientation analysis", width, height);
        return Rotation::R0;
    }

    let gray = analysis_gray(image);
    let profiles = match InkProfiles::measure(&gray) {
        Some(profiles) => profiles,
        None => {
            debug!("no usable ink signal; keeping orientation as-is");
            return Rotation::R0;
        }
    };

    let rotation = profiles.vote();
    debug!(
        "orientation vote: row_var={:.5} col_var={:.5} -> {}",
        profiles.row_variance, profiles.col_variance, rotation
    );
    rotation
}

/// Corrects coarse rotation, returning the new image and the applied
/// correction.
pub fn normalize_orientation(image: &RgbImage) -> (RgbImage, Rotation) {
    let rotation = detect_orientation(image);
    (rotation.apply(image), rotation)
}

/// Grayscale copy of the image, downscaled for analysis when large.
fn analysis_gray(image: &RgbImage) -> GrayImage {
    let (width, height) = image.dimensions();
    let max_dim = width.max(height);
    if max_dim <= DETECT_MAX_DIM {
        return rgb_to_gray(image);
    }
    let scale = DETECT_MAX_DIM as f32 / max_dim as f32;
    let new_w = ((width as f32 * scale) as u32).max(1);
    let new_h = ((height as f32 * scale) as u32).max(1);
    let small = imageops::resize(image, new_w, new_h, imageops::FilterType::Triangle);
    rgb_to_gray(&small)
}

/// Dark-ink distribution statistics of the analysis image.
struct InkProfiles {
    row_variance: f32,
    col_variance: f32,
    top_mass: u64,
    bottom_mass: u64,
    left_mass: u64,
    right_mass: u64,
}

impl InkProfiles {
    /// Measures ink profiles; None when the image is effectively featureless.
    fn measure(gray: &GrayImage) -> Option<Self> {
        let (width, height) = gray.dimensions();
        let level = otsu_level(gray);
        let mut row_counts = vec![0u32; height as usize];
        let mut col_counts = vec![0u32; width as usize];
        let mut dark_total: u64 = 0;

        for (x, y, pixel) in gray.enumerate_pixels() {
            if pixel[0] <= level {
                row_counts[y as usize] += 1;
                col_counts[x as usize] += 1;
                dark_total += 1;
            }
        }

        let pixel_total = width as u64 * height as u64;
        let dark_fraction = dark_total as f32 / pixel_total as f32;
        if !(0.005..=0.995).contains(&dark_fraction) {
            return None;
        }

        let row_profile: Vec<f32> = row_counts
            .iter()
            .map(|&c| c as f32 / width as f32)
            .collect();
        let col_profile: Vec<f32> = col_counts
            .iter()
            .map(|&c| c as f32 / height as f32)
            .collect();

        let half_h = height as usize / 2;
        let half_w = width as usize / 2;
        let top_mass: u64 = row_counts[..half_h].iter().map(|&c| c as u64).sum();
        let bottom_mass: u64 = row_counts[half_h..].iter().map(|&c| c as u64).sum();
        let left_mass: u64 = col_counts[..half_w].iter().map(|&c| c as u64).sum();
        let right_mass: u64 = col_counts[half_w..].iter().map(|&c| c as u64).sum();

        Some(Self {
            row_variance: variance(&row_profile),
            col_variance: variance(&col_profile),
            top_mass,
            bottom_mass,
            left_mass,
            right_mass,
        })
    }

    /// Resolves the rotation vote from the measured statistics.
    fn vote(&self) -> Rotation {
        if self.col_variance > self.row_variance * VARIANCE_DOMINANCE {
            // Striping runs along columns: the sheet lies sideways. The
            // bubble field (heavy half) tells which way it fell.
            if self.left_mass as f32 >= self.right_mass as f32 * MASS_DOMINANCE {
                Rotation::R270
            } else if self.right_mass as f32 >= self.left_mass as f32 * MASS_DOMINANCE {
                Rotation::R90
            } else {
                debug!("sideways signal without a confident direction; keeping 0°");
                Rotation::R0
            }
        } else if self.row_variance > self.col_variance * VARIANCE_DOMINANCE {
            if self.bottom_mass as f32 >= self.top_mass as f32 * MASS_DOMINANCE {
                Rotation::R0
            } else if self.top_mass as f32 >= self.bottom_mass as f32 * MASS_DOMINANCE {
                Rotation::R180
            } else {
                Rotation::R0
            }
        } else {
            Rotation::R0
        }
    }
}

/// Population variance of a profile.
fn variance(profile: &[f32]) -> f32 {
    if profile.is_empty() {
        return 0.0;
    }
    let mean = profile.iter().sum::<f32>() / profile.len() as f32;
    profile
        .iter()
        .map(|v| {
            let d = v - mean;
            d * d
        })
        .sum::<f32>()
        / profile.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    /// White portrait sheet with full-width dark stripes in its lower part,
    /// mimicking bubble rows below a header band.
    fn upright_sheet() -> RgbImage {
        let mut img = RgbImage::from_pixel(200, 280, Rgb([255, 255, 255]));
        let mut y = 120;
        while y + 4 < 270 {
            for yy in y..y + 4 {
                for x in 10..190 {
                    img.put_pixel(x, yy, Rgb([0, 0, 0]));
                }
            }
            y += 12;
        }
        img
    }

    #[test]
    fn upright_sheet_needs_no_correction() {
        assert_eq!(detect_orientation(&upright_sheet()), Rotation::R0);
    }

    #[test]
    fn recovers_180_degree_capture() {
        let sheet = upright_sheet();
        let captured = imageops::rotate180(&sheet);
        let rotation = detect_orientation(&captured);
        assert_eq!(rotation, Rotation::R180);
        assert_eq!(rotation.apply(&captured), sheet);
    }

    #[test]
    fn recovers_sideways_captures() {
        let sheet = upright_sheet();

        // Captured 90° clockwise: undone by a 270° turn.
        let captured = imageops::rotate90(&sheet);
        let rotation = detect_orientation(&captured);
        assert_eq!(rotation, Rotation::R270);
        assert_eq!(rotation.apply(&captured), sheet);

        // Captured 90° counter-clockwise: undone by a 90° turn.
        let captured = imageops::rotate270(&sheet);
        let rotation = detect_orientation(&captured);
        assert_eq!(rotation, Rotation::R90);
        assert_eq!(rotation.apply(&captured), sheet);
    }

    #[test]
    fn featureless_image_falls_back_to_identity() {
        let img = RgbImage::from_pixel(100, 140, Rgb([255, 255, 255]));
        assert_eq!(detect_orientation(&img), Rotation::R0);
        let img = RgbImage::from_pixel(100, 140, Rgb([0, 0, 0]));
        assert_eq!(detect_orientation(&img), Rotation::R0);
    }

    #[test]
    fn tiny_image_falls_back_to_identity() {
        let img = RgbImage::from_pixel(8, 8, Rgb([0, 0, 0]));
        assert_eq!(detect_orientation(&img), Rotation::R0);
    }

    #[test]
    fn detection_is_deterministic() {
        let sheet = imageops::rotate90(&upright_sheet());
        let first = detect_orientation(&sheet);
        for _ in 0..3 {
            assert_eq!(detect_orientation(&sheet), first);
        }
    }

    #[test]
    fn normalize_returns_new_buffer() {
        let sheet = upright_sheet();
        let (normalized, rotation) = normalize_orientation(&sheet);
        assert_eq!(rotation, Rotation::R0);
        assert_eq!(normalized, sheet);
    }
}
