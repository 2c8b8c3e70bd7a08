//! Utility functions for image loading and conversion.
//!
//! This module provides functions for loading sheet images from files and
//! converting between color formats used by the pipeline. Decode failures
//! surface as typed errors so the batch runner can turn them into per-image
//! failure records.

use image::{DynamicImage, GrayImage, RgbImage, imageops};

use crate::core::errors::OmrError;

/// Converts a DynamicImage to an RgbImage.
pub fn dynamic_to_rgb(img: DynamicImage) -> RgbImage {
    img.to_rgb8()
}

/// Converts an RgbImage to an 8-bit grayscale image.
pub fn rgb_to_gray(img: &RgbImage) -> GrayImage {
    imageops::grayscale(img)
}

/// Loads an image from a file path and converts it to RgbImage.
///
/// # Arguments
///
/// * `path` - A reference to the path of the image file to load
///
/// # Errors
///
/// Returns an `OmrError::ImageLoad` error if the image cannot be decoded from
/// the specified path.
pub fn load_image(path: &std::path::Path) -> Result<RgbImage, OmrError> {
    let img = image::open(path).map_err(OmrError::ImageLoad)?;
    Ok(dynamic_to_rgb(img))
}

/// Loads a batch of images from file paths.
///
/// Uses parallel loading when the number of paths exceeds `parallel_threshold`.
///
/// # Errors
///
/// Returns an `OmrError` if any image cannot be loaded; callers wanting
/// per-image failure records should load individually instead.
pub fn load_images_batch<P: AsRef<std::path::Path> + Send + Sync>(
    paths: &[P],
    parallel_threshold: usize,
) -> Result<Vec<RgbImage>, OmrError> {
    if paths.len() > parallel_threshold {
        use rayon::prelude::*;
        paths.par_iter().map(|p| load_image(p.as_ref())).collect()
    } else {
        paths.iter().map(|p| load_image(p.as_ref())).collect()
    }
}
