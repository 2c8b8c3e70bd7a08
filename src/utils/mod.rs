//! Utility functions for image handling and diagnostic visualization.

pub mod image;
pub mod visualization;

pub use image::{dynamic_to_rgb, load_image, load_images_batch, rgb_to_gray};
pub use visualization::{OverlayConfig, render_overlay};
