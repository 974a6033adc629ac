use image::{GrayImage, RgbImage};

/// Reduce a color image to a single luminance channel
pub fn apply(image: &RgbImage) -> GrayImage {
    image::imageops::grayscale(image)
}
