use image::GrayImage;
use imageproc::filter::bilateral_filter;

/// Edge-preserving bilateral smoothing over a `diameter` x `diameter` window.
///
/// Weights fall off with spatial distance (`sigma_space`) and with intensity
/// difference from the center (`sigma_color`), so flat metal texture is
/// averaged away while stroke edges stay sharp.
pub fn bilateral(
    image: &GrayImage,
    diameter: u32,
    sigma_color: f32,
    sigma_space: f32,
) -> GrayImage {
    if image.width() == 0 || image.height() == 0 {
        return image.clone();
    }
    bilateral_filter(image, diameter.max(1), sigma_color, sigma_space)
}
