use image::{GrayImage, Luma};
use imageproc::filter::gaussian_blur_f32;

/// Unsharp masking: `amount * image - blur_weight * gaussian(image, sigma)`,
/// saturated to the 8-bit range.
pub fn unsharp(image: &GrayImage, sigma: f32, amount: f32, blur_weight: f32) -> GrayImage {
    let blurred = gaussian_blur_f32(image, sigma);

    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let original = image.get_pixel(x, y).0[0] as f32;
        let soft = blurred.get_pixel(x, y).0[0] as f32;
        let value = amount * original - blur_weight * soft;
        Luma([value.round().clamp(0.0, 255.0) as u8])
    })
}
