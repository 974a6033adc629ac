use image::{GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::{close, open};

pub const FOREGROUND: u8 = 255;
pub const BACKGROUND: u8 = 0;

/// Inverted adaptive threshold against a Gaussian-weighted local mean.
///
/// A pixel is marked as stroke when it is at least `offset` darker than the
/// weighted mean of its `block_size` neighbourhood, so recessed or shadowed
/// strokes come out as foreground regardless of the overall exposure.
pub fn adaptive_inverse(image: &GrayImage, block_size: u32, offset: f32) -> GrayImage {
    let local_mean = gaussian_blur_f32(image, block_sigma(block_size));

    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let value = image.get_pixel(x, y).0[0] as f32;
        let threshold = local_mean.get_pixel(x, y).0[0] as f32 - offset;
        if value > threshold {
            Luma([BACKGROUND])
        } else {
            Luma([FOREGROUND])
        }
    })
}

/// Gaussian sigma whose support matches an odd `block_size` window
fn block_sigma(block_size: u32) -> f32 {
    0.3 * ((block_size as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Opening then closing with a square structuring element: drops isolated
/// speckle, then bridges hairline breaks inside strokes.
pub fn clean_mask(mask: &GrayImage, kernel_size: u32, iterations: u32) -> GrayImage {
    let radius = ((kernel_size / 2) * iterations).min(u8::MAX as u32) as u8;
    if radius == 0 {
        return mask.clone();
    }
    let opened = open(mask, Norm::LInf, radius);
    close(&opened, Norm::LInf, radius)
}

/// Share of pixels marked as foreground
pub fn coverage(mask: &GrayImage) -> f32 {
    let total = (mask.width() as u64 * mask.height() as u64).max(1);
    let on = mask.pixels().filter(|p| p.0[0] != BACKGROUND).count() as u64;
    on as f32 / total as f32
}
