use crate::error::PreprocessError;
use image::{imageops::FilterType, RgbImage};

/// Output dimensions for a `width` x `height` input.
///
/// The larger side is clamped into `[min_max_dim, target_max_dim]` with the
/// aspect ratio kept; images already inside that band are left alone. A
/// target below `min_max_dim` caps the lower bound as well.
pub fn target_dimensions(
    width: u32,
    height: u32,
    min_max_dim: u32,
    target_max_dim: u32,
) -> (u32, u32) {
    let max_dim = width.max(height);
    let min_max_dim = min_max_dim.min(target_max_dim);

    let bound = if max_dim > target_max_dim {
        target_max_dim
    } else if max_dim < min_max_dim {
        min_max_dim
    } else {
        return (width, height);
    };

    let scale = bound as f64 / max_dim as f64;
    let scaled = |side: u32| {
        if side == max_dim {
            bound
        } else {
            ((side as f64 * scale).round() as u32).max(1)
        }
    };
    (scaled(width), scaled(height))
}

/// Resize with linear interpolation so the larger side lands inside the
/// configured band
pub fn apply(
    image: &RgbImage,
    min_max_dim: u32,
    target_max_dim: u32,
) -> Result<RgbImage, PreprocessError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(PreprocessError::stage("resize", "image has zero dimension"));
    }

    let (new_width, new_height) = target_dimensions(width, height, min_max_dim, target_max_dim);
    if (new_width, new_height) == (width, height) {
        return Ok(image.clone());
    }

    tracing::debug!(
        "Resizing {}x{} -> {}x{}",
        width,
        height,
        new_width,
        new_height
    );
    Ok(image::imageops::resize(
        image,
        new_width,
        new_height,
        FilterType::Triangle,
    ))
}
