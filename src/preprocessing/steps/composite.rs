use crate::error::PreprocessError;
use image::{GrayImage, Rgb, RgbImage};

const PAPER: Rgb<u8> = Rgb([255, 255, 255]);

/// Paste `color` onto a white canvas using `mask` as per-pixel opacity.
///
/// Where the mask is 0 the output is pure white; where it is 255 the
/// source pixel is copied unchanged. Everything outside the detected
/// strokes (bolts, scratches, machining marks) is thereby blanked out.
pub fn paste_on_white(color: &RgbImage, mask: &GrayImage) -> Result<RgbImage, PreprocessError> {
    if color.dimensions() != mask.dimensions() {
        return Err(PreprocessError::stage(
            "composite",
            format!(
                "mask is {}x{} but image is {}x{}",
                mask.width(),
                mask.height(),
                color.width(),
                color.height()
            ),
        ));
    }

    Ok(RgbImage::from_fn(color.width(), color.height(), |x, y| {
        match mask.get_pixel(x, y).0[0] {
            0 => PAPER,
            255 => *color.get_pixel(x, y),
            alpha => {
                let a = alpha as u32;
                let src = color.get_pixel(x, y).0;
                let blend = |c: u8| ((c as u32 * a + 255 * (255 - a) + 127) / 255) as u8;
                Rgb([blend(src[0]), blend(src[1]), blend(src[2])])
            }
        }
    }))
}
