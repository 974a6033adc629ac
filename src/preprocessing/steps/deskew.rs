use crate::preprocessing::geometry::{min_area_rect, RotatedRect};
use image::{imageops, GrayImage, Rgb, RgbImage};
use imageproc::contours::{find_contours, BorderType};
use imageproc::geometric_transformations::{warp_with, Interpolation};
use imageproc::geometry::contour_area;
use serde::Serialize;

/// Skew of the dominant stroke region
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SkewEstimate {
    /// Normalized skew in degrees, image coordinates (positive = clockwise)
    pub angle_deg: f32,
    /// Raw rectangle orientation before normalization, in [-90, 0)
    pub raw_angle_deg: f32,
    pub contour_area: f64,
    pub area_fraction: f64,
    pub rect: RotatedRect,
}

/// Estimate skew from the largest external contour of `mask`.
///
/// Returns `None` when the mask holds no contour or the largest one covers
/// no more than `min_area_fraction` of the image; such masks carry no text
/// region worth aligning to.
pub fn estimate(mask: &GrayImage, min_area_fraction: f64) -> Option<SkewEstimate> {
    let total_area = mask.width() as f64 * mask.height() as f64;
    if total_area == 0.0 {
        return None;
    }

    let contours = find_contours::<i32>(mask);
    let (points, area) = contours
        .iter()
        .filter(|c| c.parent.is_none() && matches!(c.border_type, BorderType::Outer))
        .map(|c| (&c.points, contour_area(&c.points)))
        .max_by(|a, b| a.1.total_cmp(&b.1))?;

    let area_fraction = area / total_area;
    if area_fraction <= min_area_fraction {
        tracing::debug!(
            "Largest contour covers {:.4} of image, below {:.4}; skipping deskew",
            area_fraction,
            min_area_fraction
        );
        return None;
    }

    let rect = min_area_rect(points)?;
    let raw_angle_deg = rect.angle_deg as f32;

    Some(SkewEstimate {
        angle_deg: normalize_angle(raw_angle_deg),
        raw_angle_deg,
        contour_area: area,
        area_fraction,
        rect,
    })
}

/// Fold a rectangle orientation from the [-90, 0) convention into
/// [-45, 45): angles steeper than -45 describe the other pair of edges.
pub fn normalize_angle(raw_deg: f32) -> f32 {
    if raw_deg < -45.0 {
        raw_deg + 90.0
    } else {
        raw_deg
    }
}

/// Whether a normalized skew is large enough to correct
pub fn needs_rotation(angle_deg: f32, min_angle_deg: f32) -> bool {
    angle_deg.abs() > min_angle_deg
}

/// Rotate `image` about its center by `degrees` (positive = clockwise in
/// image coordinates), keeping the canvas size. Samples falling outside the
/// source repeat the nearest edge pixel.
pub fn rotate_replicate(image: &RgbImage, degrees: f32) -> RgbImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }

    // Bilinear sampling needs a right and bottom neighbour for every source
    // position, so sample from a copy framed by one replicated pixel.
    let padded = pad_replicate(image);
    let (sin, cos) = degrees.to_radians().sin_cos();
    let cx = width as f32 / 2.0;
    let cy = height as f32 / 2.0;
    let max_x = (width - 1) as f32;
    let max_y = (height - 1) as f32;

    let rotated = warp_with(
        &padded,
        |x, y| {
            let dx = x - cx;
            let dy = y - cy;
            let sx = (cos * dx + sin * dy + cx).clamp(0.0, max_x);
            let sy = (-sin * dx + cos * dy + cy).clamp(0.0, max_y);
            (sx + 1.0, sy + 1.0)
        },
        Interpolation::Bilinear,
        Rgb([255, 255, 255]),
    );

    // Output canvas matches the padded input; only the top-left region is ours
    imageops::crop_imm(&rotated, 0, 0, width, height).to_image()
}

fn pad_replicate(image: &RgbImage) -> RgbImage {
    let (width, height) = image.dimensions();
    RgbImage::from_fn(width + 2, height + 2, |x, y| {
        let sx = x.saturating_sub(1).min(width - 1);
        let sy = y.saturating_sub(1).min(height - 1);
        *image.get_pixel(sx, sy)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    /// Filled rectangle mask rotated clockwise by `deg` about its center
    fn rotated_block(w: u32, h: u32, bw: f32, bh: f32, deg: f32) -> GrayImage {
        let (s, c) = deg.to_radians().sin_cos();
        let (cx, cy) = (w as f32 / 2.0, h as f32 / 2.0);
        GrayImage::from_fn(w, h, |x, y| {
            let dx = x as f32 - cx;
            let dy = y as f32 - cy;
            let u = c * dx + s * dy;
            let v = -s * dx + c * dy;
            if u.abs() <= bw / 2.0 && v.abs() <= bh / 2.0 {
                Luma([255])
            } else {
                Luma([0])
            }
        })
    }

    #[test]
    fn test_normalize_angle() {
        assert_eq!(normalize_angle(-60.0), 30.0);
        assert_eq!(normalize_angle(-30.0), -30.0);
        assert_eq!(normalize_angle(10.0), 10.0);
        assert_eq!(normalize_angle(-90.0), 0.0);
    }

    #[test]
    fn test_rotation_threshold() {
        assert!(needs_rotation(10.0, 1.0));
        assert!(needs_rotation(-1.5, 1.0));
        assert!(!needs_rotation(0.5, 1.0));
        assert!(!needs_rotation(1.0, 1.0));
    }

    #[test]
    fn test_estimate_detects_block_rotation() {
        let mask = rotated_block(400, 300, 200.0, 80.0, 12.0);
        let skew = estimate(&mask, 0.01).unwrap();
        assert!((skew.angle_deg - 12.0).abs() < 1.0, "angle {}", skew.angle_deg);
        assert!(skew.area_fraction > 0.1);
    }

    #[test]
    fn test_estimate_counter_clockwise_block() {
        let mask = rotated_block(400, 300, 200.0, 80.0, -8.0);
        let skew = estimate(&mask, 0.01).unwrap();
        assert!((skew.angle_deg + 8.0).abs() < 1.0, "angle {}", skew.angle_deg);
    }

    #[test]
    fn test_estimate_ignores_small_regions() {
        let mask = rotated_block(400, 300, 20.0, 20.0, 20.0);
        assert!(estimate(&mask, 0.01).is_none());
    }

    #[test]
    fn test_estimate_empty_mask() {
        assert!(estimate(&GrayImage::new(50, 50), 0.01).is_none());
    }

    #[test]
    fn test_rotation_undoes_skew() {
        let mask = rotated_block(400, 300, 200.0, 80.0, 15.0);
        let color = RgbImage::from_fn(400, 300, |x, y| {
            let v = 255 - mask.get_pixel(x, y).0[0];
            Rgb([v, v, v])
        });

        let skew = estimate(&mask, 0.01).unwrap();
        let straightened = rotate_replicate(&color, -skew.angle_deg);
        let remask = GrayImage::from_fn(400, 300, |x, y| {
            if straightened.get_pixel(x, y).0[0] < 128 {
                Luma([255])
            } else {
                Luma([0])
            }
        });

        let residual = estimate(&remask, 0.01).unwrap();
        assert!(residual.angle_deg.abs() <= 1.0, "residual {}", residual.angle_deg);
    }

    #[test]
    fn test_rotate_replicates_edges() {
        let img = RgbImage::from_pixel(40, 30, Rgb([90, 120, 150]));
        let rotated = rotate_replicate(&img, 33.0);
        assert_eq!(rotated.dimensions(), (40, 30));
        for p in rotated.pixels() {
            for (got, want) in p.0.iter().zip([90u8, 120, 150]) {
                assert!(got.abs_diff(want) <= 1, "corner filled with {:?}", p);
            }
        }
    }

    #[test]
    fn test_rotate_corners_copy_border_colour() {
        // Left half dark, right half light: corners must pick up the
        // nearest border, never a fill colour
        let img = RgbImage::from_fn(60, 40, |x, _| {
            if x < 30 {
                Rgb([20, 20, 20])
            } else {
                Rgb([220, 220, 220])
            }
        });
        let rotated = rotate_replicate(&img, 20.0);
        assert!(rotated.get_pixel(0, 0).0[0] <= 21);
        assert!(rotated.get_pixel(59, 39).0[0] >= 219);
    }

    #[test]
    fn test_rotate_single_row() {
        let img = RgbImage::from_fn(9, 1, |x, _| Rgb([(x * 20) as u8, 0, 0]));
        let rotated = rotate_replicate(&img, 10.0);
        assert_eq!(rotated.dimensions(), (9, 1));
    }

    #[test]
    fn test_rotate_zero_is_identity() {
        let img = RgbImage::from_fn(16, 12, |x, y| Rgb([(x * 10) as u8, (y * 10) as u8, 7]));
        assert_eq!(rotate_replicate(&img, 0.0), img);
    }
}
