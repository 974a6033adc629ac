use image::{GrayImage, Luma};

/// Contrast-limited adaptive histogram equalization.
///
/// The image is split into a `tile_grid` x `tile_grid` grid; each tile gets
/// its own equalization curve built from a histogram clipped at
/// `clip_limit` times the uniform bin height, with the clipped excess spread
/// evenly over all bins. Pixels are mapped by bilinear interpolation between
/// the curves of the four nearest tile centers so no tile seams show.
pub fn clahe(image: &GrayImage, clip_limit: f32, tile_grid: u32) -> GrayImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 || tile_grid == 0 {
        return image.clone();
    }

    let tile_w = width.div_ceil(tile_grid.min(width));
    let tile_h = height.div_ceil(tile_grid.min(height));
    let tiles_x = width.div_ceil(tile_w) as usize;
    let tiles_y = height.div_ceil(tile_h) as usize;

    let mut luts = vec![[0u8; 256]; tiles_x * tiles_y];
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x0 = tx as u32 * tile_w;
            let y0 = ty as u32 * tile_h;
            let x1 = (x0 + tile_w).min(width);
            let y1 = (y0 + tile_h).min(height);
            luts[ty * tiles_x + tx] = tile_lut(image, x0, y0, x1, y1, clip_limit);
        }
    }

    let inv_tw = 1.0 / tile_w as f32;
    let inv_th = 1.0 / tile_h as f32;
    let last_tx = tiles_x as i32 - 1;
    let last_ty = tiles_y as i32 - 1;

    GrayImage::from_fn(width, height, |x, y| {
        let value = image.get_pixel(x, y).0[0] as usize;

        let txf = x as f32 * inv_tw - 0.5;
        let tyf = y as f32 * inv_th - 0.5;
        let tx1 = txf.floor() as i32;
        let ty1 = tyf.floor() as i32;
        let xa = txf - tx1 as f32;
        let ya = tyf - ty1 as f32;

        let (tx0, tx1) = (tx1.clamp(0, last_tx) as usize, (tx1 + 1).clamp(0, last_tx) as usize);
        let (ty0, ty1) = (ty1.clamp(0, last_ty) as usize, (ty1 + 1).clamp(0, last_ty) as usize);

        let lut = |tx: usize, ty: usize| luts[ty * tiles_x + tx][value] as f32;
        let top = lut(tx0, ty0) * (1.0 - xa) + lut(tx1, ty0) * xa;
        let bottom = lut(tx0, ty1) * (1.0 - xa) + lut(tx1, ty1) * xa;
        let mapped = top * (1.0 - ya) + bottom * ya;

        Luma([mapped.round().clamp(0.0, 255.0) as u8])
    })
}

/// Clipped-histogram equalization curve for one tile
fn tile_lut(image: &GrayImage, x0: u32, y0: u32, x1: u32, y1: u32, clip_limit: f32) -> [u8; 256] {
    let mut hist = [0u32; 256];
    for y in y0..y1 {
        for x in x0..x1 {
            hist[image.get_pixel(x, y).0[0] as usize] += 1;
        }
    }

    let area = (x1 - x0) * (y1 - y0);
    let clip = ((clip_limit * area as f32 / 256.0) as u32).max(1);

    let mut excess = 0u32;
    for bin in hist.iter_mut() {
        if *bin > clip {
            excess += *bin - clip;
            *bin = clip;
        }
    }

    let per_bin = excess / 256;
    let remainder = (excess % 256) as usize;
    if remainder > 0 {
        // Spread the leftover counts at even strides rather than piling them at the dark end
        let step = (256 / remainder).max(1);
        for bin in hist.iter_mut().step_by(step).take(remainder) {
            *bin += 1;
        }
    }

    let scale = 255.0 / area as f32;
    let mut lut = [0u8; 256];
    let mut cumulative = 0u32;
    for (i, bin) in hist.iter().enumerate() {
        cumulative += bin + per_bin;
        lut[i] = (cumulative as f32 * scale).round().min(255.0) as u8;
    }
    lut
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(img: &GrayImage) -> u8 {
        let min = img.pixels().map(|p| p.0[0]).min().unwrap_or(0);
        let max = img.pixels().map(|p| p.0[0]).max().unwrap_or(0);
        max - min
    }

    #[test]
    fn test_clahe_preserves_dimensions() {
        let img = GrayImage::from_pixel(37, 23, Luma([90]));
        assert_eq!(clahe(&img, 3.0, 8).dimensions(), (37, 23));
    }

    #[test]
    fn test_clahe_uniform_image_stays_uniform() {
        let img = GrayImage::from_pixel(64, 64, Luma([128]));
        let result = clahe(&img, 3.0, 8);
        let first = result.get_pixel(0, 0).0[0];
        assert!(result.pixels().all(|p| p.0[0] == first));
    }

    #[test]
    fn test_clahe_stretches_low_contrast() {
        // Faint gradient, like an embossed ridge under flat light
        let img = GrayImage::from_fn(64, 64, |x, _| Luma([100 + (x * 40 / 63) as u8]));
        let result = clahe(&img, 3.0, 1);
        assert!(
            range(&result) > 80,
            "expected stretched range, got {}",
            range(&result)
        );
    }

    #[test]
    fn test_clahe_tiny_image() {
        let img = GrayImage::from_fn(3, 2, |x, y| Luma([(x * 40 + y * 10) as u8]));
        assert_eq!(clahe(&img, 3.0, 8).dimensions(), (3, 2));
    }

    #[test]
    fn test_lut_is_monotonic() {
        let img = GrayImage::from_fn(32, 32, |x, y| Luma([((x * 7 + y * 3) % 256) as u8]));
        let lut = tile_lut(&img, 0, 0, 32, 32, 3.0);
        assert!(lut.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(lut[255], 255);
    }
}
