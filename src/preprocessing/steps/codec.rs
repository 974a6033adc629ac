use crate::error::PreprocessError;
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;

/// Decode arbitrary encoded raster bytes into a 3-channel color image
pub fn decode(bytes: &[u8]) -> Result<RgbImage, PreprocessError> {
    if bytes.is_empty() {
        return Err(PreprocessError::Decode("empty input buffer".to_string()));
    }

    let image =
        image::load_from_memory(bytes).map_err(|e| PreprocessError::Decode(e.to_string()))?;

    if image.width() == 0 || image.height() == 0 {
        return Err(PreprocessError::Decode(format!(
            "image has zero dimension ({}x{})",
            image.width(),
            image.height()
        )));
    }

    Ok(image.to_rgb8())
}

/// Serialize the composite as baseline JPEG
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, PreprocessError> {
    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    encoder
        .encode_image(image)
        .map_err(|e| PreprocessError::stage("encode", e.to_string()))?;
    Ok(buf)
}

/// MIME type of encoded bytes, used when raw input is passed through unprocessed
pub fn sniff_mime(bytes: &[u8]) -> &'static str {
    match image::guess_format(bytes) {
        Ok(format) => format.to_mime_type(),
        Err(_) => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, Rgb};
    use std::io::Cursor;

    fn png_bytes(img: RgbImage) -> Vec<u8> {
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn test_decode_rejects_empty_buffer() {
        assert!(decode(&[]).unwrap_err().is_decode());
    }

    #[test]
    fn test_decode_rejects_truncated_header() {
        let bytes = png_bytes(RgbImage::new(8, 8));
        assert!(decode(&bytes[..12]).unwrap_err().is_decode());
    }

    #[test]
    fn test_decode_png_dimensions() {
        let bytes = png_bytes(RgbImage::from_pixel(30, 20, Rgb([10, 20, 30])));
        let img = decode(&bytes).unwrap();
        assert_eq!(img.dimensions(), (30, 20));
        assert_eq!(img.get_pixel(0, 0), &Rgb([10, 20, 30]));
    }

    #[test]
    fn test_encode_jpeg_keeps_dimensions() {
        let jpeg = encode_jpeg(&RgbImage::from_pixel(64, 48, Rgb([200, 200, 200])), 92).unwrap();
        assert_eq!(sniff_mime(&jpeg), "image/jpeg");
        let decoded = decode(&jpeg).unwrap();
        assert_eq!(decoded.dimensions(), (64, 48));
    }

    #[test]
    fn test_sniff_unknown_bytes() {
        assert_eq!(sniff_mime(b"not an image"), "application/octet-stream");
    }
}
