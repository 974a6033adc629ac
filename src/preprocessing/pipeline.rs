use crate::error::PreprocessError;
use image::{GrayImage, RgbImage};
use serde::Serialize;
use std::time::Instant;

use super::config::NormalizerConfig;
use super::steps;
use super::steps::deskew::SkewEstimate;

/// Detection pass plus at most one reprocessing pass after rotation
const MAX_PASSES: u32 = 2;

/// Timing information for a single preprocessing step
#[derive(Debug, Clone, Serialize)]
pub struct StepTiming {
    pub name: String,
    pub pass: u32,
    pub time_ms: u64,
}

/// Single-channel rasters derived from one color image
#[derive(Debug, Clone)]
pub struct StageImages {
    /// Luminance after bilateral denoise
    pub gray: GrayImage,
    /// After CLAHE and unsharp masking
    pub enhanced: GrayImage,
    /// Cleaned stroke mask, 255 = stroke
    pub mask: GrayImage,
}

/// Summary of one pipeline run, doubling as a quality signal for callers
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub original_width: u32,
    pub original_height: u32,
    pub width: u32,
    pub height: u32,
    pub passes: u32,
    /// Rotation applied to the color image, positive = clockwise
    pub rotation_deg: Option<f32>,
    /// First-pass skew estimate
    pub skew: Option<SkewEstimate>,
    /// Skew measured on the final mask
    pub residual_skew_deg: Option<f32>,
    /// Fraction of the final mask marked as stroke
    pub stroke_coverage: f32,
    pub total_time_ms: u64,
    pub steps: Vec<StepTiming>,
}

/// In-memory result of [`Normalizer::process`]
#[derive(Debug, Clone)]
pub struct Processed {
    /// Resized and, if deskewed, rotated color image
    pub color: RgbImage,
    pub stages: StageImages,
    pub composite: RgbImage,
    pub report: PipelineReport,
}

/// Encoded result of [`Normalizer::normalize`]
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    pub jpeg: Vec<u8>,
    pub report: PipelineReport,
}

/// Surface image normalizer.
///
/// Holds only its validated configuration, so one instance can be shared
/// across threads and invoked concurrently.
#[derive(Debug, Clone)]
pub struct Normalizer {
    config: NormalizerConfig,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self {
            config: NormalizerConfig::default(),
        }
    }
}

impl Normalizer {
    pub fn new(config: NormalizerConfig) -> Result<Self, PreprocessError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Decode `bytes`, run every stage and re-encode the composite as JPEG
    pub fn normalize(&self, bytes: &[u8]) -> Result<NormalizedImage, PreprocessError> {
        let start = Instant::now();
        let mut timings = Vec::new();
        let image = run_step("decode", 1, &mut timings, || steps::codec::decode(bytes))?;

        let processed = self.process(image)?;
        let mut report = processed.report;
        timings.append(&mut report.steps);

        let jpeg = run_step("encode", report.passes, &mut timings, || {
            steps::codec::encode_jpeg(&processed.composite, self.config.jpeg_quality)
        })?;
        report.steps = timings;
        report.total_time_ms = start.elapsed().as_millis() as u64;

        tracing::info!(
            "Normalized {}x{} -> {}x{} in {}ms (passes: {}, rotation: {:?}, {} bytes)",
            report.original_width,
            report.original_height,
            report.width,
            report.height,
            report.total_time_ms,
            report.passes,
            report.rotation_deg,
            jpeg.len()
        );

        Ok(NormalizedImage { jpeg, report })
    }

    /// Run resize through composite on an already decoded image
    pub fn process(&self, image: RgbImage) -> Result<Processed, PreprocessError> {
        let start = Instant::now();
        let cfg = &self.config;
        let mut timings = Vec::new();
        let (original_width, original_height) = image.dimensions();

        let mut color = run_step("resize", 1, &mut timings, || {
            steps::resize::apply(&image, cfg.min_max_dim, cfg.target_max_dim)
        })?;
        drop(image);

        let mut pass = 1;
        let mut first_skew = None;
        let mut rotation_deg = None;

        let stages = loop {
            let stages = self.derive_stages(&color, pass, &mut timings)?;
            if pass == MAX_PASSES {
                break stages;
            }

            let skew = run_step("deskew", pass, &mut timings, || {
                Ok(steps::deskew::estimate(&stages.mask, cfg.deskew_min_area_fraction))
            })?;
            first_skew = skew;

            match skew {
                Some(s) if steps::deskew::needs_rotation(s.angle_deg, cfg.deskew_min_angle_deg) => {
                    let correction = -s.angle_deg;
                    tracing::debug!(
                        "Skew {:.2} deg on contour covering {:.3} of image; rotating by {:.2}",
                        s.angle_deg,
                        s.area_fraction,
                        correction
                    );
                    color = run_step("rotate", pass, &mut timings, || {
                        Ok(steps::deskew::rotate_replicate(&color, correction))
                    })?;
                    rotation_deg = Some(correction);
                    pass += 1;
                }
                Some(s) => {
                    tracing::debug!("Skew {:.2} deg within tolerance; no rotation", s.angle_deg);
                    break stages;
                }
                None => break stages,
            }
        };

        let residual_skew_deg = if rotation_deg.is_some() {
            steps::deskew::estimate(&stages.mask, cfg.deskew_min_area_fraction)
                .map(|s| s.angle_deg)
        } else {
            first_skew.map(|s| s.angle_deg)
        };

        let composite = run_step("composite", pass, &mut timings, || {
            steps::composite::paste_on_white(&color, &stages.mask)
        })?;

        let report = PipelineReport {
            original_width,
            original_height,
            width: composite.width(),
            height: composite.height(),
            passes: pass,
            rotation_deg,
            skew: first_skew,
            residual_skew_deg,
            stroke_coverage: steps::threshold::coverage(&stages.mask),
            total_time_ms: start.elapsed().as_millis() as u64,
            steps: timings,
        };

        Ok(Processed {
            color,
            stages,
            composite,
            report,
        })
    }

    /// Grayscale, denoise, contrast, sharpen and binarize one color image
    fn derive_stages(
        &self,
        color: &RgbImage,
        pass: u32,
        timings: &mut Vec<StepTiming>,
    ) -> Result<StageImages, PreprocessError> {
        let cfg = &self.config;

        let gray = run_step("denoise", pass, timings, || {
            let luma = steps::grayscale::apply(color);
            Ok(steps::denoise::bilateral(
                &luma,
                cfg.bilateral_diameter,
                cfg.bilateral_sigma_color,
                cfg.bilateral_sigma_space,
            ))
        })?;

        let equalized = run_step("contrast", pass, timings, || {
            Ok(steps::contrast::clahe(&gray, cfg.clahe_clip_limit, cfg.clahe_tile_grid))
        })?;

        let enhanced = run_step("sharpen", pass, timings, || {
            Ok(steps::sharpen::unsharp(
                &equalized,
                cfg.unsharp_sigma,
                cfg.unsharp_amount,
                cfg.unsharp_blur_weight,
            ))
        })?;

        let mask = run_step("threshold", pass, timings, || {
            let binary = steps::threshold::adaptive_inverse(
                &enhanced,
                cfg.threshold_block_size,
                cfg.threshold_offset,
            );
            Ok(steps::threshold::clean_mask(
                &binary,
                cfg.morph_kernel_size,
                cfg.morph_iterations,
            ))
        })?;

        if mask.dimensions() != color.dimensions() {
            return Err(PreprocessError::stage(
                "threshold",
                "stage output dimensions drifted from the color image",
            ));
        }

        Ok(StageImages {
            gray,
            enhanced,
            mask,
        })
    }
}

fn run_step<T, F>(
    name: &str,
    pass: u32,
    timings: &mut Vec<StepTiming>,
    step_fn: F,
) -> Result<T, PreprocessError>
where
    F: FnOnce() -> Result<T, PreprocessError>,
{
    let step_start = Instant::now();
    let result = step_fn()?;
    let time_ms = step_start.elapsed().as_millis() as u64;
    tracing::debug!("Step {} (pass {}) took {}ms", name, pass, time_ms);
    timings.push(StepTiming {
        name: name.to_string(),
        pass,
        time_ms,
    });
    Ok(result)
}

/// Normalize `bytes` with default settings and the given resize target,
/// returning the JPEG payload
pub fn normalize(bytes: &[u8], target_max_dim: u32) -> Result<Vec<u8>, PreprocessError> {
    let config = NormalizerConfig::default().with_target_max_dim(target_max_dim);
    let normalizer = Normalizer::new(config)?;
    Ok(normalizer.normalize(bytes)?.jpeg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_blank_plate_runs_single_pass() {
        let image = RgbImage::from_pixel(600, 400, Rgb([180, 180, 185]));
        let processed = Normalizer::default().process(image).unwrap();

        assert_eq!(processed.report.passes, 1);
        assert!(processed.report.rotation_deg.is_none());
        assert!(processed.report.skew.is_none());
        assert_eq!(processed.report.stroke_coverage, 0.0);
        assert!(processed
            .composite
            .pixels()
            .all(|p| *p == Rgb([255, 255, 255])));
    }

    #[test]
    fn test_stage_images_match_color_dimensions() {
        let image = RgbImage::from_fn(700, 520, |x, y| {
            if (200..260).contains(&x) && (100..400).contains(&y) {
                Rgb([40, 40, 40])
            } else {
                Rgb([200, 200, 200])
            }
        });
        let processed = Normalizer::default().process(image).unwrap();
        let dims = processed.color.dimensions();

        assert_eq!(processed.stages.gray.dimensions(), dims);
        assert_eq!(processed.stages.enhanced.dimensions(), dims);
        assert_eq!(processed.stages.mask.dimensions(), dims);
        assert_eq!(processed.composite.dimensions(), dims);
    }

    #[test]
    fn test_step_timings_follow_stage_order() {
        let image = RgbImage::from_pixel(520, 520, Rgb([128, 128, 128]));
        let processed = Normalizer::default().process(image).unwrap();
        let names: Vec<&str> = processed.report.steps.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            ["resize", "denoise", "contrast", "sharpen", "threshold", "deskew", "composite"]
        );
    }

    #[test]
    fn test_normalize_times_decode_and_encode() {
        let image = RgbImage::from_pixel(520, 520, Rgb([128, 128, 128]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(image)
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Bmp)
            .unwrap();

        let normalized = Normalizer::default().normalize(&bytes).unwrap();
        let names: Vec<&str> = normalized.report.steps.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names.first(), Some(&"decode"));
        assert_eq!(names.last(), Some(&"encode"));
        assert_eq!(names.len(), 9);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = NormalizerConfig {
            jpeg_quality: 0,
            ..Default::default()
        };
        assert!(Normalizer::new(config).is_err());
    }

    #[test]
    fn test_normalize_rejects_garbage() {
        let err = normalize(b"definitely not an image", 1600).unwrap_err();
        assert!(err.is_decode());
    }
}
