use crate::error::PreprocessError;
use serde::{Deserialize, Serialize};

/// Tunable parameters of the surface image normalizer.
///
/// Defaults reproduce the empirically tuned values the pipeline was built
/// around. The deskew area fraction and angle threshold in particular are
/// starting points for tuning, not derived constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Larger image dimension is scaled down to this when exceeded
    pub target_max_dim: u32,
    /// Larger image dimension is scaled up to this when below it
    pub min_max_dim: u32,

    /// Bilateral window diameter in pixels
    pub bilateral_diameter: u32,
    pub bilateral_sigma_color: f32,
    pub bilateral_sigma_space: f32,

    pub clahe_clip_limit: f32,
    /// Tiles per axis for adaptive histogram equalization
    pub clahe_tile_grid: u32,

    pub unsharp_sigma: f32,
    /// Weight applied to the contrast-enhanced image
    pub unsharp_amount: f32,
    /// Weight of the blurred copy subtracted from it
    pub unsharp_blur_weight: f32,

    /// Adaptive threshold neighbourhood, odd
    pub threshold_block_size: u32,
    /// Subtracted from the local mean before comparison
    pub threshold_offset: f32,

    /// Square structuring element side, odd
    pub morph_kernel_size: u32,
    pub morph_iterations: u32,

    /// Largest contour must cover more than this fraction of the image
    pub deskew_min_area_fraction: f64,
    /// Skew at or below this magnitude is left uncorrected
    pub deskew_min_angle_deg: f32,

    pub jpeg_quality: u8,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            target_max_dim: 1600,
            min_max_dim: 500,
            bilateral_diameter: 9,
            bilateral_sigma_color: 75.0,
            bilateral_sigma_space: 75.0,
            clahe_clip_limit: 3.0,
            clahe_tile_grid: 8,
            unsharp_sigma: 3.0,
            unsharp_amount: 1.5,
            unsharp_blur_weight: 0.5,
            threshold_block_size: 31,
            threshold_offset: 12.0,
            morph_kernel_size: 3,
            morph_iterations: 1,
            deskew_min_area_fraction: 0.01,
            deskew_min_angle_deg: 1.0,
            jpeg_quality: 92,
        }
    }
}

impl NormalizerConfig {
    pub fn with_target_max_dim(mut self, target_max_dim: u32) -> Self {
        self.target_max_dim = target_max_dim;
        self
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality;
        self
    }

    /// Load overrides from a JSON document; omitted fields keep their defaults
    pub fn from_json(json: &str) -> Result<Self, PreprocessError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| PreprocessError::InvalidConfig(format!("Malformed JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PreprocessError> {
        let invalid = |msg: String| Err(PreprocessError::InvalidConfig(msg));

        if self.target_max_dim == 0 || self.min_max_dim == 0 {
            return invalid("resize bounds must be positive".to_string());
        }
        if self.bilateral_diameter == 0 {
            return invalid("bilateral_diameter must be positive".to_string());
        }
        if self.bilateral_sigma_color <= 0.0
            || self.bilateral_sigma_space <= 0.0
            || self.unsharp_sigma <= 0.0
        {
            return invalid("filter sigmas must be positive".to_string());
        }
        if self.clahe_clip_limit <= 0.0 || self.clahe_tile_grid == 0 {
            return invalid("CLAHE clip limit and tile grid must be positive".to_string());
        }
        if self.threshold_block_size < 3 || self.threshold_block_size % 2 == 0 {
            return invalid(format!(
                "threshold_block_size must be odd and >= 3, got {}",
                self.threshold_block_size
            ));
        }
        if self.morph_kernel_size == 0 || self.morph_kernel_size % 2 == 0 {
            return invalid(format!(
                "morph_kernel_size must be odd, got {}",
                self.morph_kernel_size
            ));
        }
        if (self.morph_kernel_size / 2) * self.morph_iterations > u8::MAX as u32 {
            return invalid("morphology radius too large".to_string());
        }
        if !(0.0..1.0).contains(&self.deskew_min_area_fraction) {
            return invalid(format!(
                "deskew_min_area_fraction must be in [0, 1), got {}",
                self.deskew_min_area_fraction
            ));
        }
        if self.deskew_min_angle_deg < 0.0 {
            return invalid("deskew_min_angle_deg must not be negative".to_string());
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return invalid(format!(
                "jpeg_quality must be in 1..=100, got {}",
                self.jpeg_quality
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(NormalizerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_even_block_size_rejected() {
        let config = NormalizerConfig {
            threshold_block_size: 30,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PreprocessError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_target_below_lower_bound_accepted() {
        let config = NormalizerConfig::default().with_target_max_dim(400);
        assert!(config.validate().is_ok());
        assert!(NormalizerConfig::default().with_target_max_dim(0).validate().is_err());
    }

    #[test]
    fn test_json_overrides_keep_other_defaults() {
        let config = NormalizerConfig::from_json(r#"{"clahe_clip_limit": 2.0}"#).unwrap();
        assert_eq!(config.clahe_clip_limit, 2.0);
        assert_eq!(config.threshold_block_size, 31);
        assert_eq!(config.jpeg_quality, 92);
    }

    #[test]
    fn test_json_with_bad_quality_rejected() {
        assert!(NormalizerConfig::from_json(r#"{"jpeg_quality": 0}"#).is_err());
    }
}
