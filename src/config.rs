use crate::error::PreprocessError;
use crate::preprocessing::NormalizerConfig;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "surface-ocr-prep-server")]
#[command(about = "Preprocessing service for embossed and engraved metal markings")]
#[command(version)]
pub struct Args {
    /// Host address to bind to
    #[arg(long, env = "PREP_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "PREP_PORT", default_value = "9393")]
    pub port: u16,

    /// Maximum upload size in bytes (default: 50MB)
    #[arg(long, env = "PREP_MAX_FILE_SIZE", default_value = "52428800")]
    pub max_file_size: usize,

    /// Larger image side after resizing
    #[arg(long, env = "PREP_TARGET_MAX_DIM")]
    pub target_max_dim: Option<u32>,

    /// JPEG quality of the processed image (1-100)
    #[arg(long, env = "PREP_JPEG_QUALITY")]
    pub jpeg_quality: Option<u8>,

    /// JSON file with pipeline parameter overrides
    #[arg(long, env = "PREP_PIPELINE_CONFIG")]
    pub pipeline_config: Option<PathBuf>,

    /// Seconds a single preprocessing call may take before the raw image is returned
    #[arg(long, env = "PREP_TIMEOUT_SECS", default_value = "30")]
    pub timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub max_file_size: usize,
    pub timeout: Duration,
    pub pipeline: NormalizerConfig,
}

impl TryFrom<Args> for Config {
    type Error = PreprocessError;

    fn try_from(args: Args) -> Result<Self, Self::Error> {
        let mut pipeline = match &args.pipeline_config {
            Some(path) => {
                let json = std::fs::read_to_string(path).map_err(|e| {
                    PreprocessError::InvalidConfig(format!("Cannot read {}: {}", path.display(), e))
                })?;
                NormalizerConfig::from_json(&json)?
            }
            None => NormalizerConfig::default(),
        };

        if let Some(dim) = args.target_max_dim {
            pipeline = pipeline.with_target_max_dim(dim);
        }
        if let Some(quality) = args.jpeg_quality {
            pipeline = pipeline.with_jpeg_quality(quality);
        }
        pipeline.validate()?;

        Ok(Self {
            host: args.host,
            port: args.port,
            max_file_size: args.max_file_size,
            timeout: Duration::from_secs(args.timeout_secs),
            pipeline,
        })
    }
}
