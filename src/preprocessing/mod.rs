//! Surface image normalizer
//!
//! Turns a photo of embossed or engraved metal markings into a
//! high-contrast image whose only non-white content is the detected
//! character strokes, straightened when the text region is skewed.

pub mod config;
pub mod geometry;
pub mod pipeline;
pub mod steps;

pub use config::NormalizerConfig;
pub use pipeline::{
    normalize, NormalizedImage, Normalizer, PipelineReport, Processed, StageImages, StepTiming,
};
pub use steps::deskew::SkewEstimate;
