//! Preprocessing for text recognition on embossed and engraved metal
//! surfaces, plus the HTTP service that exposes it.

pub mod config;
pub mod error;
pub mod preprocessing;
pub mod recognition;
pub mod server;

pub use error::{PreprocessError, RecognitionError, ServiceError};
pub use preprocessing::{normalize, Normalizer, NormalizerConfig};
