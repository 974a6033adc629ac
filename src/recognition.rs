//! Hand-off to the external text-recognition collaborator.
//!
//! The normalizer must never block recognition: when preprocessing fails
//! for any reason the raw upload is forwarded unchanged.

use crate::error::RecognitionError;
use crate::preprocessing::steps::codec;
use crate::preprocessing::{NormalizedImage, Normalizer, PipelineReport};
use std::fmt;

/// Image payload ready to send to a recognizer
#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    /// False when the raw input was passed through after a pipeline failure
    pub preprocessed: bool,
    pub report: Option<PipelineReport>,
}

impl PreparedImage {
    pub fn processed(normalized: NormalizedImage) -> Self {
        Self {
            bytes: normalized.jpeg,
            mime_type: "image/jpeg".to_string(),
            preprocessed: true,
            report: Some(normalized.report),
        }
    }

    /// Original bytes, labelled with the MIME type sniffed from their header
    pub fn passthrough(bytes: &[u8]) -> Self {
        Self {
            bytes: bytes.to_vec(),
            mime_type: codec::sniff_mime(bytes).to_string(),
            preprocessed: false,
            report: None,
        }
    }

    /// Passthrough after a failed normalization, logged so the fallback stays visible
    pub fn fallback(bytes: &[u8], err: &dyn fmt::Display) -> Self {
        tracing::warn!("Preprocessing failed, forwarding original image: {}", err);
        Self::passthrough(bytes)
    }
}

/// Trait for a text-recognition backend (typically a hosted vision model)
pub trait Recognizer: Send + Sync {
    /// Returns the backend identifier
    fn name(&self) -> &'static str;

    /// Extract text from the image according to `prompt`
    fn recognize(&self, image: &PreparedImage, prompt: &str) -> Result<String, RecognitionError>;
}

/// Normalize `raw`, substituting the original bytes if any stage fails
pub fn prepare_for_recognition(normalizer: &Normalizer, raw: &[u8]) -> PreparedImage {
    match normalizer.normalize(raw) {
        Ok(normalized) => PreparedImage::processed(normalized),
        Err(err) => PreparedImage::fallback(raw, &err),
    }
}

/// Prepare `raw` and make a single recognition call; no retries
pub fn extract_text(
    recognizer: &dyn Recognizer,
    normalizer: &Normalizer,
    raw: &[u8],
    prompt: &str,
) -> Result<String, RecognitionError> {
    let prepared = prepare_for_recognition(normalizer, raw);
    tracing::info!(
        "Sending {} bytes ({}, preprocessed: {}) to {}",
        prepared.bytes.len(),
        prepared.mime_type,
        prepared.preprocessed,
        recognizer.name()
    );
    let text = recognizer.recognize(&prepared, prompt)?;
    Ok(text.trim().to_string())
}
