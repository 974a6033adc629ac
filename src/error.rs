use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Failures of the surface image normalizer.
///
/// Every variant is terminal for a single pipeline call: no partial image
/// is ever returned alongside one of these.
#[derive(Error, Debug)]
pub enum PreprocessError {
    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Stage '{stage}' failed: {reason}")]
    StageFailure { stage: &'static str, reason: String },

    #[error("Invalid pipeline configuration: {0}")]
    InvalidConfig(String),
}

impl PreprocessError {
    pub fn stage(stage: &'static str, reason: impl Into<String>) -> Self {
        Self::StageFailure {
            stage,
            reason: reason.into(),
        }
    }

    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode(_))
    }
}

/// Opaque failure reported by a text-recognition collaborator
#[derive(Error, Debug)]
#[error("Recognition failed: {0}")]
pub struct RecognitionError(pub String);

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Missing file in request")]
    MissingFile,

    #[error("Image too large: {size} bytes (max: {max} bytes)")]
    ImageTooLarge { size: usize, max: usize },

    #[error("Request body exceeds the upload limit ({max} bytes)")]
    RequestTooLarge { max: usize },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Preprocessing(#[from] PreprocessError),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ServiceError::MissingFile => (StatusCode::BAD_REQUEST, "MISSING_FILE"),
            ServiceError::ImageTooLarge { .. } => {
                (StatusCode::PAYLOAD_TOO_LARGE, "IMAGE_TOO_LARGE")
            }
            ServiceError::RequestTooLarge { .. } => {
                (StatusCode::PAYLOAD_TOO_LARGE, "IMAGE_TOO_LARGE")
            }
            ServiceError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            ServiceError::Preprocessing(PreprocessError::Decode(_)) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "DECODE_ERROR")
            }
            ServiceError::Preprocessing(PreprocessError::StageFailure { .. }) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "STAGE_FAILURE")
            }
            ServiceError::Preprocessing(PreprocessError::InvalidConfig(_)) => {
                (StatusCode::BAD_REQUEST, "INVALID_CONFIG")
            }
            ServiceError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        });

        (status, body).into_response()
    }
}
