use crate::config::Config;
use crate::error::ServiceError;
use crate::preprocessing::{NormalizedImage, Normalizer, NormalizerConfig, PipelineReport};
use crate::recognition::PreparedImage;
use axum::{
    body::{Body, Bytes},
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Room for multipart boundaries and headers on top of the file itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub normalizer: Arc<Normalizer>,
    pub config: Arc<Config>,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Server info response
#[derive(Serialize)]
pub struct InfoResponse {
    pub version: String,
    pub supported_formats: Vec<String>,
    pub max_file_size_bytes: usize,
    pub timeout_secs: u64,
    pub pipeline: NormalizerConfig,
}

/// Parsed multipart upload
struct Upload {
    data: Bytes,
    target_max_dim: Option<u32>,
}

pub fn router(state: AppState) -> Router {
    let body_limit = state.config.max_file_size.saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route("/preprocess", post(handle_preprocess))
        .route("/inspect", post(handle_inspect))
        .route("/health", get(handle_health))
        .route("/info", get(handle_info))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .with_state(state)
}

/// Run the HTTP server
pub async fn run(config: Config) -> anyhow::Result<()> {
    let normalizer = Normalizer::new(config.pipeline.clone())?;
    let addr = format!("{}:{}", config.host, config.port);

    let state = AppState {
        normalizer: Arc::new(normalizer),
        config: Arc::new(config),
    };

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, router(state)).await?;

    Ok(())
}

/// Normalize an upload; on any pipeline failure or timeout the original
/// bytes are returned so recognition can still run on them
async fn handle_preprocess(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ServiceError> {
    let start = Instant::now();
    let upload = read_upload(multipart, state.config.max_file_size).await?;
    let normalizer = normalizer_for(&state, upload.target_max_dim)?;

    let prepared = match run_pipeline(normalizer, upload.data.clone(), state.config.timeout).await {
        Ok(normalized) => PreparedImage::processed(normalized),
        Err(err) => PreparedImage::fallback(&upload.data, &err),
    };
    let rotation_deg = prepared.report.as_ref().and_then(|r| r.rotation_deg);

    let processing_time_ms = start.elapsed().as_millis() as u64;
    tracing::info!(
        "Preprocess request finished in {}ms (preprocessed: {}, {} bytes out)",
        processing_time_ms,
        prepared.preprocessed,
        prepared.bytes.len()
    );

    let mut response = axum::http::Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, prepared.mime_type.as_str())
        .header("x-preprocessed", prepared.preprocessed.to_string())
        .header("x-processing-time-ms", processing_time_ms.to_string());
    if let Some(rotation) = rotation_deg {
        response = response.header("x-rotation-deg", format!("{:.2}", rotation));
    }

    response
        .body(Body::from(prepared.bytes))
        .map_err(|e| ServiceError::Internal(format!("Failed to build response: {}", e)))
}

/// Run the pipeline and report what it did, without the image itself
async fn handle_inspect(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<PipelineReport>, ServiceError> {
    let upload = read_upload(multipart, state.config.max_file_size).await?;
    let normalizer = normalizer_for(&state, upload.target_max_dim)?;
    let normalized = run_pipeline(normalizer, upload.data, state.config.timeout).await?;
    Ok(Json(normalized.report))
}

/// Handle health check requests
async fn handle_health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Handle info requests
async fn handle_info(State(state): State<AppState>) -> impl IntoResponse {
    Json(InfoResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        supported_formats: [
            "image/png",
            "image/jpeg",
            "image/bmp",
            "image/gif",
            "image/webp",
            "image/tiff",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect(),
        max_file_size_bytes: state.config.max_file_size,
        timeout_secs: state.config.timeout.as_secs(),
        pipeline: state.normalizer.config().clone(),
    })
}

async fn read_upload(
    mut multipart: Multipart,
    max_file_size: usize,
) -> Result<Upload, ServiceError> {
    let mut file_data: Option<Bytes> = None;
    let mut target_max_dim: Option<u32> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_file_size))?
    {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "file" => {
                file_data = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| multipart_error(e, max_file_size))?,
                );
            }
            "target_max_dim" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| multipart_error(e, max_file_size))?;
                let dim = text.trim().parse::<u32>().map_err(|_| {
                    ServiceError::InvalidRequest(format!("Invalid target_max_dim: {}", text))
                })?;
                target_max_dim = Some(dim);
            }
            _ => {
                // Ignore unknown fields
            }
        }
    }

    let data = file_data.ok_or(ServiceError::MissingFile)?;
    if data.is_empty() {
        return Err(ServiceError::MissingFile);
    }
    if data.len() > max_file_size {
        return Err(ServiceError::ImageTooLarge {
            size: data.len(),
            max: max_file_size,
        });
    }

    Ok(Upload {
        data,
        target_max_dim,
    })
}

fn multipart_error(err: MultipartError, max_file_size: usize) -> ServiceError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ServiceError::RequestTooLarge { max: max_file_size }
    } else {
        ServiceError::InvalidRequest(format!("Failed to parse multipart: {}", err))
    }
}

/// Shared normalizer, or a per-request one when the upload overrides the resize target
fn normalizer_for(
    state: &AppState,
    target_max_dim: Option<u32>,
) -> Result<Arc<Normalizer>, ServiceError> {
    match target_max_dim {
        Some(dim) if dim != state.normalizer.config().target_max_dim => {
            let config = state.normalizer.config().clone().with_target_max_dim(dim);
            Ok(Arc::new(Normalizer::new(config)?))
        }
        _ => Ok(state.normalizer.clone()),
    }
}

/// Run the CPU-bound pipeline off the async executor, bounded by `timeout`
async fn run_pipeline(
    normalizer: Arc<Normalizer>,
    data: Bytes,
    timeout: Duration,
) -> Result<NormalizedImage, ServiceError> {
    let task = tokio::task::spawn_blocking(move || normalizer.normalize(&data));

    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => Ok(result?),
        Ok(Err(join_err)) => Err(ServiceError::Internal(format!(
            "Preprocessing task failed: {}",
            join_err
        ))),
        Err(_) => Err(ServiceError::Internal(format!(
            "Preprocessing timed out after {}s",
            timeout.as_secs()
        ))),
    }
}
