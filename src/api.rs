//! Axum routes for the single-page downloader.
//!
//! `/api/info` and `/api/download` wrap the blocking services in
//! `spawn_blocking`; everything else falls through to the static web root.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::State,
    http::{Request, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use mime_guess::MimeGuess;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::{info, warn};

use crate::error::ServiceError;
use crate::provider::StreamProvider;
use crate::service::{Downloader, VideoInfoPayload, extract_video_metadata};

/// Shared state injected into every handler. All of it is read-only.
#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<dyn StreamProvider>,
    pub downloader: Downloader,
    pub www_root: Arc<PathBuf>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/info", post(api_info))
        .route("/api/download", post(api_download))
        .fallback(static_fallback)
        .with_state(state)
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    /// Creates a 400 error with the provided message.
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    /// Creates a 404 error with the provided message.
    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    /// Creates a 500 error with the provided message.
    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(message) => Self::bad_request(message),
            ServiceError::Collaborator(message) => Self::internal(message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.message,
        });
        (self.status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Default, Deserialize)]
struct InfoRequest {
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DownloadRequest {
    #[serde(default)]
    url: Option<String>,
    #[serde(default, alias = "format_id")]
    format_id: Option<String>,
    #[serde(default, alias = "convert_to")]
    convert_to: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DownloadResponse {
    pub message: String,
    pub message_type: String,
}

/// Missing, empty or malformed bodies all read as `{}`.
fn parse_body<T: DeserializeOwned + Default>(body: &[u8]) -> T {
    serde_json::from_slice(body).unwrap_or_default()
}

/// Trimmed value, or `None` when absent or blank.
fn field(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

/// Rejects values `yt-dlp` would read as an option rather than a URL.
fn video_url(url: String) -> ApiResult<String> {
    if url.starts_with('-') {
        return Err(ApiError::bad_request("Please provide a valid video URL."));
    }
    Ok(url)
}

async fn run_blocking<T, F>(task: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ServiceError> + Send + 'static,
{
    let result = tokio::task::spawn_blocking(task)
        .await
        .map_err(|err| ApiError::internal(format!("worker failed: {err}")))?;
    result.map_err(|err| {
        if !err.is_validation() {
            warn!("request failed: {err}");
        }
        ApiError::from(err)
    })
}

pub async fn api_info(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<VideoInfoPayload>> {
    let request: InfoRequest = parse_body(&body);
    let url = field(request.url)
        .ok_or_else(|| ApiError::bad_request("Please provide a video URL."))
        .and_then(video_url)?;

    info!("info requested for {url}");
    let provider = state.provider.clone();
    let payload = run_blocking(move || extract_video_metadata(provider.as_ref(), &url)).await?;
    Ok(Json(payload))
}

pub async fn api_download(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<DownloadResponse>> {
    let request: DownloadRequest = parse_body(&body);
    let url = field(request.url)
        .ok_or_else(|| ApiError::bad_request("Missing video URL."))
        .and_then(video_url)?;
    let format_id = field(request.format_id)
        .ok_or_else(|| ApiError::bad_request("Select a format before downloading."))?;
    let convert_to = field(request.convert_to);

    info!("download requested for {url} (format {format_id})");
    let downloader = state.downloader.clone();
    let message = run_blocking(move || {
        downloader.download_specific_format(&url, &format_id, convert_to.as_deref())
    })
    .await?;

    Ok(Json(DownloadResponse {
        message,
        message_type: "success".to_owned(),
    }))
}

async fn index(State(state): State<AppState>) -> ApiResult<Response> {
    stream_file(state.www_root.join("index.html")).await
}

async fn static_fallback(State(state): State<AppState>, req: Request<Body>) -> Response {
    let path = req.uri().path();
    if path == "/api" || path.starts_with("/api/") {
        return ApiError::not_found("endpoint not found").into_response();
    }

    let result = match resolve_www_path(&state.www_root, path) {
        Ok(target) => stream_file(target).await,
        Err(err) => Err(err),
    };
    result.unwrap_or_else(IntoResponse::into_response)
}

fn resolve_www_path(root: &Path, request_path: &str) -> ApiResult<PathBuf> {
    let trimmed = request_path.trim_start_matches('/');
    if trimmed.is_empty() {
        return Ok(root.join("index.html"));
    }
    let candidate = Path::new(trimmed);
    if candidate
        .components()
        .any(|component| !matches!(component, Component::Normal(_)))
    {
        return Err(ApiError::not_found("file not found"));
    }
    Ok(root.join(candidate))
}

async fn stream_file(path: PathBuf) -> ApiResult<Response> {
    let file = File::open(&path)
        .await
        .map_err(|_| ApiError::not_found("file not found"))?;
    let metadata = file
        .metadata()
        .await
        .map_err(|_| ApiError::not_found("file not found"))?;
    if metadata.is_dir() {
        return Err(ApiError::not_found("file not found"));
    }

    let mut response = Body::from_stream(ReaderStream::new(file)).into_response();
    if let Some(mime) = MimeGuess::from_path(&path).first()
        && let Ok(value) = mime.to_string().parse()
    {
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, value);
    }
    Ok(response)
}
