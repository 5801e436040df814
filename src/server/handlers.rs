//! HTTP request handlers.

use axum::{
    extract::{
        multipart::{Field, MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Serialize;

use super::AppState;
use crate::ocr::{ErrorKind, OcrError};
use crate::outcome::Outcome;
use crate::upload::UploadRequest;

/// Multipart field names accepted for the uploaded image.
const FILE_FIELDS: [&str; 2] = ["image", "file"];

/// JSON body returned by `POST /api/ocr`.
#[derive(Debug, Serialize)]
pub struct OcrResponse {
    #[serde(flatten)]
    pub outcome: Outcome,
    /// Set when recognition succeeded but found nothing.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub no_text: bool,
}

/// HTTP status for a failure category.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NoFileProvided => StatusCode::BAD_REQUEST,
        ErrorKind::FileTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        ErrorKind::UnsupportedType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        ErrorKind::StorageFailure | ErrorKind::MisconfiguredBackend => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        ErrorKind::BackendUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::BackendExecutionFailed | ErrorKind::TransportFailure | ErrorKind::RemoteError => {
            StatusCode::BAD_GATEWAY
        }
        ErrorKind::BackendTimeout => StatusCode::GATEWAY_TIMEOUT,
    }
}

fn respond(outcome: Outcome) -> (StatusCode, Json<OcrResponse>) {
    let status = outcome.kind().map(status_for).unwrap_or(StatusCode::OK);
    let no_text = outcome.is_empty_text();
    (status, Json(OcrResponse { outcome, no_text }))
}

/// Accept one image upload and extract its text.
#[tracing::instrument(skip_all)]
pub async fn api_ocr(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> impl IntoResponse {
    let mut multipart = match multipart {
        Ok(m) => m,
        Err(e) => {
            tracing::debug!("Rejected non-multipart request: {}", e);
            return respond(Outcome::failure(&OcrError::NoFileProvided));
        }
    };

    let max_bytes = state.pipeline.limits().max_bytes;
    let mut request = None;

    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                let accepted = field
                    .name()
                    .is_some_and(|name| FILE_FIELDS.contains(&name));
                if accepted {
                    request = Some(read_upload(field, max_bytes).await);
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("Malformed multipart body: {}", e);
                break;
            }
        }
    }

    let Some(request) = request else {
        return respond(Outcome::failure(&OcrError::NoFileProvided));
    };

    respond(state.pipeline.process(request).await)
}

/// Read a file field in chunks, stopping once `max_bytes` is exceeded.
///
/// The returned request's `declared_size` is above the limit whenever
/// reading stopped early, so validation rejects it as too large.
async fn read_upload(mut field: Field<'_>, max_bytes: u64) -> UploadRequest {
    let filename = field.file_name().map(str::to_string);
    let mut bytes = Vec::new();
    let mut declared_size: u64 = 0;

    loop {
        match field.chunk().await {
            Ok(Some(chunk)) => {
                declared_size += chunk.len() as u64;
                if declared_size > max_bytes {
                    break;
                }
                bytes.extend_from_slice(&chunk);
            }
            Ok(None) => break,
            Err(e) => {
                if is_over_body_limit(&e) {
                    declared_size = declared_size.max(max_bytes.saturating_add(1));
                } else {
                    tracing::warn!("Failed to read upload: {}", e);
                    bytes.clear();
                    declared_size = 0;
                }
                break;
            }
        }
    }

    UploadRequest {
        bytes,
        declared_size,
        filename,
    }
}

fn is_over_body_limit(error: &MultipartError) -> bool {
    error.status() == StatusCode::PAYLOAD_TOO_LARGE
}

/// Active backend and whether it can currently run.
pub async fn api_status(State(state): State<AppState>) -> impl IntoResponse {
    let backend = state.pipeline.backend();
    let limits = state.pipeline.limits();

    Json(serde_json::json!({
        "backend": backend.backend_type(),
        "available": backend.is_available(),
        "hint": backend.availability_hint(),
        "max_upload_bytes": limits.max_bytes,
        "allowed_types": limits.allowed.iter().map(|t| t.mime()).collect::<Vec<_>>(),
    }))
}
