//! OCR backend abstraction.
//!
//! Two backends implement [`OcrBackend`]:
//! - Tesseract: local recognizer invoked as a subprocess
//! - Vision: Google Cloud Vision `images:annotate` over HTTPS
//!
//! Exactly one is active per process, chosen from configuration at startup.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::utils::ImageType;

/// Failure categories surfaced to callers of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    NoFileProvided,
    FileTooLarge,
    UnsupportedType,
    StorageFailure,
    BackendUnavailable,
    BackendExecutionFailed,
    TransportFailure,
    RemoteError,
    MisconfiguredBackend,
    BackendTimeout,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NoFileProvided => "NoFileProvided",
            ErrorKind::FileTooLarge => "FileTooLarge",
            ErrorKind::UnsupportedType => "UnsupportedType",
            ErrorKind::StorageFailure => "StorageFailure",
            ErrorKind::BackendUnavailable => "BackendUnavailable",
            ErrorKind::BackendExecutionFailed => "BackendExecutionFailed",
            ErrorKind::TransportFailure => "TransportFailure",
            ErrorKind::RemoteError => "RemoteError",
            ErrorKind::MisconfiguredBackend => "MisconfiguredBackend",
            ErrorKind::BackendTimeout => "BackendTimeout",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from validation, scratch storage and OCR backends.
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("No file was uploaded")]
    NoFileProvided,

    #[error("File is too large ({size} bytes). Maximum allowed is {limit_display}")]
    FileTooLarge {
        size: u64,
        limit: u64,
        limit_display: String,
    },

    #[error("Unsupported file type: {detected}")]
    UnsupportedType { detected: String },

    #[error("Cannot save uploaded file to scratch directory: {0}")]
    StorageFailure(#[source] std::io::Error),

    #[error("Backend not available: {0}")]
    BackendUnavailable(String),

    #[error("{backend} failed (exit {}): {output}", .code.map(|c| c.to_string()).unwrap_or_else(|| "signal".to_string()))]
    BackendExecutionFailed {
        backend: OcrBackendType,
        code: Option<i32>,
        output: String,
    },

    #[error("Request to recognition service failed: {0}")]
    TransportFailure(String),

    #[error("Recognition service returned HTTP {status}: {body}")]
    RemoteError { status: u16, body: String },

    #[error("Backend misconfigured: {0}")]
    MisconfiguredBackend(String),

    #[error("{backend} did not finish within {}s", .timeout.as_secs_f32())]
    BackendTimeout {
        backend: OcrBackendType,
        timeout: Duration,
    },
}

impl OcrError {
    /// Get the taxonomy category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            OcrError::NoFileProvided => ErrorKind::NoFileProvided,
            OcrError::FileTooLarge { .. } => ErrorKind::FileTooLarge,
            OcrError::UnsupportedType { .. } => ErrorKind::UnsupportedType,
            OcrError::StorageFailure(_) => ErrorKind::StorageFailure,
            OcrError::BackendUnavailable(_) => ErrorKind::BackendUnavailable,
            OcrError::BackendExecutionFailed { .. } => ErrorKind::BackendExecutionFailed,
            OcrError::TransportFailure(_) => ErrorKind::TransportFailure,
            OcrError::RemoteError { .. } => ErrorKind::RemoteError,
            OcrError::MisconfiguredBackend(_) => ErrorKind::MisconfiguredBackend,
            OcrError::BackendTimeout { .. } => ErrorKind::BackendTimeout,
        }
    }
}

/// Result of OCR processing.
#[derive(Debug, Clone)]
pub struct OcrResult {
    /// Extracted text content. Empty means no text was detected.
    pub text: String,
    /// Which backend produced this result.
    pub backend: OcrBackendType,
    /// Processing time in milliseconds.
    pub processing_time_ms: u64,
}

/// Available OCR backend types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrBackendType {
    /// Tesseract OCR via command-line.
    Tesseract,
    /// Google Cloud Vision API.
    Vision,
}

impl OcrBackendType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OcrBackendType::Tesseract => "tesseract",
            OcrBackendType::Vision => "vision",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "tesseract" | "local" => Some(OcrBackendType::Tesseract),
            "vision" | "google" | "google-vision" | "remote" => Some(OcrBackendType::Vision),
            _ => None,
        }
    }
}

impl std::fmt::Display for OcrBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A validated upload, already written to its scratch location.
///
/// Local backends read from `path`; remote backends send `bytes`.
#[derive(Debug, Clone, Copy)]
pub struct RecognitionInput<'a> {
    pub path: &'a Path,
    pub bytes: &'a [u8],
    pub media_type: ImageType,
}

/// Trait for OCR backends.
#[async_trait]
pub trait OcrBackend: Send + Sync {
    /// Get the backend type.
    fn backend_type(&self) -> OcrBackendType;

    /// Check if this backend can run (binary installed, credential set).
    fn is_available(&self) -> bool;

    /// Get a description of what's needed to make this backend available.
    fn availability_hint(&self) -> String;

    /// Extract text from a single image.
    ///
    /// Must not retry; a bounded timeout applies to the whole call.
    async fn recognize(&self, input: RecognitionInput<'_>) -> Result<OcrResult, OcrError>;
}
