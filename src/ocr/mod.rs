//! Text recognition backends.
//!
//! - **Tesseract**: local command-line recognizer, invoked per image (default)
//! - **Vision**: Google Cloud Vision `TEXT_DETECTION` over HTTPS
//!
//! The active backend is built once from [`BackendConfig`] with
//! [`create_backend`] and shared read-only by every request.

mod backend;
mod tesseract;
mod vision;

pub use backend::{
    ErrorKind, OcrBackend, OcrBackendType, OcrError, OcrResult, RecognitionInput,
};
pub use tesseract::{TesseractBackend, TesseractConfig};
pub use vision::{CredentialPlacement, VisionBackend, VisionConfig, DEFAULT_VISION_ENDPOINT};

use tracing::debug;

use crate::config::BackendConfig;

/// Create the configured backend.
pub fn create_backend(config: &BackendConfig) -> Result<Box<dyn OcrBackend>, OcrError> {
    let backend: Box<dyn OcrBackend> = match config {
        BackendConfig::Tesseract(tesseract) => {
            Box::new(TesseractBackend::with_config(tesseract.clone()))
        }
        BackendConfig::Vision(vision) => Box::new(VisionBackend::with_config(vision.clone())?),
    };
    debug!("OCR backend: {}", backend.backend_type());
    Ok(backend)
}
