//! Upload-to-text pipeline.
//!
//! validate → store scratch file → recognize → release → normalize.
//!
//! The scratch artifact is dropped on every path out of [`Pipeline::run`],
//! including when the caller drops the future mid-flight.

use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::ocr::{create_backend, OcrBackend, OcrError, OcrResult, RecognitionInput};
use crate::outcome::Outcome;
use crate::upload::{scratch_extension, validate, ScratchStore, UploadLimits, UploadRequest};
use crate::utils::ImageType;

/// Request pipeline holding the active backend. Shared read-only by all
/// concurrent requests.
pub struct Pipeline {
    limits: UploadLimits,
    store: ScratchStore,
    backend: Box<dyn OcrBackend>,
}

impl Pipeline {
    /// Build the pipeline and its configured backend.
    pub fn new(settings: &Settings) -> Result<Self, OcrError> {
        let backend = create_backend(&settings.backend)?;
        Ok(Self::with_backend(settings, backend))
    }

    /// Build the pipeline around an already constructed backend.
    pub fn with_backend(settings: &Settings, backend: Box<dyn OcrBackend>) -> Self {
        Self {
            limits: settings.upload.clone(),
            store: ScratchStore::new(&settings.scratch_dir),
            backend,
        }
    }

    pub fn backend(&self) -> &dyn OcrBackend {
        self.backend.as_ref()
    }

    pub fn limits(&self) -> &UploadLimits {
        &self.limits
    }

    pub fn store(&self) -> &ScratchStore {
        &self.store
    }

    /// Process one upload into a normalized outcome.
    pub async fn process(&self, request: UploadRequest) -> Outcome {
        let outcome = Outcome::from_result(self.run(&request).await);
        match &outcome {
            Outcome::Success { text, .. } => {
                info!("Extracted {} chars", text.chars().count());
            }
            Outcome::Failure { kind, message } => {
                warn!("OCR request failed ({}): {}", kind, message);
            }
        }
        outcome
    }

    /// Process one upload, returning the raw backend result.
    pub async fn run(&self, request: &UploadRequest) -> Result<(OcrResult, ImageType), OcrError> {
        let media_type = validate(request, &self.limits)?;

        let extension = scratch_extension(request.filename.as_deref(), media_type);
        let artifact = self.store.store(&request.bytes, &extension).await?;

        let result = self
            .backend
            .recognize(RecognitionInput {
                path: artifact.path(),
                bytes: &request.bytes,
                media_type,
            })
            .await;

        if let Err(e) = artifact.release() {
            warn!("Failed to remove scratch file: {}", e);
        }

        let result = result?;
        debug!(
            "{} finished in {}ms",
            result.backend, result.processing_time_ms
        );
        Ok((result, media_type))
    }
}
