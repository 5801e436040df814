//! Ephemeral scratch files for uploads.
//!
//! Each upload is written to `ocr_upload_<uuid>.<ext>` in the scratch
//! directory. The name comes from a random v4 UUID, never from client input.
//! A [`ScratchArtifact`] removes its file when released or dropped, so every
//! exit path of a request (including cancellation) cleans up.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::ocr::OcrError;
use crate::utils::ImageType;

/// File name prefix for scratch uploads.
pub const SCRATCH_PREFIX: &str = "ocr_upload_";

/// Maximum length of an extension taken from a client filename.
const MAX_EXTENSION_LEN: usize = 8;

/// Pick the scratch file extension: the client's if it is a plain short
/// token, otherwise the sniffed type's canonical one.
pub fn scratch_extension(filename: Option<&str>, media_type: ImageType) -> String {
    filename
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| {
            !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_LEN
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_else(|| media_type.extension().to_string())
}

/// Writes uploads into a scratch directory.
#[derive(Debug, Clone)]
pub struct ScratchStore {
    dir: PathBuf,
}

impl ScratchStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the scratch directory if it does not exist yet.
    pub async fn ensure_dir(&self) -> Result<(), OcrError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(OcrError::StorageFailure)
    }

    /// Write `bytes` to a fresh uniquely named file.
    ///
    /// The handle is only returned once every byte is written and flushed.
    pub async fn store(&self, bytes: &[u8], extension: &str) -> Result<ScratchArtifact, OcrError> {
        let path = self
            .dir
            .join(format!("{}{}.{}", SCRATCH_PREFIX, Uuid::new_v4().simple(), extension));

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options.open(&path).await.map_err(OcrError::StorageFailure)?;

        // From here on the guard owns the file and removes it on any failure.
        let artifact = ScratchArtifact {
            path,
            released: false,
        };

        file.write_all(bytes).await.map_err(OcrError::StorageFailure)?;
        file.flush().await.map_err(OcrError::StorageFailure)?;
        drop(file);

        debug!(
            "Stored {} bytes at {}",
            bytes.len(),
            artifact.path.display()
        );
        Ok(artifact)
    }
}

/// A scratch file owned by exactly one request.
#[derive(Debug)]
pub struct ScratchArtifact {
    path: PathBuf,
    released: bool,
}

impl ScratchArtifact {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the file now, reporting any error.
    pub fn release(mut self) -> std::io::Result<()> {
        self.released = true;
        remove_if_present(&self.path)
    }
}

impl Drop for ScratchArtifact {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = remove_if_present(&self.path) {
            warn!(
                "Failed to remove scratch file {}: {}",
                self.path.display(),
                e
            );
        }
    }
}

fn remove_if_present(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
