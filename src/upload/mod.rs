//! Upload intake: validation and scratch storage.

mod scratch;
mod validator;

pub use scratch::{scratch_extension, ScratchArtifact, ScratchStore, SCRATCH_PREFIX};
pub use validator::{probe_dimensions, sniff_mime, validate, UploadLimits};

/// One uploaded file as received from the client.
///
/// `filename` is untrusted and only ever used to pick a cosmetic extension.
#[derive(Debug, Clone, Default)]
pub struct UploadRequest {
    pub bytes: Vec<u8>,
    /// Size reported for the upload. May exceed `bytes.len()` when reading
    /// stopped early because the limit was crossed.
    pub declared_size: u64,
    pub filename: Option<String>,
}

impl UploadRequest {
    /// Build a request whose declared size is the byte length.
    pub fn new(bytes: Vec<u8>, filename: Option<String>) -> Self {
        Self {
            declared_size: bytes.len() as u64,
            bytes,
            filename,
        }
    }
}
