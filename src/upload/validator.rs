//! Upload validation.
//!
//! Decides whether an upload is worth processing before anything touches
//! disk. The media type comes from the bytes only: magic-number sniffing
//! first, then an image header probe as a fallback classifier.

use std::io::Cursor;

use image::ImageReader;
use tracing::debug;

use super::UploadRequest;
use crate::config::DEFAULT_MAX_UPLOAD_BYTES;
use crate::ocr::OcrError;
use crate::utils::{format_size, ImageType};

/// Size and type limits applied to every upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadLimits {
    pub max_bytes: u64,
    pub allowed: Vec<ImageType>,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            allowed: ImageType::ALL.to_vec(),
        }
    }
}

impl UploadLimits {
    pub fn allows(&self, media_type: ImageType) -> bool {
        self.allowed.contains(&media_type)
    }
}

/// Sniff the MIME type from magic numbers.
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    infer::get(bytes).map(|kind| kind.mime_type())
}

/// Probe the image header for a format with readable dimensions.
pub fn probe_dimensions(bytes: &[u8]) -> Option<(ImageType, u32, u32)> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?;
    let media_type = ImageType::from_image_format(reader.format()?)?;
    let (width, height) = reader.into_dimensions().ok()?;
    Some((media_type, width, height))
}

/// Validate an upload, returning its sniffed media type.
///
/// Checks run in order and the first failure wins: presence, size, type.
/// A body truncated at the limit still counts as present when its declared
/// size is non-zero, so it is reported as too large.
pub fn validate(request: &UploadRequest, limits: &UploadLimits) -> Result<ImageType, OcrError> {
    let size = request.declared_size.max(request.bytes.len() as u64);
    if size == 0 {
        return Err(OcrError::NoFileProvided);
    }

    if size > limits.max_bytes {
        return Err(OcrError::FileTooLarge {
            size,
            limit: limits.max_bytes,
            limit_display: format_size(limits.max_bytes),
        });
    }

    if request.bytes.is_empty() {
        return Err(OcrError::NoFileProvided);
    }

    let sniffed = sniff_mime(&request.bytes);
    if let Some(media_type) = sniffed.and_then(ImageType::from_mime) {
        if limits.allows(media_type) {
            return Ok(media_type);
        }
    }

    if let Some((media_type, width, height)) = probe_dimensions(&request.bytes) {
        debug!(
            "Header probe classified upload as {} ({}x{})",
            media_type, width, height
        );
        if limits.allows(media_type) {
            return Ok(media_type);
        }
    }

    Err(OcrError::UnsupportedType {
        detected: sniffed.unwrap_or("unknown").to_string(),
    })
}
