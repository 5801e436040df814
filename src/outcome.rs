//! Normalized request outcome handed to the presentation layer.

use std::borrow::Cow;

use serde::Serialize;

use crate::ocr::{ErrorKind, OcrError, OcrResult};
use crate::utils::{html_escape, ImageType};

/// Shown instead of a blank result when recognition found nothing.
pub const NO_TEXT_FOUND: &str = "No text found.";

/// Exactly one of these is produced per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome {
    Success {
        /// Extracted text; empty means no text was detected.
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        media_type: Option<&'static str>,
    },
    Failure {
        kind: ErrorKind,
        message: String,
    },
}

impl Outcome {
    pub fn success(text: impl Into<String>) -> Self {
        Outcome::Success {
            text: text.into(),
            media_type: None,
        }
    }

    pub fn failure(error: &OcrError) -> Self {
        Outcome::Failure {
            kind: error.kind(),
            message: error.to_string(),
        }
    }

    /// Normalize a pipeline result.
    pub fn from_result(result: Result<(OcrResult, ImageType), OcrError>) -> Self {
        match result {
            Ok((ocr, media_type)) => Outcome::Success {
                text: ocr.text,
                media_type: Some(media_type.mime()),
            },
            Err(e) => Self::failure(&e),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    /// Failure category, if any.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Outcome::Success { .. } => None,
            Outcome::Failure { kind, .. } => Some(*kind),
        }
    }

    /// Whether recognition succeeded but found no text.
    pub fn is_empty_text(&self) -> bool {
        matches!(self, Outcome::Success { text, .. } if text.trim().is_empty())
    }

    /// Text to show a user: the extraction, the no-text sentinel, or the
    /// failure message.
    pub fn display_text(&self) -> Cow<'_, str> {
        match self {
            Outcome::Success { .. } if self.is_empty_text() => Cow::Borrowed(NO_TEXT_FOUND),
            Outcome::Success { text, .. } => Cow::Borrowed(text),
            Outcome::Failure { message, .. } => Cow::Borrowed(message),
        }
    }

    /// Failure message made safe for HTML; it may contain recognizer
    /// stderr or a remote response body.
    ///
    /// The JSON API and the CLI emit the raw message; this is for callers
    /// that embed the message in markup.
    pub fn escaped_message(&self) -> Option<String> {
        match self {
            Outcome::Success { .. } => None,
            Outcome::Failure { message, .. } => Some(html_escape(message)),
        }
    }
}
