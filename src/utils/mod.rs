//! Shared utility functions.
//!
//! - `html`: HTML escaping for untrusted recognizer output
//! - `format`: Human-readable sizes
//! - `mime`: Accepted image media types

mod format;
mod html;
mod mime;

pub use format::format_size;
pub use html::html_escape;
pub use mime::ImageType;
