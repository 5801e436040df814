//! imgtext - extract text from uploaded images.
//!
//! An upload is validated by content sniffing, written to a scratch file,
//! handed to exactly one recognition backend (local Tesseract or Google Cloud
//! Vision) and normalized into an [`outcome::Outcome`].

pub mod cli;
pub mod config;
pub mod ocr;
pub mod outcome;
pub mod pipeline;
pub mod server;
pub mod upload;
pub mod utils;
