//! End-to-end pipeline runs against a stand-in recognizer.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use imgtext::config::{BackendConfig, Settings};
use imgtext::ocr::{ErrorKind, TesseractConfig};
use imgtext::outcome::{Outcome, NO_TEXT_FOUND};
use imgtext::pipeline::Pipeline;
use imgtext::upload::{UploadRequest, SCRATCH_PREFIX};
use tempfile::TempDir;

const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
const JPEG: &[u8] = b"\xff\xd8\xff\xe0\0\x10JFIF\0";

/// Recognizer that echoes a marker based on the image's first byte.
const SCRIPT: &str = r#"#!/bin/sh
[ -f "$1" ] || exit 3
case "$(head -c 1 "$1" | od -An -tx1 | tr -d ' ')" in
  89) printf 'Hello World\n\f' ;;
  ff) echo "cannot read image" >&2; exit 2 ;;
esac
"#;

fn setup(dir: &TempDir) -> (Pipeline, PathBuf) {
    let bin = dir.path().join("fake-tesseract");
    std::fs::write(&bin, SCRIPT).unwrap();
    std::fs::set_permissions(&bin, std::fs::Permissions::from_mode(0o755)).unwrap();

    let scratch = dir.path().join("scratch");
    std::fs::create_dir(&scratch).unwrap();

    let settings = Settings {
        backend: BackendConfig::Tesseract(TesseractConfig {
            binary: bin,
            ..Default::default()
        }),
        scratch_dir: scratch.clone(),
        ..Default::default()
    };
    (Pipeline::new(&settings).unwrap(), scratch)
}

fn leftover(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with(SCRATCH_PREFIX))
        .collect()
}

#[tokio::test]
async fn test_outcomes_from_stand_in_recognizer() {
    let dir = TempDir::new().unwrap();
    let (pipeline, scratch) = setup(&dir);

    let outcome = pipeline
        .process(UploadRequest::new(PNG.to_vec(), Some("photo.png".into())))
        .await;
    assert_eq!(outcome.display_text(), "Hello World");

    let outcome = pipeline
        .process(UploadRequest::new(JPEG.to_vec(), Some("photo.jpg".into())))
        .await;
    assert_eq!(outcome.kind(), Some(ErrorKind::BackendExecutionFailed));
    let Outcome::Failure { message, .. } = &outcome else {
        panic!("expected failure");
    };
    assert!(message.contains("exit 2"));
    assert!(message.contains("cannot read image"));

    // GIF falls through the script's case and prints nothing.
    let outcome = pipeline
        .process(UploadRequest::new(b"GIF89a\x01\0\x01\0".to_vec(), None))
        .await;
    assert!(outcome.is_empty_text());
    assert_eq!(outcome.display_text(), NO_TEXT_FOUND);

    assert!(leftover(&scratch).is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_leave_no_scratch_files() {
    let dir = TempDir::new().unwrap();
    let (pipeline, scratch) = setup(&dir);
    let pipeline = Arc::new(pipeline);

    let mut handles = Vec::new();
    for i in 0..40 {
        let pipeline = pipeline.clone();
        handles.push(tokio::spawn(async move {
            let bytes = match i % 4 {
                0 => PNG.to_vec(),
                1 => JPEG.to_vec(),
                2 => b"plain text, not an image".to_vec(),
                _ => Vec::new(),
            };
            let outcome = pipeline
                .process(UploadRequest::new(bytes, Some(format!("upload-{}.png", i))))
                .await;
            (i, outcome)
        }));
    }

    for handle in handles {
        let (i, outcome) = handle.await.unwrap();
        let expected = match i % 4 {
            0 => None,
            1 => Some(ErrorKind::BackendExecutionFailed),
            2 => Some(ErrorKind::UnsupportedType),
            _ => Some(ErrorKind::NoFileProvided),
        };
        assert_eq!(outcome.kind(), expected, "request {}", i);
    }

    assert!(leftover(&scratch).is_empty());
}
