//! Tesseract OCR backend implementation.
//!
//! Runs the `tesseract` command-line recognizer as a subprocess. Arguments
//! are passed as an argv vector, never through a shell, so nothing in the
//! image path can be reinterpreted as shell syntax.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, warn};

use super::backend::{OcrBackend, OcrBackendType, OcrError, OcrResult, RecognitionInput};

/// Configuration for the Tesseract backend.
#[derive(Debug, Clone)]
pub struct TesseractConfig {
    /// Binary name (looked up in PATH) or absolute path.
    pub binary: PathBuf,
    /// Resolution hint passed as `--dpi`.
    pub dpi: u32,
    /// Language passed as `-l` (e.g. "eng", "chi_sim"). Tesseract's default if unset.
    pub language: Option<String>,
    /// Page segmentation mode passed as `--psm`.
    pub psm: Option<u8>,
    /// Upper bound on one recognizer run.
    pub timeout: Duration,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("tesseract"),
            dpi: 300,
            language: None,
            psm: None,
            timeout: Duration::from_secs(crate::config::DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// Tesseract OCR backend.
pub struct TesseractBackend {
    config: TesseractConfig,
}

impl TesseractBackend {
    /// Create a new Tesseract backend with default configuration.
    pub fn new() -> Self {
        Self {
            config: TesseractConfig::default(),
        }
    }

    /// Create a new Tesseract backend with custom configuration.
    pub fn with_config(config: TesseractConfig) -> Self {
        Self { config }
    }

    /// Build the argument vector for one image.
    fn args(&self, image_path: &Path) -> Vec<std::ffi::OsString> {
        let mut args: Vec<std::ffi::OsString> = vec![
            image_path.as_os_str().to_owned(),
            "stdout".into(),
            "--dpi".into(),
            self.config.dpi.to_string().into(),
        ];
        if let Some(ref language) = self.config.language {
            args.push("-l".into());
            args.push(language.into());
        }
        if let Some(psm) = self.config.psm {
            args.push("--psm".into());
            args.push(psm.to_string().into());
        }
        args
    }

    /// Run Tesseract on an image file, returning raw stdout on success.
    async fn run_tesseract(&self, image_path: &Path) -> Result<String, OcrError> {
        let mut child = Command::new(&self.config.binary)
            .args(self.args(image_path))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => OcrError::BackendUnavailable(format!(
                    "{} not found (install tesseract-ocr)",
                    self.config.binary.display()
                )),
                _ => OcrError::BackendUnavailable(format!(
                    "failed to launch {}: {}",
                    self.config.binary.display(),
                    e
                )),
            })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let collect = async {
            let (out, err) = tokio::join!(read_pipe(stdout), read_pipe(stderr));
            let status = child.wait().await;
            (status, out, err)
        };

        let finished = tokio::time::timeout(self.config.timeout, collect).await;

        let (status, stdout, stderr) = match finished {
            Ok(done) => done,
            Err(_) => {
                warn!(
                    "tesseract exceeded {:?} on {}, killing",
                    self.config.timeout,
                    image_path.display()
                );
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill tesseract: {}", e);
                }
                return Err(OcrError::BackendTimeout {
                    backend: OcrBackendType::Tesseract,
                    timeout: self.config.timeout,
                });
            }
        };

        let status = status.map_err(|e| OcrError::BackendExecutionFailed {
            backend: OcrBackendType::Tesseract,
            code: None,
            output: format!("failed waiting for recognizer: {}", e),
        })?;

        interpret_exit(status, &stdout, &stderr)
    }
}

impl Default for TesseractBackend {
    fn default() -> Self {
        Self::new()
    }
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        if let Err(e) = pipe.read_to_end(&mut buf).await {
            debug!("Error reading recognizer output: {}", e);
        }
    }
    buf
}

/// Map a finished process onto text or a failure carrying its output.
fn interpret_exit(status: ExitStatus, stdout: &[u8], stderr: &[u8]) -> Result<String, OcrError> {
    if status.success() {
        return Ok(String::from_utf8_lossy(stdout).into_owned());
    }

    let captured = [stdout, stderr]
        .iter()
        .map(|b| String::from_utf8_lossy(b).trim().to_string())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    Err(OcrError::BackendExecutionFailed {
        backend: OcrBackendType::Tesseract,
        code: status.code(),
        output: captured,
    })
}

/// Strip the trailing newlines and page-break form feed Tesseract appends.
pub fn clean_output(raw: &str) -> String {
    raw.trim_end_matches(&['\n', '\r', '\x0c'][..]).to_string()
}

#[async_trait]
impl OcrBackend for TesseractBackend {
    fn backend_type(&self) -> OcrBackendType {
        OcrBackendType::Tesseract
    }

    fn is_available(&self) -> bool {
        which::which(&self.config.binary).is_ok()
    }

    fn availability_hint(&self) -> String {
        if self.is_available() {
            format!("Tesseract is available ({})", self.config.binary.display())
        } else {
            format!(
                "{} not found. Install with: apt install tesseract-ocr",
                self.config.binary.display()
            )
        }
    }

    async fn recognize(&self, input: RecognitionInput<'_>) -> Result<OcrResult, OcrError> {
        let start = Instant::now();
        let text = clean_output(&self.run_tesseract(input.path).await?);
        let elapsed = start.elapsed();

        debug!(
            "tesseract extracted {} chars in {:?}",
            text.chars().count(),
            elapsed
        );

        Ok(OcrResult {
            text,
            backend: OcrBackendType::Tesseract,
            processing_time_ms: elapsed.as_millis() as u64,
        })
    }
}
