//! Configuration management for imgtext.
//!
//! A [`Config`] is read once at startup from a TOML, YAML or JSON file
//! (chosen by extension), overlaid with environment variables, and then
//! frozen into [`Settings`]. Request handling only ever sees `Settings`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use serde::{Deserialize, Serialize};

use crate::ocr::{CredentialPlacement, OcrBackendType, TesseractConfig, VisionConfig};
use crate::upload::UploadLimits;
use crate::utils::ImageType;

/// Default maximum upload size (6 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 6 * 1024 * 1024;

/// Default time a backend may take before the request fails.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Config file names probed when no explicit path is given.
const CONFIG_FILE_NAMES: &[&str] = &["imgtext.toml", "imgtext.yaml", "imgtext.yml", "imgtext.json"];

/// Tesseract section of the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TesseractSection {
    pub binary: Option<String>,
    pub dpi: Option<u32>,
    pub language: Option<String>,
    pub psm: Option<u8>,
}

/// Cloud Vision section of the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionSection {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub credential: Option<CredentialPlacement>,
}

/// Raw configuration as read from disk. Every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Active backend: "tesseract" or "vision".
    pub backend: Option<String>,
    pub max_upload_bytes: Option<u64>,
    /// Allowed image types by short name ("jpeg", "png", ...).
    pub allowed_types: Option<Vec<String>>,
    pub scratch_dir: Option<String>,
    pub timeout_secs: Option<u64>,
    pub tesseract: TesseractSection,
    pub vision: VisionSection,
    /// Where this config was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

/// Active backend and its parameters.
#[derive(Debug, Clone)]
pub enum BackendConfig {
    Tesseract(TesseractConfig),
    Vision(VisionConfig),
}

impl BackendConfig {
    pub fn backend_type(&self) -> OcrBackendType {
        match self {
            BackendConfig::Tesseract(_) => OcrBackendType::Tesseract,
            BackendConfig::Vision(_) => OcrBackendType::Vision,
        }
    }
}

/// Immutable process-wide settings, built once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub backend: BackendConfig,
    pub upload: UploadLimits,
    pub scratch_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend: BackendConfig::Tesseract(TesseractConfig::default()),
            upload: UploadLimits::default(),
            scratch_dir: std::env::temp_dir(),
        }
    }
}

impl Config {
    /// Load configuration from a specific file path.
    /// Supports JSON, TOML and YAML based on file extension.
    pub fn load_from_path(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

        let mut config: Config = match ext {
            "toml" => toml::from_str(&contents).context("Failed to parse TOML config")?,
            "yaml" | "yml" => {
                serde_yaml::from_str(&contents).context("Failed to parse YAML config")?
            }
            _ => serde_json::from_str(&contents).context("Failed to parse JSON config")?,
        };

        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Find a config file in the working directory, then the user config dir.
    pub fn discover() -> Option<PathBuf> {
        let mut dirs_to_search = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            dirs_to_search.push(cwd);
        }
        if let Some(config_dir) = dirs::config_dir() {
            dirs_to_search.push(config_dir.join("imgtext"));
        }

        dirs_to_search
            .iter()
            .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
            .find(|candidate| candidate.is_file())
    }

    /// Apply environment variable overrides on top of file values.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup (environment in production).
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(backend) = get("IMGTEXT_BACKEND") {
            self.backend = Some(backend);
        }
        if let Some(key) = get("VISION_API_KEY").or_else(|| get("GOOGLE_VISION_API_KEY")) {
            self.vision.api_key = Some(key);
        }
        if let Some(max) = get("IMGTEXT_MAX_UPLOAD_BYTES").and_then(|v| v.trim().parse().ok()) {
            self.max_upload_bytes = Some(max);
        }
        if let Some(dir) = get("IMGTEXT_SCRATCH_DIR") {
            self.scratch_dir = Some(dir);
        }
        if let Some(bin) = get("TESSERACT_BIN") {
            self.tesseract.binary = Some(bin);
        }
        self
    }

    /// Get the base directory for resolving relative paths.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    /// - Absolute paths are returned as-is
    /// - Paths starting with ~ are expanded
    /// - Relative paths are resolved relative to `base_dir`
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Freeze this config into validated settings.
    pub fn into_settings(self) -> anyhow::Result<Settings> {
        let base_dir = self
            .base_dir()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

        let backend_type = match self.backend.as_deref() {
            None => OcrBackendType::Tesseract,
            Some(name) => OcrBackendType::from_str(name)
                .ok_or_else(|| anyhow!("Unknown OCR backend '{}' (expected tesseract or vision)", name))?,
        };

        let timeout = Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS));
        if timeout.is_zero() {
            bail!("timeout_secs must be greater than zero");
        }

        let backend = match backend_type {
            OcrBackendType::Tesseract => {
                let defaults = TesseractConfig::default();
                BackendConfig::Tesseract(TesseractConfig {
                    binary: self
                        .tesseract
                        .binary
                        .as_deref()
                        .map(|b| PathBuf::from(shellexpand::tilde(b).as_ref()))
                        .unwrap_or(defaults.binary),
                    dpi: self.tesseract.dpi.unwrap_or(defaults.dpi),
                    language: self.tesseract.language.clone(),
                    psm: self.tesseract.psm,
                    timeout,
                })
            }
            OcrBackendType::Vision => {
                let defaults = VisionConfig::default();
                BackendConfig::Vision(VisionConfig {
                    endpoint: self.vision.endpoint.clone().unwrap_or(defaults.endpoint),
                    api_key: self.vision.api_key.clone(),
                    credential: self.vision.credential.unwrap_or_default(),
                    timeout,
                })
            }
        };

        let allowed = match &self.allowed_types {
            None => ImageType::ALL.to_vec(),
            Some(names) => names
                .iter()
                .map(|name| {
                    ImageType::from_name(name)
                        .ok_or_else(|| anyhow!("Unsupported image type in allowed_types: '{}'", name))
                })
                .collect::<anyhow::Result<Vec<_>>>()?,
        };

        let max_bytes = self.max_upload_bytes.unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);
        if max_bytes == 0 {
            bail!("max_upload_bytes must be greater than zero");
        }

        let scratch_dir = match &self.scratch_dir {
            Some(dir) => self.resolve_path(dir, &base_dir),
            None => std::env::temp_dir(),
        };

        Ok(Settings {
            backend,
            upload: UploadLimits { max_bytes, allowed },
            scratch_dir,
        })
    }
}

/// Load settings from an explicit path or the discovered config file,
/// with environment overrides applied.
pub fn load_settings(config_path: Option<&Path>) -> anyhow::Result<Settings> {
    let config = match config_path {
        Some(path) => Config::load_from_path(path)?,
        None => match Config::discover() {
            Some(path) => {
                tracing::debug!("Using config file {}", path.display());
                Config::load_from_path(&path)?
            }
            None => Config::default(),
        },
    };

    config.with_env_overrides().into_settings()
}
