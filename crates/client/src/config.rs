use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Directory of the running executable. `config.toml` and `logs/` default to it.
pub fn exe_directory() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    exe.parent().map(|p| p.to_path_buf())
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub endpoint: EndpointConfig,
    #[serde(default)]
    pub encoder: EncoderConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EndpointConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_analyze_path")]
    pub analyze_path: String,
    #[serde(default = "default_video_path")]
    pub video_path: String,
    #[serde(default = "default_chat_path")]
    pub chat_path: String,
    /// Sent as `Authorization: Bearer <token>` when set.
    #[serde(default)]
    pub bearer_token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl EndpointConfig {
    /// Join the base URL and a route path without doubling or dropping the slash.
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EncoderConfig {
    #[serde(default = "default_max_dimension")]
    pub max_width: u32,
    #[serde(default = "default_max_dimension")]
    pub max_height: u32,
    /// JPEG quality, 1..=100.
    #[serde(default = "default_quality")]
    pub quality: u8,
}

/// Wire shape of the `/chat` request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatFormat {
    /// `{"context": ..., "question": ...}`
    ContextQuestion,
    /// `{"messages": [{"role": ..., "content": ...}, ...]}`
    Messages,
}

fn default_chat_format() -> ChatFormat { ChatFormat::ContextQuestion }

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    #[serde(default = "default_chat_format")]
    pub format: ChatFormat,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_enabled")]
    pub enabled: bool,
    /// Override log directory. Default: "logs/" next to the executable.
    pub directory: Option<String>,
    #[serde(default = "default_level")]
    pub level: String,
}

impl LoggingConfig {
    pub fn log_directory(&self) -> Option<PathBuf> {
        if let Some(ref custom) = self.directory {
            return Some(PathBuf::from(custom));
        }
        exe_directory().map(|d| d.join("logs"))
    }
}

fn default_base_url() -> String { "http://localhost:5051".into() }
fn default_analyze_path() -> String { "/analyze".into() }
fn default_video_path() -> String { "/analyze_video".into() }
fn default_chat_path() -> String { "/chat".into() }
fn default_timeout_secs() -> u64 { 30 }
fn default_max_dimension() -> u32 { 512 }
fn default_quality() -> u8 { 80 }
fn default_logging_enabled() -> bool { true }
fn default_level() -> String { "info".into() }

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            analyze_path: default_analyze_path(),
            video_path: default_video_path(),
            chat_path: default_chat_path(),
            bearer_token: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            max_width: default_max_dimension(),
            max_height: default_max_dimension(),
            quality: default_quality(),
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            format: default_chat_format(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_logging_enabled(),
            directory: None,
            level: default_level(),
        }
    }
}

impl Config {
    pub fn from_toml(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents, path)
    }

    /// Load `path` (or `config.toml` next to the executable). A missing file
    /// yields defaults; a malformed one is still an error.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match exe_directory() {
                Some(dir) => dir.join("config.toml"),
                None => {
                    warn!("Could not determine executable directory, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        if !path.exists() {
            warn!("{} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(&path)
    }
}
