use std::path::Path;

use anyhow::{Context, Result};
use client::config::LoggingConfig;
use serde::Deserialize;
use tracing::warn;

pub const API_KEY_ENV: &str = "GROQ_API_KEY";

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Named in the prompt as where the subject probably is.
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: usize,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// OpenAI-compatible chat completions endpoint with vision support.
#[derive(Debug, Deserialize, Clone)]
pub struct UpstreamConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Falls back to the `GROQ_API_KEY` environment variable when empty.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
}

fn default_bind() -> String { "0.0.0.0:5051".into() }
fn default_region() -> String { "Austin, Texas".into() }
fn default_max_upload_mb() -> usize { 100 }
fn default_endpoint() -> String { "https://api.groq.com/openai/v1/chat/completions".into() }
fn default_model() -> String { "meta-llama/llama-4-scout-17b-16e-instruct".into() }
fn default_max_tokens() -> u32 { 1024 }
fn default_temperature() -> f32 { 1.0 }
fn default_top_p() -> f32 { 1.0 }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            region: default_region(),
            max_upload_mb: default_max_upload_mb(),
            upstream: UpstreamConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            api_key: String::new(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            top_p: default_top_p(),
        }
    }
}

impl ServerConfig {
    /// Load from `path` if it exists, then fill the API key from the
    /// environment when the file leaves it empty.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) if p.exists() => {
                let contents = std::fs::read_to_string(p)
                    .with_context(|| format!("Failed to read {}", p.display()))?;
                toml::from_str(&contents).with_context(|| format!("Failed to parse {}", p.display()))?
            }
            Some(p) => {
                warn!("{} not found, using defaults", p.display());
                Self::default()
            }
            None => Self::default(),
        };

        if config.upstream.api_key.is_empty() {
            config.upstream.api_key = std::env::var(API_KEY_ENV).unwrap_or_default();
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_hosted_model() {
        let config = ServerConfig::default();
        assert_eq!(config.bind, "0.0.0.0:5051");
        assert_eq!(config.upstream.max_tokens, 1024);
        assert_eq!(config.upstream.temperature, 1.0);
        assert_eq!(config.upstream.top_p, 1.0);
    }

    #[test]
    fn file_values_override_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "bind = \"127.0.0.1:9000\"\nregion = \"Lisbon, Portugal\"\n[upstream]\napi_key = \"from-file\"\nmodel = \"llava\""
        )
        .unwrap();
        let config = ServerConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.bind, "127.0.0.1:9000");
        assert_eq!(config.region, "Lisbon, Portugal");
        assert_eq!(config.upstream.api_key, "from-file");
        assert_eq!(config.upstream.model, "llava");
        assert_eq!(config.upstream.max_tokens, 1024);
    }
}
