use std::time::Duration;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::UpstreamConfig;

static HTTP: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(120))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
});

// --- OpenAI-compatible request/response structs ---

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<OaiMessage>,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
    stream: bool,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct OaiMessage {
    pub role: &'static str,
    pub content: OaiContent,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum OaiContent {
    Text(String),
    Parts(Vec<OaiContentPart>),
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum OaiContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ImageUrl {
    pub url: String,
}

impl OaiMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: OaiContent::Text(text.into()),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: OaiContent::Text(text.into()),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: "assistant",
            content: OaiContent::Text(text.into()),
        }
    }

    /// A user turn carrying a prompt and an image URL (data URIs allowed).
    pub fn user_with_image(text: impl Into<String>, image_url: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: OaiContent::Parts(vec![
                OaiContentPart::Text { text: text.into() },
                OaiContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: image_url.into(),
                    },
                },
            ]),
        }
    }
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("model request timed out")]
    Timeout,
    #[error("cannot connect to {0}")]
    Connect(String),
    #[error("model request failed: {0}")]
    Request(String),
    #[error("model error (HTTP {status}): {body}")]
    Status { status: u16, body: String },
    #[error("failed to parse model response: {0}")]
    Parse(String),
    #[error("empty response from model")]
    Empty,
}

/// Non-streaming chat completions against one configured model.
pub struct Upstream {
    config: UpstreamConfig,
}

impl Upstream {
    pub fn new(config: UpstreamConfig) -> Self {
        Self { config }
    }

    pub async fn complete(&self, messages: Vec<OaiMessage>) -> Result<String, UpstreamError> {
        let config = &self.config;
        let request = ChatCompletionRequest {
            model: &config.model,
            messages,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            top_p: config.top_p,
            stream: false,
        };

        let mut builder = HTTP
            .post(&config.endpoint)
            .header("content-type", "application/json")
            .json(&request);
        if !config.api_key.is_empty() {
            builder = builder.bearer_auth(&config.api_key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                UpstreamError::Timeout
            } else if e.is_connect() {
                UpstreamError::Connect(config.endpoint.clone())
            } else {
                UpstreamError::Request(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let resp: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::Parse(e.to_string()))?;

        resp.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or(UpstreamError::Empty)
    }
}
