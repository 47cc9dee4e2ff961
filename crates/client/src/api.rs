use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use tracing::{debug, info, warn};

use crate::config::{ChatFormat, Config, EndpointConfig};
use crate::error::ClientError;
use crate::media::VIDEO_MIME;
use crate::state::ChatMessage;
use crate::wire::{
    AnalyzeImageBody, ChatBody, ChatMessagesBody, WireMessage, LOCATION_PART, RESPONSE_FIELD,
    SUMMARY_FIELD, VIDEO_PART,
};

/// An encoded image plus the location text sent with it.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub encoded_media: String,
    pub location_text: String,
}

/// Raw video for the multipart endpoint.
#[derive(Debug, Clone)]
pub struct VideoUpload {
    pub bytes: Vec<u8>,
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    pub description: String,
}

/// A follow-up question. `context` is the description the question is about;
/// `history` is only sent in the message-list format.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub context: String,
    pub question: String,
    pub history: Vec<ChatMessage>,
}

/// HTTP client for the analysis service. One attempt per call, no retries.
pub struct ServiceClient {
    http: reqwest::Client,
    endpoint: EndpointConfig,
    chat_format: ChatFormat,
}

impl ServiceClient {
    pub fn new(endpoint: EndpointConfig, chat_format: ChatFormat) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(endpoint.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            endpoint,
            chat_format,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.endpoint.clone(), config.chat.format)
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let request = self.http.post(self.endpoint.url(path));
        match self.endpoint.bearer_token.as_deref() {
            Some(token) if !token.is_empty() => request.bearer_auth(token),
            _ => request,
        }
    }

    pub async fn analyze_image(&self, request: &AnalysisRequest) -> Result<AnalysisResult, ClientError> {
        let body = AnalyzeImageBody {
            image_base64: request.encoded_media.clone(),
            location: request.location_text.clone(),
        };
        info!(
            "Analyzing image ({} bytes encoded), location: {}",
            body.image_base64.len(),
            body.location
        );

        let response = self.post(&self.endpoint.analyze_path).json(&body).send().await?;
        let description = read_text_field(response, RESPONSE_FIELD).await?;
        Ok(AnalysisResult { description })
    }

    pub async fn analyze_video(&self, upload: VideoUpload, location_text: &str) -> Result<AnalysisResult, ClientError> {
        info!(
            "Uploading video {} ({} bytes), location: {location_text}",
            upload.file_name,
            upload.bytes.len()
        );

        let video = Part::bytes(upload.bytes)
            .file_name(upload.file_name)
            .mime_str(VIDEO_MIME)?;
        let form = Form::new()
            .part(VIDEO_PART, video)
            .text(LOCATION_PART, location_text.to_string());

        let response = self.post(&self.endpoint.video_path).multipart(form).send().await?;
        let description = read_text_field(response, SUMMARY_FIELD).await?;
        Ok(AnalysisResult { description })
    }

    /// Ask a follow-up question and return the answer text.
    pub async fn ask(&self, request: &ChatRequest) -> Result<String, ClientError> {
        let builder = self.post(&self.endpoint.chat_path);
        let builder = match self.chat_format {
            ChatFormat::ContextQuestion => builder.json(&ChatBody {
                context: request.context.clone(),
                question: request.question.clone(),
            }),
            ChatFormat::Messages => builder.json(&messages_body(request)),
        };
        debug!("Chat question: {}", request.question);

        let response = builder.send().await?;
        read_text_field(response, RESPONSE_FIELD).await
    }
}

/// Description as the opening assistant turn, then the prior exchange, then
/// the new question.
pub fn messages_body(request: &ChatRequest) -> ChatMessagesBody {
    let mut messages = Vec::with_capacity(request.history.len() + 2);
    messages.push(WireMessage {
        role: "assistant".into(),
        content: request.context.clone(),
    });
    messages.extend(request.history.iter().map(|m| WireMessage {
        role: m.role().as_str().into(),
        content: m.content().to_string(),
    }));
    messages.push(WireMessage {
        role: "user".into(),
        content: request.question.clone(),
    });
    ChatMessagesBody { messages }
}

async fn read_text_field(response: reqwest::Response, field: &str) -> Result<String, ClientError> {
    let status = response.status();
    let body = response.text().await?;
    parse_text_field(status, &body, field)
}

/// Pull a string field out of a JSON body. Anything other than a 2xx object
/// with that field is an unexpected format; the raw body is logged.
pub(crate) fn parse_text_field(status: StatusCode, body: &str, field: &str) -> Result<String, ClientError> {
    if body.trim().is_empty() {
        warn!("Empty response body (HTTP {status})");
        return Err(ClientError::EmptyResponse);
    }

    let unexpected = || {
        warn!("Raw server response (HTTP {status}): {body}");
        ClientError::UnexpectedFormat {
            status: Some(status.as_u16()),
            body: body.to_string(),
        }
    };

    if !status.is_success() {
        return Err(unexpected());
    }

    let json: serde_json::Value = serde_json::from_str(body).map_err(|e| {
        warn!("JSON error: {e}");
        unexpected()
    })?;

    json.get(field)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(unexpected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::test_support;

    use axum::extract::Multipart;
    use axum::http::{HeaderMap, StatusCode as AxumStatus};
    use axum::routing::post;
    use axum::{Json, Router};
    use parking_lot::Mutex;
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn client(base_url: String) -> ServiceClient {
        let endpoint = EndpointConfig {
            base_url,
            timeout_secs: 5,
            ..EndpointConfig::default()
        };
        ServiceClient::new(endpoint, ChatFormat::ContextQuestion)
    }

    fn image_request() -> AnalysisRequest {
        AnalysisRequest {
            encoded_media: "data:image/jpeg;base64,AAAA".into(),
            location_text: "Austin, TX".into(),
        }
    }

    #[test]
    fn parse_rejects_wrong_shapes() {
        let ok = StatusCode::OK;
        assert_eq!(parse_text_field(ok, r#"{"response":"hi"}"#, "response").unwrap(), "hi");
        assert_eq!(
            parse_text_field(ok, "  ", "response").unwrap_err().kind(),
            ErrorKind::EmptyResponse
        );
        for body in [r#"{"summary":"x"}"#, r#"{"response":42}"#, "not json", "[1,2]"] {
            let err = parse_text_field(ok, body, "response").unwrap_err();
            assert_eq!(err.kind(), ErrorKind::UnexpectedFormat, "{body}");
            assert_eq!(err.diagnostic(), Some(body));
        }
        let err = parse_text_field(StatusCode::BAD_GATEWAY, r#"{"response":"x"}"#, "response").unwrap_err();
        assert!(matches!(err, ClientError::UnexpectedFormat { status: Some(502), .. }));
    }

    #[test]
    fn messages_body_orders_context_history_question() {
        let request = ChatRequest {
            context: "A mural of a cat".into(),
            question: "Who painted it?".into(),
            history: vec![
                ChatMessage::user("When was it built?"),
                ChatMessage::assistant("Built in 1920"),
            ],
        };
        let roles: Vec<_> = messages_body(&request)
            .messages
            .into_iter()
            .map(|m| (m.role, m.content))
            .collect();
        assert_eq!(
            roles,
            vec![
                ("assistant".to_string(), "A mural of a cat".to_string()),
                ("user".to_string(), "When was it built?".to_string()),
                ("assistant".to_string(), "Built in 1920".to_string()),
                ("user".to_string(), "Who painted it?".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn analyze_image_posts_data_uri_and_location() {
        let seen: Arc<Mutex<Option<Value>>> = Arc::default();
        let sink = Arc::clone(&seen);
        let router = Router::new().route(
            "/analyze",
            post(move |Json(body): Json<Value>| async move {
                *sink.lock() = Some(body);
                Json(json!({"response": "A mural of a cat"}))
            }),
        );
        let base = test_support::serve(router).await;

        let result = client(base).analyze_image(&image_request()).await.unwrap();
        assert_eq!(result.description, "A mural of a cat");
        let body = seen.lock().clone().unwrap();
        assert_eq!(body["image_base64"], "data:image/jpeg;base64,AAAA");
        assert_eq!(body["location"], "Austin, TX");
    }

    #[tokio::test]
    async fn bearer_token_is_sent_when_configured() {
        let router = Router::new().route(
            "/analyze",
            post(|headers: HeaderMap| async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                Json(json!({"response": auth}))
            }),
        );
        let base = test_support::serve(router).await;
        let endpoint = EndpointConfig {
            base_url: base,
            bearer_token: Some("s3cret".into()),
            ..EndpointConfig::default()
        };
        let client = ServiceClient::new(endpoint, ChatFormat::ContextQuestion);
        let result = client.analyze_image(&image_request()).await.unwrap();
        assert_eq!(result.description, "Bearer s3cret");
    }

    #[tokio::test]
    async fn server_error_is_unexpected_format_with_body() {
        let router = Router::new().route(
            "/analyze",
            post(|| async { (AxumStatus::INTERNAL_SERVER_ERROR, "upstream exploded") }),
        );
        let base = test_support::serve(router).await;

        let err = client(base).analyze_image(&image_request()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnexpectedFormat);
        assert_eq!(err.diagnostic(), Some("upstream exploded"));
    }

    #[tokio::test]
    async fn connection_refused_is_transport_error() {
        let base = test_support::dead_endpoint().await;
        let err = client(base).analyze_image(&image_request()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
    }

    #[tokio::test]
    async fn analyze_video_sends_multipart_parts() {
        let router = Router::new().route(
            "/analyze_video",
            post(|mut multipart: Multipart| async move {
                let mut parts = Vec::new();
                while let Some(field) = multipart.next_field().await.unwrap() {
                    let name = field.name().unwrap_or_default().to_string();
                    let file_name = field.file_name().map(str::to_string);
                    let content_type = field.content_type().map(str::to_string);
                    let data = field.bytes().await.unwrap();
                    parts.push(json!({
                        "name": name,
                        "file_name": file_name,
                        "content_type": content_type,
                        "len": data.len(),
                        "text": String::from_utf8_lossy(&data),
                    }));
                }
                Json(json!({"summary": serde_json::to_string(&parts).unwrap()}))
            }),
        );
        let base = test_support::serve(router).await;

        let upload = VideoUpload {
            bytes: vec![0u8; 1024],
            file_name: "clip.mp4".into(),
        };
        let result = client(base).analyze_video(upload, "No location").await.unwrap();
        let parts: Vec<Value> = serde_json::from_str(&result.description).unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["name"], "video");
        assert_eq!(parts[0]["file_name"], "clip.mp4");
        assert_eq!(parts[0]["content_type"], "video/mp4");
        assert_eq!(parts[0]["len"], 1024);
        assert_eq!(parts[1]["name"], "location");
        assert_eq!(parts[1]["text"], "No location");
    }

    #[tokio::test]
    async fn video_expects_summary_field() {
        let router = Router::new().route(
            "/analyze_video",
            post(|| async { Json(json!({"response": "wrong field"})) }),
        );
        let base = test_support::serve(router).await;
        let upload = VideoUpload {
            bytes: vec![1, 2, 3],
            file_name: "clip.mp4".into(),
        };
        let err = client(base).analyze_video(upload, "x").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnexpectedFormat);
    }

    #[tokio::test]
    async fn chat_formats_differ_on_the_wire() {
        let seen: Arc<Mutex<Vec<Value>>> = Arc::default();
        let sink = Arc::clone(&seen);
        let router = Router::new().route(
            "/chat",
            post(move |Json(body): Json<Value>| async move {
                sink.lock().push(body);
                Json(json!({"response": "Built in 1920"}))
            }),
        );
        let base = test_support::serve(router).await;
        let request = ChatRequest {
            context: "A brick tower".into(),
            question: "When was it built?".into(),
            history: Vec::new(),
        };

        let endpoint = EndpointConfig {
            base_url: base,
            ..EndpointConfig::default()
        };
        let plain = ServiceClient::new(endpoint.clone(), ChatFormat::ContextQuestion);
        let listed = ServiceClient::new(endpoint, ChatFormat::Messages);
        assert_eq!(plain.ask(&request).await.unwrap(), "Built in 1920");
        assert_eq!(listed.ask(&request).await.unwrap(), "Built in 1920");

        let bodies = seen.lock().clone();
        assert_eq!(bodies[0], json!({"context": "A brick tower", "question": "When was it built?"}));
        assert_eq!(bodies[1]["messages"][0]["role"], "assistant");
        assert_eq!(bodies[1]["messages"][1]["content"], "When was it built?");
    }
}
