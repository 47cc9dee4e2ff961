use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use client::encoder::decode_data_uri;
use client::wire::{
    AnalyzeImageBody, ChatBody, ChatMessagesBody, SummaryResponse, TextResponse, LOCATION_PART,
    VIDEO_PART,
};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::upstream::{OaiMessage, Upstream};

pub struct ServerState {
    pub upstream: Upstream,
    pub region: String,
}

/// Either `/chat` body shape the client can send.
#[derive(Deserialize)]
#[serde(untagged)]
enum ChatPayload {
    Messages(ChatMessagesBody),
    Plain(ChatBody),
}

type TextReply = (StatusCode, Json<TextResponse>);

fn text_reply(status: StatusCode, text: impl Into<String>) -> TextReply {
    (status, Json(TextResponse { response: text.into() }))
}

/// A body that is not JSON still gets the `{"response": ...}` shape.
fn rejected(rejection: JsonRejection) -> TextReply {
    warn!("Rejected request body: {rejection}");
    text_reply(rejection.status(), format!("Error: {}", rejection.body_text()))
}

pub fn router(state: Arc<ServerState>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/analyze", post(analyze_image))
        .route("/chat", post(chat))
        .route("/analyze_video", post(analyze_video))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

pub fn describe_prompt(region: &str, location: &str) -> String {
    format!(
        "Describe the image in detail. \
         It might be a mural, sculpture, street art, landmark, or something unique in {region}. \
         Approximate location: {location}"
    )
}

pub fn guide_prompt(context: &str) -> String {
    format!(
        "You are a knowledgeable local guide. Answer the user's questions about the \
         subject described below. Be concise and factual.\n\nDescription:\n{context}"
    )
}

async fn analyze_image(
    State(state): State<Arc<ServerState>>,
    body: Result<Json<AnalyzeImageBody>, JsonRejection>,
) -> TextReply {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return rejected(rejection),
    };
    info!("/analyze hit, location: {}", body.location);
    if body.image_base64.is_empty() {
        return text_reply(StatusCode::BAD_REQUEST, "Missing image_base64 field");
    }
    match decode_data_uri(&body.image_base64) {
        Some((mime, bytes)) => debug!("Image: {mime}, {} bytes", bytes.len()),
        None => debug!("image_base64 is not a data URI, forwarding as URL"),
    }

    let prompt = describe_prompt(&state.region, &body.location);
    let messages = vec![OaiMessage::user_with_image(prompt, body.image_base64)];
    match state.upstream.complete(messages).await {
        Ok(output) => {
            info!("Model output: {output}");
            text_reply(StatusCode::OK, output)
        }
        Err(e) => {
            warn!("/analyze failed: {e}");
            text_reply(StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {e}"))
        }
    }
}

/// Upstream conversation for a `/chat` body: guide prompt, prior turns, question.
fn chat_messages(payload: ChatPayload) -> Option<Vec<OaiMessage>> {
    match payload {
        ChatPayload::Plain(body) => {
            if body.question.trim().is_empty() {
                return None;
            }
            Some(vec![
                OaiMessage::system(guide_prompt(&body.context)),
                OaiMessage::user(body.question),
            ])
        }
        ChatPayload::Messages(body) => {
            let mut turns = body.messages.into_iter();
            // The first assistant turn is the image description.
            let context = turns.next().filter(|m| m.role == "assistant")?.content;
            let mut messages = vec![OaiMessage::system(guide_prompt(&context))];
            messages.extend(turns.map(|m| match m.role.as_str() {
                "assistant" => OaiMessage::assistant(m.content),
                _ => OaiMessage::user(m.content),
            }));
            (messages.len() > 1).then_some(messages)
        }
    }
}

async fn chat(
    State(state): State<Arc<ServerState>>,
    payload: Result<Json<ChatPayload>, JsonRejection>,
) -> TextReply {
    info!("/chat hit");
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return rejected(rejection),
    };
    let Some(messages) = chat_messages(payload) else {
        return text_reply(StatusCode::BAD_REQUEST, "Missing question field");
    };
    match state.upstream.complete(messages).await {
        Ok(answer) => text_reply(StatusCode::OK, answer),
        Err(e) => {
            warn!("/chat failed: {e}");
            text_reply(StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {e}"))
        }
    }
}

/// Accepts the upload but cannot summarize it: the upstream API takes
/// images only.
async fn analyze_video(mut multipart: Multipart) -> (StatusCode, Json<SummaryResponse>) {
    let reply = |status: StatusCode, summary: &str| {
        (
            status,
            Json(SummaryResponse {
                summary: summary.to_string(),
            }),
        )
    };

    let mut video_len = 0usize;
    let mut location = String::new();
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                warn!("/analyze_video bad multipart body: {e}");
                return reply(StatusCode::BAD_REQUEST, "Malformed multipart body");
            }
        };
        let name = field.name().unwrap_or_default().to_string();
        let data = match field.bytes().await {
            Ok(data) => data,
            Err(e) => {
                warn!("/analyze_video failed reading part {name}: {e}");
                return reply(StatusCode::BAD_REQUEST, "Malformed multipart body");
            }
        };
        if name == VIDEO_PART {
            video_len = data.len();
        } else if name == LOCATION_PART {
            location = String::from_utf8_lossy(&data).into_owned();
        }
    }

    info!("/analyze_video hit, {video_len} bytes, location: {location}");
    if video_len == 0 {
        return reply(StatusCode::BAD_REQUEST, "Missing video part");
    }
    reply(
        StatusCode::NOT_IMPLEMENTED,
        "Video analysis is not supported by this server",
    )
}
