//! Capture-and-ask flow over the shared [`Store`].
//!
//! Each capture or question runs as `Idle -> Sending -> {Succeeded, Failed}`
//! and both outcomes return to idle by clearing `is_loading`. A new capture
//! bumps the request generation, so any response still in flight for the
//! previous capture is discarded instead of overwriting the new session.

use std::sync::Arc;

use tracing::{info, warn};

use crate::api::{AnalysisRequest, AnalysisResult, ChatRequest, ServiceClient, VideoUpload};
use crate::config::{Config, EncoderConfig};
use crate::encoder;
use crate::error::{ClientError, ErrorKind};
use crate::location::{describe_location, LocationResolver};
use crate::logging::SessionLog;
use crate::media::{CapturedPhoto, CapturedVideo, Speaker};
use crate::state::{CapturedMedia, ChatMessage, Store};

pub const VIDEO_PROCESSING: &str = "Processing video...";
pub const CHAT_FAILED: &str = "Could not get chat response.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    fn label(self) -> &'static str {
        match self {
            Self::Image => "photo",
            Self::Video => "video",
        }
    }
}

/// Building-context text shown for a failed analysis.
pub fn failure_message(media: MediaKind, err: &ClientError) -> &'static str {
    match (media, err.kind()) {
        (MediaKind::Image, ErrorKind::EmptyResponse) => "No response received.",
        (MediaKind::Image, ErrorKind::UnexpectedFormat) => "Unexpected response format.",
        (MediaKind::Image, ErrorKind::Encoding | ErrorKind::Io) => "Failed to encode image.",
        (MediaKind::Image, _) => "Failed to process image.",
        (MediaKind::Video, ErrorKind::EmptyResponse) => "No response from server.",
        (MediaKind::Video, ErrorKind::UnexpectedFormat) => "Unexpected server response.",
        (MediaKind::Video, ErrorKind::Encoding | ErrorKind::Io) => "Failed to read video.",
        (MediaKind::Video, _) => "Failed to upload video.",
    }
}

struct Inner {
    store: Store,
    client: ServiceClient,
    encoder: EncoderConfig,
    location: Arc<dyn LocationResolver>,
    transcript: SessionLog,
}

/// Cheap to clone; clones share one store and client.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl Session {
    pub fn new(client: ServiceClient, encoder: EncoderConfig, location: Arc<dyn LocationResolver>) -> Self {
        Self::with_transcript(client, encoder, location, SessionLog::disabled())
    }

    pub fn with_transcript(
        client: ServiceClient,
        encoder: EncoderConfig,
        location: Arc<dyn LocationResolver>,
        transcript: SessionLog,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store: Store::new(),
                client,
                encoder,
                location,
                transcript,
            }),
        }
    }

    pub fn from_config(config: &Config, location: Arc<dyn LocationResolver>) -> Self {
        Self::with_transcript(
            ServiceClient::from_config(config),
            config.encoder.clone(),
            location,
            SessionLog::new(&config.logging),
        )
    }

    pub fn store(&self) -> &Store {
        &self.inner.store
    }

    pub fn set_question(&self, question: impl Into<String>) {
        let question = question.into();
        self.inner.store.update(|s| s.question = question);
    }

    /// Start a new photo session: clear the conversation, encode the photo,
    /// and ask the service to describe it.
    pub async fn analyze_photo(&self, photo: CapturedPhoto) -> Result<AnalysisResult, ClientError> {
        let inner = &self.inner;
        let location_text = describe_location(inner.location.as_ref(), photo.location);
        let media = CapturedMedia::Photo {
            width: photo.image.width(),
            height: photo.image.height(),
        };
        let generation = inner.store.update(|s| s.begin_capture(media));
        inner.transcript.start(MediaKind::Image.label(), &location_text);
        info!("Capture {generation}: photo, location: {location_text}");

        let encoded = match encoder::encode_image(&photo.image, &inner.encoder) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!("Failed to convert image to JPEG data: {e}");
                return self.finish_analysis(generation, MediaKind::Image, Err(e.into()));
            }
        };

        let request = AnalysisRequest {
            encoded_media: encoded.data_uri,
            location_text,
        };
        let result = inner.client.analyze_image(&request).await;
        self.finish_analysis(generation, MediaKind::Image, result)
    }

    /// Start a new video session and upload the clip for a summary.
    pub async fn analyze_video(&self, video: CapturedVideo) -> Result<AnalysisResult, ClientError> {
        let inner = &self.inner;
        let location_text = describe_location(inner.location.as_ref(), video.location);
        let media = CapturedMedia::Video {
            path: video.path.clone(),
        };
        let generation = inner.store.update(|s| {
            let generation = s.begin_capture(media);
            s.building_context = VIDEO_PROCESSING.into();
            generation
        });
        inner.transcript.start(MediaKind::Video.label(), &location_text);
        info!("Capture {generation}: video {}, location: {location_text}", video.path.display());

        let bytes = match tokio::fs::read(&video.path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Could not read {}: {e}", video.path.display());
                return self.finish_analysis(generation, MediaKind::Video, Err(e.into()));
            }
        };

        let upload = VideoUpload {
            bytes,
            file_name: video.file_name(),
        };
        let result = inner.client.analyze_video(upload, &location_text).await;
        self.finish_analysis(generation, MediaKind::Video, result)
    }

    fn finish_analysis(
        &self,
        generation: u64,
        media: MediaKind,
        result: Result<AnalysisResult, ClientError>,
    ) -> Result<AnalysisResult, ClientError> {
        let applied = self.inner.store.update_if_current(generation, |s| {
            s.is_loading = false;
            s.building_context = match &result {
                Ok(r) => r.description.clone(),
                Err(e) => failure_message(media, e).to_string(),
            };
        });

        if !applied {
            info!("Capture {generation} superseded, discarding its response");
            return Err(ClientError::Superseded);
        }
        match &result {
            Ok(r) => self.inner.transcript.log_description(&r.description),
            Err(e) => warn!("Capture {generation} failed: {e}"),
        }
        result
    }

    /// Ask a question about the current building context.
    ///
    /// Rejected without a request when the question is blank or another
    /// request is in flight. On failure an error notice is appended as an
    /// assistant message and the typed question is kept.
    pub async fn ask(&self, question: &str) -> Result<String, ClientError> {
        let question = question.trim().to_string();
        if question.is_empty() {
            return Err(ClientError::EmptyQuestion);
        }

        let inner = &self.inner;
        let (generation, request) = inner.store.update(|s| {
            if s.is_loading {
                return Err(ClientError::Busy);
            }
            s.is_loading = true;
            s.request_generation += 1;
            let request = ChatRequest {
                context: s.building_context.clone(),
                question: question.clone(),
                history: s.messages.clone(),
            };
            Ok((s.request_generation, request))
        })?;

        let result = inner.client.ask(&request).await;

        let applied = inner.store.update_if_current(generation, |s| {
            s.is_loading = false;
            match &result {
                Ok(answer) => {
                    s.messages.push(ChatMessage::user(question.clone()));
                    s.messages.push(ChatMessage::assistant(answer.clone()));
                    s.question.clear();
                }
                Err(_) => s.messages.push(ChatMessage::assistant(CHAT_FAILED)),
            }
        });

        if !applied {
            info!("Question superseded by a new capture, discarding answer");
            return Err(ClientError::Superseded);
        }
        match &result {
            Ok(answer) => inner.transcript.log_exchange(&question, answer),
            Err(e) => warn!("Chat error: {e}"),
        }
        result
    }

    /// Read the current description aloud. Does nothing while it is empty.
    pub fn speak_description(&self, speaker: &dyn Speaker) {
        let context = self.inner.store.read(|s| s.building_context.clone());
        if !context.is_empty() {
            speaker.speak(&context);
        }
    }
}
