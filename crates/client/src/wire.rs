//! JSON bodies of the analysis service endpoints, shared by client and server.

use serde::{Deserialize, Serialize};

/// `POST /analyze`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeImageBody {
    /// `data:image/jpeg;base64,...`
    #[serde(default)]
    pub image_base64: String,
    #[serde(default)]
    pub location: String,
}

/// `POST /chat`, default variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatBody {
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub question: String,
}

/// `POST /chat`, message-list variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessagesBody {
    pub messages: Vec<WireMessage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: String,
    pub content: String,
}

/// Response of `/analyze` and `/chat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextResponse {
    pub response: String,
}

/// Response of `/analyze_video`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryResponse {
    pub summary: String,
}

/// Field names the client reads from each response.
pub const RESPONSE_FIELD: &str = "response";
pub const SUMMARY_FIELD: &str = "summary";

/// Multipart part names of `/analyze_video`.
pub const VIDEO_PART: &str = "video";
pub const LOCATION_PART: &str = "location";
