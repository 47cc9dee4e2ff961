//! Client library for Unveil: encode a captured photo or video, send it with
//! the device location to the analysis service, and hold a follow-up
//! conversation about the description it returns.

pub mod api;
pub mod config;
pub mod encoder;
pub mod error;
pub mod location;
pub mod logging;
pub mod media;
pub mod session;
pub mod state;
pub mod wire;

#[cfg(test)]
mod test_support;

pub use api::{AnalysisRequest, AnalysisResult, ChatRequest, ServiceClient, VideoUpload};
pub use config::Config;
pub use error::{ClientError, ErrorKind};
pub use session::Session;
pub use state::{AppState, ChatMessage, MessageRole, Store};
