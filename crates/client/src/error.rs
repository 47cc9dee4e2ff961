use thiserror::Error;

use crate::encoder::EncodeError;

/// Coarse classification of a failed request, for presentation layers that
/// only need to pick a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    EmptyResponse,
    UnexpectedFormat,
    Encoding,
    Io,
    Busy,
    EmptyQuestion,
    Superseded,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {source}")]
    Transport {
        timed_out: bool,
        #[source]
        source: reqwest::Error,
    },
    #[error("empty response body")]
    EmptyResponse,
    /// Non-2xx status, invalid JSON or a missing field. `body` holds the raw
    /// response for diagnostics.
    #[error("unexpected response format (status {status:?})")]
    UnexpectedFormat { status: Option<u16>, body: String },
    #[error(transparent)]
    Encoding(#[from] EncodeError),
    #[error("failed to read media: {0}")]
    Io(#[from] std::io::Error),
    #[error("another request is in flight")]
    Busy,
    #[error("question is empty")]
    EmptyQuestion,
    /// A newer capture or question replaced this request before it completed.
    #[error("request superseded by a newer one")]
    Superseded,
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport {
            timed_out: e.is_timeout(),
            source: e,
        }
    }
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport { .. } => ErrorKind::Transport,
            Self::EmptyResponse => ErrorKind::EmptyResponse,
            Self::UnexpectedFormat { .. } => ErrorKind::UnexpectedFormat,
            Self::Encoding(_) => ErrorKind::Encoding,
            Self::Io(_) => ErrorKind::Io,
            Self::Busy => ErrorKind::Busy,
            Self::EmptyQuestion => ErrorKind::EmptyQuestion,
            Self::Superseded => ErrorKind::Superseded,
        }
    }

    /// Raw server body captured for an unexpected response, if any.
    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            Self::UnexpectedFormat { body, .. } => Some(body),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unexpected_format_exposes_raw_body() {
        let err = ClientError::UnexpectedFormat {
            status: Some(500),
            body: "<html>oops</html>".into(),
        };
        assert_eq!(err.kind(), ErrorKind::UnexpectedFormat);
        assert_eq!(err.diagnostic(), Some("<html>oops</html>"));
    }

    #[test]
    fn other_kinds_have_no_diagnostic() {
        assert_eq!(ClientError::EmptyResponse.diagnostic(), None);
        assert_eq!(ClientError::Busy.kind(), ErrorKind::Busy);
        let io = ClientError::from(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert_eq!(io.kind(), ErrorKind::Io);
    }
}
