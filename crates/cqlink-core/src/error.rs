//! Shared error type across cqlink crates.

use thiserror::Error;

use crate::protocol::api::ApiFailure;

/// Stable error codes, suitable for logs and for matching in caller code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Malformed JSON or an envelope that does not fit its typed shape.
    BadPayload,
    /// Tag notation that cannot be turned into segments.
    BadSegment,
    /// Invalid client configuration.
    Config,
    /// Socket-level failure (handshake, URL, runtime missing).
    Transport,
    /// The server (or the session on its behalf) rejected an API call.
    ApiFailed,
    /// Invariant broken inside the client.
    Internal,
}

impl ErrorCode {
    /// String representation used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::BadPayload => "BAD_PAYLOAD",
            ErrorCode::BadSegment => "BAD_SEGMENT",
            ErrorCode::Config => "CONFIG",
            ErrorCode::Transport => "TRANSPORT",
            ErrorCode::ApiFailed => "API_FAILED",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, CqLinkError>;

/// Unified error type used by core and client.
#[derive(Debug, Error)]
pub enum CqLinkError {
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("encode failed: {0}")]
    Encode(String),
    #[error("bad segment: {0}")]
    Segment(String),
    #[error("invalid config: {0}")]
    Config(String),
    #[error("transport: {0}")]
    Transport(String),
    #[error("api call failed (retcode {}): {}", .0.retcode, .0.msg)]
    Api(Box<ApiFailure>),
    #[error("internal: {0}")]
    Internal(String),
}

impl CqLinkError {
    /// Map to a stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            CqLinkError::Decode(_) | CqLinkError::Encode(_) => ErrorCode::BadPayload,
            CqLinkError::Segment(_) => ErrorCode::BadSegment,
            CqLinkError::Config(_) => ErrorCode::Config,
            CqLinkError::Transport(_) => ErrorCode::Transport,
            CqLinkError::Api(_) => ErrorCode::ApiFailed,
            CqLinkError::Internal(_) => ErrorCode::Internal,
        }
    }

    /// The error envelope, when the failure came from an API call.
    pub fn api_failure(&self) -> Option<&ApiFailure> {
        match self {
            CqLinkError::Api(f) => Some(f),
            _ => None,
        }
    }
}

impl From<ApiFailure> for CqLinkError {
    fn from(f: ApiFailure) -> Self {
        CqLinkError::Api(Box::new(f))
    }
}
