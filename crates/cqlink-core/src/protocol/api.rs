//! API request/response envelopes.

use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Retcode used for failures produced locally, without a server reply.
pub const LOCAL_RETCODE: i64 = -1;

/// Outbound call, `{action, params, echo}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiRequest {
    pub action: String,
    #[serde(default)]
    pub params: Value,
    /// Correlation token, unique among in-flight calls.
    pub echo: String,
}

/// Reply as read off the API socket.
///
/// Servers disagree on whether the error text lives in `msg` or `message`;
/// both are accepted and [`ApiResponse::message_text`] picks whichever is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub retcode: i64,
    #[serde(default)]
    pub msg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub wording: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub echo: Option<String>,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        self.retcode == 0
    }

    pub fn message_text(&self) -> &str {
        if !self.msg.is_empty() {
            return &self.msg;
        }
        self.message.as_deref().unwrap_or_default()
    }

    /// Split into the payload (retcode 0) or the full error envelope.
    pub fn into_result(self) -> Result<Value, ApiFailure> {
        if self.is_success() {
            return Ok(self.data);
        }
        let msg = self.message_text().to_string();
        Err(ApiFailure {
            status: self.status,
            retcode: self.retcode,
            msg,
            wording: self.wording,
            data: self.data,
            echo: self.echo.unwrap_or_default(),
        })
    }
}

/// Error envelope delivered to callers of a failed API call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiFailure {
    pub status: String,
    pub retcode: i64,
    pub msg: String,
    pub wording: String,
    pub data: Value,
    pub echo: String,
}

impl ApiFailure {
    fn local(msg: &str, wording: &str, echo: &str) -> Self {
        Self {
            status: "failed".into(),
            retcode: LOCAL_RETCODE,
            msg: msg.into(),
            wording: wording.into(),
            data: Value::Null,
            echo: echo.into(),
        }
    }

    /// The API socket was never opened, or its handle is gone.
    pub fn not_connected(echo: &str) -> Self {
        Self::local("api socket is not connected", "not connected", echo)
    }

    /// The API socket is closing.
    pub fn closed(echo: &str) -> Self {
        Self::local("api socket is closed", "connection closed", echo)
    }

    /// The call was sent, but the socket closed before its reply arrived.
    pub fn dropped(echo: &str) -> Self {
        Self::local("api socket closed before reply", "connection lost", echo)
    }

    /// True for failures synthesized by the client rather than the server.
    pub fn is_local(&self) -> bool {
        self.retcode == LOCAL_RETCODE
    }
}

/// One entry of the API surface: method name plus parameter and result shapes.
pub trait Action {
    const NAME: &'static str;
    type Params: Serialize;
    type Output: DeserializeOwned;
}

/// Parameters of methods that take none. Serializes as `{}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoParams {}

/// Result of methods that return nothing useful. Accepts any `data`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Ack;

impl<'de> Deserialize<'de> for Ack {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        IgnoredAny::deserialize(deserializer)?;
        Ok(Ack)
    }
}
