//! Payloads handed to listeners.
//!
//! Observation paths are dotted and snake_case: `socket.event.open`,
//! `socket.api.close`, `api.pre_send`. Older SDKs name the same signals as
//! single camelCase leaves (`socket.eventOpen`, `api.preSend`); splitting the
//! channel into its own level lets a listener on `socket.event` or `socket`
//! observe every transition through normal propagation.

use serde_json::Value;

use cqlink_core::protocol::{
    ApiRequest, ApiResponse, MessageEvent, MetaEvent, NoticeEvent, RequestEvent,
};

use crate::session::Channel;

/// Published before an API request is transmitted.
pub const API_PRE_SEND: &str = "api.pre_send";
/// Published for every API reply that carries an echo.
pub const API_RESPONSE: &str = "api.response";

/// Everything a listener can observe. The path it was published on tells
/// the listener which variant to expect.
#[derive(Debug, Clone)]
pub enum Event {
    /// `socket.event.*` / `socket.api.*`
    Socket(SocketEvent),
    /// `api.pre_send`, before the request is transmitted.
    ApiPreSend(ApiRequest),
    /// `api.response`, for every reply that carries an echo.
    ApiResponse(ApiResponse),
    /// `message.*` and `message_sent.*`
    Message(Box<MessageEvent>),
    /// `notice.*`
    Notice(Box<NoticeEvent>),
    /// `request.*`
    Request(Box<RequestEvent>),
    /// `meta_event.*`
    Meta(Box<MetaEvent>),
    /// Anything published by hand through `emit`.
    Custom(Value),
}

impl Event {
    pub fn as_message(&self) -> Option<&MessageEvent> {
        match self {
            Event::Message(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_notice(&self) -> Option<&NoticeEvent> {
        match self {
            Event::Notice(n) => Some(n),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketEvent {
    pub channel: Channel,
    pub kind: SocketEventKind,
}

impl SocketEvent {
    /// `socket.<channel>.<kind>`
    pub fn path(&self) -> String {
        format!("socket.{}.{}", self.channel.as_str(), self.kind.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEventKind {
    Connecting,
    Open,
    Closing,
    Close { code: u16, reason: String },
    Error(String),
}

impl SocketEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SocketEventKind::Connecting => "connecting",
            SocketEventKind::Open => "open",
            SocketEventKind::Closing => "closing",
            SocketEventKind::Close { .. } => "close",
            SocketEventKind::Error(_) => "error",
        }
    }
}
