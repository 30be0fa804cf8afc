//! Frame classification for inbound WebSocket traffic.
//!
//! Text frames are passed through untouched; JSON decoding happens in the
//! session layer where the big-integer codec applies. Binary frames are
//! treated as UTF-8 text.

use tokio_tungstenite::tungstenite::{self, Message};

#[derive(Debug, PartialEq, Eq)]
pub enum Inbound {
    Text(String),
    /// Peer close frame; code 1005 when the frame carried none.
    Close { code: u16, reason: String },
    /// Ping/pong and raw frames. The library answers pings itself.
    Control,
    /// Frame that cannot be turned into text; logged and skipped.
    Undecodable(String),
}

pub fn decode(msg: Message) -> Inbound {
    match msg {
        Message::Text(s) => Inbound::Text(s),
        Message::Binary(b) => match String::from_utf8(b) {
            Ok(s) => Inbound::Text(s),
            Err(e) => Inbound::Undecodable(format!("binary frame is not utf-8: {e}")),
        },
        Message::Close(frame) => {
            let (code, reason) = frame
                .map(|cf| (cf.code.into(), cf.reason.to_string()))
                .unwrap_or((1005, String::new()));
            Inbound::Close { code, reason }
        }
        Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => Inbound::Control,
    }
}

/// Close code reported when the connection ends without a close handshake.
pub const ABNORMAL_CLOSE: u16 = 1006;

pub fn describe_error(e: &tungstenite::Error) -> String {
    match e {
        tungstenite::Error::Http(resp) => format!("handshake rejected with status {}", resp.status()),
        other => other.to_string(),
    }
}
