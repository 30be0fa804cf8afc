//! WebSocket client socket.
//!
//! One [`SocketTask`] owns one connection for its whole life:
//! - handshake (URL + headers, bounded by the connect timeout)
//! - writer: drains the outbound queue into the sink
//! - reader: classifies frames and reports them as [`SocketSignal`]s
//! - graceful close: code 1000, then wait for the peer's close frame
//!
//! The task never touches session state; everything it observes goes out
//! through the `emit` callback, in order.

use std::time::Duration;

use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use cqlink_core::error::{CqLinkError, Result};

use crate::transport::codec::{decode, describe_error, Inbound, ABNORMAL_CLOSE};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// What the session asks a socket to do.
#[derive(Debug)]
pub enum Outbound {
    Text(String),
    Close,
}

/// What a socket reports back, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketSignal {
    Open,
    Text(String),
    /// Peer started the closing handshake.
    Closing { code: u16, reason: String },
    /// Terminal; nothing follows.
    Closed { code: u16, reason: String },
    Error(String),
}

/// Open a client connection to `url` with extra handshake headers.
pub async fn connect(url: &Url, headers: &[(String, String)], timeout: Duration) -> Result<WsStream> {
    let mut request = url
        .as_str()
        .into_client_request()
        .map_err(|e| CqLinkError::Transport(format!("invalid websocket url {url}: {e}")))?;

    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| CqLinkError::Transport(format!("invalid header name {name}: {e}")))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|e| CqLinkError::Transport(format!("invalid header value for {name}: {e}")))?;
        request.headers_mut().insert(header_name, header_value);
    }

    let (stream, _response) = tokio::time::timeout(timeout, tokio_tungstenite::connect_async(request))
        .await
        .map_err(|_| CqLinkError::Transport(format!("connect to {url} timed out")))?
        .map_err(|e| CqLinkError::Transport(format!("connect to {url} failed: {}", describe_error(&e))))?;

    Ok(stream)
}

pub struct SocketTask {
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub connect_timeout: Duration,
    pub close_timeout: Duration,
    pub outbound: mpsc::UnboundedReceiver<Outbound>,
}

impl SocketTask {
    pub async fn run<F>(self, emit: F)
    where
        F: Fn(SocketSignal) + Send + Sync,
    {
        let SocketTask {
            url,
            headers,
            connect_timeout,
            close_timeout,
            mut outbound,
        } = self;

        let stream = match connect(&url, &headers, connect_timeout).await {
            Ok(s) => s,
            Err(e) => {
                emit(SocketSignal::Error(e.to_string()));
                emit(SocketSignal::Closed {
                    code: ABNORMAL_CLOSE,
                    reason: String::new(),
                });
                return;
            }
        };
        tracing::debug!(%url, "socket open");
        emit(SocketSignal::Open);

        let (mut ws_tx, mut ws_rx) = stream.split();
        let mut peer_close: Option<(u16, String)> = None;

        let (code, reason) = loop {
            tokio::select! {
                // outbound writer
                maybe_out = outbound.recv(), if peer_close.is_none() => {
                    match maybe_out {
                        Some(Outbound::Text(text)) => {
                            if let Err(e) = ws_tx.send(Message::Text(text)).await {
                                emit(SocketSignal::Error(describe_error(&e)));
                                break (ABNORMAL_CLOSE, String::new());
                            }
                        }
                        // explicit close or every sender dropped
                        Some(Outbound::Close) | None => {
                            let frame = CloseFrame {
                                code: CloseCode::Normal,
                                reason: "".into(),
                            };
                            if ws_tx.send(Message::Close(Some(frame))).await.is_err() {
                                break (ABNORMAL_CLOSE, String::new());
                            }
                            break drain_until_close(&mut ws_rx, close_timeout, &emit).await;
                        }
                    }
                }

                // inbound reader
                incoming = ws_rx.next() => {
                    let Some(incoming) = incoming else {
                        break peer_close.take().unwrap_or((ABNORMAL_CLOSE, String::new()));
                    };
                    let msg = match incoming {
                        Ok(m) => m,
                        Err(e) => {
                            if let Some(close) = peer_close.take() {
                                break close;
                            }
                            emit(SocketSignal::Error(describe_error(&e)));
                            break (ABNORMAL_CLOSE, String::new());
                        }
                    };
                    match decode(msg) {
                        Inbound::Text(text) => emit(SocketSignal::Text(text)),
                        Inbound::Close { code, reason } => {
                            // the library queues the close reply; keep reading until the stream ends
                            emit(SocketSignal::Closing { code, reason: reason.clone() });
                            peer_close = Some((code, reason));
                        }
                        Inbound::Control => {}
                        Inbound::Undecodable(why) => tracing::warn!(%url, %why, "inbound frame dropped"),
                    }
                }
            }
        };

        tracing::debug!(%url, code, %reason, "socket closed");
        emit(SocketSignal::Closed { code, reason });
    }
}

/// Read until the peer answers our close frame or the grace period runs out.
/// Text that arrives meanwhile is still delivered.
async fn drain_until_close<F>(
    ws_rx: &mut SplitStream<WsStream>,
    grace: Duration,
    emit: &F,
) -> (u16, String)
where
    F: Fn(SocketSignal),
{
    let wait = async {
        while let Some(Ok(msg)) = ws_rx.next().await {
            match decode(msg) {
                Inbound::Text(text) => emit(SocketSignal::Text(text)),
                Inbound::Close { code, reason } => return (code, reason),
                Inbound::Control | Inbound::Undecodable(_) => {}
            }
        }
        (1000, String::new())
    };
    tokio::time::timeout(grace, wait)
        .await
        .unwrap_or((ABNORMAL_CLOSE, "close handshake timed out".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn refused_connection_reports_error_then_close() {
        let (_tx, rx) = mpsc::unbounded_channel();
        let task = SocketTask {
            url: Url::parse("ws://127.0.0.1:1/api").unwrap(),
            headers: Vec::new(),
            connect_timeout: Duration::from_secs(2),
            close_timeout: Duration::from_millis(100),
            outbound: rx,
        };

        let seen = std::sync::Mutex::new(Vec::new());
        task.run(|s| seen.lock().unwrap().push(s)).await;

        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(matches!(seen[0], SocketSignal::Error(_)));
        assert_eq!(
            seen[1],
            SocketSignal::Closed {
                code: ABNORMAL_CLOSE,
                reason: String::new()
            }
        );
    }

    #[tokio::test]
    async fn bad_header_name_is_rejected_before_dialing() {
        let url = Url::parse("ws://127.0.0.1:1/").unwrap();
        let err = connect(&url, &[("bad name".into(), "x".into())], Duration::from_secs(1))
            .await
            .err();
        assert!(err.is_some_and(|e| e.to_string().contains("invalid header name")));
    }
}
