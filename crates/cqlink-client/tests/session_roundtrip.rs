//! Session tests against an in-process mock server.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message as WsMessage;

use cqlink_client::config::ClientConfig;
use cqlink_client::dispatch::{Event, SocketEventKind};
use cqlink_client::{Channel, Client, SocketState};
use cqlink_core::protocol::actions::{MessageIdParams, NoParams};

const WAIT: Duration = Duration::from_secs(5);

type Replies = Arc<dyn Fn(&Value) -> Vec<String> + Send + Sync>;

#[derive(Debug)]
struct Handshake {
    uri: String,
    token_header: Option<String>,
}

/// Mock server: `/api` answers each request with `replies(request)`,
/// `/` pushes `events` right after the handshake.
async fn serve(replies: Replies, events: Vec<String>) -> (String, mpsc::UnboundedReceiver<Handshake>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (seen_tx, seen_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((tcp, _)) = listener.accept().await {
            let (replies, events, seen_tx) = (replies.clone(), events.clone(), seen_tx.clone());
            tokio::spawn(async move {
                let mut uri = String::new();
                let mut token_header = None;
                let callback = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                    uri = req.uri().to_string();
                    token_header = req
                        .headers()
                        .get("access_token")
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    Ok(resp)
                };
                let Ok(ws) = tokio_tungstenite::accept_hdr_async(tcp, callback).await else {
                    return;
                };
                let is_api = uri.starts_with("/api");
                let _ = seen_tx.send(Handshake { uri, token_header });

                let (mut tx, mut rx) = ws.split();
                if !is_api {
                    for e in events {
                        if tx.send(WsMessage::Text(e)).await.is_err() {
                            return;
                        }
                    }
                }
                // keep reading so close frames get answered
                while let Some(Ok(msg)) = rx.next().await {
                    if let (true, WsMessage::Text(t)) = (is_api, msg) {
                        let req: Value = serde_json::from_str(&t).unwrap();
                        for reply in replies(&req) {
                            if tx.send(WsMessage::Text(reply)).await.is_err() {
                                return;
                            }
                        }
                    }
                }
            });
        }
    });

    (format!("ws://{addr}"), seen_rx)
}

fn ok_reply(req: &Value, data: Value) -> String {
    json!({"status": "ok", "retcode": 0, "data": data, "echo": req["echo"]}).to_string()
}

fn config(base: &str) -> ClientConfig {
    let mut cfg = ClientConfig::from_base_url(base);
    cfg.transport.close_timeout_ms = 500;
    cfg
}

async fn connected(cfg: ClientConfig) -> Client {
    let client = Client::new(cfg).unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    client.on("socket.api.open", move |_| {
        let _ = tx.send(());
    });
    client.connect().unwrap();
    timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    client
}

#[tokio::test]
async fn reply_resolves_once_and_duplicates_are_ignored() {
    let replies: Replies = Arc::new(|req| {
        let reply = ok_reply(req, json!({"user_id": 1234567890123456789_u64, "nickname": "bot"}));
        let stranger = json!({"status": "ok", "retcode": 0, "data": null, "echo": "stranger"});
        let no_echo = json!({"status": "ok", "retcode": 0, "data": null});
        vec![reply.clone(), reply, no_echo.to_string(), stranger.to_string()]
    });
    let (base, _) = serve(replies, Vec::new()).await;
    let client = connected(config(&base)).await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    client.on("api.response", move |ev| {
        if let Event::ApiResponse(r) = ev {
            let _ = tx.send(r.echo.clone().unwrap_or_default());
        }
    });

    let me = client.get_login_info(&NoParams {}).await.unwrap();
    assert_eq!(me.user_id, 1_234_567_890_123_456_789);
    assert_eq!(me.nickname, "bot");

    let mut echoes = Vec::new();
    for _ in 0..3 {
        echoes.push(timeout(WAIT, rx.recv()).await.unwrap().unwrap());
    }
    assert_eq!(echoes[0], echoes[1]);
    assert_eq!(echoes[2], "stranger");
    assert_eq!(client.pending_calls(), 0);

    client.disconnect();
}

#[tokio::test]
async fn send_without_api_socket_is_rejected_locally() {
    let client = Client::new(config("ws://127.0.0.1:9")).unwrap();
    let pre_sends = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&pre_sends);
    client.on("api.pre_send", move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let err = client
        .send("get_login_info", &json!({}))
        .await
        .unwrap_err();
    let failure = err.api_failure().expect("api failure");
    assert!(failure.is_local());
    assert_eq!(failure.msg, "api socket is not connected");
    assert!(!failure.echo.is_empty());
    assert_eq!(pre_sends.load(Ordering::SeqCst), 1);
    assert_eq!(client.pending_calls(), 0);
    assert_eq!(client.socket_state(Channel::Api), SocketState::Disconnected);
}

#[tokio::test]
async fn server_failure_is_reported_with_its_retcode() {
    let replies: Replies = Arc::new(|req| {
        vec![json!({
            "status": "failed",
            "retcode": 1404,
            "message": "message not found",
            "wording": "missing",
            "data": null,
            "echo": req["echo"]
        })
        .to_string()]
    });
    let (base, _) = serve(replies, Vec::new()).await;
    let client = connected(config(&base)).await;

    let err = client
        .delete_msg(&MessageIdParams { message_id: 5 })
        .await
        .unwrap_err();
    assert_eq!(err.code().as_str(), "API_FAILED");
    let failure = err.api_failure().unwrap();
    assert_eq!(failure.retcode, 1404);
    assert_eq!(failure.msg, "message not found");
    assert!(!failure.is_local());

    client.disconnect();
}

#[tokio::test]
async fn events_flow_and_tokens_reach_the_server() {
    let event = json!({
        "post_type": "message",
        "message_type": "private",
        "sub_type": "friend",
        "message_id": 1,
        "user_id": 42,
        "message": [{"type": "text", "data": {"text": "ping"}}],
        "raw_message": "ping",
        "font": 0,
        "sender": {"user_id": 42, "nickname": "alice"},
        "self_id": 10001,
        "time": 1
    });
    let (base, mut seen) = serve(Arc::new(|_| Vec::new()), vec![event.to_string()]).await;

    let mut cfg = config(&base);
    cfg.access_token = Some("t0k".into());
    let client = Client::new(cfg).unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    client.on("message.private", move |ev| {
        let m = ev.as_message().unwrap();
        let _ = tx.send(m.message.plain_text().unwrap());
    });
    client.connect().unwrap();

    assert_eq!(timeout(WAIT, rx.recv()).await.unwrap().unwrap(), "ping");

    let mut uris = Vec::new();
    for _ in 0..2 {
        let h = timeout(WAIT, seen.recv()).await.unwrap().unwrap();
        assert_eq!(h.token_header.as_deref(), Some("t0k"));
        uris.push(h.uri);
    }
    uris.sort();
    assert_eq!(uris, vec!["/?access_token=t0k", "/api?access_token=t0k"]);

    client.disconnect();
}

#[tokio::test]
async fn disconnect_rejects_calls_in_flight() {
    // never answers
    let (base, _) = serve(Arc::new(|_| Vec::new()), Vec::new()).await;
    let client = connected(config(&base)).await;

    let (pre_tx, mut pre_rx) = mpsc::unbounded_channel();
    client.on("api.pre_send", move |_| {
        let _ = pre_tx.send(());
    });
    let (close_tx, mut close_rx) = mpsc::unbounded_channel();
    client.on("socket.api.close", move |ev| {
        if let Event::Socket(s) = ev {
            if let SocketEventKind::Close { code, .. } = s.kind {
                let _ = close_tx.send(code);
            }
        }
    });

    let c = client.clone();
    let call = tokio::spawn(async move { c.send("set_restart", &json!({})).await });
    timeout(WAIT, pre_rx.recv()).await.unwrap().unwrap();

    client.disconnect();
    assert_eq!(client.socket_state(Channel::Api), SocketState::Disconnected);
    client.disconnect();

    let err = timeout(WAIT, call).await.unwrap().unwrap().unwrap_err();
    assert!(err.api_failure().unwrap().is_local(), "{err}");
    assert_eq!(timeout(WAIT, close_rx.recv()).await.unwrap().unwrap(), 1000);
    assert_eq!(client.pending_calls(), 0);

    let after = client.send("get_status", &json!({})).await.unwrap_err();
    assert_eq!(after.api_failure().unwrap().msg, "api socket is not connected");
}

#[tokio::test]
async fn reconnect_opens_fresh_sockets() {
    let replies: Replies = Arc::new(|req| vec![ok_reply(req, json!({"user_id": 7, "nickname": "b"}))]);
    let (base, _) = serve(replies, Vec::new()).await;
    let client = Client::new(config(&base)).unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    client.on("socket.api.open", move |_| {
        let _ = tx.send(());
    });

    client.connect().unwrap();
    timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    // already connecting or open: no second socket
    client.connect().unwrap();

    client.reconnect().unwrap();
    timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(client.socket_state(Channel::Api), SocketState::Open);

    let me = client.get_login_info(&NoParams {}).await.unwrap();
    assert_eq!(me.user_id, 7);

    // the superseded socket's close must not touch the new one
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(client.socket_state(Channel::Api), SocketState::Open);
    assert!(rx.try_recv().is_err());

    client.disconnect();
}

#[test]
fn connect_needs_a_runtime() {
    let client = Client::new(config("ws://127.0.0.1:9")).unwrap();
    let err = client.connect().unwrap_err();
    assert_eq!(err.code().as_str(), "TRANSPORT");
}
