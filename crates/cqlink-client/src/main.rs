//! cqlink command-line client.
//!
//! Connects both sockets using `cqlink.yaml` (or the path given as the
//! first argument), logs everything the server pushes, and reports the
//! logged-in account once the API socket is open. Ctrl-C disconnects.

use std::sync::Mutex;

use tokio::sync::oneshot;
use tracing_subscriber::{fmt, EnvFilter};

use cqlink_client::dispatch::Event;
use cqlink_client::{config, Client};
use cqlink_core::protocol::actions::NoParams;

#[tokio::main]
async fn main() {
    let path = std::env::args().nth(1).unwrap_or_else(|| "cqlink.yaml".into());
    let cfg = config::load_from_file(&path).expect("config load failed");

    let default_level = if cfg.debug { "debug" } else { "info" };
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let client = Client::new(cfg).expect("invalid config");

    client.on("socket", |ev| {
        if let Event::Socket(s) = ev {
            tracing::info!(path = %s.path(), "socket");
        }
    });
    client.on("message", |ev| {
        if let Some(m) = ev.as_message() {
            let text = m.message.plain_text().unwrap_or_default();
            tracing::info!(
                kind = m.message_type.as_str(),
                user_id = m.user_id,
                group_id = ?m.group_id,
                %text,
                "message"
            );
        }
    });
    client.on("notice", |ev| {
        if let Some(n) = ev.as_notice() {
            tracing::info!(kind = n.notice_type.as_str(), sub_type = ?n.sub_type, "notice");
        }
    });
    client.on("request", |ev| {
        if let Event::Request(r) = ev {
            tracing::info!(kind = r.request_type.as_str(), user_id = r.user_id, flag = %r.flag, "request");
        }
    });

    let (open_tx, open_rx) = oneshot::channel();
    let open_tx = Mutex::new(Some(open_tx));
    client.once("socket.api.open", move |_| {
        if let Some(tx) = open_tx.lock().ok().and_then(|mut t| t.take()) {
            let _ = tx.send(());
        }
    });

    client.connect().expect("connect failed");
    tracing::info!(%path, "cqlink starting");

    tokio::select! {
        opened = open_rx => {
            if opened.is_ok() {
                match client.get_login_info(&NoParams {}).await {
                    Ok(me) => tracing::info!(user_id = me.user_id, nickname = %me.nickname, "logged in"),
                    Err(e) => tracing::warn!(error = %e, "get_login_info failed"),
                }
            }
            let _ = tokio::signal::ctrl_c().await;
        }
        _ = tokio::signal::ctrl_c() => {}
    }

    client.disconnect();
    // let the close handshakes finish
    tokio::time::sleep(std::time::Duration::from_millis(
        client.config().transport.close_timeout_ms,
    ))
    .await;
}
