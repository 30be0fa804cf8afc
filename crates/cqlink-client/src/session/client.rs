//! Dual-socket session.
//!
//! A [`Client`] keeps two sockets against one server: the event socket
//! (`<base>/`) for pushed events and the API socket (`<base>/api`) for
//! request/response calls correlated by `echo`.
//!
//! Socket tasks never touch session state. They report through one signal
//! queue, drained by a single pump task, so listeners never run
//! concurrently with each other for socket traffic. Each socket open bumps
//! a per-channel generation; signals from a superseded socket cannot
//! change the state of its replacement.

use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

use cqlink_core::codec::json;
use cqlink_core::error::{CqLinkError, Result};
use cqlink_core::protocol::actions;
use cqlink_core::protocol::{Action, ApiFailure, ApiRequest, ApiResponse, Status};

use super::pending::PendingCalls;
use super::state::{Channel, SocketState};
use crate::config::ClientConfig;
use crate::dispatch::{
    Dispatcher, Event, ListenerId, SocketEvent, SocketEventKind, API_PRE_SEND, API_RESPONSE,
};
use crate::transport::{Outbound, SocketSignal, SocketTask};

#[derive(Debug, Default)]
struct SocketSlot {
    state: SocketState,
    generation: u64,
    outbound: Option<mpsc::UnboundedSender<Outbound>>,
}

#[derive(Debug)]
struct Signal {
    channel: Channel,
    generation: u64,
    signal: SocketSignal,
}

struct Inner {
    config: ClientConfig,
    dispatcher: Dispatcher,
    pending: PendingCalls,
    sockets: DashMap<Channel, SocketSlot>,
    signal_tx: mpsc::UnboundedSender<Signal>,
    // taken by the first connect, which starts the pump
    signal_rx: Mutex<Option<mpsc::UnboundedReceiver<Signal>>>,
}

/// Handle to one session. Cheap to clone; clones share the session.
///
/// A listener that captures a clone keeps the session alive for as long
/// as it stays registered.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("event", &self.socket_state(Channel::Event))
            .field("api", &self.socket_state(Channel::Api))
            .field("pending", &self.inner.pending.len())
            .finish()
    }
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let dispatcher = Dispatcher::new(config.receive_format);
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                dispatcher,
                pending: PendingCalls::new(),
                sockets: DashMap::new(),
                signal_tx,
                signal_rx: Mutex::new(Some(signal_rx)),
            }),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Open whichever sockets are currently disconnected. Returns once the
    /// attempts are started; `socket.*.open` / `socket.*.error` report how
    /// they went.
    ///
    /// Must be called from inside a tokio runtime. The session stays bound
    /// to the runtime of its first connect.
    pub fn connect(&self) -> Result<()> {
        let handle = Handle::try_current().map_err(|_| {
            CqLinkError::Transport("connect must be called inside a tokio runtime".into())
        })?;
        self.start_pump(&handle);
        for channel in Channel::ALL {
            self.open(&handle, channel)?;
        }
        Ok(())
    }

    /// Close both sockets. Idempotent.
    ///
    /// Handles are dropped immediately: calls made afterwards fail as not
    /// connected. Calls still waiting on the API socket are rejected once
    /// it finishes closing.
    pub fn disconnect(&self) {
        for channel in Channel::ALL {
            let outbound = {
                let mut slot = self.inner.sockets.entry(channel).or_default();
                if slot.state == SocketState::Disconnected {
                    continue;
                }
                slot.state = SocketState::Disconnected;
                slot.outbound.take()
            };
            if let Some(tx) = outbound {
                let _ = tx.send(Outbound::Close);
            }
            tracing::info!(channel = channel.as_str(), "socket closing");
            self.inner.publish_socket(channel, SocketEventKind::Closing);
        }
    }

    pub fn reconnect(&self) -> Result<()> {
        self.disconnect();
        self.connect()
    }

    pub fn socket_state(&self, channel: Channel) -> SocketState {
        self.inner
            .sockets
            .get(&channel)
            .map_or(SocketState::Disconnected, |slot| slot.state)
    }

    /// Last status reported by a lifecycle or heartbeat event.
    pub fn status(&self) -> Option<Status> {
        self.inner.dispatcher.status()
    }

    /// Calls sent and not yet settled.
    pub fn pending_calls(&self) -> usize {
        self.inner.pending.len()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }

    pub fn on<F>(&self, path: &str, listener: F) -> ListenerId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.inner.dispatcher.bus().on(path, listener)
    }

    pub fn once<F>(&self, path: &str, listener: F) -> ListenerId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.inner.dispatcher.bus().once(path, listener)
    }

    pub fn off(&self, path: &str, id: ListenerId) -> bool {
        self.inner.dispatcher.bus().off(path, id)
    }

    /// Publish `event` on `path` by hand. Returns how many listeners ran.
    pub fn emit(&self, path: &str, event: &Event) -> usize {
        self.inner.dispatcher.bus().publish(path, event)
    }

    /// Call `action` on the API socket and wait for its reply.
    ///
    /// The call is registered before anything is transmitted and settles
    /// exactly once: with the reply's `data` on retcode 0, otherwise
    /// with [`CqLinkError::Api`] carrying the server's (or a synthesized)
    /// failure.
    pub async fn send<P>(&self, action: &str, params: &P) -> Result<Value>
    where
        P: Serialize + ?Sized,
    {
        let inner = &self.inner;
        let params = serde_json::to_value(params)
            .map_err(|e| CqLinkError::Encode(format!("{action} params: {e}")))?;
        let echo = inner.pending.fresh_echo();
        let request = ApiRequest {
            action: action.to_string(),
            params,
            echo: echo.clone(),
        };

        // registered under the slot guard so a concurrent close sweep sees it
        let (state, outbound, reply) = {
            let slot = inner.sockets.entry(Channel::Api).or_default();
            let reply = inner.pending.insert(request.clone(), slot.generation);
            (slot.state, slot.outbound.clone(), reply)
        };

        inner.publish(API_PRE_SEND, &Event::ApiPreSend(request.clone()));

        let outbound = match (state, outbound) {
            (SocketState::Connecting | SocketState::Open, Some(tx)) => tx,
            (SocketState::Closing, _) => return Err(inner.fail(ApiFailure::closed(&echo))),
            _ => return Err(inner.fail(ApiFailure::not_connected(&echo))),
        };

        let text = match json::encode(&request) {
            Ok(t) => t,
            Err(e) => {
                inner.pending.take(&echo);
                return Err(e);
            }
        };
        if inner.config.debug {
            tracing::debug!(%echo, payload = %text, "api request");
        }
        if outbound.send(Outbound::Text(text)).is_err() {
            return Err(inner.fail(ApiFailure::not_connected(&echo)));
        }
        drop(outbound);

        match reply.await {
            Ok(Ok(data)) => Ok(data),
            Ok(Err(failure)) => Err(failure.into()),
            Err(_) => Err(ApiFailure::dropped(&echo).into()),
        }
    }

    /// Typed form of [`Client::send`].
    pub async fn call<A: Action>(&self, params: &A::Params) -> Result<A::Output> {
        let data = self.send(A::NAME, params).await?;
        serde_json::from_value(data)
            .map_err(|e| CqLinkError::Decode(format!("{} result: {e}", A::NAME)))
    }

    fn start_pump(&self, handle: &Handle) {
        let rx = self
            .inner
            .signal_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(rx) = rx {
            handle.spawn(pump(Arc::downgrade(&self.inner), rx));
        }
    }

    fn open(&self, handle: &Handle, channel: Channel) -> Result<()> {
        let inner = &self.inner;
        let url = inner.config.endpoint(channel.endpoint_path())?;
        let (out_tx, out_rx) = mpsc::unbounded_channel();

        let generation = {
            let mut slot = inner.sockets.entry(channel).or_default();
            if slot.state != SocketState::Disconnected {
                return Ok(());
            }
            slot.generation += 1;
            slot.state = SocketState::Connecting;
            slot.outbound = Some(out_tx);
            slot.generation
        };

        tracing::info!(
            channel = channel.as_str(),
            host = url.host_str().unwrap_or_default(),
            path = url.path(),
            generation,
            "socket connecting"
        );
        inner.publish_socket(channel, SocketEventKind::Connecting);

        let transport = &inner.config.transport;
        let task = SocketTask {
            url,
            headers: inner.config.handshake_headers(),
            connect_timeout: Duration::from_millis(transport.connect_timeout_ms),
            close_timeout: Duration::from_millis(transport.close_timeout_ms),
            outbound: out_rx,
        };
        let signals = inner.signal_tx.clone();
        handle.spawn(task.run(move |signal| {
            let _ = signals.send(Signal {
                channel,
                generation,
                signal,
            });
        }));
        Ok(())
    }
}

async fn pump(inner: Weak<Inner>, mut signals: mpsc::UnboundedReceiver<Signal>) {
    while let Some(signal) = signals.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        inner.handle_signal(signal);
    }
}

impl Inner {
    fn publish(&self, path: &str, event: &Event) {
        self.dispatcher.bus().publish(path, event);
    }

    fn publish_socket(&self, channel: Channel, kind: SocketEventKind) {
        let event = SocketEvent { channel, kind };
        self.publish(&event.path(), &Event::Socket(event));
    }

    /// Drop the pending entry of a call that never made it out.
    fn fail(&self, failure: ApiFailure) -> CqLinkError {
        self.pending.take(&failure.echo);
        failure.into()
    }

    /// Move `channel` from `from` to `to` if `generation` is still current.
    fn transition(&self, channel: Channel, generation: u64, from: SocketState, to: SocketState) -> bool {
        let mut slot = self.sockets.entry(channel).or_default();
        if slot.generation == generation && slot.state == from {
            slot.state = to;
            true
        } else {
            false
        }
    }

    fn release(&self, channel: Channel, generation: u64) {
        let mut slot = self.sockets.entry(channel).or_default();
        if slot.generation == generation {
            slot.state = SocketState::Disconnected;
            slot.outbound = None;
        }
    }

    fn handle_signal(&self, Signal { channel, generation, signal }: Signal) {
        let ch = channel.as_str();
        match signal {
            SocketSignal::Open => {
                if self.transition(channel, generation, SocketState::Connecting, SocketState::Open) {
                    tracing::info!(channel = ch, generation, "socket open");
                    self.publish_socket(channel, SocketEventKind::Open);
                } else {
                    tracing::debug!(channel = ch, generation, "superseded socket opened");
                }
            }
            SocketSignal::Text(text) => {
                if self.config.debug {
                    tracing::debug!(channel = ch, payload = %text, "inbound");
                }
                match channel {
                    Channel::Event => self.on_event_text(&text),
                    Channel::Api => self.on_api_text(&text),
                }
            }
            SocketSignal::Closing { code, reason } => {
                self.transition(channel, generation, SocketState::Open, SocketState::Closing);
                tracing::info!(channel = ch, code, %reason, "peer is closing the socket");
                self.publish_socket(channel, SocketEventKind::Closing);
            }
            SocketSignal::Closed { code, reason } => {
                self.release(channel, generation);
                if channel == Channel::Api {
                    for call in self.pending.take_generation(generation) {
                        let failure = ApiFailure::dropped(&call.request.echo);
                        call.resolve(Err(failure));
                    }
                }
                tracing::info!(channel = ch, generation, code, %reason, "socket closed");
                self.publish_socket(channel, SocketEventKind::Close { code, reason });
            }
            SocketSignal::Error(error) => {
                tracing::warn!(channel = ch, generation, %error, "socket error");
                self.publish_socket(channel, SocketEventKind::Error(error));
            }
        }
    }

    fn on_event_text(&self, text: &str) {
        if let Err(e) = self.dispatcher.dispatch_text(text) {
            tracing::warn!(error = %e, "event payload dropped");
        }
    }

    fn on_api_text(&self, text: &str) {
        let response: ApiResponse = match json::decode(text) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "api payload dropped");
                return;
            }
        };
        let Some(echo) = response.echo.clone() else {
            tracing::debug!("api reply without echo ignored");
            return;
        };
        match self.pending.take(&echo) {
            Some(call) => call.resolve(response.clone().into_result()),
            None => tracing::debug!(%echo, "reply for unknown or settled call"),
        }
        self.publish(API_RESPONSE, &Event::ApiResponse(response));
    }
}

macro_rules! client_methods {
    ($($(#[$doc:meta])* $name:ident($marker:ident): $params:ty => $output:ty;)*) => {
        /// Typed shortcuts, one per supported method.
        impl Client {
            $(
                $(#[$doc])*
                pub async fn $name(&self, params: &$params) -> Result<$output> {
                    self.call::<actions::$marker>(params).await
                }
            )*
        }
    };
}

cqlink_core::action_table!(client_methods);
