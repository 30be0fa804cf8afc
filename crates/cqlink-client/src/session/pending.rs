//! Outstanding API calls keyed by echo.

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::oneshot;
use uuid::Uuid;

use cqlink_core::protocol::{ApiFailure, ApiRequest};

pub type Reply = std::result::Result<Value, ApiFailure>;

#[derive(Debug)]
pub struct PendingCall {
    pub request: ApiRequest,
    /// API socket generation the request was queued on.
    pub generation: u64,
    reply: oneshot::Sender<Reply>,
}

impl PendingCall {
    /// Settle the call. A caller that stopped waiting is not an error.
    pub fn resolve(self, reply: Reply) {
        let _ = self.reply.send(reply);
    }
}

/// Each entry is settled at most once: whoever removes it owns the reply.
#[derive(Debug, Default)]
pub struct PendingCalls {
    calls: DashMap<String, PendingCall>,
}

impl PendingCalls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh echo not currently in use.
    pub fn fresh_echo(&self) -> String {
        loop {
            let echo = Uuid::new_v4().to_string();
            if !self.calls.contains_key(&echo) {
                return echo;
            }
        }
    }

    pub fn insert(&self, request: ApiRequest, generation: u64) -> oneshot::Receiver<Reply> {
        let (tx, rx) = oneshot::channel();
        self.calls.insert(
            request.echo.clone(),
            PendingCall {
                request,
                generation,
                reply: tx,
            },
        );
        rx
    }

    pub fn take(&self, echo: &str) -> Option<PendingCall> {
        self.calls.remove(echo).map(|(_, call)| call)
    }

    /// Remove every call queued on API socket `generation`.
    pub fn take_generation(&self, generation: u64) -> Vec<PendingCall> {
        let echoes: Vec<String> = self
            .calls
            .iter()
            .filter(|e| e.value().generation == generation)
            .map(|e| e.key().clone())
            .collect();
        echoes.iter().filter_map(|echo| self.take(echo)).collect()
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}
