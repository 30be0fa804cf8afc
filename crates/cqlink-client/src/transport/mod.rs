//! Transport layer (WebSocket client).
//!
//! Exposes the socket task that owns a single connection and the frame
//! classifier it uses. Session state lives above this layer.

pub mod codec;
pub mod ws;

pub use ws::{Outbound, SocketSignal, SocketTask};
