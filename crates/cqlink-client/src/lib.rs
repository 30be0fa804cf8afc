//! cqlink client library entry.
//!
//! This crate wires the WebSocket transport, the event dispatcher, and the
//! dual-socket session into a client for OneBot v11 servers. It is consumed
//! by the binary (`main.rs`), by the facade crate, and by integration tests.

pub mod config;
pub mod dispatch;
pub mod session;
pub mod transport;

pub use config::ClientConfig;
pub use dispatch::{Event, ListenerId};
pub use session::{Channel, Client, SocketState};
