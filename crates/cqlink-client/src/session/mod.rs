//! Session layer: socket lifecycle, API call correlation, and the typed
//! method surface.

pub mod client;
pub mod pending;
pub mod state;

pub use client::Client;
pub use state::{Channel, SocketState};
