//! Top-level facade crate for cqlink.
//!
//! Re-exports the protocol/codec core and the client library so users can
//! depend on a single crate.

pub mod core {
    pub use cqlink_core::*;
}

pub mod client {
    pub use cqlink_client::*;
}

pub use cqlink_client::{Client, ClientConfig, Event};
