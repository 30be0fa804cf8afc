//! cqlink core: transport-agnostic codecs, protocol types, and errors.
//!
//! This crate holds everything about the OneBot-style wire format that does
//! not need a socket or a runtime: the big-integer-safe JSON codec, the
//! tag-notation ("CQ code") segment codec, typed envelopes/events/segments,
//! and the static API surface table. The client crate layers the dual-socket
//! session on top.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! Malformed server input surfaces as `CqLinkError`, never as a crash.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod codec;
pub mod error;
pub mod protocol;

/// Shared result type.
pub use error::{CqLinkError, ErrorCode, Result};
