//! Typed protocol data.
//!
//! - `api`: request/response envelopes and the `Action` trait.
//! - `actions`: the static API surface table.
//! - `event`: inbound event envelopes, their classification kinds, and the
//!   status snapshot carried by meta events.
//! - `segment` / `message`: message content.
//!
//! Everything here is plain data plus serde impls; the wire text itself goes
//! through `crate::codec`.

pub mod actions;
pub mod api;
pub mod event;
pub mod lenient;
pub mod message;
pub mod segment;

pub use api::{Action, ApiFailure, ApiRequest, ApiResponse};
pub use event::{MessageEvent, MetaEvent, NoticeEvent, RequestEvent, Status};
pub use message::Message;
pub use segment::Segment;
