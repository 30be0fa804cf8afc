//! Event routing.
//!
//! Inbound events are classified into dot-separated paths
//! (`notice.notify.poke.group`, `message.private`, ...) and published on
//! the [`EventBus`], which walks from the most specific path up to the
//! root category.

pub mod bus;
pub mod dispatcher;
pub mod event;

pub use bus::{EventBus, Listener, ListenerId};
pub use dispatcher::{Dispatcher, Routing};
pub use event::{Event, SocketEvent, SocketEventKind, API_PRE_SEND, API_RESPONSE};
