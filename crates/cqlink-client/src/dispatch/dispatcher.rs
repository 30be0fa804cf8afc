use std::sync::{PoisonError, RwLock};

use serde::de::DeserializeOwned;
use serde_json::Value;

use cqlink_core::codec::json;
use cqlink_core::error::Result;
use cqlink_core::protocol::event::{
    MessageKind, MetaKind, NoticeKind, NotifyKind, PostKind, RequestKind,
};
use cqlink_core::protocol::{
    Message, MessageEvent, MetaEvent, NoticeEvent, RequestEvent, Status,
};

use super::bus::EventBus;
use super::event::Event;
use crate::config::ReceiveFormat;

/// Outcome of routing one inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routing {
    /// Published on `path` (and its ancestors).
    Delivered { path: String },
    /// A discriminator held a value this client does not know. Nothing was
    /// published.
    Unclassified { field: &'static str, value: String },
    /// A sub-kind was unknown but the envelope still fit its parent's shape.
    /// Published on the deepest known `path` (and its ancestors).
    Partial {
        path: String,
        field: &'static str,
        value: String,
    },
    /// Classified, but the envelope did not fit its typed shape. Nothing
    /// was published.
    Malformed { path: String, reason: String },
}

/// Classifies server-pushed events into listener paths and keeps the
/// latest status snapshot reported by meta events.
#[derive(Debug)]
pub struct Dispatcher {
    bus: EventBus,
    status: RwLock<Option<Status>>,
    receive_format: Option<ReceiveFormat>,
}

impl Dispatcher {
    pub fn new(receive_format: Option<ReceiveFormat>) -> Self {
        Self {
            bus: EventBus::new(),
            status: RwLock::new(None),
            receive_format,
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Last status carried by a lifecycle or heartbeat event.
    pub fn status(&self) -> Option<Status> {
        self.status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Decode `text` with the big-integer codec, then [`Dispatcher::dispatch`].
    pub fn dispatch_text(&self, text: &str) -> Result<Routing> {
        let value = json::decode_value(text)?;
        Ok(self.dispatch(value))
    }

    pub fn dispatch(&self, value: Value) -> Routing {
        let routing = self.route(value);
        match &routing {
            Routing::Delivered { path } => tracing::trace!(%path, "event delivered"),
            Routing::Unclassified { field, value } => {
                tracing::warn!(field = *field, value = %value, "unrecognized event kind; dropped")
            }
            Routing::Partial { path, field, value } => {
                tracing::warn!(%path, field = *field, value = %value, "unrecognized event sub-kind; delivered on parent path")
            }
            Routing::Malformed { path, reason } => {
                tracing::warn!(%path, %reason, "malformed event; dropped")
            }
        }
        routing
    }

    fn route(&self, value: Value) -> Routing {
        let post = match kind_of(&value, "post_type", PostKind::from_wire) {
            Ok(k) => k,
            Err(unknown) => return unknown.into(),
        };

        match post {
            PostKind::Message | PostKind::MessageSent => {
                let kind = match kind_of(&value, "message_type", MessageKind::from_wire) {
                    Ok(k) => k,
                    Err(unknown) => return unknown.into(),
                };
                let path = format!("{}.{}", post.as_str(), kind.as_str());
                self.deliver::<MessageEvent>(path, value, |mut ev| {
                    self.apply_receive_format(&mut ev);
                    Event::Message(Box::new(ev))
                })
            }
            PostKind::Notice => {
                let kind = match kind_of(&value, "notice_type", NoticeKind::from_wire) {
                    Ok(k) => k,
                    Err(unknown) => return unknown.into(),
                };
                let mut path = format!("notice.{}", kind.as_str());
                if kind == NoticeKind::Notify {
                    let sub = match kind_of(&value, "sub_type", NotifyKind::from_wire) {
                        Ok(k) => k,
                        Err(unknown) => {
                            // sub_type is free text in NoticeEvent, so the parent path still fits
                            return match self.deliver::<NoticeEvent>(path, value, |ev| {
                                Event::Notice(Box::new(ev))
                            }) {
                                Routing::Delivered { path } => Routing::Partial {
                                    path,
                                    field: unknown.field,
                                    value: unknown.value,
                                },
                                other => other,
                            };
                        }
                    };
                    path.push('.');
                    path.push_str(sub.as_str());
                    if sub == NotifyKind::Poke {
                        let in_group = value.get("group_id").is_some_and(|g| !g.is_null());
                        path.push_str(if in_group { ".group" } else { ".friend" });
                    }
                }
                self.deliver::<NoticeEvent>(path, value, |ev| Event::Notice(Box::new(ev)))
            }
            PostKind::Request => {
                let kind = match kind_of(&value, "request_type", RequestKind::from_wire) {
                    Ok(k) => k,
                    Err(unknown) => return unknown.into(),
                };
                let path = format!("request.{}", kind.as_str());
                self.deliver::<RequestEvent>(path, value, |ev| Event::Request(Box::new(ev)))
            }
            PostKind::MetaEvent => {
                let kind = match kind_of(&value, "meta_event_type", MetaKind::from_wire) {
                    Ok(k) => k,
                    Err(unknown) => return unknown.into(),
                };
                let path = format!("meta_event.{}", kind.as_str());
                self.deliver::<MetaEvent>(path, value, |ev| {
                    if let Some(status) = &ev.status {
                        *self.status.write().unwrap_or_else(PoisonError::into_inner) =
                            Some(status.clone());
                    }
                    Event::Meta(Box::new(ev))
                })
            }
        }
    }

    fn deliver<T: DeserializeOwned>(
        &self,
        path: String,
        value: Value,
        wrap: impl FnOnce(T) -> Event,
    ) -> Routing {
        let typed: T = match serde_json::from_value(value) {
            Ok(t) => t,
            Err(e) => {
                return Routing::Malformed {
                    path,
                    reason: e.to_string(),
                }
            }
        };
        let event = wrap(typed);
        self.bus.publish(&path, &event);
        Routing::Delivered { path }
    }

    fn apply_receive_format(&self, ev: &mut MessageEvent) {
        let Some(format) = self.receive_format else {
            return;
        };
        let converted = match format {
            ReceiveFormat::Segments => ev.message.clone().into_segments().map(Message::Segments),
            ReceiveFormat::Tagged => ev.message.clone().into_tagged().map(Message::Tagged),
        };
        match converted {
            Ok(m) => ev.message = m,
            Err(e) => {
                tracing::warn!(message_id = ev.message_id, error = %e, "message left in received form")
            }
        }
    }
}

/// A discriminator value with no known kind.
struct UnknownKind {
    field: &'static str,
    value: String,
}

impl From<UnknownKind> for Routing {
    fn from(UnknownKind { field, value }: UnknownKind) -> Self {
        Routing::Unclassified { field, value }
    }
}

/// Read discriminator `field` and map it to a known kind.
fn kind_of<K>(
    value: &Value,
    field: &'static str,
    from_wire: fn(&str) -> Option<K>,
) -> std::result::Result<K, UnknownKind> {
    let raw = value.get(field).and_then(Value::as_str);
    raw.and_then(from_wire).ok_or_else(|| UnknownKind {
        field,
        value: match raw {
            Some(s) => s.to_string(),
            None => value.get(field).map_or_else(|| "<missing>".into(), Value::to_string),
        },
    })
}
