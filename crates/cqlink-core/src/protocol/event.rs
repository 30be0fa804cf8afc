//! Inbound event envelopes.
//!
//! Every event carries `post_type` plus category-specific discriminators
//! (`message_type`, `notice_type`, `sub_type`, ...). The kind enums below
//! name the values this client understands; anything else is reported by
//! the dispatcher as unclassified. The typed envelopes keep the fields they
//! do not model in `extra`, so nothing the server sent is lost.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use super::lenient;
use super::message::Message;

macro_rules! wire_kind {
    ($(#[$meta:meta])* $name:ident { $($variant:ident = $wire:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn from_wire(s: &str) -> Option<Self> {
                match s {
                    $($wire => Some($name::$variant),)+
                    _ => None,
                }
            }

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                $name::from_wire(&s).ok_or_else(|| {
                    serde::de::Error::unknown_variant(&s, &[$($wire),+])
                })
            }
        }
    };
}

wire_kind! {
    /// `post_type`.
    PostKind {
        Message = "message",
        MessageSent = "message_sent",
        Notice = "notice",
        Request = "request",
        MetaEvent = "meta_event",
    }
}

wire_kind! {
    /// `message_type`.
    MessageKind {
        Private = "private",
        Group = "group",
        Guild = "guild",
    }
}

wire_kind! {
    /// `notice_type`.
    NoticeKind {
        GroupUpload = "group_upload",
        GroupAdmin = "group_admin",
        GroupDecrease = "group_decrease",
        GroupIncrease = "group_increase",
        GroupBan = "group_ban",
        FriendAdd = "friend_add",
        GroupRecall = "group_recall",
        FriendRecall = "friend_recall",
        Notify = "notify",
        GroupCard = "group_card",
        OfflineFile = "offline_file",
        ClientStatus = "client_status",
        Essence = "essence",
    }
}

wire_kind! {
    /// `sub_type` of `notify` notices.
    NotifyKind {
        Poke = "poke",
        LuckyKing = "lucky_king",
        Honor = "honor",
        Title = "title",
    }
}

wire_kind! {
    /// `request_type`.
    RequestKind {
        Friend = "friend",
        Group = "group",
    }
}

wire_kind! {
    /// `meta_event_type`.
    MetaKind {
        Lifecycle = "lifecycle",
        Heartbeat = "heartbeat",
    }
}

/// Who sent a message, as reported with it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sender {
    #[serde(default, deserialize_with = "lenient::number")]
    pub user_id: u64,
    #[serde(default)]
    pub nickname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `message` and `message_sent` events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEvent {
    #[serde(default)]
    pub time: i64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub self_id: u64,
    pub post_type: PostKind,
    pub message_type: MessageKind,
    #[serde(default)]
    pub sub_type: String,
    #[serde(default, deserialize_with = "lenient::number")]
    pub message_id: i64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub user_id: u64,
    #[serde(
        default,
        deserialize_with = "lenient::opt_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub group_id: Option<u64>,
    pub message: Message,
    #[serde(default)]
    pub raw_message: String,
    #[serde(default)]
    pub font: i64,
    #[serde(default)]
    pub sender: Sender,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `notice` events. The fields shared by most notice kinds are typed; the
/// rest (file info, honor type, recalled message id, ...) stay in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoticeEvent {
    #[serde(default)]
    pub time: i64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub self_id: u64,
    pub notice_type: NoticeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_type: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::opt_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub user_id: Option<u64>,
    #[serde(
        default,
        deserialize_with = "lenient::opt_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub group_id: Option<u64>,
    #[serde(
        default,
        deserialize_with = "lenient::opt_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub operator_id: Option<u64>,
    #[serde(
        default,
        deserialize_with = "lenient::opt_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub target_id: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NoticeEvent {
    /// Sub-kind of a `notify` notice, when recognized.
    pub fn notify_kind(&self) -> Option<NotifyKind> {
        match self.notice_type {
            NoticeKind::Notify => self.sub_type.as_deref().and_then(NotifyKind::from_wire),
            _ => None,
        }
    }
}

/// `request` events (friend requests, group join requests and invites).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEvent {
    #[serde(default)]
    pub time: i64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub self_id: u64,
    pub request_type: RequestKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub user_id: u64,
    #[serde(
        default,
        deserialize_with = "lenient::opt_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub group_id: Option<u64>,
    #[serde(default)]
    pub comment: String,
    /// Pass back to `set_friend_add_request` / `set_group_add_request`.
    #[serde(default)]
    pub flag: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `meta_event` events: lifecycle changes and heartbeats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaEvent {
    #[serde(default)]
    pub time: i64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub self_id: u64,
    pub meta_event_type: MetaKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    /// Heartbeat period in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Connectivity snapshot carried by lifecycle and heartbeat events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Status {
    #[serde(rename = "self", default)]
    pub self_info: SelfInfo,
    #[serde(default)]
    pub online: bool,
    #[serde(default)]
    pub good: bool,
    #[serde(rename = "qq.status", default)]
    pub qq_status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelfInfo {
    #[serde(default)]
    pub platform: String,
    #[serde(default, deserialize_with = "lenient::number")]
    pub user_id: u64,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use super::*;
    use crate::protocol::segment::Segment;
    use serde_json::json;

    #[test]
    fn kinds_round_trip_their_wire_names() {
        for kind in NoticeKind::ALL {
            assert_eq!(NoticeKind::from_wire(kind.as_str()), Some(*kind));
        }
        assert_eq!(PostKind::from_wire("message_sent"), Some(PostKind::MessageSent));
        assert_eq!(PostKind::from_wire("bogus"), None);
    }

    #[test]
    fn guild_message_ids_may_be_strings() {
        let ev: MessageEvent = serde_json::from_value(json!({
            "time": 1,
            "self_id": 10,
            "post_type": "message",
            "message_type": "guild",
            "sub_type": "channel",
            "message_id": "42",
            "user_id": "144115218678093982",
            "guild_id": "9",
            "message": "hi",
            "sender": {"user_id": "144115218678093982", "nickname": "n"}
        }))
        .unwrap();
        assert_eq!(ev.message_id, 42);
        assert_eq!(ev.user_id, 144115218678093982);
        assert_eq!(ev.extra.get("guild_id"), Some(&json!("9")));
        assert_eq!(ev.message, Message::Tagged("hi".into()));
    }

    #[test]
    fn lifecycle_carries_status() {
        let ev: MetaEvent = serde_json::from_value(json!({
            "time": 1,
            "self_id": 10,
            "post_type": "meta_event",
            "meta_event_type": "lifecycle",
            "sub_type": "connect",
            "status": {
                "self": {"platform": "qq", "user_id": 10},
                "online": true,
                "good": true,
                "qq.status": "正常"
            }
        }))
        .unwrap();
        let status = ev.status.unwrap();
        assert!(status.online);
        assert_eq!(status.self_info.user_id, 10);
        assert_eq!(status.qq_status, "正常");
    }

    #[test]
    fn unknown_segment_kinds_do_not_spoil_the_message() {
        let text = r#"{"time":1,"self_id":10,"post_type":"message","message_type":"private",
            "sub_type":"friend","message_id":3,"user_id":42,
            "message":[{"type":"text","data":{"text":"see "}},{"type":"file","data":{"file":"a.txt","size":12}}],
            "sender":{"user_id":42,"nickname":"n"}}"#;
        let ev: MessageEvent = crate::codec::json::decode(text).unwrap();
        let Message::Segments(segments) = &ev.message else {
            panic!("expected segments");
        };
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0], Segment::text("see "));
        assert_eq!(segments[1].kind(), "file");
        let Segment::Other(file) = &segments[1] else {
            panic!("expected an untyped segment");
        };
        assert_eq!(file.data.get("file"), Some(&json!("a.txt")));
        assert_eq!(file.data.get("size"), Some(&json!(12)));
    }
}
