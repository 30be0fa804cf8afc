//! Message segments.
//!
//! A message is an ordered list of [`Segment`]s. On the wire each one is an
//! adjacently tagged object, `{"type": "<kind>", "data": {...}}`. A single
//! enum serves both directions. Fields that only one direction carries are
//! `Option`s and are skipped when absent, so an outbound segment never grows
//! `null` fields. Kinds without a typed form decode into
//! [`Segment::Other`] instead of failing the whole message.

use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use super::lenient;

macro_rules! segment_kinds {
    ($( $(#[$attr:meta])* $variant:ident($data:ty) = $kind:literal, )*) => {
        /// One atomic unit of a chat message.
        #[derive(Debug, Clone, PartialEq, Serialize)]
        #[serde(tag = "type", content = "data")]
        pub enum Segment {
            $(
                $(#[$attr])*
                #[serde(rename = $kind)]
                $variant($data),
            )*
            /// A kind with no typed form, kept as received.
            #[serde(untagged)]
            Other(OtherSegment),
        }

        #[derive(Deserialize)]
        #[serde(tag = "type", content = "data")]
        enum Known {
            $(
                #[serde(rename = $kind)]
                $variant($data),
            )*
        }

        impl From<Known> for Segment {
            fn from(known: Known) -> Self {
                match known {
                    $( Known::$variant(d) => Segment::$variant(d), )*
                }
            }
        }

        /// Wire `type` strings that decode into a typed variant.
        pub const KNOWN_KINDS: &[&str] = &[$($kind),*];

        impl Segment {
            /// The wire `type` string.
            pub fn kind(&self) -> &str {
                match self {
                    $( Segment::$variant(_) => $kind, )*
                    Segment::Other(other) => &other.kind,
                }
            }
        }
    };
}

segment_kinds! {
    Text(TextData) = "text",
    Face(FaceData) = "face",
    /// Outbound alias of `image`.
    Pic(ImageData) = "pic",
    Image(ImageData) = "image",
    /// Outbound alias of `record`.
    Voice(RecordData) = "voice",
    Record(RecordData) = "record",
    At(AtData) = "at",
    Video(VideoData) = "video",
    Markdown(MarkdownData) = "markdown",
    Poke(PokeData) = "poke",
    Share(ShareData) = "share",
    Contact(ContactData) = "contact",
    Location(LocationData) = "location",
    Music(MusicData) = "music",
    Reply(ReplyData) = "reply",
    Touch(TouchData) = "touch",
    Weather(WeatherData) = "weather",
    Json(JsonData) = "json",
    Forward(ForwardData) = "forward",
    NewDice(DiceData) = "new_dice",
    NewRps(MinigameData) = "new_rps",
    Basketball(MinigameData) = "basketball",
    BubbleFace(BubbleFaceData) = "bubble_face",
    InlineKeyboard(KeyboardData) = "inline_keyboard",
    Button(KeyboardData) = "button",
}

/// Whether `kind` has a typed [`Segment`] variant.
pub fn is_known_kind(kind: &str) -> bool {
    KNOWN_KINDS.contains(&kind)
}

/// A segment of a kind outside [`KNOWN_KINDS`] (`file`, `mface`, `node`, ...).
/// Serializes back to the same `{"type", "data"}` shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OtherSegment {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: Map<String, Value>,
}

impl<'de> Deserialize<'de> for Segment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let kind = match value.get("type") {
            Some(Value::String(kind)) => kind.clone(),
            Some(other) => {
                return Err(de::Error::invalid_type(unexpected(other), &"a segment type string"))
            }
            None => return Err(de::Error::missing_field("type")),
        };

        if is_known_kind(&kind) {
            return Known::deserialize(value)
                .map(Segment::from)
                .map_err(de::Error::custom);
        }

        let data = match value {
            Value::Object(mut map) => match map.remove("data") {
                None | Some(Value::Null) => Map::new(),
                Some(Value::Object(data)) => data,
                Some(other) => {
                    return Err(de::Error::invalid_type(unexpected(&other), &"a data object"))
                }
            },
            other => return Err(de::Error::invalid_type(unexpected(&other), &"a segment object")),
        };
        Ok(Segment::Other(OtherSegment { kind, data }))
    }
}

fn unexpected(v: &Value) -> de::Unexpected<'_> {
    match v {
        Value::Null => de::Unexpected::Unit,
        Value::Bool(b) => de::Unexpected::Bool(*b),
        Value::Number(_) => de::Unexpected::Other("number"),
        Value::String(s) => de::Unexpected::Str(s),
        Value::Array(_) => de::Unexpected::Seq,
        Value::Object(_) => de::Unexpected::Map,
    }
}

/// Decode a known kind from a deserializer presenting `{"type", "data"}`.
pub(crate) fn decode_known<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Segment, D::Error> {
    Known::deserialize(deserializer).map(Segment::from)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextData {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceData {
    #[serde(deserialize_with = "lenient::number")]
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub big: Option<bool>,
}

/// `file` or `url` must be set when sending; servers report both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ImageKind>,
    #[serde(rename = "subType", default, skip_serializing_if = "Option::is_none")]
    pub sub_type: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageKind {
    Original,
    Flash,
    Show,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub magic: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtData {
    pub qq: AtTarget,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Who an `at` segment mentions.
///
/// Numeric ids travel as numbers; the group-wide forms travel as the strings
/// `all`, `admin` and `online`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtTarget {
    User(u64),
    All,
    Admin,
    Online,
}

impl Serialize for AtTarget {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            AtTarget::User(id) => serializer.serialize_u64(*id),
            AtTarget::All => serializer.serialize_str("all"),
            AtTarget::Admin => serializer.serialize_str("admin"),
            AtTarget::Online => serializer.serialize_str("online"),
        }
    }
}

impl<'de> Deserialize<'de> for AtTarget {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AtVisitor;

        impl Visitor<'_> for AtVisitor {
            type Value = AtTarget;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a user id or one of all/admin/online")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<AtTarget, E> {
                Ok(AtTarget::User(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<AtTarget, E> {
                u64::try_from(v)
                    .map(AtTarget::User)
                    .map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<AtTarget, E> {
                match v {
                    "all" => Ok(AtTarget::All),
                    "admin" => Ok(AtTarget::Admin),
                    "online" => Ok(AtTarget::Online),
                    other => other
                        .parse()
                        .map(AtTarget::User)
                        .map_err(|_| E::invalid_value(de::Unexpected::Str(other), &self)),
                }
            }
        }

        deserializer.deserialize_any(AtVisitor)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkdownData {
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PokeData {
    #[serde(rename = "type")]
    pub kind: i64,
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strength: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShareData {
    pub title: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactData {
    #[serde(rename = "type")]
    pub kind: ContactKind,
    /// Sent as a number, reported by servers as a string.
    #[serde(deserialize_with = "lenient::number")]
    pub id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactKind {
    Private,
    Group,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationData {
    #[serde(deserialize_with = "lenient::number")]
    pub lat: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub lon: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Platform songs carry `id`; custom songs carry `url`, `audio` and `title`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MusicData {
    #[serde(rename = "type")]
    pub kind: MusicKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub singer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MusicKind {
    #[serde(rename = "qq")]
    Qq,
    #[serde(rename = "163")]
    NetEase,
    #[serde(rename = "custom")]
    Custom,
}

/// A quoted message. The extra fields build a fake quote of a message the
/// server cannot look up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyData {
    #[serde(deserialize_with = "lenient::number")]
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qq: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TouchData {
    pub id: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
}

/// Raw JSON card payload, kept as the exact text the server sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonData {
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwardData {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiceData {}

/// Rock-paper-scissors and basketball: empty when sent, the rolled result
/// when received.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MinigameData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BubbleFaceData {
    pub id: i64,
    pub count: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyboardData {
    pub data: InlineKeyboard,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlineKeyboard {
    pub rows: Vec<KeyboardRow>,
    pub bot_app_id: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyboardRow {
    pub buttons: Vec<KeyboardButton>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyboardButton {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub render_data: ButtonRender,
    pub action: ButtonAction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ButtonRender {
    pub label: String,
    pub visited_label: String,
    pub style: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ButtonAction {
    #[serde(rename = "type")]
    pub kind: i64,
    pub click_limit: i64,
    pub unsupport_tips: String,
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at_bot_show_channel_list: Option<bool>,
    pub permission: ButtonPermission,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ButtonPermission {
    #[serde(rename = "type")]
    pub kind: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specify_role_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specify_user_ids: Option<Vec<String>>,
}

impl Segment {
    /// The text of a `text` segment.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Segment::Text(t) => Some(&t.text),
            _ => None,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Segment::Text(TextData { text: text.into() })
    }

    pub fn face(id: i64) -> Self {
        Segment::Face(FaceData { id, big: None })
    }

    /// Image from a file path, `base64://` payload or URL the server can fetch.
    pub fn image(file: impl Into<String>) -> Self {
        Segment::Image(ImageData {
            file: Some(file.into()),
            ..ImageData::default()
        })
    }

    pub fn image_url(url: impl Into<String>) -> Self {
        Segment::Image(ImageData {
            url: Some(url.into()),
            ..ImageData::default()
        })
    }

    /// Flash image (disappears after viewing).
    pub fn flash_image(file: impl Into<String>) -> Self {
        Segment::Image(ImageData {
            file: Some(file.into()),
            kind: Some(ImageKind::Flash),
            ..ImageData::default()
        })
    }

    pub fn record(file: impl Into<String>) -> Self {
        Segment::Record(RecordData {
            file: Some(file.into()),
            ..RecordData::default()
        })
    }

    pub fn at(qq: u64) -> Self {
        Segment::At(AtData {
            qq: AtTarget::User(qq),
            name: None,
        })
    }

    pub fn at_all() -> Self {
        Segment::At(AtData {
            qq: AtTarget::All,
            name: None,
        })
    }

    pub fn video(file: impl Into<String>) -> Self {
        Segment::Video(VideoData {
            file: Some(file.into()),
            url: None,
        })
    }

    pub fn markdown(content: impl Into<String>) -> Self {
        Segment::Markdown(MarkdownData {
            content: content.into(),
        })
    }

    pub fn poke(kind: i64, id: i64) -> Self {
        Segment::Poke(PokeData {
            kind,
            id,
            strength: None,
        })
    }

    pub fn share(title: impl Into<String>, url: impl Into<String>) -> Self {
        Segment::Share(ShareData {
            title: title.into(),
            url: url.into(),
            image: None,
            content: None,
        })
    }

    pub fn contact(kind: ContactKind, id: u64) -> Self {
        Segment::Contact(ContactData { kind, id })
    }

    pub fn location(lat: f64, lon: f64) -> Self {
        Segment::Location(LocationData {
            lat,
            lon,
            title: None,
            content: None,
        })
    }

    /// A song from a supported platform. Use [`Segment::custom_music`] for
    /// arbitrary audio.
    pub fn music(kind: MusicKind, id: i64) -> Self {
        Segment::Music(MusicData {
            kind,
            id: Some(id),
            url: None,
            audio: None,
            title: None,
            singer: None,
            image: None,
        })
    }

    pub fn custom_music(
        url: impl Into<String>,
        audio: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Segment::Music(MusicData {
            kind: MusicKind::Custom,
            id: None,
            url: Some(url.into()),
            audio: Some(audio.into()),
            title: Some(title.into()),
            singer: None,
            image: None,
        })
    }

    pub fn reply(id: i64) -> Self {
        Segment::Reply(ReplyData {
            id,
            seq: None,
            text: None,
            time: None,
            qq: None,
        })
    }

    pub fn touch(id: u64) -> Self {
        Segment::Touch(TouchData { id })
    }

    pub fn weather_city(city: impl Into<String>) -> Self {
        Segment::Weather(WeatherData {
            code: None,
            city: Some(city.into()),
        })
    }

    pub fn weather_code(code: i64) -> Self {
        Segment::Weather(WeatherData {
            code: Some(code),
            city: None,
        })
    }

    pub fn json(data: impl Into<String>) -> Self {
        Segment::Json(JsonData { data: data.into() })
    }

    pub fn forward(id: impl Into<String>) -> Self {
        Segment::Forward(ForwardData {
            id: id.into(),
            filename: None,
            summary: None,
            desc: None,
        })
    }

    pub fn new_dice() -> Self {
        Segment::NewDice(DiceData {})
    }

    pub fn new_rps() -> Self {
        Segment::NewRps(MinigameData::default())
    }

    pub fn basketball() -> Self {
        Segment::Basketball(MinigameData::default())
    }

    pub fn bubble_face(id: i64, count: i64) -> Self {
        Segment::BubbleFace(BubbleFaceData {
            id,
            count,
            text: None,
        })
    }

    pub fn inline_keyboard(keyboard: InlineKeyboard) -> Self {
        Segment::InlineKeyboard(KeyboardData { data: keyboard })
    }

    pub fn button(keyboard: InlineKeyboard) -> Self {
        Segment::Button(KeyboardData { data: keyboard })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use super::*;
    use serde_json::json;

    #[test]
    fn outbound_image_skips_absent_fields() {
        let v = serde_json::to_value(Segment::image("a.png")).unwrap();
        assert_eq!(v, json!({"type": "image", "data": {"file": "a.png"}}));
    }

    #[test]
    fn inbound_image_reads_sub_type() {
        let seg: Segment = serde_json::from_value(json!({
            "type": "image",
            "data": {"file": "x", "url": "http://x", "type": "show", "subType": 1}
        }))
        .unwrap();
        let Segment::Image(img) = seg else {
            panic!("not an image");
        };
        assert_eq!(img.kind, Some(ImageKind::Show));
        assert_eq!(img.sub_type, Some(1));
    }

    #[test]
    fn at_targets_use_string_forms() {
        let all = serde_json::to_value(Segment::at_all()).unwrap();
        assert_eq!(all["data"]["qq"], json!("all"));

        let seg: Segment =
            serde_json::from_value(json!({"type": "at", "data": {"qq": "10001"}})).unwrap();
        assert_eq!(seg, Segment::at(10001));
    }

    #[test]
    fn contact_and_location_accept_string_numbers() {
        let seg: Segment = serde_json::from_value(json!({
            "type": "contact",
            "data": {"type": "group", "id": "123456"}
        }))
        .unwrap();
        assert_eq!(seg, Segment::contact(ContactKind::Group, 123456));

        let seg: Segment = serde_json::from_value(json!({
            "type": "location",
            "data": {"lat": "39.9", "lon": "116.4", "title": "t", "content": "c"}
        }))
        .unwrap();
        let Segment::Location(loc) = seg else {
            panic!("not a location");
        };
        assert!((loc.lat - 39.9).abs() < f64::EPSILON);
    }

    #[test]
    fn minigames_serialize_empty_data() {
        let v = serde_json::to_value(Segment::new_dice()).unwrap();
        assert_eq!(v, json!({"type": "new_dice", "data": {}}));
        assert_eq!(Segment::basketball().kind(), "basketball");
    }

    #[test]
    fn unknown_kinds_are_kept_verbatim() {
        let wire = json!({"type": "mface", "data": {"emoji_id": "e1", "key": 7}});
        let seg: Segment = serde_json::from_value(wire.clone()).unwrap();
        assert_eq!(seg.kind(), "mface");
        assert!(matches!(&seg, Segment::Other(o) if o.data.len() == 2));
        assert_eq!(serde_json::to_value(&seg).unwrap(), wire);

        let bare: Segment = serde_json::from_value(json!({"type": "node"})).unwrap();
        assert_eq!(serde_json::to_value(&bare).unwrap(), json!({"type": "node", "data": {}}));
    }

    #[test]
    fn known_kind_with_bad_data_is_still_an_error() {
        let err = serde_json::from_value::<Segment>(json!({"type": "face", "data": {"id": "smile"}}));
        assert!(err.is_err());
        assert!(serde_json::from_value::<Segment>(json!({"data": {}})).is_err());
    }
}
