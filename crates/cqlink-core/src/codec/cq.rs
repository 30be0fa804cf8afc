//! Tag notation ("CQ code") codec.
//!
//! A tag string is plain text interleaved with tags of the form
//! `[CQ:<kind>,<key>=<value>,...]`. Text and parameter values escape `&`,
//! `[`, `]` and `,` as HTML entities. The `json` kind is special: its single
//! `data` parameter is a raw JSON document that may itself contain commas,
//! `=` and brackets, so it is captured whole up to the closing `]`.
//!
//! Decoding never goes through `serde_json::Value`. Parameters are fed to the
//! segment's own `Deserialize` impl through a small string-valued
//! deserializer that parses numbers and booleans on demand.

use serde::de::value::{MapDeserializer, StrDeserializer, StringDeserializer};
use serde::de::{self, DeserializeSeed, IntoDeserializer, MapAccess, Unexpected, Visitor};
use serde::forward_to_deserialize_any;
use serde::Deserializer;
use serde_json::Value;

use crate::error::{CqLinkError, Result};
use crate::protocol::segment::{self, JsonData, OtherSegment, Segment};

const TAG_OPEN: &str = "[CQ:";
const JSON_TAG_OPEN: &str = "[CQ:json,data=";

/// Escape text or a parameter value for tag notation.
pub fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('[', "&#91;")
        .replace(']', "&#93;")
        .replace(',', "&#44;")
}

/// Inverse of [`escape`]. `&amp;` goes last so `&amp;#91;` stays literal.
pub fn unescape(s: &str) -> String {
    s.replace("&#44;", ",")
        .replace("&#91;", "[")
        .replace("&#93;", "]")
        .replace("&amp;", "&")
}

/// Encode a sequence of segments as one tag string.
///
/// Empty text segments are falsy like empty parameters and are dropped: they
/// have no tag form, so decoding the result yields the sequence without them.
pub fn to_tag_notation(segments: &[Segment]) -> Result<String> {
    let mut out = String::new();
    for segment in segments {
        if matches!(segment, Segment::Text(t) if t.text.is_empty()) {
            continue;
        }
        out.push_str(&to_tag(segment)?);
    }
    Ok(out)
}

/// Encode one segment. Text is emitted bare (escaped); every other kind
/// becomes a `[CQ:...]` tag.
///
/// Parameters whose value is `null`, `false` or the empty string are left
/// out. `0` is kept: ids and face numbers may legitimately be zero.
pub fn to_tag(segment: &Segment) -> Result<String> {
    if let Segment::Text(t) = segment {
        return Ok(escape(&t.text));
    }

    let value = serde_json::to_value(segment).map_err(|e| CqLinkError::Encode(e.to_string()))?;

    let mut out = String::from(TAG_OPEN);
    out.push_str(segment.kind());
    if let Some(Value::Object(data)) = value.get("data") {
        for (key, v) in data {
            let Some(text) = param_text(v) else {
                continue;
            };
            out.push(',');
            out.push_str(key);
            out.push('=');
            out.push_str(&escape(&text));
        }
    }
    out.push(']');
    Ok(out)
}

fn param_text(v: &Value) -> Option<String> {
    match v {
        Value::Null | Value::Bool(false) => None,
        Value::Bool(true) => Some("true".to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        nested => Some(nested.to_string()),
    }
}

/// Decode a tag string into segments, preserving order.
///
/// Fragments that are not well-formed tags become text. A well-formed tag of
/// an unknown kind becomes [`Segment::Other`] with string parameters; a known
/// kind whose parameters do not fit is an error.
pub fn to_segments(s: &str) -> Result<Vec<Segment>> {
    merge_fragments(split_fragments(s))
        .iter()
        .map(|f| parse_fragment(f))
        .collect()
}

/// Cut before every `[CQ:` and after every `]`.
fn split_fragments(s: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    for (i, b) in s.bytes().enumerate() {
        if b == b'[' && i > start && s[i..].starts_with(TAG_OPEN) {
            out.push(&s[start..i]);
            start = i;
        } else if b == b']' {
            out.push(&s[start..=i]);
            start = i + 1;
        }
    }
    if start < s.len() {
        out.push(&s[start..]);
    }
    out
}

/// Re-join pieces of a tag whose payload contains literal brackets.
fn merge_fragments(raw: Vec<&str>) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(raw.len());
    for frag in raw {
        match merged.last_mut() {
            Some(prev) if continues_tag(prev, frag) => prev.push_str(frag),
            _ => merged.push(frag.to_string()),
        }
    }
    merged
}

fn continues_tag(prev: &str, frag: &str) -> bool {
    if !prev.starts_with(TAG_OPEN) {
        return false;
    }
    let unbalanced = prev.matches('[').count() > prev.matches(']').count();
    let dangling = !frag.starts_with('[') && frag.ends_with(']');
    unbalanced || dangling
}

fn parse_fragment(frag: &str) -> Result<Segment> {
    if let Some(raw) = frag
        .strip_prefix(JSON_TAG_OPEN)
        .and_then(|r| r.strip_suffix(']'))
    {
        return Ok(Segment::Json(JsonData { data: unescape(raw) }));
    }

    match parse_tag(frag) {
        Some((kind, params)) if !segment::is_known_kind(kind) => {
            let data = params
                .into_iter()
                .map(|(k, v)| (k, Value::String(v)))
                .collect();
            Ok(Segment::Other(OtherSegment {
                kind: kind.to_string(),
                data,
            }))
        }
        Some((kind, params)) => segment::decode_known(TagDeserializer {
            kind: Some(kind.to_string()),
            params: Some(params),
        })
        .map_err(|e| CqLinkError::Segment(format!("[CQ:{kind}]: {e}"))),
        None => {
            if frag.starts_with(TAG_OPEN) {
                tracing::debug!(fragment = frag, "malformed tag kept as text");
            }
            Ok(Segment::text(unescape(frag)))
        }
    }
}

fn parse_tag(frag: &str) -> Option<(&str, Vec<(String, String)>)> {
    let body = frag.strip_prefix(TAG_OPEN)?.strip_suffix(']')?;
    let mut parts = body.split(',');
    let kind = parts.next()?;
    if kind.is_empty()
        || !kind
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'.' || b == b'-')
    {
        return None;
    }

    let mut params = Vec::new();
    for part in parts {
        let (key, value) = part.split_once('=')?;
        if key.is_empty() {
            return None;
        }
        params.push((key.to_string(), unescape(value)));
    }
    Some((kind, params))
}

// ---- segment deserializer over tag parameters ----

/// Presents a parsed tag as `{"type": kind, "data": {params...}}`.
struct TagDeserializer {
    kind: Option<String>,
    params: Option<Vec<(String, String)>>,
}

impl<'de> Deserializer<'de> for TagDeserializer {
    type Error = de::value::Error;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> std::result::Result<V::Value, Self::Error> {
        visitor.visit_map(self)
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf option unit unit_struct newtype_struct seq tuple
        tuple_struct map struct enum identifier ignored_any
    }
}

impl<'de> MapAccess<'de> for TagDeserializer {
    type Error = de::value::Error;

    fn next_key_seed<K: DeserializeSeed<'de>>(
        &mut self,
        seed: K,
    ) -> std::result::Result<Option<K::Value>, Self::Error> {
        let key = if self.kind.is_some() {
            "type"
        } else if self.params.is_some() {
            "data"
        } else {
            return Ok(None);
        };
        let de: StrDeserializer<'_, Self::Error> = key.into_deserializer();
        seed.deserialize(de).map(Some)
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(
        &mut self,
        seed: V,
    ) -> std::result::Result<V::Value, Self::Error> {
        if let Some(kind) = self.kind.take() {
            let de: StringDeserializer<Self::Error> = kind.into_deserializer();
            return seed.deserialize(de);
        }
        let params = self.params.take().unwrap_or_default();
        let de: MapDeserializer<'de, _, Self::Error> =
            MapDeserializer::new(params.into_iter().map(|(k, v)| (k, ParamValue(v))));
        seed.deserialize(de)
    }
}

/// One unescaped parameter value. Typed requests parse the text; structured
/// requests (nested structs, lists) parse it as JSON.
struct ParamValue(String);

impl ParamValue {
    fn json(&self) -> std::result::Result<Value, de::value::Error> {
        serde_json::from_str(&self.0).map_err(de::Error::custom)
    }

    fn looks_like_json(&self) -> bool {
        let t = self.0.trim_start();
        t.starts_with('{') || t.starts_with('[')
    }
}

impl<'de> IntoDeserializer<'de, de::value::Error> for ParamValue {
    type Deserializer = Self;

    fn into_deserializer(self) -> Self {
        self
    }
}

macro_rules! parse_number {
    ($($method:ident => $visit:ident: $ty:ty),* $(,)?) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> std::result::Result<V::Value, Self::Error> {
                match self.0.trim().parse::<$ty>() {
                    Ok(v) => visitor.$visit(v),
                    Err(_) => Err(de::Error::invalid_value(Unexpected::Str(&self.0), &visitor)),
                }
            }
        )*
    };
}

impl<'de> Deserializer<'de> for ParamValue {
    type Error = de::value::Error;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> std::result::Result<V::Value, Self::Error> {
        if self.looks_like_json() {
            if let Ok(v) = self.json() {
                return v.deserialize_any(visitor).map_err(de::Error::custom);
            }
        }
        visitor.visit_string(self.0)
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> std::result::Result<V::Value, Self::Error> {
        match self.0.trim() {
            "true" | "1" => visitor.visit_bool(true),
            "false" | "0" | "" => visitor.visit_bool(false),
            _ => Err(de::Error::invalid_value(Unexpected::Str(&self.0), &visitor)),
        }
    }

    parse_number! {
        deserialize_i8 => visit_i8: i8,
        deserialize_i16 => visit_i16: i16,
        deserialize_i32 => visit_i32: i32,
        deserialize_i64 => visit_i64: i64,
        deserialize_u8 => visit_u8: u8,
        deserialize_u16 => visit_u16: u16,
        deserialize_u32 => visit_u32: u32,
        deserialize_u64 => visit_u64: u64,
        deserialize_f32 => visit_f32: f32,
        deserialize_f64 => visit_f64: f64,
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> std::result::Result<V::Value, Self::Error> {
        visitor.visit_string(self.0)
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> std::result::Result<V::Value, Self::Error> {
        visitor.visit_string(self.0)
    }

    fn deserialize_char<V: Visitor<'de>>(self, visitor: V) -> std::result::Result<V::Value, Self::Error> {
        visitor.visit_string(self.0)
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, visitor: V) -> std::result::Result<V::Value, Self::Error> {
        visitor.visit_string(self.0)
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> std::result::Result<V::Value, Self::Error> {
        if self.0.is_empty() {
            visitor.visit_none()
        } else {
            visitor.visit_some(self)
        }
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> std::result::Result<V::Value, Self::Error> {
        visitor.visit_unit()
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> std::result::Result<V::Value, Self::Error> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> std::result::Result<V::Value, Self::Error> {
        let de: StringDeserializer<Self::Error> = self.0.into_deserializer();
        visitor.visit_enum(de)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> std::result::Result<V::Value, Self::Error> {
        self.json()?.deserialize_seq(visitor).map_err(de::Error::custom)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> std::result::Result<V::Value, Self::Error> {
        self.json()?.deserialize_map(visitor).map_err(de::Error::custom)
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> std::result::Result<V::Value, Self::Error> {
        self.json()?
            .deserialize_struct(name, fields, visitor)
            .map_err(de::Error::custom)
    }

    forward_to_deserialize_any! {
        i128 u128 bytes byte_buf unit_struct tuple tuple_struct ignored_any
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn split_cuts_at_tag_boundaries() {
        let parts = split_fragments("hi[CQ:face,id=1]there[CQ:at,qq=2]");
        assert_eq!(parts, vec!["hi", "[CQ:face,id=1]", "there", "[CQ:at,qq=2]"]);
    }

    #[test]
    fn merge_repairs_bracketed_payload() {
        let merged = merge_fragments(split_fragments(r#"[CQ:json,data={"a":[1,2]}]x"#));
        assert_eq!(merged, vec![r#"[CQ:json,data={"a":[1,2]}]"#, "x"]);
    }

    #[test]
    fn unescape_is_not_applied_twice() {
        assert_eq!(unescape("&amp;#91;"), "&#91;");
        assert_eq!(unescape(&escape("&#91;[,]&")), "&#91;[,]&");
    }

    #[test]
    fn bare_brackets_stay_text() {
        let segs = to_segments("[not a tag]").unwrap();
        assert_eq!(segs, vec![Segment::text("[not a tag]")]);
    }
}
