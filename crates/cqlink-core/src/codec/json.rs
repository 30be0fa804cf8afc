//! Big-integer-safe JSON text codec.
//!
//! Peers on this protocol are frequently written against IEEE doubles, which
//! lose digits past the double-safe range. Integer literals past
//! [`MAX_SAFE_INTEGER`] therefore cross the text/structure boundary in a
//! quoted form carrying [`BIGINT_SENTINEL`]:
//!
//! - decode: such literals (value positions only) are re-quoted as
//!   `"<digits>n"` before structural parsing, then turned back into exact
//!   numbers after it (serde_json runs with `arbitrary_precision`, so a
//!   `Number` holds any width).
//! - encode: [`BigInt`] serializes past-64-bit values as `"<digits>n"`, and
//!   the sentinel strings are stripped back to bare literals in the output.
//!
//! The sentinel never survives into decoded values.
//!
//! Payloads that embed JSON inside a tag-notation string (`[CQ:json,...]`)
//! are additionally lifted out of the text before parsing and spliced back
//! verbatim afterwards.

use std::borrow::Cow;
use std::fmt;

use serde::de::{self, DeserializeOwned, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Number, Value};
use uuid::Uuid;

use crate::error::{CqLinkError, Result};

/// Suffix marking a quoted big integer inside the codec.
pub const BIGINT_SENTINEL: char = 'n';

/// Largest integer a double can hold exactly (2^53 - 1).
pub const MAX_SAFE_INTEGER: u64 = 9_007_199_254_740_991;

/// Text that signals embedded JSON payloads worth lifting before parsing.
pub const EMBEDDED_JSON_MARKER: &str = "[CQ:json";

const PLACEHOLDER_PREFIX: &str = "__cqlink_embed_";

/// Serialize to JSON text, rendering big integers as bare literals.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let text = serde_json::to_string(value).map_err(|e| CqLinkError::Encode(e.to_string()))?;
    Ok(strip_sentinels(&text))
}

/// Parse JSON text into a typed value without losing big integers.
pub fn decode<T: DeserializeOwned>(text: &str) -> Result<T> {
    let value = decode_value(text)?;
    serde_json::from_value(value).map_err(|e| CqLinkError::Decode(e.to_string()))
}

/// Parse JSON text into a dynamic value without losing big integers.
///
/// Every integer comes back as a `Number` with its exact digits; ones wider
/// than 64 bits read through [`BigInt`].
pub fn decode_value(text: &str) -> Result<Value> {
    let (lifted, stash) = if text.contains(EMBEDDED_JSON_MARKER) {
        let (t, s) = lift_embedded_json(text);
        (Cow::Owned(t), s)
    } else {
        (Cow::Borrowed(text), Vec::new())
    };

    let quoted = quote_big_integers(&lifted);
    let mut value: Value =
        serde_json::from_str(&quoted).map_err(|e| CqLinkError::Decode(e.to_string()))?;
    restore(&mut value, &stash)?;
    Ok(value)
}

/// Integer that may exceed what `serde_json::Number` carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct BigInt(pub i128);

impl From<i128> for BigInt {
    fn from(v: i128) -> Self {
        BigInt(v)
    }
}

impl From<u64> for BigInt {
    fn from(v: u64) -> Self {
        BigInt(i128::from(v))
    }
}

impl From<i64> for BigInt {
    fn from(v: i64) -> Self {
        BigInt(i128::from(v))
    }
}

impl fmt::Display for BigInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for BigInt {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if let Ok(v) = i64::try_from(self.0) {
            return serializer.serialize_i64(v);
        }
        if let Ok(v) = u64::try_from(self.0) {
            return serializer.serialize_u64(v);
        }
        serializer.serialize_str(&format!("{}{}", self.0, BIGINT_SENTINEL))
    }
}

impl<'de> Deserialize<'de> for BigInt {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct BigIntVisitor;

        impl Visitor<'_> for BigIntVisitor {
            type Value = BigInt;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an integer or a string of digits")
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<BigInt, E> {
                Ok(BigInt(i128::from(v)))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<BigInt, E> {
                Ok(BigInt(i128::from(v)))
            }

            fn visit_i128<E: de::Error>(self, v: i128) -> std::result::Result<BigInt, E> {
                Ok(BigInt(v))
            }

            fn visit_u128<E: de::Error>(self, v: u128) -> std::result::Result<BigInt, E> {
                i128::try_from(v)
                    .map(BigInt)
                    .map_err(|_| E::custom("integer exceeds 128-bit range"))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<BigInt, E> {
                let digits = v.strip_suffix(BIGINT_SENTINEL).unwrap_or(v);
                digits
                    .parse::<i128>()
                    .map(BigInt)
                    .map_err(|_| E::custom(format!("not an integer: {v}")))
            }
        }

        deserializer.deserialize_any(BigIntVisitor)
    }
}

// --------------------
// Lexical scan
// --------------------

/// A rewritable token of JSON text. Spans are byte offsets, end exclusive;
/// string spans include both quotes.
#[derive(Debug, Clone, Copy)]
enum Piece {
    String { start: usize, end: usize, value: bool },
    Number { start: usize, end: usize, value: bool },
}

impl Piece {
    fn span(&self) -> (usize, usize) {
        match *self {
            Piece::String { start, end, .. } | Piece::Number { start, end, .. } => (start, end),
        }
    }
}

fn slice(text: &str, start: usize, end: usize) -> &str {
    text.get(start..end).unwrap_or("")
}

/// Offset just past the closing quote of the string opened at `start`.
fn string_end(bytes: &[u8], start: usize) -> usize {
    let mut i = start + 1;
    while let Some(&b) = bytes.get(i) {
        match b {
            b'\\' => i += 2,
            b'"' => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

fn number_end(bytes: &[u8], start: usize) -> usize {
    let mut i = start;
    while let Some(&b) = bytes.get(i) {
        if b.is_ascii_digit() || matches!(b, b'-' | b'+' | b'.' | b'e' | b'E') {
            i += 1;
        } else {
            break;
        }
    }
    i
}

/// Strings and numbers of `text`, each tagged with whether it sits in a value
/// position (after `:`, inside an array, or at top level) as opposed to
/// being an object key.
fn pieces(text: &str) -> Vec<Piece> {
    let bytes = text.as_bytes();
    let mut out = Vec::new();
    let mut containers: Vec<u8> = Vec::new();
    let mut prev = 0u8;
    let mut i = 0;

    while let Some(&b) = bytes.get(i) {
        let value = match prev {
            b':' | b'[' => true,
            b',' => containers.last() == Some(&b'['),
            0 => containers.is_empty(),
            _ => false,
        };
        match b {
            b'"' => {
                let end = string_end(bytes, i);
                out.push(Piece::String { start: i, end, value });
                prev = b'"';
                i = end;
            }
            b'-' | b'0'..=b'9' => {
                let end = number_end(bytes, i);
                out.push(Piece::Number { start: i, end, value });
                prev = b'0';
                i = end;
            }
            b'{' | b'[' => {
                containers.push(b);
                prev = b;
                i += 1;
            }
            b'}' | b']' => {
                containers.pop();
                prev = b;
                i += 1;
            }
            _ if b.is_ascii_whitespace() => i += 1,
            _ => {
                prev = b;
                i += 1;
            }
        }
    }
    out
}

/// Rebuild `text`, replacing each piece for which `f` returns a substitute.
fn rewrite(text: &str, mut f: impl FnMut(&Piece, &str) -> Option<String>) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    let mut last = 0;
    for piece in pieces(text) {
        let (start, end) = piece.span();
        if let Some(rep) = f(&piece, slice(text, start, end)) {
            out.push_str(slice(text, last, start));
            out.push_str(&rep);
            last = end;
        }
    }
    out.push_str(slice(text, last, text.len()));
    out
}

// --------------------
// Big integers
// --------------------

/// Whether a `-?\d+` literal lies outside the double-safe range.
fn exceeds_safe_range(literal: &str) -> bool {
    let digits = literal.strip_prefix('-').unwrap_or(literal);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let digits = digits.trim_start_matches('0');
    match digits.len() {
        0..=15 => false,
        16 => digits.parse::<u64>().map_or(true, |v| v > MAX_SAFE_INTEGER),
        _ => true,
    }
}

/// Sentinel body of a string content, if it is a quoted big integer.
fn sentinel_body(content: &str) -> Option<&str> {
    let body = content.strip_suffix(BIGINT_SENTINEL)?;
    exceeds_safe_range(body).then_some(body)
}

fn quote_big_integers(text: &str) -> String {
    rewrite(text, |piece, raw| match piece {
        Piece::Number { value: true, .. } if exceeds_safe_range(raw) => {
            Some(format!("\"{raw}{BIGINT_SENTINEL}\""))
        }
        _ => None,
    })
}

fn strip_sentinels(text: &str) -> String {
    rewrite(text, |piece, raw| match piece {
        Piece::String { value: true, .. } => {
            let content = raw.strip_prefix('"')?.strip_suffix('"')?;
            sentinel_body(content).map(str::to_string)
        }
        _ => None,
    })
}

/// Number for a sentinel string. `Number` keeps its digits verbatim, so
/// widths past 64 bits stay numeric and print back as bare literals.
fn sentinel_value(s: &str) -> Option<Value> {
    let body = sentinel_body(s)?;
    body.parse::<Number>().ok().map(Value::Number)
}

// --------------------
// Embedded JSON payloads
// --------------------

/// An embedded payload lifted out of the text: its placeholder and the
/// original (still JSON-escaped) content.
#[derive(Debug)]
struct Embedded {
    placeholder: String,
    raw: String,
}

fn placeholder() -> String {
    format!("{PLACEHOLDER_PREFIX}{}__", Uuid::new_v4().simple())
}

/// End offset (exclusive, at the closing `}`) of the object starting at
/// `start` in `content`, when that `}` is immediately followed by `]`.
fn tag_payload_end(content: &str, start: usize) -> Option<usize> {
    let bytes = content.as_bytes();
    let mut depth = 0usize;
    let mut i = start;
    while let Some(&b) = bytes.get(i) {
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 && bytes.get(i + 1) == Some(&b']') {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Replace every `={...}]` payload inside an escaped string content.
fn lift_tag_payloads(content: &str, stash: &mut Vec<Embedded>) -> Option<String> {
    let mut out = String::with_capacity(content.len());
    let mut rest = 0;
    let mut cursor = 0;
    let mut lifted = false;

    while let Some(found) = slice(content, cursor, content.len()).find("={") {
        let open = cursor + found + 1;
        let Some(close) = tag_payload_end(content, open) else {
            break;
        };
        let token = placeholder();
        out.push_str(slice(content, rest, open));
        out.push_str(&token);
        stash.push(Embedded {
            placeholder: token,
            raw: slice(content, open, close).to_string(),
        });
        rest = close;
        cursor = close;
        lifted = true;
    }

    if !lifted {
        return None;
    }
    out.push_str(slice(content, rest, content.len()));
    Some(out)
}

/// Lift JSON-looking substrings out of string values: first whole strings
/// shaped `"{...}"`, then `={...}]` payloads inside tag notation.
fn lift_embedded_json(text: &str) -> (String, Vec<Embedded>) {
    let mut stash = Vec::new();

    let whole = rewrite(text, |piece, raw| {
        let Piece::String { value: true, .. } = piece else {
            return None;
        };
        let content = raw.strip_prefix('"')?.strip_suffix('"')?;
        if content.starts_with('{') && content.ends_with('}') {
            let token = placeholder();
            stash.push(Embedded {
                placeholder: token.clone(),
                raw: content.to_string(),
            });
            return Some(format!("\"{token}\""));
        }
        None
    });

    let tagged = rewrite(&whole, |piece, raw| {
        let Piece::String { value: true, .. } = piece else {
            return None;
        };
        let content = raw.strip_prefix('"')?.strip_suffix('"')?;
        lift_tag_payloads(content, &mut stash).map(|c| format!("\"{c}\""))
    });

    (tagged, stash)
}

fn splice(s: &str, stash: &[Embedded]) -> Result<String> {
    let mut out = s.to_string();
    for e in stash {
        if out.contains(&e.placeholder) {
            let original: String = serde_json::from_str(&format!("\"{}\"", e.raw))
                .map_err(|err| CqLinkError::Decode(format!("embedded json: {err}")))?;
            out = out.replace(&e.placeholder, &original);
        }
    }
    Ok(out)
}

/// Undo the codec's text-level rewrites inside a parsed value.
fn restore(value: &mut Value, stash: &[Embedded]) -> Result<()> {
    let replacement = match value {
        Value::String(s) => match sentinel_value(s) {
            Some(v) => Some(v),
            None if !stash.is_empty() && s.contains(PLACEHOLDER_PREFIX) => {
                Some(Value::String(splice(s, stash)?))
            }
            None => None,
        },
        Value::Array(items) => {
            for v in items.iter_mut() {
                restore(v, stash)?;
            }
            None
        }
        Value::Object(map) => {
            for v in map.values_mut() {
                restore(v, stash)?;
            }
            None
        }
        _ => None,
    };
    if let Some(v) = replacement {
        *value = v;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn safe_range_boundary() {
        assert!(!exceeds_safe_range("9007199254740991"));
        assert!(exceeds_safe_range("9007199254740992"));
        assert!(exceeds_safe_range("-9007199254740992"));
        assert!(exceeds_safe_range("12345678901234567"));
        assert!(!exceeds_safe_range("1.5"));
        assert!(!exceeds_safe_range("42"));
    }

    #[test]
    fn keys_are_not_value_positions() {
        let text = r#"{"12345678901234567890":[1,12345678901234567890]}"#;
        let quoted = quote_big_integers(text);
        assert_eq!(
            quoted,
            r#"{"12345678901234567890":[1,"12345678901234567890n"]}"#
        );
    }

    #[test]
    fn lifts_multiple_tag_payloads() {
        let content = r#"[CQ:json,data={\"a\":1}][CQ:json,data={\"b\":{\"c\":2}}]"#;
        let mut stash = Vec::new();
        let lifted = lift_tag_payloads(content, &mut stash).unwrap();
        assert_eq!(stash.len(), 2);
        assert_eq!(stash[0].raw, r#"{\"a\":1}"#);
        assert_eq!(stash[1].raw, r#"{\"b\":{\"c\":2}}"#);
        assert!(!lifted.contains('{'));
    }
}
