//! Message content in either wire form.

use serde::{Deserialize, Serialize};

use super::segment::Segment;
use crate::codec::cq;
use crate::error::Result;

/// A chat message. Servers and clients may use either the structured
/// segment array or the flattened tag string; both are accepted on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
    Segments(Vec<Segment>),
    Tagged(String),
}

impl Message {
    /// Structured form. Tag strings are decoded; segments pass through.
    pub fn into_segments(self) -> Result<Vec<Segment>> {
        match self {
            Message::Segments(segments) => Ok(segments),
            Message::Tagged(s) => cq::to_segments(&s),
        }
    }

    /// Flattened tag-string form.
    pub fn into_tagged(self) -> Result<String> {
        match self {
            Message::Segments(segments) => cq::to_tag_notation(&segments),
            Message::Tagged(s) => Ok(s),
        }
    }

    /// Concatenated text of all `text` segments.
    pub fn plain_text(&self) -> Result<String> {
        let text = match self {
            Message::Segments(segments) => collect_text(segments),
            Message::Tagged(s) => collect_text(&cq::to_segments(s)?),
        };
        Ok(text)
    }
}

fn collect_text(segments: &[Segment]) -> String {
    segments.iter().filter_map(Segment::as_text).collect()
}

impl From<Vec<Segment>> for Message {
    fn from(segments: Vec<Segment>) -> Self {
        Message::Segments(segments)
    }
}

impl From<Segment> for Message {
    fn from(segment: Segment) -> Self {
        Message::Segments(vec![segment])
    }
}

impl From<String> for Message {
    fn from(s: String) -> Self {
        Message::Tagged(s)
    }
}

impl From<&str> for Message {
    fn from(s: &str) -> Self {
        Message::Tagged(s.to_string())
    }
}
