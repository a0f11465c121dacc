//! Structured record types for the normalized guide document.
//!
//! Field names in the serialized form mirror the feed's own vocabulary:
//! attribute-sourced fields carry an `@` prefix to keep them distinct from
//! child-element names (`@channel` the attribute vs `channel` the element).
//! Timestamps stay in the feed's native `YYYYMMDDHHMMSS ±ZZZZ` string form;
//! they are sortable and sliceable as-is, and consumers filter on prefixes
//! rather than calendar math.

use serde::{Deserialize, Serialize};

/// A channel declaration from the guide's preamble.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    /// Channel identifier, referenced by programmes via `@channel`.
    #[serde(rename = "@id")]
    pub id: String,
    /// Human-readable channel name.
    #[serde(rename = "display-name", default)]
    pub display_name: String,
}

/// A single scheduled programme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Programme {
    /// Channel identifier. Treated as a free-text key: a programme may
    /// reference a channel absent from the same document.
    #[serde(rename = "@channel")]
    pub channel: String,
    /// Start timestamp, `YYYYMMDDHHMMSS ±ZZZZ`.
    #[serde(rename = "@start")]
    pub start: String,
    /// Stop timestamp, same format.
    #[serde(rename = "@stop")]
    pub stop: String,
    /// Programme title.
    #[serde(default)]
    pub title: String,
    /// Optional description.
    #[serde(rename = "desc", default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
}

/// The normalized aggregate: channels and programmes in source document
/// order. Both collections are always sequences: a feed that serializes a
/// lone programme still normalizes to a one-element list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedDocument {
    #[serde(rename = "channel", default)]
    pub channels: Vec<Channel>,
    #[serde(rename = "programme", default)]
    pub programmes: Vec<Programme>,
}

impl FeedDocument {
    pub fn is_empty(&self) -> bool {
        self.programmes.is_empty()
    }
}
