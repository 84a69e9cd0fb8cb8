use serde::{Deserialize, Serialize};
use std::fmt;

/// An opaque UTF-8 key, typically of the form `collection:id`.
///
/// The core parses only the leading `collection` token (up to the first `:`)
/// to route backend I/O; everything after that is passed through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Key(String);

impl Key {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The `collection` token used to route backend I/O (the part before the
    /// first `:`). If there is no `:`, the whole key is the collection and
    /// the id is empty.
    pub fn collection(&self) -> &str {
        self.0.split_once(':').map_or(self.0.as_str(), |(c, _)| c)
    }

    /// Everything after the first `:`, passed through opaquely to the backend.
    pub fn id(&self) -> &str {
        self.0.split_once(':').map_or("", |(_, id)| id)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::new(s)
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::new(s)
    }
}

/// An opaque structured document value: a mapping of field names to
/// arbitrary JSON-equivalent values. Equality is structural.
pub type Document = serde_json::Value;

/// Lifecycle state of a slot, per spec §3.
///
/// Transitions are driven only by the lifecycle manager:
/// `absent -> Loading -> Loaded -> (mutations) -> Unloading -> Unloaded -> absent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotState {
    Loading,
    Loaded,
    Unloading,
    Unloaded,
}

impl fmt::Display for SlotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SlotState::Loading => "loading",
            SlotState::Loaded => "loaded",
            SlotState::Unloading => "unloading",
            SlotState::Unloaded => "unloaded",
        };
        f.write_str(s)
    }
}
