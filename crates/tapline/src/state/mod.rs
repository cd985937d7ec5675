//! Bookmark state.
//!
//! State files follow the Singer layout:
//!
//! ```json
//! {"bookmarks": {"events": {"updated_at": "2021-03-01T00:00:00Z"}}}
//! ```
//!
//! Top-level keys other than `bookmarks` are kept as-is and written back.

mod monitor;

pub use monitor::{compare_bookmarks, parse_timestamp, BookmarkMonitor, SortOrder};

use std::cmp::Ordering;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, TapError};

/// Tap state: per-stream bookmarks plus any other top-level keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct State {
    /// Bookmarks keyed by stream id, then replication key.
    #[serde(default)]
    pub bookmarks: Map<String, Value>,

    /// Other top-level keys, preserved untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl State {
    /// Create empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load state from a JSON file. Errors name the file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        std::fs::read_to_string(path)
            .map_err(TapError::from)
            .and_then(|content| Self::from_json(&content))
            .map_err(|e| TapError::in_file(path, e))
    }

    /// Parse state from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Build state from an already-parsed JSON value.
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// State as a JSON value, as carried in STATE messages.
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Bookmark value for a stream's replication key.
    pub fn get_bookmark(&self, stream: &str, key: &str) -> Option<&Value> {
        self.bookmarks.get(stream)?.get(key)
    }

    /// Whether a stream has a bookmark for `key`.
    pub fn has_bookmark(&self, stream: &str, key: &str) -> bool {
        self.get_bookmark(stream, key).is_some()
    }

    /// Set a bookmark, keeping the stream's other bookmark keys.
    pub fn set_bookmark(&mut self, stream: &str, key: &str, value: Value) {
        let entry = self
            .bookmarks
            .entry(stream.to_string())
            .or_insert_with(|| Value::Object(Map::new()));

        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        if let Value::Object(bookmark) = entry {
            bookmark.insert(key.to_string(), value);
        }
    }

    /// Move a bookmark forward to `value` if it is greater than the current one.
    ///
    /// Values that cannot be compared with the current bookmark leave it
    /// unchanged. Returns true if the bookmark moved.
    pub fn advance_bookmark(&mut self, stream: &str, key: &str, value: &Value) -> bool {
        let advance = match self.get_bookmark(stream, key) {
            None => true,
            Some(current) => compare_bookmarks(current, value) == Some(Ordering::Less),
        };

        if advance {
            self.set_bookmark(stream, key, value.clone());
        }
        advance
    }
}
