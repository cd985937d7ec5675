//! Singer catalog model.
//!
//! A catalog is the ordered list of streams a tap can produce, with their
//! schemas and breadcrumb metadata. Discovery builds one; sync consumes one
//! (usually the discovered catalog after an operator marked streams
//! `selected`).
//!
//! File format:
//!
//! ```json
//! {"streams": [{"tap_stream_id": "...", "stream": "...", "schema": {...}, "metadata": [...]}]}
//! ```

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::metadata::Metadata;
use crate::error::{Result, TapError};

/// How a stream is replicated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReplicationMethod {
    /// Every run reads the whole stream; no bookmark is kept.
    FullTable,
    /// Runs resume from the bookmarked replication-key value.
    Incremental,
    /// Change capture from a replication log. Not bookmarked by the engine.
    LogBased,
}

impl ReplicationMethod {
    /// Wire name (`FULL_TABLE`, `INCREMENTAL`, `LOG_BASED`).
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplicationMethod::FullTable => "FULL_TABLE",
            ReplicationMethod::Incremental => "INCREMENTAL",
            ReplicationMethod::LogBased => "LOG_BASED",
        }
    }

    /// Parse a wire name, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "FULL_TABLE" => Some(ReplicationMethod::FullTable),
            "INCREMENTAL" => Some(ReplicationMethod::Incremental),
            "LOG_BASED" => Some(ReplicationMethod::LogBased),
            _ => None,
        }
    }
}

impl fmt::Display for ReplicationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One stream in a catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Unique stream id used in state and bookmarks.
    pub tap_stream_id: String,

    /// Human-readable stream name.
    pub stream: String,

    /// Name used on the wire instead of the stream id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_alias: Option<String>,

    /// JSON Schema describing records.
    #[serde(default = "crate::core::schema::empty_schema")]
    pub schema: Value,

    /// Breadcrumb metadata.
    #[serde(default)]
    pub metadata: Metadata,
}

impl CatalogEntry {
    /// Create an entry with empty metadata.
    pub fn new(tap_stream_id: impl Into<String>, stream: impl Into<String>, schema: Value) -> Self {
        Self {
            tap_stream_id: tap_stream_id.into(),
            stream: stream.into(),
            stream_alias: None,
            schema,
            metadata: Metadata::new(),
        }
    }

    /// Whether the stream-level metadata marks this stream selected.
    pub fn is_selected(&self) -> bool {
        self.metadata.is_selected()
    }

    /// Name this stream carries in SCHEMA and RECORD messages.
    pub fn emitted_name(&self) -> &str {
        self.stream_alias.as_deref().unwrap_or(&self.tap_stream_id)
    }

    /// Effective replication method, defaulting to full table.
    pub fn replication_method(&self) -> ReplicationMethod {
        self.metadata
            .replication_method()
            .unwrap_or(ReplicationMethod::FullTable)
    }
}

/// Ordered set of catalog entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    /// Streams, in catalog order.
    #[serde(default)]
    pub streams: Vec<CatalogEntry>,
}

impl Catalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a catalog from entries.
    pub fn from_entries(streams: Vec<CatalogEntry>) -> Self {
        Self { streams }
    }

    /// Load a catalog from a JSON file. Errors name the file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        std::fs::read_to_string(path)
            .map_err(TapError::from)
            .and_then(|content| Self::from_json(&content))
            .map_err(|e| TapError::in_file(path, e))
    }

    /// Parse a catalog from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Look up an entry by stream id.
    pub fn get(&self, tap_stream_id: &str) -> Option<&CatalogEntry> {
        self.streams.iter().find(|s| s.tap_stream_id == tap_stream_id)
    }

    /// Mutable lookup by stream id.
    pub fn get_mut(&mut self, tap_stream_id: &str) -> Option<&mut CatalogEntry> {
        self.streams
            .iter_mut()
            .find(|s| s.tap_stream_id == tap_stream_id)
    }

    /// Entries whose stream-level metadata is selected.
    pub fn selected(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.streams.iter().filter(|s| s.is_selected())
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    /// Whether the catalog has no entries.
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Pretty JSON for writing to a file or stdout.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::NamedTempFile;

    fn sample_catalog() -> Value {
        json!({
            "streams": [
                {
                    "tap_stream_id": "contacts",
                    "stream": "contacts",
                    "schema": {"type": "object", "properties": {"id": {"type": "integer"}}},
                    "metadata": [
                        {"breadcrumb": [], "metadata": {"selected": true, "forced-replication-method": "INCREMENTAL"}}
                    ]
                },
                {
                    "tap_stream_id": "invoices",
                    "stream": "invoices",
                    "stream_alias": "bills",
                    "schema": {"type": "object", "properties": {}},
                    "metadata": []
                }
            ]
        })
    }

    #[test]
    fn test_replication_method_wire_names() {
        assert_eq!(
            serde_json::to_string(&ReplicationMethod::FullTable).unwrap(),
            "\"FULL_TABLE\""
        );
        assert_eq!(ReplicationMethod::parse("incremental"), Some(ReplicationMethod::Incremental));
        assert_eq!(ReplicationMethod::parse("LOG_BASED"), Some(ReplicationMethod::LogBased));
        assert_eq!(ReplicationMethod::parse("sometimes"), None);
        assert_eq!(ReplicationMethod::Incremental.to_string(), "INCREMENTAL");
    }

    #[test]
    fn test_catalog_parse_and_selection() {
        let catalog: Catalog = serde_json::from_value(sample_catalog()).unwrap();
        assert_eq!(catalog.len(), 2);

        let selected: Vec<_> = catalog.selected().map(|s| s.tap_stream_id.as_str()).collect();
        assert_eq!(selected, vec!["contacts"]);

        let contacts = catalog.get("contacts").unwrap();
        assert_eq!(contacts.replication_method(), ReplicationMethod::Incremental);
        assert_eq!(contacts.emitted_name(), "contacts");

        let invoices = catalog.get("invoices").unwrap();
        assert_eq!(invoices.replication_method(), ReplicationMethod::FullTable);
        assert_eq!(invoices.emitted_name(), "bills");
    }

    #[test]
    fn test_missing_schema_defaults_to_empty_object() {
        let catalog = Catalog::from_json(r#"{"streams": [{"tap_stream_id": "a", "stream": "a"}]}"#)
            .unwrap();
        let entry = catalog.get("a").unwrap();
        assert_eq!(entry.schema, json!({"type": "object", "properties": {}}));
        assert!(entry.metadata.is_empty());
        assert!(!entry.is_selected());
    }

    #[test]
    fn test_catalog_load_from_file() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), sample_catalog().to_string()).unwrap();

        let catalog = Catalog::load(file.path()).unwrap();
        assert!(catalog.get("invoices").is_some());
        assert!(catalog.get("missing").is_none());
    }

    #[test]
    fn test_catalog_load_errors_name_the_file() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), r#"{"streams": {}}"#).unwrap();

        let err = Catalog::load(file.path()).unwrap_err();
        assert!(err.to_string().contains(&file.path().display().to_string()));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_alias_skipped_when_absent() {
        let entry = CatalogEntry::new("a", "a", json!({}));
        let value = serde_json::to_value(&entry).unwrap();
        assert!(value.get("stream_alias").is_none());
        assert_eq!(value["metadata"], json!([]));
    }
}
