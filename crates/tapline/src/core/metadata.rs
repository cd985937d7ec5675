//! Breadcrumb metadata tree and default metadata synthesis.
//!
//! Singer metadata is a mapping from a breadcrumb path to a property bag.
//! The empty breadcrumb addresses the stream itself; `["properties", field]`
//! addresses a top-level field. On disk it is a list of
//! `{"breadcrumb": [...], "metadata": {...}}` objects, which is how
//! [`Metadata`] serializes.
//!
//! [`MetadataBuilder`] fills in the defaults the sync engine relies on. It
//! only writes keys that are absent, so anything a stream author (or an
//! operator editing the catalog) set explicitly survives, and running it
//! twice is the same as running it once.

use std::collections::BTreeMap;

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::catalog::ReplicationMethod;
use super::schema::property_names;
use super::traits::StreamAttributes;

/// A metadata breadcrumb path.
pub type Breadcrumb = Vec<String>;

/// Stream-level: declared primary key fields.
pub const TABLE_KEY_PROPERTIES: &str = "table-key-properties";
/// Stream-level: fields usable as replication keys.
pub const VALID_REPLICATION_KEYS: &str = "valid-replication-keys";
/// Stream-level: replication method the tap insists on.
pub const FORCED_REPLICATION_METHOD: &str = "forced-replication-method";
/// Stream-level: replication method chosen by the operator.
pub const REPLICATION_METHOD: &str = "replication-method";
/// Stream-level: replication key chosen by the operator.
pub const REPLICATION_KEY: &str = "replication-key";
/// Stream- or field-level selection flag.
pub const SELECTED: &str = "selected";
/// Stream- or field-level inclusion (`automatic`, `available`, `unsupported`).
pub const INCLUSION: &str = "inclusion";

/// Field is always emitted.
pub const INCLUSION_AUTOMATIC: &str = "automatic";
/// Field is emitted unless deselected.
pub const INCLUSION_AVAILABLE: &str = "available";
/// Field is never emitted.
pub const INCLUSION_UNSUPPORTED: &str = "unsupported";

/// Breadcrumb addressing a top-level schema property.
pub fn field_breadcrumb(field: &str) -> Breadcrumb {
    vec!["properties".to_string(), field.to_string()]
}

/// Breadcrumb metadata for one stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    entries: BTreeMap<Breadcrumb, Map<String, Value>>,
}

/// On-disk form of a single metadata entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct MetadataEntry {
    breadcrumb: Breadcrumb,
    metadata: Map<String, Value>,
}

impl Metadata {
    /// Create empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether no breadcrumb carries any property.
    pub fn is_empty(&self) -> bool {
        self.entries.values().all(Map::is_empty)
    }

    /// Property bag for a breadcrumb.
    pub fn get(&self, breadcrumb: &[String]) -> Option<&Map<String, Value>> {
        self.entries.get(breadcrumb)
    }

    /// A single property.
    pub fn get_value(&self, breadcrumb: &[String], key: &str) -> Option<&Value> {
        self.entries.get(breadcrumb).and_then(|bag| bag.get(key))
    }

    /// A stream-level property.
    pub fn stream_value(&self, key: &str) -> Option<&Value> {
        self.get_value(&[], key)
    }

    /// A field-level property.
    pub fn field_value(&self, field: &str, key: &str) -> Option<&Value> {
        self.get_value(&field_breadcrumb(field), key)
    }

    /// Set a property, overwriting any existing value.
    pub fn set(&mut self, breadcrumb: Breadcrumb, key: impl Into<String>, value: Value) {
        self.entries
            .entry(breadcrumb)
            .or_default()
            .insert(key.into(), value);
    }

    /// Set a property only if it is absent. Returns true if a value was written.
    pub fn set_default(&mut self, breadcrumb: Breadcrumb, key: &str, value: Value) -> bool {
        let bag = self.entries.entry(breadcrumb).or_default();
        if bag.contains_key(key) {
            return false;
        }
        bag.insert(key.to_string(), value);
        true
    }

    /// Mark the stream selected or deselected.
    pub fn set_selected(&mut self, selected: bool) {
        self.set(Vec::new(), SELECTED, Value::Bool(selected));
    }

    /// Whether the stream-level `selected` flag is true.
    pub fn is_selected(&self) -> bool {
        self.stream_value(SELECTED)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Stream-level `table-key-properties`.
    pub fn key_properties(&self) -> Vec<String> {
        string_list(self.stream_value(TABLE_KEY_PROPERTIES))
    }

    /// Effective replication method: the operator's choice, else the forced one.
    pub fn replication_method(&self) -> Option<ReplicationMethod> {
        self.stream_value(REPLICATION_METHOD)
            .or_else(|| self.stream_value(FORCED_REPLICATION_METHOD))
            .and_then(Value::as_str)
            .and_then(ReplicationMethod::parse)
    }

    /// Effective replication key: the operator's choice, else the first valid key.
    pub fn replication_key(&self) -> Option<String> {
        if let Some(key) = self.stream_value(REPLICATION_KEY).and_then(Value::as_str) {
            return Some(key.to_string());
        }
        string_list(self.stream_value(VALID_REPLICATION_KEYS))
            .into_iter()
            .next()
    }

    /// All breadcrumbs in sorted order.
    pub fn breadcrumbs(&self) -> impl Iterator<Item = &Breadcrumb> {
        self.entries.keys()
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        Some(Value::String(s)) => vec![s.clone()],
        _ => Vec::new(),
    }
}

impl Serialize for Metadata {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let list: Vec<MetadataEntry> = self
            .entries
            .iter()
            .map(|(breadcrumb, metadata)| MetadataEntry {
                breadcrumb: breadcrumb.clone(),
                metadata: metadata.clone(),
            })
            .collect();
        list.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Metadata {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let list = Vec::<MetadataEntry>::deserialize(deserializer)?;
        let mut metadata = Metadata::new();
        for entry in list {
            let bag = metadata.entries.entry(entry.breadcrumb).or_default();
            bag.extend(entry.metadata);
        }
        Ok(metadata)
    }
}

/// Synthesizes default Singer metadata for a stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataBuilder;

impl MetadataBuilder {
    /// Compute default metadata for `schema` and merge it under `existing`.
    ///
    /// Every write is gap-filling:
    ///
    /// 1. stream `table-key-properties` = declared key properties
    /// 2. stream `valid-replication-keys` = declared replication keys
    /// 3. stream `forced-replication-method` = declared method, else
    ///    `INCREMENTAL` when a replication key exists, else `FULL_TABLE`
    /// 4. field `inclusion` = `automatic` for key properties and replication
    ///    keys, `available` otherwise
    /// 5. stream `inclusion` = `available`
    pub fn build_defaults(
        schema: &Value,
        existing: &Metadata,
        attributes: &StreamAttributes,
    ) -> Metadata {
        let mut metadata = existing.clone();
        let key_properties = &attributes.key_properties;
        let replication_keys = &attributes.replication_keys;

        metadata.set_default(
            Vec::new(),
            TABLE_KEY_PROPERTIES,
            Value::from(key_properties.clone()),
        );
        metadata.set_default(
            Vec::new(),
            VALID_REPLICATION_KEYS,
            Value::from(replication_keys.clone()),
        );

        let method = attributes.replication_method.unwrap_or_else(|| {
            if replication_keys.is_empty() {
                ReplicationMethod::FullTable
            } else {
                ReplicationMethod::Incremental
            }
        });
        metadata.set_default(
            Vec::new(),
            FORCED_REPLICATION_METHOD,
            Value::from(method.as_str()),
        );

        for field in property_names(schema) {
            let automatic = key_properties.contains(&field) || replication_keys.contains(&field);
            let inclusion = if automatic {
                INCLUSION_AUTOMATIC
            } else {
                INCLUSION_AVAILABLE
            };
            metadata.set_default(field_breadcrumb(&field), INCLUSION, Value::from(inclusion));
        }

        metadata.set_default(Vec::new(), INCLUSION, Value::from(INCLUSION_AVAILABLE));

        metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn orders_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": {"type": "integer"},
                "name": {"type": ["null", "string"]},
                "updated_at": {"type": "string", "format": "date-time"}
            }
        })
    }

    fn orders_attributes() -> StreamAttributes {
        StreamAttributes::new()
            .key_properties(["id"])
            .replication_key("updated_at")
    }

    #[test]
    fn test_default_inclusion_rule() {
        let md = MetadataBuilder::build_defaults(
            &orders_schema(),
            &Metadata::new(),
            &orders_attributes(),
        );

        assert_eq!(md.field_value("id", INCLUSION), Some(&json!("automatic")));
        assert_eq!(
            md.field_value("updated_at", INCLUSION),
            Some(&json!("automatic"))
        );
        assert_eq!(md.field_value("name", INCLUSION), Some(&json!("available")));
        assert_eq!(md.stream_value(INCLUSION), Some(&json!("available")));
    }

    #[test]
    fn test_stream_level_defaults() {
        let md = MetadataBuilder::build_defaults(
            &orders_schema(),
            &Metadata::new(),
            &orders_attributes(),
        );

        assert_eq!(md.stream_value(TABLE_KEY_PROPERTIES), Some(&json!(["id"])));
        assert_eq!(
            md.stream_value(VALID_REPLICATION_KEYS),
            Some(&json!(["updated_at"]))
        );
        assert_eq!(
            md.stream_value(FORCED_REPLICATION_METHOD),
            Some(&json!("INCREMENTAL"))
        );
        assert_eq!(md.replication_method(), Some(ReplicationMethod::Incremental));
        assert_eq!(md.replication_key().as_deref(), Some("updated_at"));
    }

    #[test]
    fn test_full_table_without_replication_key() {
        let attrs = StreamAttributes::new().key_properties(["id"]);
        let md = MetadataBuilder::build_defaults(&orders_schema(), &Metadata::new(), &attrs);

        assert_eq!(
            md.stream_value(FORCED_REPLICATION_METHOD),
            Some(&json!("FULL_TABLE"))
        );
        assert_eq!(md.stream_value(VALID_REPLICATION_KEYS), Some(&json!([])));
    }

    #[test]
    fn test_empty_key_properties_when_none_declared() {
        let md = MetadataBuilder::build_defaults(
            &orders_schema(),
            &Metadata::new(),
            &StreamAttributes::new(),
        );
        assert_eq!(md.stream_value(TABLE_KEY_PROPERTIES), Some(&json!([])));
        assert_eq!(md.field_value("id", INCLUSION), Some(&json!("available")));
    }

    #[test]
    fn test_explicit_method_wins() {
        let attrs = orders_attributes().replication_method(ReplicationMethod::FullTable);
        let md = MetadataBuilder::build_defaults(&orders_schema(), &Metadata::new(), &attrs);
        assert_eq!(
            md.stream_value(FORCED_REPLICATION_METHOD),
            Some(&json!("FULL_TABLE"))
        );
    }

    #[test]
    fn test_preset_inclusion_is_never_overwritten() {
        let mut existing = Metadata::new();
        existing.set(field_breadcrumb("name"), INCLUSION, json!("unsupported"));
        existing.set(field_breadcrumb("id"), INCLUSION, json!("available"));

        let md = MetadataBuilder::build_defaults(&orders_schema(), &existing, &orders_attributes());

        assert_eq!(md.field_value("name", INCLUSION), Some(&json!("unsupported")));
        assert_eq!(md.field_value("id", INCLUSION), Some(&json!("available")));
    }

    #[test]
    fn test_build_defaults_is_idempotent() {
        let once = MetadataBuilder::build_defaults(
            &orders_schema(),
            &Metadata::new(),
            &orders_attributes(),
        );
        let twice = MetadataBuilder::build_defaults(&orders_schema(), &once, &orders_attributes());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_serializes_as_breadcrumb_list() {
        let mut md = Metadata::new();
        md.set_selected(true);
        md.set(field_breadcrumb("id"), INCLUSION, json!("automatic"));

        let value = serde_json::to_value(&md).unwrap();
        assert_eq!(
            value,
            json!([
                {"breadcrumb": [], "metadata": {"selected": true}},
                {"breadcrumb": ["properties", "id"], "metadata": {"inclusion": "automatic"}}
            ])
        );

        let back: Metadata = serde_json::from_value(value).unwrap();
        assert_eq!(back, md);
        assert!(back.is_selected());
    }

    #[test]
    fn test_operator_choice_overrides_forced_method() {
        let mut md = Metadata::new();
        md.set(Vec::new(), FORCED_REPLICATION_METHOD, json!("INCREMENTAL"));
        md.set(Vec::new(), REPLICATION_METHOD, json!("FULL_TABLE"));
        md.set(Vec::new(), VALID_REPLICATION_KEYS, json!(["updated_at", "created_at"]));
        md.set(Vec::new(), REPLICATION_KEY, json!("created_at"));

        assert_eq!(md.replication_method(), Some(ReplicationMethod::FullTable));
        assert_eq!(md.replication_key().as_deref(), Some("created_at"));
    }
}
