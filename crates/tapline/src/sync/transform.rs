//! Schema- and metadata-aware record transform.
//!
//! Applied to every record before it is emitted:
//!
//! - fields with `inclusion: unsupported`, or deselected fields that are not
//!   `automatic`, are dropped
//! - declared fields are coerced to their schema `type`
//! - `format: date-time` strings are normalized to RFC 3339 UTC
//! - undeclared fields pass through unchanged

use chrono::SecondsFormat;
use serde_json::{Map, Number, Value};

use crate::core::metadata::{
    Metadata, INCLUSION, INCLUSION_AUTOMATIC, INCLUSION_UNSUPPORTED, SELECTED,
};
use crate::core::schema::property_schema;
use crate::core::Record;
use crate::error::{Result, TapError};
use crate::state::parse_timestamp;

/// Transforms records of one stream.
#[derive(Debug, Clone, Copy)]
pub struct RecordTransformer<'a> {
    stream: &'a str,
    schema: &'a Value,
    metadata: &'a Metadata,
}

impl<'a> RecordTransformer<'a> {
    pub fn new(stream: &'a str, schema: &'a Value, metadata: &'a Metadata) -> Self {
        Self {
            stream,
            schema,
            metadata,
        }
    }

    /// Transform one record.
    pub fn transform(&self, record: Record) -> Result<Record> {
        let fields = match record {
            Value::Object(fields) => fields,
            other => {
                return Err(TapError::transform(
                    self.stream,
                    "<record>",
                    format!("record must be a JSON object, got {}", other),
                ))
            }
        };

        let mut out = Map::with_capacity(fields.len());
        for (field, value) in fields {
            if !self.is_emitted(&field) {
                continue;
            }
            let value = match property_schema(self.schema, &field) {
                Some(field_schema) => self.coerce(value, field_schema, &field)?,
                None => value,
            };
            out.insert(field, value);
        }

        Ok(Value::Object(out))
    }

    fn is_emitted(&self, field: &str) -> bool {
        let inclusion = self
            .metadata
            .field_value(field, INCLUSION)
            .and_then(Value::as_str);
        if inclusion == Some(INCLUSION_UNSUPPORTED) {
            return false;
        }

        let deselected = self.metadata.field_value(field, SELECTED) == Some(&Value::Bool(false));
        !(deselected && inclusion != Some(INCLUSION_AUTOMATIC))
    }

    fn coerce(&self, value: Value, schema: &Value, path: &str) -> Result<Value> {
        let types = declared_types(schema);
        if types.is_empty() {
            return Ok(value);
        }

        if value.is_null() {
            return if types.contains(&"null") {
                Ok(Value::Null)
            } else {
                Err(self.error(path, "null is not allowed"))
            };
        }

        let mut candidates: Vec<&str> = types.into_iter().filter(|t| *t != "null").collect();
        if let Some(pos) = candidates.iter().position(|t| matches_natively(t, &value)) {
            let native = candidates.remove(pos);
            candidates.insert(0, native);
        }

        let mut first_error = None;
        for candidate in candidates {
            match self.coerce_to(candidate, value.clone(), schema, path) {
                Ok(coerced) => return Ok(coerced),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        Err(first_error.unwrap_or_else(|| self.error(path, "value matches no declared type")))
    }

    fn coerce_to(&self, kind: &str, value: Value, schema: &Value, path: &str) -> Result<Value> {
        match (kind, value) {
            ("integer", Value::Number(n)) if n.is_i64() || n.is_u64() => Ok(Value::Number(n)),
            ("integer", Value::Number(n)) => match n.as_f64() {
                Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                    Ok(Value::from(f as i64))
                }
                _ => Err(self.error(path, format!("{} is not an integer", n))),
            },
            ("integer", Value::String(s)) => s
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| self.error(path, format!("{:?} is not an integer", s))),

            ("number", Value::Number(n)) => Ok(Value::Number(n)),
            ("number", Value::String(s)) => parse_number(&s)
                .ok_or_else(|| self.error(path, format!("{:?} is not a number", s))),

            ("string", Value::String(s)) => self.format_string(s, schema, path),
            ("string", Value::Number(n)) => Ok(Value::String(n.to_string())),
            ("string", Value::Bool(b)) => Ok(Value::String(b.to_string())),

            ("boolean", Value::Bool(b)) => Ok(Value::Bool(b)),
            ("boolean", Value::String(s)) => match s.to_ascii_lowercase().as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(self.error(path, format!("{:?} is not a boolean", s))),
            },

            ("object", Value::Object(fields)) => {
                let mut out = Map::with_capacity(fields.len());
                for (field, value) in fields {
                    let value = match property_schema(schema, &field) {
                        Some(field_schema) => {
                            self.coerce(value, field_schema, &format!("{}.{}", path, field))?
                        }
                        None => value,
                    };
                    out.insert(field, value);
                }
                Ok(Value::Object(out))
            }

            ("array", Value::Array(items)) => match schema.get("items") {
                Some(item_schema) => items
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| self.coerce(item, item_schema, &format!("{}[{}]", path, i)))
                    .collect::<Result<Vec<_>>>()
                    .map(Value::Array),
                None => Ok(Value::Array(items)),
            },

            ("integer" | "number" | "string" | "boolean" | "object" | "array" | "null", other) => {
                Err(self.error(path, format!("{} is not of type {}", other, kind)))
            }

            // Unknown type names are not ours to enforce.
            (_, other) => Ok(other),
        }
    }

    fn format_string(&self, s: String, schema: &Value, path: &str) -> Result<Value> {
        if schema.get("format").and_then(Value::as_str) != Some("date-time") {
            return Ok(Value::String(s));
        }

        parse_timestamp(&s)
            .map(|dt| Value::String(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)))
            .ok_or_else(|| self.error(path, format!("{:?} is not a valid date-time", s)))
    }

    fn error(&self, path: &str, message: impl Into<String>) -> TapError {
        TapError::transform(self.stream, path, message)
    }
}

fn declared_types(schema: &Value) -> Vec<&str> {
    match schema.get("type") {
        Some(Value::String(t)) => vec![t.as_str()],
        Some(Value::Array(ts)) => ts.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

fn matches_natively(kind: &str, value: &Value) -> bool {
    match kind {
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "string" => value.is_string(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        _ => false,
    }
}

fn parse_number(s: &str) -> Option<Value> {
    let s = s.trim();
    if let Ok(i) = s.parse::<i64>() {
        return Some(Value::from(i));
    }
    s.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metadata::field_breadcrumb;
    use serde_json::json;

    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": {"type": "integer"},
                "name": {"type": ["null", "string"]},
                "score": {"type": "number"},
                "active": {"type": "boolean"},
                "updated_at": {"type": "string", "format": "date-time"},
                "address": {
                    "type": ["null", "object"],
                    "properties": {"zip": {"type": "string"}}
                },
                "tags": {"type": "array", "items": {"type": "string"}}
            }
        })
    }

    fn transform(record: Value) -> Result<Value> {
        let schema = schema();
        let metadata = Metadata::new();
        RecordTransformer::new("people", &schema, &metadata).transform(record)
    }

    #[test]
    fn test_coercions() {
        let out = transform(json!({
            "id": "42",
            "name": 7,
            "score": "1.5",
            "active": "TRUE",
            "updated_at": "2020-01-01",
            "address": {"zip": 12345, "country": "US"},
            "tags": [1, "b"]
        }))
        .unwrap();

        assert_eq!(
            out,
            json!({
                "id": 42,
                "name": "7",
                "score": 1.5,
                "active": true,
                "updated_at": "2020-01-01T00:00:00Z",
                "address": {"zip": "12345", "country": "US"},
                "tags": ["1", "b"]
            })
        );
    }

    #[test]
    fn test_date_time_normalized_to_utc() {
        let out = transform(json!({"updated_at": "2021-06-01T12:30:00+02:00"})).unwrap();
        assert_eq!(out["updated_at"], "2021-06-01T10:30:00Z");
    }

    #[test]
    fn test_nulls_and_undeclared_fields() {
        let out = transform(json!({"name": null, "address": null, "extra": [1, 2]})).unwrap();
        assert_eq!(out, json!({"name": null, "address": null, "extra": [1, 2]}));

        let err = transform(json!({"id": null})).unwrap_err();
        assert!(matches!(err, TapError::Transform { ref field, .. } if field == "id"));
    }

    #[test]
    fn test_uncoercible_value_fails_with_path() {
        let err = transform(json!({"id": "forty-two"})).unwrap_err();
        assert!(matches!(
            err,
            TapError::Transform { ref stream, ref field, .. } if stream == "people" && field == "id"
        ));

        let err = transform(json!({"address": {"zip": [1]}})).unwrap_err();
        assert!(matches!(err, TapError::Transform { ref field, .. } if field == "address.zip"));

        let err = transform(json!({"updated_at": "yesterday"})).unwrap_err();
        assert!(err.to_string().contains("not a valid date-time"));
    }

    #[test]
    fn test_integral_float_accepted_as_integer() {
        assert_eq!(transform(json!({"id": 3.0})).unwrap()["id"], json!(3));
        assert!(transform(json!({"id": 3.5})).is_err());
    }

    #[test]
    fn test_metadata_drops_fields() {
        let schema = schema();
        let mut metadata = Metadata::new();
        metadata.set(field_breadcrumb("name"), INCLUSION, json!("unsupported"));
        metadata.set(field_breadcrumb("score"), SELECTED, json!(false));
        metadata.set(field_breadcrumb("id"), SELECTED, json!(false));
        metadata.set(field_breadcrumb("id"), INCLUSION, json!("automatic"));

        let out = RecordTransformer::new("people", &schema, &metadata)
            .transform(json!({"id": 1, "name": "a", "score": 2, "active": false}))
            .unwrap();
        assert_eq!(out, json!({"id": 1, "active": false}));
    }

    #[test]
    fn test_non_object_record_rejected() {
        assert!(transform(json!([1, 2])).is_err());
    }
}
