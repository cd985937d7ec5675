//! JSON Schema helpers and schema sources for streams.
//!
//! Streams describe their records with a JSON-Schema-shaped object. A
//! [`SchemaSource`] says where that object comes from; a stream usually
//! returns `source.load(...)` from its `schema` method.

use std::fmt;
use std::path::{Path, PathBuf};

use serde_json::{json, Value};

use super::traits::TapContext;
use crate::error::{Result, TapError};

/// Schema used when a stream does not supply one.
pub fn empty_schema() -> Value {
    json!({"type": "object", "properties": {}})
}

/// Names of the top-level properties declared by a schema, in declaration order.
pub fn property_names(schema: &Value) -> Vec<String> {
    schema
        .get("properties")
        .and_then(Value::as_object)
        .map(|props| props.keys().cloned().collect())
        .unwrap_or_default()
}

/// Sub-schema for a top-level property.
pub fn property_schema<'a>(schema: &'a Value, field: &str) -> Option<&'a Value> {
    schema.get("properties").and_then(|props| props.get(field))
}

type DiscoverFn = Box<dyn Fn(&TapContext<'_>) -> Result<Value>>;

/// Where a stream's schema comes from.
pub enum SchemaSource {
    /// A schema held in memory.
    Inline(Value),

    /// A JSON Schema file. Relative paths resolve against the working directory.
    JsonFile(PathBuf),

    /// A schema produced at discovery time, e.g. from a describe endpoint.
    Discovered(DiscoverFn),

    /// A WSDL/XSD document to convert into JSON Schema.
    Wsdl {
        url: Option<String>,
        path: Option<PathBuf>,
    },
}

impl SchemaSource {
    /// Schema held in memory.
    pub fn inline(schema: Value) -> Self {
        SchemaSource::Inline(schema)
    }

    /// Schema read from a JSON file.
    pub fn json_file(path: impl Into<PathBuf>) -> Self {
        SchemaSource::JsonFile(path.into())
    }

    /// Schema produced by a loader function at discovery time.
    pub fn discovered<F>(loader: F) -> Self
    where
        F: Fn(&TapContext<'_>) -> Result<Value> + 'static,
    {
        SchemaSource::Discovered(Box::new(loader))
    }

    /// Schema converted from a WSDL document.
    pub fn wsdl(url: Option<String>, path: Option<PathBuf>) -> Self {
        SchemaSource::Wsdl { url, path }
    }

    /// Load the schema for `stream`.
    pub fn load(&self, stream: &str, ctx: &TapContext<'_>) -> Result<Value> {
        match self {
            SchemaSource::Inline(schema) => Ok(schema.clone()),
            SchemaSource::JsonFile(path) => load_json_schema(stream, path),
            SchemaSource::Discovered(loader) => loader(ctx),
            SchemaSource::Wsdl { url, path } => {
                if url.is_none() && path.is_none() {
                    return Err(TapError::NoWsdlLocationSpecified);
                }
                Err(TapError::NotImplemented(
                    "WSDL schema definition is not currently supported; it needs an XSD to \
                     JSON Schema translator"
                        .to_string(),
                ))
            }
        }
    }
}

impl fmt::Debug for SchemaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaSource::Inline(_) => f.write_str("SchemaSource::Inline"),
            SchemaSource::JsonFile(path) => write!(f, "SchemaSource::JsonFile({:?})", path),
            SchemaSource::Discovered(_) => f.write_str("SchemaSource::Discovered"),
            SchemaSource::Wsdl { url, path } => f
                .debug_struct("SchemaSource::Wsdl")
                .field("url", url)
                .field("path", path)
                .finish(),
        }
    }
}

fn load_json_schema(stream: &str, path: &Path) -> Result<Value> {
    let resolved = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let content = std::fs::read_to_string(&resolved)
        .map_err(|e| TapError::schema(stream, format!("{}: {}", resolved.display(), e)))?;
    let schema: Value = serde_json::from_str(&content)
        .map_err(|e| TapError::schema(stream, format!("{}: {}", resolved.display(), e)))?;

    if !schema.is_object() {
        return Err(TapError::schema(
            stream,
            format!("{}: schema root must be a JSON object", resolved.display()),
        ));
    }

    Ok(schema)
}
