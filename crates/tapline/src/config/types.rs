//! Configuration type definitions.

use std::fmt;
use std::path::PathBuf;

use serde_json::{Map, Value};

use super::schema::ConfigSchema;

/// Validated tap configuration: the flat JSON object from the config file.
pub type ConfigMap = Map<String, Value>;

/// Config key holding the default start value for incremental bookmarks.
pub const DEFAULT_START_DATE_KEY: &str = "start_date";

/// Declarative description of a tap's configuration.
#[derive(Default)]
pub enum ConfigSpec {
    /// No validation beyond the baseline check.
    #[default]
    None,

    /// Keys that must be present. Other keys pass through.
    RequiredKeys(Vec<String>),

    /// Example config; its keys are required, its values are documentation.
    ExampleKeys(ConfigMap),

    /// Validation delegated to a schema adapter.
    Schema(Box<dyn ConfigSchema>),

    /// Example config read from a file. Not supported.
    ExampleFile(PathBuf),
}

impl ConfigSpec {
    /// Required keys from a list of names.
    pub fn required_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ConfigSpec::RequiredKeys(keys.into_iter().map(Into::into).collect())
    }

    /// Validation through a schema adapter.
    pub fn schema(adapter: impl ConfigSchema + 'static) -> Self {
        ConfigSpec::Schema(Box::new(adapter))
    }

    /// Whether a tap with this spec needs a config by default.
    pub fn requires_config(&self) -> bool {
        !matches!(self, ConfigSpec::None)
    }
}

impl fmt::Debug for ConfigSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSpec::None => f.write_str("None"),
            ConfigSpec::RequiredKeys(keys) => f.debug_tuple("RequiredKeys").field(keys).finish(),
            ConfigSpec::ExampleKeys(example) => f
                .debug_tuple("ExampleKeys")
                .field(&example.keys().collect::<Vec<_>>())
                .finish(),
            ConfigSpec::Schema(adapter) => f.debug_tuple("Schema").field(&adapter.name()).finish(),
            ConfigSpec::ExampleFile(path) => f.debug_tuple("ExampleFile").field(path).finish(),
        }
    }
}
