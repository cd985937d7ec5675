//! Schema adapters for config validation.
//!
//! Two adapter styles ship with the crate:
//!
//! - [`TypedSchema`]: deserialize into a typed struct with serde. Fields the
//!   struct normalizes (defaults, renamed enums) are written back over the
//!   raw map, so keys the struct does not know about survive.
//! - [`FnSchema`]: a closure that checks and returns the map.

use std::fmt;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::ConfigMap;

/// External validator for a config map.
///
/// Errors are plain messages; the validator wraps them in
/// [`TapError::ConfigValidation`](crate::error::TapError::ConfigValidation).
pub trait ConfigSchema {
    /// Validate and optionally normalize the config.
    fn validate(&self, config: ConfigMap) -> Result<ConfigMap, String>;

    /// Name used in diagnostics.
    fn name(&self) -> &str {
        "schema"
    }
}

/// Validates config by deserializing it into `T`.
pub struct TypedSchema<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> TypedSchema<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for TypedSchema<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for TypedSchema<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypedSchema<{}>", std::any::type_name::<T>())
    }
}

impl<T> ConfigSchema for TypedSchema<T>
where
    T: DeserializeOwned + Serialize,
{
    fn validate(&self, config: ConfigMap) -> Result<ConfigMap, String> {
        let typed: T =
            serde_json::from_value(Value::Object(config.clone())).map_err(|e| e.to_string())?;

        let mut merged = config;
        if let Value::Object(normalized) = serde_json::to_value(&typed).map_err(|e| e.to_string())?
        {
            merged.extend(normalized);
        }
        Ok(merged)
    }

    fn name(&self) -> &str {
        std::any::type_name::<T>()
    }
}

type ValidateFn = Box<dyn Fn(ConfigMap) -> Result<ConfigMap, String>>;

/// Validates config with a closure.
pub struct FnSchema {
    name: String,
    validate: ValidateFn,
}

impl FnSchema {
    pub fn new<F>(name: impl Into<String>, validate: F) -> Self
    where
        F: Fn(ConfigMap) -> Result<ConfigMap, String> + 'static,
    {
        Self {
            name: name.into(),
            validate: Box::new(validate),
        }
    }
}

impl fmt::Debug for FnSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnSchema").field("name", &self.name).finish()
    }
}

impl ConfigSchema for FnSchema {
    fn validate(&self, config: ConfigMap) -> Result<ConfigMap, String> {
        (self.validate)(config)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
