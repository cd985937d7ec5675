//! Configuration validation.
//!
//! A tap declares its configuration with a [`ConfigSpec`]. The spec is turned
//! into a [`ConfigValidator`] once, when the tap is built, and every run
//! validates the raw config through it.

mod schema;
mod types;
mod validation;

pub use schema::{ConfigSchema, FnSchema, TypedSchema};
pub use types::*;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Result, TapError};

/// Validates raw config against a [`ConfigSpec`].
#[derive(Debug)]
pub struct ConfigValidator {
    spec: ConfigSpec,
    requires_config: bool,
}

impl ConfigValidator {
    /// Compile a spec into a validator.
    ///
    /// Fails with [`TapError::NotImplemented`] for [`ConfigSpec::ExampleFile`].
    pub fn new(spec: ConfigSpec) -> Result<Self> {
        if let ConfigSpec::ExampleFile(path) = &spec {
            return Err(TapError::NotImplemented(format!(
                "config spec from an example file ({}); use RequiredKeys or ExampleKeys instead",
                path.display()
            )));
        }

        let requires_config = spec.requires_config();
        Ok(Self {
            spec,
            requires_config,
        })
    }

    /// Override whether an absent config is an error.
    pub fn with_requires_config(mut self, requires_config: bool) -> Self {
        self.requires_config = requires_config;
        self
    }

    pub fn requires_config(&self) -> bool {
        self.requires_config
    }

    pub fn spec(&self) -> &ConfigSpec {
        &self.spec
    }

    /// Validate a raw config value, returning the config map streams will see.
    pub fn validate(&self, raw: Option<Value>) -> Result<ConfigMap> {
        let config = validation::baseline(raw, self.requires_config)?;

        match &self.spec {
            ConfigSpec::None => {
                warn!("No config spec supplied; config is passed through unvalidated");
                Ok(config)
            }
            ConfigSpec::RequiredKeys(keys) => {
                validation::required_keys(&config, keys)?;
                Ok(config)
            }
            ConfigSpec::ExampleKeys(example) => {
                validation::required_keys(&config, example.keys())?;
                Ok(config)
            }
            ConfigSpec::Schema(adapter) => {
                debug!("Validating config with {}", adapter.name());
                adapter.validate(config).map_err(TapError::ConfigValidation)
            }
            ConfigSpec::ExampleFile(path) => Err(TapError::NotImplemented(format!(
                "config spec from an example file ({})",
                path.display()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Serialize, Deserialize)]
    struct Required {
        api_key: String,
        start_date: String,
    }

    fn validators() -> Vec<ConfigValidator> {
        let mut example = ConfigMap::new();
        example.insert("api_key".into(), json!("your-key-here"));
        example.insert("start_date".into(), json!("2020-01-01"));

        let fn_schema = FnSchema::new("required", |config: ConfigMap| {
            for key in ["api_key", "start_date"] {
                if !config.contains_key(key) {
                    return Err(format!("{} is required", key));
                }
            }
            Ok(config)
        });

        vec![
            ConfigValidator::new(ConfigSpec::required_keys(["api_key", "start_date"])).unwrap(),
            ConfigValidator::new(ConfigSpec::ExampleKeys(example)).unwrap(),
            ConfigValidator::new(ConfigSpec::schema(TypedSchema::<Required>::new())).unwrap(),
            ConfigValidator::new(ConfigSpec::schema(fn_schema)).unwrap(),
        ]
    }

    #[test]
    fn test_exact_config_accepted_by_every_variant() {
        for validator in validators() {
            let config = validator
                .validate(Some(json!({"api_key": "k", "start_date": "2020-01-01"})))
                .unwrap();
            assert_eq!(config.len(), 2, "{:?}", validator.spec());
        }
    }

    #[test]
    fn test_missing_key_rejected_by_every_variant() {
        for validator in validators() {
            let err = validator
                .validate(Some(json!({"api_key": "k"})))
                .unwrap_err();
            assert!(
                matches!(err, TapError::ConfigValidation(_)),
                "{:?}",
                validator.spec()
            );
        }
    }

    #[test]
    fn test_extra_keys_preserved_by_every_variant() {
        for validator in validators() {
            let config = validator
                .validate(Some(
                    json!({"api_key": "k", "start_date": "2020-01-01", "user_agent": "x"}),
                ))
                .unwrap();
            assert_eq!(config["user_agent"], "x", "{:?}", validator.spec());
        }
    }

    #[test]
    fn test_no_spec_passes_through() {
        let validator = ConfigValidator::new(ConfigSpec::None).unwrap();
        assert!(!validator.requires_config());
        assert!(validator.validate(None).unwrap().is_empty());

        let config = validator.validate(Some(json!({"anything": 1}))).unwrap();
        assert_eq!(config["anything"], 1);
    }

    #[test]
    fn test_spec_requires_config_by_default() {
        let validator = ConfigValidator::new(ConfigSpec::required_keys(["a"])).unwrap();
        assert!(validator.requires_config());
        assert!(validator.validate(None).is_err());

        let optional = ConfigValidator::new(ConfigSpec::required_keys(Vec::<String>::new()))
            .unwrap()
            .with_requires_config(false);
        assert!(optional.validate(None).unwrap().is_empty());
    }

    #[test]
    fn test_example_file_spec_not_implemented() {
        let err = ConfigValidator::new(ConfigSpec::ExampleFile("config.sample.json".into()))
            .unwrap_err();
        assert!(matches!(err, TapError::NotImplemented(_)));
    }

    #[test]
    fn test_adapter_message_is_carried() {
        let validator = ConfigValidator::new(ConfigSpec::schema(FnSchema::new(
            "never",
            |_: ConfigMap| Err("region must be one of us, eu".to_string()),
        )))
        .unwrap();

        let err = validator.validate(Some(json!({}))).unwrap_err();
        assert!(err.to_string().contains("region must be one of us, eu"));
    }
}
