//! Configuration validation checks.

use serde_json::Value;

use super::ConfigMap;
use crate::error::{Result, TapError};

/// Baseline check applied before any spec-specific validation.
///
/// An absent config is an error when one is required and an empty map
/// otherwise. A present config must be a JSON object.
pub fn baseline(raw: Option<Value>, requires_config: bool) -> Result<ConfigMap> {
    match raw {
        None if requires_config => Err(TapError::ConfigValidation(
            "Config is required for this tap; pass one with --config <file.json>".into(),
        )),
        None => Ok(ConfigMap::new()),
        Some(Value::Object(map)) => Ok(map),
        Some(other) => Err(TapError::ConfigValidation(format!(
            "Config must be a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

/// Fail unless every required key is present.
pub fn required_keys<'a, I>(config: &ConfigMap, keys: I) -> Result<()>
where
    I: IntoIterator<Item = &'a String>,
{
    let missing: Vec<&str> = keys
        .into_iter()
        .filter(|key| !config.contains_key(key.as_str()))
        .map(String::as_str)
        .collect();

    if missing.is_empty() {
        return Ok(());
    }

    Err(TapError::ConfigValidation(format!(
        "Config is missing required keys: {}",
        missing.join(", ")
    )))
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_absent_optional_config_is_empty() {
        assert!(baseline(None, false).unwrap().is_empty());
    }

    #[test]
    fn test_absent_required_config() {
        let err = baseline(None, true).unwrap_err();
        assert!(matches!(err, TapError::ConfigValidation(_)));
    }

    #[test]
    fn test_non_object_root_rejected() {
        for raw in [json!([1, 2]), json!("config"), json!(null), json!(3)] {
            assert!(baseline(Some(raw), false).is_err());
        }
    }

    #[test]
    fn test_required_keys_lists_all_missing() {
        let config = baseline(Some(json!({"api_key": "k"})), true).unwrap();
        let keys = vec!["api_key".to_string(), "start_date".to_string(), "region".to_string()];

        let err = required_keys(&config, &keys).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Configuration error: Config is missing required keys: start_date, region"
        );
        assert!(required_keys(&config, &keys[..1]).is_ok());
    }
}
