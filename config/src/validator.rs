//! # Configuration Validation
//!
//! Validates configuration mappings against per-key rules built from the
//! `validation` crate. Rules fire for keys present in the mapping; a key
//! that is absent is simply not checked, so layered configs stay partial.

use errors::ConfigurationError;
use serde_json::{Map, Value, json};
use validation::{
    ChoiceValidator, LengthValidator, NumberValidator, RequiredValidator, ValidationResult,
    ValidatorChain,
};

/// Rule-based validator for whole configuration mappings.
pub struct ConfigValidator {
    rules: Vec<(String, ValidatorChain)>,
}

impl ConfigValidator {
    /// Empty validator with no rules.
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Validator preloaded with the standard application schema.
    pub fn with_default_rules() -> Self {
        let mut validator = Self::new();

        validator.register(
            "app.name",
            ValidatorChain::new()
                .with(RequiredValidator::new())
                .with(LengthValidator::new(Some(1), Some(100))),
        );
        validator.register(
            "app.version",
            ValidatorChain::new().with(RequiredValidator::new()),
        );

        validator.register(
            "database.host",
            ValidatorChain::new().with(LengthValidator::new(Some(1), Some(255))),
        );
        validator.register(
            "database.port",
            ValidatorChain::new().with(NumberValidator::new(Some(1.0), Some(65535.0))),
        );
        validator.register(
            "database.name",
            ValidatorChain::new().with(LengthValidator::new(Some(1), Some(128))),
        );

        validator.register(
            "ui.theme",
            ValidatorChain::new().with(ChoiceValidator::new(vec![
                json!("light"),
                json!("dark"),
                json!("auto"),
            ])),
        );
        validator.register(
            "ui.language",
            ValidatorChain::new().with(LengthValidator::new(Some(2), Some(5))),
        );
        validator.register(
            "ui.font_scale",
            ValidatorChain::new().with(NumberValidator::new(Some(0.5), Some(3.0))),
        );

        validator.register(
            "performance.cache_size",
            ValidatorChain::new().with(NumberValidator::new(Some(0.0), None)),
        );
        validator.register(
            "performance.max_threads",
            ValidatorChain::new().with(NumberValidator::new(Some(1.0), Some(64.0))),
        );

        validator
    }

    /// Register a rule for a dotted key, replacing any existing rule for
    /// that key.
    pub fn register(&mut self, key: impl Into<String>, chain: ValidatorChain) -> &mut Self {
        let key = key.into();
        self.rules.retain(|(k, _)| *k != key);
        self.rules.push((key, chain));
        self
    }

    /// Run every rule whose key is present, accumulating all failures.
    pub fn check(&self, data: &Map<String, Value>) -> ValidationResult {
        let mut result = ValidationResult::new();
        for (key, chain) in &self.rules {
            if let Some(value) = dotted_get(data, key) {
                result.extend(chain.validate(value, key));
            }
        }
        result
    }

    /// Validate and surface the first failing key as a configuration
    /// error carrying every message from its chain.
    pub fn validate(
        &self,
        data: &Map<String, Value>,
        source_name: &str,
    ) -> Result<(), ConfigurationError> {
        for (key, chain) in &self.rules {
            let Some(value) = dotted_get(data, key) else {
                continue;
            };
            let result = chain.validate(value, key);
            if !result.is_valid {
                return Err(ConfigurationError::Validation {
                    config_key: key.clone(),
                    config_value: value.clone(),
                    source_name: source_name.to_string(),
                    reason: result.error_messages().join("; "),
                });
            }
        }
        Ok(())
    }
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}

fn dotted_get<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    let mut parts = key.split('.');
    let mut node = map.get(parts.next()?)?;
    for part in parts {
        node = node.as_object()?.get(part)?;
    }
    Some(node)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Map<String, Value> {
        let Value::Object(map) = json!({
            "app": {"name": "demo", "version": "1.0.0"},
            "database": {"host": "localhost", "port": 5432, "name": "demo_db"},
            "ui": {"theme": "dark", "language": "en", "font_scale": 1.0},
            "performance": {"cache_size": 100, "max_threads": 4}
        }) else {
            unreachable!()
        };
        map
    }

    #[test]
    fn test_default_rules_accept_valid_config() {
        let validator = ConfigValidator::with_default_rules();
        assert!(validator.validate(&valid_config(), "test").is_ok());
    }

    #[test]
    fn test_absent_keys_are_not_checked() {
        let validator = ConfigValidator::with_default_rules();
        let Value::Object(map) = json!({"ui": {"theme": "dark"}}) else {
            unreachable!()
        };
        assert!(validator.validate(&map, "test").is_ok());
    }

    #[test]
    fn test_empty_required_value_fails() {
        let validator = ConfigValidator::with_default_rules();
        let Value::Object(map) = json!({"app": {"name": ""}}) else {
            unreachable!()
        };
        let err = validator.validate(&map, "user.json").unwrap_err();
        assert_eq!(err.config_key(), Some("app.name"));
        assert_eq!(err.source_name(), Some("user.json"));
    }

    #[test]
    fn test_out_of_range_port_fails() {
        let validator = ConfigValidator::with_default_rules();
        let mut config = valid_config();
        config["database"]["port"] = json!(70000);
        let err = validator.validate(&config, "test").unwrap_err();
        assert_eq!(err.config_key(), Some("database.port"));
        assert_eq!(err.config_value(), Some(&json!(70000)));
    }

    #[test]
    fn test_bad_theme_fails() {
        let validator = ConfigValidator::with_default_rules();
        let mut config = valid_config();
        config["ui"]["theme"] = json!("solarized");
        assert!(validator.validate(&config, "test").is_err());
    }

    #[test]
    fn test_error_joins_all_chain_messages() {
        let validator = ConfigValidator::with_default_rules();
        let Value::Object(map) = json!({"app": {"name": ""}}) else {
            unreachable!()
        };
        let err = validator.validate(&map, "test").unwrap_err();
        let ConfigurationError::Validation { reason, .. } = err else {
            panic!("expected validation error");
        };
        assert!(reason.contains("required"));
        assert!(reason.contains(';'));
    }

    #[test]
    fn test_check_collects_all_failures() {
        let validator = ConfigValidator::with_default_rules();
        let Value::Object(map) = json!({
            "database": {"port": 0},
            "ui": {"font_scale": 9.0}
        }) else {
            unreachable!()
        };
        let result = validator.check(&map);
        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 2);
    }

    #[test]
    fn test_register_replaces_existing_rule() {
        let mut validator = ConfigValidator::with_default_rules();
        validator.register(
            "ui.theme",
            ValidatorChain::new().with(ChoiceValidator::new(vec![json!("solarized")])),
        );
        let Value::Object(map) = json!({"ui": {"theme": "solarized"}}) else {
            unreachable!()
        };
        assert!(validator.validate(&map, "test").is_ok());
    }
}
