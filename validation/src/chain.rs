//! Validator chains, results and multi-field form validation.

use errors::ValidationError;
use serde_json::{Map, Value};

use crate::validators::Validator;

/// Accumulated outcome of running one or more validators.
#[derive(Default)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
        }
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
        self.is_valid = false;
    }

    /// Errors for a specific field.
    pub fn field_errors(&self, field_name: &str) -> Vec<&ValidationError> {
        self.errors
            .iter()
            .filter(|e| e.field_name == field_name)
            .collect()
    }

    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.message.clone()).collect()
    }

    pub fn field_error_messages(&self, field_name: &str) -> Vec<String> {
        self.field_errors(field_name)
            .into_iter()
            .map(|e| e.message.clone())
            .collect()
    }

    /// Fold another result into this one.
    pub fn extend(&mut self, other: ValidationResult) {
        if !other.is_valid {
            self.is_valid = false;
        }
        self.errors.extend(other.errors);
    }
}

/// Ordered list of validators for one field.
///
/// `validate` runs every validator and collects every failure rather than
/// stopping at the first, so the caller sees the complete error list in a
/// single pass.
#[derive(Default)]
pub struct ValidatorChain {
    validators: Vec<Box<dyn Validator>>,
}

impl ValidatorChain {
    pub fn new() -> Self {
        Self {
            validators: Vec::new(),
        }
    }

    pub fn with(mut self, validator: impl Validator + 'static) -> Self {
        self.validators.push(Box::new(validator));
        self
    }

    pub fn add_validator(&mut self, validator: impl Validator + 'static) -> &mut Self {
        self.validators.push(Box::new(validator));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    pub fn validate(&self, value: &Value, field_name: &str) -> ValidationResult {
        let mut result = ValidationResult::new();
        for validator in &self.validators {
            if let Err(e) = validator.validate(value, field_name) {
                result.add_error(e);
            }
        }
        result
    }
}

/// Validates multiple fields, each with its own chain.
///
/// Fields are checked in registration order; missing fields are validated
/// as null so `RequiredValidator` reports them.
#[derive(Default)]
pub struct FormValidator {
    fields: Vec<(String, ValidatorChain)>,
}

impl FormValidator {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    pub fn add_field(&mut self, field_name: impl Into<String>, chain: ValidatorChain) -> &mut Self {
        self.fields.push((field_name.into(), chain));
        self
    }

    pub fn with_field(mut self, field_name: impl Into<String>, chain: ValidatorChain) -> Self {
        self.fields.push((field_name.into(), chain));
        self
    }

    pub fn validate(&self, data: &Map<String, Value>) -> ValidationResult {
        let mut result = ValidationResult::new();
        for (field_name, chain) in &self.fields {
            let value = data.get(field_name).cloned().unwrap_or(Value::Null);
            result.extend(chain.validate(&value, field_name));
        }
        result
    }
}
