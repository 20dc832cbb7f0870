//! Built-in validators.
//!
//! Each validator checks a single rule against a `serde_json::Value` and
//! reports failure through a structured [`ValidationError`] carrying the
//! field name, the offending value and a machine-readable rule id.

use std::path::Path;

use errors::ValidationError;
use regex::Regex;
use serde_json::Value;

/// A single validation rule.
pub trait Validator {
    /// Check `value`; `Err` carries the structured failure.
    fn validate(&self, value: &Value, field_name: &str) -> Result<(), ValidationError>;
}

/// Render a value the way a user typed it (strings unquoted).
fn value_as_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Rejects null, empty strings and empty collections.
pub struct RequiredValidator {
    message: String,
}

impl RequiredValidator {
    pub fn new() -> Self {
        Self::with_message("This field is required")
    }

    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Default for RequiredValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator for RequiredValidator {
    fn validate(&self, value: &Value, field_name: &str) -> Result<(), ValidationError> {
        let empty = match value {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            Value::Array(a) => a.is_empty(),
            Value::Object(o) => o.is_empty(),
            _ => false,
        };
        if empty {
            return Err(ValidationError::new(
                self.message.clone(),
                field_name,
                value.clone(),
                "required",
            ));
        }
        Ok(())
    }
}

/// Validates string length. Non-string values are checked against their
/// textual rendering; null counts as the empty string.
pub struct LengthValidator {
    min_length: Option<usize>,
    max_length: Option<usize>,
    message: String,
}

impl LengthValidator {
    pub fn new(min_length: Option<usize>, max_length: Option<usize>) -> Self {
        let message = match (min_length, max_length) {
            (Some(min), Some(max)) => {
                format!("Length must be between {min} and {max} characters")
            }
            (Some(min), None) => format!("Length must be at least {min} characters"),
            (None, Some(max)) => format!("Length must not exceed {max} characters"),
            (None, None) => "Invalid length".to_string(),
        };
        Self {
            min_length,
            max_length,
            message,
        }
    }
}

impl Validator for LengthValidator {
    fn validate(&self, value: &Value, field_name: &str) -> Result<(), ValidationError> {
        let text = value_as_text(value);
        let length = text.chars().count();

        if let Some(min) = self.min_length {
            if length < min {
                return Err(ValidationError::new(
                    self.message.clone(),
                    field_name,
                    value.clone(),
                    format!("min_length:{min}"),
                ));
            }
        }
        if let Some(max) = self.max_length {
            if length > max {
                return Err(ValidationError::new(
                    self.message.clone(),
                    field_name,
                    value.clone(),
                    format!("max_length:{max}"),
                ));
            }
        }
        Ok(())
    }
}

/// Validates a value against a regular expression.
pub struct RegexValidator {
    pattern: Regex,
    message: String,
}

impl RegexValidator {
    /// Panics on an invalid pattern; use [`RegexValidator::try_new`] for
    /// caller-supplied patterns.
    pub fn new(pattern: &str) -> Self {
        Self::try_new(pattern).unwrap_or_else(|e| panic!("invalid regex pattern: {e}"))
    }

    pub fn try_new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            message: format!("Value does not match required pattern: {pattern}"),
            pattern: Regex::new(pattern)?,
        })
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

impl Validator for RegexValidator {
    fn validate(&self, value: &Value, field_name: &str) -> Result<(), ValidationError> {
        let text = value_as_text(value);
        if !self.pattern.is_match(&text) {
            return Err(ValidationError::new(
                self.message.clone(),
                field_name,
                value.clone(),
                format!("regex:{}", self.pattern.as_str()),
            ));
        }
        Ok(())
    }
}

/// Regex-based email address validator.
pub struct EmailValidator {
    inner: RegexValidator,
}

impl EmailValidator {
    pub const EMAIL_PATTERN: &'static str = r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$";

    pub fn new() -> Self {
        Self {
            inner: RegexValidator::new(Self::EMAIL_PATTERN)
                .with_message("Please enter a valid email address"),
        }
    }
}

impl Default for EmailValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator for EmailValidator {
    fn validate(&self, value: &Value, field_name: &str) -> Result<(), ValidationError> {
        self.inner.validate(value, field_name)
    }
}

/// Validates numeric values and numeric strings.
pub struct NumberValidator {
    min_value: Option<f64>,
    max_value: Option<f64>,
    allow_float: bool,
    message: String,
}

impl NumberValidator {
    pub fn new(min_value: Option<f64>, max_value: Option<f64>) -> Self {
        Self::with_float_policy(min_value, max_value, true)
    }

    pub fn with_float_policy(
        min_value: Option<f64>,
        max_value: Option<f64>,
        allow_float: bool,
    ) -> Self {
        let message = match (min_value, max_value) {
            (Some(min), Some(max)) => format!("Value must be between {min} and {max}"),
            (Some(min), None) => format!("Value must be at least {min}"),
            (None, Some(max)) => format!("Value must not exceed {max}"),
            (None, None) => "Invalid number".to_string(),
        };
        Self {
            min_value,
            max_value,
            allow_float,
            message,
        }
    }

    fn numeric_value(&self, value: &Value) -> Option<f64> {
        match value {
            Value::Number(n) => {
                if !self.allow_float && n.as_i64().is_none() && n.as_u64().is_none() {
                    return None;
                }
                n.as_f64()
            }
            Value::String(s) => {
                if !self.allow_float && s.contains('.') {
                    return None;
                }
                s.trim().parse::<f64>().ok()
            }
            _ => None,
        }
    }
}

impl Validator for NumberValidator {
    fn validate(&self, value: &Value, field_name: &str) -> Result<(), ValidationError> {
        let Some(num) = self.numeric_value(value) else {
            return Err(ValidationError::new(
                "Please enter a valid number",
                field_name,
                value.clone(),
                "number",
            ));
        };

        if let Some(min) = self.min_value {
            if num < min {
                return Err(ValidationError::new(
                    self.message.clone(),
                    field_name,
                    value.clone(),
                    format!("min_value:{min}"),
                ));
            }
        }
        if let Some(max) = self.max_value {
            if num > max {
                return Err(ValidationError::new(
                    self.message.clone(),
                    field_name,
                    value.clone(),
                    format!("max_value:{max}"),
                ));
            }
        }
        Ok(())
    }
}

/// Validates filesystem paths.
pub struct PathValidator {
    must_exist: bool,
    must_be_file: bool,
    must_be_dir: bool,
}

impl PathValidator {
    pub fn new(must_exist: bool, must_be_file: bool, must_be_dir: bool) -> Self {
        Self {
            must_exist,
            must_be_file,
            must_be_dir,
        }
    }
}

impl Validator for PathValidator {
    fn validate(&self, value: &Value, field_name: &str) -> Result<(), ValidationError> {
        let Value::String(s) = value else {
            return Err(ValidationError::new(
                "Path must be a string",
                field_name,
                value.clone(),
                "path_type",
            ));
        };
        let path = Path::new(s);

        if self.must_exist && !path.exists() {
            return Err(ValidationError::new(
                "Path does not exist",
                field_name,
                value.clone(),
                "path_exists",
            ));
        }
        if self.must_be_file && path.exists() && !path.is_file() {
            return Err(ValidationError::new(
                "Path must be a file",
                field_name,
                value.clone(),
                "path_is_file",
            ));
        }
        if self.must_be_dir && path.exists() && !path.is_dir() {
            return Err(ValidationError::new(
                "Path must be a directory",
                field_name,
                value.clone(),
                "path_is_dir",
            ));
        }
        Ok(())
    }
}

/// Validates that a value is one of a fixed set of choices.
pub struct ChoiceValidator {
    choices: Vec<Value>,
    message: String,
}

impl ChoiceValidator {
    pub fn new(choices: Vec<Value>) -> Self {
        let rendered: Vec<String> = choices.iter().map(value_as_text).collect();
        Self {
            message: format!("Value must be one of: {}", rendered.join(", ")),
            choices,
        }
    }
}

impl Validator for ChoiceValidator {
    fn validate(&self, value: &Value, field_name: &str) -> Result<(), ValidationError> {
        if !self.choices.contains(value) {
            let rendered: Vec<String> = self.choices.iter().map(value_as_text).collect();
            return Err(ValidationError::new(
                self.message.clone(),
                field_name,
                value.clone(),
                format!("choice:[{}]", rendered.join(",")),
            ));
        }
        Ok(())
    }
}

/// Wraps an arbitrary predicate.
///
/// A `ValidationError` returned by the predicate itself passes through
/// verbatim; a plain `false` is reported with this validator's message.
pub struct CustomValidator {
    func: Box<dyn Fn(&Value) -> Result<bool, ValidationError>>,
    message: String,
}

impl CustomValidator {
    pub fn new(
        func: impl Fn(&Value) -> Result<bool, ValidationError> + 'static,
        message: impl Into<String>,
    ) -> Self {
        Self {
            func: Box::new(func),
            message: message.into(),
        }
    }

    /// Convenience constructor for infallible predicates.
    pub fn from_predicate(func: impl Fn(&Value) -> bool + 'static, message: impl Into<String>) -> Self {
        Self::new(move |v| Ok(func(v)), message)
    }
}

impl Validator for CustomValidator {
    fn validate(&self, value: &Value, field_name: &str) -> Result<(), ValidationError> {
        match (self.func)(value) {
            Ok(true) => Ok(()),
            Ok(false) => Err(ValidationError::new(
                self.message.clone(),
                field_name,
                value.clone(),
                "custom",
            )),
            Err(e) => Err(e),
        }
    }
}
