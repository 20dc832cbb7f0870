//! # Appcore Errors
//!
//! Shared error types for the configuration and state-management crates.
//!
//! - Uses `thiserror` for structured error definitions with named fields
//! - Every error carries enough context to pinpoint the offending key or
//!   field without parsing a message string

use serde_json::Value;
use thiserror::Error;

/// Configuration subsystem errors.
///
/// Raised for explicit, caller-initiated operations (file loads, saves,
/// validation). Best-effort operations such as `reload()` log and skip
/// broken sources instead of surfacing these.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Configuration file failed security validation: {reason} ({source_name})")]
    Security { source_name: String, reason: String },

    #[error("Unsupported configuration format: {format} ({source_name})")]
    UnsupportedFormat {
        format: String,
        source_name: String,
    },

    #[error("Invalid {format} in configuration file: {reason} ({source_name})")]
    Parse {
        format: String,
        source_name: String,
        reason: String,
    },

    #[error("Configuration file must contain a mapping at the top level ({source_name})")]
    NotAMapping { source_name: String },

    #[error("Error reading configuration file: {reason} ({source_name})")]
    Io {
        source_name: String,
        reason: String,
    },

    #[error(
        "Failed to migrate config schema from {from_version} to {to_version}: {reason} ({source_name})"
    )]
    Migration {
        from_version: String,
        to_version: String,
        source_name: String,
        reason: String,
    },

    #[error(
        "Config schema version {version} is too old and unsupported (minimum: {minimum}) ({source_name})"
    )]
    UnsupportedSchema {
        version: String,
        minimum: String,
        source_name: String,
    },

    #[error("Validation failed for '{config_key}': {reason} ({source_name})")]
    Validation {
        config_key: String,
        config_value: Value,
        source_name: String,
        reason: String,
    },
}

impl ConfigurationError {
    /// Dotted configuration key associated with the error, if any.
    pub fn config_key(&self) -> Option<&str> {
        match self {
            Self::Validation { config_key, .. } => Some(config_key),
            _ => None,
        }
    }

    /// Offending configuration value, if any.
    pub fn config_value(&self) -> Option<&Value> {
        match self {
            Self::Validation { config_value, .. } => Some(config_value),
            _ => None,
        }
    }

    /// Identifier of the source that produced the error (file path,
    /// `env:<prefix>`, or `defaults`).
    pub fn source_name(&self) -> Option<&str> {
        match self {
            Self::FileNotFound { path } => Some(path),
            Self::Security { source_name, .. }
            | Self::UnsupportedFormat { source_name, .. }
            | Self::Parse { source_name, .. }
            | Self::NotAMapping { source_name }
            | Self::Io { source_name, .. }
            | Self::Migration { source_name, .. }
            | Self::UnsupportedSchema { source_name, .. }
            | Self::Validation { source_name, .. } => Some(source_name),
        }
    }
}

/// Single-field validation failure.
///
/// `validation_rule` is a stable machine-readable identifier such as
/// `"required"`, `"min_length:5"` or `"number"`, so callers can branch on
/// the failure kind without parsing the human-readable message.
#[derive(Debug, Clone, Error)]
#[error("{message} (field: {field_name}, rule: {validation_rule})")]
pub struct ValidationError {
    pub message: String,
    pub field_name: String,
    pub field_value: Value,
    pub validation_rule: String,
}

impl ValidationError {
    pub fn new(
        message: impl Into<String>,
        field_name: impl Into<String>,
        field_value: Value,
        validation_rule: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            field_name: field_name.into(),
            field_value,
            validation_rule: validation_rule.into(),
        }
    }
}

/// State store errors.
///
/// Reducer and middleware callability is enforced by the type system, so
/// the only runtime failure mode is the reentrancy guard.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("Cannot dispatch while reducing")]
    ReentrantDispatch,
}
