//! # Configuration Schema Migration
//!
//! Upgrades configuration mappings written by older releases to the
//! current schema. Mappings carry their schema version under
//! `$schema_version`; a registered handler transforms the mapping and the
//! migrator stamps the current version afterwards.

use std::collections::HashMap;

use errors::ConfigurationError;
use serde_json::{Map, Value};
use tracing::{info, warn};

/// Key holding the schema version inside a configuration mapping.
pub const SCHEMA_VERSION_KEY: &str = "$schema_version";

/// One migration step. Takes ownership of the mapping and returns the
/// upgraded mapping, or a reason string on failure. The migrator stamps
/// the version afterwards.
pub type MigrationFn = Box<dyn Fn(Map<String, Value>) -> Result<Map<String, Value>, String>>;

/// Applies schema migrations to configuration mappings.
pub struct ConfigMigrator {
    migrations: HashMap<String, MigrationFn>,
}

impl ConfigMigrator {
    /// Schema version written by this release.
    pub const CURRENT_VERSION: &'static str = "1.0.0";
    /// Version assumed for mappings with no version key.
    pub const DEFAULT_VERSION: &'static str = "0.9.0";
    /// Oldest schema that can still be migrated.
    pub const MIN_SUPPORTED_VERSION: &'static str = "0.8.0";

    pub fn new() -> Self {
        let mut migrator = Self {
            migrations: HashMap::new(),
        };
        migrator.register_handler("0.9.0", Box::new(migrate_legacy));
        migrator.register_handler("0.9.1", Box::new(migrate_legacy));
        migrator
    }

    /// Register a migration handler for mappings at exactly
    /// `from_version`, replacing any existing handler for that version.
    pub fn register_handler(&mut self, from_version: impl Into<String>, migration: MigrationFn) {
        self.migrations.insert(from_version.into(), migration);
    }

    pub fn current_version(&self) -> &'static str {
        Self::CURRENT_VERSION
    }

    /// Versions this migrator understands: the current one plus every
    /// registered handler, deduplicated, newest first.
    pub fn supported_versions(&self) -> Vec<String> {
        let mut versions: Vec<String> = self.migrations.keys().cloned().collect();
        if !versions.iter().any(|v| v == Self::CURRENT_VERSION) {
            versions.push(Self::CURRENT_VERSION.to_string());
        }
        versions.sort_by_key(|v| std::cmp::Reverse(version_tuple(v)));
        versions
    }

    /// Version recorded in a mapping, falling back to
    /// [`Self::DEFAULT_VERSION`].
    pub fn schema_version(data: &Map<String, Value>) -> &str {
        data.get(SCHEMA_VERSION_KEY)
            .and_then(Value::as_str)
            .unwrap_or(Self::DEFAULT_VERSION)
    }

    pub fn needs_migration(data: &Map<String, Value>) -> bool {
        Self::schema_version(data) != Self::CURRENT_VERSION
    }

    /// Bring a mapping up to the current schema version.
    ///
    /// Versions newer than the current schema are accepted untouched with
    /// a warning; versions older than the supported floor are rejected; a
    /// supported version without a handler is stamped current with a
    /// warning.
    pub fn migrate(
        &self,
        data: Map<String, Value>,
        source_name: &str,
    ) -> Result<Map<String, Value>, ConfigurationError> {
        let version = Self::schema_version(&data).to_string();
        if version == Self::CURRENT_VERSION {
            return Ok(data);
        }

        if version_tuple(&version) < version_tuple(Self::MIN_SUPPORTED_VERSION) {
            return Err(ConfigurationError::UnsupportedSchema {
                version,
                minimum: Self::MIN_SUPPORTED_VERSION.to_string(),
                source_name: source_name.to_string(),
            });
        }
        if version_tuple(&version) > version_tuple(Self::CURRENT_VERSION) {
            warn!(
                version,
                current = Self::CURRENT_VERSION,
                source = source_name,
                "configuration schema is newer than this release; leaving as-is"
            );
            return Ok(data);
        }

        let mut data = match self.migrations.get(&version) {
            Some(step) => step(data).map_err(|reason| ConfigurationError::Migration {
                from_version: version.clone(),
                to_version: Self::CURRENT_VERSION.to_string(),
                source_name: source_name.to_string(),
                reason,
            })?,
            None => {
                warn!(
                    version,
                    source = source_name,
                    "no migration handler registered; stamping current version"
                );
                data
            }
        };

        data.insert(
            SCHEMA_VERSION_KEY.to_string(),
            Value::String(Self::CURRENT_VERSION.to_string()),
        );
        info!(
            from = version,
            to = Self::CURRENT_VERSION,
            source = source_name,
            "configuration migrated"
        );
        Ok(data)
    }
}

impl Default for ConfigMigrator {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse `major.minor.patch`; non-numeric or missing components count
/// as zero.
fn version_tuple(version: &str) -> (u64, u64, u64) {
    let mut parts = version.split('.');
    let mut next = || {
        parts
            .next()
            .and_then(|p| p.trim().parse::<u64>().ok())
            .unwrap_or(0)
    };
    (next(), next(), next())
}

/// Pre-1.0 configs: `ui.colour` was renamed to `ui.theme` and the
/// performance section became mandatory.
fn migrate_legacy(mut data: Map<String, Value>) -> Result<Map<String, Value>, String> {
    if let Some(Value::Object(ui)) = data.get_mut("ui") {
        if let Some(colour) = ui.remove("colour") {
            ui.entry("theme".to_string()).or_insert(colour);
        }
    }
    if !data.contains_key("performance") {
        let mut performance = Map::new();
        performance.insert("cache_size".to_string(), Value::Number(100.into()));
        performance.insert("max_threads".to_string(), Value::Number(4.into()));
        performance.insert("lazy_loading".to_string(), Value::Bool(true));
        data.insert("performance".to_string(), Value::Object(performance));
    }
    Ok(data)
}
