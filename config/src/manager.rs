//! # Configuration Manager
//!
//! Layered configuration from defaults, files and environment variables.
//!
//! Sources are merged in load order, later sources overriding earlier
//! ones; defaults always sit at the bottom of the stack. Each source is
//! remembered so [`ConfigManager::reload`] can rebuild the merged view
//! from fresh data.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use errors::ConfigurationError;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use validation::ValidatorChain;

use crate::file_loader::{ConfigFileLoader, ConfigFormat};
use crate::migrator::{ConfigMigrator, MigrationFn, SCHEMA_VERSION_KEY};
use crate::paths;
use crate::tree::{ConfigTree, WatchHandle};
use crate::validator::ConfigValidator;

const DEFAULTS_SOURCE: &str = "defaults";

/// Where a configuration layer came from.
#[derive(Debug, Clone)]
pub enum SourceKind {
    Defaults,
    File {
        path: PathBuf,
        format: Option<ConfigFormat>,
        validated: bool,
    },
    Env {
        prefix: String,
    },
}

impl SourceKind {
    fn describe(&self) -> String {
        match self {
            Self::Defaults => "built-in defaults".to_string(),
            Self::File { path, validated, .. } => {
                if *validated {
                    format!("file {} (validated)", path.display())
                } else {
                    format!("file {}", path.display())
                }
            }
            Self::Env { prefix } => format!("environment variables ({prefix}*)"),
        }
    }
}

struct SourceRecord {
    kind: SourceKind,
    data: Map<String, Value>,
}

/// Summary of one loaded source, for diagnostics.
#[derive(Debug, Clone)]
pub struct SourceInfo {
    pub name: String,
    pub description: String,
    pub key_count: usize,
}

/// Diagnostic snapshot of the whole configuration setup.
#[derive(Debug, Clone)]
pub struct ConfigInfo {
    pub search_paths: Vec<PathBuf>,
    pub found_files: Vec<PathBuf>,
    pub sources: Vec<SourceInfo>,
    pub schema_version: String,
}

/// Merges configuration sources and exposes the combined tree.
#[derive(Default)]
pub struct ConfigManager {
    tree: ConfigTree,
    loader: ConfigFileLoader,
    migrator: ConfigMigrator,
    validator: ConfigValidator,
    sources: HashMap<String, SourceRecord>,
    load_order: Vec<String>,
}

impl ConfigManager {
    pub fn new() -> Self {
        Self {
            validator: ConfigValidator::with_default_rules(),
            migrator: ConfigMigrator::new(),
            ..Self::default()
        }
    }

    /// Add or replace a validation rule for a dotted key.
    pub fn register_validator(&mut self, key: impl Into<String>, chain: ValidatorChain) {
        self.validator.register(key, chain);
    }

    /// Add or replace a schema migration handler.
    pub fn register_migration_handler(
        &mut self,
        from_version: impl Into<String>,
        migration: MigrationFn,
    ) {
        self.migrator.register_handler(from_version, migration);
    }

    /// Register the defaults layer. Always merged first, no matter when
    /// it is loaded. The schema version is stamped if absent.
    pub fn load_defaults(&mut self, mut defaults: Map<String, Value>) {
        defaults
            .entry(SCHEMA_VERSION_KEY.to_string())
            .or_insert_with(|| Value::String(ConfigMigrator::CURRENT_VERSION.to_string()));
        self.sources.insert(
            DEFAULTS_SOURCE.to_string(),
            SourceRecord {
                kind: SourceKind::Defaults,
                data: defaults,
            },
        );
        self.load_order.retain(|name| name != DEFAULTS_SOURCE);
        self.load_order.insert(0, DEFAULTS_SOURCE.to_string());
        self.rebuild_and_notify();
        debug!("defaults loaded");
    }

    /// Load a configuration file as a new layer.
    ///
    /// Returns `Ok(false)` when the file does not exist; a missing file
    /// is not an error. Security failures, parse failures and (when
    /// `validate`) validation failures are, and nothing is merged on
    /// failure. The source is recorded under the canonical absolute
    /// path, so loading the same file through different spellings
    /// updates one layer instead of stacking two. Loading a source
    /// rebuilds the merged view and drops earlier runtime [`Self::set`]
    /// overrides.
    pub fn load_file(
        &mut self,
        path: &Path,
        format: Option<ConfigFormat>,
        validate: bool,
    ) -> Result<bool, ConfigurationError> {
        let path = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        let name = path.display().to_string();
        let Some(data) = self.read_file(&path, format, validate)? else {
            debug!(path = %name, "configuration file absent; skipping");
            return Ok(false);
        };

        self.insert_source(
            name.clone(),
            SourceKind::File {
                path,
                format,
                validated: validate,
            },
            data,
        );
        info!(path = %name, "configuration file loaded");
        Ok(true)
    }

    /// Load environment variables with the given prefix as one layer.
    ///
    /// `APP_DATABASE_HOST=localhost` with prefix `APP_` becomes the key
    /// `database.host`. Values are decoded as JSON literals where
    /// possible, otherwise kept as strings. Re-running replaces the
    /// previous contribution for the same prefix. Returns the number of
    /// variables imported.
    pub fn load_env(&mut self, prefix: &str) -> usize {
        let (data, count) = env_snapshot(prefix);
        self.insert_source(
            format!("env:{prefix}"),
            SourceKind::Env {
                prefix: prefix.to_string(),
            },
            data,
        );
        info!(prefix, count, "environment configuration loaded");
        count
    }

    /// Write the entire merged tree to a file, stamping the schema
    /// version if absent.
    pub fn save(&self, path: &Path) -> Result<(), ConfigurationError> {
        let mut data = self.tree.to_map();
        data.entry(SCHEMA_VERSION_KEY.to_string())
            .or_insert_with(|| Value::String(ConfigMigrator::CURRENT_VERSION.to_string()));
        self.loader.save(path, &data)?;
        info!(path = %path.display(), "configuration saved");
        Ok(())
    }

    /// Load defaults, any standard config files present on this system
    /// (ascending priority), then `UPPERCASE(app)_` environment
    /// variables. Broken files are logged and skipped. Returns the
    /// number of sources that contributed data.
    pub fn load_standard_configs(
        &mut self,
        app_name: &str,
        filename: &str,
        defaults: Map<String, Value>,
    ) -> usize {
        let mut loaded = 0;
        if !defaults.is_empty() {
            self.load_defaults(defaults);
            loaded += 1;
        }
        for path in paths::find_config_files(app_name, filename) {
            match self.load_file(&path, None, false) {
                Ok(true) => loaded += 1,
                Ok(false) => {}
                Err(e) => warn!(error = %e, path = %path.display(), "skipping config file"),
            }
        }
        let prefix = format!("{}_", app_name.to_uppercase().replace('-', "_"));
        if self.load_env(&prefix) > 0 {
            loaded += 1;
        }
        loaded
    }

    /// Re-read every source from its origin and rebuild the merged view.
    ///
    /// A source that fails to reload keeps its previous data; reload
    /// never fails as a whole. One bulk notification fires at the end.
    pub fn reload(&mut self) {
        for name in self.load_order.clone() {
            let Some(kind) = self.sources.get(&name).map(|r| r.kind.clone()) else {
                continue;
            };
            let fresh = match &kind {
                SourceKind::Defaults => continue,
                SourceKind::File {
                    path,
                    format,
                    validated,
                } => match self.read_file(path, *format, *validated) {
                    Ok(Some(data)) => Some(data),
                    Ok(None) => {
                        warn!(source = name, "file vanished; keeping previous data");
                        None
                    }
                    Err(e) => {
                        warn!(error = %e, source = name, "reload failed; keeping previous data");
                        None
                    }
                },
                SourceKind::Env { prefix } => Some(env_snapshot(prefix).0),
            };
            if let (Some(data), Some(record)) = (fresh, self.sources.get_mut(&name)) {
                record.data = data;
            }
        }
        self.rebuild_and_notify();
        info!(sources = self.load_order.len(), "configuration reloaded");
    }

    /// Drop every layer except defaults. Does nothing when no defaults
    /// were ever loaded.
    pub fn reset_to_defaults(&mut self) {
        if !self.sources.contains_key(DEFAULTS_SOURCE) {
            return;
        }
        self.sources.retain(|name, _| name == DEFAULTS_SOURCE);
        self.load_order.retain(|name| name == DEFAULTS_SOURCE);
        self.rebuild_and_notify();
        info!("configuration reset to defaults");
    }

    /// Merged configuration. With `exclude_defaults`, keys whose value
    /// equals the corresponding default are recursively subtracted,
    /// leaving only actual overrides.
    pub fn get_config(&self, exclude_defaults: bool) -> Map<String, Value> {
        let merged = self.tree.to_map();
        if !exclude_defaults {
            return merged;
        }
        match self.sources.get(DEFAULTS_SOURCE) {
            Some(record) => subtract_defaults(&merged, &record.data),
            None => merged,
        }
    }

    /// Persist the non-default configuration to the preferred per-user
    /// path. With nothing to write, returns `Ok(true)` without touching
    /// disk.
    pub fn save_user_config(
        &self,
        app_name: &str,
        filename: &str,
        exclude_defaults: bool,
    ) -> Result<bool, ConfigurationError> {
        let mut data = self.get_config(exclude_defaults);
        data.remove(SCHEMA_VERSION_KEY);
        if data.is_empty() {
            debug!("nothing beyond defaults; user config not written");
            return Ok(true);
        }
        data.insert(
            SCHEMA_VERSION_KEY.to_string(),
            Value::String(ConfigMigrator::CURRENT_VERSION.to_string()),
        );

        let Some(path) = paths::preferred_config_path(app_name, filename) else {
            return Err(ConfigurationError::Io {
                source_name: app_name.to_string(),
                reason: "no user configuration directory on this platform".to_string(),
            });
        };
        self.loader.save(&path, &data)?;
        info!(path = %path.display(), "user configuration saved");
        Ok(true)
    }

    /// Diagnostic summary: search locations, files found, loaded
    /// sources and the live schema version.
    pub fn config_info(&self, app_name: &str, filename: &str) -> ConfigInfo {
        ConfigInfo {
            search_paths: paths::search_directories(app_name),
            found_files: paths::find_config_files(app_name, filename),
            sources: self.source_info(),
            schema_version: self.config_schema_version(),
        }
    }

    /// Diagnostics for each loaded source, in load order.
    pub fn source_info(&self) -> Vec<SourceInfo> {
        self.load_order
            .iter()
            .filter_map(|name| {
                self.sources.get(name).map(|record| SourceInfo {
                    name: name.clone(),
                    description: record.kind.describe(),
                    key_count: ConfigTree::from_map(record.data.clone()).keys(None).len(),
                })
            })
            .collect()
    }

    /// Source names in load order.
    pub fn get_sources(&self) -> Vec<String> {
        self.load_order.clone()
    }

    /// Schema version this release writes.
    pub fn schema_version(&self) -> &'static str {
        self.migrator.current_version()
    }

    /// Schema version of the merged configuration.
    pub fn config_schema_version(&self) -> String {
        ConfigMigrator::schema_version(&self.tree.to_map()).to_string()
    }

    pub fn supported_versions(&self) -> Vec<String> {
        self.migrator.supported_versions()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.tree.get(key)
    }

    pub fn get_or(&self, key: &str, default: Value) -> Value {
        self.tree.get_or(key, default)
    }

    /// Set a value in the merged view. Overrides are not recorded as a
    /// source: loading another source, [`Self::reload`] or
    /// [`Self::reset_to_defaults`] rebuilds the view from the recorded
    /// sources and discards them.
    pub fn set(&mut self, key: &str, value: Value) {
        self.tree.set(key, value);
    }

    pub fn delete(&mut self, key: &str) -> bool {
        self.tree.delete(key)
    }

    pub fn has(&self, key: &str) -> bool {
        self.tree.has(key)
    }

    pub fn get_all(&self) -> Map<String, Value> {
        self.tree.to_map()
    }

    pub fn keys(&self, prefix: Option<&str>) -> Vec<String> {
        self.tree.keys(prefix)
    }

    pub fn watch(&mut self, key: Option<&str>, callback: impl Fn(&Value) + 'static) -> WatchHandle {
        self.tree.watch(key, callback)
    }

    pub fn unwatch(&mut self, handle: &WatchHandle) -> bool {
        self.tree.unwatch(handle)
    }

    fn read_file(
        &self,
        path: &Path,
        format: Option<ConfigFormat>,
        validate: bool,
    ) -> Result<Option<Map<String, Value>>, ConfigurationError> {
        let name = path.display().to_string();
        match self.loader.check_file(path) {
            Err(ConfigurationError::FileNotFound { .. }) => return Ok(None),
            Err(e) => return Err(e),
            Ok(()) => {}
        }
        let format = format.unwrap_or_else(|| ConfigFormat::from_path(path));
        let data = self.loader.load_as(path, format)?;
        let data = self.migrator.migrate(data, &name)?;
        if validate {
            self.validator.validate(&data, &name)?;
        }
        Ok(Some(data))
    }

    fn insert_source(&mut self, name: String, kind: SourceKind, data: Map<String, Value>) {
        self.sources.insert(name.clone(), SourceRecord { kind, data });
        if !self.load_order.contains(&name) {
            self.load_order.push(name);
        }
        self.rebuild_and_notify();
    }

    fn rebuild_and_notify(&mut self) {
        let mut merged = Map::new();
        for name in &self.load_order {
            if let Some(record) = self.sources.get(name) {
                ConfigTree::merge_into(&mut merged, &record.data);
            }
        }
        self.tree.replace_silent(merged);
        self.tree.notify_reloaded();
    }
}

/// Keys of `current` whose value differs from `defaults`, recursing into
/// nested objects.
fn subtract_defaults(
    current: &Map<String, Value>,
    defaults: &Map<String, Value>,
) -> Map<String, Value> {
    let mut out = Map::new();
    for (key, value) in current {
        match (defaults.get(key), value) {
            (Some(default), _) if default == value => {}
            (Some(Value::Object(default_inner)), Value::Object(inner)) => {
                let diff = subtract_defaults(inner, default_inner);
                if !diff.is_empty() {
                    out.insert(key.clone(), Value::Object(diff));
                }
            }
            _ => {
                out.insert(key.clone(), value.clone());
            }
        }
    }
    out
}

/// Collect prefixed environment variables into a nested mapping.
fn env_snapshot(prefix: &str) -> (Map<String, Value>, usize) {
    let mut tree = ConfigTree::new();
    let mut count = 0;
    for (name, raw) in env::vars() {
        let Some(stripped) = name.strip_prefix(prefix) else {
            continue;
        };
        if stripped.is_empty() {
            continue;
        }
        let key = stripped.to_lowercase().replace('_', ".");
        let value = serde_json::from_str(&raw).unwrap_or(Value::String(raw));
        tree.set(&key, value);
        count += 1;
    }
    (tree.to_map(), count)
}
