//! # Configuration Management
//!
//! Layered application configuration: built-in defaults, files in
//! several formats, and environment variables, merged into a single
//! dotted-path tree with change watchers, schema migration and
//! validation.
//!
//! ```no_run
//! use config::ConfigManager;
//! use serde_json::{json, Map, Value};
//! use std::path::Path;
//!
//! fn main() -> Result<(), errors::ConfigurationError> {
//!     let mut manager = ConfigManager::new();
//!     manager.load_file(Path::new("config.yaml"), None, true)?;
//!     manager.load_env("MYAPP_");
//!
//!     let theme = manager.get_or("ui.theme", json!("light"));
//!     Ok(())
//! }
//! ```

pub mod file_loader;
pub mod manager;
pub mod migrator;
pub mod paths;
pub mod tree;
pub mod validator;

pub use file_loader::{ConfigFileLoader, ConfigFormat, MAX_FILE_SIZE};
pub use manager::{ConfigInfo, ConfigManager, SourceInfo, SourceKind};
pub use migrator::{ConfigMigrator, MigrationFn, SCHEMA_VERSION_KEY};
pub use tree::{ConfigTree, WatchHandle};
pub use validator::ConfigValidator;

pub use errors::ConfigurationError;
