//! # Standard Configuration Paths
//!
//! Platform-appropriate locations for application configuration, and
//! discovery of existing configuration files in precedence order.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Per-user configuration directory for an application, e.g.
/// `~/.config/<app>` on Linux.
pub fn user_config_dir(app_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(app_name))
}

/// System-wide configuration directory, if the platform has one.
pub fn system_config_dir(app_name: &str) -> Option<PathBuf> {
    if cfg!(target_os = "macos") {
        Some(PathBuf::from("/Library/Application Support").join(app_name))
    } else if cfg!(unix) {
        Some(PathBuf::from("/etc").join(app_name))
    } else {
        None
    }
}

/// Where the per-user configuration file should live, whether or not it
/// exists yet.
pub fn preferred_config_path(app_name: &str, filename: &str) -> Option<PathBuf> {
    user_config_dir(app_name).map(|dir| dir.join(filename))
}

/// Create a directory (and parents) if missing.
pub fn ensure_directory(path: &Path) -> io::Result<()> {
    fs::create_dir_all(path)
}

/// Existing configuration files in load order: system-wide first, then
/// per-user, then the working directory. Later files are meant to
/// override earlier ones.
pub fn find_config_files(app_name: &str, filename: &str) -> Vec<PathBuf> {
    let mut found = Vec::new();
    for dir in search_directories(app_name) {
        let candidate = dir.join(filename);
        if candidate.is_file() {
            debug!(path = %candidate.display(), "configuration file found");
            found.push(candidate);
        }
    }
    found
}

/// Directories probed by [`find_config_files`], in the same order.
pub fn search_directories(app_name: &str) -> Vec<PathBuf> {
    let mut directories = Vec::new();
    if let Some(dir) = system_config_dir(app_name) {
        directories.push(dir);
    }
    if let Some(dir) = user_config_dir(app_name) {
        directories.push(dir);
    }
    if let Ok(cwd) = env::current_dir() {
        directories.push(cwd);
    }
    directories
}
