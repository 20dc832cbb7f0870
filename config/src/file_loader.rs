//! # Configuration File Loading
//!
//! Reads configuration files in JSON, YAML, TOML, INI and dotenv formats,
//! and writes the three structured ones, with format detection from the
//! file extension.
//!
//! Every load passes a security check first: the path must be a regular
//! file no larger than [`MAX_FILE_SIZE`], and the parsed document must be a
//! mapping at the top level.

use std::fs;
use std::path::Path;

use errors::ConfigurationError;
use serde_json::{Map, Value};
use tracing::debug;

/// Upper bound on configuration file size. Anything larger fails the
/// security check before being read.
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Supported on-disk formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Yaml,
    Toml,
    Ini,
    Env,
}

impl ConfigFormat {
    /// Detect format from the file extension. Unknown extensions fall back
    /// to JSON.
    pub fn from_path(path: &Path) -> Self {
        if path.file_name().and_then(|n| n.to_str()) == Some(".env") {
            return Self::Env;
        }
        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .map(str::to_lowercase);
        match extension.as_deref() {
            Some("yaml" | "yml") => Self::Yaml,
            Some("toml") => Self::Toml,
            Some("ini" | "cfg" | "conf") => Self::Ini,
            Some("env") => Self::Env,
            _ => Self::Json,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Json => "JSON",
            Self::Yaml => "YAML",
            Self::Toml => "TOML",
            Self::Ini => "INI",
            Self::Env => "ENV",
        }
    }
}

/// Loads and saves configuration mappings.
#[derive(Default)]
pub struct ConfigFileLoader;

impl ConfigFileLoader {
    pub fn new() -> Self {
        Self
    }

    /// Validate a path before reading it: the file must exist, be a
    /// regular file, and stay under [`MAX_FILE_SIZE`].
    pub fn check_file(&self, path: &Path) -> Result<(), ConfigurationError> {
        let source_name = path.display().to_string();
        let metadata = fs::metadata(path).map_err(|_| ConfigurationError::FileNotFound {
            path: source_name.clone(),
        })?;

        if !metadata.is_file() {
            return Err(ConfigurationError::Security {
                source_name,
                reason: "not a regular file".to_string(),
            });
        }
        if metadata.len() > MAX_FILE_SIZE {
            return Err(ConfigurationError::Security {
                source_name,
                reason: format!(
                    "file size {} exceeds maximum {MAX_FILE_SIZE} bytes",
                    metadata.len()
                ),
            });
        }
        Ok(())
    }

    /// Load a configuration file, detecting the format from the path.
    pub fn load(&self, path: &Path) -> Result<Map<String, Value>, ConfigurationError> {
        self.load_as(path, ConfigFormat::from_path(path))
    }

    /// Load a configuration file with an explicit format.
    pub fn load_as(
        &self,
        path: &Path,
        format: ConfigFormat,
    ) -> Result<Map<String, Value>, ConfigurationError> {
        self.check_file(path)?;
        let source_name = path.display().to_string();
        let contents = fs::read_to_string(path).map_err(|e| ConfigurationError::Io {
            source_name: source_name.clone(),
            reason: e.to_string(),
        })?;

        if contents.trim().is_empty() {
            return Ok(Map::new());
        }

        let value = match format {
            ConfigFormat::Json => serde_json::from_str::<Value>(&contents)
                .map_err(|e| parse_error(format, &source_name, e))?,
            ConfigFormat::Yaml => serde_yaml::from_str::<Value>(&contents)
                .map_err(|e| parse_error(format, &source_name, e))?,
            ConfigFormat::Toml => {
                let table: toml::Table =
                    toml::from_str(&contents).map_err(|e| parse_error(format, &source_name, e))?;
                serde_json::to_value(table).map_err(|e| parse_error(format, &source_name, e))?
            }
            ConfigFormat::Ini => Value::Object(parse_ini(&contents, &source_name)?),
            ConfigFormat::Env => Value::Object(parse_env_file(&contents)),
        };

        match value {
            Value::Object(map) => {
                debug!(path = %source_name, format = format.name(), "configuration file loaded");
                Ok(map)
            }
            Value::Null => Ok(Map::new()),
            _ => Err(ConfigurationError::NotAMapping { source_name }),
        }
    }

    /// Write a configuration mapping as JSON (pretty), YAML or TOML,
    /// creating parent directories as needed. The format is detected from
    /// the path; INI and dotenv are read-only formats.
    pub fn save(&self, path: &Path, data: &Map<String, Value>) -> Result<(), ConfigurationError> {
        let format = ConfigFormat::from_path(path);
        let source_name = path.display().to_string();

        let rendered = match format {
            ConfigFormat::Json => serde_json::to_string_pretty(data)
                .map_err(|e| parse_error(format, &source_name, e))?,
            ConfigFormat::Yaml => {
                serde_yaml::to_string(data).map_err(|e| parse_error(format, &source_name, e))?
            }
            ConfigFormat::Toml => {
                toml::to_string_pretty(data).map_err(|e| parse_error(format, &source_name, e))?
            }
            ConfigFormat::Ini | ConfigFormat::Env => {
                return Err(ConfigurationError::UnsupportedFormat {
                    format: format.name().to_string(),
                    source_name,
                });
            }
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| ConfigurationError::Io {
                    source_name: source_name.clone(),
                    reason: e.to_string(),
                })?;
            }
        }
        fs::write(path, rendered).map_err(|e| ConfigurationError::Io {
            source_name: source_name.clone(),
            reason: e.to_string(),
        })?;

        debug!(path = %source_name, format = format.name(), "configuration file saved");
        Ok(())
    }
}

fn parse_error(
    format: ConfigFormat,
    source_name: &str,
    error: impl std::fmt::Display,
) -> ConfigurationError {
    ConfigurationError::Parse {
        format: format.name().to_string(),
        source_name: source_name.to_string(),
        reason: error.to_string(),
    }
}

/// INI sections become top-level objects of string values; section-less
/// keys live at the top level. `=` and `:` both separate keys from
/// values; `#` and `;` start comments.
fn parse_ini(contents: &str, source_name: &str) -> Result<Map<String, Value>, ConfigurationError> {
    let mut root = Map::new();
    let mut section: Option<String> = None;

    for (line_no, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            let name = name.trim().to_string();
            root.entry(name.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            section = Some(name);
            continue;
        }

        let eq = line.find('=');
        let colon = line.find(':');
        let split_at = match (eq, colon) {
            (Some(e), Some(c)) => e.min(c),
            (Some(e), None) => e,
            (None, Some(c)) => c,
            (None, None) => {
                return Err(ConfigurationError::Parse {
                    format: "INI".to_string(),
                    source_name: source_name.to_string(),
                    reason: format!("line {}: expected 'key = value'", line_no + 1),
                });
            }
        };
        let key = line[..split_at].trim().to_string();
        let value = Value::String(line[split_at + 1..].trim().to_string());

        if let Some(name) = &section {
            if let Some(Value::Object(map)) = root.get_mut(name) {
                map.insert(key, value);
                continue;
            }
        }
        root.insert(key, value);
    }
    Ok(root)
}

/// Dotenv lines become a flat string map; `#` starts a comment, an
/// optional `export ` prefix and surrounding quotes are stripped.
fn parse_env_file(contents: &str) -> Map<String, Value> {
    let mut out = Map::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line).trim_start();
        let Some((key, raw)) = line.split_once('=') else {
            continue;
        };
        out.insert(
            key.trim().to_string(),
            Value::String(strip_quotes(raw.trim()).to_string()),
        );
    }
    out
}

fn strip_quotes(raw: &str) -> &str {
    for quote in ['"', '\''] {
        if raw.len() >= 2 && raw.starts_with(quote) && raw.ends_with(quote) {
            return &raw[1..raw.len() - 1];
        }
    }
    raw
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn write_fixture(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(ConfigFormat::from_path(Path::new("a.json")), ConfigFormat::Json);
        assert_eq!(ConfigFormat::from_path(Path::new("a.YAML")), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("a.yml")), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("a.toml")), ConfigFormat::Toml);
        assert_eq!(ConfigFormat::from_path(Path::new("a.ini")), ConfigFormat::Ini);
        assert_eq!(ConfigFormat::from_path(Path::new(".env")), ConfigFormat::Env);
        assert_eq!(ConfigFormat::from_path(Path::new("noext")), ConfigFormat::Json);
        assert_eq!(ConfigFormat::from_path(Path::new("a.xyz")), ConfigFormat::Json);
    }

    #[test]
    fn test_load_json() {
        let dir = TempDir::new().unwrap();
        let path = write_fixture(&dir, "config.json", r#"{"app": {"name": "demo"}}"#);
        let loader = ConfigFileLoader::new();
        let data = loader.load(&path).unwrap();
        assert_eq!(data["app"]["name"], json!("demo"));
    }

    #[test]
    fn test_load_yaml() {
        let dir = TempDir::new().unwrap();
        let path = write_fixture(&dir, "config.yaml", "app:\n  name: demo\n  port: 8080\n");
        let data = ConfigFileLoader::new().load(&path).unwrap();
        assert_eq!(data["app"]["name"], json!("demo"));
        assert_eq!(data["app"]["port"], json!(8080));
    }

    #[test]
    fn test_load_toml() {
        let dir = TempDir::new().unwrap();
        let path = write_fixture(&dir, "config.toml", "[app]\nname = \"demo\"\nport = 8080\n");
        let data = ConfigFileLoader::new().load(&path).unwrap();
        assert_eq!(data["app"]["name"], json!("demo"));
        assert_eq!(data["app"]["port"], json!(8080));
    }

    #[test]
    fn test_load_ini_values_stay_strings() {
        let dir = TempDir::new().unwrap();
        let contents = "# comment\ntop = 1\n\n[database]\nhost = localhost\nport = 5432\nssl: true\n; trailing comment\n";
        let path = write_fixture(&dir, "config.ini", contents);
        let data = ConfigFileLoader::new().load(&path).unwrap();
        assert_eq!(data["top"], json!("1"));
        assert_eq!(data["database"]["host"], json!("localhost"));
        assert_eq!(data["database"]["port"], json!("5432"));
        assert_eq!(data["database"]["ssl"], json!("true"));
    }

    #[test]
    fn test_load_env_file_is_flat_string_map() {
        let dir = TempDir::new().unwrap();
        let contents = "# comment\nAPP_NAME=\"demo app\"\nexport DEBUG=true\nPORT=8080\nEMPTY=\n";
        let path = write_fixture(&dir, "settings.env", contents);
        let data = ConfigFileLoader::new().load(&path).unwrap();
        assert_eq!(data["APP_NAME"], json!("demo app"));
        assert_eq!(data["DEBUG"], json!("true"));
        assert_eq!(data["PORT"], json!("8080"));
        assert_eq!(data["EMPTY"], json!(""));
    }

    #[test]
    fn test_load_missing_file() {
        let result = ConfigFileLoader::new().load(Path::new("/nonexistent/config.json"));
        assert!(matches!(result, Err(ConfigurationError::FileNotFound { .. })));
    }

    #[test]
    fn test_load_rejects_directory() {
        let dir = TempDir::new().unwrap();
        let result = ConfigFileLoader::new().load(dir.path());
        assert!(matches!(result, Err(ConfigurationError::Security { .. })));
    }

    #[test]
    fn test_load_invalid_json() {
        let dir = TempDir::new().unwrap();
        let path = write_fixture(&dir, "bad.json", "{not json");
        let result = ConfigFileLoader::new().load(&path);
        assert!(matches!(result, Err(ConfigurationError::Parse { .. })));
    }

    #[test]
    fn test_load_rejects_non_mapping() {
        let dir = TempDir::new().unwrap();
        let path = write_fixture(&dir, "list.json", "[1, 2, 3]");
        let result = ConfigFileLoader::new().load(&path);
        assert!(matches!(result, Err(ConfigurationError::NotAMapping { .. })));
    }

    #[test]
    fn test_empty_file_is_empty_mapping() {
        let dir = TempDir::new().unwrap();
        let path = write_fixture(&dir, "empty.yaml", "\n");
        let data = ConfigFileLoader::new().load(&path).unwrap();
        assert!(data.is_empty());
    }

    #[test]
    fn test_save_and_reload_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/dir/config.json");
        let Value::Object(data) = json!({"app": {"name": "demo", "debug": true}}) else {
            unreachable!()
        };

        let loader = ConfigFileLoader::new();
        loader.save(&path, &data).unwrap();
        assert_eq!(loader.load(&path).unwrap(), data);
    }

    #[test]
    fn test_save_rejects_ini() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.ini");
        let result = ConfigFileLoader::new().save(&path, &Map::new());
        assert!(matches!(
            result,
            Err(ConfigurationError::UnsupportedFormat { .. })
        ));
    }
}
