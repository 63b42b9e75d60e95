// src/config/loader.rs
//! Layered configuration loader: defaults, then config files, then environment

use crate::config::{constants::paths, SystemConfig};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use thiserror::Error;
use tracing::debug;

/// Configuration loader
pub struct ConfigLoader {
    config_paths: Vec<PathBuf>,
    current_config: Arc<RwLock<SystemConfig>>,
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file not found: {0}")]
    FileNotFound(String),
    #[error("configuration parse error: {0}")]
    ParseError(String),
    #[error("configuration validation errors:\n  {}", .0.join("\n  "))]
    ValidationError(Vec<String>),
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

impl ConfigLoader {
    /// Loader over the standard search path
    pub fn new() -> Self {
        Self::with_paths(Self::discover_config_paths())
    }

    /// Create loader with custom paths, later paths taking precedence
    pub fn with_paths(paths: Vec<PathBuf>) -> Self {
        Self {
            config_paths: paths,
            current_config: Arc::new(RwLock::new(SystemConfig::default())),
        }
    }

    /// Standard search path followed by an explicit file, if any
    pub fn with_override(path: Option<PathBuf>) -> Self {
        let mut paths = Self::discover_config_paths();
        paths.extend(path);
        Self::with_paths(paths)
    }

    pub fn config_paths(&self) -> &[PathBuf] {
        &self.config_paths
    }

    /// Load system configuration with validation
    pub fn load_system_config(&mut self) -> Result<SystemConfig, ConfigError> {
        let config = self.load_and_merge_configs()?;
        *self.current_config.write() = config.clone();
        Ok(config)
    }

    /// Get current configuration
    pub fn get_current_config(&self) -> SystemConfig {
        self.current_config.read().clone()
    }

    /// Reload configuration manually
    pub fn reload(&mut self) -> Result<SystemConfig, ConfigError> {
        self.load_system_config()
    }

    /// Validate a single file on top of the defaults without loading it
    pub fn validate_config_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let mut merged = Self::default_value()?;
        Self::merge_toml_values(&mut merged, Self::load_config_file(path)?);
        Self::into_config(merged).map(|_| ())
    }

    /// Export current configuration to file
    pub fn export_config<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let config = self.get_current_config();
        let toml_content =
            toml::to_string_pretty(&config).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Get configuration file modification times
    pub fn get_config_timestamps(&self) -> Vec<(PathBuf, Option<SystemTime>)> {
        self.config_paths
            .iter()
            .map(|path| {
                let timestamp = std::fs::metadata(path)
                    .and_then(|meta| meta.modified())
                    .ok();
                (path.clone(), timestamp)
            })
            .collect()
    }

    fn load_and_merge_configs(&self) -> Result<SystemConfig, ConfigError> {
        let mut merged_config = Self::default_value()?;

        for config_path in &self.config_paths {
            match Self::load_config_file(config_path) {
                Ok(file_config) => {
                    debug!(path = %config_path.display(), "merging config file");
                    Self::merge_toml_values(&mut merged_config, file_config);
                }
                // Missing files on the search path are optional
                Err(ConfigError::FileNotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }

        Self::apply_environment_overrides(&mut merged_config, std::env::vars());
        Self::into_config(merged_config)
    }

    fn default_value() -> Result<toml::Value, ConfigError> {
        toml::Value::try_from(SystemConfig::default()).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    fn into_config(value: toml::Value) -> Result<SystemConfig, ConfigError> {
        let config: SystemConfig = value.try_into().map_err(|e: toml::de::Error| {
            ConfigError::ParseError(format!("failed to deserialize config: {}", e))
        })?;
        config.validate_consistency().map_err(ConfigError::ValidationError)?;
        Ok(config)
    }

    fn load_config_file<P: AsRef<Path>>(path: P) -> Result<toml::Value, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let content = std::fs::read_to_string(path)?;
        let config: toml::Value = toml::from_str(&content)?;

        Ok(config)
    }

    fn merge_toml_values(base: &mut toml::Value, overlay: toml::Value) {
        match (base, overlay) {
            (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
                for (key, value) in overlay_table {
                    if let Some(base_value) = base_table.get_mut(&key) {
                        Self::merge_toml_values(base_value, value);
                    } else {
                        base_table.insert(key, value);
                    }
                }
            }
            (base_value, overlay_value) => {
                *base_value = overlay_value;
            }
        }
    }

    /// `GRIP__EXPERIMENT__BREAK_DURATION_SECS=60` sets `experiment.break_duration_secs`
    fn apply_environment_overrides<I>(config: &mut toml::Value, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            let Some(path) = key.strip_prefix(paths::ENV_PREFIX) else {
                continue;
            };
            let parts: Vec<String> = path
                .split(paths::ENV_SEPARATOR)
                .filter(|p| !p.is_empty())
                .map(str::to_lowercase)
                .collect();
            if parts.is_empty() {
                continue;
            }
            debug!(key = %key, "applying environment override");
            Self::set_nested_value(config, &parts, Self::parse_env_value(&value));
        }
    }

    fn parse_env_value(value: &str) -> toml::Value {
        if let Ok(int_val) = value.parse::<i64>() {
            toml::Value::Integer(int_val)
        } else if let Ok(float_val) = value.parse::<f64>() {
            toml::Value::Float(float_val)
        } else if let Ok(bool_val) = value.parse::<bool>() {
            toml::Value::Boolean(bool_val)
        } else {
            toml::Value::String(value.to_string())
        }
    }

    fn set_nested_value(config: &mut toml::Value, parts: &[String], value: toml::Value) {
        let Some((last, parents)) = parts.split_last() else {
            return;
        };
        let mut current = config;
        for part in parents {
            let toml::Value::Table(table) = current else {
                return;
            };
            current = table
                .entry(part.clone())
                .or_insert_with(|| toml::Value::Table(toml::value::Table::new()));
        }
        if let toml::Value::Table(table) = current {
            // integer overrides of float fields would otherwise fail to deserialize
            let value = match (table.get(last), value) {
                (Some(toml::Value::Float(_)), toml::Value::Integer(i)) => toml::Value::Float(i as f64),
                (_, v) => v,
            };
            table.insert(last.clone(), value);
        }
    }

    fn discover_config_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        paths.push(PathBuf::from(paths::SYSTEM_CONFIG_PATH));

        if let Some(home_dir) = dirs::home_dir() {
            paths.push(home_dir.join(paths::USER_CONFIG_DIR).join("config.toml"));
        }

        // Local configurations (in order of precedence)
        paths.push(PathBuf::from(paths::DEFAULT_CONFIG_FILE));
        paths.push(PathBuf::from(paths::LOCAL_CONFIG_FILE));

        paths
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

// Cross-platform directory discovery
mod dirs {
    use std::path::PathBuf;

    pub fn home_dir() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            std::env::var_os("USERPROFILE").map(PathBuf::from)
        }
        #[cfg(not(target_os = "windows"))]
        {
            std::env::var_os("HOME").map(PathBuf::from)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    fn write_config(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_config_loader_creation() {
        let loader = ConfigLoader::new();
        assert!(!loader.config_paths().is_empty());
        let loader = ConfigLoader::with_override(Some(PathBuf::from("x.toml")));
        assert_eq!(loader.config_paths().last(), Some(&PathBuf::from("x.toml")));
    }

    #[test]
    #[serial]
    fn test_missing_files_yield_defaults() {
        let dir = TempDir::new().unwrap();
        let mut loader = ConfigLoader::with_paths(vec![dir.path().join("absent.toml")]);
        let config = loader.load_system_config().unwrap();
        assert_eq!(config, SystemConfig::default());
    }

    #[test]
    #[serial]
    fn test_later_files_take_precedence() {
        let dir = TempDir::new().unwrap();
        let base = write_config(
            &dir,
            "default.toml",
            "[experiment]\nrepeats_per_condition = 3\nbreak_duration_secs = 120.0\n",
        );
        let local = write_config(&dir, "local.toml", "[experiment]\nbreak_duration_secs = 10.0\n");

        let mut loader = ConfigLoader::with_paths(vec![base, local]);
        let config = loader.load_system_config().unwrap();
        assert_eq!(config.experiment.repeats_per_condition, 3);
        assert_eq!(config.experiment.break_duration_secs, 10.0);
        assert_eq!(loader.get_current_config(), config);
    }

    #[test]
    fn test_config_file_validation() {
        let loader = ConfigLoader::with_paths(Vec::new());

        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[sensor]
sample_interval_ms = 10
channels = [1, 2, 3, 4]

[scoring]
placeholder_mvc_newtons = 150.0
        "#
        )
        .unwrap();

        assert!(loader.validate_config_file(temp_file.path()).is_ok());
    }

    #[test]
    fn test_invalid_config_validation() {
        let loader = ConfigLoader::with_paths(Vec::new());

        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[sensor]
sample_interval_ms = 0  # Too fast
        "#
        )
        .unwrap();

        let err = loader.validate_config_file(temp_file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(ref e) if e.len() == 1));
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "bad.toml", "[experiment\nrepeats = ");
        let loader = ConfigLoader::with_paths(Vec::new());
        assert!(matches!(loader.validate_config_file(&path), Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_environment_override_parsing() {
        let mut value = ConfigLoader::default_value().unwrap();
        ConfigLoader::apply_environment_overrides(
            &mut value,
            vec![
                ("GRIP__EXPERIMENT__BREAK_DURATION_SECS".to_string(), "60".to_string()),
                ("GRIP__SENSOR__DEVICE_NAME".to_string(), "GDX-HD 0001".to_string()),
                ("GRIP__LOGGING__JSON".to_string(), "true".to_string()),
                ("OTHER__EXPERIMENT__SEED".to_string(), "1".to_string()),
            ],
        );
        let config = ConfigLoader::into_config(value).unwrap();
        assert_eq!(config.experiment.break_duration_secs, 60.0);
        assert_eq!(config.sensor.device_name.as_deref(), Some("GDX-HD 0001"));
        assert!(config.logging.json);
        assert_eq!(config.experiment.seed, None);
    }

    #[test]
    #[serial]
    fn test_environment_override() {
        unsafe {
            std::env::set_var("GRIP__EXPERIMENT__REPEATS_PER_CONDITION", "2");
        }

        let mut loader = ConfigLoader::with_paths(Vec::new());
        let config = loader.load_system_config();

        unsafe {
            std::env::remove_var("GRIP__EXPERIMENT__REPEATS_PER_CONDITION");
        }

        assert_eq!(config.unwrap().experiment.repeats_per_condition, 2);
    }

    #[test]
    #[serial]
    fn test_config_export() {
        let mut loader = ConfigLoader::with_paths(Vec::new());
        loader.load_system_config().unwrap();
        let temp_file = NamedTempFile::new().unwrap();

        assert!(loader.export_config(temp_file.path()).is_ok());

        let content = std::fs::read_to_string(temp_file.path()).unwrap();
        assert!(content.contains("[experiment]"));
        assert!(loader.validate_config_file(temp_file.path()).is_ok());
    }
}
