// src/config/loader.rs
//! Layered configuration loading: defaults, then files, then environment

use crate::config::{constants::paths, SystemConfig};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration parse error: {0}")]
    Parse(String),

    #[error("Configuration validation errors: {}", .0.join("; "))]
    Validation(Vec<String>),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

/// Loads [`SystemConfig`] from layered sources and keeps the last good result
pub struct ConfigLoader {
    config_paths: Vec<PathBuf>,
    current_config: Arc<RwLock<SystemConfig>>,
}

impl ConfigLoader {
    /// Loader over the system-wide file, then the working directory file
    pub fn new() -> Self {
        Self::with_paths(Self::discover_config_paths())
    }

    /// Loader over custom paths; later paths override earlier ones
    pub fn with_paths(paths: Vec<PathBuf>) -> Self {
        Self {
            config_paths: paths,
            current_config: Arc::new(RwLock::new(SystemConfig::default())),
        }
    }

    pub fn config_paths(&self) -> &[PathBuf] {
        &self.config_paths
    }

    /// Load, merge and validate the configuration
    pub fn load_system_config(&mut self) -> Result<SystemConfig, ConfigError> {
        let config = self.load_and_merge_configs()?;
        *self.current_config.write() = config.clone();
        Ok(config)
    }

    /// Last successfully loaded configuration
    pub fn get_current_config(&self) -> SystemConfig {
        self.current_config.read().clone()
    }

    /// Re-read every source. The current configuration is kept on failure.
    pub fn reload(&mut self) -> Result<SystemConfig, ConfigError> {
        let config = self.load_and_merge_configs()?;
        *self.current_config.write() = config.clone();
        info!("configuration reloaded");
        Ok(config)
    }

    /// Check that a single file parses and validates on top of the defaults
    pub fn validate_config_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let mut merged = default_value()?;
        merge_toml_values(&mut merged, load_config_file(path)?);
        let config: SystemConfig = merged.try_into()?;
        config.validate().map_err(ConfigError::Validation)
    }

    /// Export current configuration to file
    pub fn export_config<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let config = self.get_current_config();
        let toml_content =
            toml::to_string_pretty(&config).map_err(|e| ConfigError::Parse(e.to_string()))?;

        std::fs::write(path, toml_content)?;
        Ok(())
    }

    fn load_and_merge_configs(&self) -> Result<SystemConfig, ConfigError> {
        let mut merged_config = default_value()?;

        for config_path in &self.config_paths {
            if !config_path.exists() {
                continue;
            }
            debug!(path = %config_path.display(), "merging configuration file");
            merge_toml_values(&mut merged_config, load_config_file(config_path)?);
        }

        apply_environment_overrides(&mut merged_config, std::env::vars());

        let config: SystemConfig = merged_config.try_into()?;
        config.validate().map_err(ConfigError::Validation)?;
        Ok(config)
    }

    fn discover_config_paths() -> Vec<PathBuf> {
        vec![
            PathBuf::from(paths::SYSTEM_CONFIG_FILE),
            PathBuf::from(paths::DEFAULT_CONFIG_FILE),
        ]
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn default_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(SystemConfig::default()).map_err(|e| ConfigError::Parse(e.to_string()))
}

fn load_config_file<P: AsRef<Path>>(path: P) -> Result<toml::Value, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

fn merge_toml_values(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, value) in overlay_table {
                if let Some(base_value) = base_table.get_mut(&key) {
                    merge_toml_values(base_value, value);
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

/// `MODULAR_BCI_SESSION__DAISY_MODULE=true` sets `session.daisy_module`.
fn apply_environment_overrides(
    config: &mut toml::Value,
    vars: impl IntoIterator<Item = (String, String)>,
) {
    for (key, value) in vars {
        let Some(rest) = key.strip_prefix(paths::ENV_PREFIX) else {
            continue;
        };
        let path: Vec<String> = rest.split("__").map(str::to_lowercase).collect();
        if path.len() < 2 || path.iter().any(String::is_empty) {
            continue;
        }

        debug!(variable = %key, "environment override");
        set_nested_value(config, &path, parse_env_value(&value));
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

fn set_nested_value(config: &mut toml::Value, path: &[String], value: toml::Value) {
    let Some((last, parents)) = path.split_last() else {
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
        table.insert(last.clone(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn loader_for(file: &NamedTempFile) -> ConfigLoader {
        ConfigLoader::with_paths(vec![file.path().to_path_buf()])
    }

    #[test]
    fn test_config_loader_creation() {
        let loader = ConfigLoader::new();
        assert_eq!(loader.config_paths().len(), 2);
    }

    #[test]
    #[serial]
    fn test_missing_files_yield_defaults() {
        let mut loader = ConfigLoader::with_paths(vec![PathBuf::from("/nonexistent/modular_bci.toml")]);
        let config = loader.load_system_config().unwrap();
        assert_eq!(config, SystemConfig::default());
    }

    #[test]
    #[serial]
    fn test_file_overrides_defaults() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[session]
daisy_module = true
read_board_reply_timeout_ms = 2000

[serial]
port_name = "/dev/ttyUSB3"
"#
        )
        .unwrap();

        let mut loader = loader_for(&temp_file);
        let config = loader.load_system_config().unwrap();

        assert!(config.session.daisy_module);
        assert_eq!(config.session.read_board_reply_timeout_ms, 2000);
        assert_eq!(config.session.flush_board_reply_timeout_ms, 500);
        assert_eq!(config.serial.port_name.as_deref(), Some("/dev/ttyUSB3"));
        assert_eq!(loader.get_current_config(), config);
    }

    #[test]
    fn test_config_file_validation() {
        let loader = ConfigLoader::new();

        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[chip]
data_rate = 6
"#
        )
        .unwrap();

        assert!(loader.validate_config_file(temp_file.path()).is_ok());
    }

    #[test]
    fn test_invalid_config_validation() {
        let loader = ConfigLoader::new();

        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[session]
poll_timeout_ms = 0
"#
        )
        .unwrap();

        let err = loader.validate_config_file(temp_file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref errors) if errors.len() == 1));
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let loader = ConfigLoader::new();
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "[session\ndaisy_module = ").unwrap();

        assert!(matches!(
            loader.validate_config_file(temp_file.path()),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    #[serial]
    fn test_reload_keeps_previous_config_on_failure() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "[session]\ndaisy_module = true").unwrap();

        let mut loader = loader_for(&temp_file);
        loader.load_system_config().unwrap();

        std::fs::write(temp_file.path(), "[session]\npoll_timeout_ms = 0\n").unwrap();
        assert!(loader.reload().is_err());
        assert!(loader.get_current_config().session.daisy_module);
    }

    #[test]
    fn test_environment_override_mapping() {
        let mut value = default_value().unwrap();
        apply_environment_overrides(
            &mut value,
            vec![
                ("MODULAR_BCI_SESSION__DAISY_MODULE".to_string(), "true".to_string()),
                ("MODULAR_BCI_SERIAL__BAUD_RATE".to_string(), "230400".to_string()),
                ("MODULAR_BCI_IGNORED".to_string(), "1".to_string()),
                ("OTHER_SESSION__DAISY_MODULE".to_string(), "false".to_string()),
            ],
        );

        let config: SystemConfig = value.try_into().unwrap();
        assert!(config.session.daisy_module);
        assert_eq!(config.serial.baud_rate, 230_400);
    }

    #[test]
    #[serial]
    fn test_environment_override() {
        std::env::set_var("MODULAR_BCI_SESSION__DROPPED_SAMPLE_COUNT_BEFORE_RESET", "9");

        let mut loader = ConfigLoader::with_paths(Vec::new());
        let config = loader.load_system_config();

        std::env::remove_var("MODULAR_BCI_SESSION__DROPPED_SAMPLE_COUNT_BEFORE_RESET");
        assert_eq!(config.unwrap().session.dropped_sample_count_before_reset, 9);
    }

    #[test]
    fn test_config_export() {
        let loader = ConfigLoader::with_paths(Vec::new());
        let temp_file = NamedTempFile::new().unwrap();

        assert!(loader.export_config(temp_file.path()).is_ok());

        let content = std::fs::read_to_string(temp_file.path()).unwrap();
        assert!(content.contains("[session]"));
        assert!(content.contains("[chip]"));
    }
}
