//! # EPGrid Configuration Module
//!
//! Configuration management for EPGrid:
//! - Loading configuration from a YAML file
//! - Merging with the embedded default configuration
//! - Environment variable overrides
//! - Type-safe getters and setters for configuration values
//!
//! The configuration is an explicitly constructed value: the
//! application loads it once at startup and passes it (by reference or
//! `Arc`) to whatever needs it. There is deliberately no process-wide
//! singleton.
//!
//! ## Usage
//!
//! ```no_run
//! use epgconfig::Config;
//!
//! let config = Config::load("")?;
//! let data_dir = config.get_data_dir()?;
//! let lifespan = config.get_lifespan_days();
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{anyhow, Result};
use dirs::home_dir;
use serde_yaml::{Mapping, Value};
use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::Mutex,
};
use tracing::info;

// Embedded default configuration
const DEFAULT_CONFIG: &str = include_str!("epgrid.yaml");

const ENV_CONFIG_DIR: &str = "EPGRID_CONFIG";
const ENV_PREFIX: &str = "EPGRID_CONFIG__";

const DEFAULT_LIFESPAN_DAYS: i32 = 14;
const DEFAULT_AUTODOWNLOAD_DAYS: u32 = 7;
const DEFAULT_ONLINE_AT_STARTUP: bool = false;

/// Configuration manager for EPGrid
///
/// Loads `epgrid.yaml` from the configuration directory, merged over
/// the embedded defaults, with `EPGRID_CONFIG__section__key`
/// environment overrides applied last.
#[derive(Debug)]
pub struct Config {
    config_dir: String,
    path: String,
    data: Mutex<Value>,
}

impl Clone for Config {
    fn clone(&self) -> Self {
        let data = self.data.lock().unwrap().clone();
        Self {
            config_dir: self.config_dir.clone(),
            path: self.path.clone(),
            data: Mutex::new(data),
        }
    }
}

impl Config {
    /// Finds a config directory by trying different locations in order
    fn find_config_dir(directory: &str) -> String {
        // 1. Try provided directory
        if !directory.is_empty() {
            return directory.to_string();
        }

        // 2. Try environment variable
        if let Ok(env_path) = env::var(ENV_CONFIG_DIR) {
            info!(env_var = ENV_CONFIG_DIR, path = %env_path, "Trying to load config from env");
            return env_path;
        }

        // 3. Try current directory
        if Path::new(".epgrid").exists() {
            return ".epgrid".to_string();
        }

        // 4. Try home directory
        if let Some(home) = home_dir() {
            let home_config = home.join(".epgrid");
            if home_config.exists() {
                return home_config.to_string_lossy().to_string();
            }
        }

        // Default fallback
        ".epgrid".to_string()
    }

    /// Validates and prepares a config directory
    fn validate_config_dir(path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path)?;
        }

        if !path.is_dir() {
            return Err(anyhow!("configuration path is not a directory"));
        }

        // Test write permission
        let test_file = path.join(".write_test");
        fs::write(&test_file, b"test")?;
        fs::remove_file(&test_file)?;

        Ok(())
    }

    /// Loads the configuration from the specified directory.
    ///
    /// The directory is searched in the following order: the provided
    /// `directory` if not empty, the `EPGRID_CONFIG` environment
    /// variable, `.epgrid` in the current directory, `.epgrid` in the
    /// user's home directory. A missing `epgrid.yaml` is not an error:
    /// the embedded defaults are used and written back.
    pub fn load(directory: &str) -> Result<Self> {
        let config_dir = Self::find_config_dir(directory);
        Self::validate_config_dir(Path::new(&config_dir))?;
        info!(config_dir = %config_dir, "Using config directory");

        let config_file_path = Path::new(&config_dir).join("epgrid.yaml");
        let path = config_file_path.to_string_lossy().to_string();

        // Load the embedded defaults, then merge the external file over them
        let mut config_value: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;
        match fs::read(&path) {
            Ok(data) => {
                info!(config_file = %path, "Loaded config file");
                let external: Value = serde_yaml::from_slice(&data)?;
                merge_yaml(&mut config_value, &external);
            }
            Err(_) => {
                info!(config_file = %path, "Config file not found, using default embedded config");
            }
        }

        Self::apply_env_overrides(&mut config_value);

        let config = Config {
            config_dir,
            path,
            data: Mutex::new(config_value),
        };

        config.save()?;
        Ok(config)
    }

    /// Directory the configuration was loaded from.
    pub fn config_dir(&self) -> &str {
        &self.config_dir
    }

    /// Saves the current configuration back to its file
    pub fn save(&self) -> Result<()> {
        let data = self.data.lock().unwrap();
        let yaml = serde_yaml::to_string(&*data)?;
        fs::write(&self.path, yaml)?;
        Ok(())
    }

    /// Sets a configuration value at the specified path and saves it
    pub fn set_value(&self, path: &[&str], value: Value) -> Result<()> {
        let mut data = self.data.lock().unwrap();
        Self::set_value_internal(&mut data, path, value)?;
        drop(data);
        self.save()?;
        Ok(())
    }

    fn set_value_internal(data: &mut Value, path: &[&str], value: Value) -> Result<()> {
        if path.is_empty() {
            *data = value;
            return Ok(());
        }
        if let Value::Mapping(map) = data {
            let key_value = Value::String(path[0].to_string());
            if path.len() == 1 {
                map.insert(key_value, value);
            } else {
                let entry = map
                    .entry(key_value)
                    .or_insert(Value::Mapping(Mapping::new()));
                Self::set_value_internal(entry, &path[1..], value)?;
            }
            Ok(())
        } else {
            Err(anyhow!("current node is not a map"))
        }
    }

    /// Gets a configuration value at the specified path
    pub fn get_value(&self, path: &[&str]) -> Result<Value> {
        let data = self.data.lock().unwrap();
        let mut current = &*data;
        for (i, key) in path.iter().enumerate() {
            if let Value::Mapping(map) = current {
                if let Some(next) = map.get(&Value::String(key.to_string())) {
                    current = next;
                } else {
                    return Err(anyhow!("path {} does not exist", path[..=i].join(".")));
                }
            } else {
                return Err(anyhow!("path {} is not a mapping", path[..i].join(".")));
            }
        }
        Ok(current.clone())
    }

    fn apply_env_overrides(config: &mut Value) {
        for (key, value) in env::vars() {
            if key.starts_with(ENV_PREFIX) {
                let key_path = key
                    .trim_start_matches(ENV_PREFIX)
                    .split("__")
                    .collect::<Vec<_>>();
                let yaml_value = Self::convert_env_value(&value);
                let _ = Self::set_value_internal(config, &key_path, yaml_value);
            }
        }
    }

    fn convert_env_value(value: &str) -> Value {
        if let Ok(parsed) = serde_yaml::from_str::<Value>(value) {
            return parsed;
        }
        Value::String(value.to_string())
    }

    /// Resolves a possibly-relative directory against the config
    /// directory and creates it if necessary.
    fn resolve_and_create_dir(&self, dir_path: &str) -> Result<PathBuf> {
        let path = Path::new(dir_path);
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            Path::new(&self.config_dir).join(path)
        };
        fs::create_dir_all(&absolute)?;
        Ok(absolute)
    }

    // ============= Typed getters / setters =============

    /// Directory of the channel-day file store (created if missing).
    pub fn get_data_dir(&self) -> Result<PathBuf> {
        match self.get_value(&["data", "dir"])? {
            Value::String(dir) => self.resolve_and_create_dir(&dir),
            _ => self.resolve_and_create_dir("tvdata"),
        }
    }

    /// Directory of the per-source `.service` settings files.
    pub fn get_source_settings_dir(&self) -> Result<PathBuf> {
        match self.get_value(&["sources", "settings_dir"])? {
            Value::String(dir) => self.resolve_and_create_dir(&dir),
            _ => self.resolve_and_create_dir("sources"),
        }
    }

    /// Retention lifespan in days; negative means manual retention only.
    pub fn get_lifespan_days(&self) -> i32 {
        match self.get_value(&["data", "lifespan_days"]) {
            Ok(Value::Number(n)) if n.is_i64() => n.as_i64().unwrap() as i32,
            _ => DEFAULT_LIFESPAN_DAYS,
        }
    }

    pub fn set_lifespan_days(&self, days: i32) -> Result<()> {
        self.set_value(&["data", "lifespan_days"], Value::from(days))
    }

    /// Day span for the default batch download.
    pub fn get_autodownload_days(&self) -> u32 {
        match self.get_value(&["download", "autodownload_days"]) {
            Ok(Value::Number(n)) if n.is_u64() => n.as_u64().unwrap() as u32,
            _ => DEFAULT_AUTODOWNLOAD_DAYS,
        }
    }

    pub fn set_autodownload_days(&self, days: u32) -> Result<()> {
        self.set_value(&["download", "autodownload_days"], Value::from(days))
    }

    pub fn get_online_at_startup(&self) -> bool {
        match self.get_value(&["download", "online_at_startup"]) {
            Ok(Value::Bool(b)) => b,
            _ => DEFAULT_ONLINE_AT_STARTUP,
        }
    }

    pub fn set_online_at_startup(&self, online: bool) -> Result<()> {
        self.set_value(&["download", "online_at_startup"], Value::Bool(online))
    }
}

/// Merges `other` over `base`, mapping by mapping; scalars and
/// sequences in `other` win.
fn merge_yaml(base: &mut Value, other: &Value) {
    match (base, other) {
        (Value::Mapping(base_map), Value::Mapping(other_map)) => {
            for (key, value) in other_map {
                match base_map.get_mut(key) {
                    Some(existing) => merge_yaml(existing, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, other) => *base = other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(dir: &Path) -> Config {
        Config::load(dir.to_str().unwrap()).unwrap()
    }

    #[test]
    fn test_defaults_when_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        assert_eq!(config.get_lifespan_days(), 14);
        assert_eq!(config.get_autodownload_days(), 7);
        assert!(!config.get_online_at_startup());
    }

    #[test]
    fn test_save_and_reload_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        {
            let config = config_in(dir.path());
            config.set_lifespan_days(30).unwrap();
            config.set_online_at_startup(true).unwrap();
        }
        let reloaded = config_in(dir.path());
        assert_eq!(reloaded.get_lifespan_days(), 30);
        assert!(reloaded.get_online_at_startup());
    }

    #[test]
    fn test_user_file_merged_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("epgrid.yaml"),
            "data:\n  lifespan_days: -1\n",
        )
        .unwrap();
        let config = config_in(dir.path());
        // Overridden key
        assert_eq!(config.get_lifespan_days(), -1);
        // Untouched sibling keeps its default
        assert_eq!(config.get_autodownload_days(), 7);
    }

    #[test]
    fn test_data_dir_is_created_relative_to_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let data_dir = config.get_data_dir().unwrap();
        assert!(data_dir.starts_with(dir.path()));
        assert!(data_dir.is_dir());
    }
}
