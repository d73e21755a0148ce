use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::core::DEFAULT_CHANNEL_COUNT;
use crate::playback::{RegistryConfig, DEFAULT_INTERVAL_MS};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "SENSOR_REPLAY_CONFIG";

/// Server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub port: u16,
    /// Origin allowed by CORS for the dashboard frontend
    pub frontend_origin: String,
    /// Recorded sensor table (CSV, positional columns)
    pub dataset_path: PathBuf,
    /// Project catalog document (JSON)
    pub catalog_path: PathBuf,
    /// Number of channel columns after the timestamp
    pub channel_count: usize,
    pub default_interval_ms: u64,
    /// Load the dataset once and share it instead of re-reading per request
    pub cache_dataset: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            frontend_origin: "http://localhost:5173".to_string(),
            dataset_path: PathBuf::from("./public/Test_Sensor_Data.csv"),
            catalog_path: PathBuf::from("./public/projectData.json"),
            channel_count: DEFAULT_CHANNEL_COUNT,
            default_interval_ms: DEFAULT_INTERVAL_MS,
            cache_dataset: false,
        }
    }
}

impl AppConfig {
    /// Default location of the config file
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("sensor-replay").join("config.json"))
    }

    /// Defaults, then the config file if one exists, then environment overrides
    pub fn load() -> Result<Self> {
        let path = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .or_else(Self::config_path);

        let mut config = match path {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Read a JSON config file; missing keys keep their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Apply `PORT`, `FRONTEND_ORIGIN`, `DATASET_PATH` and `CATALOG_PATH`
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(port) = lookup("PORT") {
            self.port = port
                .trim()
                .parse()
                .with_context(|| format!("Invalid PORT '{}'", port))?;
        }
        if let Some(origin) = lookup("FRONTEND_ORIGIN") {
            self.frontend_origin = origin;
        }
        if let Some(path) = lookup("DATASET_PATH") {
            self.dataset_path = PathBuf::from(path);
        }
        if let Some(path) = lookup("CATALOG_PATH") {
            self.catalog_path = PathBuf::from(path);
        }
        Ok(())
    }

    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            channel_count: self.channel_count,
            default_interval_ms: self.default_interval_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "port": 8080, "channel_count": 24 }"#).unwrap();

        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.channel_count, 24);
        assert_eq!(config.default_interval_ms, 500);
        assert_eq!(config.frontend_origin, "http://localhost:5173");
        assert!(!config.cache_dataset);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ port: ").unwrap();

        let err = AppConfig::from_file(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse config"));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("PORT", "4100"),
            ("FRONTEND_ORIGIN", "https://dash.example"),
            ("DATASET_PATH", "/data/sensors.csv"),
        ]);

        let mut config = AppConfig::default();
        config
            .apply_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.port, 4100);
        assert_eq!(config.frontend_origin, "https://dash.example");
        assert_eq!(config.dataset_path, PathBuf::from("/data/sensors.csv"));
        assert_eq!(config.catalog_path, PathBuf::from("./public/projectData.json"));
    }

    #[test]
    fn test_bad_port_is_an_error() {
        let mut config = AppConfig::default();
        assert!(config
            .apply_env(|key| (key == "PORT").then(|| "http".to_string()))
            .is_err());
    }

    #[test]
    fn test_registry_config() {
        let config = AppConfig {
            channel_count: 5,
            default_interval_ms: 40,
            ..AppConfig::default()
        };
        let registry = config.registry_config();
        assert_eq!(registry.channel_count, 5);
        assert_eq!(registry.default_interval_ms, 40);
    }
}
