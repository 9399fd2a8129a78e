use std::fs;
use std::path::PathBuf;

use tracing::{debug, info};

use crate::domain::{AppConfig, DomainError};
use crate::ports::ConfigStore;

/// TOML-based configuration store with OS-specific paths.
pub struct TomlConfigStore {
    data_dir: PathBuf,
}

impl TomlConfigStore {
    /// Create a new TomlConfigStore.
    /// Uses OS-specific application data directories.
    pub fn new() -> Result<Self, DomainError> {
        let data_dir = Self::get_data_dir()?;

        // Ensure the data directory exists
        fs::create_dir_all(&data_dir)?;

        info!(data_dir = ?data_dir, "ConfigStore initialized");

        Ok(Self { data_dir })
    }

    /// Create a store rooted at an explicit directory (tests, embedders).
    pub fn with_data_dir(data_dir: PathBuf) -> Result<Self, DomainError> {
        fs::create_dir_all(&data_dir)?;
        Ok(Self { data_dir })
    }

    /// Get the OS-specific application data directory.
    /// - macOS: ~/Library/Application Support/Sussurro/
    /// - Windows: %APPDATA%\Sussurro\
    /// - Linux: ~/.config/Sussurro/
    fn get_data_dir() -> Result<PathBuf, DomainError> {
        #[cfg(target_os = "macos")]
        {
            dirs::data_dir()
                .map(|p| p.join("Sussurro"))
                .ok_or_else(|| {
                    DomainError::Config("Could not find application data directory".to_string())
                })
        }

        #[cfg(not(target_os = "macos"))]
        {
            dirs::config_dir()
                .map(|p| p.join("Sussurro"))
                .ok_or_else(|| {
                    DomainError::Config("Could not find application data directory".to_string())
                })
        }
    }

    /// Get the OS-specific log directory.
    fn get_logs_dir(&self) -> PathBuf {
        #[cfg(target_os = "linux")]
        {
            dirs::data_dir()
                .map(|p| p.join("Sussurro").join("logs"))
                .unwrap_or_else(|| self.data_dir.join("logs"))
        }

        #[cfg(not(target_os = "linux"))]
        {
            self.data_dir.join("logs")
        }
    }
}

impl ConfigStore for TomlConfigStore {
    fn load(&self) -> Result<AppConfig, DomainError> {
        let config_path = self.config_path();

        if config_path.exists() {
            debug!(path = ?config_path, "Loading configuration");
            let content = fs::read_to_string(&config_path)?;
            let config: AppConfig = toml::from_str(&content)?;
            info!(path = ?config_path, "Configuration loaded");
            Ok(config)
        } else {
            info!(path = ?config_path, "Configuration file not found, creating default");
            let config = AppConfig::new();
            self.save(&config)?;
            Ok(config)
        }
    }

    fn save(&self, config: &AppConfig) -> Result<(), DomainError> {
        let config_path = self.config_path();

        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(config)?;
        fs::write(&config_path, content)?;

        info!(path = ?config_path, "Configuration saved");
        Ok(())
    }

    fn config_path(&self) -> PathBuf {
        self.data_dir.join("config.toml")
    }

    fn data_dir(&self) -> PathBuf {
        self.data_dir.clone()
    }

    fn logs_dir(&self) -> PathBuf {
        self.get_logs_dir()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_config_store_paths() {
        let temp_dir = env::temp_dir().join("sussurro_paths_test");
        let store = TomlConfigStore::with_data_dir(temp_dir.clone()).unwrap();

        assert!(store.config_path().ends_with("config.toml"));
        assert!(store.logs_dir().to_string_lossy().contains("logs"));

        let _ = fs::remove_dir_all(&temp_dir);
    }

    #[test]
    fn test_config_roundtrip() {
        // Use a temporary directory for testing
        let temp_dir = env::temp_dir().join("sussurro_config_test");
        let _ = fs::remove_dir_all(&temp_dir);

        let store = TomlConfigStore::with_data_dir(temp_dir.clone()).unwrap();

        // Create and save a config
        let mut config = AppConfig::new();
        config.coordinator.submit_threshold_ms = 1_234;
        config.logging.level = "debug".to_string();

        store.save(&config).unwrap();

        // Load it back
        let loaded = store.load().unwrap();
        assert_eq!(loaded.coordinator.submit_threshold_ms, 1_234);
        assert_eq!(loaded.logging.level, "debug");

        // Cleanup
        let _ = fs::remove_dir_all(&temp_dir);
    }

    #[test]
    fn test_load_creates_default_when_missing() {
        let temp_dir = env::temp_dir().join("sussurro_default_config_test");
        let _ = fs::remove_dir_all(&temp_dir);

        let store = TomlConfigStore::with_data_dir(temp_dir.clone()).unwrap();
        let config = store.load().unwrap();
        assert_eq!(config.audio.sample_rate, 16_000);
        assert!(store.config_path().exists());

        let _ = fs::remove_dir_all(&temp_dir);
    }
}
