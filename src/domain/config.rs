use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::domain::audio::AudioSourceConfig;

/// Engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Path to the model weights blob.
    pub model_path: PathBuf,
    /// Path to the vocabulary blob.
    pub vocab_path: PathBuf,
    /// Whether the model is multilingual. Monolingual models are pinned
    /// to English.
    pub multilingual: bool,
    /// Language code (ISO 639-1) to decode in, or None for auto-detection.
    /// Ignored when `multilingual` is false.
    pub language: Option<String>,
    /// Number of inference threads (0 = auto).
    pub threads: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/ggml-small.bin"),
            vocab_path: PathBuf::from("models/vocab-multilingual.bin"),
            multilingual: true,
            language: None,
            threads: 0,
        }
    }
}

/// Streaming-submission configuration for the coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorSettings {
    /// Working-buffer size, in milliseconds of audio, that triggers a
    /// streaming submission.
    pub submit_threshold_ms: u64,
    /// Submit whatever has accumulated once this much time has passed since
    /// the last submission, even below the threshold. 0 disables the timer.
    pub max_interval_ms: u64,
    /// Working-buffer retention window in seconds. Oldest samples are
    /// evicted beyond this when inference falls behind.
    pub max_buffer_secs: u32,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            submit_threshold_ms: 3_000,
            max_interval_ms: 0,
            max_buffer_secs: 60,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Enable file logging with rotation.
    pub file_logging: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_logging: true,
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub audio: AudioSourceConfig,
    pub engine: EngineSettings,
    pub coordinator: CoordinatorSettings,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Create a new AppConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::new();
        assert_eq!(config.audio.sample_rate, 16_000);
        assert_eq!(config.coordinator.submit_threshold_ms, 3_000);
        assert_eq!(config.coordinator.max_buffer_secs, 60);
        assert!(config.engine.multilingual);
    }

    #[test]
    fn test_partial_toml_falls_back_to_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [coordinator]
            submit_threshold_ms = 1500
            "#,
        )
        .unwrap();
        assert_eq!(config.coordinator.submit_threshold_ms, 1500);
        assert_eq!(config.audio.sample_rate, 16_000);
        assert_eq!(config.logging.level, "info");
    }
}
