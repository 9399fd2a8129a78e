use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;

use crate::adapters::{CpalAudioSource, TomlConfigStore, WhisperEngine};
use crate::app::{CoordinatorConfig, Recorder, TranscriptionCoordinator};
use crate::domain::{AppConfig, DomainError, EngineState};
use crate::infrastructure::init_logging;
use crate::ports::{ConfigStore, InferenceEngine, RecorderListener, TranscriptionListener};

/// Application controller that orchestrates initialization and owns the
/// long-lived pieces of the pipeline: configuration, logging, and the
/// inference engine.
///
/// Recorders and coordinators are built per embedding surface, since each
/// needs its own listener; they share the controller's single engine.
pub struct PipelineController {
    config: RwLock<AppConfig>,
    config_store: Arc<TomlConfigStore>,
    engine: Arc<WhisperEngine>,
    _log_guard: Option<WorkerGuard>,
}

impl PipelineController {
    /// Initialize the controller.
    /// This sets up configuration, logging, and the inference engine
    /// (unloaded; call `load_model` before transcribing).
    pub fn new() -> Result<Self, DomainError> {
        let config_store = Arc::new(TomlConfigStore::new()?);
        Self::with_config_store(config_store)
    }

    /// Initialize from an explicit config store (tests, embedders).
    pub fn with_config_store(config_store: Arc<TomlConfigStore>) -> Result<Self, DomainError> {
        let config = config_store.load()?;

        let log_guard = init_logging(
            &config_store.logs_dir(),
            &config.logging.level,
            config.logging.file_logging,
        )?;

        info!("Sussurro starting up");

        let engine = Arc::new(WhisperEngine::new(
            config.engine.threads,
            config.engine.language.clone(),
        ));

        Ok(Self {
            config: RwLock::new(config),
            config_store,
            engine,
            _log_guard: log_guard,
        })
    }

    /// Load the configured model into the engine.
    pub fn load_model(&self) -> Result<(), DomainError> {
        let engine_settings = self.config.read().engine.clone();
        self.engine.load(
            &engine_settings.model_path,
            &engine_settings.vocab_path,
            engine_settings.multilingual,
        )
    }

    /// Unload the model, releasing its memory.
    pub fn unload_model(&self) -> Result<(), DomainError> {
        self.engine.unload()
    }

    pub fn engine_state(&self) -> EngineState {
        self.engine.state()
    }

    pub fn engine(&self) -> Arc<dyn InferenceEngine> {
        self.engine.clone()
    }

    /// Build a recorder capturing from the default microphone.
    pub fn build_recorder(&self, listener: Arc<dyn RecorderListener>) -> Recorder {
        let audio = self.config.read().audio.clone();
        Recorder::new(Arc::new(CpalAudioSource::new()), listener, audio)
    }

    /// Build a coordinator backed by the controller's engine.
    pub fn build_coordinator(
        &self,
        listener: Arc<dyn TranscriptionListener>,
    ) -> TranscriptionCoordinator {
        let config = self.config.read();
        let coordinator_config =
            CoordinatorConfig::from_settings(&config.coordinator, config.audio.sample_rate);
        TranscriptionCoordinator::new(self.engine.clone(), listener, coordinator_config)
    }

    /// Get the current configuration.
    pub fn config(&self) -> AppConfig {
        self.config.read().clone()
    }

    /// Update the configuration.
    ///
    /// Engine and audio settings take effect on the next `load_model` /
    /// recorder build; logging changes need a restart.
    pub fn update_config(&self, config: AppConfig) -> Result<(), DomainError> {
        self.config_store.save(&config)?;
        *self.config.write() = config;
        info!("Configuration updated");
        Ok(())
    }

    /// Get the data directory path.
    pub fn data_dir(&self) -> String {
        self.config_store.data_dir().to_string_lossy().to_string()
    }

    /// Get the logs directory path.
    pub fn logs_dir(&self) -> String {
        self.config_store.logs_dir().to_string_lossy().to_string()
    }

    /// Get the config file path.
    pub fn config_path(&self) -> String {
        self.config_store.config_path().to_string_lossy().to_string()
    }
}
