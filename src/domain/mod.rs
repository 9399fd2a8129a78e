pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod transcription;

pub use audio::{AtomicRecorderState, AudioSourceConfig, RecorderState, StatusEvent};
pub use config::{AppConfig, CoordinatorSettings, EngineSettings, LoggingConfig};
pub use engine::{AtomicEngineState, EngineState};
pub use error::DomainError;
pub use transcription::{AudioBuffer, SampleBatch};
