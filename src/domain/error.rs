use thiserror::Error;

/// Domain-level errors for the capture and transcription pipeline.
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Audio device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Audio input device is already held by another stream")]
    DeviceBusy,

    #[error("Audio device disconnected: {0}")]
    DeviceDisconnected(String),

    #[error("Already recording")]
    AlreadyRecording,

    #[error("Model artifact not found: {0}")]
    ModelNotFound(String),

    #[error("Failed to load model: {0}")]
    LoadError(String),

    #[error("Engine not initialized")]
    NotInitialized,

    #[error("A transcription is already in flight")]
    EngineBusy,

    #[error("Transcription failed: {0}")]
    TranscriptionFailed(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for DomainError {
    fn from(err: std::io::Error) -> Self {
        DomainError::Io(err.to_string())
    }
}

impl From<toml::de::Error> for DomainError {
    fn from(err: toml::de::Error) -> Self {
        DomainError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for DomainError {
    fn from(err: toml::ser::Error) -> Self {
        DomainError::Config(err.to_string())
    }
}
