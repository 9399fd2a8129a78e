pub mod config_store;
pub mod cpal_source;
pub mod session_file;
pub mod whisper_engine;

pub use config_store::TomlConfigStore;
pub use cpal_source::CpalAudioSource;
pub use whisper_engine::WhisperEngine;
