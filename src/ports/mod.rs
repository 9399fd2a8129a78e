pub mod audio;
pub mod config;
pub mod engine;
pub mod listener;

pub use audio::{AudioChunkStream, AudioSource};
pub use config::ConfigStore;
pub use engine::InferenceEngine;
pub use listener::{RecorderListener, TranscriptionListener};
