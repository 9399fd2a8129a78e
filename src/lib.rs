#![forbid(unsafe_code)]

//! Sussurro: on-device audio capture and speech recognition pipeline.
//!
//! Capture runs on a dedicated thread, pulling fixed-size sample batches
//! from an [`ports::AudioSource`]; the [`app::TranscriptionCoordinator`]
//! accumulates them and feeds a single-flight [`ports::InferenceEngine`]
//! on its own worker thread. Session state lives in lock-free atomic state
//! machines, so status queries never block either thread.

pub mod adapters;
pub mod app;
pub mod domain;
pub mod infrastructure;
pub mod ports;

pub use app::{PipelineController, Recorder, SessionConfig, TranscriptionCoordinator};
pub use domain::{AppConfig, AudioBuffer, DomainError, EngineState, RecorderState, StatusEvent};
