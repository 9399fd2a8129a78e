pub mod controller;
pub mod coordinator;
pub mod recorder;

pub use controller::PipelineController;
pub use coordinator::{CoordinatorConfig, TranscriptionCoordinator};
pub use recorder::{Recorder, SessionConfig};
