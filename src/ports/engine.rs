use std::path::Path;

use crate::domain::{DomainError, EngineState};

/// Port for the speech-recognition engine.
///
/// The engine owns the opaque model resource and is strictly single-flight:
/// at most one `transcribe` call may be in progress per instance. Queueing
/// is the coordinator's job, never the engine's.
pub trait InferenceEngine: Send + Sync {
    /// Load the model artifacts. Valid only from Unloaded.
    ///
    /// Fails with `ModelNotFound` when either artifact is missing (the
    /// engine stays Unloaded) and `LoadError` on a malformed artifact (the
    /// engine goes Failed until `unload`). Model deserialization is slow;
    /// call this off any latency-sensitive thread.
    fn load(
        &self,
        model_path: &Path,
        vocab_path: &Path,
        multilingual: bool,
    ) -> Result<(), DomainError>;

    /// Decode the given samples to text. Valid only from Ready.
    ///
    /// Blocks for the duration of the inference pass. A second caller while
    /// a pass is in flight fails with `EngineBusy`; a caller before `load`
    /// fails with `NotInitialized`.
    fn transcribe(&self, samples: &[f32]) -> Result<String, DomainError>;

    /// Request cooperative cancellation of the in-flight pass.
    ///
    /// Returns true when a pass was actually interrupted. Best-effort: the
    /// pass returns early at its next checkpoint with a partial-or-empty
    /// result, worst case after one full inference call.
    fn cancel(&self) -> bool;

    /// Release the model resource. Valid from Ready or Failed.
    fn unload(&self) -> Result<(), DomainError>;

    /// Current engine state (lock-free read).
    fn state(&self) -> EngineState;
}
