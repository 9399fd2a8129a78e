use serde::Serialize;
use std::sync::atomic::{AtomicU8, Ordering};

use crate::domain::DomainError;

/// Inference engine state machine.
///
/// State transitions:
/// - Unloaded -> Loading -> Ready (load)
/// - Loading -> Unloaded (artifact missing) or Failed (malformed artifact)
/// - Ready -> Transcribing -> Ready (transcribe)
/// - Transcribing -> Interrupted (cancel); the in-flight call unwinds back
///   to Ready, so Interrupted is never an externally observable resting state
/// - Ready | Failed -> Unloaded (unload)
///
/// Failed is terminal until unload + load is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum EngineState {
    /// No model loaded.
    Unloaded = 0,
    /// Model deserialization in progress.
    Loading = 1,
    /// Model loaded, ready to transcribe.
    Ready = 2,
    /// A transcription pass is in flight.
    Transcribing = 3,
    /// Cancellation was requested for the in-flight pass.
    Interrupted = 4,
    /// Model load failed; unload to recover.
    Failed = 5,
}

impl From<u8> for EngineState {
    fn from(value: u8) -> Self {
        match value {
            1 => EngineState::Loading,
            2 => EngineState::Ready,
            3 => EngineState::Transcribing,
            4 => EngineState::Interrupted,
            5 => EngineState::Failed,
            _ => EngineState::Unloaded,
        }
    }
}

impl From<EngineState> for u8 {
    fn from(state: EngineState) -> Self {
        state as u8
    }
}

/// Atomic engine state with serialized transitions.
///
/// All lifecycle moves go through the compare-and-swap helpers below, so two
/// racing callers can never both win a transition. This is what enforces
/// single-flight: `begin_transcribe` is the only door into Transcribing.
#[derive(Debug)]
pub struct AtomicEngineState(AtomicU8);

impl AtomicEngineState {
    pub fn new(state: EngineState) -> Self {
        Self(AtomicU8::new(state.into()))
    }

    pub fn load(&self) -> EngineState {
        self.0.load(Ordering::Acquire).into()
    }

    pub fn store(&self, state: EngineState) {
        self.0.store(state.into(), Ordering::Release);
    }

    fn compare_exchange(&self, current: EngineState, new: EngineState) -> bool {
        self.0
            .compare_exchange(current.into(), new.into(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Unloaded -> Loading. Fails from any other state.
    pub fn begin_load(&self) -> Result<(), DomainError> {
        if self.compare_exchange(EngineState::Unloaded, EngineState::Loading) {
            Ok(())
        } else {
            Err(DomainError::LoadError(format!(
                "load is only valid from Unloaded, engine is {:?}",
                self.load()
            )))
        }
    }

    /// Ready -> Transcribing.
    ///
    /// Maps the failure to the caller-facing taxonomy: no model means
    /// NotInitialized, an in-flight pass means EngineBusy.
    pub fn begin_transcribe(&self) -> Result<(), DomainError> {
        if self.compare_exchange(EngineState::Ready, EngineState::Transcribing) {
            return Ok(());
        }
        match self.load() {
            EngineState::Transcribing | EngineState::Interrupted => Err(DomainError::EngineBusy),
            _ => Err(DomainError::NotInitialized),
        }
    }

    /// Transcribing -> Interrupted. Returns false when no pass is in flight.
    pub fn request_cancel(&self) -> bool {
        self.compare_exchange(EngineState::Transcribing, EngineState::Interrupted)
    }

    /// Transcribing | Interrupted -> Ready. Called as the in-flight pass
    /// unwinds; returns whether cancellation had been requested.
    pub fn finish_transcribe(&self) -> bool {
        if self.compare_exchange(EngineState::Transcribing, EngineState::Ready) {
            false
        } else {
            self.compare_exchange(EngineState::Interrupted, EngineState::Ready)
        }
    }

    /// Ready | Failed -> Unloaded.
    pub fn begin_unload(&self) -> Result<(), DomainError> {
        if self.compare_exchange(EngineState::Ready, EngineState::Unloaded)
            || self.compare_exchange(EngineState::Failed, EngineState::Unloaded)
        {
            return Ok(());
        }
        match self.load() {
            EngineState::Transcribing | EngineState::Interrupted => Err(DomainError::EngineBusy),
            _ => Err(DomainError::NotInitialized),
        }
    }
}

impl Default for AtomicEngineState {
    fn default() -> Self {
        Self::new(EngineState::Unloaded)
    }
}
