use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, Ordering};

/// Recorder state machine.
///
/// State transitions:
/// - Idle -> Recording (start)
/// - Recording -> Idle (stop, returns the session AudioBuffer)
/// - Recording -> Idle (capture-thread device error, automatic)
///
/// Note: a device error never restarts capture on its own. The session ends,
/// a `StatusEvent::DeviceError` is emitted, and the caller decides whether
/// to start a new session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum RecorderState {
    /// Ready to record, no active capture.
    Idle = 0,
    /// Actively capturing audio.
    Recording = 1,
}

impl RecorderState {
    /// Check if recording can be started from this state.
    #[must_use]
    pub fn can_start(&self) -> bool {
        matches!(self, RecorderState::Idle)
    }

    /// Check if recording can be stopped from this state.
    #[must_use]
    pub fn can_stop(&self) -> bool {
        matches!(self, RecorderState::Recording)
    }
}

impl From<u8> for RecorderState {
    fn from(value: u8) -> Self {
        match value {
            1 => RecorderState::Recording,
            _ => RecorderState::Idle,
        }
    }
}

impl From<RecorderState> for u8 {
    fn from(state: RecorderState) -> Self {
        state as u8
    }
}

/// Atomic wrapper for RecorderState for lock-free reads.
///
/// `is_in_progress()` queries go through this from any thread without
/// touching the session mutex.
#[derive(Debug)]
pub struct AtomicRecorderState(AtomicU8);

impl AtomicRecorderState {
    pub fn new(state: RecorderState) -> Self {
        Self(AtomicU8::new(state.into()))
    }

    pub fn load(&self) -> RecorderState {
        self.0.load(Ordering::Acquire).into()
    }

    pub fn store(&self, state: RecorderState) {
        self.0.store(state.into(), Ordering::Release);
    }

    /// Compare and swap, returns true if successful.
    pub fn compare_exchange(&self, current: RecorderState, new: RecorderState) -> bool {
        self.0
            .compare_exchange(current.into(), new.into(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl Default for AtomicRecorderState {
    fn default() -> Self {
        Self::new(RecorderState::Idle)
    }
}

/// Audio capture configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSourceConfig {
    /// Target sample rate in Hz.
    pub sample_rate: u32,
    /// Requested channel count. Capture is downmixed to mono regardless.
    pub channels: u16,
    /// Nominal capture tick in milliseconds; one SampleBatch per tick.
    pub chunk_ms: u32,
    /// Driver-to-capture ring capacity in seconds. The driver drops samples
    /// when the capture thread falls further behind than this.
    pub ring_capacity_secs: u32,
    /// Input device ID, or None for the system default.
    pub device_id: Option<String>,
}

impl Default for AudioSourceConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000, // 16kHz for Whisper
            channels: 1,
            chunk_ms: 160,
            ring_capacity_secs: 4,
            device_id: None,
        }
    }
}

impl AudioSourceConfig {
    /// Samples per capture tick at the target rate.
    pub fn chunk_samples(&self) -> usize {
        (self.sample_rate as usize * self.chunk_ms as usize) / 1000
    }

    /// Ring buffer capacity in samples.
    pub fn ring_capacity(&self) -> usize {
        self.ring_capacity_secs as usize * self.sample_rate as usize
    }
}

/// Status events emitted by the Recorder and the TranscriptionCoordinator.
///
/// Events carry status only, never sample data. Raw samples travel through
/// the listener's dedicated data callback.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum StatusEvent {
    /// Capture started.
    Recording,
    /// Capture stopped and the session buffer was finalized.
    RecordingDone,
    /// A transcription pass was submitted to the engine.
    Processing,
    /// A transcription pass completed.
    ProcessingDone,
    /// An in-flight transcription pass was cancelled and discarded.
    Interrupted,
    /// A file-mode session file was missing.
    FileNotFound,
    /// The engine has no model loaded; accumulation continues.
    NotReady,
    /// A transcription pass failed.
    Failed { message: String },
    /// The capture device failed; the session ended.
    DeviceError { message: String },
}
