use crate::domain::{AudioSourceConfig, DomainError, SampleBatch};

/// An open capture stream delivering fixed-size chunks.
///
/// `read_chunk` blocks until a full chunk has been produced by the driver,
/// so it must run on a dedicated capture thread, never a latency-sensitive
/// one. The stream holds the hardware input exclusively until `close` (or
/// drop).
pub trait AudioChunkStream: Send {
    /// Block until one full SampleBatch is available and return it.
    ///
    /// Fails with `DeviceDisconnected` once the underlying driver reports a
    /// stream error.
    fn read_chunk(&mut self) -> Result<SampleBatch, DomainError>;

    /// Release the hardware input resource. Idempotent; also runs on drop.
    fn close(&mut self);
}

/// Port for microphone capture.
///
/// Implementations wrap the platform audio input and produce a continuous
/// sequence of fixed-size PCM chunks at the configured sample rate.
pub trait AudioSource: Send + Sync {
    /// Acquire the input device and start capturing.
    ///
    /// Fails with `DeviceUnavailable` when no usable device exists and
    /// `DeviceBusy` when this source already has an open stream.
    fn open(&self, config: &AudioSourceConfig) -> Result<Box<dyn AudioChunkStream>, DomainError>;
}
