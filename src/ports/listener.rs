use crate::domain::StatusEvent;

/// Callback contract between the Recorder and its collaborator.
///
/// Callbacks execute on the capture thread. Redispatching to a preferred
/// context (UI thread, channel, etc.) is the collaborator's responsibility.
pub trait RecorderListener: Send + Sync {
    /// Recorder status changed.
    fn on_status(&self, event: StatusEvent);

    /// One captured chunk, in capture order. Invoked exactly once per chunk.
    fn on_samples(&self, batch: &[f32]);
}

/// Callback contract between the TranscriptionCoordinator and its
/// collaborator.
///
/// Callbacks execute on the inference worker thread.
pub trait TranscriptionListener: Send + Sync {
    /// Coordinator status changed.
    fn on_status(&self, event: StatusEvent);

    /// A transcription pass produced text.
    fn on_result(&self, text: &str);
}
