use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::adapters::session_file::SessionFileWriter;
use crate::domain::{
    AtomicRecorderState, AudioBuffer, AudioSourceConfig, DomainError, RecorderState, StatusEvent,
};
use crate::ports::{AudioChunkStream, AudioSource, RecorderListener};

/// Configuration for one recording session.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// Optional session file. Captured samples are streamed here (raw f32
    /// PCM) in addition to the in-memory session buffer.
    pub file_path: Option<PathBuf>,
}

struct ActiveSession {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<AudioBuffer>,
}

/// Orchestrates an AudioSource on a dedicated capture thread.
///
/// At most one session is active at a time. While recording, every captured
/// chunk is appended to the session buffer and forwarded to the listener's
/// data callback in capture order; the listener is invoked on the capture
/// thread.
pub struct Recorder {
    source: Arc<dyn AudioSource>,
    listener: Arc<dyn RecorderListener>,
    config: AudioSourceConfig,
    state: Arc<AtomicRecorderState>,
    session: Mutex<Option<ActiveSession>>,
}

impl Recorder {
    pub fn new(
        source: Arc<dyn AudioSource>,
        listener: Arc<dyn RecorderListener>,
        config: AudioSourceConfig,
    ) -> Self {
        Self {
            source,
            listener,
            config,
            state: Arc::new(AtomicRecorderState::default()),
            session: Mutex::new(None),
        }
    }

    /// Start a recording session.
    ///
    /// Fails with `AlreadyRecording` if a session is active, and with the
    /// AudioSource's error if the device cannot be opened (in which case the
    /// recorder stays Idle).
    pub fn start(&self, session: SessionConfig) -> Result<(), DomainError> {
        if !self
            .state
            .compare_exchange(RecorderState::Idle, RecorderState::Recording)
        {
            return Err(DomainError::AlreadyRecording);
        }

        let stream = match self.source.open(&self.config) {
            Ok(stream) => stream,
            Err(e) => {
                self.state.store(RecorderState::Idle);
                return Err(e);
            }
        };

        let file_writer = match session
            .file_path
            .as_deref()
            .map(SessionFileWriter::create)
            .transpose()
        {
            Ok(writer) => writer,
            Err(e) => {
                self.state.store(RecorderState::Idle);
                return Err(e);
            }
        };

        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let thread_state = Arc::clone(&self.state);
        let thread_listener = Arc::clone(&self.listener);
        let sample_rate = self.config.sample_rate;

        let handle = thread::Builder::new()
            .name("capture".to_string())
            .spawn(move || {
                capture_loop(
                    stream,
                    file_writer,
                    thread_listener,
                    thread_state,
                    thread_stop,
                    sample_rate,
                )
            })
            .map_err(|e| {
                self.state.store(RecorderState::Idle);
                DomainError::Io(format!("Failed to spawn capture thread: {}", e))
            })?;

        *self.session.lock() = Some(ActiveSession { stop, handle });

        info!(file = ?session.file_path, "Recording started");
        self.listener.on_status(StatusEvent::Recording);
        Ok(())
    }

    /// Stop the active session and return its buffer.
    ///
    /// A no-op returning `None` when no session is active; in particular it
    /// never emits a second `RecordingDone`.
    pub fn stop(&self) -> Result<Option<AudioBuffer>, DomainError> {
        let Some(session) = self.session.lock().take() else {
            debug!("stop() with no active session");
            return Ok(None);
        };

        session.stop.store(true, Ordering::Release);

        // If the capture thread already died on a device error it has
        // transitioned to Idle and emitted DeviceError; only a live session
        // gets a RecordingDone.
        let was_recording = self.state.load() == RecorderState::Recording;

        let buffer = session
            .handle
            .join()
            .map_err(|_| DomainError::Io("Capture thread panicked".to_string()))?;

        self.state.store(RecorderState::Idle);

        if was_recording {
            info!(samples = buffer.len(), "Recording stopped");
            self.listener.on_status(StatusEvent::RecordingDone);
        }

        Ok(Some(buffer))
    }

    /// Pure state query, safe from any thread.
    pub fn is_in_progress(&self) -> bool {
        self.state.load() == RecorderState::Recording
    }
}

fn capture_loop(
    mut stream: Box<dyn AudioChunkStream>,
    mut file_writer: Option<SessionFileWriter>,
    listener: Arc<dyn RecorderListener>,
    state: Arc<AtomicRecorderState>,
    stop: Arc<AtomicBool>,
    sample_rate: u32,
) -> AudioBuffer {
    let mut buffer = AudioBuffer::new(sample_rate);

    while !stop.load(Ordering::Acquire) {
        match stream.read_chunk() {
            Ok(batch) => {
                buffer.push_samples(&batch);
                if let Some(writer) = file_writer.as_mut() {
                    if let Err(e) = writer.write_samples(&batch) {
                        // The in-memory buffer still has every sample;
                        // drop the file, keep capturing.
                        warn!(error = %e, "Session file write failed, disabling file output");
                        file_writer = None;
                    }
                }
                listener.on_samples(&batch);
            }
            Err(e) => {
                error!(error = %e, "Capture device error, ending session");
                state.store(RecorderState::Idle);
                listener.on_status(StatusEvent::DeviceError {
                    message: e.to_string(),
                });
                break;
            }
        }
    }

    stream.close();

    if let Some(writer) = file_writer.take() {
        match writer.finalize() {
            Ok(samples) => debug!(samples, "Session file finalized"),
            Err(e) => warn!(error = %e, "Failed to finalize session file"),
        }
    }

    buffer
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SampleBatch;
    use std::collections::VecDeque;
    use std::time::Duration;

    /// Listener that records every callback.
    #[derive(Default)]
    struct CollectingListener {
        statuses: Mutex<Vec<StatusEvent>>,
        batches: Mutex<Vec<Vec<f32>>>,
    }

    impl RecorderListener for CollectingListener {
        fn on_status(&self, event: StatusEvent) {
            self.statuses.lock().push(event);
        }

        fn on_samples(&self, batch: &[f32]) {
            self.batches.lock().push(batch.to_vec());
        }
    }

    /// Source that plays a fixed script of batches, then reports the device
    /// gone.
    struct ScriptedSource {
        script: Mutex<VecDeque<SampleBatch>>,
    }

    impl ScriptedSource {
        fn new(batches: Vec<SampleBatch>) -> Self {
            Self {
                script: Mutex::new(batches.into()),
            }
        }
    }

    struct ScriptedStream {
        script: VecDeque<SampleBatch>,
    }

    impl AudioSource for ScriptedSource {
        fn open(
            &self,
            _config: &AudioSourceConfig,
        ) -> Result<Box<dyn AudioChunkStream>, DomainError> {
            Ok(Box::new(ScriptedStream {
                script: std::mem::take(&mut self.script.lock()),
            }))
        }
    }

    impl AudioChunkStream for ScriptedStream {
        fn read_chunk(&mut self) -> Result<SampleBatch, DomainError> {
            self.script
                .pop_front()
                .ok_or_else(|| DomainError::DeviceDisconnected("script exhausted".to_string()))
        }

        fn close(&mut self) {}
    }

    /// Source that produces silence chunks forever (with a short tick so
    /// stop() is observed promptly).
    struct SilenceSource;

    struct SilenceStream;

    impl AudioSource for SilenceSource {
        fn open(
            &self,
            _config: &AudioSourceConfig,
        ) -> Result<Box<dyn AudioChunkStream>, DomainError> {
            Ok(Box::new(SilenceStream))
        }
    }

    impl AudioChunkStream for SilenceStream {
        fn read_chunk(&mut self) -> Result<SampleBatch, DomainError> {
            thread::sleep(Duration::from_millis(1));
            Ok(vec![0.0; 16])
        }

        fn close(&mut self) {}
    }

    /// Source whose open always fails.
    struct DeadSource;

    impl AudioSource for DeadSource {
        fn open(
            &self,
            _config: &AudioSourceConfig,
        ) -> Result<Box<dyn AudioChunkStream>, DomainError> {
            Err(DomainError::DeviceUnavailable("no microphone".to_string()))
        }
    }

    fn wait_until_idle(recorder: &Recorder) {
        for _ in 0..500 {
            if !recorder.is_in_progress() {
                return;
            }
            thread::sleep(Duration::from_millis(1));
        }
        panic!("recorder never went idle");
    }

    #[test]
    fn test_every_batch_delivered_in_order() {
        let script: Vec<SampleBatch> = (0..5)
            .map(|i| vec![i as f32 / 10.0, i as f32 / 10.0 + 0.01])
            .collect();
        let listener = Arc::new(CollectingListener::default());
        let recorder = Recorder::new(
            Arc::new(ScriptedSource::new(script.clone())),
            listener.clone(),
            AudioSourceConfig::default(),
        );

        recorder.start(SessionConfig::default()).unwrap();
        // Script ends with a device error, which ends the session.
        wait_until_idle(&recorder);

        let batches = listener.batches.lock();
        assert_eq!(*batches, script);
    }

    #[test]
    fn test_device_error_ends_session_with_status() {
        let listener = Arc::new(CollectingListener::default());
        let recorder = Recorder::new(
            Arc::new(ScriptedSource::new(vec![vec![0.1; 4]])),
            listener.clone(),
            AudioSourceConfig::default(),
        );

        recorder.start(SessionConfig::default()).unwrap();
        wait_until_idle(&recorder);

        // Captured samples survive the error
        let buffer = recorder.stop().unwrap().expect("session buffer");
        assert_eq!(buffer.samples(), &[0.1; 4]);

        let statuses = listener.statuses.lock();
        assert_eq!(statuses[0], StatusEvent::Recording);
        assert!(matches!(
            statuses.last(),
            Some(StatusEvent::DeviceError { .. })
        ));
        // No RecordingDone after a device error
        assert!(!statuses.contains(&StatusEvent::RecordingDone));
    }

    #[test]
    fn test_stop_returns_buffer_and_is_idempotent() {
        let listener = Arc::new(CollectingListener::default());
        let recorder = Recorder::new(
            Arc::new(SilenceSource),
            listener.clone(),
            AudioSourceConfig::default(),
        );

        recorder.start(SessionConfig::default()).unwrap();
        assert!(recorder.is_in_progress());
        thread::sleep(Duration::from_millis(10));

        let buffer = recorder.stop().unwrap();
        assert!(buffer.is_some());
        assert!(!recorder.is_in_progress());

        // Second stop is a silent no-op
        assert!(recorder.stop().unwrap().is_none());

        let statuses = listener.statuses.lock();
        let done_count = statuses
            .iter()
            .filter(|s| **s == StatusEvent::RecordingDone)
            .count();
        assert_eq!(done_count, 1);
    }

    #[test]
    fn test_second_start_fails_first_session_unaffected() {
        let listener = Arc::new(CollectingListener::default());
        let recorder = Recorder::new(
            Arc::new(SilenceSource),
            listener.clone(),
            AudioSourceConfig::default(),
        );

        recorder.start(SessionConfig::default()).unwrap();
        let err = recorder.start(SessionConfig::default()).unwrap_err();
        assert!(matches!(err, DomainError::AlreadyRecording));

        // First session still running and stoppable
        assert!(recorder.is_in_progress());
        assert!(recorder.stop().unwrap().is_some());
    }

    #[test]
    fn test_open_failure_leaves_recorder_idle() {
        let listener = Arc::new(CollectingListener::default());
        let recorder = Recorder::new(
            Arc::new(DeadSource),
            listener.clone(),
            AudioSourceConfig::default(),
        );

        let err = recorder.start(SessionConfig::default()).unwrap_err();
        assert!(matches!(err, DomainError::DeviceUnavailable(_)));
        assert!(!recorder.is_in_progress());
        assert!(listener.statuses.lock().is_empty());
    }

    #[test]
    fn test_file_mode_writes_session_file() {
        let dir = std::env::temp_dir().join("sussurro_recorder_file_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("session.pcm");

        let script = vec![vec![0.25f32; 8], vec![-0.25f32; 8]];
        let listener = Arc::new(CollectingListener::default());
        let recorder = Recorder::new(
            Arc::new(ScriptedSource::new(script)),
            listener,
            AudioSourceConfig::default(),
        );

        recorder
            .start(SessionConfig {
                file_path: Some(path.clone()),
            })
            .unwrap();
        wait_until_idle(&recorder);
        recorder.stop().unwrap();

        let samples = crate::adapters::session_file::read_samples(&path).unwrap();
        let mut expected = vec![0.25f32; 8];
        expected.extend_from_slice(&[-0.25f32; 8]);
        assert_eq!(samples, expected);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
