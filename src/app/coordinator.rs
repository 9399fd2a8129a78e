use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::adapters::session_file;
use crate::domain::{CoordinatorSettings, DomainError, StatusEvent};
use crate::ports::{InferenceEngine, TranscriptionListener};

/// Runtime coordinator configuration, in samples.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Working-buffer size that triggers a streaming submission.
    pub submit_threshold: usize,
    /// Submit below the threshold once this much time has passed since the
    /// last submission. None disables the timer.
    pub max_interval: Option<Duration>,
    /// Working-buffer retention window; oldest samples are evicted beyond
    /// this when inference falls behind.
    pub max_buffer: usize,
}

impl CoordinatorConfig {
    pub fn from_settings(settings: &CoordinatorSettings, sample_rate: u32) -> Self {
        let per_ms = sample_rate as usize / 1000;
        Self {
            submit_threshold: settings.submit_threshold_ms as usize * per_ms,
            max_interval: match settings.max_interval_ms {
                0 => None,
                ms => Some(Duration::from_millis(ms)),
            },
            max_buffer: settings.max_buffer_secs as usize * sample_rate as usize,
        }
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self::from_settings(&CoordinatorSettings::default(), 16_000)
    }
}

enum WorkerCommand {
    Transcribe { samples: Vec<f32>, generation: u64 },
    TranscribeFile { path: PathBuf },
    Shutdown,
}

/// The single shared mutable resource between the capture side and the
/// inference worker. Every mutation happens under this mutex; submission
/// drains the whole vector, so a concurrent append is either fully in this
/// submission or fully in the next, never split or duplicated.
struct WorkingBuffer {
    samples: Vec<f32>,
    in_flight: bool,
    /// Bumped by interrupt(); an in-flight pass carrying an older value is
    /// discarded when it lands.
    generation: u64,
    last_submit: Instant,
}

/// Decouples the continuous arrival of sample batches from the slow, bursty
/// inference call.
///
/// Streaming mode: `push_samples` accumulates into the working buffer and
/// submits the entire buffer to the single inference worker when the
/// threshold (or interval timer) is reached and nothing is in flight.
/// Batches that arrive during a pass are retained and covered by the next
/// submission, which fires as soon as the pass completes.
///
/// File mode: `transcribe_file` runs one pass over a whole session file.
///
/// Single-flight: the one worker thread is the only caller into the engine,
/// so two concurrent `transcribe` calls cannot happen by construction.
pub struct TranscriptionCoordinator {
    engine: Arc<dyn InferenceEngine>,
    config: CoordinatorConfig,
    buffer: Arc<Mutex<WorkingBuffer>>,
    worker_tx: mpsc::UnboundedSender<WorkerCommand>,
    worker: Option<JoinHandle<()>>,
}

impl TranscriptionCoordinator {
    pub fn new(
        engine: Arc<dyn InferenceEngine>,
        listener: Arc<dyn TranscriptionListener>,
        config: CoordinatorConfig,
    ) -> Self {
        let buffer = Arc::new(Mutex::new(WorkingBuffer {
            samples: Vec::new(),
            in_flight: false,
            generation: 0,
            last_submit: Instant::now(),
        }));

        let (worker_tx, worker_rx) = mpsc::unbounded_channel();

        let thread_engine = Arc::clone(&engine);
        let thread_buffer = Arc::clone(&buffer);
        let thread_tx = worker_tx.clone();

        let worker = thread::Builder::new()
            .name("inference".to_string())
            .spawn(move || {
                worker_loop(thread_engine, listener, thread_buffer, worker_rx, thread_tx)
            })
            .ok();

        if worker.is_none() {
            warn!("Failed to spawn inference worker; submissions will be dropped");
        }

        Self {
            engine,
            config,
            buffer,
            worker_tx,
            worker,
        }
    }

    /// Append one batch to the working buffer (capture thread side).
    ///
    /// Never blocks on inference and never fails: when the engine is
    /// unavailable the buffer simply keeps accumulating.
    pub fn push_samples(&self, batch: &[f32]) {
        let mut buf = self.buffer.lock();
        buf.samples.extend_from_slice(batch);

        // Bounded retention: evict the oldest samples when inference has
        // fallen behind the window.
        if buf.samples.len() > self.config.max_buffer {
            let excess = buf.samples.len() - self.config.max_buffer;
            buf.samples.drain(..excess);
            debug!(evicted = excess, "Working buffer over retention window");
        }

        if buf.in_flight {
            return;
        }

        let due = buf.samples.len() >= self.config.submit_threshold
            || self
                .config
                .max_interval
                .is_some_and(|interval| buf.last_submit.elapsed() >= interval);

        if due {
            self.submit_locked(&mut buf);
        }
    }

    /// Force-submit whatever has accumulated (e.g. at stop-time).
    pub fn flush(&self) {
        let mut buf = self.buffer.lock();
        if !buf.in_flight && !buf.samples.is_empty() {
            self.submit_locked(&mut buf);
        }
    }

    /// Run one transcription pass over a whole session file.
    pub fn transcribe_file(&self, path: &Path) -> Result<(), DomainError> {
        self.worker_tx
            .send(WorkerCommand::TranscribeFile {
                path: path.to_path_buf(),
            })
            .map_err(|_| DomainError::TranscriptionFailed("Inference worker gone".to_string()))
    }

    /// Cancel any in-flight pass and discard its buffer.
    ///
    /// The discarded samples are not resubmitted; batches that arrived after
    /// the in-flight submission keep accumulating and are submitted at the
    /// next threshold. Cancellation is cooperative: worst case the pass
    /// returns only after one full inference call.
    pub fn interrupt(&self) {
        {
            let mut buf = self.buffer.lock();
            buf.generation += 1;
        }
        if self.engine.cancel() {
            info!("Interrupted in-flight transcription");
        }
    }

    /// Samples currently waiting in the working buffer.
    pub fn pending_samples(&self) -> usize {
        self.buffer.lock().samples.len()
    }

    fn submit_locked(&self, buf: &mut WorkingBuffer) {
        let samples = std::mem::take(&mut buf.samples);
        buf.in_flight = true;
        buf.last_submit = Instant::now();
        debug!(samples = samples.len(), "Submitting working buffer");
        if self
            .worker_tx
            .send(WorkerCommand::Transcribe {
                samples,
                generation: buf.generation,
            })
            .is_err()
        {
            buf.in_flight = false;
        }
    }
}

impl Drop for TranscriptionCoordinator {
    fn drop(&mut self) {
        let _ = self.worker_tx.send(WorkerCommand::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn worker_loop(
    engine: Arc<dyn InferenceEngine>,
    listener: Arc<dyn TranscriptionListener>,
    buffer: Arc<Mutex<WorkingBuffer>>,
    mut rx: mpsc::UnboundedReceiver<WorkerCommand>,
    tx: mpsc::UnboundedSender<WorkerCommand>,
) {
    while let Some(command) = rx.blocking_recv() {
        match command {
            WorkerCommand::Transcribe {
                samples,
                generation,
            } => {
                listener.on_status(StatusEvent::Processing);
                let outcome = engine.transcribe(&samples);

                // Settle the working buffer first: clear in-flight, decide
                // whether this pass is still wanted, and drain anything that
                // accumulated during the call.
                let (fresh, leftover) = {
                    let mut buf = buffer.lock();
                    buf.in_flight = false;
                    let fresh = generation == buf.generation;
                    let leftover = if fresh && outcome.is_ok() && !buf.samples.is_empty() {
                        buf.in_flight = true;
                        buf.last_submit = Instant::now();
                        Some((std::mem::take(&mut buf.samples), buf.generation))
                    } else {
                        None
                    };
                    (fresh, leftover)
                };

                match outcome {
                    Ok(_) if !fresh => {
                        debug!("Discarding interrupted transcription result");
                        listener.on_status(StatusEvent::Interrupted);
                    }
                    Ok(text) => {
                        listener.on_result(&text);
                        listener.on_status(StatusEvent::ProcessingDone);
                    }
                    Err(DomainError::EngineBusy) => {
                        // The worker is the only engine caller, so this is
                        // an internal invariant violation: log and skip.
                        warn!("Engine reported busy from the single-flight worker");
                    }
                    Err(DomainError::NotInitialized) => {
                        debug!("Engine not ready, dropping this submission");
                        listener.on_status(StatusEvent::NotReady);
                    }
                    Err(e) => {
                        warn!(error = %e, "Transcription pass failed");
                        listener.on_status(StatusEvent::Failed {
                            message: e.to_string(),
                        });
                    }
                }

                if let Some((samples, generation)) = leftover {
                    debug!(samples = samples.len(), "Submitting samples retained during pass");
                    let _ = tx.send(WorkerCommand::Transcribe {
                        samples,
                        generation,
                    });
                }
            }
            WorkerCommand::TranscribeFile { path } => {
                let samples = match session_file::read_samples(&path) {
                    Ok(samples) => samples,
                    Err(e) => {
                        warn!(path = ?path, error = %e, "Session file not readable");
                        listener.on_status(StatusEvent::FileNotFound);
                        continue;
                    }
                };

                listener.on_status(StatusEvent::Processing);
                match engine.transcribe(&samples) {
                    Ok(text) => {
                        listener.on_result(&text);
                        listener.on_status(StatusEvent::ProcessingDone);
                    }
                    Err(DomainError::NotInitialized) => {
                        listener.on_status(StatusEvent::NotReady);
                    }
                    Err(e) => {
                        warn!(error = %e, "File transcription failed");
                        listener.on_status(StatusEvent::Failed {
                            message: e.to_string(),
                        });
                    }
                }
            }
            WorkerCommand::Shutdown => break,
        }
    }
    debug!("Inference worker shutting down");
}
