use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use tracing::{debug, info, warn};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::domain::{AtomicEngineState, DomainError, EngineState};
use crate::ports::InferenceEngine;

/// Process-wide engine runtime facts, resolved once before the first engine
/// is constructed.
static RUNTIME_THREADS: OnceCell<u32> = OnceCell::new();

/// Idempotent process-wide initialization: detect the inference thread
/// budget (cores - 1, at least 1).
fn runtime_threads() -> u32 {
    *RUNTIME_THREADS.get_or_init(|| {
        let threads = std::thread::available_parallelism()
            .map(|p| std::cmp::max(1, p.get() as u32 - 1))
            .unwrap_or(1);
        info!(threads, "Engine runtime initialized");
        threads
    })
}

/// The loaded-model resource: opaque context plus the decode options fixed
/// at load time.
struct ModelHandle {
    context: Arc<WhisperContext>,
    multilingual: bool,
}

/// InferenceEngine implementation using whisper.cpp via whisper-rs.
///
/// Strictly single-flight: the state machine CAS is the only door into
/// Transcribing, so a second concurrent `transcribe` fails with EngineBusy
/// instead of ever reaching the native call.
///
/// Cancellation is cooperative through whisper.cpp's abort callback, which
/// is polled between decoder steps. The worst-case latency between `cancel`
/// and the pass returning is one full inference call.
pub struct WhisperEngine {
    state: AtomicEngineState,
    model: RwLock<Option<ModelHandle>>,
    cancel_requested: Arc<AtomicBool>,
    language: Option<String>,
    threads: u32,
}

impl WhisperEngine {
    /// Create a new WhisperEngine.
    ///
    /// `threads` is the inference thread count; 0 means auto-detect
    /// (cores - 1). `language` pins decoding to one language; None
    /// auto-detects. Both are ignored for monolingual models, which always
    /// decode English.
    pub fn new(threads: u32, language: Option<String>) -> Self {
        let actual_threads = if threads == 0 { runtime_threads() } else { threads };

        info!(threads = actual_threads, "WhisperEngine created");

        Self {
            state: AtomicEngineState::default(),
            model: RwLock::new(None),
            cancel_requested: Arc::new(AtomicBool::new(false)),
            language,
            threads: actual_threads,
        }
    }

    fn run_inference(
        &self,
        context: Arc<WhisperContext>,
        multilingual: bool,
        samples: &[f32],
    ) -> Result<String, DomainError> {
        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });

        params.set_n_threads(self.threads as i32);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        if multilingual {
            if let Some(ref lang) = self.language {
                params.set_language(Some(lang));
            }
        } else {
            params.set_language(Some("en"));
        }

        // Cooperative cancellation checkpoint, polled by whisper.cpp
        // between decoder steps.
        let cancel = Arc::clone(&self.cancel_requested);
        params.set_abort_callback_safe(move || cancel.load(Ordering::Acquire));

        // Create state for this transcription
        let mut state = context.create_state().map_err(|e| {
            DomainError::TranscriptionFailed(format!("Failed to create whisper state: {}", e))
        })?;

        // Run inference
        state
            .full(params, samples)
            .map_err(|e| DomainError::TranscriptionFailed(format!("Inference failed: {}", e)))?;

        // Collect results
        let num_segments = state.full_n_segments().map_err(|e| {
            DomainError::TranscriptionFailed(format!("Failed to get segment count: {}", e))
        })?;

        let mut text = String::new();
        for i in 0..num_segments {
            if let Ok(segment_text) = state.full_get_segment_text(i) {
                text.push_str(&segment_text);
            }
        }

        Ok(text.trim().to_string())
    }
}

impl InferenceEngine for WhisperEngine {
    fn load(
        &self,
        model_path: &Path,
        vocab_path: &Path,
        multilingual: bool,
    ) -> Result<(), DomainError> {
        self.state.begin_load()?;

        // Both artifacts must exist before anything is deserialized. The
        // vocabulary ships inside the ggml weights blob, so the vocab path
        // is validated for presence only.
        for artifact in [model_path, vocab_path] {
            if !artifact.exists() {
                self.state.store(EngineState::Unloaded);
                return Err(DomainError::ModelNotFound(
                    artifact.to_string_lossy().to_string(),
                ));
            }
        }

        info!(path = ?model_path, multilingual, "Loading model");

        let path_str = model_path.to_string_lossy().to_string();
        let context =
            match WhisperContext::new_with_params(&path_str, WhisperContextParameters::default()) {
                Ok(ctx) => ctx,
                Err(e) => {
                    self.state.store(EngineState::Failed);
                    return Err(DomainError::LoadError(format!(
                        "Failed to load model: {}",
                        e
                    )));
                }
            };

        *self.model.write() = Some(ModelHandle {
            context: Arc::new(context),
            multilingual,
        });
        self.state.store(EngineState::Ready);

        info!(path = ?model_path, "Model loaded");
        Ok(())
    }

    fn transcribe(&self, samples: &[f32]) -> Result<String, DomainError> {
        self.state.begin_transcribe()?;
        self.cancel_requested.store(false, Ordering::Release);

        let (context, multilingual) = {
            let guard = self.model.read();
            match guard.as_ref() {
                Some(handle) => (Arc::clone(&handle.context), handle.multilingual),
                None => {
                    // State said Ready but the handle is gone: internal
                    // invariant violation, recover to Unloaded.
                    warn!("Engine state was Ready without a model handle");
                    self.state.store(EngineState::Unloaded);
                    return Err(DomainError::NotInitialized);
                }
            }
        };

        debug!(samples = samples.len(), "Starting transcription");

        let result = if samples.is_empty() {
            Ok(String::new())
        } else {
            self.run_inference(context, multilingual, samples)
        };

        let was_cancelled = self.state.finish_transcribe();

        match result {
            Ok(text) => {
                debug!(text_len = text.len(), cancelled = was_cancelled, "Transcription complete");
                Ok(text)
            }
            // An aborted pass surfaces as a native error; per the cancel
            // contract it returns early with an empty result instead.
            Err(_) if was_cancelled => {
                debug!("Transcription interrupted, returning empty result");
                Ok(String::new())
            }
            Err(e) => Err(e),
        }
    }

    fn cancel(&self) -> bool {
        if self.state.request_cancel() {
            self.cancel_requested.store(true, Ordering::Release);
            debug!("Cancellation requested");
            true
        } else {
            false
        }
    }

    fn unload(&self) -> Result<(), DomainError> {
        self.state.begin_unload()?;
        *self.model.write() = None;
        info!("Model unloaded");
        Ok(())
    }

    fn state(&self) -> EngineState {
        self.state.load()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_starts_unloaded() {
        let engine = WhisperEngine::new(2, None);
        assert_eq!(engine.state(), EngineState::Unloaded);
    }

    #[test]
    fn test_load_missing_model_stays_unloaded() {
        let engine = WhisperEngine::new(2, None);
        let err = engine
            .load(
                Path::new("/nonexistent/model.bin"),
                Path::new("/nonexistent/vocab.bin"),
                true,
            )
            .unwrap_err();
        assert!(matches!(err, DomainError::ModelNotFound(_)));
        assert_eq!(engine.state(), EngineState::Unloaded);
    }

    #[test]
    fn test_load_missing_vocab_stays_unloaded() {
        let engine = WhisperEngine::new(2, None);
        // The weights blob exists, the vocabulary blob does not.
        let model = std::env::temp_dir().join("sussurro_vocab_test_model.bin");
        std::fs::write(&model, b"stub").unwrap();

        let err = engine
            .load(&model, Path::new("/nonexistent/vocab.bin"), true)
            .unwrap_err();
        assert!(matches!(err, DomainError::ModelNotFound(_)));
        assert_eq!(engine.state(), EngineState::Unloaded);

        let _ = std::fs::remove_file(&model);
    }

    #[test]
    fn test_load_malformed_model_goes_failed() {
        let engine = WhisperEngine::new(2, None);
        let dir = std::env::temp_dir().join("sussurro_malformed_model_test");
        std::fs::create_dir_all(&dir).unwrap();
        let model = dir.join("model.bin");
        let vocab = dir.join("vocab.bin");
        std::fs::write(&model, b"not a ggml file").unwrap();
        std::fs::write(&vocab, b"stub").unwrap();

        let err = engine.load(&model, &vocab, true).unwrap_err();
        assert!(matches!(err, DomainError::LoadError(_)));
        assert_eq!(engine.state(), EngineState::Failed);

        // Failed is terminal until unload + load
        assert!(matches!(
            engine.transcribe(&[0.0; 16]),
            Err(DomainError::NotInitialized)
        ));
        engine.unload().unwrap();
        assert_eq!(engine.state(), EngineState::Unloaded);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_transcribe_before_load_fails() {
        let engine = WhisperEngine::new(2, None);
        let err = engine.transcribe(&[0.0; 1600]).unwrap_err();
        assert!(matches!(err, DomainError::NotInitialized));
    }

    #[test]
    fn test_cancel_when_idle_is_noop() {
        let engine = WhisperEngine::new(2, None);
        assert!(!engine.cancel());
        assert_eq!(engine.state(), EngineState::Unloaded);
    }

    #[test]
    fn test_unload_before_load_fails() {
        let engine = WhisperEngine::new(2, None);
        assert!(matches!(
            engine.unload(),
            Err(DomainError::NotInitialized)
        ));
    }

    #[test]
    fn test_runtime_threads_detection() {
        assert!(runtime_threads() >= 1);
        let engine = WhisperEngine::new(0, None);
        assert!(engine.threads >= 1);
    }
}
