use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::HeapRb;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::domain::{AudioSourceConfig, DomainError, SampleBatch};
use crate::ports::{AudioChunkStream, AudioSource};

/// Lock-free ring buffer between the driver callback and the capture thread.
type RingProducer = ringbuf::HeapProd<f32>;
type RingConsumer = ringbuf::HeapCons<f32>;

/// Audio processing utilities.
mod audio_processing {
    use super::*;

    pub fn get_device(selected_device_id: Option<&str>) -> Result<Device, DomainError> {
        let host = cpal::default_host();

        if let Some(id) = selected_device_id {
            let devices = host.input_devices().map_err(|e| {
                DomainError::DeviceUnavailable(format!("Failed to enumerate devices: {}", e))
            })?;

            for device in devices {
                if let Ok(name) = device.name() {
                    if name == id {
                        return Ok(device);
                    }
                }
            }
            warn!(device_id = %id, "Selected device not found, falling back to default");
        }

        host.default_input_device().ok_or_else(|| {
            DomainError::DeviceUnavailable("No default input device available".to_string())
        })
    }

    pub fn build_stream_config(device: &Device) -> Result<StreamConfig, DomainError> {
        let supported = device.default_input_config().map_err(|e| {
            DomainError::DeviceUnavailable(format!("Failed to get default config: {}", e))
        })?;

        debug!(
            sample_rate = ?supported.sample_rate(),
            channels = supported.channels(),
            format = ?supported.sample_format(),
            "Device default config"
        );

        Ok(StreamConfig {
            channels: supported.channels(),
            sample_rate: supported.sample_rate(),
            buffer_size: cpal::BufferSize::Default,
        })
    }

    pub fn build_stream(
        device: &Device,
        config: &StreamConfig,
        sample_format: SampleFormat,
        target_sample_rate: u32,
        mut producer: RingProducer,
        device_lost: Arc<AtomicBool>,
    ) -> Result<Stream, DomainError> {
        let channels = config.channels as usize;
        let device_sample_rate = config.sample_rate.0;

        let device_lost_err = Arc::clone(&device_lost);

        let stream = match sample_format {
            SampleFormat::F32 => device.build_input_stream(
                config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    process_samples(
                        data,
                        channels,
                        device_sample_rate,
                        target_sample_rate,
                        &mut producer,
                    );
                },
                move |err| {
                    error!(?err, "Audio stream error");
                    device_lost_err.store(true, Ordering::Release);
                },
                None,
            ),
            SampleFormat::I16 => device.build_input_stream(
                config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    let f32_data: Vec<f32> =
                        data.iter().map(|&s| s as f32 / 32768.0).collect();
                    process_samples(
                        &f32_data,
                        channels,
                        device_sample_rate,
                        target_sample_rate,
                        &mut producer,
                    );
                },
                move |err| {
                    error!(?err, "Audio stream error");
                    device_lost_err.store(true, Ordering::Release);
                },
                None,
            ),
            _ => {
                return Err(DomainError::DeviceUnavailable(format!(
                    "Unsupported sample format: {:?}",
                    sample_format
                )));
            }
        }
        .map_err(|e| DomainError::DeviceUnavailable(format!("Failed to build stream: {}", e)))?;

        Ok(stream)
    }

    fn process_samples(
        data: &[f32],
        channels: usize,
        device_sample_rate: u32,
        target_sample_rate: u32,
        producer: &mut RingProducer,
    ) {
        // Convert stereo to mono
        let mono_samples: Vec<f32> = if channels > 1 {
            data.chunks(channels)
                .map(|chunk| chunk.iter().sum::<f32>() / channels as f32)
                .collect()
        } else {
            data.to_vec()
        };

        // Resample if needed
        let resampled = if device_sample_rate != target_sample_rate {
            resample(&mono_samples, device_sample_rate, target_sample_rate)
        } else {
            mono_samples
        };

        // Write to ring buffer. When the capture thread has fallen further
        // behind than the ring window, the newest samples are dropped here.
        let written = producer.push_slice(&resampled);
        if written < resampled.len() {
            debug!(
                dropped = resampled.len() - written,
                "Capture ring full, dropping samples"
            );
        }
    }

    pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
        if from_rate == to_rate || samples.is_empty() {
            return samples.to_vec();
        }

        let ratio = from_rate as f64 / to_rate as f64;
        let output_len = (samples.len() as f64 / ratio).ceil() as usize;
        let mut output = Vec::with_capacity(output_len);

        for i in 0..output_len {
            let src_pos = i as f64 * ratio;
            let src_idx = src_pos.floor() as usize;
            let frac = src_pos.fract();

            let sample = if src_idx + 1 < samples.len() {
                let s0 = samples[src_idx] as f64;
                let s1 = samples[src_idx + 1] as f64;
                (s0 + (s1 - s0) * frac) as f32
            } else if src_idx < samples.len() {
                samples[src_idx]
            } else {
                0.0
            };
            output.push(sample);
        }
        output
    }
}

/// Stream thread runner - creates the cpal Stream on its own thread.
///
/// The Stream is not Send, so it lives here for the whole capture session
/// and is dropped when the shutdown command arrives.
fn stream_thread_main(
    config: AudioSourceConfig,
    producer: RingProducer,
    device_lost: Arc<AtomicBool>,
    ready: oneshot::Sender<Result<(), DomainError>>,
    mut shutdown_rx: mpsc::Receiver<()>,
) {
    let result = (|| -> Result<Stream, DomainError> {
        let device = audio_processing::get_device(config.device_id.as_deref())?;
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        let stream_config = audio_processing::build_stream_config(&device)?;

        let sample_format = device
            .default_input_config()
            .map_err(|e| DomainError::DeviceUnavailable(format!("Failed to get config: {}", e)))?
            .sample_format();

        let stream = audio_processing::build_stream(
            &device,
            &stream_config,
            sample_format,
            config.sample_rate,
            producer,
            device_lost,
        )?;

        stream
            .play()
            .map_err(|e| DomainError::DeviceUnavailable(format!("Failed to start stream: {}", e)))?;

        info!(device = %device_name, "Capture stream opened");
        Ok(stream)
    })();

    match result {
        Ok(stream) => {
            let _ = ready.send(Ok(()));
            // Hold the stream until the owning chunk stream closes.
            let _ = shutdown_rx.blocking_recv();
            drop(stream);
            debug!("Capture stream thread shutting down");
        }
        Err(e) => {
            let _ = ready.send(Err(e));
        }
    }
}

/// cpal-based microphone source.
///
/// `open` hands the non-Send cpal Stream to a dedicated stream thread and
/// returns a chunk stream that pops fixed-size batches from the shared ring.
/// The source holds the hardware input exclusively: a second `open` before
/// the first stream is closed fails with `DeviceBusy`.
pub struct CpalAudioSource {
    busy: Arc<AtomicBool>,
}

impl CpalAudioSource {
    pub fn new() -> Self {
        Self {
            busy: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl Default for CpalAudioSource {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSource for CpalAudioSource {
    fn open(&self, config: &AudioSourceConfig) -> Result<Box<dyn AudioChunkStream>, DomainError> {
        if self.busy.swap(true, Ordering::AcqRel) {
            return Err(DomainError::DeviceBusy);
        }

        let chunk_samples = config.chunk_samples();
        let capacity = config.ring_capacity().max(chunk_samples * 4);
        let ring = HeapRb::<f32>::new(capacity);
        let (producer, consumer) = ring.split();

        let device_lost = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let thread_config = config.clone();
        let thread_device_lost = Arc::clone(&device_lost);

        let handle = thread::Builder::new()
            .name("audio-stream".to_string())
            .spawn(move || {
                stream_thread_main(
                    thread_config,
                    producer,
                    thread_device_lost,
                    ready_tx,
                    shutdown_rx,
                )
            })
            .map_err(|e| {
                self.busy.store(false, Ordering::Release);
                DomainError::DeviceUnavailable(format!("Failed to spawn stream thread: {}", e))
            })?;

        match ready_rx.blocking_recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = handle.join();
                self.busy.store(false, Ordering::Release);
                return Err(e);
            }
            Err(_) => {
                let _ = handle.join();
                self.busy.store(false, Ordering::Release);
                return Err(DomainError::DeviceUnavailable(
                    "Stream thread exited before opening".to_string(),
                ));
            }
        }

        Ok(Box::new(CpalChunkStream {
            consumer,
            chunk_samples,
            poll_interval: Duration::from_millis((config.chunk_ms as u64 / 4).max(5)),
            device_lost,
            shutdown_tx: Some(shutdown_tx),
            thread_handle: Some(handle),
            busy: Arc::clone(&self.busy),
        }))
    }
}

/// Chunk stream backed by the capture ring.
struct CpalChunkStream {
    consumer: RingConsumer,
    chunk_samples: usize,
    poll_interval: Duration,
    device_lost: Arc<AtomicBool>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    thread_handle: Option<JoinHandle<()>>,
    busy: Arc<AtomicBool>,
}

impl AudioChunkStream for CpalChunkStream {
    fn read_chunk(&mut self) -> Result<SampleBatch, DomainError> {
        if self.shutdown_tx.is_none() {
            return Err(DomainError::DeviceDisconnected("Stream closed".to_string()));
        }

        let mut batch = Vec::with_capacity(self.chunk_samples);
        let mut staging = vec![0.0f32; self.chunk_samples];

        loop {
            let need = self.chunk_samples - batch.len();
            let read = self.consumer.pop_slice(&mut staging[..need]);
            batch.extend_from_slice(&staging[..read]);

            if batch.len() == self.chunk_samples {
                return Ok(batch);
            }

            if self.device_lost.load(Ordering::Acquire) {
                return Err(DomainError::DeviceDisconnected(
                    "Audio driver reported a stream error".to_string(),
                ));
            }

            // Driven by the driver callback cadence; wait for the ring to fill.
            thread::sleep(self.poll_interval);
        }
    }

    fn close(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.blocking_send(());
        }
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
        self.busy.store(false, Ordering::Release);
    }
}

impl Drop for CpalChunkStream {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resample_same_rate() {
        let samples = vec![0.1, 0.2, 0.3, 0.4];
        let result = audio_processing::resample(&samples, 48000, 48000);
        assert_eq!(result, samples);
    }

    #[test]
    fn test_resample_downsample() {
        let samples: Vec<f32> = (0..48).map(|i| i as f32 / 48.0).collect();
        let result = audio_processing::resample(&samples, 48000, 16000);
        assert!(result.len() >= 15 && result.len() <= 17);
    }

    #[test]
    fn test_resample_upsample() {
        let samples = vec![0.0, 0.25, 0.5, 0.75];
        let result = audio_processing::resample(&samples, 8000, 16000);
        assert!(result.len() >= 7 && result.len() <= 9);
        // Interpolated midpoints stay between their neighbors
        for window in result.windows(2) {
            assert!(window[1] >= window[0] - 1e-6);
        }
    }

    #[test]
    fn test_second_open_is_busy() {
        let source = CpalAudioSource::new();
        // Simulate a held device without touching real hardware.
        source.busy.store(true, Ordering::Release);
        let err = source.open(&AudioSourceConfig::default()).err();
        assert!(matches!(err, Some(DomainError::DeviceBusy)));
    }
}
