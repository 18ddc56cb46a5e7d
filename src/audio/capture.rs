// Native microphone capture using cpal
// Keeps only the newest analysis window of mono samples; older audio is
// discarded, never queued

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Sample, SampleFormat};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("No input device available")]
    NoInputDevice,
    #[error("Failed to get default input config: {0}")]
    ConfigError(String),
    #[error("Failed to build input stream: {0}")]
    StreamError(String),
    #[error("Capture worker did not start")]
    WorkerStartup,
}

/// Capture configuration
#[derive(Debug, Clone, Copy)]
pub struct CaptureConfig {
    /// Analysis window length in mono samples. 2048 at 44.1 kHz is
    /// ~46 ms, enough for pitches down to ~50 Hz.
    pub window_size: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        CaptureConfig { window_size: 2048 }
    }
}

struct CaptureShared {
    /// Newest `window_size` mono samples, oldest first
    window: Mutex<Vec<f32>>,
    sample_rate: Mutex<u32>,
    window_size: usize,
}

impl CaptureShared {
    /// Append mono samples, dropping the oldest past the window size.
    /// Newest-buffer-wins: an analysis consumer always sees the most
    /// recent audio, never a backlog.
    fn push(&self, mono: impl Iterator<Item = f32>) {
        let mut window = self.window.lock().unwrap();
        window.extend(mono);
        let excess = window.len().saturating_sub(self.window_size);
        if excess > 0 {
            window.drain(..excess);
        }
    }
}

/// Live microphone capture
///
/// The cpal stream is created and owned by a worker thread (streams are
/// not `Send`); the owner communicates through shared state, following
/// the same pattern as a recording worker. `stop` signals the worker,
/// joins it, and returns only after the stream has been dropped and the
/// device released.
pub struct MicCapture {
    shared: Arc<CaptureShared>,
    stop_signal: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    sample_rate: u32,
}

impl MicCapture {
    /// Open the default input device and start capturing
    pub fn start(config: CaptureConfig) -> Result<Self, CaptureError> {
        let shared = Arc::new(CaptureShared {
            window: Mutex::new(Vec::with_capacity(config.window_size)),
            sample_rate: Mutex::new(0),
            window_size: config.window_size,
        });
        let stop_signal = Arc::new(AtomicBool::new(false));

        let worker_shared = Arc::clone(&shared);
        let worker_stop = Arc::clone(&stop_signal);
        let (ready_tx, ready_rx) = mpsc::channel();

        let worker = thread::spawn(move || {
            match build_stream(&worker_shared) {
                Ok(stream) => {
                    let sample_rate = *worker_shared.sample_rate.lock().unwrap();
                    if ready_tx.send(Ok(sample_rate)).is_err() {
                        return;
                    }
                    // Keep the stream alive until asked to stop
                    while !worker_stop.load(Ordering::SeqCst) {
                        thread::sleep(Duration::from_millis(20));
                    }
                    drop(stream);
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            }
        });

        let sample_rate = match ready_rx.recv() {
            Ok(Ok(rate)) => rate,
            Ok(Err(e)) => {
                let _ = worker.join();
                return Err(e);
            }
            Err(_) => {
                let _ = worker.join();
                return Err(CaptureError::WorkerStartup);
            }
        };

        log::info!("Microphone capture started at {} Hz", sample_rate);

        Ok(MicCapture {
            shared,
            stop_signal,
            worker: Some(worker),
            sample_rate,
        })
    }

    /// Sample rate of the input device in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Copy the newest analysis window into `out`. Returns `false` until
    /// a full window has been captured.
    pub fn latest_window(&self, out: &mut Vec<f32>) -> bool {
        let window = self.shared.window.lock().unwrap();
        if window.len() < self.shared.window_size {
            return false;
        }
        out.clear();
        out.extend_from_slice(&window);
        true
    }

    /// Stop capturing and release the input device. Synchronous: the
    /// worker is joined before this returns.
    pub fn stop(&mut self) {
        self.stop_signal.store(true, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
            log::info!("Microphone capture stopped");
        }
    }
}

impl Drop for MicCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Build the cpal input stream on the calling (worker) thread
fn build_stream(shared: &Arc<CaptureShared>) -> Result<cpal::Stream, CaptureError> {
    let host = cpal::default_host();

    let device = host
        .default_input_device()
        .ok_or(CaptureError::NoInputDevice)?;

    let config = device
        .default_input_config()
        .map_err(|e| CaptureError::ConfigError(e.to_string()))?;

    *shared.sample_rate.lock().unwrap() = config.sample_rate().0;
    let channels = config.channels() as usize;

    let err_fn = |err| log::error!("Capture stream error: {}", err);

    let stream = match config.sample_format() {
        SampleFormat::F32 => {
            let shared = Arc::clone(shared);
            device.build_input_stream(
                &config.into(),
                move |data: &[f32], _: &_| {
                    shared.push(downmix(data, channels));
                },
                err_fn,
                None,
            )
        }
        SampleFormat::I16 => {
            let shared = Arc::clone(shared);
            device.build_input_stream(
                &config.into(),
                move |data: &[i16], _: &_| {
                    let floats: Vec<f32> = data.iter().map(|&s| s.to_float_sample()).collect();
                    shared.push(downmix(&floats, channels));
                },
                err_fn,
                None,
            )
        }
        SampleFormat::U16 => {
            let shared = Arc::clone(shared);
            device.build_input_stream(
                &config.into(),
                move |data: &[u16], _: &_| {
                    let floats: Vec<f32> = data.iter().map(|&s| s.to_float_sample()).collect();
                    shared.push(downmix(&floats, channels));
                },
                err_fn,
                None,
            )
        }
        _ => {
            return Err(CaptureError::ConfigError(
                "Unsupported sample format".to_string(),
            ))
        }
    }
    .map_err(|e| CaptureError::StreamError(e.to_string()))?;

    stream
        .play()
        .map_err(|e| CaptureError::StreamError(e.to_string()))?;

    Ok(stream)
}

/// Average interleaved channels down to mono
fn downmix(data: &[f32], channels: usize) -> impl Iterator<Item = f32> + '_ {
    data.chunks(channels.max(1))
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_shared(window_size: usize) -> CaptureShared {
        CaptureShared {
            window: Mutex::new(Vec::new()),
            sample_rate: Mutex::new(44100),
            window_size,
        }
    }

    #[test]
    fn test_downmix_stereo() {
        let stereo = [0.1, 0.3, 0.2, 0.4];
        let mono: Vec<f32> = downmix(&stereo, 2).collect();
        assert_eq!(mono.len(), 2);
        assert!((mono[0] - 0.2).abs() < 1e-6);
        assert!((mono[1] - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_downmix_mono_passthrough() {
        let mono_in = [0.5, -0.5];
        let mono: Vec<f32> = downmix(&mono_in, 1).collect();
        assert_eq!(mono, vec![0.5, -0.5]);
    }

    #[test]
    fn test_window_keeps_newest_samples() {
        let shared = test_shared(4);

        shared.push([1.0, 2.0, 3.0].into_iter());
        assert_eq!(*shared.window.lock().unwrap(), vec![1.0, 2.0, 3.0]);

        shared.push([4.0, 5.0, 6.0].into_iter());
        // Oldest two samples dropped, newest four kept
        assert_eq!(*shared.window.lock().unwrap(), vec![3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_oversized_chunk_keeps_tail() {
        let shared = test_shared(3);
        shared.push((0..10).map(|i| i as f32));
        assert_eq!(*shared.window.lock().unwrap(), vec![7.0, 8.0, 9.0]);
    }
}
