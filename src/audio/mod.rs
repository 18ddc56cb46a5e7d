// Audio I/O: microphone capture, pitch estimation, schedule playback

pub mod capture;
pub mod pitch;
pub mod playback;

pub use capture::{CaptureConfig, CaptureError, MicCapture};
pub use pitch::{DetectorConfig, PitchDetector, PitchEstimate};
pub use playback::{Player, PlaybackError, ToneSequence};

use crate::matcher::DetectionSample;
use crate::session::PitchSource;

/// Live microphone pitch source: capture plus detection, one detection
/// sample per poll
///
/// Applies the detector's clarity and power thresholds itself, so frames
/// it rejects arrive at the matcher as samples with no frequency; the
/// matcher never re-implements that policy.
pub struct MicPitchSource {
    capture: MicCapture,
    detector: PitchDetector,
    scratch: Vec<f32>,
}

impl MicPitchSource {
    /// Open the default input device and prepare a detector matched to
    /// its sample rate
    pub fn open(config: CaptureConfig) -> Result<Self, CaptureError> {
        Self::open_with_detector_config(config, DetectorConfig::default())
    }

    /// Open with custom detection thresholds
    pub fn open_with_detector_config(
        config: CaptureConfig,
        detector_config: DetectorConfig,
    ) -> Result<Self, CaptureError> {
        let capture = MicCapture::start(config)?;
        let detector = PitchDetector::with_config(
            config.window_size,
            capture.sample_rate() as f32,
            detector_config,
        );

        Ok(MicPitchSource {
            capture,
            detector,
            scratch: Vec::with_capacity(config.window_size),
        })
    }
}

impl PitchSource for MicPitchSource {
    fn poll(&mut self, now: f64) -> Option<DetectionSample> {
        if !self.capture.latest_window(&mut self.scratch) {
            // No full analysis window captured yet
            return None;
        }

        let sample = match self.detector.detect(&self.scratch) {
            Some(estimate) => DetectionSample {
                captured_at: now,
                frequency_hz: Some(estimate.frequency_hz),
                clarity: estimate.clarity,
            },
            None => DetectionSample {
                captured_at: now,
                frequency_hz: None,
                clarity: 0.0,
            },
        };

        Some(sample)
    }
}
