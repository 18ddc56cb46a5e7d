// Monophonic pitch detection
// Implements the McLeod Pitch Method (MPM): autocorrelation via real FFT,
// normalized square difference function (NSDF), and key-maximum picking

use realfft::num_complex::Complex;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use std::sync::Arc;

/// Fraction of the tallest NSDF key maximum a peak must reach to be
/// chosen; picking the first peak above this avoids octave errors
const PEAK_THRESHOLD: f32 = 0.9;

/// An accepted pitch estimate for one analysis window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchEstimate {
    /// Detected fundamental frequency in Hz
    pub frequency_hz: f64,

    /// NSDF value at the chosen peak, clamped to [0.0, 1.0].
    /// 1.0 means the window is a pure tone.
    pub clarity: f32,
}

/// Detection thresholds
#[derive(Debug, Clone, Copy)]
pub struct DetectorConfig {
    /// Minimum clarity for a window to count as a tone
    pub clarity_threshold: f32,

    /// Minimum RMS level; quieter windows are treated as silence
    pub power_threshold: f32,

    /// Plausible vocal range in Hz; estimates outside it are rejected
    pub min_frequency_hz: f32,
    pub max_frequency_hz: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        DetectorConfig {
            clarity_threshold: 0.85,
            power_threshold: 0.005,
            min_frequency_hz: 50.0,
            max_frequency_hz: 1500.0,
        }
    }
}

/// MPM pitch detector
///
/// FFT plans and analysis buffers are allocated once and reused across
/// frames, keeping per-frame work suitable for a real-time loop.
pub struct PitchDetector {
    window_size: usize,
    padded_size: usize,
    sample_rate: f32,
    config: DetectorConfig,
    forward: Arc<dyn RealToComplex<f32>>,
    inverse: Arc<dyn ComplexToReal<f32>>,
    input: Vec<f32>,
    padded: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
    autocorr: Vec<f32>,
    nsdf: Vec<f32>,
}

impl PitchDetector {
    pub fn new(window_size: usize, sample_rate: f32) -> Self {
        Self::with_config(window_size, sample_rate, DetectorConfig::default())
    }

    pub fn with_config(window_size: usize, sample_rate: f32, config: DetectorConfig) -> Self {
        // Zero padding to twice the window length makes the circular FFT
        // autocorrelation equal to the linear one
        let padded_size = window_size * 2;
        let mut planner = RealFftPlanner::<f32>::new();
        let forward = planner.plan_fft_forward(padded_size);
        let inverse = planner.plan_fft_inverse(padded_size);

        let spectrum = forward.make_output_vec();
        PitchDetector {
            window_size,
            padded_size,
            sample_rate,
            config,
            forward,
            inverse,
            input: vec![0.0; window_size],
            padded: vec![0.0; padded_size],
            spectrum,
            autocorr: vec![0.0; padded_size],
            nsdf: vec![0.0; window_size],
        }
    }

    /// Analyze one window of mono samples. Returns `None` for silence,
    /// non-tonal content below the clarity threshold, or a fundamental
    /// outside the configured frequency range.
    pub fn detect(&mut self, samples: &[f32]) -> Option<PitchEstimate> {
        if samples.len() < self.window_size {
            return None;
        }

        let n = self.window_size;
        self.input.copy_from_slice(&samples[..n]);

        let rms = (self.input.iter().map(|s| s * s).sum::<f32>() / n as f32).sqrt();
        if rms < self.config.power_threshold {
            return None;
        }

        self.compute_nsdf().ok()?;

        let (lag, clarity) = pick_peak(&self.nsdf)?;
        let clarity = clarity.clamp(0.0, 1.0);
        if clarity < self.config.clarity_threshold {
            return None;
        }

        let frequency_hz = self.sample_rate / lag;
        if frequency_hz < self.config.min_frequency_hz
            || frequency_hz > self.config.max_frequency_hz
        {
            return None;
        }

        Some(PitchEstimate {
            frequency_hz: frequency_hz as f64,
            clarity,
        })
    }

    /// Fill `self.nsdf` for lags `0..window_size`.
    ///
    /// The autocorrelation `r` comes from the FFT (forward, power
    /// spectrum, inverse); the normalization term `m` is computed with
    /// the incremental scheme from the MPM paper:
    /// `m[0] = 2 r[0]`, `m[t] = m[t-1] - x[t-1]^2 - x[n-t]^2`.
    fn compute_nsdf(&mut self) -> Result<(), realfft::FftError> {
        let n = self.window_size;

        self.padded[..n].copy_from_slice(&self.input);
        self.padded[n..].fill(0.0);

        self.forward.process(&mut self.padded, &mut self.spectrum)?;
        for bin in self.spectrum.iter_mut() {
            *bin = Complex::new(bin.norm_sqr(), 0.0);
        }
        self.inverse.process(&mut self.spectrum, &mut self.autocorr)?;

        // The inverse transform is unnormalized; rescale so that
        // autocorr[0] equals the window's energy
        let scale = 1.0 / self.padded_size as f32;
        for value in self.autocorr.iter_mut().take(n) {
            *value *= scale;
        }

        let mut m = 2.0 * self.autocorr[0];
        self.nsdf[0] = if m > f32::EPSILON { 1.0 } else { 0.0 };
        for lag in 1..n {
            m -= self.input[lag - 1].powi(2) + self.input[n - lag].powi(2);
            self.nsdf[lag] = if m > f32::EPSILON {
                2.0 * self.autocorr[lag] / m
            } else {
                0.0
            };
        }

        Ok(())
    }
}

/// Pick the pitch-period peak of an NSDF curve.
///
/// Collects the key maxima (the largest value between each pair of
/// positive zero crossings after the zero-lag lobe), then chooses the
/// first one reaching `PEAK_THRESHOLD` of the tallest. The winning lag
/// is refined with parabolic interpolation. Returns `(lag, clarity)`.
fn pick_peak(nsdf: &[f32]) -> Option<(f32, f32)> {
    let len = nsdf.len();
    if len < 3 {
        return None;
    }

    // Descend the zero-lag lobe to the first negative-going crossing
    let mut lag = 1;
    while lag < len && nsdf[lag] > 0.0 {
        lag += 1;
    }

    let mut key_maxima: Vec<(usize, f32)> = Vec::new();
    let mut current: Option<(usize, f32)> = None;

    while lag < len {
        let value = nsdf[lag];
        if value > 0.0 {
            match current {
                Some((_, best)) if best >= value => {}
                _ => current = Some((lag, value)),
            }
        } else if let Some(max) = current.take() {
            key_maxima.push(max);
        }
        lag += 1;
    }
    if let Some(max) = current.take() {
        key_maxima.push(max);
    }

    let tallest = key_maxima
        .iter()
        .map(|&(_, v)| v)
        .fold(f32::MIN, f32::max);
    if key_maxima.is_empty() || tallest <= 0.0 {
        return None;
    }

    let (peak_lag, _) = *key_maxima
        .iter()
        .find(|&&(_, v)| v >= PEAK_THRESHOLD * tallest)?;

    Some(refine_peak(nsdf, peak_lag))
}

/// Parabolic interpolation through a peak and its neighbors; returns the
/// refined fractional lag and the interpolated peak value
fn refine_peak(nsdf: &[f32], peak: usize) -> (f32, f32) {
    if peak == 0 || peak + 1 >= nsdf.len() {
        return (peak as f32, nsdf[peak]);
    }

    let left = nsdf[peak - 1];
    let center = nsdf[peak];
    let right = nsdf[peak + 1];

    let denom = left - 2.0 * center + right;
    if denom.abs() < f32::EPSILON {
        return (peak as f32, center);
    }

    let offset = 0.5 * (left - right) / denom;
    let refined_value = center - 0.25 * (left - right) * offset;
    (peak as f32 + offset, refined_value)
}
