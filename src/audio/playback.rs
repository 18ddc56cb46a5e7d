// Schedule playback using rodio
// Renders the scheduled notes as a mono tone sequence so the singer can
// hear the melody while the matcher listens

use std::time::Duration;

use rodio::source::Source;
use rodio::{OutputStream, OutputStreamHandle, Sink};
use thiserror::Error;

use crate::schedule::Schedule;

/// Output sample rate of the synthesized tone sequence
const SAMPLE_RATE: u32 = 44100;

/// Linear attack/release length in seconds, to avoid clicks at note edges
const EDGE_SECONDS: f32 = 0.01;

/// Peak amplitude of synthesized tones
const TONE_AMPLITUDE: f32 = 0.3;

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("Failed to open output device: {0}")]
    OutputDevice(String),

    #[error("Failed to create playback sink: {0}")]
    Sink(String),
}

/// One synthesized note span, in output samples relative to the first
/// onset
#[derive(Debug, Clone, Copy)]
struct Segment {
    start: usize,
    end: usize,
    frequency_hz: f32,
}

/// A rodio source that synthesizes a schedule as a sequence of sine
/// tones. Playback time zero is the schedule's first onset; each note
/// sounds until the next note's onset (the last until the schedule's
/// total duration).
pub struct ToneSequence {
    segments: Vec<Segment>,
    total_samples: usize,
    position: usize,
    current: usize,
}

impl ToneSequence {
    pub fn new(schedule: &Schedule) -> Self {
        let base = schedule
            .entries()
            .first()
            .map(|e| e.onset_time)
            .unwrap_or(0.0);

        let to_samples = |seconds: f64| (seconds * SAMPLE_RATE as f64).round() as usize;

        let mut segments = Vec::with_capacity(schedule.len());
        for (index, entry) in schedule.entries().iter().enumerate() {
            let start = to_samples(entry.onset_time - base);
            let duration = schedule.entry_duration(index).unwrap_or(0.0);
            segments.push(Segment {
                start,
                end: start + to_samples(duration),
                frequency_hz: entry.frequency_hz as f32,
            });
        }

        ToneSequence {
            segments,
            total_samples: to_samples(schedule.total_duration()),
            position: 0,
            current: 0,
        }
    }

    fn sample_at(&self, segment: &Segment) -> f32 {
        let offset = self.position - segment.start;
        let t = offset as f32 / SAMPLE_RATE as f32;

        let length = (segment.end - segment.start) as f32 / SAMPLE_RATE as f32;
        let edge = EDGE_SECONDS.min(length / 2.0);

        let mut envelope = 1.0;
        if edge > 0.0 {
            if t < edge {
                envelope = t / edge;
            }
            let remaining = length - t;
            if remaining < edge {
                envelope = envelope.min((remaining / edge).max(0.0));
            }
        }

        TONE_AMPLITUDE * envelope * (2.0 * std::f32::consts::PI * segment.frequency_hz * t).sin()
    }
}

impl Iterator for ToneSequence {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.position >= self.total_samples {
            return None;
        }

        while self.current < self.segments.len() && self.position >= self.segments[self.current].end
        {
            self.current += 1;
        }

        let value = match self.segments.get(self.current) {
            Some(segment) if self.position >= segment.start => self.sample_at(segment),
            _ => 0.0,
        };

        self.position += 1;
        Some(value)
    }
}

impl Source for ToneSequence {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(Duration::from_secs_f64(
            self.total_samples as f64 / SAMPLE_RATE as f64,
        ))
    }
}

/// Audible playback of schedules through the default output device
///
/// The player is the synthesis collaborator: it consumes the same
/// schedule the matcher reads, and nothing else. It is not `Send` (the
/// output stream is tied to its thread), so it lives with the component
/// that manages playback.
pub struct Player {
    _stream: OutputStream,
    handle: OutputStreamHandle,
    sink: Sink,
}

impl Player {
    /// Open the default output device
    pub fn new() -> Result<Self, PlaybackError> {
        let (stream, handle) =
            OutputStream::try_default().map_err(|e| PlaybackError::OutputDevice(e.to_string()))?;
        let sink = Sink::try_new(&handle).map_err(|e| PlaybackError::Sink(e.to_string()))?;

        Ok(Player {
            _stream: stream,
            handle,
            sink,
        })
    }

    /// Start playing a schedule, replacing anything currently sounding
    pub fn play(&mut self, schedule: &Schedule) -> Result<(), PlaybackError> {
        // A stopped sink cannot be restarted; build a fresh one per play
        self.sink.stop();
        self.sink =
            Sink::try_new(&self.handle).map_err(|e| PlaybackError::Sink(e.to_string()))?;
        self.sink.append(ToneSequence::new(schedule));
        self.sink.play();
        log::info!(
            "Playback started: {} notes, {:.2}s",
            schedule.len(),
            schedule.total_duration()
        );
        Ok(())
    }

    /// Stop playback immediately
    pub fn stop(&self) {
        self.sink.stop();
    }

    /// Whether the tone sequence is still sounding
    pub fn is_playing(&self) -> bool {
        !self.sink.empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::melody::{Melody, Note};
    use crate::schedule::build_schedule;
    use crate::theory::NoteDuration;

    fn one_second_schedule() -> Schedule {
        let melody = Melody::new(vec![
            Note::new("A4", NoteDuration::Quarter).unwrap(),
            Note::new("A5", NoteDuration::Quarter).unwrap(),
        ]);
        // 120 BPM quarter = 0.5 s per note
        build_schedule(&melody, 120.0, 0.0).unwrap()
    }

    #[test]
    fn test_sequence_length_matches_schedule() {
        let sequence = ToneSequence::new(&one_second_schedule());
        let samples: Vec<f32> = sequence.collect();
        assert_eq!(samples.len(), SAMPLE_RATE as usize);
    }

    #[test]
    fn test_sequence_is_audible_mid_note() {
        let samples: Vec<f32> = ToneSequence::new(&one_second_schedule()).collect();

        // Peak level within the middle of the first note
        let mid = &samples[10_000..12_000];
        let peak = mid.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
        assert!(peak > 0.25, "peak was {}", peak);
    }

    #[test]
    fn test_note_edges_are_enveloped() {
        let samples: Vec<f32> = ToneSequence::new(&one_second_schedule()).collect();

        // The very first sample starts the attack ramp at zero
        assert!(samples[0].abs() < 1e-6);

        // The final release ramps back toward zero
        let tail = &samples[samples.len() - 10..];
        for s in tail {
            assert!(s.abs() < 0.05, "tail sample {} not enveloped", s);
        }
    }

    #[test]
    fn test_empty_schedule_produces_no_samples() {
        let schedule = build_schedule(&Melody::new(Vec::new()), 120.0, 0.0).unwrap();
        let samples: Vec<f32> = ToneSequence::new(&schedule).collect();
        assert!(samples.is_empty());
    }

    #[test]
    fn test_source_metadata() {
        let sequence = ToneSequence::new(&one_second_schedule());
        assert_eq!(sequence.channels(), 1);
        assert_eq!(sequence.sample_rate(), SAMPLE_RATE);
        assert_eq!(sequence.total_duration(), Some(Duration::from_secs(1)));
    }
}
