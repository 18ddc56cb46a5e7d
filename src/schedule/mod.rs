// Playback schedule construction
// Converts a melody and tempo into absolute note onset times

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::melody::Melody;
use crate::theory::{pitch_name_to_frequency, PitchError};

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("Invalid tempo: {0} BPM (must be a positive, finite number)")]
    InvalidTempo(f64),

    #[error(transparent)]
    Pitch(#[from] PitchError),
}

/// One scheduled note: when it starts, what frequency it sounds at, and
/// which melody position it came from
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    /// Absolute onset time in seconds on the session clock
    pub onset_time: f64,

    /// Target frequency in Hz; always > 0 by construction
    pub frequency_hz: f64,

    /// Index of the source note within the melody
    pub note_index: usize,
}

/// Time-ordered playback schedule derived from a melody and a tempo
///
/// Entries are onset-ascending by construction: melody order is monotonic
/// in time because durations are positive. A schedule lives for one
/// playback session and is replaced wholesale when a new session starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    entries: Vec<ScheduleEntry>,
    total_duration: f64,
}

impl Schedule {
    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total melody duration in seconds, measured from the schedule's
    /// start time. Used to schedule end-of-playback teardown.
    pub fn total_duration(&self) -> f64 {
        self.total_duration
    }

    /// Playback duration of the entry at `index` in seconds: the gap to
    /// the next onset, or the remainder of the schedule for the last note
    pub fn entry_duration(&self, index: usize) -> Option<f64> {
        let entry = self.entries.get(index)?;
        let start_time = self.entries.first()?.onset_time;
        let end = match self.entries.get(index + 1) {
            Some(next) => next.onset_time,
            None => start_time + self.total_duration,
        };
        Some(end - entry.onset_time)
    }
}

/// Build a playback schedule from a melody.
///
/// Walks the melody once, accumulating onset times: each note lasts
/// `duration_beats * 60 / tempo_bpm` seconds, and the first note starts
/// at `start_time`. Each entry's frequency comes from its pitch name; a
/// malformed name fails the whole build rather than producing a partial
/// schedule.
pub fn build_schedule(
    melody: &Melody,
    tempo_bpm: f64,
    start_time: f64,
) -> Result<Schedule, ScheduleError> {
    if !tempo_bpm.is_finite() || tempo_bpm <= 0.0 {
        return Err(ScheduleError::InvalidTempo(tempo_bpm));
    }

    let seconds_per_beat = 60.0 / tempo_bpm;
    let mut entries = Vec::with_capacity(melody.len());
    let mut cumulative_seconds = 0.0;

    for (note_index, note) in melody.notes().iter().enumerate() {
        let frequency_hz = pitch_name_to_frequency(&note.pitch_name)?;

        entries.push(ScheduleEntry {
            onset_time: start_time + cumulative_seconds,
            frequency_hz,
            note_index,
        });

        cumulative_seconds += note.duration.beats() * seconds_per_beat;
    }

    Ok(Schedule {
        entries,
        total_duration: cumulative_seconds,
    })
}
