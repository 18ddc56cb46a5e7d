// Melody types - notes, meters, and generated melodies

pub mod generator;

use serde::{Deserialize, Serialize};

use crate::theory::{pitch_name_to_frequency, NoteDuration, PitchError};

pub use generator::{MelodyGenerator, DEFAULT_MELODY_LENGTH};

/// A single pitch event: a pitch name in scientific notation plus a
/// symbolic duration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// Pitch name, e.g. "C4" or "F#3"
    pub pitch_name: String,

    /// Symbolic duration (quarter note = 1 beat)
    pub duration: NoteDuration,
}

impl Note {
    /// Create a note, validating the pitch name against the
    /// `[A-G][#b]?[0-9]+` grammar
    pub fn new(pitch_name: impl Into<String>, duration: NoteDuration) -> Result<Self, PitchError> {
        let pitch_name = pitch_name.into();
        pitch_name_to_frequency(&pitch_name)?;
        Ok(Note {
            pitch_name,
            duration,
        })
    }

    /// Frequency of this note in Hz
    pub fn frequency_hz(&self) -> Result<f64, PitchError> {
        pitch_name_to_frequency(&self.pitch_name)
    }
}

/// Musical meter
///
/// The meter constrains how a renderer groups notes into measures. Melody
/// generation currently treats it as descriptive only (see
/// `MelodyGenerator::generate`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Meter {
    /// 4/4 time - 4 quarter-note beats per measure
    FourFour,

    /// 3/4 time - 3 quarter-note beats per measure
    ThreeFour,

    /// 6/8 time - 6 eighth-note beats per measure
    SixEight,
}

impl Meter {
    /// Number of beat units per measure
    pub fn beats_per_measure(&self) -> u32 {
        match self {
            Meter::FourFour => 4,
            Meter::ThreeFour => 3,
            Meter::SixEight => 6,
        }
    }

    /// The note value that gets one beat (4 = quarter, 8 = eighth)
    pub fn beat_unit(&self) -> u32 {
        match self {
            Meter::FourFour | Meter::ThreeFour => 4,
            Meter::SixEight => 8,
        }
    }

    /// Parse a "4/4"-style string; unknown meters fall back to 4/4
    pub fn from_string(s: &str) -> Self {
        match s {
            "4/4" => Meter::FourFour,
            "3/4" => Meter::ThreeFour,
            "6/8" => Meter::SixEight,
            _ => Meter::FourFour,
        }
    }

    /// "4/4"-style string representation
    pub fn to_string(&self) -> &'static str {
        match self {
            Meter::FourFour => "4/4",
            Meter::ThreeFour => "3/4",
            Meter::SixEight => "6/8",
        }
    }
}

/// An ordered sequence of notes in performance order
///
/// A melody is immutable once generated; regenerating replaces it
/// wholesale rather than mutating in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Melody {
    notes: Vec<Note>,
}

impl Melody {
    pub fn new(notes: Vec<Note>) -> Self {
        Melody { notes }
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Total duration in beats (quarter note = 1 beat)
    pub fn total_beats(&self) -> f64 {
        self.notes.iter().map(|n| n.duration.beats()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_validates_pitch_name() {
        assert!(Note::new("C4", NoteDuration::Quarter).is_ok());
        assert!(Note::new("H4", NoteDuration::Quarter).is_err());
        assert!(Note::new("C", NoteDuration::Quarter).is_err());
    }

    #[test]
    fn test_meter_accessors() {
        assert_eq!(Meter::FourFour.beats_per_measure(), 4);
        assert_eq!(Meter::ThreeFour.beats_per_measure(), 3);
        assert_eq!(Meter::SixEight.beats_per_measure(), 6);
        assert_eq!(Meter::FourFour.beat_unit(), 4);
        assert_eq!(Meter::SixEight.beat_unit(), 8);
    }

    #[test]
    fn test_meter_string_round_trip() {
        for meter in [Meter::FourFour, Meter::ThreeFour, Meter::SixEight] {
            assert_eq!(Meter::from_string(meter.to_string()), meter);
        }
    }

    #[test]
    fn test_melody_total_beats() {
        let melody = Melody::new(vec![
            Note::new("C4", NoteDuration::Half).unwrap(),
            Note::new("D4", NoteDuration::Quarter).unwrap(),
            Note::new("E4", NoteDuration::Eighth).unwrap(),
        ]);
        assert_eq!(melody.total_beats(), 3.5);
    }
}
