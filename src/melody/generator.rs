// Random melody generation
// Samples pitch names and durations independently from fixed pools

use std::time::{SystemTime, UNIX_EPOCH};

use oorandom::Rand64;

use crate::theory::NoteDuration;

use super::{Melody, Meter, Note};

/// Default number of notes per generated melody
pub const DEFAULT_MELODY_LENGTH: usize = 8;

/// Fixed pitch pool for generated melodies, centered on the treble staff.
/// F4 and G4 appear twice, so sampling is biased toward the middle of the
/// staff.
const NOTE_POOL: [&str; 12] = [
    "C4", "D4", "E4", "F4", "G4", "A4", "B4", "C5", "E5", "G4", "A3", "F4",
];

/// Fixed duration vocabulary for generated melodies
const DURATION_POOL: [NoteDuration; 3] = [
    NoteDuration::Quarter,
    NoteDuration::Eighth,
    NoteDuration::Half,
];

/// Random melody generator
///
/// Each generated note samples a pitch from `NOTE_POOL` and a duration
/// from `DURATION_POOL`, uniformly and independently per position. Notes
/// are never rejected for range or repetition.
pub struct MelodyGenerator {
    rng: Rand64,
}

impl MelodyGenerator {
    /// Create a generator seeded from the system clock
    pub fn new() -> Self {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        Self::with_seed(seed)
    }

    /// Create a generator with an explicit seed, for reproducible output
    pub fn with_seed(seed: u128) -> Self {
        MelodyGenerator {
            rng: Rand64::new(seed),
        }
    }

    /// Generate a melody of `length` notes.
    ///
    /// The meter is descriptive only: the total beat count of the result
    /// is not constrained to fit any number of measures. A renderer that
    /// groups notes into measures must handle overflow itself.
    pub fn generate(&mut self, length: usize, _meter: Meter) -> Melody {
        let mut notes = Vec::with_capacity(length);

        for _ in 0..length {
            let pitch_name = NOTE_POOL[self.rng.rand_range(0..NOTE_POOL.len() as u64) as usize];
            let duration = DURATION_POOL[self.rng.rand_range(0..DURATION_POOL.len() as u64) as usize];

            // Pool entries are valid pitch names by construction (see
            // test_note_pool_is_valid), so no validation error can occur.
            notes.push(Note {
                pitch_name: pitch_name.to_string(),
                duration,
            });
        }

        Melody::new(notes)
    }

    /// Generate a melody with the default length
    pub fn generate_default(&mut self, meter: Meter) -> Melody {
        self.generate(DEFAULT_MELODY_LENGTH, meter)
    }
}

impl Default for MelodyGenerator {
    fn default() -> Self {
        Self::new()
    }
}
