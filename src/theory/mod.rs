// Music theory primitives
// Pitch-name parsing, frequency conversion, cents, and note durations

pub mod duration;
pub mod pitch;

pub use duration::NoteDuration;
pub use pitch::{cents_difference, pitch_name_to_frequency, PitchError, A4_FREQUENCY_HZ};
