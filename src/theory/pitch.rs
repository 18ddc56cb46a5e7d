// Pitch-name parsing and frequency conversion
// Maps scientific pitch notation to equal-temperament frequencies
// and compares two frequencies on the cents scale

use thiserror::Error;

/// Reference tuning: A4 in equal temperament.
pub const A4_FREQUENCY_HZ: f64 = 440.0;

/// Absolute semitone number of A4 when C0 is semitone 0 (4*12 + 9).
const A4_SEMITONE: i32 = 57;

#[derive(Debug, Error)]
pub enum PitchError {
    #[error("Invalid pitch name: {0}")]
    InvalidPitchName(String),
}

/// Semitone offset of a pitch class within its octave (C = 0 ... B = 11)
/// Sharps and flats collapse to the same semitone as their enharmonic
/// neighbor (C# == Db, D# == Eb, ...)
fn pitch_class_semitone(letter: char, accidental: Option<char>) -> Option<i32> {
    let natural = match letter {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };

    match accidental {
        None => Some(natural),
        Some('#') => Some(natural + 1),
        Some('b') => Some(natural - 1),
        Some(_) => None,
    }
}

/// Convert a pitch name in scientific notation (e.g. "C4", "F#3", "Bb5")
/// to its equal-temperament frequency in Hz.
///
/// The grammar is `[A-G][#b]?[0-9]+`; the letter is accepted in either
/// case. Anything else fails with `InvalidPitchName`. The result is
/// strictly positive for every valid name.
pub fn pitch_name_to_frequency(name: &str) -> Result<f64, PitchError> {
    let invalid = || PitchError::InvalidPitchName(name.to_string());

    let mut chars = name.chars();
    let letter = chars
        .next()
        .map(|c| c.to_ascii_uppercase())
        .ok_or_else(invalid)?;

    let rest: &str = chars.as_str();
    let (accidental, octave_digits) = match rest.chars().next() {
        Some(c @ ('#' | 'b')) => (Some(c), &rest[1..]),
        _ => (None, rest),
    };

    if octave_digits.is_empty() || !octave_digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }

    let octave: i32 = octave_digits.parse().map_err(|_| invalid())?;
    let offset = pitch_class_semitone(letter, accidental).ok_or_else(invalid)?;

    // Semitone number with C0 = 0; compare against A4 = 57
    let semitone = octave * 12 + offset;
    let semitone_diff = semitone - A4_SEMITONE;

    Ok(A4_FREQUENCY_HZ * 2.0_f64.powf(semitone_diff as f64 / 12.0))
}

/// Signed deviation of `measured_hz` from `target_hz` in cents
/// (1200 cents per octave). Positive means the measured pitch is sharp
/// relative to the target, negative means flat.
///
/// Returns `None` when either frequency is zero, negative, or not finite
/// (the two are not comparable). The result is never rounded; rounding
/// for display is a presentation concern.
pub fn cents_difference(measured_hz: f64, target_hz: f64) -> Option<f64> {
    if !(measured_hz > 0.0) || !(target_hz > 0.0) {
        return None;
    }
    if !measured_hz.is_finite() || !target_hz.is_finite() {
        return None;
    }

    Some(1200.0 * (measured_hz / target_hz).log2())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_a4_is_exactly_440() {
        assert_eq!(pitch_name_to_frequency("A4").unwrap(), 440.0);
    }

    #[test]
    fn test_octave_doubling_and_halving() {
        assert_eq!(pitch_name_to_frequency("A5").unwrap(), 880.0);
        assert_eq!(pitch_name_to_frequency("A3").unwrap(), 220.0);
    }

    #[test]
    fn test_known_frequencies() {
        let c4 = pitch_name_to_frequency("C4").unwrap();
        let d4 = pitch_name_to_frequency("D4").unwrap();
        assert!((c4 - 261.63).abs() < 0.01);
        assert!((d4 - 293.66).abs() < 0.01);
    }

    #[test]
    fn test_enharmonic_equivalents_collapse() {
        let c_sharp = pitch_name_to_frequency("C#4").unwrap();
        let d_flat = pitch_name_to_frequency("Db4").unwrap();
        assert!((c_sharp - d_flat).abs() < 1e-9);
    }

    #[test]
    fn test_lowercase_letter_accepted() {
        assert_eq!(pitch_name_to_frequency("a4").unwrap(), 440.0);
    }

    #[test]
    fn test_valid_names_are_positive() {
        for name in ["C0", "B9", "Cb1", "G#7", "A3"] {
            assert!(pitch_name_to_frequency(name).unwrap() > 0.0);
        }
    }

    #[test]
    fn test_invalid_names_rejected() {
        for name in ["H4", "C", "4C", "", "C#", "Cx4", "C-1", "C4b"] {
            assert!(
                pitch_name_to_frequency(name).is_err(),
                "expected {:?} to be rejected",
                name
            );
        }
    }

    #[test]
    fn test_cents_identical_frequencies() {
        assert_eq!(cents_difference(440.0, 440.0), Some(0.0));
        assert_eq!(cents_difference(123.4, 123.4), Some(0.0));
    }

    #[test]
    fn test_cents_octave_intervals() {
        let up = cents_difference(880.0, 440.0).unwrap();
        let down = cents_difference(440.0, 880.0).unwrap();
        assert!((up - 1200.0).abs() < 1e-9);
        assert!((down + 1200.0).abs() < 1e-9);
    }

    #[test]
    fn test_cents_sign_convention() {
        // Slightly sharp of A4
        assert!(cents_difference(442.0, 440.0).unwrap() > 0.0);
        // Slightly flat of A4
        assert!(cents_difference(438.0, 440.0).unwrap() < 0.0);
    }

    #[test]
    fn test_cents_not_comparable() {
        assert_eq!(cents_difference(0.0, 440.0), None);
        assert_eq!(cents_difference(440.0, 0.0), None);
        assert_eq!(cents_difference(-1.0, 440.0), None);
        assert_eq!(cents_difference(440.0, -1.0), None);
        assert_eq!(cents_difference(f64::NAN, 440.0), None);
        assert_eq!(cents_difference(440.0, f64::INFINITY), None);
    }
}
