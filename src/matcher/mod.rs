// Real-time pitch matching
// Correlates detected-pitch samples against the playback schedule and
// reports signed cents deviation from the nearest scheduled note

use serde::{Deserialize, Serialize};

use crate::schedule::{Schedule, ScheduleEntry};
use crate::theory::cents_difference;

/// Default lookahead in seconds: how soon before a note's onset a sung
/// pitch may be considered an attempt at that note
pub const DEFAULT_LOOKAHEAD_SECONDS: f64 = 0.25;

/// One detected-pitch observation from the capture/detection collaborator
///
/// Produced once per analysis frame. `frequency_hz` is `None` when the
/// detector found no discernable pitch in the frame (including frames it
/// rejected under its own clarity threshold).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionSample {
    /// Capture time in seconds on the session clock
    pub captured_at: f64,

    /// Detected fundamental frequency, if any
    pub frequency_hz: Option<f64>,

    /// Detector confidence [0.0, 1.0] that the frame is a tone
    pub clarity: f32,
}

/// Matching tolerance configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchWindow {
    /// Lookahead in seconds before a note's onset
    pub lookahead: f64,
}

impl MatchWindow {
    pub fn new(lookahead: f64) -> Self {
        MatchWindow { lookahead }
    }

    /// Half-width of the tolerance window straddling each onset.
    ///
    /// Deliberately generous (at least half a second either side) to
    /// tolerate latency between the audible cue and the vocal response,
    /// and notes sung slightly early or held slightly late.
    pub fn tolerance(&self) -> f64 {
        (self.lookahead + 0.25).max(0.5)
    }
}

impl Default for MatchWindow {
    fn default() -> Self {
        MatchWindow {
            lookahead: DEFAULT_LOOKAHEAD_SECONDS,
        }
    }
}

/// Result of matching one detection sample against the schedule
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Melody index of the matched note
    pub note_index: usize,

    /// Signed deviation from the matched note in cents
    /// (positive = sharp, negative = flat). Full precision; see
    /// `cents_for_display` for the rounded form.
    pub cents_deviation: f64,

    /// The schedule entry the sample was matched against
    pub entry: ScheduleEntry,
}

impl MatchResult {
    /// Cents deviation rounded to 0.1-cent resolution, for display.
    /// Rounding happens only here, at the presentation boundary.
    pub fn cents_for_display(&self) -> f64 {
        (self.cents_deviation * 10.0).round() / 10.0
    }
}

/// Match one detection sample against the schedule.
///
/// Returns `None` when the sample carries no pitch, when no entry's
/// tolerance window contains the capture time, or when the frequencies
/// are not comparable. `None` is a normal per-sample outcome, never an
/// error; a caller displaying deviations must blank its indicator on
/// every `None` so no stale match is carried forward.
///
/// Among candidate entries the one with the smallest absolute time
/// distance to the capture time wins; on an exact tie the earlier entry
/// is kept. The scan is linear, which is fine for the tens of entries a
/// practice melody produces (entries are onset-sorted, so a binary
/// search could replace it without changing the tie-break).
pub fn match_sample(
    sample: &DetectionSample,
    schedule: &Schedule,
    window: &MatchWindow,
) -> Option<MatchResult> {
    let frequency_hz = sample.frequency_hz?;
    let tolerance = window.tolerance();

    let mut best: Option<(&ScheduleEntry, f64)> = None;
    for entry in schedule.entries() {
        let dt = sample.captured_at - entry.onset_time;
        if dt.abs() <= tolerance {
            match best {
                Some((_, best_dt)) if dt.abs() >= best_dt.abs() => {}
                _ => best = Some((entry, dt)),
            }
        }
    }

    let (entry, _) = best?;

    // Guarded upstream: schedule frequencies are positive by construction
    // and the sample's frequency was checked above. Still, a None here
    // must yield "no match", not a bogus deviation.
    let cents_deviation = cents_difference(frequency_hz, entry.frequency_hz)?;

    Some(MatchResult {
        note_index: entry.note_index,
        cents_deviation,
        entry: *entry,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::melody::{Melody, MelodyGenerator, Meter, Note};
    use crate::schedule::build_schedule;
    use crate::theory::NoteDuration;

    fn sample(captured_at: f64, frequency_hz: Option<f64>) -> DetectionSample {
        DetectionSample {
            captured_at,
            frequency_hz,
            clarity: 0.95,
        }
    }

    fn c_major_fragment() -> Schedule {
        let melody = Melody::new(vec![
            Note::new("C4", NoteDuration::Quarter).unwrap(),
            Note::new("E4", NoteDuration::Quarter).unwrap(),
            Note::new("G4", NoteDuration::Quarter).unwrap(),
        ]);
        build_schedule(&melody, 60.0, 0.0).unwrap()
    }

    #[test]
    fn test_exact_onset_exact_pitch_is_zero_cents() {
        let schedule = c_major_fragment();
        let entry = schedule.entries()[1];

        let result = match_sample(
            &sample(entry.onset_time, Some(entry.frequency_hz)),
            &schedule,
            &MatchWindow::default(),
        )
        .unwrap();

        assert_eq!(result.note_index, 1);
        assert_eq!(result.cents_deviation, 0.0);
        assert_eq!(result.entry, entry);
    }

    #[test]
    fn test_tie_break_prefers_closest_onset() {
        // Onsets at 1.0 and 1.3; a sample at 1.14 is 0.14 from the first
        // and 0.16 from the second, so the first must win.
        let melody = Melody::new(vec![
            Note::new("C4", NoteDuration::Eighth).unwrap(),
            Note::new("D4", NoteDuration::Eighth).unwrap(),
        ]);
        let schedule = build_schedule(&melody, 100.0, 1.0).unwrap();
        // 100 BPM eighth = 0.3 s, so the second onset lands at exactly 1.3
        assert!((schedule.entries()[1].onset_time - 1.3).abs() < 1e-9);

        let result = match_sample(
            &sample(1.14, Some(300.0)),
            &schedule,
            &MatchWindow::new(0.25),
        )
        .unwrap();

        assert_eq!(result.note_index, 0);
    }

    #[test]
    fn test_exact_tie_keeps_earlier_entry() {
        let melody = Melody::new(vec![
            Note::new("C4", NoteDuration::Quarter).unwrap(),
            Note::new("C5", NoteDuration::Quarter).unwrap(),
        ]);
        let schedule = build_schedule(&melody, 60.0, 0.0).unwrap();

        // Equidistant from onsets 0.0 and 1.0
        let result = match_sample(
            &sample(0.5, Some(280.0)),
            &schedule,
            &MatchWindow::default(),
        )
        .unwrap();

        assert_eq!(result.note_index, 0);
    }

    #[test]
    fn test_sample_outside_every_window_is_no_match() {
        let schedule = c_major_fragment();
        // Last onset is 2.0; tolerance is 0.5
        assert!(match_sample(
            &sample(10.0, Some(440.0)),
            &schedule,
            &MatchWindow::default()
        )
        .is_none());
    }

    #[test]
    fn test_absent_frequency_is_no_match_not_error() {
        let schedule = c_major_fragment();
        assert!(match_sample(&sample(0.0, None), &schedule, &MatchWindow::default()).is_none());
    }

    #[test]
    fn test_empty_schedule_is_no_match() {
        let schedule = build_schedule(&Melody::new(Vec::new()), 60.0, 0.0).unwrap();
        assert!(
            match_sample(&sample(0.0, Some(440.0)), &schedule, &MatchWindow::default()).is_none()
        );
    }

    #[test]
    fn test_sharp_and_flat_signs() {
        let schedule = c_major_fragment();
        let entry = schedule.entries()[0];

        let sharp = match_sample(
            &sample(0.0, Some(entry.frequency_hz * 1.01)),
            &schedule,
            &MatchWindow::default(),
        )
        .unwrap();
        assert!(sharp.cents_deviation > 0.0);

        let flat = match_sample(
            &sample(0.0, Some(entry.frequency_hz * 0.99)),
            &schedule,
            &MatchWindow::default(),
        )
        .unwrap();
        assert!(flat.cents_deviation < 0.0);
    }

    #[test]
    fn test_display_rounding_is_tenth_of_a_cent() {
        let result = MatchResult {
            note_index: 0,
            cents_deviation: 12.3456,
            entry: ScheduleEntry {
                onset_time: 0.0,
                frequency_hz: 440.0,
                note_index: 0,
            },
        };
        assert!((result.cents_for_display() - 12.3).abs() < 1e-9);
    }

    #[test]
    fn test_generous_window_matches_late_held_note() {
        let schedule = c_major_fragment();
        let entry = schedule.entries()[2];

        // 0.4 s after the last onset, still inside the 0.5 s tolerance
        let result = match_sample(
            &sample(entry.onset_time + 0.4, Some(entry.frequency_hz)),
            &schedule,
            &MatchWindow::default(),
        )
        .unwrap();
        assert_eq!(result.note_index, 2);
    }

    #[test]
    fn test_end_to_end_synthetic_stream_tracks_every_note() {
        // Generate a melody, build its schedule, then feed a detection
        // stream that sings each note perfectly at its onset.
        let melody = MelodyGenerator::with_seed(2024).generate(8, Meter::FourFour);
        let schedule = build_schedule(&melody, 100.0, 0.0).unwrap();
        let window = MatchWindow::default();

        let mut matched_indices = Vec::new();
        for entry in schedule.entries() {
            let result = match_sample(
                &sample(entry.onset_time, Some(entry.frequency_hz)),
                &schedule,
                &window,
            )
            .unwrap();

            assert!(result.cents_deviation.abs() < 1e-9);
            matched_indices.push(result.note_index);
        }

        assert_eq!(matched_indices, (0..8).collect::<Vec<_>>());
    }
}
