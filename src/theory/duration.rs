// Symbolic note durations
// The beat unit is fixed at quarter note = 1 beat

use serde::{Deserialize, Serialize};

/// Symbolic duration of a note, as a fraction of a quarter-note beat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteDuration {
    /// Half note - 2 beats
    Half,

    /// Quarter note - 1 beat
    Quarter,

    /// Eighth note - 0.5 beats
    Eighth,
}

impl NoteDuration {
    /// Duration in beats (quarter note = 1 beat)
    pub fn beats(&self) -> f64 {
        match self {
            NoteDuration::Half => 2.0,
            NoteDuration::Quarter => 1.0,
            NoteDuration::Eighth => 0.5,
        }
    }

    /// Short notation-style symbol ("h", "q", "8"), as used by staff
    /// rendering front-ends
    pub fn symbol(&self) -> &'static str {
        match self {
            NoteDuration::Half => "h",
            NoteDuration::Quarter => "q",
            NoteDuration::Eighth => "8",
        }
    }

    /// Parse a notation-style symbol; unknown symbols fall back to a
    /// quarter note
    pub fn from_symbol(s: &str) -> Self {
        match s {
            "h" => NoteDuration::Half,
            "q" => NoteDuration::Quarter,
            "8" => NoteDuration::Eighth,
            _ => NoteDuration::Quarter,
        }
    }
}
