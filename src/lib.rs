// Solfa - Sight-Singing Practice Engine
// Generates practice melodies, schedules their playback, and matches a
// live-detected sung pitch against the schedule in real time

pub mod audio;
pub mod matcher;
pub mod melody;
pub mod schedule;
pub mod session;
pub mod theory;

pub use audio::{CaptureConfig, MicPitchSource, Player};
pub use matcher::{match_sample, DetectionSample, MatchResult, MatchWindow};
pub use melody::{Melody, MelodyGenerator, Meter, Note};
pub use schedule::{build_schedule, Schedule, ScheduleEntry};
pub use session::{prepare, PracticeSettings, Session, SessionConfig, SessionSlot, SessionState};
pub use theory::{cents_difference, pitch_name_to_frequency, NoteDuration};
