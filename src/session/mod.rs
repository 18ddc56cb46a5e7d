// Practice session lifecycle
// Owns the schedule and the polling loop for one playback session:
// Idle -> Armed on start, Armed -> Idle on stop or natural completion

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::matcher::{match_sample, DetectionSample, MatchResult, MatchWindow};
use crate::melody::{Melody, MelodyGenerator, Meter};
use crate::schedule::{build_schedule, Schedule, ScheduleError};

/// Tempo bounds exposed to the tempo control, inclusive
pub const MIN_TEMPO_BPM: u32 = 40;
pub const MAX_TEMPO_BPM: u32 = 160;

/// Measure-count bounds exposed to the measures control, inclusive
pub const MIN_MEASURES: u32 = 1;
pub const MAX_MEASURES: u32 = 4;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Tempo {0} BPM is outside the supported {MIN_TEMPO_BPM}-{MAX_TEMPO_BPM} BPM range")]
    TempoOutOfRange(u32),

    #[error("Measure count {0} is outside the supported {MIN_MEASURES}-{MAX_MEASURES} range")]
    MeasureCountOutOfRange(u32),

    #[error("Corrupt schedule: entry {index} has frequency {frequency_hz} Hz")]
    CorruptSchedule { index: usize, frequency_hz: f64 },

    #[error(transparent)]
    Schedule(#[from] ScheduleError),
}

/// User-facing practice settings
///
/// The bounds here mirror what a control panel enforces; `validate`
/// re-checks them so a session can never start from out-of-range values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PracticeSettings {
    /// Tempo in beats per minute (40-160)
    pub tempo_bpm: u32,

    /// Meter for rendering and (descriptively) for generation
    pub meter: Meter,

    /// Number of measures to practice (1-4)
    pub num_measures: u32,
}

impl Default for PracticeSettings {
    fn default() -> Self {
        PracticeSettings {
            tempo_bpm: 100,
            meter: Meter::FourFour,
            num_measures: 2,
        }
    }
}

impl PracticeSettings {
    pub fn validate(&self) -> Result<(), SessionError> {
        if !(MIN_TEMPO_BPM..=MAX_TEMPO_BPM).contains(&self.tempo_bpm) {
            return Err(SessionError::TempoOutOfRange(self.tempo_bpm));
        }
        if !(MIN_MEASURES..=MAX_MEASURES).contains(&self.num_measures) {
            return Err(SessionError::MeasureCountOutOfRange(self.num_measures));
        }
        Ok(())
    }
}

/// Validate the settings, generate a fresh melody, and build its
/// playback schedule on the session clock (first onset at time zero).
///
/// This is the "start practicing" path: the melody replaces any previous
/// one wholesale, and the returned schedule is what both the player and
/// a new session consume.
pub fn prepare(
    settings: &PracticeSettings,
    generator: &mut MelodyGenerator,
) -> Result<(Melody, Schedule), SessionError> {
    settings.validate()?;
    let melody = generator.generate_default(settings.meter);
    let schedule = build_schedule(&melody, settings.tempo_bpm as f64, 0.0)?;
    Ok((melody, schedule))
}

/// Cancellation flag shared between a ticker loop and its owner.
/// Checked at the top of every iteration; cancelling is first-class,
/// not a side effect of dropping the loop.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Fixed-cadence polling loop: runs a callback repeatedly on a worker
/// thread until the callback reports completion or the token is
/// cancelled. `stop` cancels and joins, so once it returns no further
/// iteration can run.
#[derive(Debug)]
pub struct Ticker {
    token: CancelToken,
    worker: Option<JoinHandle<()>>,
}

impl Ticker {
    /// Spawn a loop that invokes `tick` every `period` until `tick`
    /// returns `false` or the ticker is stopped
    pub fn spawn<F>(period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let token = CancelToken::new();
        let loop_token = token.clone();

        let worker = thread::spawn(move || {
            while !loop_token.is_cancelled() {
                if !tick() {
                    break;
                }
                thread::sleep(period);
            }
        });

        Ticker {
            token,
            worker: Some(worker),
        }
    }

    /// Cancel the loop and wait for the worker thread to exit.
    /// Idempotent; synchronous from the caller's perspective.
    pub fn stop(&mut self) {
        self.token.cancel();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Source of detection samples polled once per loop iteration
///
/// This is the seam between the session and the capture/detection
/// collaborator. `now` is the current time in seconds on the session
/// clock (zero at arm time, the same clock the schedule's onsets use).
/// Implementations return `None` when no new analysis frame is ready;
/// a ready frame with no discernable pitch is a sample whose
/// `frequency_hz` is `None`, not a `None` return.
pub trait PitchSource: Send {
    fn poll(&mut self, now: f64) -> Option<DetectionSample>;
}

/// Session configuration
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// Matching tolerance window
    pub window: MatchWindow,

    /// Polling cadence of the matching loop
    pub frame_period: Duration,

    /// Extra seconds past the schedule's total duration before the
    /// session completes on its own, so the last note's match can still
    /// be observed inside its tolerance window
    pub completion_grace: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            window: MatchWindow::default(),
            frame_period: Duration::from_millis(16),
            completion_grace: 0.5,
        }
    }
}

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No active schedule
    Idle,

    /// Schedule present, matching loop running
    Armed,
}

#[derive(Debug)]
struct SessionShared {
    last_match: Mutex<Option<MatchResult>>,
    armed: AtomicBool,
}

/// An armed practice session
///
/// Owns the schedule, the pitch source, and the matching loop for one
/// playback. The schedule is read-only for the session's lifetime and
/// replaced wholesale by starting a new session; it is never mutated
/// field-by-field while armed. Dropping a session tears it down the same
/// way `stop` does.
#[derive(Debug)]
pub struct Session {
    ticker: Ticker,
    shared: Arc<SessionShared>,
    schedule: Arc<Schedule>,
}

impl Session {
    /// Validate the schedule, arm, and start the matching loop.
    ///
    /// A schedule entry with a non-positive or non-finite frequency is a
    /// programming error upstream; it fails the start once rather than
    /// silently mismatching every sample of the session.
    pub fn start<S>(schedule: Schedule, source: S, config: SessionConfig) -> Result<Self, SessionError>
    where
        S: PitchSource + 'static,
    {
        Self::start_inner(schedule, source, config, None)
    }

    /// Like `start`, but also invokes `observer` with every per-frame
    /// match outcome (including the blanking `None` frames). The observer
    /// runs on the loop thread and never fires after `stop` returns.
    pub fn start_with_observer<S, F>(
        schedule: Schedule,
        source: S,
        config: SessionConfig,
        observer: F,
    ) -> Result<Self, SessionError>
    where
        S: PitchSource + 'static,
        F: FnMut(Option<MatchResult>) + Send + 'static,
    {
        Self::start_inner(schedule, source, config, Some(Box::new(observer)))
    }

    fn start_inner<S>(
        schedule: Schedule,
        mut source: S,
        config: SessionConfig,
        mut observer: Option<Box<dyn FnMut(Option<MatchResult>) + Send>>,
    ) -> Result<Self, SessionError>
    where
        S: PitchSource + 'static,
    {
        for entry in schedule.entries() {
            if !entry.frequency_hz.is_finite() || entry.frequency_hz <= 0.0 {
                return Err(SessionError::CorruptSchedule {
                    index: entry.note_index,
                    frequency_hz: entry.frequency_hz,
                });
            }
        }

        let schedule = Arc::new(schedule);
        let shared = Arc::new(SessionShared {
            last_match: Mutex::new(None),
            armed: AtomicBool::new(true),
        });

        // The session clock starts at zero when the loop is armed; the
        // schedule's onsets are expected to be on the same clock.
        let epoch = Instant::now();
        let first_onset = schedule.entries().first().map(|e| e.onset_time).unwrap_or(0.0);
        let end_time = first_onset + schedule.total_duration() + config.completion_grace;

        let loop_schedule = Arc::clone(&schedule);
        let loop_shared = Arc::clone(&shared);
        let window = config.window;

        log::info!(
            "Session armed: {} notes, {:.2}s playback",
            schedule.len(),
            schedule.total_duration()
        );

        let ticker = Ticker::spawn(config.frame_period, move || {
            let now = epoch.elapsed().as_secs_f64();

            // Natural completion: schedule exhausted plus grace
            if now > end_time {
                loop_shared.armed.store(false, Ordering::SeqCst);
                *loop_shared.last_match.lock().unwrap() = None;
                log::info!("Session completed after {:.2}s", now);
                return false;
            }

            if let Some(sample) = source.poll(now) {
                let result = match_sample(&sample, &loop_schedule, &window);

                // A `None` result blanks the indicator; a stale match is
                // never carried forward across no-pitch frames.
                *loop_shared.last_match.lock().unwrap() = result;

                if let Some(observer) = observer.as_mut() {
                    observer(result);
                }
            }

            true
        });

        Ok(Session {
            ticker,
            shared,
            schedule,
        })
    }

    /// The schedule this session is matching against
    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn state(&self) -> SessionState {
        if self.shared.armed.load(Ordering::SeqCst) {
            SessionState::Armed
        } else {
            SessionState::Idle
        }
    }

    /// The most recent match outcome, or `None` while no pitch is being
    /// sung (or after the session has ended)
    pub fn last_match(&self) -> Option<MatchResult> {
        *self.shared.last_match.lock().unwrap()
    }

    /// Stop the session: cancel the loop, join the worker, drop the
    /// pitch source (releasing the capture device), and blank any
    /// displayed match state. All of this happens before `stop` returns.
    pub fn stop(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        self.ticker.stop();
        self.shared.armed.store(false, Ordering::SeqCst);
        *self.shared.last_match.lock().unwrap() = None;
        log::info!("Session stopped");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Holder enforcing the at-most-one-active-session invariant: arming a
/// new session stops the incumbent first, so two sessions never hold the
/// capture device or publish matches concurrently.
#[derive(Default)]
pub struct SessionSlot {
    active: Option<Session>,
}

impl SessionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a new session, stopping any active one first
    pub fn arm(&mut self, session: Session) {
        self.stop();
        self.active = Some(session);
    }

    /// Stop and discard the active session, if any
    pub fn stop(&mut self) {
        if let Some(session) = self.active.take() {
            session.stop();
        }
    }

    pub fn active(&self) -> Option<&Session> {
        self.active.as_ref()
    }

    pub fn is_armed(&self) -> bool {
        self.active
            .as_ref()
            .map(|s| s.state() == SessionState::Armed)
            .unwrap_or(false)
    }
}
