use std::error::Error;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};

use crate::mode::Mode;
use crate::score::Score;
use crate::target::{TargetDescriptor, TargetLifecycle, TargetProvider};
use crate::tracking::{Joints, PresenceState};

use crate::pause::PauseAccumulator;

/// Discrete intents mapped from raw input upstream of the engine. The
/// recording intents are consumed by the frame recorder in the outer loop;
/// the engine ignores them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameIntent {
    PauseToggle,
    NewGame,
    Exit,
    RecordStart,
    RecordStop,
}

/// Static session parameters, fixed for the lifetime of the engine.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub fruit_duration: Duration,
    pub max_duration: Duration,
    pub user_id: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            fruit_duration: Duration::from_secs(3),
            max_duration: Duration::from_secs(60),
            user_id: None,
        }
    }
}

/// One loop iteration's worth of external input.
#[derive(Debug, Clone)]
pub struct Tick {
    pub now: Instant,
    pub presence: PresenceState,
    pub joints: Option<Joints>,
    /// Joint-to-target intersection, computed by the geometry collaborator.
    pub hit: bool,
}

/// Persisted once per game, at the score-screen boundary or on an early
/// exit with a bound user.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub user_id: String,
    pub start_date: DateTime<Local>,
    pub end_date: DateTime<Local>,
    pub successes: u64,
    pub failures: u64,
}

/// Per-tick telemetry emitted while playing. `game` counts games within
/// this process; `tick` is the monotonically increasing per-game counter
/// the rows are keyed by (not wall time).
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryRow {
    pub game: u64,
    pub tick: u64,
    pub elapsed_secs: u64,
    pub target: TargetDescriptor,
    pub joints: Joints,
}

/// Narrow persistence interface. Failures are recovered (or dropped) by the
/// implementation; the engine proceeds regardless.
pub trait SessionSink {
    fn append_telemetry(&mut self, row: &TelemetryRow) -> Result<(), Box<dyn Error>>;
    fn close_session(&mut self, record: &SessionRecord) -> Result<(), Box<dyn Error>>;
}

/// Sink that drops everything; used when no database is configured.
#[derive(Debug, Default)]
pub struct NullSink;

impl SessionSink for NullSink {
    fn append_telemetry(&mut self, _row: &TelemetryRow) -> Result<(), Box<dyn Error>> {
        Ok(())
    }

    fn close_session(&mut self, _record: &SessionRecord) -> Result<(), Box<dyn Error>> {
        Ok(())
    }
}

/// Read-only view emitted after every tick for renderers and persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub mode: Mode,
    pub score: Score,
    pub elapsed: Duration,
    pub time_remaining: Duration,
    pub target: Option<TargetDescriptor>,
    /// Fraction of the current target's budget consumed, in [0, 1].
    pub target_progress: f64,
    pub presence: PresenceState,
}

/// The running game clock: wall time since the session started minus
/// accumulated pauses, frozen once the score screen is reached.
#[derive(Debug, Default)]
struct SessionClock {
    session_start: Option<Instant>,
    pause: PauseAccumulator,
    frozen: Option<Duration>,
}

impl SessionClock {
    fn start(&mut self, now: Instant) {
        self.session_start = Some(now);
        self.pause.reset();
        self.frozen = None;
    }

    fn elapsed(&self, now: Instant) -> Duration {
        if let Some(frozen) = self.frozen {
            return frozen;
        }
        match self.session_start {
            Some(start) => self.pause.elapsed(now, start),
            None => Duration::ZERO,
        }
    }

    fn freeze(&mut self, now: Instant) {
        self.frozen = Some(self.elapsed(now));
    }
}

/// The session state machine. Consumes one `Tick` plus at most one intent
/// per sensor frame and owns every piece of mutable session state: mode,
/// clock, pause bookkeeping, target and score.
pub struct SessionEngine {
    config: SessionConfig,
    mode: Mode,
    score: Score,
    clock: SessionClock,
    target: Option<TargetLifecycle>,
    start_date: Option<DateTime<Local>>,
    record_written: bool,
    game_counter: u64,
    tick_counter: u64,
}

impl SessionEngine {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            mode: Mode::Starting,
            score: Score::new(),
            clock: SessionClock::default(),
            target: None,
            start_date: None,
            record_written: false,
            game_counter: 0,
            tick_counter: 0,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn score(&self) -> Score {
        self.score
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Evaluates exactly one tick. Effects (scoring, respawns, telemetry,
    /// record persistence) happen through the passed collaborators; the
    /// returned snapshot is what renderers should draw for this frame.
    pub fn advance(
        &mut self,
        tick: &Tick,
        intent: Option<GameIntent>,
        provider: &mut dyn TargetProvider,
        sink: &mut dyn SessionSink,
    ) -> Snapshot {
        let now = tick.now;

        // The exit intent is honored from every state.
        if intent == Some(GameIntent::Exit) {
            self.leave(sink);
            return self.snapshot(now, tick.presence);
        }

        match self.mode {
            Mode::Starting => {
                if tick.presence == PresenceState::Tracking {
                    self.begin_game(now, provider);
                }
            }
            Mode::Playing => self.advance_playing(tick, intent, provider, sink),
            Mode::Pausing => {
                let _ = self.clock.pause.open_window(now);
                self.mode = Mode::Paused;
            }
            Mode::Paused => {
                if intent == Some(GameIntent::PauseToggle) {
                    self.mode = Mode::Resuming;
                }
            }
            Mode::Resuming => self.close_pause(now),
            Mode::UserLostPausing => {
                let _ = self.clock.pause.open_window(now);
                self.mode = Mode::UserLostPaused;
            }
            Mode::UserLostPaused => {
                if tick.presence == PresenceState::Tracking {
                    self.mode = Mode::UserLostResuming;
                }
            }
            Mode::UserLostResuming => self.close_pause(now),
            Mode::ScoreScreen => {
                if intent == Some(GameIntent::NewGame) {
                    self.reset_for_new_game();
                }
            }
            Mode::Leaving => {}
        }

        self.snapshot(now, tick.presence)
    }

    fn advance_playing(
        &mut self,
        tick: &Tick,
        intent: Option<GameIntent>,
        provider: &mut dyn TargetProvider,
        sink: &mut dyn SessionSink,
    ) {
        let now = tick.now;

        // Telemetry reflects the target as displayed this frame, before any
        // respawn.
        if let (Some(joints), Some(target)) = (tick.joints, &self.target) {
            let row = TelemetryRow {
                game: self.game_counter,
                tick: self.tick_counter,
                elapsed_secs: self.clock.elapsed(now).as_secs(),
                target: target.descriptor(),
                joints,
            };
            let _ = sink.append_telemetry(&row);
            self.tick_counter += 1;
        }

        // Scoring happens even on the tick that ends the session, so a
        // target resolved exactly at the deadline still counts.
        if let Some(target) = &mut self.target {
            if tick.hit {
                self.score.record_success();
                target.respawn(provider, now);
            } else if target.is_expired(now) {
                self.score.record_failure();
                target.respawn(provider, now);
            }
        }

        if self.clock.elapsed(now) >= self.config.max_duration {
            self.clock.freeze(now);
            self.finish_game(sink);
            self.mode = Mode::ScoreScreen;
            return;
        }

        if intent == Some(GameIntent::PauseToggle) {
            self.mode = Mode::Pausing;
        } else if tick.presence != PresenceState::Tracking {
            self.mode = Mode::UserLostPausing;
        }
    }

    fn begin_game(&mut self, now: Instant, provider: &mut dyn TargetProvider) {
        self.clock.start(now);
        self.start_date = Some(Local::now());
        self.target = Some(TargetLifecycle::spawn(
            provider,
            now,
            self.config.fruit_duration,
        ));
        self.game_counter += 1;
        self.tick_counter = 0;
        self.record_written = false;
        self.mode = Mode::Playing;
    }

    fn reset_for_new_game(&mut self) {
        self.score.reset();
        self.target = None;
        self.start_date = None;
        self.mode = Mode::Starting;
    }

    fn close_pause(&mut self, now: Instant) {
        if let Ok(duration) = self.clock.pause.close_window(now) {
            if let Some(target) = &mut self.target {
                target.credit_pause(duration);
            }
        }
        self.mode = Mode::Playing;
    }

    /// Persists the session record at most once per game.
    fn finish_game(&mut self, sink: &mut dyn SessionSink) {
        if self.record_written {
            return;
        }
        let (Some(user_id), Some(start_date)) = (&self.config.user_id, self.start_date) else {
            return;
        };
        let record = SessionRecord {
            user_id: user_id.clone(),
            start_date,
            end_date: Local::now(),
            successes: self.score.successes,
            failures: self.score.failures,
        };
        let _ = sink.close_session(&record);
        self.record_written = true;
    }

    fn leave(&mut self, sink: &mut dyn SessionSink) {
        if self.mode != Mode::Leaving {
            self.finish_game(sink);
            self.mode = Mode::Leaving;
        }
    }

    fn snapshot(&self, now: Instant, presence: PresenceState) -> Snapshot {
        // While a pause window is open the target clock reads as of the
        // moment the window opened, matching the frozen countdown the
        // player sees.
        let effective_now = self.clock.pause.window_started().unwrap_or(now);
        let elapsed = self.clock.elapsed(now);

        Snapshot {
            mode: self.mode,
            score: self.score,
            elapsed,
            time_remaining: self.config.max_duration.saturating_sub(elapsed),
            target: self.target.as_ref().map(|t| t.descriptor()),
            target_progress: self
                .target
                .as_ref()
                .map(|t| t.progress(effective_now))
                .unwrap_or(0.0),
            presence,
        }
    }
}
