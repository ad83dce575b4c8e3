use std::time::{Duration, Instant};

/// Invariant violations on the pause window. These indicate a bug in the
/// caller's transition logic, so debug builds assert; release builds treat
/// the call as a no-op rather than crash a running session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseError {
    AlreadyOpen,
    NotOpen,
}

impl std::fmt::Display for PauseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PauseError::AlreadyOpen => write!(f, "a pause window is already open"),
            PauseError::NotOpen => write!(f, "no pause window is open"),
        }
    }
}

impl std::error::Error for PauseError {}

/// Tracks the total time excluded from the running game clock. Manual
/// pauses and user-lost pauses share this single accumulator; at most one
/// window can be open at a time.
#[derive(Debug, Clone, Copy, Default)]
pub struct PauseAccumulator {
    accumulated: Duration,
    window: Option<Instant>,
}

impl PauseAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total paused time folded in so far. Does not include a still-open
    /// window.
    pub fn accumulated(&self) -> Duration {
        self.accumulated
    }

    pub fn window_open(&self) -> bool {
        self.window.is_some()
    }

    /// When the currently open window started, if one is open.
    pub fn window_started(&self) -> Option<Instant> {
        self.window
    }

    /// Opens a pause window at `now`. Fails with `AlreadyOpen` if the
    /// previous window was never closed.
    pub fn open_window(&mut self, now: Instant) -> Result<(), PauseError> {
        if self.window.is_some() {
            debug_assert!(false, "pause window opened twice");
            return Err(PauseError::AlreadyOpen);
        }
        self.window = Some(now);
        Ok(())
    }

    /// Closes the open window, folding its duration into the accumulator.
    /// Returns the duration of the closed window.
    pub fn close_window(&mut self, now: Instant) -> Result<Duration, PauseError> {
        let Some(started) = self.window.take() else {
            debug_assert!(false, "pause window closed while none open");
            return Err(PauseError::NotOpen);
        };
        let duration = now.saturating_duration_since(started);
        self.accumulated += duration;
        Ok(duration)
    }

    /// Running game time: wall time since `session_start` minus all paused
    /// time. Frozen while a window is open, and never negative.
    pub fn elapsed(&self, now: Instant, session_start: Instant) -> Duration {
        let reference = self.window.unwrap_or(now);
        reference
            .saturating_duration_since(session_start)
            .saturating_sub(self.accumulated)
    }

    pub fn reset(&mut self) {
        self.accumulated = Duration::ZERO;
        self.window = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn elapsed_without_pauses_is_wall_time() {
        let start = Instant::now();
        let acc = PauseAccumulator::new();
        assert_eq!(acc.elapsed(start + secs(10), start), secs(10));
    }

    #[test]
    fn elapsed_excludes_closed_window() {
        let start = Instant::now();
        let mut acc = PauseAccumulator::new();

        acc.open_window(start + secs(5)).unwrap();
        let d = acc.close_window(start + secs(12)).unwrap();

        assert_eq!(d, secs(7));
        assert_eq!(acc.accumulated(), secs(7));
        assert_eq!(acc.elapsed(start + secs(20), start), secs(13));
    }

    #[test]
    fn elapsed_is_frozen_while_window_open() {
        let start = Instant::now();
        let mut acc = PauseAccumulator::new();

        acc.open_window(start + secs(5)).unwrap();
        let at_open = acc.elapsed(start + secs(5), start);

        assert_eq!(acc.elapsed(start + secs(6), start), at_open);
        assert_eq!(acc.elapsed(start + secs(60), start), at_open);
    }

    #[test]
    fn elapsed_invariant_under_pause_duration() {
        // Property from the timing contract: elapsed after close equals
        // elapsed before open, for any pause length.
        for pause_secs in [0, 1, 30, 3600] {
            let start = Instant::now();
            let mut acc = PauseAccumulator::new();
            let before = acc.elapsed(start + secs(10), start);

            acc.open_window(start + secs(10)).unwrap();
            acc.close_window(start + secs(10 + pause_secs)).unwrap();

            assert_eq!(acc.elapsed(start + secs(10 + pause_secs), start), before);
        }
    }

    #[test]
    fn multiple_windows_accumulate() {
        let start = Instant::now();
        let mut acc = PauseAccumulator::new();

        acc.open_window(start + secs(2)).unwrap();
        acc.close_window(start + secs(4)).unwrap();
        acc.open_window(start + secs(8)).unwrap();
        acc.close_window(start + secs(11)).unwrap();

        assert_eq!(acc.accumulated(), secs(5));
        assert_eq!(acc.elapsed(start + secs(15), start), secs(10));
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn double_open_is_rejected() {
        let start = Instant::now();
        let mut acc = PauseAccumulator::new();
        acc.open_window(start).unwrap();
        assert_eq!(acc.open_window(start + secs(1)), Err(PauseError::AlreadyOpen));
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn close_without_open_is_rejected() {
        let start = Instant::now();
        let mut acc = PauseAccumulator::new();
        assert_eq!(acc.close_window(start), Err(PauseError::NotOpen));
    }

    #[test]
    #[should_panic(expected = "pause window opened twice")]
    #[cfg(debug_assertions)]
    fn double_open_asserts_in_debug() {
        let start = Instant::now();
        let mut acc = PauseAccumulator::new();
        acc.open_window(start).unwrap();
        let _ = acc.open_window(start + secs(1));
    }

    #[test]
    fn elapsed_never_negative() {
        // A now earlier than session_start (clock skew between collaborator
        // samples) must clamp to zero, not underflow.
        let start = Instant::now() + secs(100);
        let acc = PauseAccumulator::new();
        assert_eq!(acc.elapsed(Instant::now(), start), Duration::ZERO);
    }

    #[test]
    fn reset_clears_everything() {
        let start = Instant::now();
        let mut acc = PauseAccumulator::new();
        acc.open_window(start).unwrap();
        acc.close_window(start + secs(3)).unwrap();
        acc.open_window(start + secs(5)).unwrap();

        acc.reset();

        assert_eq!(acc.accumulated(), Duration::ZERO);
        assert!(!acc.window_open());
    }
}
