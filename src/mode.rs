/// Session modes. Exactly one is active at any time; the engine in
/// `session.rs` is the only mutator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum Mode {
    /// Waiting for a tracked user before the clock starts.
    Starting,
    /// The game is running: targets spawn, expire and score.
    Playing,
    /// One-tick staging state before `Paused`; the pause window opens on
    /// the tick evaluated *in* this state, so the tick that detected the
    /// pause request is still counted as play time.
    Pausing,
    Paused,
    /// One-tick staging state before returning to `Playing`.
    Resuming,
    /// Same staging pattern as the manual pause, entered when tracking is
    /// lost mid-game.
    UserLostPausing,
    UserLostPaused,
    UserLostResuming,
    /// Final score displayed; waiting for a new-game or exit intent.
    ScoreScreen,
    /// Terminal. The session record is persisted on entry.
    Leaving,
}

impl Mode {
    /// True for every state in which the running clock must be frozen.
    pub fn is_pause_family(&self) -> bool {
        matches!(
            self,
            Mode::Pausing
                | Mode::Paused
                | Mode::Resuming
                | Mode::UserLostPausing
                | Mode::UserLostPaused
                | Mode::UserLostResuming
        )
    }

    /// True once the session can never advance again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Mode::Leaving)
    }

    /// Whether the renderer should draw the playfield (fruit, countdown,
    /// score bar). The original draws it during the game and every pause
    /// state, but not on the score screen.
    pub fn shows_playfield(&self) -> bool {
        matches!(self, Mode::Playing) || self.is_pause_family()
    }
}
