pub mod app_dirs;
pub mod config;
pub mod db;
pub mod mode;
pub mod pause;
pub mod replay;
pub mod runtime;
pub mod score;
pub mod session;
pub mod target;
pub mod tracking;
pub mod ui;

use crate::config::{Config, ConfigStore, FileConfigStore};
use crate::db::GameDb;
use crate::mode::Mode;
use crate::replay::{FrameRecorder, FrameSource, ReplayFrameSource};
use crate::runtime::{
    intent_for_key, CrosstermEventSource, FixedTicker, GameEvent, GameEventSource, Runner, Ticker,
};
use crate::session::{
    GameIntent, NullSink, SessionConfig, SessionEngine, SessionSink, Snapshot, Tick,
};
use crate::target::Board;
use crate::ui::SnapshotView;

use chrono::Local;
use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use itertools::Itertools;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::{
    error::Error,
    io,
    path::PathBuf,
    time::{Duration, Instant},
};
use time_humanize::{Accuracy, HumanTime, Tense};

const TICK_RATE_MS: u64 = 100;

/// motor-skills training game for depth sensors
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Reach the fruit before it expires. Drives the session state machine from a \
recorded sensor session, persists scores and per-tick telemetry, and renders a live status view."
)]
pub struct Cli {
    /// seconds each fruit stays on screen
    #[clap(short = 'f', long)]
    fruit_secs: Option<u64>,

    /// seconds of active play per game
    #[clap(short = 'm', long)]
    max_secs: Option<u64>,

    /// user id to record this session under
    #[clap(short = 'u', long)]
    user: Option<String>,

    /// recorded sensor session (CSV) to play back
    #[clap(short = 'r', long)]
    replay: Option<PathBuf>,

    /// file the R key records the live session to
    #[clap(long, default_value = "fruitreach_session.csv")]
    record_to: PathBuf,

    /// database file (defaults to the state directory)
    #[clap(long)]
    db: Option<PathBuf>,

    /// list recent games and exit
    #[clap(long)]
    history: bool,

    /// export one game's telemetry to CSV and exit
    #[clap(long, value_name = "GAME_ID")]
    export_game: Option<i64>,
}

impl Cli {
    fn session_config(&self, cfg: &Config) -> SessionConfig {
        SessionConfig {
            fruit_duration: Duration::from_secs(self.fruit_secs.unwrap_or(cfg.fruit_secs)),
            max_duration: Duration::from_secs(self.max_secs.unwrap_or(cfg.max_secs)),
            user_id: self.user.clone(),
        }
    }
}

/// Everything the loop mutates between ticks.
pub struct App {
    pub engine: SessionEngine,
    pub board: Board,
    pub recorder: FrameRecorder,
    pub last_snapshot: Option<Snapshot>,
    session_began: Instant,
}

impl App {
    pub fn new(session: SessionConfig, board: Board) -> Self {
        Self {
            engine: SessionEngine::new(session),
            board,
            recorder: FrameRecorder::new(),
            last_snapshot: None,
            session_began: Instant::now(),
        }
    }

    /// Evaluates one sensor frame: computes the hit signal against the
    /// current target, advances the engine, and appends to an active
    /// recording.
    pub fn step(
        &mut self,
        frame: &crate::tracking::SensorFrame,
        intent: Option<GameIntent>,
        sink: &mut dyn SessionSink,
    ) -> Snapshot {
        let now = Instant::now();

        let joints = frame.active_joints().copied();
        let hit = match (&joints, self.last_snapshot.as_ref().and_then(|s| s.target)) {
            (Some(joints), Some(target)) => self.board.hand_hits(joints, &target),
            _ => false,
        };

        let tick = Tick {
            now,
            presence: frame.presence(),
            joints,
            hit,
        };

        let snapshot = self.engine.advance(&tick, intent, &mut self.board, sink);

        let _ = self
            .recorder
            .record(now.duration_since(self.session_began), frame);

        self.last_snapshot = Some(snapshot.clone());
        snapshot
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let cfg = FileConfigStore::new().load();

    if cli.history {
        return print_history(&cli);
    }

    if let Some(game_id) = cli.export_game {
        let db = open_db(&cli)?;
        let out = PathBuf::from(format!("game_{}.csv", game_id));
        let rows = db.export_telemetry_csv(game_id, &out)?;
        println!("wrote {} telemetry rows to {}", rows, out.display());
        return Ok(());
    }

    let Some(replay_path) = cli.replay.clone() else {
        let mut cmd = Cli::command();
        cmd.error(
            ErrorKind::MissingRequiredArgument,
            "a --replay recording is required (live sensor capture is supplied by the installation)",
        )
        .exit();
    };

    let frames = ReplayFrameSource::from_path(&replay_path)?;

    let mut sink: Box<dyn SessionSink> = match open_db(&cli) {
        Ok(db) => Box::new(db),
        Err(_) => Box::new(NullSink),
    };

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(
        cli.session_config(&cfg),
        Board::new(cfg.board_width, cfg.board_height),
    );

    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );

    let result = run_loop(&mut terminal, &mut app, &runner, frames, sink.as_mut(), &cli);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_loop<B, E, T>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    runner: &Runner<E, T>,
    mut frames: ReplayFrameSource,
    sink: &mut dyn SessionSink,
    cli: &Cli,
) -> Result<(), Box<dyn Error>>
where
    B: ratatui::backend::Backend,
    E: GameEventSource,
    T: Ticker,
{
    let mut pending_intent: Option<GameIntent> = None;

    loop {
        match runner.step() {
            GameEvent::Key(key) => match intent_for_key(&key) {
                Some(GameIntent::RecordStart) => {
                    let _ = app.recorder.start(&cli.record_to);
                }
                Some(GameIntent::RecordStop) => {
                    let _ = app.recorder.stop();
                }
                Some(intent) => pending_intent = Some(intent),
                None => {}
            },
            GameEvent::Resize => {
                if let Some(snapshot) = app.last_snapshot.clone() {
                    draw(terminal, &snapshot)?;
                }
            }
            GameEvent::Tick => {
                // One replayed frame per tick; the end of the recording
                // ends the session the way an unplugged sensor would.
                let Some(frame) = frames.next_frame() else {
                    app.step(
                        &crate::tracking::SensorFrame::default(),
                        Some(GameIntent::Exit),
                        sink,
                    );
                    break;
                };

                let snapshot = app.step(&frame, pending_intent.take(), sink);
                draw(terminal, &snapshot)?;

                if snapshot.mode == Mode::Leaving {
                    break;
                }
            }
        }
    }

    let _ = app.recorder.stop();
    Ok(())
}

fn draw<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    snapshot: &Snapshot,
) -> Result<(), Box<dyn Error>> {
    let view = SnapshotView::new(snapshot);
    terminal.draw(|f| f.render_widget(&view, f.area()))?;
    Ok(())
}

fn open_db(cli: &Cli) -> Result<GameDb, rusqlite::Error> {
    match &cli.db {
        Some(path) => GameDb::open(path),
        None => GameDb::new(),
    }
}

fn print_history(cli: &Cli) -> Result<(), Box<dyn Error>> {
    let db = open_db(cli)?;
    let games = match &cli.user {
        Some(user) => db.games_for_user(user)?,
        None => db.recent_games(20)?,
    };

    if games.is_empty() {
        println!("no games recorded yet");
        return Ok(());
    }

    let listing = games
        .iter()
        .map(|g| {
            let since = (Local::now() - g.end_date).to_std().unwrap_or_default();
            let ago = HumanTime::from(since).to_text_en(Accuracy::Rough, Tense::Past);
            format!(
                "#{:<4} {:<12} {:>3} hits {:>3} misses  {}",
                g.id, g.user_id, g.successes, g.failures, ago
            )
        })
        .join("\n");
    println!("{}", listing);

    if let Some(user) = &cli.user {
        let (successes, failures) = db.user_totals(user)?;
        println!("total: {} hits, {} misses", successes, failures);
    }

    Ok(())
}
