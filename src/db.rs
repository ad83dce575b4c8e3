use chrono::{DateTime, Local};
use rusqlite::{params, Connection, Result};
use std::error::Error;
use std::path::{Path, PathBuf};

use crate::app_dirs::AppDirs;
use crate::session::{SessionRecord, SessionSink, TelemetryRow};
use crate::tracking::Joint;

/// One finished game as read back from the database.
#[derive(Debug, Clone, PartialEq)]
pub struct GameSummary {
    pub id: i64,
    pub user_id: String,
    pub start_date: DateTime<Local>,
    pub end_date: DateTime<Local>,
    pub successes: u64,
    pub failures: u64,
}

/// Database manager for finished games and per-tick telemetry.
#[derive(Debug)]
pub struct GameDb {
    conn: Connection,
    /// (engine game counter, allocated games.id) for the game currently
    /// receiving telemetry.
    active_game: Option<(u64, i64)>,
}

impl GameDb {
    /// Opens (or creates) the database at the default state path.
    pub fn new() -> Result<Self> {
        let db_path = AppDirs::db_path().unwrap_or_else(|| PathBuf::from("fruitreach.db"));
        Self::open(db_path)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CANTOPEN),
                    Some(format!("Failed to create directory: {}", e)),
                )
            })?;
        }

        let conn = Connection::open(path)?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS games (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                start_date TEXT NOT NULL,
                end_date TEXT NOT NULL,
                successes INTEGER NOT NULL,
                failures INTEGER NOT NULL
            )
            "#,
            [],
        )?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS game_data (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                game_id INTEGER NOT NULL,
                tick INTEGER NOT NULL,
                elapsed_secs INTEGER NOT NULL,
                fruit_x REAL NOT NULL,
                fruit_y REAL NOT NULL,
                head_x REAL, head_y REAL,
                neck_x REAL, neck_y REAL,
                left_shoulder_x REAL, left_shoulder_y REAL,
                right_shoulder_x REAL, right_shoulder_y REAL,
                left_elbow_x REAL, left_elbow_y REAL,
                right_elbow_x REAL, right_elbow_y REAL,
                left_hand_x REAL, left_hand_y REAL,
                right_hand_x REAL, right_hand_y REAL,
                left_hip_x REAL, left_hip_y REAL,
                right_hip_x REAL, right_hip_y REAL
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_game_data_game ON game_data(game_id)",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_games_user ON games(user_id)",
            [],
        )?;

        Ok(GameDb {
            conn,
            active_game: None,
        })
    }

    /// Number of games on record.
    pub fn game_count(&self) -> Result<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM games", [], |row| row.get(0))
    }

    /// The id telemetry rows of game `seq` are stored under. Allocated on
    /// first use so telemetry written before the game row exists still
    /// groups correctly.
    fn game_id_for(&mut self, seq: u64) -> Result<i64> {
        if let Some((active_seq, id)) = self.active_game {
            if active_seq == seq {
                return Ok(id);
            }
        }
        let next: i64 = self.conn.query_row(
            r#"
            SELECT 1 + MAX(
                COALESCE((SELECT MAX(id) FROM games), 0),
                COALESCE((SELECT MAX(game_id) FROM game_data), 0)
            )
            "#,
            [],
            |row| row.get(0),
        )?;
        self.active_game = Some((seq, next));
        Ok(next)
    }

    fn insert_telemetry(&mut self, row: &TelemetryRow) -> Result<()> {
        let game_id = self.game_id_for(row.game)?;

        fn x(j: Option<Joint>) -> Option<f64> {
            j.map(|j| j.x as f64)
        }
        fn y(j: Option<Joint>) -> Option<f64> {
            j.map(|j| j.y as f64)
        }

        let j = &row.joints;
        self.conn.execute(
            r#"
            INSERT INTO game_data
            (game_id, tick, elapsed_secs, fruit_x, fruit_y,
             head_x, head_y, neck_x, neck_y,
             left_shoulder_x, left_shoulder_y, right_shoulder_x, right_shoulder_y,
             left_elbow_x, left_elbow_y, right_elbow_x, right_elbow_y,
             left_hand_x, left_hand_y, right_hand_x, right_hand_y,
             left_hip_x, left_hip_y, right_hip_x, right_hip_y)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                    ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25)
            "#,
            params![
                game_id,
                row.tick,
                row.elapsed_secs,
                row.target.x as f64,
                row.target.y as f64,
                x(j.head),
                y(j.head),
                x(j.neck),
                y(j.neck),
                x(j.left_shoulder),
                y(j.left_shoulder),
                x(j.right_shoulder),
                y(j.right_shoulder),
                x(j.left_elbow),
                y(j.left_elbow),
                x(j.right_elbow),
                y(j.right_elbow),
                x(j.left_hand),
                y(j.left_hand),
                x(j.right_hand),
                y(j.right_hand),
                x(j.left_hip),
                y(j.left_hip),
                x(j.right_hip),
                y(j.right_hip),
            ],
        )?;

        Ok(())
    }

    fn insert_game(&mut self, record: &SessionRecord) -> Result<i64> {
        let game_id = match self.active_game.take() {
            Some((_, id)) => id,
            // A game with no telemetry still gets a fresh id.
            None => self.game_id_for(u64::MAX)?,
        };
        self.active_game = None;

        self.conn.execute(
            r#"
            INSERT INTO games (id, user_id, start_date, end_date, successes, failures)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                game_id,
                record.user_id,
                record.start_date.to_rfc3339(),
                record.end_date.to_rfc3339(),
                record.successes,
                record.failures,
            ],
        )?;

        Ok(game_id)
    }

    fn summaries_from_stmt(
        mut stmt: rusqlite::Statement<'_>,
        args: impl rusqlite::Params,
    ) -> Result<Vec<GameSummary>> {
        let iter = stmt.query_map(args, |row| {
            let start: String = row.get(2)?;
            let end: String = row.get(3)?;
            let parse = |s: &str, idx: usize| {
                DateTime::parse_from_rfc3339(s)
                    .map(|d| d.with_timezone(&Local))
                    .map_err(|_| {
                        rusqlite::Error::InvalidColumnType(
                            idx,
                            "date".to_string(),
                            rusqlite::types::Type::Text,
                        )
                    })
            };
            Ok(GameSummary {
                id: row.get(0)?,
                user_id: row.get(1)?,
                start_date: parse(&start, 2)?,
                end_date: parse(&end, 3)?,
                successes: row.get(4)?,
                failures: row.get(5)?,
            })
        })?;

        let mut games = Vec::new();
        for game in iter {
            games.push(game?);
        }
        Ok(games)
    }

    /// Most recent games first.
    pub fn recent_games(&self, limit: usize) -> Result<Vec<GameSummary>> {
        let stmt = self.conn.prepare(
            r#"
            SELECT id, user_id, start_date, end_date, successes, failures
            FROM games
            ORDER BY end_date DESC
            LIMIT ?1
            "#,
        )?;
        Self::summaries_from_stmt(stmt, [limit as i64])
    }

    /// All games played by one user, most recent first.
    pub fn games_for_user(&self, user_id: &str) -> Result<Vec<GameSummary>> {
        let stmt = self.conn.prepare(
            r#"
            SELECT id, user_id, start_date, end_date, successes, failures
            FROM games
            WHERE user_id = ?1
            ORDER BY end_date DESC
            "#,
        )?;
        Self::summaries_from_stmt(stmt, [user_id])
    }

    /// Lifetime totals for one user across all recorded games.
    pub fn user_totals(&self, user_id: &str) -> Result<(u64, u64)> {
        self.conn.query_row(
            r#"
            SELECT COALESCE(SUM(successes), 0), COALESCE(SUM(failures), 0)
            FROM games WHERE user_id = ?1
            "#,
            [user_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
    }

    pub fn telemetry_count(&self, game_id: i64) -> Result<i64> {
        self.conn.query_row(
            "SELECT COUNT(*) FROM game_data WHERE game_id = ?1",
            [game_id],
            |row| row.get(0),
        )
    }

    /// Writes one game's telemetry to a CSV file for external analysis.
    pub fn export_telemetry_csv<P: AsRef<Path>>(
        &self,
        game_id: i64,
        path: P,
    ) -> Result<usize, Box<dyn Error>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT tick, elapsed_secs, fruit_x, fruit_y,
                   left_hand_x, left_hand_y, right_hand_x, right_hand_y
            FROM game_data
            WHERE game_id = ?1
            ORDER BY tick
            "#,
        )?;

        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record([
            "tick",
            "elapsed_secs",
            "fruit_x",
            "fruit_y",
            "left_hand_x",
            "left_hand_y",
            "right_hand_x",
            "right_hand_y",
        ])?;

        let mut rows = 0usize;
        let iter = stmt.query_map([game_id], |row| {
            let tick: i64 = row.get(0)?;
            let elapsed: i64 = row.get(1)?;
            let fx: f64 = row.get(2)?;
            let fy: f64 = row.get(3)?;
            let lhx: Option<f64> = row.get(4)?;
            let lhy: Option<f64> = row.get(5)?;
            let rhx: Option<f64> = row.get(6)?;
            let rhy: Option<f64> = row.get(7)?;
            Ok((tick, elapsed, fx, fy, lhx, lhy, rhx, rhy))
        })?;

        for row in iter {
            let (tick, elapsed, fx, fy, lhx, lhy, rhx, rhy) = row?;
            let fmt = |v: Option<f64>| v.map(|v| v.to_string()).unwrap_or_default();
            writer.write_record([
                tick.to_string(),
                elapsed.to_string(),
                fx.to_string(),
                fy.to_string(),
                fmt(lhx),
                fmt(lhy),
                fmt(rhx),
                fmt(rhy),
            ])?;
            rows += 1;
        }

        writer.flush()?;
        Ok(rows)
    }
}

impl SessionSink for GameDb {
    fn append_telemetry(&mut self, row: &TelemetryRow) -> Result<(), Box<dyn Error>> {
        self.insert_telemetry(row)?;
        Ok(())
    }

    fn close_session(&mut self, record: &SessionRecord) -> Result<(), Box<dyn Error>> {
        self.insert_game(record)?;
        Ok(())
    }
}
