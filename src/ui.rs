use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph, Widget, Wrap},
};

use crate::mode::Mode;
use crate::session::Snapshot;
use crate::target::FruitKind;

/// Renders one tick's snapshot. The view is deliberately read-only: the
/// engine hands it a snapshot after each tick and keeps all state itself.
pub struct SnapshotView<'a> {
    pub snapshot: &'a Snapshot,
    pub board_width: f32,
    pub board_height: f32,
}

impl<'a> SnapshotView<'a> {
    pub fn new(snapshot: &'a Snapshot) -> Self {
        Self {
            snapshot,
            board_width: 640.0,
            board_height: 480.0,
        }
    }

    fn fruit_color(kind: FruitKind) -> Color {
        match kind {
            FruitKind::Apple => Color::Red,
            FruitKind::Cherry => Color::Magenta,
            FruitKind::Orange => Color::Yellow,
            FruitKind::Tomato => Color::LightRed,
            FruitKind::Watermelon => Color::Green,
        }
    }

    fn render_waiting(&self, area: Rect, buf: &mut Buffer) {
        let message = Paragraph::new(vec![
            Line::from(Span::styled(
                self.snapshot.presence.status_text(),
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(
                "stand in front of the sensor to begin",
                Style::default().add_modifier(Modifier::ITALIC),
            )),
        ])
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });

        message.render(area, buf);
    }

    fn render_playfield(&self, area: Rect, buf: &mut Buffer) {
        let snap = self.snapshot;

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1), // session countdown
                Constraint::Min(3),    // playfield
                Constraint::Length(1), // target countdown
                Constraint::Length(1), // status bar
            ])
            .split(area);

        let timer = Paragraph::new(format!("time left: {}s", snap.time_remaining.as_secs()))
            .alignment(Alignment::Center)
            .style(Style::default().add_modifier(Modifier::BOLD));
        timer.render(chunks[0], buf);

        let field = Block::default().borders(Borders::ALL);
        let inner = field.inner(chunks[1]);
        field.render(chunks[1], buf);

        if let Some(target) = &snap.target {
            // Scale sensor coordinates down to the terminal playfield.
            let col = (target.x / self.board_width * inner.width as f32) as u16;
            let row = (target.y / self.board_height * inner.height as f32) as u16;
            let col = inner.x + col.min(inner.width.saturating_sub(1));
            let row = inner.y + row.min(inner.height.saturating_sub(1));

            if inner.width > 0 && inner.height > 0 {
                buf.set_string(
                    col,
                    row,
                    "()",
                    Style::default()
                        .fg(Self::fruit_color(target.kind))
                        .add_modifier(Modifier::BOLD),
                );
            }
        }

        if snap.mode.is_pause_family() {
            let overlay = Paragraph::new(Span::styled(
                if matches!(
                    snap.mode,
                    Mode::UserLostPausing | Mode::UserLostPaused | Mode::UserLostResuming
                ) {
                    "USER LOST - the clock is stopped"
                } else {
                    "PAUSED - press p to resume"
                },
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            ))
            .alignment(Alignment::Center);
            let overlay_area = Rect {
                x: inner.x,
                y: inner.y + inner.height / 2,
                width: inner.width,
                height: 1,
            };
            overlay.render(overlay_area, buf);
        }

        let gauge = Gauge::default()
            .ratio(self.snapshot.target_progress.clamp(0.0, 1.0))
            .gauge_style(Style::default().fg(Color::Cyan))
            .label("");
        gauge.render(chunks[2], buf);

        let status = Line::from(vec![
            Span::styled(
                format!(" {} ", snap.score.successes),
                Style::default()
                    .fg(Color::Green)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw("hits  "),
            Span::styled(
                format!(" {} ", snap.score.failures),
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            ),
            Span::raw("misses  "),
            Span::styled(
                snap.presence.status_text(),
                Style::default().add_modifier(Modifier::DIM),
            ),
        ]);
        Paragraph::new(status)
            .alignment(Alignment::Center)
            .render(chunks[3], buf);
    }

    fn render_score_screen(&self, area: Rect, buf: &mut Buffer) {
        let snap = self.snapshot;
        let lines = vec![
            Line::from(Span::styled(
                "TIME'S UP",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::default(),
            Line::from(vec![
                Span::styled(
                    format!("{}", snap.score.successes),
                    Style::default()
                        .fg(Color::Green)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::raw(" fruits caught, "),
                Span::styled(
                    format!("{}", snap.score.failures),
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                ),
                Span::raw(" missed"),
            ]),
            Line::from(format!("played for {}s", snap.elapsed.as_secs())),
            Line::default(),
            Line::from(Span::styled(
                "(n) new game  (esc) exit",
                Style::default().add_modifier(Modifier::ITALIC),
            )),
        ];

        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .render(area, buf);
    }
}

impl Widget for &SnapshotView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        match self.snapshot.mode {
            Mode::Starting => self.render_waiting(area, buf),
            Mode::ScoreScreen | Mode::Leaving => self.render_score_screen(area, buf),
            _ => self.render_playfield(area, buf),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::Score;
    use crate::target::TargetDescriptor;
    use crate::tracking::PresenceState;
    use ratatui::{backend::TestBackend, Terminal};
    use std::time::Duration;

    fn snapshot(mode: Mode) -> Snapshot {
        Snapshot {
            mode,
            score: Score {
                successes: 3,
                failures: 1,
            },
            elapsed: Duration::from_secs(20),
            time_remaining: Duration::from_secs(40),
            target: Some(TargetDescriptor {
                x: 300.0,
                y: 200.0,
                width: 80.0,
                height: 80.0,
                kind: FruitKind::Apple,
            }),
            target_progress: 0.5,
            presence: PresenceState::Tracking,
        }
    }

    fn render(snap: &Snapshot) -> String {
        let backend = TestBackend::new(60, 18);
        let mut terminal = Terminal::new(backend).unwrap();
        let view = SnapshotView::new(snap);
        terminal.draw(|f| f.render_widget(&view, f.area())).unwrap();
        let buffer = terminal.backend().buffer();
        buffer.content.iter().map(|c| c.symbol()).collect()
    }

    #[test]
    fn starting_screen_shows_presence_text() {
        let mut snap = snapshot(Mode::Starting);
        snap.presence = PresenceState::NotFound;
        let content = render(&snap);
        assert!(content.contains("LOOKING FOR USER"));
    }

    #[test]
    fn playfield_shows_score_and_timer() {
        let content = render(&snapshot(Mode::Playing));
        assert!(content.contains("time left: 40s"));
        assert!(content.contains("hits"));
        assert!(content.contains("misses"));
    }

    #[test]
    fn pause_overlay_distinguishes_user_lost() {
        let content = render(&snapshot(Mode::Paused));
        assert!(content.contains("PAUSED"));

        let content = render(&snapshot(Mode::UserLostPaused));
        assert!(content.contains("USER LOST"));
    }

    #[test]
    fn score_screen_summarizes_game() {
        let content = render(&snapshot(Mode::ScoreScreen));
        assert!(content.contains("TIME'S UP"));
        assert!(content.contains("fruits caught"));
        assert!(content.contains("played for 20s"));
    }
}
