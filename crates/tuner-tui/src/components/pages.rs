//! Read-only pages: Home (now playing + directory summary) and the admin
//! dashboard.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Wrap},
    Frame,
};

use tuner_proto::playback::PlaybackStatus;
use tuner_proto::protocol::PlayerHealth;

use crate::{
    app_state::AppState,
    theme::{
        style_heading, style_label, style_value, C_ACCENT, C_BADGE_ERR, C_BADGE_LIVE,
        C_BADGE_PENDING, C_CONNECTING, C_MUTED, C_PLAYING, C_TAG,
    },
    widgets::pane_chrome::{pane_chrome, Badge},
};

fn row<'a>(label: &'a str, value: impl Into<Span<'a>>) -> Line<'a> {
    Line::from(vec![
        Span::styled(format!("  {:<14}", label), style_label()),
        value.into(),
    ])
}

fn status_span(status: PlaybackStatus) -> Span<'static> {
    match status {
        PlaybackStatus::Idle => Span::styled("idle", Style::default().fg(C_MUTED)),
        PlaybackStatus::Connecting => Span::styled("connecting", Style::default().fg(C_CONNECTING)),
        PlaybackStatus::Playing => Span::styled(
            "playing",
            Style::default().fg(C_PLAYING).add_modifier(Modifier::BOLD),
        ),
        PlaybackStatus::Paused => Span::styled("paused", Style::default().fg(C_CONNECTING)),
    }
}

fn health_span(health: &PlayerHealth) -> Span<'static> {
    match health {
        PlayerHealth::Absent => Span::styled("not started", Style::default().fg(C_MUTED)),
        PlayerHealth::Starting => Span::styled("starting", Style::default().fg(C_BADGE_PENDING)),
        PlayerHealth::Running => Span::styled("running", Style::default().fg(C_BADGE_LIVE)),
        PlayerHealth::Dead => Span::styled("dead", Style::default().fg(C_BADGE_ERR)),
    }
}

fn directory_lines(state: &AppState) -> Vec<Line<'static>> {
    let ds = &state.daemon_state;
    let loading = if state.directory_loading() {
        Span::styled("yes", Style::default().fg(C_BADGE_PENDING))
    } else {
        Span::styled("no", style_value())
    };
    vec![
        row("stations", Span::styled(ds.stations.len().to_string(), style_value())),
        row("source", Span::styled(ds.origin.label(), style_value())),
        row("loading", loading),
    ]
}

/// Home page: what is playing and what the directory holds.
pub fn draw_home(frame: &mut Frame, area: Rect, focused: bool, state: &AppState) {
    let badge = state.daemon_state.playback.is_playing.then_some(Badge {
        text: "LIVE",
        color: C_BADGE_LIVE,
    });
    let block = pane_chrome("home", None, focused, badge);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let playback = &state.daemon_state.playback;
    let mut lines = vec![Line::from(Span::styled(" now playing", style_heading()))];
    match &playback.current_station {
        Some(station) => {
            lines.push(row(
                "station",
                Span::styled(station.name.clone(), style_value().add_modifier(Modifier::BOLD)),
            ));
            lines.push(row("status", status_span(playback.status)));
            lines.push(row(
                "tags",
                Span::styled(station.tags_label().to_string(), Style::default().fg(C_TAG)),
            ));
        }
        None => lines.push(row(
            "station",
            Span::styled("nothing selected", Style::default().fg(C_MUTED)),
        )),
    }

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(" directory", style_heading())));
    lines.extend(directory_lines(state));

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "  press 3 to browse stations, 2 to search",
        Style::default().fg(C_MUTED),
    )));

    frame.render_widget(Paragraph::new(lines), inner);
}

/// Admin dashboard: directory provenance, player health and recent
/// warnings.
pub fn draw_admin(frame: &mut Frame, area: Rect, focused: bool, state: &AppState) {
    let ds = &state.daemon_state;
    let badge = ds.player_health.badge_label().map(|text| Badge {
        text,
        color: if ds.player_health.is_unhealthy() {
            C_BADGE_ERR
        } else {
            C_BADGE_PENDING
        },
    });
    let block = pane_chrome("admin dashboard", None, focused, badge);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(12), Constraint::Min(0)])
        .split(inner);

    let mut lines = vec![Line::from(Span::styled(" directory", style_heading()))];
    lines.extend(directory_lines(state));
    match &ds.last_load {
        Some(report) if report.failures.is_empty() => {
            lines.push(row("last load", Span::styled("ok", Style::default().fg(C_PLAYING))));
        }
        Some(report) => {
            for failure in &report.failures {
                lines.push(row(
                    "failed",
                    Span::styled(
                        format!("{}: {}", failure.source_name, failure.error),
                        Style::default().fg(C_ACCENT),
                    ),
                ));
            }
        }
        None => lines.push(row("last load", Span::styled("pending", Style::default().fg(C_MUTED)))),
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(" player", style_heading())));
    lines.push(row("mpv", health_span(&ds.player_health)));
    lines.push(row("playback", status_span(ds.playback.status)));
    lines.push(row(
        "log file",
        Span::styled(state.log_path.display().to_string(), style_value()),
    ));
    frame.render_widget(Paragraph::new(lines), chunks[0]);

    let mut log_lines = vec![Line::from(Span::styled(" warnings", style_heading()))];
    if state.logs.is_empty() {
        log_lines.push(Line::from(Span::styled("  none", Style::default().fg(C_MUTED))));
    }
    let room = (chunks[1].height as usize).saturating_sub(1);
    let skip = state.logs.len().saturating_sub(room);
    log_lines.extend(state.logs.iter().skip(skip).map(|l| {
        let color = if l.contains("[ERROR]") {
            C_BADGE_ERR
        } else {
            C_CONNECTING
        };
        Line::from(Span::styled(format!("  {}", l), Style::default().fg(color)))
    }));
    frame.render_widget(
        Paragraph::new(log_lines).wrap(Wrap { trim: false }),
        chunks[1],
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::{backend::TestBackend, Terminal};
    use std::path::PathBuf;
    use tuner_proto::directory::{DirectoryOrigin, LoadReport, SourceFailure};
    use tuner_proto::protocol::DaemonState;
    use tuner_proto::station::seed_stations;

    fn render(draw: fn(&mut Frame, Rect, bool, &AppState), state: &AppState) -> String {
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        terminal
            .draw(|f| {
                let area = f.area();
                draw(f, area, true, state)
            })
            .unwrap();
        let buffer = terminal.backend().buffer().clone();
        buffer
            .content()
            .chunks(80)
            .map(|row| row.iter().map(|c| c.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_home_shows_directory_summary() {
        let mut state = AppState::new(None, PathBuf::new());
        state.apply_daemon_state(DaemonState {
            rev: 1,
            stations: seed_stations(),
            origin: DirectoryOrigin::Seed,
            ..DaemonState::default()
        });
        let screen = render(draw_home, &state);
        assert!(screen.contains("nothing selected"));
        assert!(screen.contains("built-in stations"));
    }

    #[test]
    fn test_admin_lists_source_failures() {
        let mut state = AppState::new(None, PathBuf::new());
        state.apply_daemon_state(DaemonState {
            rev: 1,
            origin: DirectoryOrigin::Seed,
            last_load: Some(LoadReport {
                origin: DirectoryOrigin::Seed,
                count: 3,
                failures: vec![SourceFailure {
                    source_name: "primary".into(),
                    error: "status 503".into(),
                }],
            }),
            player_health: PlayerHealth::Dead,
            ..DaemonState::default()
        });
        let screen = render(draw_admin, &state);
        assert!(screen.contains("primary: status 503"));
        assert!(screen.contains("DEAD"));
    }
}
