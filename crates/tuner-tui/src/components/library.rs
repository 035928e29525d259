//! Library component: stations heard this session, most recent first.

use ratatui::crossterm::event::{
    KeyCode, KeyEvent, KeyEventKind, MouseButton, MouseEvent, MouseEventKind,
};
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{List, ListItem, ListState, Paragraph},
    Frame,
};

use crate::{
    action::{Action, ComponentId},
    app_state::AppState,
    component::Component,
    theme::{C_MUTED, C_PLAYING, C_PRIMARY, C_SECONDARY, C_SELECTION_BG, C_TAG},
    widgets::{pane_chrome::pane_chrome, station_list::StationList},
};

pub struct Library {
    list: StationList,
    list_state: ListState,
}

impl Library {
    pub fn new() -> Self {
        Self {
            list: StationList::new(),
            list_state: ListState::default(),
        }
    }

    pub fn sync(&mut self, state: &AppState) {
        self.list.replace(state.library.clone());
    }

    fn select_selected(&self) -> Vec<Action> {
        self.list
            .current()
            .map(|s| vec![Action::Select(s.id.clone())])
            .unwrap_or_default()
    }
}

impl Default for Library {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for Library {
    fn id(&self) -> ComponentId {
        ComponentId::Library
    }

    fn handle_key(&mut self, key: KeyEvent, _state: &AppState) -> Vec<Action> {
        if key.kind == KeyEventKind::Release {
            return vec![];
        }
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => self.list.step(-1),
            KeyCode::Down | KeyCode::Char('j') => self.list.step(1),
            KeyCode::Home | KeyCode::Char('g') => self.list.to_start(),
            KeyCode::End | KeyCode::Char('G') => self.list.to_end(),
            KeyCode::Enter | KeyCode::Char(' ') => return self.select_selected(),
            _ => {}
        }
        vec![]
    }

    fn handle_mouse(&mut self, event: MouseEvent, area: Rect, _state: &AppState) -> Vec<Action> {
        match event.kind {
            MouseEventKind::ScrollUp => self.list.step(-1),
            MouseEventKind::ScrollDown => self.list.step(1),
            MouseEventKind::Down(MouseButton::Left) => {
                let row = event.row.saturating_sub(area.y + 1) as usize;
                if self.list.click(row) {
                    return self.select_selected();
                }
            }
            _ => {}
        }
        vec![]
    }

    fn on_action(&mut self, action: &Action, state: &AppState) -> Vec<Action> {
        if *action == Action::StateRefreshed {
            self.sync(state);
        }
        vec![]
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, focused: bool, state: &AppState) {
        let block = pane_chrome("your library", None, focused, None);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        if self.list.is_empty() {
            frame.render_widget(
                Paragraph::new(Span::styled(
                    "  nothing played yet this session",
                    Style::default().fg(C_MUTED),
                )),
                inner,
            );
            return;
        }

        let height = inner.height as usize;
        self.list.scroll(height);
        let items: Vec<ListItem> = self
            .list
            .window(height)
            .into_iter()
            .map(|row| {
                let (station, is_selected) = (row.station, row.under_cursor);
                let now_playing = state.daemon_state.is_now_playing(&station.id);
                let name_style = if now_playing {
                    Style::default().fg(C_PLAYING).add_modifier(Modifier::BOLD)
                } else if is_selected {
                    Style::default().fg(C_PRIMARY).add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(C_SECONDARY)
                };
                let icon = if now_playing { " ▶ " } else { "   " };
                let line = Line::from(vec![
                    Span::styled(icon, Style::default().fg(C_PLAYING)),
                    Span::styled(station.name.clone(), name_style),
                    Span::styled("  ", Style::default()),
                    Span::styled(station.tags_label().to_string(), Style::default().fg(C_TAG)),
                ]);
                let bg = if is_selected {
                    Style::default().bg(C_SELECTION_BG)
                } else {
                    Style::default()
                };
                ListItem::new(line).style(bg)
            })
            .collect();

        self.list_state.select(Some(self.list.cursor_row()));
        frame.render_stateful_widget(List::new(items), inner, &mut self.list_state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::crossterm::event::KeyModifiers;
    use std::path::PathBuf;
    use tuner_proto::playback::{PlaybackSnapshot, PlaybackStatus};
    use tuner_proto::protocol::DaemonState;
    use tuner_proto::station::seed_stations;

    #[test]
    fn test_replays_most_recent_station() {
        let seeds = seed_stations();
        let mut state = AppState::new(None, PathBuf::new());
        for (rev, station) in [(1, &seeds[2]), (2, &seeds[0])] {
            state.apply_daemon_state(DaemonState {
                rev,
                playback: PlaybackSnapshot {
                    current_station: Some(station.clone()),
                    is_playing: true,
                    status: PlaybackStatus::Playing,
                },
                ..DaemonState::default()
            });
        }
        let mut library = Library::new();
        library.on_action(&Action::StateRefreshed, &state);

        let enter = KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE);
        assert_eq!(
            library.handle_key(enter, &state),
            vec![Action::Select("1".into())]
        );
        let down = KeyEvent::new(KeyCode::Down, KeyModifiers::NONE);
        library.handle_key(down, &state);
        assert_eq!(
            library.handle_key(enter, &state),
            vec![Action::Select("3".into())]
        );
    }
}
