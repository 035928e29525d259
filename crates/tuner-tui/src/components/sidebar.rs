//! Sidebar component: navigation entries for the current user.

use ratatui::crossterm::event::{
    KeyCode, KeyEvent, KeyEventKind, MouseButton, MouseEvent, MouseEventKind,
};
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::{
    action::{Action, ComponentId},
    app_state::AppState,
    component::Component,
    nav::{nav_entries, NavEntry},
    theme::{C_ACCENT, C_NUMBER_HINT, C_PRIMARY, C_SECONDARY, C_SELECTION_BG},
    widgets::pane_chrome::pane_chrome,
};

pub struct Sidebar {
    /// Keyboard cursor, independent of the page currently shown.
    cursor: usize,
}

impl Sidebar {
    pub fn new() -> Self {
        Self { cursor: 0 }
    }

    fn entries(state: &AppState) -> Vec<NavEntry> {
        nav_entries(state.user.as_ref())
    }
}

impl Default for Sidebar {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for Sidebar {
    fn id(&self) -> ComponentId {
        ComponentId::Sidebar
    }

    fn handle_key(&mut self, key: KeyEvent, state: &AppState) -> Vec<Action> {
        if key.kind == KeyEventKind::Release {
            return vec![];
        }
        let entries = Self::entries(state);
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => self.cursor = self.cursor.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => {
                self.cursor = (self.cursor + 1).min(entries.len().saturating_sub(1))
            }
            KeyCode::Enter | KeyCode::Char(' ') => {
                if let Some(entry) = entries.get(self.cursor) {
                    return vec![Action::Navigate(entry.route)];
                }
            }
            _ => {}
        }
        vec![]
    }

    fn handle_mouse(&mut self, event: MouseEvent, area: Rect, state: &AppState) -> Vec<Action> {
        if let MouseEventKind::Down(MouseButton::Left) = event.kind {
            let row = event.row.saturating_sub(area.y + 1) as usize;
            if let Some(entry) = Self::entries(state).get(row) {
                self.cursor = row;
                return vec![Action::Navigate(entry.route)];
            }
        }
        vec![]
    }

    fn on_action(&mut self, action: &Action, state: &AppState) -> Vec<Action> {
        if let Action::Navigate(route) = action {
            if let Some(pos) = Self::entries(state).iter().position(|e| e.route == *route) {
                self.cursor = pos;
            }
        }
        vec![]
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, focused: bool, state: &AppState) {
        let block = pane_chrome("tuner", None, focused, None);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let lines: Vec<Line> = Self::entries(state)
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let current = entry.route == state.route;
                let marker = if current { "▌" } else { " " };
                let label_style = if current {
                    Style::default().fg(C_PRIMARY).add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(C_SECONDARY)
                };
                let bg = if focused && i == self.cursor {
                    Style::default().bg(C_SELECTION_BG)
                } else {
                    Style::default()
                };
                Line::from(vec![
                    Span::styled(marker, Style::default().fg(C_ACCENT)),
                    Span::styled(
                        format!("{} ", entry.hotkey),
                        Style::default().fg(C_NUMBER_HINT),
                    ),
                    Span::styled(entry.label, label_style),
                ])
                .style(bg)
            })
            .collect();

        frame.render_widget(Paragraph::new(lines), inner);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nav::Route;
    use ratatui::crossterm::event::KeyModifiers;
    use std::path::PathBuf;
    use tuner_proto::identity::User;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_cursor_stops_at_last_visible_entry() {
        let state = AppState::new(None, PathBuf::new());
        let mut sidebar = Sidebar::new();
        for _ in 0..10 {
            sidebar.handle_key(key(KeyCode::Down), &state);
        }
        assert_eq!(
            sidebar.handle_key(key(KeyCode::Enter), &state),
            vec![Action::Navigate(Route::Library)]
        );
    }

    #[test]
    fn test_admin_sees_dashboard_entry() {
        let admin = User {
            name: "root".into(),
            role: "admin".into(),
        };
        let state = AppState::new(Some(admin), PathBuf::new());
        let mut sidebar = Sidebar::new();
        for _ in 0..10 {
            sidebar.handle_key(key(KeyCode::Down), &state);
        }
        assert_eq!(
            sidebar.handle_key(key(KeyCode::Enter), &state),
            vec![Action::Navigate(Route::Admin)]
        );
    }
}
