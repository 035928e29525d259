//! HelpOverlay component: key reference popup.  Page hotkeys come from the
//! user's navigation entries, so hidden pages are not advertised.

use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyEventKind};
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use tuner_proto::identity::User;

use crate::{
    action::{Action, ComponentId},
    app_state::AppState,
    component::Component,
    nav::{nav_entries, NavEntry},
    theme::{C_MUTED, C_PANEL_BORDER, C_POPUP_BG, C_PRIMARY, C_SECONDARY},
    widgets::pane_chrome::popup_rect,
};

const KEY_COLUMN: usize = 16;

const PLAYBACK_KEYS: &[(&str, &str)] = &[
    ("enter / space", "play the station under the cursor (again to stop)"),
    ("x", "stop"),
    ("R", "reload the station directory"),
];

const MOVEMENT_KEYS: &[(&str, &str)] = &[
    ("[ / ]", "previous / next page"),
    ("tab", "switch focus between sidebar and page"),
    ("↑ ↓  j k", "move the cursor"),
    ("g / G", "first / last station"),
    ("/", "filter by name or tags (esc clears, then closes)"),
    ("?", "this help"),
    ("q / ctrl+c", "quit"),
];

pub struct HelpOverlay {
    open: bool,
    pages: Vec<NavEntry>,
}

impl HelpOverlay {
    pub fn new(user: Option<&User>) -> Self {
        Self {
            open: false,
            pages: nav_entries(user),
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    fn lines(&self) -> Vec<Line<'static>> {
        let heading = |text: &'static str| {
            Line::styled(text, Style::default().fg(C_MUTED).add_modifier(Modifier::BOLD))
        };
        let key_row = |key: String, what: String| {
            Line::from(vec![
                Span::styled(
                    format!(" {:<width$}", key, width = KEY_COLUMN),
                    Style::default().fg(C_PRIMARY).add_modifier(Modifier::BOLD),
                ),
                Span::styled(what, Style::default().fg(C_SECONDARY)),
            ])
        };
        let fixed = |keys: &[(&str, &str)]| -> Vec<Line<'static>> {
            keys.iter()
                .map(|(k, w)| key_row(k.to_string(), w.to_string()))
                .collect()
        };

        let mut lines = vec![heading(" playback")];
        lines.extend(fixed(PLAYBACK_KEYS));
        lines.push(Line::default());
        lines.push(heading(" pages"));
        lines.extend(
            self.pages
                .iter()
                .map(|page| key_row(page.hotkey.to_string(), page.label.to_string())),
        );
        lines.push(Line::default());
        lines.push(heading(" moving around"));
        lines.extend(fixed(MOVEMENT_KEYS));
        lines
    }
}

impl Component for HelpOverlay {
    fn id(&self) -> ComponentId {
        ComponentId::HelpOverlay
    }

    /// While open, every key is swallowed; `?`, `q` and esc close it.
    fn handle_key(&mut self, key: KeyEvent, _state: &AppState) -> Vec<Action> {
        if key.kind == KeyEventKind::Release || !self.open {
            return vec![];
        }
        if matches!(key.code, KeyCode::Char('?' | 'q') | KeyCode::Esc) {
            self.open = false;
        }
        vec![]
    }

    fn on_action(&mut self, action: &Action, _state: &AppState) -> Vec<Action> {
        if *action == Action::ToggleHelp {
            self.open = !self.open;
        }
        vec![]
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, _focused: bool, _state: &AppState) {
        if !self.open {
            return;
        }
        let lines = self.lines();
        let popup = popup_rect(64, lines.len() as u16 + 2, area);
        frame.render_widget(Clear, popup);
        frame.render_widget(
            Paragraph::new(lines).block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(C_PANEL_BORDER))
                    .title(Span::styled(" keys ", Style::default().fg(C_PRIMARY)))
                    .title_bottom(Line::styled(" ? to close ", Style::default().fg(C_MUTED)))
                    .style(Style::default().bg(C_POPUP_BG)),
            ),
            popup,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::crossterm::event::KeyModifiers;
    use std::path::PathBuf;

    fn text(help: &HelpOverlay) -> String {
        help.lines()
            .iter()
            .map(|l| l.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_admin_hotkey_listed_only_for_admins() {
        let admin = User {
            name: "ops".into(),
            role: "admin".into(),
        };
        assert!(text(&HelpOverlay::new(Some(&admin))).contains("Admin Dashboard"));
        assert!(!text(&HelpOverlay::new(None)).contains("Admin Dashboard"));
    }

    #[test]
    fn test_toggle_then_escape_closes() {
        let state = AppState::new(None, PathBuf::new());
        let mut help = HelpOverlay::new(None);
        help.on_action(&Action::ToggleHelp, &state);
        assert!(help.is_open());
        help.handle_key(KeyEvent::new(KeyCode::Char('j'), KeyModifiers::NONE), &state);
        assert!(help.is_open());
        help.handle_key(KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE), &state);
        assert!(!help.is_open());
    }
}
