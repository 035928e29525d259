//! AlertModal component: blocking message box.  While open it swallows
//! every key except the ones that dismiss it.

use std::collections::VecDeque;

use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyEventKind};
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use crate::{
    action::{Action, ComponentId},
    app_state::AppState,
    component::Component,
    theme::{C_ACCENT, C_MUTED, C_POPUP_BG, C_PRIMARY},
    widgets::pane_chrome::popup_rect,
};

pub struct AlertModal {
    /// Alerts raised while another is showing wait their turn.
    queue: VecDeque<String>,
}

impl AlertModal {
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
        }
    }

    pub fn show(&mut self, message: String) {
        if self.queue.back() != Some(&message) {
            self.queue.push_back(message);
        }
    }

    pub fn is_open(&self) -> bool {
        !self.queue.is_empty()
    }

    pub fn message(&self) -> Option<&str> {
        self.queue.front().map(String::as_str)
    }
}

impl Default for AlertModal {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for AlertModal {
    fn id(&self) -> ComponentId {
        ComponentId::AlertModal
    }

    fn handle_key(&mut self, key: KeyEvent, _state: &AppState) -> Vec<Action> {
        if key.kind == KeyEventKind::Release || !self.is_open() {
            return vec![];
        }
        match key.code {
            KeyCode::Enter | KeyCode::Esc | KeyCode::Char(' ') => vec![Action::DismissAlert],
            _ => vec![],
        }
    }

    fn on_action(&mut self, action: &Action, _state: &AppState) -> Vec<Action> {
        if *action == Action::DismissAlert {
            self.queue.pop_front();
        }
        vec![]
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, _focused: bool, _state: &AppState) {
        let Some(message) = self.message() else {
            return;
        };

        let popup = popup_rect(50, 7, area);
        let lines = vec![
            Line::from(""),
            Line::from(Span::styled(
                message.to_string(),
                Style::default().fg(C_PRIMARY).add_modifier(Modifier::BOLD),
            ))
            .centered(),
            Line::from(""),
            Line::from(Span::styled("[ OK ]", Style::default().fg(C_ACCENT))).centered(),
            Line::from(Span::styled(
                "enter to dismiss",
                Style::default().fg(C_MUTED),
            ))
            .centered(),
        ];

        frame.render_widget(Clear, popup);
        frame.render_widget(
            Paragraph::new(lines)
                .block(
                    Block::default()
                        .borders(Borders::ALL)
                        .border_style(Style::default().fg(C_ACCENT))
                        .title(Span::styled(" alert ", Style::default().fg(C_ACCENT)))
                        .style(Style::default().bg(C_POPUP_BG)),
                )
                .wrap(Wrap { trim: true }),
            popup,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::crossterm::event::KeyModifiers;
    use std::path::PathBuf;
    use tuner_proto::playback::START_FAILED_ALERT;

    #[test]
    fn test_enter_dismisses_one_alert_at_a_time() {
        let state = AppState::new(None, PathBuf::new());
        let mut modal = AlertModal::new();
        modal.show(START_FAILED_ALERT.to_string());
        modal.show(START_FAILED_ALERT.to_string());
        modal.show("second".to_string());
        assert_eq!(modal.message(), Some(START_FAILED_ALERT));

        let other = KeyEvent::new(KeyCode::Char('x'), KeyModifiers::NONE);
        assert!(modal.handle_key(other, &state).is_empty());

        let enter = KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE);
        let actions = modal.handle_key(enter, &state);
        assert_eq!(actions, vec![Action::DismissAlert]);
        modal.on_action(&Action::DismissAlert, &state);
        assert_eq!(modal.message(), Some("second"));

        modal.on_action(&Action::DismissAlert, &state);
        assert!(!modal.is_open());
    }
}
