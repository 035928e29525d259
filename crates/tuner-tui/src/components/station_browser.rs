//! StationBrowser component: the filterable station list shown on the
//! Radio and Search pages.

use std::time::Instant;

use ratatui::crossterm::event::{
    KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{List, ListItem, ListState, Paragraph},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use tuner_proto::playback::PlaybackStatus;
use tuner_proto::station::Station;

use crate::{
    action::{Action, ComponentId},
    app_state::AppState,
    component::Component,
    theme::{
        C_BADGE_PENDING, C_CONNECTING, C_MUTED, C_PLAYING, C_PRIMARY, C_SECONDARY,
        C_SELECTION_BG, C_TAG,
    },
    widgets::{
        filter_input::{FilterAction, FilterInput},
        pane_chrome::{pane_chrome, Badge},
        station_list::StationList,
    },
};

const NOW_PLAYING: &str = "Now Playing";
const DOUBLE_CLICK_MS: u128 = 400;
/// Widest a station name may render before it is cut with "…".
const MAX_NAME_WIDTH: usize = 40;

pub struct StationBrowser {
    pub list: StationList,
    pub filter_input: FilterInput,
    list_state: ListState,
    /// Track last click (row index, time) for double-click detection.
    last_click: Option<(usize, Instant)>,
}

impl StationBrowser {
    pub fn new() -> Self {
        Self {
            list: StationList::new(),
            filter_input: FilterInput::new("station name or tags…"),
            list_state: ListState::default(),
            last_click: None,
        }
    }

    /// Replace the items from a fresh snapshot, keeping the selected station
    /// if it is still in the directory.
    pub fn sync_stations(&mut self, state: &AppState) {
        self.list.replace(state.daemon_state.stations.clone());
    }

    pub fn open_filter(&mut self) {
        self.filter_input.activate();
    }

    /// Hide the filter bar; the typed term stays applied.
    pub fn close_filter(&mut self) {
        self.filter_input.deactivate();
    }

    pub fn is_filter_active(&self) -> bool {
        self.filter_input.is_active()
    }

    fn select_selected(&self) -> Vec<Action> {
        self.list
            .current()
            .map(|s| vec![Action::Select(s.id.clone())])
            .unwrap_or_default()
    }
}

impl Default for StationBrowser {
    fn default() -> Self {
        Self::new()
    }
}

/// One row of the list: status icon, name, now-playing marker and tags.
fn render_item<'a>(station: &'a Station, is_selected: bool, state: &AppState) -> ListItem<'a> {
    let playback = &state.daemon_state.playback;
    let is_current = playback
        .current_station
        .as_ref()
        .map(|s| s.id == station.id)
        .unwrap_or(false);
    let now_playing = state.daemon_state.is_now_playing(&station.id);

    let (icon, icon_color): (&'static str, Color) = if state.is_pending(&station.id) {
        ("⋯", C_BADGE_PENDING)
    } else if is_current {
        match playback.status {
            PlaybackStatus::Playing => ("▶", C_PLAYING),
            PlaybackStatus::Connecting => ("⋯", C_CONNECTING),
            PlaybackStatus::Paused => ("⏸", C_CONNECTING),
            PlaybackStatus::Idle => (" ", C_MUTED),
        }
    } else {
        (" ", C_MUTED)
    };

    let name_style = if now_playing {
        Style::default().fg(C_PLAYING).add_modifier(Modifier::BOLD)
    } else if is_selected {
        Style::default().fg(C_PRIMARY).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(C_SECONDARY)
    };

    let mut spans = vec![
        Span::styled(format!(" {} ", icon), Style::default().fg(icon_color)),
        Span::styled(truncate(&station.name, MAX_NAME_WIDTH), name_style),
    ];
    if now_playing {
        spans.push(Span::styled(
            format!("  {}", NOW_PLAYING),
            Style::default().fg(C_PLAYING),
        ));
    }
    let tag_color = if station.tags.is_some() {
        C_TAG
    } else {
        C_MUTED
    };
    spans.push(Span::styled("  ", Style::default()));
    spans.push(Span::styled(
        station.tags_label().to_string(),
        Style::default().fg(tag_color),
    ));

    let item_bg = if is_selected {
        Style::default().bg(C_SELECTION_BG)
    } else {
        Style::default()
    };
    ListItem::new(Line::from(spans)).style(item_bg)
}

/// Cut `text` to at most `max` display columns.
fn truncate(text: &str, max: usize) -> String {
    if text.width() <= max {
        return text.to_string();
    }
    let mut out = String::new();
    let mut width = 0;
    for c in text.chars() {
        let w = unicode_width::UnicodeWidthChar::width(c).unwrap_or(0);
        if width + w + 1 > max {
            break;
        }
        width += w;
        out.push(c);
    }
    out.push('…');
    out
}

impl Component for StationBrowser {
    fn id(&self) -> ComponentId {
        ComponentId::StationBrowser
    }

    fn handle_key(&mut self, key: KeyEvent, _state: &AppState) -> Vec<Action> {
        if key.kind == KeyEventKind::Release {
            return vec![];
        }

        if self.filter_input.is_active() {
            match key.code {
                KeyCode::Up => {
                    self.list.step(-1);
                    return vec![];
                }
                KeyCode::Down => {
                    self.list.step(1);
                    return vec![];
                }
                _ => {}
            }
            return match self.filter_input.handle_key(key) {
                FilterAction::Changed(q) => {
                    self.list.set_term(&q);
                    vec![]
                }
                // Enter in the filter both confirms it and plays the row.
                FilterAction::Confirmed => self.select_selected(),
                FilterAction::Cancelled => {
                    self.list.set_term("");
                    vec![Action::CloseFilter]
                }
            };
        }

        let step: isize = if key.modifiers.contains(KeyModifiers::SHIFT) {
            5
        } else {
            1
        };
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => self.list.step(-step),
            KeyCode::Down | KeyCode::Char('j') => self.list.step(step),
            KeyCode::PageUp => self.list.step(-10),
            KeyCode::PageDown => self.list.step(10),
            KeyCode::Home | KeyCode::Char('g') => self.list.to_start(),
            KeyCode::End | KeyCode::Char('G') => self.list.to_end(),
            KeyCode::Enter | KeyCode::Char(' ') => return self.select_selected(),
            KeyCode::Char('/') => {
                self.filter_input.activate();
                return vec![Action::OpenFilter];
            }
            _ => {}
        }
        vec![]
    }

    fn handle_mouse(&mut self, event: MouseEvent, area: Rect, _state: &AppState) -> Vec<Action> {
        let rel_row = event.row.saturating_sub(area.y + 1) as usize; // +1 for the border
        match event.kind {
            MouseEventKind::ScrollUp => self.list.step(-1),
            MouseEventKind::ScrollDown => self.list.step(1),
            MouseEventKind::Down(MouseButton::Left) => {
                let now = Instant::now();
                let is_double = self
                    .last_click
                    .map(|(row, t)| row == rel_row && t.elapsed().as_millis() < DOUBLE_CLICK_MS)
                    .unwrap_or(false);

                if self.list.click(rel_row) && is_double {
                    self.last_click = None;
                    return self.select_selected();
                }
                self.last_click = Some((rel_row, now));
            }
            _ => {}
        }
        vec![]
    }

    fn on_action(&mut self, action: &Action, state: &AppState) -> Vec<Action> {
        match action {
            Action::OpenFilter => self.filter_input.activate(),
            Action::CloseFilter => self.close_filter(),
            Action::StateRefreshed => self.sync_stations(state),
            _ => {}
        }
        vec![]
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, focused: bool, state: &AppState) {
        let loading = state.directory_loading();
        let badge = loading.then_some(Badge {
            text: "LOADING",
            color: C_BADGE_PENDING,
        });
        let block = pane_chrome("stations", None, focused, badge);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let show_filter = self.filter_input.is_active() || !self.list.term().is_empty();
        let (list_area, filter_area) = if show_filter && inner.height > 1 {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Min(0), Constraint::Length(1)])
                .split(inner);
            (chunks[0], Some(chunks[1]))
        } else {
            (inner, None)
        };

        if let Some(fa) = filter_area {
            self.filter_input.draw(frame, fa);
        }

        if self.list.total() == 0 {
            let msg = if loading {
                "  loading stations…"
            } else {
                "  no stations available"
            };
            frame.render_widget(
                Paragraph::new(Span::styled(msg, Style::default().fg(C_MUTED))),
                list_area,
            );
            return;
        }
        if self.list.is_empty() {
            frame.render_widget(
                Paragraph::new(Span::styled(
                    "  no stations match filter",
                    Style::default().fg(C_MUTED),
                )),
                list_area,
            );
            return;
        }

        let height = list_area.height as usize;
        self.list.scroll(height);
        let items: Vec<ListItem> = self
            .list
            .window(height)
            .into_iter()
            .map(|row| render_item(row.station, row.under_cursor, state))
            .collect();

        self.list_state.select(Some(self.list.cursor_row()));
        frame.render_stateful_widget(List::new(items), list_area, &mut self.list_state);
    }
}
