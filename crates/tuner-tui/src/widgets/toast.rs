//! Short-lived notices in the top-right corner, plus the directory-load
//! spinner that stays up until the load reports back.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::Line,
    widgets::{Clear, Paragraph},
    Frame,
};

use tuner_proto::directory::{DirectoryOrigin, LoadReport};

use crate::theme::{C_TOAST_ERROR, C_TOAST_INFO, C_TOAST_SUCCESS, C_TOAST_WARNING};

const MAX_SHOWN: usize = 4;
const SPINNER: [char; 8] = ['⣾', '⣽', '⣻', '⢿', '⡿', '⣟', '⣯', '⣷'];

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Notice {
    Info,
    Success,
    Warning,
    Error,
}

impl Notice {
    fn lifetime(self) -> Duration {
        match self {
            Notice::Info | Notice::Success => Duration::from_secs(3),
            Notice::Warning => Duration::from_secs(4),
            Notice::Error => Duration::from_secs(5),
        }
    }

    fn glyph(self) -> char {
        match self {
            Notice::Info => '·',
            Notice::Success => '✓',
            Notice::Warning => '!',
            Notice::Error => '✗',
        }
    }

    fn color(self) -> Color {
        match self {
            Notice::Info => C_TOAST_INFO,
            Notice::Success => C_TOAST_SUCCESS,
            Notice::Warning => C_TOAST_WARNING,
            Notice::Error => C_TOAST_ERROR,
        }
    }
}

struct Toast {
    notice: Notice,
    text: String,
    until: Instant,
}

#[derive(Default)]
pub struct Toasts {
    queue: VecDeque<Toast>,
    /// Label and animation frame of a running directory load.
    loading: Option<(String, usize)>,
}

impl Toasts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Post `text`; an identical notice already showing is replaced.
    pub fn notify(&mut self, notice: Notice, text: impl Into<String>) {
        self.notify_at(notice, text.into(), Instant::now());
    }

    fn notify_at(&mut self, notice: Notice, text: String, now: Instant) {
        self.queue.retain(|t| t.text != text);
        self.queue.push_back(Toast {
            notice,
            text,
            until: now + notice.lifetime(),
        });
        if self.queue.len() > MAX_SHOWN {
            self.queue.pop_front();
        }
    }

    pub fn loading(&mut self, label: impl Into<String>) {
        self.loading = Some((label.into(), 0));
    }

    pub fn is_loading(&self) -> bool {
        self.loading.is_some()
    }

    /// End the spinner with the outcome of a directory load.  Falling back to
    /// the built-in stations is a warning.
    pub fn load_finished(&mut self, report: &LoadReport) {
        self.loading = None;
        let notice = if report.origin == DirectoryOrigin::Seed {
            Notice::Warning
        } else {
            Notice::Success
        };
        self.notify(
            notice,
            format!("{} stations from {}", report.count, report.origin.label()),
        );
    }

    /// Drop expired notices and advance the spinner.
    pub fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    fn tick_at(&mut self, now: Instant) {
        self.queue.retain(|t| t.until > now);
        if let Some((_, frame)) = &mut self.loading {
            *frame = (*frame + 1) % SPINNER.len();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty() && self.loading.is_none()
    }

    fn lines(&self) -> Vec<Line<'static>> {
        let spinner = self.loading.iter().map(|(label, frame)| {
            Line::styled(
                format!(" {} {} ", SPINNER[*frame], label),
                Style::default()
                    .fg(C_TOAST_INFO)
                    .add_modifier(Modifier::BOLD),
            )
        });
        let notices = self.queue.iter().rev().map(|t| {
            Line::styled(
                format!(" {} {} ", t.notice.glyph(), t.text),
                Style::default()
                    .fg(t.notice.color())
                    .add_modifier(Modifier::BOLD),
            )
        });
        spinner.chain(notices).take(MAX_SHOWN).collect()
    }

    /// Stack the spinner and the newest notices under the top edge of `area`,
    /// right-aligned.
    pub fn draw(&self, frame: &mut Frame, area: Rect) {
        if self.is_empty() || area.height < 2 {
            return;
        }
        let lines = self.lines();
        let widest = lines.iter().map(|l| l.width()).max().unwrap_or(0) as u16;
        let width = widest.min(area.width.saturating_sub(1));
        let height = (lines.len() as u16).min(area.height - 1);
        let corner = Rect {
            x: area.x + area.width.saturating_sub(width + 1),
            y: area.y + 1,
            width,
            height,
        };
        frame.render_widget(Clear, corner);
        frame.render_widget(Paragraph::new(lines).alignment(Alignment::Right), corner);
    }
}
