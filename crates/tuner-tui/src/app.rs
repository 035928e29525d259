//! App: component-based event loop.
//!
//! Architecture:
//! - `App` owns all components and `AppState` (shared read-only data for components).
//! - A `tokio::mpsc` channel carries `AppMessage` events in from background tasks.
//! - The event loop draws each frame, then awaits the next message.
//! - Components return `Vec<Action>`; App dispatches each Action.
//! - Commands to the core flow out through `cmd_tx`.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use ratatui::crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers, MouseEvent, MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame, Terminal,
};
use tokio::sync::{broadcast, mpsc};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use tuner_proto::directory::LoadReport;
use tuner_proto::identity::User;
use tuner_proto::playback::PlaybackStatus;
use tuner_proto::protocol::{Command, DaemonState};
use tuner_proto::state::StateManager;

use crate::core::DaemonEvent;
use crate::BroadcastMessage;
use crate::{
    action::Action,
    app_state::AppState,
    component::Component,
    components::{
        alert::AlertModal, help_overlay::HelpOverlay, library::Library, pages,
        sidebar::Sidebar, station_browser::StationBrowser,
    },
    nav::{Navigator, Route},
    theme::{C_BADGE_ERR, C_CONNECTING, C_MUTED, C_NUMBER_HINT, C_PLAYING, C_SECONDARY},
    widgets::toast::{Notice, Toasts},
};

const SIDEBAR_WIDTH: u16 = 22;
const MAX_DRAIN: usize = 256;

// ── Internal event bus ────────────────────────────────────────────────────────

enum AppMessage {
    Event(Event),
    StateUpdated(DaemonState),
    DirectoryLoaded(LoadReport),
    Alert(String),
    Log(String),
}

/// Which half of the screen receives keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Sidebar,
    Page,
}

#[derive(Default, Clone, Copy)]
struct PaneAreas {
    sidebar: Rect,
    page: Rect,
}

pub struct App {
    state: AppState,
    state_manager: Arc<StateManager>,
    cmd_tx: mpsc::Sender<DaemonEvent>,
    nav: Navigator,
    focus: Focus,

    // ── Components ────────────────────────────────────────────────────────
    sidebar: Sidebar,
    browser: StationBrowser,
    library: Library,
    help_overlay: HelpOverlay,
    alert: AlertModal,
    toast: Toasts,

    pane_areas: PaneAreas,
    should_quit: bool,
}

impl App {
    pub fn new(
        state_manager: Arc<StateManager>,
        cmd_tx: mpsc::Sender<DaemonEvent>,
        user: Option<User>,
        log_path: PathBuf,
    ) -> Self {
        let nav = Navigator::new(user.as_ref());
        let help_overlay = HelpOverlay::new(user.as_ref());
        let mut toast = Toasts::new();
        toast.loading("loading stations");
        Self {
            state: AppState::new(user, log_path),
            state_manager,
            cmd_tx,
            nav,
            focus: Focus::Page,
            sidebar: Sidebar::new(),
            browser: StationBrowser::new(),
            library: Library::new(),
            help_overlay,
            alert: AlertModal::new(),
            toast,
            pane_areas: PaneAreas::default(),
            should_quit: false,
        }
    }

    // ── Main run loop ─────────────────────────────────────────────────────────

    pub async fn run(
        mut self,
        broadcast_rx: broadcast::Receiver<BroadcastMessage>,
    ) -> anyhow::Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        debug!("run(): terminal created, size={:?}", terminal.size());

        let result = self.event_loop(&mut terminal, broadcast_rx).await;

        // ── Teardown ──────────────────────────────────────────────────────────
        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        terminal.show_cursor()?;

        result
    }

    async fn event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
        mut broadcast_rx: broadcast::Receiver<BroadcastMessage>,
    ) -> anyhow::Result<()> {
        let (tx, mut rx) = mpsc::channel::<AppMessage>(1024);

        // ── Background task: keyboard/mouse events ────────────────────────────
        // Polls so the thread notices when the app has gone away.
        let event_tx = tx.clone();
        tokio::task::spawn_blocking(move || {
            while !event_tx.is_closed() {
                match event::poll(Duration::from_millis(200)) {
                    Ok(true) => match event::read() {
                        Ok(ev) => {
                            if event_tx.blocking_send(AppMessage::Event(ev)).is_err() {
                                break;
                            }
                        }
                        Err(_) => break,
                    },
                    Ok(false) => {}
                    Err(_) => break,
                }
            }
        });

        // ── Background task: broadcast receiver (DaemonCore → AppMessage) ──────
        let bc_tx = tx.clone();
        let bc_state_manager = Arc::clone(&self.state_manager);
        tokio::spawn(async move {
            loop {
                match broadcast_rx.recv().await {
                    Ok(msg) => {
                        let app_msg = match msg {
                            BroadcastMessage::StateUpdated => {
                                AppMessage::StateUpdated(bc_state_manager.get_state().await)
                            }
                            BroadcastMessage::DirectoryLoaded(report) => {
                                AppMessage::DirectoryLoaded(report)
                            }
                            BroadcastMessage::Alert(text) => AppMessage::Alert(text),
                            BroadcastMessage::Log(line) => AppMessage::Log(line),
                        };
                        if bc_tx.send(app_msg).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("broadcast receiver lagged by {} messages", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        drop(tx);

        let initial = self.state_manager.get_state().await;
        self.on_state_updated(initial).await;

        let mut ui_tick = tokio::time::interval(Duration::from_millis(100));
        ui_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            terminal.draw(|f| self.draw(f))?;

            if self.should_quit {
                break;
            }

            tokio::select! {
                msg = rx.recv() => {
                    let Some(msg) = msg else { break };
                    self.handle_message(msg).await;
                    let mut drained = 0usize;
                    while drained < MAX_DRAIN {
                        let Ok(next) = rx.try_recv() else { break };
                        drained += 1;
                        self.handle_message(next).await;
                    }
                }
                _ = ui_tick.tick() => {
                    self.toast.tick();
                }
            }
        }
        info!("TUI exiting");
        Ok(())
    }

    // ── Message handler ───────────────────────────────────────────────────────

    async fn handle_message(&mut self, msg: AppMessage) {
        match msg {
            AppMessage::Event(Event::Key(key)) => {
                if key.kind == KeyEventKind::Release {
                    return;
                }
                for a in self.handle_key(key) {
                    self.dispatch(a).await;
                }
            }
            AppMessage::Event(Event::Mouse(mouse)) => {
                for a in self.handle_mouse(mouse) {
                    self.dispatch(a).await;
                }
            }
            AppMessage::Event(_) => {}
            AppMessage::StateUpdated(daemon_state) => self.on_state_updated(daemon_state).await,
            AppMessage::DirectoryLoaded(report) => self.on_directory_loaded(&report),
            AppMessage::Alert(text) => self.alert.show(text),
            AppMessage::Log(line) => self.state.push_log(line),
        }
    }

    async fn on_state_updated(&mut self, new_state: DaemonState) {
        if new_state.rev != 0 && new_state.rev < self.state.daemon_state.rev {
            return;
        }
        let was_unhealthy = self.state.daemon_state.player_health.is_unhealthy();
        if new_state.player_health.is_unhealthy() && !was_unhealthy {
            self.toast
                .notify(Notice::Error, "mpv stopped; it restarts on the next selection");
        }
        self.state.apply_daemon_state(new_state);
        self.dispatch(Action::StateRefreshed).await;
    }

    fn on_directory_loaded(&mut self, report: &LoadReport) {
        self.toast.load_finished(report);
    }

    // ── Input ─────────────────────────────────────────────────────────────────

    fn browser_focused(&self) -> bool {
        self.focus == Focus::Page && self.nav.current().shows_browser()
    }

    fn handle_key(&mut self, key: KeyEvent) -> Vec<Action> {
        if key.code == KeyCode::Char('c') && key.modifiers == KeyModifiers::CONTROL {
            return vec![Action::Quit];
        }

        // Blocking alert swallows everything else.
        if self.alert.is_open() {
            return self.alert.handle_key(key, &self.state);
        }

        if self.help_overlay.is_open() {
            return self.help_overlay.handle_key(key, &self.state);
        }

        // Filter input takes all typing while open.
        if self.browser_focused() && self.browser.is_filter_active() {
            if key.code == KeyCode::Tab {
                return vec![Action::CloseFilter, Action::FocusNext];
            }
            return self.browser.handle_key(key, &self.state);
        }

        match key.code {
            KeyCode::Char('q') => return vec![Action::Quit],
            KeyCode::Char('?') => return vec![Action::ToggleHelp],
            KeyCode::Char('x') => return vec![Action::Stop],
            KeyCode::Char('R') => return vec![Action::Reload],
            KeyCode::Char('[') => return vec![Action::PrevPage],
            KeyCode::Char(']') => return vec![Action::NextPage],
            KeyCode::Tab | KeyCode::BackTab => return vec![Action::FocusNext],
            KeyCode::Char(c) if c.is_ascii_digit() => {
                return self
                    .nav
                    .route_for_key(c)
                    .map(|r| vec![Action::Navigate(r)])
                    .unwrap_or_default();
            }
            _ => {}
        }

        match self.focus {
            Focus::Sidebar => self.sidebar.handle_key(key, &self.state),
            Focus::Page => match self.nav.current() {
                Route::Search | Route::Radio => self.browser.handle_key(key, &self.state),
                Route::Library => self.library.handle_key(key, &self.state),
                Route::Home | Route::Admin => vec![],
            },
        }
    }

    fn handle_mouse(&mut self, event: MouseEvent) -> Vec<Action> {
        let is_click = matches!(
            event.kind,
            MouseEventKind::Down(_) | MouseEventKind::ScrollUp | MouseEventKind::ScrollDown
        );
        if !is_click || self.alert.is_open() || self.help_overlay.is_open() {
            return vec![];
        }

        fn hit(r: Rect, col: u16, row: u16) -> bool {
            r.width > 0
                && r.height > 0
                && col >= r.x
                && col < r.x + r.width
                && row >= r.y
                && row < r.y + r.height
        }

        let areas = self.pane_areas;
        if hit(areas.sidebar, event.column, event.row) {
            self.focus = Focus::Sidebar;
            return self.sidebar.handle_mouse(event, areas.sidebar, &self.state);
        }
        if hit(areas.page, event.column, event.row) {
            self.focus = Focus::Page;
            return match self.nav.current() {
                Route::Search | Route::Radio => {
                    self.browser.handle_mouse(event, areas.page, &self.state)
                }
                Route::Library => self.library.handle_mouse(event, areas.page, &self.state),
                Route::Home | Route::Admin => vec![],
            };
        }
        vec![]
    }

    // ── Action dispatcher ─────────────────────────────────────────────────────

    async fn dispatch(&mut self, action: Action) {
        // Every component sees the action first.
        let secondary: Vec<Action> = {
            let s = &self.state;
            let mut out = Vec::new();
            out.extend(self.sidebar.on_action(&action, s));
            out.extend(self.browser.on_action(&action, s));
            out.extend(self.library.on_action(&action, s));
            out.extend(self.help_overlay.on_action(&action, s));
            out.extend(self.alert.on_action(&action, s));
            out
        };

        self.apply_action(action).await;

        // Depth-limited to one level.
        for a in secondary {
            self.apply_action(a).await;
        }
    }

    async fn apply_action(&mut self, action: Action) {
        if action != Action::StateRefreshed {
            debug!("apply_action: {:?}", action);
        }
        match action {
            // ── Playback ──────────────────────────────────────────────────────
            Action::Select(station_id) => {
                self.state.mark_pending(station_id.clone());
                self.send_cmd(Command::Select { station_id }).await;
            }
            Action::Stop => self.send_cmd(Command::Stop).await,
            Action::Reload => {
                self.toast.loading("reloading stations");
                self.send_cmd(Command::Reload).await;
            }

            // ── Navigation ────────────────────────────────────────────────────
            Action::Navigate(route) => {
                // Re-selecting Search reopens its filter.
                if self.nav.navigate(route) || route == Route::Search {
                    self.on_route_changed();
                }
                self.focus = Focus::Page;
            }
            Action::NextPage => {
                self.nav.next();
                self.on_route_changed();
            }
            Action::PrevPage => {
                self.nav.prev();
                self.on_route_changed();
            }
            Action::FocusNext => {
                self.focus = match self.focus {
                    Focus::Sidebar => Focus::Page,
                    Focus::Page => Focus::Sidebar,
                };
            }
            Action::OpenFilter => self.focus = Focus::Page,

            Action::CloseFilter
            | Action::ToggleHelp
            | Action::DismissAlert
            | Action::StateRefreshed => {}

            Action::Quit => self.should_quit = true,
        }
    }

    fn on_route_changed(&mut self) {
        let route = self.nav.current();
        self.state.route = route;
        match route {
            Route::Search => self.browser.open_filter(),
            _ => self.browser.close_filter(),
        }
        info!("navigate: {}", route.title());
    }

    async fn send_cmd(&self, cmd: Command) {
        if self
            .cmd_tx
            .send(DaemonEvent::ClientCommand(cmd))
            .await
            .is_err()
        {
            warn!("core is gone; command dropped");
        }
    }

    // ── Rendering ─────────────────────────────────────────────────────────────

    fn draw(&mut self, frame: &mut Frame) {
        let area = frame.area();

        let outer = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(1)])
            .split(area);
        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(0)])
            .split(outer[0]);

        self.pane_areas = PaneAreas {
            sidebar: body[0],
            page: body[1],
        };

        let sidebar_focused = self.focus == Focus::Sidebar;
        self.sidebar
            .draw(frame, body[0], sidebar_focused, &self.state);

        let page_focused = !sidebar_focused;
        match self.nav.current() {
            Route::Home => pages::draw_home(frame, body[1], page_focused, &self.state),
            Route::Search | Route::Radio => {
                self.browser.draw(frame, body[1], page_focused, &self.state)
            }
            Route::Library => self.library.draw(frame, body[1], page_focused, &self.state),
            Route::Admin => pages::draw_admin(frame, body[1], page_focused, &self.state),
        }

        self.draw_status_line(frame, outer[1]);

        // ── Overlays ──────────────────────────────────────────────────────────
        self.help_overlay.draw(frame, area, false, &self.state);
        self.alert.draw(frame, area, true, &self.state);
        self.toast.draw(frame, area);
    }

    fn draw_status_line(&self, frame: &mut Frame, area: Rect) {
        let playback = &self.state.daemon_state.playback;
        let mut spans = match (&playback.current_station, playback.status) {
            (Some(station), PlaybackStatus::Playing) => vec![
                Span::styled(" ▶ ", Style::default().fg(C_PLAYING)),
                Span::styled(
                    station.name.clone(),
                    Style::default().fg(C_PLAYING).add_modifier(Modifier::BOLD),
                ),
            ],
            (Some(station), PlaybackStatus::Paused) => vec![
                Span::styled(" ⏸ ", Style::default().fg(C_CONNECTING)),
                Span::styled(station.name.clone(), Style::default().fg(C_CONNECTING)),
            ],
            (Some(station), _) => vec![
                Span::styled(" ⋯ ", Style::default().fg(C_CONNECTING)),
                Span::styled(station.name.clone(), Style::default().fg(C_CONNECTING)),
            ],
            (None, _) => vec![Span::styled(" ■ idle", Style::default().fg(C_MUTED))],
        };

        if let Some(label) = self.state.daemon_state.player_health.badge_label() {
            spans.push(Span::styled(
                format!("  mpv {}", label),
                Style::default().fg(C_BADGE_ERR),
            ));
        }
        if let Some(user) = &self.state.user {
            spans.push(Span::styled(
                format!("  {}", user.name),
                Style::default().fg(C_SECONDARY),
            ));
        }
        spans.push(Span::styled(
            "   ? help  / filter  x stop  q quit",
            Style::default().fg(C_NUMBER_HINT),
        ));

        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }
}
