//! AppState: shared read-only data passed to all components during render/event.
//!
//! Components read this but never mutate it.
//! The App event-loop is the only thing that writes to AppState.

use std::path::PathBuf;

use tuner_proto::identity::User;
use tuner_proto::protocol::DaemonState;
use tuner_proto::station::Station;

use crate::nav::Route;

const MAX_LOGS: usize = 200;
const MAX_LIBRARY: usize = 50;

pub struct AppState {
    // ── Core ───────────────────────────────────────────────────────────────
    pub daemon_state: DaemonState,
    /// A select sent to the core: (station id, rev at send time).  Cleared by
    /// the first newer snapshot.
    pub pending_select: Option<(String, u64)>,

    // ── Session ─────────────────────────────────────────────────────────────
    pub user: Option<User>,
    pub route: Route,
    /// Stations heard this session, most recent first.
    pub library: Vec<Station>,
    /// WARN/ERROR lines from the log layer.
    pub logs: Vec<String>,
    pub log_path: PathBuf,
}

impl AppState {
    pub fn new(user: Option<User>, log_path: PathBuf) -> Self {
        Self {
            daemon_state: DaemonState::default(),
            pending_select: None,
            user,
            route: Route::Home,
            library: Vec::new(),
            logs: Vec::new(),
            log_path,
        }
    }

    /// True while the directory has never been filled or a load is running.
    pub fn directory_loading(&self) -> bool {
        self.daemon_state.loading
            || self.daemon_state.origin == tuner_proto::directory::DirectoryOrigin::Empty
    }

    pub fn is_pending(&self, station_id: &str) -> bool {
        self.pending_select
            .as_ref()
            .map(|(id, _)| id == station_id)
            .unwrap_or(false)
    }

    pub fn mark_pending(&mut self, station_id: String) {
        self.pending_select = Some((station_id, self.daemon_state.rev));
    }

    /// Take a fresh snapshot from the core.
    pub fn apply_daemon_state(&mut self, state: DaemonState) {
        if let Some((_, rev)) = &self.pending_select {
            if state.rev > *rev {
                self.pending_select = None;
            }
        }
        if state.playback.is_playing {
            if let Some(station) = &state.playback.current_station {
                self.record_play(station.clone());
            }
        }
        self.daemon_state = state;
    }

    fn record_play(&mut self, station: Station) {
        if self.library.first().map(|s| s.id == station.id).unwrap_or(false) {
            return;
        }
        self.library.retain(|s| s.id != station.id);
        self.library.insert(0, station);
        self.library.truncate(MAX_LIBRARY);
    }

    pub fn push_log(&mut self, line: String) {
        self.logs.push(line);
        if self.logs.len() > MAX_LOGS {
            let overflow = self.logs.len() - MAX_LOGS;
            self.logs.drain(..overflow);
        }
    }
}
