use serde::{Deserialize, Serialize};

use crate::directory::{DirectoryOrigin, LoadReport};
use crate::playback::PlaybackSnapshot;
use crate::station::Station;

/// Requests sent to the core from the TUI or the HTTP API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd")]
pub enum Command {
    /// Toggle the station with this id (play it, or stop it if it is playing).
    Select { station_id: String },
    Stop,
    /// Re-run the directory cascade.
    Reload,
    GetState,
}

/// Health of the media backend as observed by the core.
///
/// Transitions:
///   Absent -> Starting -> Running -> Dead -> Starting ...
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub enum PlayerHealth {
    /// Backend not started yet (before first use).
    #[default]
    Absent,
    /// Process is spawning / IPC not yet available.
    Starting,
    Running,
    /// Process exited or IPC closed.
    Dead,
}

impl PlayerHealth {
    /// Short label for badges (≤5 chars).
    pub fn badge_label(&self) -> Option<&str> {
        match self {
            PlayerHealth::Absent => None,
            PlayerHealth::Starting => Some("INIT"),
            PlayerHealth::Running => None,
            PlayerHealth::Dead => Some("DEAD"),
        }
    }

    pub fn is_unhealthy(&self) -> bool {
        matches!(self, PlayerHealth::Dead)
    }
}

/// Full observable state.  `rev` increases on every change so readers can
/// skip redundant redraws.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct DaemonState {
    #[serde(default)]
    pub rev: u64,
    pub stations: Vec<Station>,
    /// A directory load is in flight.
    pub loading: bool,
    pub origin: DirectoryOrigin,
    /// Outcome of the most recent completed load.
    #[serde(default)]
    pub last_load: Option<LoadReport>,
    pub playback: PlaybackSnapshot,
    #[serde(default)]
    pub player_health: PlayerHealth,
}

impl DaemonState {
    pub fn current_station(&self) -> Option<&Station> {
        self.playback.current_station.as_ref()
    }

    pub fn is_now_playing(&self, station_id: &str) -> bool {
        self.playback.is_now_playing(station_id)
    }
}
