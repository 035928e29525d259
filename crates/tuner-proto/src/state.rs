use crate::directory::{Directory, LoadReport};
use crate::playback::PlaybackSnapshot;
use crate::protocol::{DaemonState, PlayerHealth};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Core-owned fields of the published state.  Directory contents are read
/// straight from the shared [`Directory`] when a snapshot is taken.
#[derive(Debug, Default)]
struct Published {
    rev: u64,
    playback: PlaybackSnapshot,
    player_health: PlayerHealth,
    last_load: Option<LoadReport>,
}

/// Read side of the core: the TUI and the HTTP API take snapshots from here,
/// only the core writes.
pub struct StateManager {
    directory: Directory,
    published: Arc<RwLock<Published>>,
}

impl StateManager {
    pub fn new(directory: Directory) -> Self {
        Self {
            directory,
            published: Arc::new(RwLock::new(Published {
                rev: 1,
                ..Published::default()
            })),
        }
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    pub async fn get_state(&self) -> DaemonState {
        let stations = self.directory.stations().await;
        let origin = self.directory.origin().await;
        let loading = self.directory.is_loading();
        let published = self.published.read().await;
        DaemonState {
            rev: published.rev,
            stations,
            loading,
            origin,
            last_load: published.last_load.clone(),
            playback: published.playback.clone(),
            player_health: published.player_health.clone(),
        }
    }

    pub async fn set_playback(&self, playback: PlaybackSnapshot) {
        let mut published = self.published.write().await;
        if published.playback != playback {
            published.playback = playback;
            published.rev += 1;
        }
    }

    pub async fn set_player_health(&self, health: PlayerHealth) {
        let mut published = self.published.write().await;
        published.player_health = health;
        published.rev += 1;
    }

    pub async fn set_last_load(&self, report: LoadReport) {
        let mut published = self.published.write().await;
        published.last_load = Some(report);
        published.rev += 1;
    }

    /// Mark a change that lives outside `Published` (directory contents or
    /// the loading flag).
    pub async fn touch(&self) {
        self.published.write().await.rev += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::PlaybackStatus;
    use crate::station::seed_stations;

    #[tokio::test]
    async fn test_rev_moves_only_on_change() {
        let sm = StateManager::new(Directory::new());
        let rev0 = sm.get_state().await.rev;

        sm.set_playback(PlaybackSnapshot::default()).await;
        assert_eq!(sm.get_state().await.rev, rev0);

        sm.set_playback(PlaybackSnapshot {
            current_station: seed_stations().into_iter().next(),
            is_playing: true,
            status: PlaybackStatus::Playing,
        })
        .await;
        let state = sm.get_state().await;
        assert_eq!(state.rev, rev0 + 1);
        assert!(state.is_now_playing("1"));
        assert!(!state.is_now_playing("2"));
    }

    #[tokio::test]
    async fn test_touch_always_moves_rev() {
        let sm = StateManager::new(Directory::new());
        let rev0 = sm.get_state().await.rev;
        sm.set_playback(PlaybackSnapshot::default()).await;
        sm.touch().await;
        assert_eq!(sm.get_state().await.rev, rev0 + 1);
    }

    #[tokio::test]
    async fn test_snapshot_reads_directory() {
        let sm = StateManager::new(Directory::new());
        let state = sm.get_state().await;
        assert!(state.stations.is_empty());
        assert!(!state.loading);
        assert_eq!(state.player_health, PlayerHealth::Absent);
    }
}
