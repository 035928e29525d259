//! Playback controller: the single-station selection state machine.
//!
//! The controller owns the one [`Player`] and is the only thing allowed to
//! drive it.  Callers mutate through [`PlaybackController::select`] and
//! [`PlaybackController::stop`], feed backend notifications through
//! [`PlaybackController::on_transport`], and observe through the read-only
//! accessors.
//!
//! ```text
//!   Idle ──select(s)──► Connecting(s) ──start ok──► Playing(s)
//!     ▲                     │ start err                │  │
//!     │◄────────────────────┘                          │  │ transport pause
//!     │◄──────────── select(s) / stop / error ─────────┘  ▼
//!     │◄──────────────── stop / error ──────────────── Paused(s)
//! ```
//!
//! Selecting a different station always pauses the current one first, so two
//! stations never play at once.  A failed start never rolls back to the
//! previous station; the session collapses to `Idle`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::station::Station;

/// Message shown to the user when a station cannot be started.
pub const START_FAILED_ALERT: &str = "Error playing this station. Please try another one.";

// ── errors ────────────────────────────────────────────────────────────────────

/// A media backend refused to start a stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct PlayerError(pub String);

impl PlayerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlaybackError {
    #[error("could not start '{station}': {reason}")]
    StartFailed { station: String, reason: PlayerError },
}

// ── media handle seam ─────────────────────────────────────────────────────────

/// The media handle the controller drives.
#[async_trait]
pub trait Player: Send {
    /// Silence the current stream.  Must take effect (or be queued ahead of
    /// any later `start`) before returning.
    fn pause(&mut self);

    /// Point the handle at `url` and begin playback.
    async fn start(&mut self, url: &str) -> Result<(), PlayerError>;
}

/// Notifications coming back from the media backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportEvent {
    /// Audio is flowing.
    Playing,
    /// The handle paused itself.  The selected station is kept.
    Paused,
    /// The stream failed.  Collapses the session to `Idle`.
    Error,
}

// ── observable state ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum PlaybackStatus {
    #[default]
    Idle,
    /// Start issued, waiting for the handle.
    Connecting,
    Playing,
    /// Transport paused, station still selected.
    Paused,
}

/// Read-only view of the playback session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSnapshot {
    pub current_station: Option<Station>,
    pub is_playing: bool,
    pub status: PlaybackStatus,
}

impl PlaybackSnapshot {
    /// True if `station_id` is the one currently producing audio.
    pub fn is_now_playing(&self, station_id: &str) -> bool {
        self.is_playing
            && self
                .current_station
                .as_ref()
                .map(|s| s.id == station_id)
                .unwrap_or(false)
    }
}

/// What a `select` call ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectOutcome {
    /// The selected station was already playing and has been stopped.
    Stopped,
    /// The selected station is now playing.
    Started,
}

/// What a transport event did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportOutcome {
    /// Nothing changed.
    Ignored,
    /// Flags updated, station kept.
    Updated,
    /// The stream failed after audio had been confirmed.
    Reset,
    /// The stream failed before the backend ever confirmed audio; report it
    /// like a failed start.
    StartAborted,
}

// ── controller ────────────────────────────────────────────────────────────────

pub struct PlaybackController<P: Player> {
    player: P,
    current: Option<Station>,
    is_playing: bool,
    status: PlaybackStatus,
    /// Backend has reported audio for the current session at least once.
    confirmed: bool,
}

impl<P: Player> PlaybackController<P> {
    pub fn new(player: P) -> Self {
        Self {
            player,
            current: None,
            is_playing: false,
            status: PlaybackStatus::Idle,
            confirmed: false,
        }
    }

    pub fn current_station(&self) -> Option<&Station> {
        self.current.as_ref()
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn status(&self) -> PlaybackStatus {
        self.status
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            current_station: self.current.clone(),
            is_playing: self.is_playing,
            status: self.status,
        }
    }

    pub fn player(&self) -> &P {
        &self.player
    }

    pub fn player_mut(&mut self) -> &mut P {
        &mut self.player
    }

    /// Toggle `station`: stop it if it is the one playing, otherwise tear
    /// down whatever is current and start it.
    pub async fn select(&mut self, station: Station) -> Result<SelectOutcome, PlaybackError> {
        let same = self
            .current
            .as_ref()
            .map(|c| c.id == station.id)
            .unwrap_or(false);

        if same && self.is_playing {
            info!("Playback: toggling off '{}'", station.name);
            self.player.pause();
            self.reset();
            return Ok(SelectOutcome::Stopped);
        }

        if let Some(previous) = self.current.take() {
            debug!("Playback: pausing '{}' before switching", previous.name);
            self.player.pause();
        }

        info!("Playback: starting '{}' ({})", station.name, station.url_resolved);
        self.is_playing = false;
        self.confirmed = false;
        self.status = PlaybackStatus::Connecting;
        let url = station.url_resolved.clone();
        self.current = Some(station);

        match self.player.start(&url).await {
            Ok(()) => {
                self.is_playing = true;
                self.status = PlaybackStatus::Playing;
                Ok(SelectOutcome::Started)
            }
            Err(reason) => {
                let name = self
                    .current
                    .as_ref()
                    .map(|s| s.name.clone())
                    .unwrap_or_default();
                warn!("Playback: failed to start '{}': {}", name, reason);
                self.reset();
                Err(PlaybackError::StartFailed {
                    station: name,
                    reason,
                })
            }
        }
    }

    /// Stop unconditionally, from any state.
    pub fn stop(&mut self) {
        if self.current.is_some() || self.is_playing {
            info!("Playback: stop");
            self.player.pause();
        }
        self.reset();
    }

    pub fn on_transport(&mut self, event: TransportEvent) -> TransportOutcome {
        match event {
            TransportEvent::Playing => {
                if self.current.is_none() {
                    return TransportOutcome::Ignored;
                }
                self.confirmed = true;
                if self.is_playing && self.status == PlaybackStatus::Playing {
                    return TransportOutcome::Ignored;
                }
                self.is_playing = true;
                self.status = PlaybackStatus::Playing;
                TransportOutcome::Updated
            }
            TransportEvent::Paused => {
                if self.current.is_none() || self.status == PlaybackStatus::Paused {
                    return TransportOutcome::Ignored;
                }
                self.is_playing = false;
                self.status = PlaybackStatus::Paused;
                TransportOutcome::Updated
            }
            TransportEvent::Error => {
                if self.current.is_none() {
                    self.reset();
                    return TransportOutcome::Ignored;
                }
                let confirmed = self.confirmed;
                warn!(
                    "Playback: stream error on '{}'",
                    self.current.as_ref().map(|s| s.name.as_str()).unwrap_or("")
                );
                self.reset();
                if confirmed {
                    TransportOutcome::Reset
                } else {
                    TransportOutcome::StartAborted
                }
            }
        }
    }

    fn reset(&mut self) {
        self.current = None;
        self.is_playing = false;
        self.confirmed = false;
        self.status = PlaybackStatus::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Pause,
        Start(String),
    }

    /// Records every call; fails `start` for URLs in `broken`.
    #[derive(Default, Clone)]
    struct FakePlayer {
        calls: Arc<Mutex<Vec<Call>>>,
        broken: HashSet<String>,
    }

    impl FakePlayer {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Player for FakePlayer {
        fn pause(&mut self) {
            self.calls.lock().unwrap().push(Call::Pause);
        }

        async fn start(&mut self, url: &str) -> Result<(), PlayerError> {
            self.calls.lock().unwrap().push(Call::Start(url.to_string()));
            if self.broken.contains(url) {
                Err(PlayerError::new("unsupported source"))
            } else {
                Ok(())
            }
        }
    }

    fn station(id: &str) -> Station {
        Station {
            id: id.to_string(),
            name: format!("Station {}", id),
            url_resolved: format!("https://stream.example/{}", id),
            ..Station::default()
        }
    }

    fn controller() -> (PlaybackController<FakePlayer>, FakePlayer) {
        controller_with_broken(&[])
    }

    fn controller_with_broken(urls: &[&str]) -> (PlaybackController<FakePlayer>, FakePlayer) {
        let player = FakePlayer {
            broken: urls.iter().map(|u| u.to_string()).collect(),
            ..FakePlayer::default()
        };
        (PlaybackController::new(player.clone()), player)
    }

    #[tokio::test]
    async fn test_select_from_idle_plays() {
        let (mut c, player) = controller();
        let outcome = c.select(station("a")).await.unwrap();
        assert_eq!(outcome, SelectOutcome::Started);
        assert_eq!(c.current_station().map(|s| s.id.as_str()), Some("a"));
        assert!(c.is_playing());
        assert_eq!(c.status(), PlaybackStatus::Playing);
        assert_eq!(player.calls(), [Call::Start("https://stream.example/a".into())]);
    }

    #[tokio::test]
    async fn test_select_same_station_toggles_off() {
        let (mut c, player) = controller();
        c.select(station("a")).await.unwrap();
        let outcome = c.select(station("a")).await.unwrap();
        assert_eq!(outcome, SelectOutcome::Stopped);
        assert!(c.current_station().is_none());
        assert!(!c.is_playing());
        assert_eq!(c.status(), PlaybackStatus::Idle);
        assert_eq!(player.calls().last(), Some(&Call::Pause));
    }

    #[tokio::test]
    async fn test_switch_pauses_old_before_starting_new() {
        let (mut c, player) = controller();
        c.select(station("a")).await.unwrap();
        c.select(station("b")).await.unwrap();
        assert_eq!(
            player.calls(),
            [
                Call::Start("https://stream.example/a".into()),
                Call::Pause,
                Call::Start("https://stream.example/b".into()),
            ]
        );
        assert_eq!(c.current_station().map(|s| s.id.as_str()), Some("b"));
    }

    #[tokio::test]
    async fn test_a_b_a_ends_on_a() {
        let (mut c, _) = controller();
        c.select(station("a")).await.unwrap();
        c.select(station("b")).await.unwrap();
        c.select(station("a")).await.unwrap();
        assert_eq!(c.current_station().map(|s| s.id.as_str()), Some("a"));
        assert!(c.is_playing());
        assert_eq!(c.status(), PlaybackStatus::Playing);
    }

    #[tokio::test]
    async fn test_failed_start_resets_to_idle() {
        let (mut c, player) = controller_with_broken(&["https://stream.example/bad"]);

        c.select(station("a")).await.unwrap();
        let err = c.select(station("bad")).await.unwrap_err();
        assert_eq!(
            err,
            PlaybackError::StartFailed {
                station: "Station bad".into(),
                reason: PlayerError::new("unsupported source"),
            }
        );
        assert!(c.current_station().is_none());
        assert!(!c.is_playing());
        assert_eq!(c.status(), PlaybackStatus::Idle);
        // no rollback to "a"
        assert_eq!(player.calls().last(), Some(&Call::Start("https://stream.example/bad".into())));
    }

    #[tokio::test]
    async fn test_stop_from_any_state() {
        let (mut c, player) = controller();
        c.stop();
        assert!(player.calls().is_empty());
        assert_eq!(c.status(), PlaybackStatus::Idle);

        c.select(station("a")).await.unwrap();
        c.on_transport(TransportEvent::Paused);
        c.stop();
        assert!(c.current_station().is_none());
        assert_eq!(c.status(), PlaybackStatus::Idle);
        assert_eq!(player.calls().last(), Some(&Call::Pause));
    }

    #[tokio::test]
    async fn test_transport_pause_keeps_station() {
        let (mut c, _) = controller();
        c.select(station("a")).await.unwrap();
        assert_eq!(c.on_transport(TransportEvent::Paused), TransportOutcome::Updated);
        assert!(!c.is_playing());
        assert_eq!(c.status(), PlaybackStatus::Paused);
        assert_eq!(c.current_station().map(|s| s.id.as_str()), Some("a"));

        assert_eq!(c.on_transport(TransportEvent::Playing), TransportOutcome::Updated);
        assert!(c.is_playing());
    }

    #[tokio::test]
    async fn test_selecting_paused_station_restarts_it() {
        let (mut c, player) = controller();
        c.select(station("a")).await.unwrap();
        c.on_transport(TransportEvent::Paused);
        let outcome = c.select(station("a")).await.unwrap();
        assert_eq!(outcome, SelectOutcome::Started);
        assert!(c.is_playing());
        assert_eq!(
            player.calls(),
            [
                Call::Start("https://stream.example/a".into()),
                Call::Pause,
                Call::Start("https://stream.example/a".into()),
            ]
        );
    }

    #[tokio::test]
    async fn test_transport_error_resets() {
        let (mut c, _) = controller();
        c.select(station("a")).await.unwrap();
        c.on_transport(TransportEvent::Playing);
        assert_eq!(c.on_transport(TransportEvent::Error), TransportOutcome::Reset);
        assert!(c.current_station().is_none());
        assert!(!c.is_playing());
    }

    #[tokio::test]
    async fn test_error_before_confirmation_is_start_aborted() {
        let (mut c, _) = controller();
        c.select(station("a")).await.unwrap();
        assert_eq!(
            c.on_transport(TransportEvent::Error),
            TransportOutcome::StartAborted
        );
        assert_eq!(c.status(), PlaybackStatus::Idle);
    }

    #[test]
    fn test_transport_events_without_station_are_ignored() {
        let (mut c, _) = controller();
        assert_eq!(c.on_transport(TransportEvent::Playing), TransportOutcome::Ignored);
        assert_eq!(c.on_transport(TransportEvent::Paused), TransportOutcome::Ignored);
        assert_eq!(c.on_transport(TransportEvent::Error), TransportOutcome::Ignored);
        assert!(!c.is_playing());
    }

    #[tokio::test]
    async fn test_at_most_one_station_for_any_sequence() {
        let (mut c, player) = controller_with_broken(&["https://stream.example/x"]);

        let script = ["a", "b", "b", "x", "a", "c", "a", "a", "x", "c"];
        for id in script {
            let _ = c.select(station(id)).await;
            let snap = c.snapshot();
            assert!(snap.is_playing == snap.current_station.is_some());
            if let Some(s) = &snap.current_station {
                assert!(snap.is_now_playing(&s.id));
            }
        }

        // a start never happens while a previous stream is still live
        let mut live = false;
        for call in player.calls() {
            match call {
                Call::Start(url) => {
                    assert!(!live, "started {} while another stream was live", url);
                    live = !url.ends_with("/x");
                }
                Call::Pause => live = false,
            }
        }
    }
}
