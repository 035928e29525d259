//! DaemonCore: single-owner event loop for all mutable state.
//!
//! Runs embedded in the TUI process.  Every task that wants to change
//! playback sends a `DaemonEvent` to this loop.  DaemonCore owns the
//! `PlaybackController` (and through it the mpv player) exclusively; nobody
//! else touches them.
//!
//! After each event that mutates state, DaemonCore publishes a snapshot to
//! the `StateManager` and broadcasts `BroadcastMessage::StateUpdated`.
//!
//! Directory loads run in a spawned task that writes the shared `Directory`
//! and reports back with `DaemonEvent::DirectoryLoaded`.
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use tuner_proto::config::Config;
use tuner_proto::directory::{Directory, DirectoryLoader, LoadReport};
use tuner_proto::playback::{
    PlaybackController, SelectOutcome, TransportEvent, TransportOutcome, START_FAILED_ALERT,
};
use tuner_proto::protocol::{Command, PlayerHealth};
use tuner_proto::state::StateManager;

use crate::mpv::{MpvEvent, MpvPlayer};
use crate::BroadcastMessage;

const HEARTBEAT_SECS: u64 = 10;

// ── DaemonEvent ───────────────────────────────────────────────────────────────

/// All inputs into the DaemonCore loop.
#[derive(Debug)]
pub enum DaemonEvent {
    /// A command from the TUI or HTTP API.
    ClientCommand(Command),
    /// Raw mpv unsolicited event (forwarded from reader task).
    MpvEvent(MpvEvent),
    /// A directory load task finished.
    DirectoryLoaded(LoadReport),
    /// Heartbeat: check process liveness.
    HeartbeatTick,
    /// Shutdown requested.
    Shutdown,
}

// ── DaemonCore ────────────────────────────────────────────────────────────────

pub struct DaemonCore {
    state_manager: Arc<StateManager>,
    playback: PlaybackController<MpvPlayer>,
    loader: Arc<DirectoryLoader>,
    /// Our own sender, for the heartbeat and load tasks.
    event_tx: mpsc::Sender<DaemonEvent>,
    broadcast_tx: broadcast::Sender<BroadcastMessage>,
    /// Last health written to the state manager.
    published_health: PlayerHealth,
    load_in_flight: bool,
}

impl DaemonCore {
    pub fn new(
        config: &Config,
        broadcast_tx: broadcast::Sender<BroadcastMessage>,
        event_tx: mpsc::Sender<DaemonEvent>,
    ) -> anyhow::Result<Self> {
        let loader = DirectoryLoader::from_config(&config.directory)?;
        info!(
            "DaemonCore: station sources {:?} (country {})",
            loader.source_names(),
            config.directory.country_code
        );
        let state_manager = Arc::new(StateManager::new(Directory::new()));

        // One forwarder for the lifetime of the core; every mpv connection
        // gets a clone of `mpv_tx`.
        let (mpv_tx, mut mpv_rx) = mpsc::channel::<MpvEvent>(64);
        let core_tx = event_tx.clone();
        tokio::spawn(async move {
            while let Some(evt) = mpv_rx.recv().await {
                if core_tx.send(DaemonEvent::MpvEvent(evt)).await.is_err() {
                    break;
                }
            }
        });

        let player = MpvPlayer::new(config.mpv.volume, mpv_tx);

        Ok(Self {
            state_manager,
            playback: PlaybackController::new(player),
            loader: Arc::new(loader),
            event_tx,
            broadcast_tx,
            published_health: PlayerHealth::Absent,
            load_in_flight: false,
        })
    }

    /// Borrow the state manager (for the TUI and the HTTP server).
    pub fn state_manager(&self) -> Arc<StateManager> {
        Arc::clone(&self.state_manager)
    }

    /// Run the core event loop.  Returns when a `Shutdown` event is received
    /// or the event channel is closed (TUI exited).
    pub async fn run(mut self, mut event_rx: mpsc::Receiver<DaemonEvent>) -> anyhow::Result<()> {
        info!("DaemonCore: starting event loop");

        let heartbeat_tx = self.event_tx.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(tokio::time::Duration::from_secs(HEARTBEAT_SECS)).await;
                if heartbeat_tx.send(DaemonEvent::HeartbeatTick).await.is_err() {
                    break;
                }
            }
        });

        self.spawn_load();

        loop {
            match event_rx.recv().await {
                None => {
                    info!("DaemonCore: event channel closed, shutting down");
                    break;
                }

                Some(DaemonEvent::Shutdown) => {
                    info!("DaemonCore: shutdown requested");
                    break;
                }

                Some(DaemonEvent::ClientCommand(cmd)) => {
                    info!("DaemonCore: command {:?}", cmd);
                    self.handle_command(cmd).await;
                }

                Some(DaemonEvent::MpvEvent(evt)) => {
                    debug!("mpv event: {:?}", evt.raw);
                    if let Some(transport) = self.playback.player_mut().translate(&evt) {
                        self.apply_transport(transport).await;
                    }
                }

                Some(DaemonEvent::DirectoryLoaded(report)) => {
                    self.load_in_flight = false;
                    info!(
                        "DaemonCore: directory now {} stations from {}",
                        report.count,
                        report.origin.label()
                    );
                    self.state_manager.set_last_load(report.clone()).await;
                    let _ = self.broadcast_tx.send(BroadcastMessage::StateUpdated);
                    let _ = self
                        .broadcast_tx
                        .send(BroadcastMessage::DirectoryLoaded(report));
                }

                Some(DaemonEvent::HeartbeatTick) => {
                    if !self.playback.player_mut().check_alive().await {
                        warn!("DaemonCore: heartbeat: mpv process died");
                        self.apply_transport(TransportEvent::Error).await;
                    }
                    self.publish().await;
                }
            }
        }

        self.playback.stop();
        self.playback.player_mut().shutdown().await;
        Ok(())
    }

    // ── commands ──────────────────────────────────────────────────────────────

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Select { station_id } => self.select(&station_id).await,
            Command::Stop => {
                self.playback.stop();
                self.publish().await;
            }
            Command::Reload => self.spawn_load(),
            Command::GetState => {
                let _ = self.broadcast_tx.send(BroadcastMessage::StateUpdated);
            }
        }
    }

    async fn select(&mut self, station_id: &str) {
        match self.state_manager.directory().find(station_id).await {
            Some(station) => {
                let name = station.name.clone();
                match self.playback.select(station).await {
                    Ok(SelectOutcome::Started) => info!("DaemonCore: playing '{}'", name),
                    Ok(SelectOutcome::Stopped) => info!("DaemonCore: stopped '{}'", name),
                    Err(e) => {
                        warn!("DaemonCore: {}", e);
                        self.alert(START_FAILED_ALERT);
                    }
                }
            }
            None => warn!("DaemonCore: no station with id {:?}", station_id),
        }

        // Every select answers with a newer rev, even when nothing changed
        // (a failed start from idle): the TUI clears its pending marker on it.
        self.state_manager.touch().await;
        self.publish().await;
    }

    // ── transport ─────────────────────────────────────────────────────────────

    async fn apply_transport(&mut self, event: TransportEvent) {
        let outcome = self.playback.on_transport(event);
        debug!("DaemonCore: transport {:?} → {:?}", event, outcome);
        if let Some(message) = transport_alert(outcome) {
            self.alert(message);
        }
        if outcome != TransportOutcome::Ignored {
            self.publish().await;
        }
    }

    // ── directory ─────────────────────────────────────────────────────────────

    /// Start a directory load unless one is already running.
    fn spawn_load(&mut self) {
        if self.load_in_flight {
            info!("DaemonCore: directory load already in flight");
            return;
        }
        self.load_in_flight = true;

        let loader = Arc::clone(&self.loader);
        let state_manager = Arc::clone(&self.state_manager);
        let broadcast_tx = self.broadcast_tx.clone();
        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            let directory = state_manager.directory().clone();
            let report = loader
                .load_notifying(&directory, || {
                    let _ = broadcast_tx.send(BroadcastMessage::StateUpdated);
                })
                .await;
            state_manager.touch().await;
            let _ = event_tx.send(DaemonEvent::DirectoryLoaded(report)).await;
        });
    }

    // ── publishing ────────────────────────────────────────────────────────────

    async fn publish(&mut self) {
        self.state_manager
            .set_playback(self.playback.snapshot())
            .await;

        let health = self.playback.player().health();
        if health != self.published_health {
            info!(
                "DaemonCore: player health {:?} → {:?}",
                self.published_health, health
            );
            self.published_health = health.clone();
            self.state_manager.set_player_health(health).await;
        }
        let _ = self.broadcast_tx.send(BroadcastMessage::StateUpdated);
    }

    fn alert(&self, message: &str) {
        let _ = self
            .broadcast_tx
            .send(BroadcastMessage::Alert(message.to_string()));
    }
}

/// The blocking alert a transport outcome raises, if any.  A stream that dies
/// before it was ever heard is reported like a failed start; a stream that
/// dies later just returns to idle.
fn transport_alert(outcome: TransportOutcome) -> Option<&'static str> {
    match outcome {
        TransportOutcome::StartAborted => Some(START_FAILED_ALERT),
        TransportOutcome::Ignored | TransportOutcome::Updated | TransportOutcome::Reset => None,
    }
}
