mod action;
mod app;
mod app_state;
mod component;
mod components;
mod core;
mod http;
mod mpv;
mod nav;
mod theme;
mod widgets;

use tokio::sync::{broadcast, mpsc};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use tuner_proto::config::Config;
use tuner_proto::directory::LoadReport;

/// What the DaemonCore broadcasts to the TUI.
#[derive(Debug, Clone)]
pub enum BroadcastMessage {
    /// The full DaemonState has changed; receivers should fetch from StateManager.
    StateUpdated,
    /// A directory load finished.
    DirectoryLoaded(LoadReport),
    /// A message the user must acknowledge before doing anything else.
    Alert(String),
    /// A WARN/ERROR log line.
    Log(String),
}

/// Forwards WARN and ERROR events to the TUI as `BroadcastMessage::Log`.
struct BroadcastLayer {
    sender: broadcast::Sender<BroadcastMessage>,
}

impl BroadcastLayer {
    fn new(sender: broadcast::Sender<BroadcastMessage>) -> Self {
        Self { sender }
    }
}

impl<S> tracing_subscriber::Layer<S> for BroadcastLayer
where
    S: tracing::Subscriber,
{
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let level = event.metadata().level();
        if !matches!(*level, tracing::Level::WARN | tracing::Level::ERROR) {
            return;
        }

        let mut message = format!("{} [{}] ", chrono::Local::now().format("%H:%M:%S"), level);
        let mut visitor = MessageVisitor(&mut message);
        event.record(&mut visitor);

        // No receivers is fine.
        let _ = self.sender.send(BroadcastMessage::Log(message));
    }
}

struct MessageVisitor<'a>(&'a mut String);

impl<'a> tracing::field::Visit for MessageVisitor<'a> {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.0.push_str(&format!("{:?}", value));
        } else {
            self.0.push_str(&format!(" {}={:?}", field.name(), value));
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Broadcast channel (DaemonCore → TUI), first so logging can use it ────
    let (broadcast_tx, broadcast_rx) = broadcast::channel::<BroadcastMessage>(1024);

    let data_dir = tuner_proto::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = data_dir.join("tuner.log");

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_ansi(false);

    // Allow RUST_LOG override; keep HTTP client internals quiet by default.
    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(BroadcastLayer::new(broadcast_tx.clone()))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("info,tuner=debug,hyper_util=warn,reqwest=warn")
            }),
        )
        .init();

    // Print log path to stderr so the operator can tail it immediately.
    eprintln!("tuner log: {}", log_path.display());
    tracing::info!("tuner starting…");

    // ── Load config ──────────────────────────────────────────────────────────
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("config unreadable, using defaults: {}", e);
            Config::default()
        }
    };
    tracing::info!("config path: {:?}", Config::config_path());

    // ── DaemonEvent channel (TUI/HTTP → DaemonCore) ─────────────────────────
    let (event_tx, event_rx) = mpsc::channel::<core::DaemonEvent>(1024);

    let daemon_core = core::DaemonCore::new(&config, broadcast_tx.clone(), event_tx.clone())?;
    let state_manager = daemon_core.state_manager();

    // ── HTTP server ──────────────────────────────────────────────────────────
    if config.http.enabled {
        http::start_server(
            config.http.bind_address.clone(),
            config.http.port,
            state_manager.clone(),
            event_tx.clone(),
        );
    }

    // ── Spawn DaemonCore event loop ──────────────────────────────────────────
    let core_handle = tokio::spawn(async move {
        if let Err(e) = daemon_core.run(event_rx).await {
            tracing::error!("DaemonCore exited with error: {}", e);
        }
    });

    // ── Run TUI ──────────────────────────────────────────────────────────────
    let app = app::App::new(state_manager, event_tx.clone(), config.user.clone(), log_path);
    let result = app.run(broadcast_rx).await;

    // Let the core stop mpv before the runtime goes away.
    let _ = event_tx.send(core::DaemonEvent::Shutdown).await;
    if let Err(e) = core_handle.await {
        tracing::error!("DaemonCore task failed: {}", e);
    }

    result
}
