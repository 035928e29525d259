use crate::core::DaemonEvent;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tracing::{error, info};
use tuner_proto::directory::DirectoryOrigin;
use tuner_proto::playback::PlaybackStatus;
use tuner_proto::protocol::{Command, DaemonState, PlayerHealth};
use tuner_proto::state::StateManager;
use tuner_proto::station::{filter_stations, Station};

#[derive(Clone)]
struct HttpState {
    state_manager: Arc<StateManager>,
    event_tx: mpsc::Sender<DaemonEvent>,
}

#[derive(Serialize)]
struct ApiState {
    loading: bool,
    origin: DirectoryOrigin,
    station_count: usize,
    current_station: Option<Station>,
    is_playing: bool,
    status: PlaybackStatus,
    player_health: PlayerHealth,
}

impl From<&DaemonState> for ApiState {
    fn from(state: &DaemonState) -> Self {
        Self {
            loading: state.loading,
            origin: state.origin.clone(),
            station_count: state.stations.len(),
            current_station: state.playback.current_station.clone(),
            is_playing: state.playback.is_playing,
            status: state.playback.status,
            player_health: state.player_health.clone(),
        }
    }
}

#[derive(Deserialize)]
struct StationQuery {
    #[serde(default)]
    q: String,
}

#[derive(Serialize)]
struct StationInfo {
    #[serde(flatten)]
    station: Station,
    now_playing: bool,
}

pub fn router(state_manager: Arc<StateManager>, event_tx: mpsc::Sender<DaemonEvent>) -> Router {
    let app_state = HttpState {
        state_manager,
        event_tx,
    };

    Router::new()
        .route("/api/state", get(get_state))
        .route("/api/stations", get(list_stations))
        .route("/api/select/:id", get(select_station).post(select_station))
        .route("/api/stop", get(stop).post(stop))
        .route("/api/reload", get(reload).post(reload))
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}

pub fn start_server(
    bind_address: String,
    port: u16,
    state_manager: Arc<StateManager>,
    event_tx: mpsc::Sender<DaemonEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let app = router(state_manager, event_tx);

        let addr = format!("{}:{}", bind_address, port);
        let listener = match TcpListener::bind(&addr).await {
            Ok(l) => l,
            Err(e) => {
                error!("Failed to bind HTTP server to {}: {}", addr, e);
                return;
            }
        };

        info!("HTTP API server listening on http://{}", addr);

        if let Err(e) = axum::serve(listener, app).await {
            error!("HTTP server error: {}", e);
        }
    })
}

async fn get_state(State(state): State<HttpState>) -> Json<ApiState> {
    let daemon_state = state.state_manager.get_state().await;
    Json(ApiState::from(&daemon_state))
}

async fn list_stations(
    State(state): State<HttpState>,
    Query(query): Query<StationQuery>,
) -> Json<Vec<StationInfo>> {
    let daemon_state = state.state_manager.get_state().await;
    let stations = filter_stations(&daemon_state.stations, &query.q)
        .into_iter()
        .map(|s| StationInfo {
            now_playing: daemon_state.is_now_playing(&s.id),
            station: s.clone(),
        })
        .collect();
    Json(stations)
}

async fn select_station(State(state): State<HttpState>, Path(id): Path<String>) -> StatusCode {
    if state.state_manager.directory().find(&id).await.is_none() {
        info!("HTTP API: select unknown station {}", id);
        return StatusCode::NOT_FOUND;
    }
    info!("HTTP API: select station {}", id);
    send(&state, Command::Select { station_id: id }).await
}

async fn stop(State(state): State<HttpState>) -> StatusCode {
    info!("HTTP API: Stop");
    send(&state, Command::Stop).await
}

async fn reload(State(state): State<HttpState>) -> StatusCode {
    info!("HTTP API: Reload directory");
    send(&state, Command::Reload).await
}

async fn send(state: &HttpState, cmd: Command) -> StatusCode {
    if state
        .event_tx
        .send(DaemonEvent::ClientCommand(cmd))
        .await
        .is_err()
    {
        error!("Failed to send command to core");
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    StatusCode::ACCEPTED
}
