//! mpv IPC driver with separated reader/writer tasks, and the `Player` the
//! playback controller drives.
//!
//! Architecture:
//!
//! ```text
//!   MpvPlayer ── owns ──► MpvDriver::spawn_and_connect()
//!                               │
//!                               ├── writer_task   ← receives PendingRequest via mpsc, writes → socket
//!                               └── reader_task   ← reads JSON lines from socket
//!                                                      ├── response (has request_id) → matched oneshot::Sender
//!                                                      └── event / property-change   → event_tx channel
//! ```
//!
//! Both the awaited `send` and the fire-and-forget `fire` go through the same
//! writer queue, so a pause fired synchronously is always written before any
//! later `loadfile`.
//!
//! Platform notes:
//! - Unix:   Unix domain sockets
//! - Windows: Named pipes  \\.\pipe\<name>
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info, warn};

use tuner_proto::platform;
use tuner_proto::playback::{Player, PlayerError, TransportEvent};
use tuner_proto::protocol::PlayerHealth;

#[cfg(unix)]
use tokio::net::UnixStream;

#[cfg(windows)]
use tokio::net::windows::named_pipe::ClientOptions;

// ── global request-id counter ─────────────────────────────────────────────────

static NEXT_REQ_ID: AtomicU64 = AtomicU64::new(1);

// ── observation property IDs ──────────────────────────────────────────────────

/// Fixed observe_property IDs.  We match on these in property-change events.
pub const OBS_CORE_IDLE: u64 = 1;
pub const OBS_PAUSE: u64 = 2;

const IPC_TIMEOUT_SECS: u64 = 5;

// ── internal channel types ────────────────────────────────────────────────────

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<anyhow::Result<Value>>>>>;

struct PendingRequest {
    req_id: u64,
    payload: String, // serialised JSON line (already has '\n')
    reply: oneshot::Sender<anyhow::Result<Value>>,
}

/// An mpv event / property-change that arrived unsolicited (no request_id).
#[derive(Debug, Clone)]
pub struct MpvEvent {
    pub raw: Value,
}

impl MpvEvent {
    /// Returns `Some((obs_id, data))` if this is a property-change event.
    pub fn as_property_change(&self) -> Option<(u64, &Value)> {
        if self.raw.get("event")?.as_str()? == "property-change" {
            let id = self.raw.get("id")?.as_u64()?;
            let data = self.raw.get("data").unwrap_or(&Value::Null);
            Some((id, data))
        } else {
            None
        }
    }

    /// Returns the event name, e.g. "end-file", "start-file", "file-loaded".
    pub fn event_name(&self) -> Option<&str> {
        self.raw.get("event")?.as_str()
    }

    /// `reason` of an `end-file` event.
    pub fn end_file_reason(&self) -> Option<&str> {
        if self.event_name()? != "end-file" {
            return None;
        }
        self.raw.get("reason")?.as_str()
    }
}

fn request_line(command: &Value) -> anyhow::Result<(u64, String)> {
    let req_id = NEXT_REQ_ID.fetch_add(1, Ordering::Relaxed);
    let msg = json!({ "command": command, "request_id": req_id });
    let mut raw = serde_json::to_string(&msg)?;
    raw.push('\n');
    Ok((req_id, raw))
}

// ── public handle ─────────────────────────────────────────────────────────────

/// Cloneable handle to the mpv writer task.
#[derive(Clone)]
pub struct MpvHandle {
    tx: mpsc::Sender<PendingRequest>,
}

impl MpvHandle {
    /// Queue `command` and await mpv's reply.
    pub async fn send(&self, command: Value) -> anyhow::Result<Value> {
        let (req_id, payload) = request_line(&command)?;
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(PendingRequest {
                req_id,
                payload,
                reply: reply_tx,
            })
            .await
            .map_err(|_| anyhow::anyhow!("mpv writer task gone"))?;

        tokio::time::timeout(tokio::time::Duration::from_secs(IPC_TIMEOUT_SECS), reply_rx)
            .await
            .map_err(|_| anyhow::anyhow!("mpv IPC timeout for req={}", req_id))?
            .map_err(|_| anyhow::anyhow!("mpv reply channel dropped req={}", req_id))?
    }

    /// Queue `command` without waiting for the reply.  Fails only if the
    /// writer queue is gone or full.
    pub fn fire(&self, command: Value) -> anyhow::Result<()> {
        let (req_id, payload) = request_line(&command)?;
        let (reply_tx, _) = oneshot::channel();
        self.tx
            .try_send(PendingRequest {
                req_id,
                payload,
                reply: reply_tx,
            })
            .map_err(|e| anyhow::anyhow!("mpv writer queue rejected req={}: {}", req_id, e))
    }

    pub async fn load_stream(&self, url: &str, volume: f32) -> anyhow::Result<()> {
        debug!("mpv: sending loadfile command for url={}", url);
        let resp = self.send(json!(["loadfile", url, "replace"])).await?;
        debug!("mpv: loadfile response: {:?}", resp);
        self.set_pause(false).await?;
        let _ = self.set_volume(volume).await;
        Ok(())
    }

    pub async fn set_volume(&self, vol: f32) -> anyhow::Result<()> {
        let vol_pct = (vol * 100.0).clamp(0.0, 100.0);
        self.send(json!(["set_property", "volume", vol_pct])).await?;
        Ok(())
    }

    pub async fn set_pause(&self, paused: bool) -> anyhow::Result<()> {
        self.send(json!(["set_property", "pause", paused])).await?;
        Ok(())
    }

    pub async fn stop(&self) -> anyhow::Result<()> {
        let _ = self.send(json!(["stop"])).await;
        Ok(())
    }

    /// Register observe_property for everything the transport mapping needs.
    /// Must be called after every fresh connection.
    pub async fn observe_properties(&self) {
        let props = [(OBS_CORE_IDLE, "core-idle"), (OBS_PAUSE, "pause")];
        for (id, name) in &props {
            match self.send(json!(["observe_property", id, name])).await {
                Ok(_) => debug!("mpv: observe_property id={} name={}", id, name),
                Err(e) => warn!("mpv: observe_property {} failed: {}", name, e),
            }
        }
    }

    /// Health-check: returns Ok(()) if mpv is responsive.
    pub async fn ping(&self) -> anyhow::Result<()> {
        self.send(json!(["get_property", "volume"])).await?;
        Ok(())
    }
}

// ── driver ────────────────────────────────────────────────────────────────────

/// Owns the mpv child process and manages (re)connection.
pub struct MpvDriver {
    pub socket_name: String,
    process: Option<tokio::process::Child>,
    pub last_volume: f32,
}

impl MpvDriver {
    pub fn new(volume: f32) -> Self {
        Self {
            socket_name: platform::mpv_socket_name(),
            process: None,
            last_volume: volume,
        }
    }

    /// `None` when we are attached to an mpv we did not spawn.
    pub fn process_alive(&mut self) -> Option<bool> {
        let child = self.process.as_mut()?;
        Some(match child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                if let Some(code) = status.code() {
                    warn!("mpv process exited with code: {}", code);
                } else {
                    warn!("mpv process terminated by signal");
                }
                false
            }
            Err(e) => {
                warn!("mpv process_alive check failed: {}", e);
                false
            }
        })
    }

    /// Kill the process if running.
    pub async fn kill(&mut self) {
        if let Some(mut p) = self.process.take() {
            let _ = p.kill().await;
        }
    }

    fn volume_arg(&self) -> String {
        format!(
            "--volume={}",
            (self.last_volume * 100.0).clamp(0.0, 100.0).round() as i64
        )
    }

    // ── spawn / reconnect ─────────────────────────────────────────────────────

    #[cfg(unix)]
    pub async fn spawn_and_connect(
        &mut self,
        event_tx: mpsc::Sender<MpvEvent>,
    ) -> anyhow::Result<MpvHandle> {
        self.kill().await;

        let socket_path = std::path::PathBuf::from(&self.socket_name);
        let _ = tokio::fs::remove_file(&socket_path).await;

        info!("mpv: spawning new process");
        let mpv_binary =
            platform::find_mpv_binary().ok_or_else(|| anyhow::anyhow!("mpv binary not found"))?;

        let data_dir = platform::data_dir();
        std::fs::create_dir_all(&data_dir)?;
        let stderr_path = data_dir.join("mpv-stderr.log");
        let stderr_file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&stderr_path)?;
        info!("mpv: logging stderr to {:?}", stderr_path);

        let child = tokio::process::Command::new(&mpv_binary)
            .arg("--no-video")
            .arg("--idle=yes")
            .arg(platform::mpv_socket_arg())
            .arg("--quiet")
            .arg(self.volume_arg())
            .stdout(std::process::Stdio::null())
            .stderr(stderr_file)
            .kill_on_drop(true)
            .spawn()?;
        info!("mpv: spawned process with pid {:?}", child.id());
        self.process = Some(child);

        for _ in 0..50 {
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
            if socket_path.exists() {
                break;
            }
        }
        if !socket_path.exists() {
            anyhow::bail!("mpv IPC socket did not appear");
        }
        tokio::time::sleep(tokio::time::Duration::from_millis(200)).await;

        let stream = UnixStream::connect(&socket_path).await?;
        info!("mpv: connected to IPC socket");
        Ok(Self::start_io_tasks(stream, event_tx))
    }

    /// Try to connect to an already-running mpv socket without spawning.
    #[cfg(unix)]
    pub async fn try_reconnect(&mut self, event_tx: mpsc::Sender<MpvEvent>) -> Option<MpvHandle> {
        let socket_path = std::path::PathBuf::from(&self.socket_name);
        if !socket_path.exists() {
            return None;
        }
        match UnixStream::connect(&socket_path).await {
            Ok(stream) => {
                info!("mpv: reconnected to existing IPC socket");
                Some(Self::start_io_tasks(stream, event_tx))
            }
            Err(e) => {
                debug!("mpv: stale socket, not reconnecting: {}", e);
                None
            }
        }
    }

    #[cfg(unix)]
    fn start_io_tasks(stream: UnixStream, event_tx: mpsc::Sender<MpvEvent>) -> MpvHandle {
        let (read_half, write_half) = stream.into_split();
        spawn_io_tasks(BufReader::new(read_half), write_half, event_tx)
    }

    // ── Windows ───────────────────────────────────────────────────────────────

    #[cfg(windows)]
    pub async fn spawn_and_connect(
        &mut self,
        event_tx: mpsc::Sender<MpvEvent>,
    ) -> anyhow::Result<MpvHandle> {
        self.kill().await;

        info!("mpv: spawning new process");
        let mpv_binary =
            platform::find_mpv_binary().ok_or_else(|| anyhow::anyhow!("mpv binary not found"))?;

        let child = tokio::process::Command::new(mpv_binary)
            .arg("--no-video")
            .arg("--idle=yes")
            .arg(platform::mpv_socket_arg())
            .arg("--quiet")
            .arg(self.volume_arg())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()?;
        self.process = Some(child);

        let pipe_path = format!(r"\\.\pipe\{}", self.socket_name);
        for _ in 0..50 {
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
            if let Ok(client) = ClientOptions::new().open(&pipe_path) {
                info!("mpv: connected to named pipe");
                let (read_half, write_half) = tokio::io::split(client);
                return Ok(spawn_io_tasks(BufReader::new(read_half), write_half, event_tx));
            }
        }
        anyhow::bail!("mpv named pipe did not appear")
    }

    #[cfg(windows)]
    pub async fn try_reconnect(&mut self, event_tx: mpsc::Sender<MpvEvent>) -> Option<MpvHandle> {
        let pipe_path = format!(r"\\.\pipe\{}", self.socket_name);
        match ClientOptions::new().open(&pipe_path) {
            Ok(client) => {
                info!("mpv: reconnected to named pipe");
                let (read_half, write_half) = tokio::io::split(client);
                Some(spawn_io_tasks(BufReader::new(read_half), write_half, event_tx))
            }
            Err(e) => {
                debug!("mpv: no named pipe to reconnect to: {}", e);
                None
            }
        }
    }
}

fn spawn_io_tasks<R, W>(
    reader: BufReader<R>,
    writer: W,
    event_tx: mpsc::Sender<MpvEvent>,
) -> MpvHandle
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
    W: tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    // req_id → reply channel.  Writer inserts, reader resolves.
    let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
    let (cmd_tx, cmd_rx) = mpsc::channel::<PendingRequest>(64);

    tokio::spawn(writer_task(writer, cmd_rx, pending.clone()));
    tokio::spawn(reader_task(reader, pending, event_tx));

    MpvHandle { tx: cmd_tx }
}

// ── reader task ───────────────────────────────────────────────────────────────

async fn reader_task<R>(mut reader: BufReader<R>, pending: PendingMap, event_tx: mpsc::Sender<MpvEvent>)
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                debug!("mpv reader: connection closed");
                let mut map = pending.lock().await;
                for (_, tx) in map.drain() {
                    let _ = tx.send(Err(anyhow::anyhow!("mpv IPC connection closed")));
                }
                break;
            }
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let val: Value = match serde_json::from_str(trimmed) {
                    Ok(v) => v,
                    Err(e) => {
                        debug!("mpv reader: invalid json '{}': {}", trimmed, e);
                        continue;
                    }
                };

                if let Some(req_id) = val.get("request_id").and_then(|v| v.as_u64()) {
                    let mut map = pending.lock().await;
                    if let Some(tx) = map.remove(&req_id) {
                        let result = if val["error"].as_str() == Some("success") {
                            debug!("mpv reader: response req={} ok", req_id);
                            Ok(val)
                        } else {
                            let err = val["error"].as_str().unwrap_or("unknown error").to_string();
                            debug!("mpv reader: response req={} err={}", req_id, err);
                            Err(anyhow::anyhow!("mpv error: {}", err))
                        };
                        let _ = tx.send(result);
                    } else {
                        debug!("mpv reader: response for unknown req={}", req_id);
                    }
                } else {
                    debug!("mpv reader: event {}", trimmed);
                    let _ = event_tx.send(MpvEvent { raw: val }).await;
                }
            }
            Err(e) => {
                warn!("mpv reader: read error: {}", e);
                let mut map = pending.lock().await;
                for (_, tx) in map.drain() {
                    let _ = tx.send(Err(anyhow::anyhow!("mpv IPC read error: {}", e)));
                }
                break;
            }
        }
    }
}

// ── writer task ───────────────────────────────────────────────────────────────

async fn writer_task<W>(mut writer: W, mut rx: mpsc::Receiver<PendingRequest>, pending: PendingMap)
where
    W: tokio::io::AsyncWrite + Unpin,
{
    while let Some(req) = rx.recv().await {
        // Register before writing so the reader can match the reply.
        pending.lock().await.insert(req.req_id, req.reply);
        debug!(
            "mpv writer: send req={} payload={}",
            req.req_id,
            req.payload.trim()
        );
        if let Err(e) = writer.write_all(req.payload.as_bytes()).await {
            warn!("mpv writer: write error: {}", e);
            if let Some(tx) = pending.lock().await.remove(&req.req_id) {
                let _ = tx.send(Err(anyhow::anyhow!("mpv write error: {}", e)));
            }
            break;
        }
    }
    debug!("mpv writer: task exiting");
}

// ── transport mapping ─────────────────────────────────────────────────────────

/// Turns observed mpv properties and events into [`TransportEvent`]s.
///
/// - `core-idle` going false while not paused → `Playing`
/// - `pause` going true → `Paused`, except the echo of a pause we issued
/// - `end-file` with reason `error` or `network` → `Error`
#[derive(Debug, Default)]
pub struct TransportMapper {
    core_idle: Option<bool>,
    paused: bool,
    own_pause_pending: bool,
}

impl TransportMapper {
    /// The next `pause → true` change is ours and must not surface.
    pub fn expect_own_pause(&mut self) {
        if !self.paused {
            self.own_pause_pending = true;
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn map(&mut self, evt: &MpvEvent) -> Option<TransportEvent> {
        if let Some((obs_id, data)) = evt.as_property_change() {
            return match obs_id {
                OBS_PAUSE => {
                    let paused = data.as_bool().unwrap_or(false);
                    if paused == self.paused {
                        return None;
                    }
                    debug!("mpv: pause → {}", paused);
                    self.paused = paused;
                    if !paused {
                        return (self.core_idle == Some(false)).then_some(TransportEvent::Playing);
                    }
                    if std::mem::take(&mut self.own_pause_pending) {
                        None
                    } else {
                        Some(TransportEvent::Paused)
                    }
                }
                OBS_CORE_IDLE => {
                    let idle = data.as_bool();
                    if idle == self.core_idle {
                        return None;
                    }
                    debug!("mpv: core-idle → {:?}", idle);
                    self.core_idle = idle;
                    (idle == Some(false) && !self.paused).then_some(TransportEvent::Playing)
                }
                _ => None,
            };
        }

        match evt.event_name() {
            Some("start-file") => {
                self.core_idle = Some(true);
                self.own_pause_pending = false;
                None
            }
            Some("end-file") => {
                self.core_idle = Some(true);
                let reason = evt.end_file_reason().unwrap_or("unknown");
                info!("mpv: end-file reason={}", reason);
                matches!(reason, "error" | "network").then_some(TransportEvent::Error)
            }
            _ => None,
        }
    }
}

// ── player ────────────────────────────────────────────────────────────────────

/// The mpv-backed [`Player`].  Spawns mpv lazily on the first start and
/// respawns it after it died.
pub struct MpvPlayer {
    driver: MpvDriver,
    handle: Option<MpvHandle>,
    event_tx: mpsc::Sender<MpvEvent>,
    mapper: TransportMapper,
    health: PlayerHealth,
}

impl MpvPlayer {
    pub fn new(volume: f32, event_tx: mpsc::Sender<MpvEvent>) -> Self {
        Self {
            driver: MpvDriver::new(volume),
            handle: None,
            event_tx,
            mapper: TransportMapper::default(),
            health: PlayerHealth::Absent,
        }
    }

    pub fn health(&self) -> PlayerHealth {
        self.health.clone()
    }

    pub fn translate(&mut self, evt: &MpvEvent) -> Option<TransportEvent> {
        self.mapper.map(evt)
    }

    /// Liveness check for the heartbeat.  Returns false if mpv was connected
    /// and is now gone.
    pub async fn check_alive(&mut self) -> bool {
        let Some(handle) = self.handle.clone() else {
            return true;
        };
        let alive = match self.driver.process_alive() {
            Some(alive) => alive,
            None => handle.ping().await.is_ok(),
        };
        if !alive {
            warn!("mpv: process died, dropping handle");
            self.handle = None;
            self.mapper.reset();
            self.health = PlayerHealth::Dead;
        }
        alive
    }

    async fn ensure_handle(&mut self) -> anyhow::Result<MpvHandle> {
        if let Some(h) = &self.handle {
            return Ok(h.clone());
        }

        self.mapper.reset();
        let handle = match self.driver.try_reconnect(self.event_tx.clone()).await {
            Some(h) => h,
            None => {
                self.health = PlayerHealth::Starting;
                match self.driver.spawn_and_connect(self.event_tx.clone()).await {
                    Ok(h) => h,
                    Err(e) => {
                        self.health = PlayerHealth::Dead;
                        return Err(e);
                    }
                }
            }
        };
        handle.observe_properties().await;
        self.health = PlayerHealth::Running;
        self.handle = Some(handle.clone());
        Ok(handle)
    }

    pub async fn shutdown(&mut self) {
        info!("mpv: shutting down");
        if let Some(handle) = self.handle.take() {
            let _ = handle.stop().await;
        }
        self.driver.kill().await;
    }
}

#[async_trait]
impl Player for MpvPlayer {
    fn pause(&mut self) {
        let Some(handle) = &self.handle else {
            return;
        };
        self.mapper.expect_own_pause();
        if let Err(e) = handle.fire(json!(["set_property", "pause", true])) {
            warn!("mpv: pause not queued: {}", e);
        }
    }

    async fn start(&mut self, url: &str) -> Result<(), PlayerError> {
        let handle = self
            .ensure_handle()
            .await
            .map_err(|e| PlayerError::new(format!("mpv unavailable: {}", e)))?;
        handle
            .load_stream(url, self.driver.last_volume)
            .await
            .map_err(|e| PlayerError::new(e.to_string()))
    }
}
