//! WebSocket transport: socket ownership, liveness, reconnection.
//!
//! The transport owns exactly one active socket. Callers get a channel of
//! `Result<String, Error>` frames; everything else (the receive loop, the
//! 30-second heartbeat, backoff reconnection) happens behind this module.
//! Only the transport mutates socket state; a new connect supersedes and
//! tears down any prior socket.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Bytes, Message as WsMessage};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::config::ConnectionConfig;
use crate::error::Error;

// ── Constants ──────────────────────────────────────────────────────

/// How often the heartbeat loop wakes up.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Longest tolerated silence before the connection is treated as dead.
const LIVENESS_TIMEOUT: Duration = Duration::from_secs(60);

/// Reconnect attempts before giving up permanently.
pub(crate) const MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Ceiling on the exponential backoff delay.
const BACKOFF_CAP_SECS: u64 = 30;

/// Inbound frame channel capacity.
const FRAME_CHANNEL_CAPACITY: usize = 256;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, WsMessage>;
type WsSource = SplitStream<WsStream>;

/// Backoff before reconnect attempt `attempt` (1-based):
/// `min(2^attempt, 30)` seconds.
pub(crate) fn backoff_delay(attempt: u32) -> Duration {
    let secs = 2u64.saturating_pow(attempt.min(31)).min(BACKOFF_CAP_SECS);
    Duration::from_secs(secs)
}

// ── Transport ──────────────────────────────────────────────────────

/// Owns the socket and its two background loops.
pub struct Transport {
    shared: Arc<TransportShared>,
}

struct TransportShared {
    config: ConnectionConfig,
    sink: Mutex<Option<WsSink>>,
    frame_tx: Mutex<Option<mpsc::Sender<Result<String, Error>>>>,
    last_frame_at: Mutex<Instant>,
    reconnect_attempts: AtomicU32,
    shutdown: AtomicBool,
    reconnecting: AtomicBool,
    recv_task: Mutex<Option<JoinHandle<()>>>,
    heartbeat_task: Mutex<Option<JoinHandle<()>>>,
    reconnect_task: Mutex<Option<JoinHandle<()>>>,
}

impl Transport {
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            shared: Arc::new(TransportShared {
                config,
                sink: Mutex::new(None),
                frame_tx: Mutex::new(None),
                last_frame_at: Mutex::new(Instant::now()),
                reconnect_attempts: AtomicU32::new(0),
                shutdown: AtomicBool::new(false),
                reconnecting: AtomicBool::new(false),
                recv_task: Mutex::new(None),
                heartbeat_task: Mutex::new(None),
                reconnect_task: Mutex::new(None),
            }),
        }
    }

    /// Open the socket and start the receive and heartbeat loops.
    ///
    /// Returns the inbound frame channel. Any prior socket is superseded
    /// and torn down first.
    pub async fn connect(&self) -> Result<mpsc::Receiver<Result<String, Error>>, Error> {
        self.shared.config.validate()?;
        self.disconnect().await;
        self.shared.shutdown.store(false, Ordering::SeqCst);

        let (frame_tx, frame_rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
        *self.shared.frame_tx.lock().await = Some(frame_tx);

        open_socket(&self.shared).await?;

        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(async move {
            heartbeat_loop(shared).await;
        });
        if let Some(old) = self.shared.heartbeat_task.lock().await.replace(handle) {
            old.abort();
        }

        tracing::info!(
            endpoint = %self.shared.config.endpoint_url(),
            model = %self.shared.config.model,
            "transport connected"
        );
        Ok(frame_rx)
    }

    /// Send one text frame.
    pub async fn send(&self, frame: &str) -> Result<(), Error> {
        let mut guard = self.shared.sink.lock().await;
        let sink = guard.as_mut().ok_or(Error::NotConnected)?;
        sink.send(WsMessage::Text(frame.into()))
            .await
            .map_err(|e| Error::SendFailed(e.to_string()))
    }

    /// Whether a socket is currently open.
    pub async fn is_connected(&self) -> bool {
        self.shared.sink.lock().await.is_some()
    }

    /// Cancel both loops, close the socket gracefully and close the
    /// inbound channel. Safe to call redundantly; supersedes any
    /// in-flight reconnection backoff.
    pub async fn disconnect(&self) {
        let shared = &self.shared;
        shared.shutdown.store(true, Ordering::SeqCst);

        if let Some(task) = shared.reconnect_task.lock().await.take() {
            task.abort();
        }
        shared.reconnecting.store(false, Ordering::SeqCst);
        if let Some(task) = shared.heartbeat_task.lock().await.take() {
            task.abort();
        }
        if let Some(task) = shared.recv_task.lock().await.take() {
            task.abort();
        }

        if let Some(mut sink) = shared.sink.lock().await.take() {
            let close = WsMessage::Close(Some(CloseFrame {
                code: CloseCode::Normal,
                reason: "client disconnect".into(),
            }));
            let _ = sink.send(close).await;
            let _ = sink.close().await;
            tracing::info!("transport disconnected");
        }

        shared.frame_tx.lock().await.take();
    }
}

// ── Socket plumbing ────────────────────────────────────────────────

/// Build the authenticated request, open the socket and start a receive
/// loop for it. Resets the reconnect-attempt counter on success.
async fn open_socket(shared: &Arc<TransportShared>) -> Result<(), Error> {
    let url = shared.config.endpoint_url();
    let mut request = url
        .into_client_request()
        .map_err(|e| Error::SessionCreationFailed(e.to_string()))?;
    let api_key = HeaderValue::from_str(&shared.config.api_key)
        .map_err(|e| Error::SessionCreationFailed(format!("invalid api key header: {e}")))?;
    request.headers_mut().insert("api-key", api_key);

    let (stream, _response) = connect_async(request)
        .await
        .map_err(|e| Error::SessionCreationFailed(e.to_string()))?;
    let (sink, source) = stream.split();

    *shared.sink.lock().await = Some(sink);
    *shared.last_frame_at.lock().await = Instant::now();
    shared.reconnect_attempts.store(0, Ordering::SeqCst);

    let task_shared = Arc::clone(shared);
    let handle = tokio::spawn(async move {
        receive_loop(task_shared, source).await;
    });
    if let Some(old) = shared.recv_task.lock().await.replace(handle) {
        old.abort();
    }
    Ok(())
}

/// Forward one inbound result to the subscriber channel.
/// Returns false when the channel is gone.
async fn forward(shared: &Arc<TransportShared>, item: Result<String, Error>) -> bool {
    let tx = shared.frame_tx.lock().await.clone();
    match tx {
        Some(tx) => tx.send(item).await.is_ok(),
        None => false,
    }
}

/// Continuously receive frames, refresh liveness and forward them.
/// A failure while still connected hands off to reconnection.
async fn receive_loop(shared: Arc<TransportShared>, mut source: WsSource) {
    while let Some(message) = source.next().await {
        if shared.shutdown.load(Ordering::SeqCst) {
            return;
        }
        match message {
            Ok(WsMessage::Text(text)) => {
                *shared.last_frame_at.lock().await = Instant::now();
                if !forward(&shared, Ok(text.to_string())).await {
                    tracing::debug!("frame receiver dropped, closing receive loop");
                    return;
                }
            }
            Ok(WsMessage::Ping(_) | WsMessage::Pong(_)) => {
                // Control traffic still proves the peer is alive.
                *shared.last_frame_at.lock().await = Instant::now();
            }
            Ok(WsMessage::Binary(data)) => {
                tracing::warn!(len = data.len(), "unexpected binary frame on text protocol, skipping");
            }
            Ok(WsMessage::Frame(_)) => {}
            Ok(WsMessage::Close(frame)) => {
                tracing::info!(close_frame = ?frame, "socket closed by peer");
                break;
            }
            Err(e) => {
                tracing::error!(error = %e, "receive failed");
                if !shared.shutdown.load(Ordering::SeqCst) {
                    forward(&shared, Err(Error::ReceiveFailed(e.to_string()))).await;
                    spawn_reconnect(&shared).await;
                }
                return;
            }
        }
    }
    if !shared.shutdown.load(Ordering::SeqCst) {
        forward(&shared, Err(Error::ReceiveFailed("connection closed".into()))).await;
        spawn_reconnect(&shared).await;
    }
}

/// Every 30 seconds: reconnect if the liveness window lapsed, otherwise
/// send an idle keepalive probe.
async fn heartbeat_loop(shared: Arc<TransportShared>) {
    let mut ticker = tokio::time::interval(HEARTBEAT_INTERVAL);
    ticker.tick().await; // first tick is immediate
    loop {
        ticker.tick().await;
        if shared.shutdown.load(Ordering::SeqCst) {
            return;
        }
        let idle = shared.last_frame_at.lock().await.elapsed();
        if idle > LIVENESS_TIMEOUT {
            tracing::warn!(
                idle_secs = idle.as_secs(),
                "no frames within liveness window, treating connection as dead"
            );
            spawn_reconnect(&shared).await;
        } else {
            let mut guard = shared.sink.lock().await;
            if let Some(sink) = guard.as_mut() {
                if let Err(e) = sink.send(WsMessage::Ping(Bytes::new())).await {
                    tracing::debug!(error = %e, "keepalive probe failed");
                }
            }
        }
    }
}

/// Start the reconnection task unless one is already running or the
/// transport is shutting down.
///
/// Returns a boxed future with a concrete `Send` bound rather than an
/// `async fn`'s inferred opaque type. This breaks the Send-inference
/// cycle formed by the mutually recursive socket tasks
/// (open_socket -> receive_loop -> spawn_reconnect -> reconnect -> open_socket).
fn spawn_reconnect<'a>(
    shared: &'a Arc<TransportShared>,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + 'a>> {
    Box::pin(async move {
        if shared.shutdown.load(Ordering::SeqCst)
            || shared.reconnecting.swap(true, Ordering::SeqCst)
        {
            return;
        }
        let task_shared = Arc::clone(shared);
        let handle = tokio::spawn(async move {
            reconnect(&task_shared).await;
            task_shared.reconnecting.store(false, Ordering::SeqCst);
        });
        if let Some(old) = shared.reconnect_task.lock().await.replace(handle) {
            old.abort();
        }
    })
}

/// Bounded exponential backoff: increment the attempt counter, sleep
/// `min(2^attempts, 30)` seconds, tear down the stale socket and retry.
/// The sixth failure is terminal.
async fn reconnect(shared: &Arc<TransportShared>) {
    loop {
        if shared.shutdown.load(Ordering::SeqCst) {
            return;
        }
        let attempt = shared.reconnect_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt > MAX_RECONNECT_ATTEMPTS {
            tracing::error!(
                attempts = MAX_RECONNECT_ATTEMPTS,
                "reconnect attempts exhausted, abandoning connection"
            );
            forward(shared, Err(Error::MaxReconnectAttemptsReached)).await;
            abandon(shared).await;
            return;
        }

        let delay = backoff_delay(attempt);
        tracing::info!(attempt, delay_secs = delay.as_secs(), "reconnecting after backoff");
        tokio::time::sleep(delay).await;
        if shared.shutdown.load(Ordering::SeqCst) {
            return;
        }

        if let Some(mut sink) = shared.sink.lock().await.take() {
            let _ = sink.close().await;
        }
        match open_socket(shared).await {
            Ok(()) => {
                tracing::info!(attempt, "reconnected");
                return;
            }
            Err(e) => {
                tracing::warn!(attempt, error = %e, "reconnect attempt failed");
            }
        }
    }
}

/// Permanent teardown from within the reconnection task.
async fn abandon(shared: &Arc<TransportShared>) {
    shared.shutdown.store(true, Ordering::SeqCst);
    if let Some(task) = shared.heartbeat_task.lock().await.take() {
        task.abort();
    }
    if let Some(task) = shared.recv_task.lock().await.take() {
        task.abort();
    }
    if let Some(mut sink) = shared.sink.lock().await.take() {
        let _ = sink.close().await;
    }
    shared.frame_tx.lock().await.take();
}

// ── Tests ──────────────────────────────────────────────────────────
