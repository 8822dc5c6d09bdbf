//! Session engine: the public surface of the crate.
//!
//! Composes the transport, codec, state machine and audio accumulator.
//! Outbound calls are encoded and sent through the transport; inbound
//! frames are decoded once on a single dispatch task, applied to the
//! state machine, then republished to the subscriber as one ordered
//! stream. The protocol is fully asynchronous: subscribers must not
//! assume a frame corresponds 1:1 with the commands they sent.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::audio::{AudioBufferStats, AudioInputBuffer};
use crate::config::{ConnectionConfig, ResponseOptions, SessionConfig};
use crate::error::{DecodeError, Error};
use crate::protocol::items::OutboundItem;
use crate::protocol::{decode_frame, ClientCommand, ServerEvent};
use crate::session::SessionState;
use crate::transport::Transport;

// ── Constants ──────────────────────────────────────────────────────

/// Readiness poll cadence after `connect()`.
const READINESS_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How long `connect()` waits for the session to become ready.
const READINESS_TIMEOUT: Duration = Duration::from_secs(10);

/// Subscriber event channel capacity.
const EVENT_CHANNEL_CAPACITY: usize = 256;

// ── Engine events ──────────────────────────────────────────────────

/// What the engine republishes to its subscriber, in receive order.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// A decoded protocol event.
    Server(ServerEvent),
    /// A frame that failed to decode; the session continues.
    DecodeFailure(DecodeError),
    /// A transport-level failure (reconnection may already be underway;
    /// `MaxReconnectAttemptsReached` is terminal).
    ConnectionFailure(Error),
}

// ── Engine ─────────────────────────────────────────────────────────

/// A handle to one logical realtime session.
pub struct RealtimeEngine {
    transport: Transport,
    state: Arc<Mutex<SessionState>>,
    audio: Arc<Mutex<AudioInputBuffer>>,
    ready: Arc<AtomicBool>,
    event_rx: Mutex<Option<mpsc::Receiver<EngineEvent>>>,
    dispatch_task: Mutex<Option<JoinHandle<()>>>,
}

impl RealtimeEngine {
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            transport: Transport::new(config),
            state: Arc::new(Mutex::new(SessionState::Uninitialized)),
            audio: Arc::new(Mutex::new(AudioInputBuffer::new())),
            ready: Arc::new(AtomicBool::new(false)),
            event_rx: Mutex::new(None),
            dispatch_task: Mutex::new(None),
        }
    }

    /// Connect, apply the session configuration and wait for readiness.
    ///
    /// Polls every 100ms and fails with [`Error::ConnectionTimeout`]
    /// after 10 seconds without a `session.created` acknowledgment.
    /// A session left in the `Error` state must be [`reset`](Self::reset)
    /// before reconnecting.
    pub async fn connect(&self, session: SessionConfig) -> Result<(), Error> {
        {
            let state = self.state.lock().await;
            if matches!(*state, SessionState::Error { .. }) {
                return Err(Error::SessionNotReady);
            }
        }

        let frames = self.transport.connect().await?;
        self.ready.store(false, Ordering::SeqCst);
        {
            let mut state = self.state.lock().await;
            *state = state.on_connect();
        }

        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        *self.event_rx.lock().await = Some(event_rx);

        let handle = tokio::spawn(dispatch_loop(
            frames,
            event_tx,
            Arc::clone(&self.state),
            Arc::clone(&self.audio),
            Arc::clone(&self.ready),
        ));
        if let Some(old) = self.dispatch_task.lock().await.replace(handle) {
            old.abort();
        }

        self.update_session(session).await?;

        let polls = READINESS_TIMEOUT.as_millis() / READINESS_POLL_INTERVAL.as_millis();
        for _ in 0..polls {
            if self.ready.load(Ordering::SeqCst) {
                return Ok(());
            }
            tokio::time::sleep(READINESS_POLL_INTERVAL).await;
        }

        tracing::error!("session did not become ready in time, tearing down");
        self.transport.disconnect().await;
        {
            let mut state = self.state.lock().await;
            *state = state.on_error("timed out waiting for session readiness");
        }
        Err(Error::ConnectionTimeout)
    }

    /// Take the subscriber event stream. Yields `None` once taken; the
    /// stream closes when the engine disconnects.
    pub async fn take_events(&self) -> Option<mpsc::Receiver<EngineEvent>> {
        self.event_rx.lock().await.take()
    }

    /// Tear the session down. Idempotent; supersedes any in-flight
    /// reconnection.
    pub async fn disconnect(&self) {
        {
            let mut state = self.state.lock().await;
            *state = state.on_disconnect();
        }
        self.ready.store(false, Ordering::SeqCst);
        self.transport.disconnect().await;
        {
            let mut state = self.state.lock().await;
            *state = state.finish_termination();
        }
    }

    /// Explicitly leave the `Error` state.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        *state = state.reset();
    }

    // ── Session operations ────────────────────────────────────────

    /// Apply session configuration (`session.update`). Permitted as soon
    /// as the socket is open; this is what produces readiness.
    pub async fn update_session(&self, session: SessionConfig) -> Result<(), Error> {
        self.require_connected().await?;
        self.send_command(ClientCommand::SessionUpdate {
            event_id: Some(next_event_id()),
            session,
        })
        .await
    }

    /// Offer the client SDP for the avatar video channel.
    pub async fn connect_avatar(&self, client_sdp: impl Into<String>) -> Result<(), Error> {
        self.require_connected().await?;
        self.require_ready()?;
        self.send_command(ClientCommand::AvatarConnect {
            event_id: Some(next_event_id()),
            client_sdp: client_sdp.into(),
        })
        .await
    }

    // ── Audio operations ──────────────────────────────────────────

    /// Stage one PCM16/24kHz chunk: counted locally, base64-encoded and
    /// appended to the server-side input buffer.
    pub async fn send_audio_chunk(&self, pcm: &[u8]) -> Result<(), Error> {
        self.require_connected().await?;
        self.require_ready()?;
        if pcm.is_empty() {
            return Ok(());
        }
        self.audio.lock().await.append(pcm.len());
        let audio = base64::engine::general_purpose::STANDARD.encode(pcm);
        self.send_command(ClientCommand::InputAudioBufferAppend {
            event_id: Some(next_event_id()),
            audio,
        })
        .await
    }

    /// Commit the staged buffer. Fails with [`Error::BufferTooSmall`]
    /// under the 100ms floor; the caller should clear the buffer rather
    /// than retry immediately.
    pub async fn commit_audio_buffer(&self) -> Result<(), Error> {
        self.require_connected().await?;
        self.require_ready()?;
        self.audio.lock().await.check_commit()?;
        self.send_command(ClientCommand::InputAudioBufferCommit {
            event_id: Some(next_event_id()),
        })
        .await?;
        self.audio.lock().await.clear();
        Ok(())
    }

    /// Discard the staged buffer on both sides.
    pub async fn clear_audio_buffer(&self) -> Result<(), Error> {
        self.require_connected().await?;
        self.require_ready()?;
        self.send_command(ClientCommand::InputAudioBufferClear {
            event_id: Some(next_event_id()),
        })
        .await?;
        self.audio.lock().await.clear();
        Ok(())
    }

    // ── Conversation operations ───────────────────────────────────

    pub async fn create_conversation_item(
        &self,
        item: OutboundItem,
        previous_item_id: Option<String>,
    ) -> Result<(), Error> {
        self.require_connected().await?;
        self.require_ready()?;
        self.send_command(ClientCommand::ConversationItemCreate {
            event_id: Some(next_event_id()),
            previous_item_id,
            item,
        })
        .await
    }

    pub async fn retrieve_item(&self, item_id: impl Into<String>) -> Result<(), Error> {
        self.require_connected().await?;
        self.require_ready()?;
        self.send_command(ClientCommand::ConversationItemRetrieve {
            event_id: Some(next_event_id()),
            item_id: item_id.into(),
        })
        .await
    }

    /// Truncate already-sent assistant audio at a playback position.
    pub async fn truncate_item(
        &self,
        item_id: impl Into<String>,
        content_index: u32,
        audio_end_ms: u64,
    ) -> Result<(), Error> {
        self.require_connected().await?;
        self.require_ready()?;
        self.send_command(ClientCommand::ConversationItemTruncate {
            event_id: Some(next_event_id()),
            item_id: item_id.into(),
            content_index,
            audio_end_ms,
        })
        .await
    }

    pub async fn delete_item(&self, item_id: impl Into<String>) -> Result<(), Error> {
        self.require_connected().await?;
        self.require_ready()?;
        self.send_command(ClientCommand::ConversationItemDelete {
            event_id: Some(next_event_id()),
            item_id: item_id.into(),
        })
        .await
    }

    // ── Response operations ───────────────────────────────────────

    pub async fn create_response(&self, options: Option<ResponseOptions>) -> Result<(), Error> {
        self.require_connected().await?;
        self.require_ready()?;
        self.send_command(ClientCommand::ResponseCreate {
            event_id: Some(next_event_id()),
            response: options,
        })
        .await
    }

    pub async fn cancel_response(&self, response_id: Option<String>) -> Result<(), Error> {
        self.require_connected().await?;
        self.require_ready()?;
        self.send_command(ClientCommand::ResponseCancel {
            event_id: Some(next_event_id()),
            response_id,
        })
        .await
    }

    /// Approve or deny a pending MCP tool call.
    pub async fn send_tool_approval(
        &self,
        approval_request_id: impl Into<String>,
        approve: bool,
        reason: Option<String>,
    ) -> Result<(), Error> {
        self.require_connected().await?;
        self.require_ready()?;
        self.send_command(ClientCommand::McpApprovalResponse {
            event_id: Some(next_event_id()),
            approval_request_id: approval_request_id.into(),
            approve,
            reason,
        })
        .await
    }

    // ── Accessors ─────────────────────────────────────────────────

    pub async fn session_state(&self) -> SessionState {
        self.state.lock().await.clone()
    }

    pub async fn session_id(&self) -> Option<String> {
        self.state.lock().await.session_id().map(str::to_string)
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    pub async fn audio_stats(&self) -> AudioBufferStats {
        self.audio.lock().await.stats()
    }

    // ── Internals ─────────────────────────────────────────────────

    async fn require_connected(&self) -> Result<(), Error> {
        if !self.transport.is_connected().await {
            return Err(Error::NotConnected);
        }
        Ok(())
    }

    fn require_ready(&self) -> Result<(), Error> {
        if !self.ready.load(Ordering::SeqCst) {
            return Err(Error::SessionNotReady);
        }
        Ok(())
    }

    async fn send_command(&self, command: ClientCommand) -> Result<(), Error> {
        let frame = command.encode()?;
        tracing::debug!(command = command.event_type(), "sending command");
        self.transport.send(&frame).await
    }
}

fn next_event_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// ── Dispatch loop ──────────────────────────────────────────────────

/// Decode inbound frames once, apply them to the state machine and
/// republish in order. One malformed frame never terminates the session.
async fn dispatch_loop(
    mut frames: mpsc::Receiver<Result<String, Error>>,
    event_tx: mpsc::Sender<EngineEvent>,
    state: Arc<Mutex<SessionState>>,
    audio: Arc<Mutex<AudioInputBuffer>>,
    ready: Arc<AtomicBool>,
) {
    while let Some(item) = frames.recv().await {
        let engine_event = match item {
            Ok(frame) => match decode_frame(&frame) {
                Ok(event) => {
                    apply_event(&event, &state, &audio, &ready).await;
                    EngineEvent::Server(event)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to decode inbound frame");
                    EngineEvent::DecodeFailure(e)
                }
            },
            Err(e) => {
                if e == Error::MaxReconnectAttemptsReached {
                    ready.store(false, Ordering::SeqCst);
                    let mut state = state.lock().await;
                    *state = state.on_error("maximum reconnect attempts reached");
                }
                EngineEvent::ConnectionFailure(e)
            }
        };
        if event_tx.send(engine_event).await.is_err() {
            tracing::debug!("event subscriber dropped, closing dispatch loop");
            break;
        }
    }

    // Frame channel closed: the transport is gone. Dropping event_tx
    // closes the subscriber stream in turn.
    ready.store(false, Ordering::SeqCst);
    let mut state = state.lock().await;
    *state = state.finish_termination();
    tracing::debug!("dispatch loop terminated");
}

/// State-machine side effects of one decoded event.
///
/// Session (re)confirmation discards any staged audio: chunks appended
/// against the previous configuration must not be committed against the
/// new one.
async fn apply_event(
    event: &ServerEvent,
    state: &Arc<Mutex<SessionState>>,
    audio: &Arc<Mutex<AudioInputBuffer>>,
    ready: &Arc<AtomicBool>,
) {
    match event {
        ServerEvent::SessionCreated { session } => {
            tracing::info!(session_id = %session.id, "session created");
            {
                let mut state = state.lock().await;
                *state = state.on_session_created(&session.id);
            }
            ready.store(true, Ordering::SeqCst);
            audio.lock().await.clear();
        }
        ServerEvent::SessionUpdated { session } => {
            tracing::info!(session_id = %session.id, "session updated");
            {
                let mut state = state.lock().await;
                *state = state.on_session_updated(&session.id);
            }
            ready.store(true, Ordering::SeqCst);
            audio.lock().await.clear();
        }
        ServerEvent::Error { error } => {
            tracing::error!(
                code = error.code.as_deref().unwrap_or("unknown"),
                message = %error.message,
                "server error event"
            );
            ready.store(false, Ordering::SeqCst);
            let mut state = state.lock().await;
            *state = state.on_error(&error.message);
        }
        _ => {}
    }
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::events::{ErrorDetail, SessionResource};

    fn test_engine() -> RealtimeEngine {
        RealtimeEngine::new(ConnectionConfig::new(
            "example.invalid",
            "gpt-realtime",
            "test-key",
        ))
    }

    fn session_resource(id: &str) -> SessionResource {
        SessionResource {
            id: id.into(),
            model: None,
            instructions: None,
            voice: None,
            input_audio_format: None,
            output_audio_format: None,
            turn_detection: None,
            max_response_output_tokens: None,
        }
    }

    #[tokio::test]
    async fn operations_require_a_connection() {
        let engine = test_engine();
        assert_eq!(
            engine.update_session(SessionConfig::default()).await,
            Err(Error::NotConnected)
        );
        assert_eq!(engine.send_audio_chunk(&[0u8; 3200]).await, Err(Error::NotConnected));
        assert_eq!(engine.commit_audio_buffer().await, Err(Error::NotConnected));
        assert_eq!(engine.create_response(None).await, Err(Error::NotConnected));
        assert_eq!(
            engine.delete_item("item_1").await,
            Err(Error::NotConnected)
        );
    }

    #[tokio::test]
    async fn disconnect_without_connection_is_a_no_op() {
        let engine = test_engine();
        engine.disconnect().await;
        engine.disconnect().await;
        assert_eq!(engine.session_state().await, SessionState::Uninitialized);
    }

    #[tokio::test]
    async fn session_created_flips_readiness_and_discards_staged_audio() {
        let engine = test_engine();
        engine.audio.lock().await.append(4800);
        assert!(!engine.is_ready());

        let event = ServerEvent::SessionCreated {
            session: session_resource("sess_abc"),
        };
        apply_event(&event, &engine.state, &engine.audio, &engine.ready).await;

        assert!(engine.is_ready());
        assert_eq!(engine.audio_stats().await.bytes, 0);
        // The machine never saw a connect attempt in this test, so the
        // created event leaves Uninitialized untouched.
        assert_eq!(engine.session_id().await, None);
    }

    #[tokio::test]
    async fn session_created_promotes_establishing_state() {
        let engine = test_engine();
        {
            let mut state = engine.state.lock().await;
            *state = state.on_connect();
        }
        let event = ServerEvent::SessionCreated {
            session: session_resource("sess_abc"),
        };
        apply_event(&event, &engine.state, &engine.audio, &engine.ready).await;

        assert_eq!(engine.session_id().await, Some("sess_abc".into()));
        assert!(engine.session_state().await.can_accept_audio());
    }

    #[tokio::test]
    async fn server_error_event_is_fatal_to_the_state_machine() {
        let engine = test_engine();
        {
            let mut state = engine.state.lock().await;
            *state = SessionState::Ready { session_id: "sess_abc".into() };
        }
        engine.ready.store(true, Ordering::SeqCst);

        let event = ServerEvent::Error {
            error: ErrorDetail {
                kind: Some("server_error".into()),
                code: None,
                message: "internal failure".into(),
                param: None,
            },
        };
        apply_event(&event, &engine.state, &engine.audio, &engine.ready).await;

        assert!(!engine.is_ready());
        assert_eq!(
            engine.session_state().await,
            SessionState::Error { message: "internal failure".into() }
        );

        // Explicit reset is the only way out.
        engine.reset().await;
        assert_eq!(engine.session_state().await, SessionState::Uninitialized);
    }

    #[tokio::test]
    async fn dispatch_loop_survives_malformed_frames() {
        let (frame_tx, frame_rx) = mpsc::channel(8);
        let (event_tx, mut event_rx) = mpsc::channel(8);
        let engine = test_engine();

        let task = tokio::spawn(dispatch_loop(
            frame_rx,
            event_tx,
            Arc::clone(&engine.state),
            Arc::clone(&engine.audio),
            Arc::clone(&engine.ready),
        ));

        frame_tx.send(Ok("{broken".into())).await.unwrap();
        frame_tx
            .send(Ok(r#"{"type": "session.created", "session": {"id": "sess_1"}}"#.into()))
            .await
            .unwrap();
        drop(frame_tx);

        let first = event_rx.recv().await.unwrap();
        assert!(matches!(first, EngineEvent::DecodeFailure(_)));

        let second = event_rx.recv().await.unwrap();
        match second {
            EngineEvent::Server(ServerEvent::SessionCreated { session }) => {
                assert_eq!(session.id, "sess_1");
            }
            other => panic!("expected SessionCreated, got {other:?}"),
        }

        // Channel closes once the frame stream ends.
        assert!(event_rx.recv().await.is_none());
        task.await.unwrap();
        assert!(engine.is_ready());
    }

    #[tokio::test]
    async fn terminal_reconnect_failure_surfaces_and_poisons_state() {
        let (frame_tx, frame_rx) = mpsc::channel(8);
        let (event_tx, mut event_rx) = mpsc::channel(8);
        let engine = test_engine();

        let task = tokio::spawn(dispatch_loop(
            frame_rx,
            event_tx,
            Arc::clone(&engine.state),
            Arc::clone(&engine.audio),
            Arc::clone(&engine.ready),
        ));

        frame_tx
            .send(Err(Error::MaxReconnectAttemptsReached))
            .await
            .unwrap();
        drop(frame_tx);

        assert_eq!(
            event_rx.recv().await.unwrap(),
            EngineEvent::ConnectionFailure(Error::MaxReconnectAttemptsReached)
        );
        task.await.unwrap();

        assert!(!engine.is_ready());
        assert!(matches!(
            engine.session_state().await,
            SessionState::Error { .. }
        ));
    }

    #[tokio::test]
    async fn events_are_republished_in_receive_order() {
        let (frame_tx, frame_rx) = mpsc::channel(8);
        let (event_tx, mut event_rx) = mpsc::channel(8);
        let engine = test_engine();

        let task = tokio::spawn(dispatch_loop(
            frame_rx,
            event_tx,
            Arc::clone(&engine.state),
            Arc::clone(&engine.audio),
            Arc::clone(&engine.ready),
        ));

        for delta in ["He", "llo", "!"] {
            frame_tx
                .send(Ok(format!(
                    r#"{{"type": "response.text.delta", "delta": "{delta}"}}"#
                )))
                .await
                .unwrap();
        }
        drop(frame_tx);

        let mut collected = String::new();
        while let Some(event) = event_rx.recv().await {
            if let EngineEvent::Server(ServerEvent::ResponseTextDelta { delta, .. }) = event {
                collected.push_str(&delta);
            }
        }
        assert_eq!(collected, "Hello!");
        task.await.unwrap();
    }
}
