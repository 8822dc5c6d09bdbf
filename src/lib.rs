//! Client-side session engine for a realtime voice AI service.
//!
//! Owns a persistent, bidirectional WebSocket connection and everything
//! around it: the session lifecycle state machine, client-side audio
//! buffer accounting, and a typed codec for the service's tagged JSON
//! protocol (12 outbound commands, 44 inbound events plus an unknown-tag
//! fallback).
//!
//! ## Design
//! - One logical session per engine; one socket per connection
//! - Typed wire enums with explicit rename tables, never automatic
//!   case conversion
//! - Heartbeat liveness (30s probe / 60s window) with bounded
//!   exponential-backoff reconnection (max 5 attempts)
//! - Minimum-duration gate (100ms) on audio buffer commits
//! - Single ordered event stream; decode failures are surfaced inline
//!   and never terminate the session
//!
//! ## Usage
//!
//! ```no_run
//! use voicelive::{ConnectionConfig, RealtimeEngine, SessionConfig};
//!
//! # async fn run() -> Result<(), voicelive::Error> {
//! let engine = RealtimeEngine::new(ConnectionConfig::new(
//!     "my-resource.cognitiveservices.example.com",
//!     "gpt-realtime",
//!     std::env::var("VOICELIVE_API_KEY").unwrap(),
//! ));
//! engine.connect(SessionConfig::default()).await?;
//!
//! let mut events = engine.take_events().await.expect("first subscriber");
//! engine.send_audio_chunk(&[0u8; 4800]).await?;
//! engine.commit_audio_buffer().await?;
//! while let Some(event) = events.recv().await {
//!     // react to decoded server events
//!     let _ = event;
//! }
//! # Ok(())
//! # }
//! ```

pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod protocol;
pub mod session;
pub mod transport;

pub use audio::{AudioBufferStats, AudioInputBuffer};
pub use config::{
    AudioFormat, AvatarConfig, ConnectionConfig, MaxOutputTokens, ResponseOptions, SessionConfig,
    ToolDefinition, TranscriptionConfig, TurnDetection, VoiceConfig,
};
pub use engine::{EngineEvent, RealtimeEngine};
pub use error::{DecodeError, Error};
pub use protocol::{
    ClientCommand, ContentPart, ConversationItem, ErrorDetail, OutboundItem, RateLimit,
    ResponseResource, ResponseStatus, ServerEvent, SessionResource, Usage,
};
pub use session::SessionState;
pub use transport::Transport;
