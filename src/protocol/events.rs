//! Inbound event catalog.
//!
//! Forty-four known event kinds, grouped by family, plus an `Unknown`
//! fallback that preserves the raw discriminant so an unrecognized server
//! event is observable instead of silently dropped. Wire field names are
//! declared explicitly in the serde rename table; unknown payload fields
//! are ignored for forward compatibility.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{AudioFormat, MaxOutputTokens, TurnDetection, VoiceConfig};
use crate::protocol::items::{ContentPart, ConversationItem};

// ── Shared payload resources ───────────────────────────────────────

/// Session object echoed in `session.created` / `session.updated`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionResource {
    /// Server-assigned session id.
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<VoiceConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_audio_format: Option<AudioFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_audio_format: Option<AudioFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn_detection: Option<TurnDetection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_response_output_tokens: Option<MaxOutputTokens>,
}

/// Response object carried by the response lifecycle events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseResource {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ResponseStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_details: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output: Vec<ConversationItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// Terminal and in-flight response states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    InProgress,
    Completed,
    Cancelled,
    Failed,
    Incomplete,
    /// Any status string this client does not know yet.
    #[serde(other)]
    Unknown,
}

/// Token accounting reported with a finished response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub total_tokens: u64,
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
}

/// Error payload of the `error` event and transcription failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
}

/// One entry of a `rate_limits.updated` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimit {
    pub name: String,
    #[serde(default)]
    pub limit: u64,
    #[serde(default)]
    pub remaining: u64,
    #[serde(default)]
    pub reset_seconds: f64,
}

// ── Event catalog ──────────────────────────────────────────────────

/// Every inbound event this client understands, plus `Unknown`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    // ── Session lifecycle ─────────────────────────────────────────
    #[serde(rename = "session.created")]
    SessionCreated { session: SessionResource },
    #[serde(rename = "session.updated")]
    SessionUpdated { session: SessionResource },
    #[serde(rename = "session.avatar.connecting")]
    SessionAvatarConnecting { server_sdp: String },

    // ── Input audio buffer lifecycle ──────────────────────────────
    #[serde(rename = "input_audio_buffer.committed")]
    InputAudioBufferCommitted {
        #[serde(default)]
        previous_item_id: Option<String>,
        #[serde(default)]
        item_id: Option<String>,
    },
    #[serde(rename = "input_audio_buffer.cleared")]
    InputAudioBufferCleared {},
    #[serde(rename = "input_audio_buffer.speech_started")]
    InputAudioBufferSpeechStarted {
        #[serde(default)]
        audio_start_ms: u64,
        #[serde(default)]
        item_id: Option<String>,
    },
    #[serde(rename = "input_audio_buffer.speech_stopped")]
    InputAudioBufferSpeechStopped {
        #[serde(default)]
        audio_end_ms: u64,
        #[serde(default)]
        item_id: Option<String>,
    },

    // ── Conversation item lifecycle ───────────────────────────────
    #[serde(rename = "conversation.item.created")]
    ConversationItemCreated {
        #[serde(default)]
        previous_item_id: Option<String>,
        item: ConversationItem,
    },
    #[serde(rename = "conversation.item.retrieved")]
    ConversationItemRetrieved { item: ConversationItem },
    #[serde(rename = "conversation.item.truncated")]
    ConversationItemTruncated {
        item_id: String,
        #[serde(default)]
        content_index: u32,
        #[serde(default)]
        audio_end_ms: u64,
    },
    #[serde(rename = "conversation.item.deleted")]
    ConversationItemDeleted { item_id: String },
    #[serde(rename = "conversation.item.input_audio_transcription.delta")]
    InputAudioTranscriptionDelta {
        #[serde(default)]
        item_id: Option<String>,
        #[serde(default)]
        content_index: u32,
        delta: String,
    },
    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    InputAudioTranscriptionCompleted {
        #[serde(default)]
        item_id: Option<String>,
        #[serde(default)]
        content_index: u32,
        transcript: String,
    },
    #[serde(rename = "conversation.item.input_audio_transcription.failed")]
    InputAudioTranscriptionFailed {
        #[serde(default)]
        item_id: Option<String>,
        #[serde(default)]
        content_index: u32,
        error: ErrorDetail,
    },

    // ── Response lifecycle ────────────────────────────────────────
    #[serde(rename = "response.created")]
    ResponseCreated { response: ResponseResource },
    #[serde(rename = "response.done")]
    ResponseDone { response: ResponseResource },
    #[serde(rename = "response.output_item.added")]
    ResponseOutputItemAdded {
        #[serde(default)]
        response_id: Option<String>,
        #[serde(default)]
        output_index: u32,
        item: ConversationItem,
    },
    #[serde(rename = "response.output_item.done")]
    ResponseOutputItemDone {
        #[serde(default)]
        response_id: Option<String>,
        #[serde(default)]
        output_index: u32,
        item: ConversationItem,
    },
    #[serde(rename = "response.content_part.added")]
    ResponseContentPartAdded {
        #[serde(default)]
        response_id: Option<String>,
        #[serde(default)]
        item_id: Option<String>,
        #[serde(default)]
        output_index: u32,
        #[serde(default)]
        content_index: u32,
        part: ContentPart,
    },
    #[serde(rename = "response.content_part.done")]
    ResponseContentPartDone {
        #[serde(default)]
        response_id: Option<String>,
        #[serde(default)]
        item_id: Option<String>,
        #[serde(default)]
        output_index: u32,
        #[serde(default)]
        content_index: u32,
        part: ContentPart,
    },

    // ── Text streaming ────────────────────────────────────────────
    #[serde(rename = "response.text.delta")]
    ResponseTextDelta {
        #[serde(default)]
        item_id: Option<String>,
        #[serde(default)]
        output_index: u32,
        #[serde(default)]
        content_index: u32,
        delta: String,
    },
    #[serde(rename = "response.text.done")]
    ResponseTextDone {
        #[serde(default)]
        item_id: Option<String>,
        #[serde(default)]
        output_index: u32,
        #[serde(default)]
        content_index: u32,
        text: String,
    },

    // ── Audio streaming ───────────────────────────────────────────
    #[serde(rename = "response.audio.delta")]
    ResponseAudioDelta {
        #[serde(default)]
        item_id: Option<String>,
        #[serde(default)]
        output_index: u32,
        #[serde(default)]
        content_index: u32,
        /// Base64-encoded PCM16 audio.
        delta: String,
    },
    #[serde(rename = "response.audio.done")]
    ResponseAudioDone {
        #[serde(default)]
        item_id: Option<String>,
        #[serde(default)]
        output_index: u32,
        #[serde(default)]
        content_index: u32,
    },
    #[serde(rename = "response.audio_transcript.delta")]
    ResponseAudioTranscriptDelta {
        #[serde(default)]
        item_id: Option<String>,
        #[serde(default)]
        output_index: u32,
        #[serde(default)]
        content_index: u32,
        delta: String,
    },
    #[serde(rename = "response.audio_transcript.done")]
    ResponseAudioTranscriptDone {
        #[serde(default)]
        item_id: Option<String>,
        #[serde(default)]
        output_index: u32,
        #[serde(default)]
        content_index: u32,
        transcript: String,
    },

    // ── Avatar animation: blendshapes ─────────────────────────────
    #[serde(rename = "response.animation_blendshapes.delta")]
    ResponseAnimationBlendshapesDelta {
        #[serde(default)]
        item_id: Option<String>,
        #[serde(default)]
        frame_index: u64,
        /// Rows of blendshape weights, one row per animation frame.
        frames: Vec<Vec<f32>>,
    },
    #[serde(rename = "response.animation_blendshapes.done")]
    ResponseAnimationBlendshapesDone {
        #[serde(default)]
        item_id: Option<String>,
    },

    // ── Avatar animation: visemes ─────────────────────────────────
    #[serde(rename = "response.animation_viseme.delta")]
    ResponseAnimationVisemeDelta {
        #[serde(default)]
        item_id: Option<String>,
        viseme_id: u32,
        #[serde(default)]
        audio_offset_ms: u64,
    },
    #[serde(rename = "response.animation_viseme.done")]
    ResponseAnimationVisemeDone {
        #[serde(default)]
        item_id: Option<String>,
    },

    // ── Word-boundary audio timestamps ────────────────────────────
    #[serde(rename = "response.audio_timestamp.delta")]
    ResponseAudioTimestampDelta {
        #[serde(default)]
        item_id: Option<String>,
        #[serde(default)]
        audio_offset_ms: u64,
        #[serde(default)]
        audio_duration_ms: u64,
        text: String,
    },
    #[serde(rename = "response.audio_timestamp.done")]
    ResponseAudioTimestampDone {
        #[serde(default)]
        item_id: Option<String>,
    },

    // ── Function calls ────────────────────────────────────────────
    #[serde(rename = "response.function_call_arguments.delta")]
    ResponseFunctionCallArgumentsDelta {
        #[serde(default)]
        item_id: Option<String>,
        #[serde(default)]
        output_index: u32,
        call_id: String,
        delta: String,
    },
    #[serde(rename = "response.function_call_arguments.done")]
    ResponseFunctionCallArgumentsDone {
        #[serde(default)]
        item_id: Option<String>,
        #[serde(default)]
        output_index: u32,
        call_id: String,
        #[serde(default)]
        name: Option<String>,
        arguments: String,
    },

    // ── MCP tool list lifecycle ───────────────────────────────────
    #[serde(rename = "mcp_list_tools.in_progress")]
    McpListToolsInProgress {
        #[serde(default)]
        item_id: Option<String>,
    },
    #[serde(rename = "mcp_list_tools.completed")]
    McpListToolsCompleted {
        #[serde(default)]
        item_id: Option<String>,
    },
    #[serde(rename = "mcp_list_tools.failed")]
    McpListToolsFailed {
        #[serde(default)]
        item_id: Option<String>,
    },

    // ── MCP tool call lifecycle ───────────────────────────────────
    #[serde(rename = "response.mcp_call_arguments.delta")]
    ResponseMcpCallArgumentsDelta {
        #[serde(default)]
        item_id: Option<String>,
        #[serde(default)]
        output_index: u32,
        delta: String,
    },
    #[serde(rename = "response.mcp_call_arguments.done")]
    ResponseMcpCallArgumentsDone {
        #[serde(default)]
        item_id: Option<String>,
        #[serde(default)]
        output_index: u32,
        arguments: String,
    },
    #[serde(rename = "response.mcp_call.in_progress")]
    ResponseMcpCallInProgress {
        #[serde(default)]
        item_id: Option<String>,
        #[serde(default)]
        output_index: u32,
    },
    #[serde(rename = "response.mcp_call.completed")]
    ResponseMcpCallCompleted {
        #[serde(default)]
        item_id: Option<String>,
        #[serde(default)]
        output_index: u32,
    },
    #[serde(rename = "response.mcp_call.failed")]
    ResponseMcpCallFailed {
        #[serde(default)]
        item_id: Option<String>,
        #[serde(default)]
        output_index: u32,
    },

    // ── System ────────────────────────────────────────────────────
    #[serde(rename = "error")]
    Error { error: ErrorDetail },
    #[serde(rename = "rate_limits.updated")]
    RateLimitsUpdated {
        #[serde(default)]
        rate_limits: Vec<RateLimit>,
    },

    // ── Forward compatibility ─────────────────────────────────────
    /// An event whose discriminant this client does not recognize.
    /// Never produced by serde; constructed by the frame decoder.
    #[serde(skip)]
    Unknown { event_type: String },
}

/// The 44 discriminants the decoder dispatches on, grouped as in the
/// catalog above. Anything else becomes [`ServerEvent::Unknown`].
pub(crate) const SERVER_EVENT_TAGS: &[&str] = &[
    "session.created",
    "session.updated",
    "session.avatar.connecting",
    "input_audio_buffer.committed",
    "input_audio_buffer.cleared",
    "input_audio_buffer.speech_started",
    "input_audio_buffer.speech_stopped",
    "conversation.item.created",
    "conversation.item.retrieved",
    "conversation.item.truncated",
    "conversation.item.deleted",
    "conversation.item.input_audio_transcription.delta",
    "conversation.item.input_audio_transcription.completed",
    "conversation.item.input_audio_transcription.failed",
    "response.created",
    "response.done",
    "response.output_item.added",
    "response.output_item.done",
    "response.content_part.added",
    "response.content_part.done",
    "response.text.delta",
    "response.text.done",
    "response.audio.delta",
    "response.audio.done",
    "response.audio_transcript.delta",
    "response.audio_transcript.done",
    "response.animation_blendshapes.delta",
    "response.animation_blendshapes.done",
    "response.animation_viseme.delta",
    "response.animation_viseme.done",
    "response.audio_timestamp.delta",
    "response.audio_timestamp.done",
    "response.function_call_arguments.delta",
    "response.function_call_arguments.done",
    "mcp_list_tools.in_progress",
    "mcp_list_tools.completed",
    "mcp_list_tools.failed",
    "response.mcp_call_arguments.delta",
    "response.mcp_call_arguments.done",
    "response.mcp_call.in_progress",
    "response.mcp_call.completed",
    "response.mcp_call.failed",
    "error",
    "rate_limits.updated",
];

impl ServerEvent {
    /// The wire discriminant of this event. For [`ServerEvent::Unknown`]
    /// this is the raw tag as received.
    pub fn event_type(&self) -> &str {
        match self {
            Self::SessionCreated { .. } => "session.created",
            Self::SessionUpdated { .. } => "session.updated",
            Self::SessionAvatarConnecting { .. } => "session.avatar.connecting",
            Self::InputAudioBufferCommitted { .. } => "input_audio_buffer.committed",
            Self::InputAudioBufferCleared {} => "input_audio_buffer.cleared",
            Self::InputAudioBufferSpeechStarted { .. } => "input_audio_buffer.speech_started",
            Self::InputAudioBufferSpeechStopped { .. } => "input_audio_buffer.speech_stopped",
            Self::ConversationItemCreated { .. } => "conversation.item.created",
            Self::ConversationItemRetrieved { .. } => "conversation.item.retrieved",
            Self::ConversationItemTruncated { .. } => "conversation.item.truncated",
            Self::ConversationItemDeleted { .. } => "conversation.item.deleted",
            Self::InputAudioTranscriptionDelta { .. } => {
                "conversation.item.input_audio_transcription.delta"
            }
            Self::InputAudioTranscriptionCompleted { .. } => {
                "conversation.item.input_audio_transcription.completed"
            }
            Self::InputAudioTranscriptionFailed { .. } => {
                "conversation.item.input_audio_transcription.failed"
            }
            Self::ResponseCreated { .. } => "response.created",
            Self::ResponseDone { .. } => "response.done",
            Self::ResponseOutputItemAdded { .. } => "response.output_item.added",
            Self::ResponseOutputItemDone { .. } => "response.output_item.done",
            Self::ResponseContentPartAdded { .. } => "response.content_part.added",
            Self::ResponseContentPartDone { .. } => "response.content_part.done",
            Self::ResponseTextDelta { .. } => "response.text.delta",
            Self::ResponseTextDone { .. } => "response.text.done",
            Self::ResponseAudioDelta { .. } => "response.audio.delta",
            Self::ResponseAudioDone { .. } => "response.audio.done",
            Self::ResponseAudioTranscriptDelta { .. } => "response.audio_transcript.delta",
            Self::ResponseAudioTranscriptDone { .. } => "response.audio_transcript.done",
            Self::ResponseAnimationBlendshapesDelta { .. } => {
                "response.animation_blendshapes.delta"
            }
            Self::ResponseAnimationBlendshapesDone { .. } => "response.animation_blendshapes.done",
            Self::ResponseAnimationVisemeDelta { .. } => "response.animation_viseme.delta",
            Self::ResponseAnimationVisemeDone { .. } => "response.animation_viseme.done",
            Self::ResponseAudioTimestampDelta { .. } => "response.audio_timestamp.delta",
            Self::ResponseAudioTimestampDone { .. } => "response.audio_timestamp.done",
            Self::ResponseFunctionCallArgumentsDelta { .. } => {
                "response.function_call_arguments.delta"
            }
            Self::ResponseFunctionCallArgumentsDone { .. } => {
                "response.function_call_arguments.done"
            }
            Self::McpListToolsInProgress { .. } => "mcp_list_tools.in_progress",
            Self::McpListToolsCompleted { .. } => "mcp_list_tools.completed",
            Self::McpListToolsFailed { .. } => "mcp_list_tools.failed",
            Self::ResponseMcpCallArgumentsDelta { .. } => "response.mcp_call_arguments.delta",
            Self::ResponseMcpCallArgumentsDone { .. } => "response.mcp_call_arguments.done",
            Self::ResponseMcpCallInProgress { .. } => "response.mcp_call.in_progress",
            Self::ResponseMcpCallCompleted { .. } => "response.mcp_call.completed",
            Self::ResponseMcpCallFailed { .. } => "response.mcp_call.failed",
            Self::Error { .. } => "error",
            Self::RateLimitsUpdated { .. } => "rate_limits.updated",
            Self::Unknown { event_type } => event_type,
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_table_has_forty_four_entries() {
        assert_eq!(SERVER_EVENT_TAGS.len(), 44);
    }

    #[test]
    fn session_created_parses_resource() {
        let json = r#"{"type": "session.created", "session": {"id": "sess_abc", "model": "gpt-realtime"}}"#;
        let event: ServerEvent = serde_json::from_str(json).unwrap();
        match event {
            ServerEvent::SessionCreated { session } => {
                assert_eq!(session.id, "sess_abc");
                assert_eq!(session.model.as_deref(), Some("gpt-realtime"));
            }
            other => panic!("expected SessionCreated, got {other:?}"),
        }
    }

    #[test]
    fn response_status_tolerates_new_strings() {
        let json = r#"{"id": "resp_1", "status": "paused"}"#;
        let response: ResponseResource = serde_json::from_str(json).unwrap();
        assert_eq!(response.status, Some(ResponseStatus::Unknown));
    }

    #[test]
    fn blendshape_delta_carries_frame_rows() {
        let json = r#"{"type": "response.animation_blendshapes.delta", "frame_index": 3, "frames": [[0.1, 0.2], [0.3, 0.4]]}"#;
        let event: ServerEvent = serde_json::from_str(json).unwrap();
        match event {
            ServerEvent::ResponseAnimationBlendshapesDelta { frame_index, frames, .. } => {
                assert_eq!(frame_index, 3);
                assert_eq!(frames.len(), 2);
                assert_eq!(frames[1][0], 0.3);
            }
            other => panic!("expected blendshapes delta, got {other:?}"),
        }
    }

    #[test]
    fn rate_limits_parse_entries() {
        let json = r#"{"type": "rate_limits.updated", "rate_limits": [{"name": "tokens", "limit": 20000, "remaining": 18000, "reset_seconds": 1.5}]}"#;
        let event: ServerEvent = serde_json::from_str(json).unwrap();
        match event {
            ServerEvent::RateLimitsUpdated { rate_limits } => {
                assert_eq!(rate_limits.len(), 1);
                assert_eq!(rate_limits[0].name, "tokens");
                assert_eq!(rate_limits[0].remaining, 18000);
            }
            other => panic!("expected rate limits, got {other:?}"),
        }
    }

    #[test]
    fn event_type_matches_tag_table() {
        let json = r#"{"type": "response.text.delta", "delta": "hi"}"#;
        let event: ServerEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.event_type(), "response.text.delta");
        assert!(SERVER_EVENT_TAGS.contains(&event.event_type()));
    }
}
