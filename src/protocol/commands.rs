//! Outbound command catalog.
//!
//! Twelve command kinds, each with a fixed `type` discriminant declared in
//! the serde rename table below. The discriminant is a constant per kind,
//! never client-settable. `Deserialize` is derived alongside `Serialize`
//! so echoed frames round-trip in tests.

use serde::{Deserialize, Serialize};

use crate::config::{ResponseOptions, SessionConfig};
use crate::error::Error;
use crate::protocol::items::OutboundItem;

/// A command the client sends to the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientCommand {
    /// Apply session configuration; the server acknowledges with
    /// `session.updated`.
    #[serde(rename = "session.update")]
    SessionUpdate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        event_id: Option<String>,
        session: SessionConfig,
    },

    /// Offer a WebRTC SDP for the avatar video channel.
    #[serde(rename = "session.avatar.connect")]
    AvatarConnect {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        event_id: Option<String>,
        client_sdp: String,
    },

    /// Append a base64 audio chunk to the server-side input buffer.
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        event_id: Option<String>,
        audio: String,
    },

    /// Finalize the staged input buffer for processing.
    #[serde(rename = "input_audio_buffer.commit")]
    InputAudioBufferCommit {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        event_id: Option<String>,
    },

    /// Discard the staged input buffer.
    #[serde(rename = "input_audio_buffer.clear")]
    InputAudioBufferClear {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        event_id: Option<String>,
    },

    /// Insert an item into the conversation.
    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        event_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        previous_item_id: Option<String>,
        item: OutboundItem,
    },

    /// Ask the server to echo a stored item back.
    #[serde(rename = "conversation.item.retrieve")]
    ConversationItemRetrieve {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        event_id: Option<String>,
        item_id: String,
    },

    /// Truncate previously sent assistant audio at a playback position.
    #[serde(rename = "conversation.item.truncate")]
    ConversationItemTruncate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        event_id: Option<String>,
        item_id: String,
        content_index: u32,
        audio_end_ms: u64,
    },

    /// Remove an item from the conversation.
    #[serde(rename = "conversation.item.delete")]
    ConversationItemDelete {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        event_id: Option<String>,
        item_id: String,
    },

    /// Request a model response turn.
    #[serde(rename = "response.create")]
    ResponseCreate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        event_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        response: Option<ResponseOptions>,
    },

    /// Cancel the in-progress response (or a specific one by id).
    #[serde(rename = "response.cancel")]
    ResponseCancel {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        event_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        response_id: Option<String>,
    },

    /// Approve or deny a pending MCP tool call.
    #[serde(rename = "mcp_approval_response")]
    McpApprovalResponse {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        event_id: Option<String>,
        approval_request_id: String,
        approve: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}

impl ClientCommand {
    /// The fixed wire discriminant for this command kind.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::SessionUpdate { .. } => "session.update",
            Self::AvatarConnect { .. } => "session.avatar.connect",
            Self::InputAudioBufferAppend { .. } => "input_audio_buffer.append",
            Self::InputAudioBufferCommit { .. } => "input_audio_buffer.commit",
            Self::InputAudioBufferClear { .. } => "input_audio_buffer.clear",
            Self::ConversationItemCreate { .. } => "conversation.item.create",
            Self::ConversationItemRetrieve { .. } => "conversation.item.retrieve",
            Self::ConversationItemTruncate { .. } => "conversation.item.truncate",
            Self::ConversationItemDelete { .. } => "conversation.item.delete",
            Self::ResponseCreate { .. } => "response.create",
            Self::ResponseCancel { .. } => "response.cancel",
            Self::McpApprovalResponse { .. } => "mcp_approval_response",
        }
    }

    /// Serialize to a wire text frame.
    pub fn encode(&self) -> Result<String, Error> {
        serde_json::to_string(self).map_err(|e| Error::Encode(e.to_string()))
    }
}

// ── Tests ──────────────────────────────────────────────────────────
