//! Conversation item and content part unions.
//!
//! These are the protocol's nested discriminated unions: a primary `type`
//! tag picks the family, and `message` items additionally need the `role`
//! field before the variant is known. Content parts tagged `audio` are
//! resolved by field presence (an `audio` payload vs. transcript-only).
//! Disambiguation is always explicit field inspection: a frame that fits
//! no shape is a decode error, never silently coerced into another shape.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::DecodeError;

// ── Value access helpers ───────────────────────────────────────────

/// Human-readable JSON type name for error detail strings.
pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Fetch a required string field, with the full taxonomy of failures.
pub(crate) fn required_str(value: &Value, field: &str, path: &str) -> Result<String, DecodeError> {
    match value.get(field) {
        None => Err(DecodeError::MissingField {
            path: format!("{path}.{field}"),
        }),
        Some(Value::Null) => Err(DecodeError::NullValue {
            path: format!("{path}.{field}"),
        }),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(DecodeError::TypeMismatch {
            path: format!("{path}.{field}"),
            detail: format!("expected string, got {}", json_type_name(other)),
        }),
    }
}

/// Fetch an optional string field; absent and null both map to `None`.
pub(crate) fn optional_str(value: &Value, field: &str, path: &str) -> Result<Option<String>, DecodeError> {
    match value.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(DecodeError::TypeMismatch {
            path: format!("{path}.{field}"),
            detail: format!("expected string, got {}", json_type_name(other)),
        }),
    }
}

fn required_bool(value: &Value, field: &str, path: &str) -> Result<bool, DecodeError> {
    match value.get(field) {
        None => Err(DecodeError::MissingField {
            path: format!("{path}.{field}"),
        }),
        Some(Value::Null) => Err(DecodeError::NullValue {
            path: format!("{path}.{field}"),
        }),
        Some(Value::Bool(b)) => Ok(*b),
        Some(other) => Err(DecodeError::TypeMismatch {
            path: format!("{path}.{field}"),
            detail: format!("expected boolean, got {}", json_type_name(other)),
        }),
    }
}

// ── Content parts (5 kinds) ────────────────────────────────────────

/// One element of a message item's `content` array.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentPart {
    /// Text supplied by the client.
    InputText { text: String },
    /// Audio supplied by the client, optionally with its transcript.
    InputAudio {
        audio: Option<String>,
        transcript: Option<String>,
    },
    /// Text produced by the model.
    Text { text: String },
    /// Assistant audio carrying the base64 payload, transcript optional.
    Audio {
        audio: String,
        transcript: Option<String>,
    },
    /// Response audio delivered transcript-only (payload streamed
    /// separately as `response.audio.delta` events).
    AudioTranscript { transcript: String },
}

impl ContentPart {
    /// Decode one content part at `path` within a larger payload.
    pub fn from_value(value: &Value, path: &str) -> Result<Self, DecodeError> {
        let tag = required_str(value, "type", path)?;
        match tag.as_str() {
            "input_text" => Ok(Self::InputText {
                text: required_str(value, "text", path)?,
            }),
            "input_audio" => Ok(Self::InputAudio {
                audio: optional_str(value, "audio", path)?,
                transcript: optional_str(value, "transcript", path)?,
            }),
            "text" => Ok(Self::Text {
                text: required_str(value, "text", path)?,
            }),
            // `audio` is ambiguous until field presence is checked: a
            // non-null `audio` payload selects assistant audio; otherwise
            // a transcript-only part. Neither present is corruption.
            "audio" => {
                if matches!(value.get("audio"), Some(v) if !v.is_null()) {
                    Ok(Self::Audio {
                        audio: required_str(value, "audio", path)?,
                        transcript: optional_str(value, "transcript", path)?,
                    })
                } else if matches!(value.get("transcript"), Some(v) if !v.is_null()) {
                    Ok(Self::AudioTranscript {
                        transcript: required_str(value, "transcript", path)?,
                    })
                } else {
                    Err(DecodeError::corrupted(
                        format!("audio content part at `{path}` has neither `audio` nor `transcript`"),
                        value.to_string(),
                    ))
                }
            }
            other => Err(DecodeError::corrupted(
                format!("unknown content part type `{other}` at `{path}`"),
                value.to_string(),
            )),
        }
    }

    /// Encode back to the wire shape.
    pub fn to_value(&self) -> Value {
        match self {
            Self::InputText { text } => json!({ "type": "input_text", "text": text }),
            Self::InputAudio { audio, transcript } => {
                let mut v = json!({ "type": "input_audio" });
                if let Some(audio) = audio {
                    v["audio"] = json!(audio);
                }
                if let Some(transcript) = transcript {
                    v["transcript"] = json!(transcript);
                }
                v
            }
            Self::Text { text } => json!({ "type": "text", "text": text }),
            Self::Audio { audio, transcript } => {
                let mut v = json!({ "type": "audio", "audio": audio });
                if let Some(transcript) = transcript {
                    v["transcript"] = json!(transcript);
                }
                v
            }
            Self::AudioTranscript { transcript } => {
                json!({ "type": "audio", "transcript": transcript })
            }
        }
    }
}

fn content_parts(value: &Value, path: &str) -> Result<Vec<ContentPart>, DecodeError> {
    match value.get("content") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(parts)) => parts
            .iter()
            .enumerate()
            .map(|(i, part)| ContentPart::from_value(part, &format!("{path}.content[{i}]")))
            .collect(),
        Some(other) => Err(DecodeError::TypeMismatch {
            path: format!("{path}.content"),
            detail: format!("expected array, got {}", json_type_name(other)),
        }),
    }
}

// ── Inbound conversation items (8 kinds) ───────────────────────────

/// A conversation item as reported by the server.
///
/// `message` items resolve to one of three variants via the secondary
/// `role` field; an unknown role is a corrupted-data error, never a
/// silent default.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversationItem {
    SystemMessage {
        id: Option<String>,
        status: Option<String>,
        content: Vec<ContentPart>,
    },
    UserMessage {
        id: Option<String>,
        status: Option<String>,
        content: Vec<ContentPart>,
    },
    AssistantMessage {
        id: Option<String>,
        status: Option<String>,
        content: Vec<ContentPart>,
    },
    FunctionCall {
        id: Option<String>,
        status: Option<String>,
        call_id: String,
        name: String,
        arguments: String,
    },
    FunctionCallOutput {
        id: Option<String>,
        call_id: String,
        output: String,
    },
    McpApprovalRequest {
        id: String,
        server_label: String,
        name: String,
        /// Opaque tool arguments; any JSON shape.
        arguments: Value,
    },
    McpApprovalResponse {
        id: Option<String>,
        approval_request_id: String,
        approve: bool,
    },
    McpCall {
        id: String,
        server_label: String,
        name: String,
        arguments: Value,
        output: Option<Value>,
        /// Opaque error payload; any JSON shape.
        error: Option<Value>,
    },
}

impl ConversationItem {
    /// Item id, when the server assigned one.
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::SystemMessage { id, .. }
            | Self::UserMessage { id, .. }
            | Self::AssistantMessage { id, .. }
            | Self::FunctionCall { id, .. }
            | Self::FunctionCallOutput { id, .. }
            | Self::McpApprovalResponse { id, .. } => id.as_deref(),
            Self::McpApprovalRequest { id, .. } | Self::McpCall { id, .. } => Some(id),
        }
    }

    /// Decode one item at `path` within a larger payload.
    pub fn from_value(value: &Value, path: &str) -> Result<Self, DecodeError> {
        let tag = required_str(value, "type", path)?;
        let id = optional_str(value, "id", path)?;
        match tag.as_str() {
            "message" => {
                let status = optional_str(value, "status", path)?;
                let content = content_parts(value, path)?;
                match required_str(value, "role", path)?.as_str() {
                    "system" => Ok(Self::SystemMessage { id, status, content }),
                    "user" => Ok(Self::UserMessage { id, status, content }),
                    "assistant" => Ok(Self::AssistantMessage { id, status, content }),
                    other => Err(DecodeError::corrupted(
                        format!("unknown message role `{other}` at `{path}.role`"),
                        value.to_string(),
                    )),
                }
            }
            "function_call" => Ok(Self::FunctionCall {
                id,
                status: optional_str(value, "status", path)?,
                call_id: required_str(value, "call_id", path)?,
                name: required_str(value, "name", path)?,
                arguments: required_str(value, "arguments", path)?,
            }),
            "function_call_output" => Ok(Self::FunctionCallOutput {
                id,
                call_id: required_str(value, "call_id", path)?,
                output: required_str(value, "output", path)?,
            }),
            "mcp_approval_request" => Ok(Self::McpApprovalRequest {
                id: required_str(value, "id", path)?,
                server_label: required_str(value, "server_label", path)?,
                name: required_str(value, "name", path)?,
                arguments: value.get("arguments").cloned().unwrap_or(Value::Null),
            }),
            "mcp_approval_response" => Ok(Self::McpApprovalResponse {
                id,
                approval_request_id: required_str(value, "approval_request_id", path)?,
                approve: required_bool(value, "approve", path)?,
            }),
            "mcp_call" => Ok(Self::McpCall {
                id: required_str(value, "id", path)?,
                server_label: required_str(value, "server_label", path)?,
                name: required_str(value, "name", path)?,
                arguments: value.get("arguments").cloned().unwrap_or(Value::Null),
                output: value.get("output").filter(|v| !v.is_null()).cloned(),
                error: value.get("error").filter(|v| !v.is_null()).cloned(),
            }),
            other => Err(DecodeError::corrupted(
                format!("unknown conversation item type `{other}` at `{path}.type`"),
                value.to_string(),
            )),
        }
    }

    /// Encode back to the wire shape.
    pub fn to_value(&self) -> Value {
        fn message(role: &str, id: &Option<String>, status: &Option<String>, content: &[ContentPart]) -> Value {
            let mut v = json!({
                "type": "message",
                "role": role,
                "content": content.iter().map(ContentPart::to_value).collect::<Vec<_>>(),
            });
            if let Some(id) = id {
                v["id"] = json!(id);
            }
            if let Some(status) = status {
                v["status"] = json!(status);
            }
            v
        }

        match self {
            Self::SystemMessage { id, status, content } => message("system", id, status, content),
            Self::UserMessage { id, status, content } => message("user", id, status, content),
            Self::AssistantMessage { id, status, content } => {
                message("assistant", id, status, content)
            }
            Self::FunctionCall { id, status, call_id, name, arguments } => {
                let mut v = json!({
                    "type": "function_call",
                    "call_id": call_id,
                    "name": name,
                    "arguments": arguments,
                });
                if let Some(id) = id {
                    v["id"] = json!(id);
                }
                if let Some(status) = status {
                    v["status"] = json!(status);
                }
                v
            }
            Self::FunctionCallOutput { id, call_id, output } => {
                let mut v = json!({
                    "type": "function_call_output",
                    "call_id": call_id,
                    "output": output,
                });
                if let Some(id) = id {
                    v["id"] = json!(id);
                }
                v
            }
            Self::McpApprovalRequest { id, server_label, name, arguments } => json!({
                "type": "mcp_approval_request",
                "id": id,
                "server_label": server_label,
                "name": name,
                "arguments": arguments,
            }),
            Self::McpApprovalResponse { id, approval_request_id, approve } => {
                let mut v = json!({
                    "type": "mcp_approval_response",
                    "approval_request_id": approval_request_id,
                    "approve": approve,
                });
                if let Some(id) = id {
                    v["id"] = json!(id);
                }
                v
            }
            Self::McpCall { id, server_label, name, arguments, output, error } => {
                let mut v = json!({
                    "type": "mcp_call",
                    "id": id,
                    "server_label": server_label,
                    "name": name,
                    "arguments": arguments,
                });
                if let Some(output) = output {
                    v["output"] = output.clone();
                }
                if let Some(error) = error {
                    v["error"] = error.clone();
                }
                v
            }
        }
    }
}

impl Serialize for ConversationItem {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ConversationItem {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value, "item").map_err(serde::de::Error::custom)
    }
}

impl Serialize for ContentPart {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ContentPart {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value, "part").map_err(serde::de::Error::custom)
    }
}

// ── Outbound items (6 kinds) ───────────────────────────────────────

/// A conversation item the client submits via `conversation.item.create`.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundItem {
    SystemMessage { content: Vec<ContentPart> },
    UserMessage { content: Vec<ContentPart> },
    AssistantMessage { content: Vec<ContentPart> },
    FunctionCall {
        call_id: String,
        name: String,
        arguments: String,
    },
    FunctionCallOutput { call_id: String, output: String },
    McpApprovalResponse {
        approval_request_id: String,
        approve: bool,
    },
}

impl OutboundItem {
    /// A user message with a single text part.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self::UserMessage {
            content: vec![ContentPart::InputText { text: text.into() }],
        }
    }

    /// A system message with a single text part.
    pub fn system_text(text: impl Into<String>) -> Self {
        Self::SystemMessage {
            content: vec![ContentPart::InputText { text: text.into() }],
        }
    }

    fn from_value(value: &Value, path: &str) -> Result<Self, DecodeError> {
        let tag = required_str(value, "type", path)?;
        match tag.as_str() {
            "message" => {
                let content = content_parts(value, path)?;
                match required_str(value, "role", path)?.as_str() {
                    "system" => Ok(Self::SystemMessage { content }),
                    "user" => Ok(Self::UserMessage { content }),
                    "assistant" => Ok(Self::AssistantMessage { content }),
                    other => Err(DecodeError::corrupted(
                        format!("unknown message role `{other}` at `{path}.role`"),
                        value.to_string(),
                    )),
                }
            }
            "function_call" => Ok(Self::FunctionCall {
                call_id: required_str(value, "call_id", path)?,
                name: required_str(value, "name", path)?,
                arguments: required_str(value, "arguments", path)?,
            }),
            "function_call_output" => Ok(Self::FunctionCallOutput {
                call_id: required_str(value, "call_id", path)?,
                output: required_str(value, "output", path)?,
            }),
            "mcp_approval_response" => Ok(Self::McpApprovalResponse {
                approval_request_id: required_str(value, "approval_request_id", path)?,
                approve: required_bool(value, "approve", path)?,
            }),
            other => Err(DecodeError::corrupted(
                format!("unsupported outbound item type `{other}` at `{path}.type`"),
                value.to_string(),
            )),
        }
    }

    fn to_value(&self) -> Value {
        fn message(role: &str, content: &[ContentPart]) -> Value {
            json!({
                "type": "message",
                "role": role,
                "content": content.iter().map(ContentPart::to_value).collect::<Vec<_>>(),
            })
        }

        match self {
            Self::SystemMessage { content } => message("system", content),
            Self::UserMessage { content } => message("user", content),
            Self::AssistantMessage { content } => message("assistant", content),
            Self::FunctionCall { call_id, name, arguments } => json!({
                "type": "function_call",
                "call_id": call_id,
                "name": name,
                "arguments": arguments,
            }),
            Self::FunctionCallOutput { call_id, output } => json!({
                "type": "function_call_output",
                "call_id": call_id,
                "output": output,
            }),
            Self::McpApprovalResponse { approval_request_id, approve } => json!({
                "type": "mcp_approval_response",
                "approval_request_id": approval_request_id,
                "approve": approve,
            }),
        }
    }
}

impl Serialize for OutboundItem {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for OutboundItem {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value, "item").map_err(serde::de::Error::custom)
    }
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_role_selects_variant() {
        let assistant = serde_json::json!({
            "type": "message",
            "role": "assistant",
            "content": [{ "type": "text", "text": "hello" }],
        });
        let item = ConversationItem::from_value(&assistant, "item").unwrap();
        assert!(matches!(item, ConversationItem::AssistantMessage { .. }));

        let user = serde_json::json!({
            "type": "message",
            "role": "user",
            "content": [{ "type": "input_text", "text": "hi" }],
        });
        let item = ConversationItem::from_value(&user, "item").unwrap();
        assert!(matches!(item, ConversationItem::UserMessage { .. }));
    }

    #[test]
    fn unknown_role_is_corrupted_not_defaulted() {
        let value = serde_json::json!({ "type": "message", "role": "moderator" });
        let err = ConversationItem::from_value(&value, "item").unwrap_err();
        assert!(matches!(err, DecodeError::Corrupted { .. }));
        assert!(err.to_string().contains("moderator"));
    }

    #[test]
    fn missing_role_reports_field_path() {
        let value = serde_json::json!({ "type": "message" });
        let err = ConversationItem::from_value(&value, "item").unwrap_err();
        assert_eq!(
            err,
            DecodeError::MissingField { path: "item.role".into() }
        );
    }

    #[test]
    fn audio_part_disambiguates_by_field_presence() {
        let with_payload = serde_json::json!({
            "type": "audio", "audio": "UklGRg==", "transcript": "hi"
        });
        let part = ContentPart::from_value(&with_payload, "part").unwrap();
        assert!(matches!(part, ContentPart::Audio { .. }));

        let transcript_only = serde_json::json!({ "type": "audio", "transcript": "hi" });
        let part = ContentPart::from_value(&transcript_only, "part").unwrap();
        assert_eq!(
            part,
            ContentPart::AudioTranscript { transcript: "hi".into() }
        );

        let neither = serde_json::json!({ "type": "audio" });
        let err = ContentPart::from_value(&neither, "part").unwrap_err();
        assert!(matches!(err, DecodeError::Corrupted { .. }));
    }

    #[test]
    fn null_text_is_a_null_error() {
        let value = serde_json::json!({ "type": "text", "text": null });
        let err = ContentPart::from_value(&value, "part").unwrap_err();
        assert_eq!(err, DecodeError::NullValue { path: "part.text".into() });
    }

    #[test]
    fn function_call_requires_arguments() {
        let value = serde_json::json!({
            "type": "function_call", "call_id": "c1", "name": "lookup"
        });
        let err = ConversationItem::from_value(&value, "item").unwrap_err();
        assert_eq!(
            err,
            DecodeError::MissingField { path: "item.arguments".into() }
        );
    }

    #[test]
    fn outbound_item_roundtrips_through_wire_shape() {
        let item = OutboundItem::user_text("commit this");
        let value = item.to_value();
        assert_eq!(value["type"], "message");
        assert_eq!(value["role"], "user");

        let back: OutboundItem = serde_json::from_value(value).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn mcp_call_keeps_opaque_arguments() {
        let value = serde_json::json!({
            "type": "mcp_call",
            "id": "mc_1",
            "server_label": "search",
            "name": "find",
            "arguments": { "query": ["a", "b"], "limit": 3 },
            "error": null,
        });
        let item = ConversationItem::from_value(&value, "item").unwrap();
        match item {
            ConversationItem::McpCall { arguments, error, .. } => {
                assert_eq!(arguments["limit"], 3);
                assert!(error.is_none());
            }
            other => panic!("expected McpCall, got {other:?}"),
        }
    }
}
