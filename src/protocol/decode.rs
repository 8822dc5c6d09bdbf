//! Inbound frame decoding.
//!
//! One entry point: [`decode_frame`]. The top-level `type` discriminant is
//! extracted first; tags outside the known catalog short-circuit to
//! [`ServerEvent::Unknown`] so decoding never fails on a new server event.
//! Payload errors for known tags are classified into the
//! [`DecodeError`] taxonomy with the offending field path attached.

use serde_json::Value;

use crate::error::DecodeError;
use crate::protocol::events::{ServerEvent, SERVER_EVENT_TAGS};
use crate::protocol::items::json_type_name;

/// Decode one wire text frame into a typed event.
pub fn decode_frame(frame: &str) -> Result<ServerEvent, DecodeError> {
    let value: Value = serde_json::from_str(frame).map_err(|e| {
        DecodeError::corrupted(format!("malformed JSON frame: {e}"), frame)
    })?;

    let tag = match value.get("type") {
        None => {
            return Err(DecodeError::MissingField { path: "type".into() });
        }
        Some(Value::Null) => {
            return Err(DecodeError::NullValue { path: "type".into() });
        }
        Some(Value::String(s)) => s.clone(),
        Some(other) => {
            return Err(DecodeError::TypeMismatch {
                path: "type".into(),
                detail: format!("expected string, got {}", json_type_name(other)),
            });
        }
    };

    if !SERVER_EVENT_TAGS.contains(&tag.as_str()) {
        return Ok(ServerEvent::Unknown { event_type: tag });
    }

    serde_json::from_value::<ServerEvent>(value)
        .map_err(|e| classify_payload_error(e.to_string(), &tag, frame))
}

/// Map a serde payload error onto the decode taxonomy.
///
/// Errors raised by the hand-written item/part decoders tunnel through
/// serde as custom messages whose wording mirrors the taxonomy Display
/// forms, so their variant and field path survive the round trip.
fn classify_payload_error(detail: String, tag: &str, raw: &str) -> DecodeError {
    if let Some(stripped) = detail.strip_prefix("corrupted payload: ") {
        return DecodeError::corrupted(stripped, raw);
    }
    if let Some(path) = capture_backticked(&detail, "missing field `") {
        return DecodeError::MissingField { path };
    }
    if let Some(path) = capture_backticked(&detail, "null value for required field `") {
        return DecodeError::NullValue { path };
    }
    if detail.contains("invalid type: null") {
        return DecodeError::NullValue { path: tag.to_string() };
    }
    if let Some(path) = capture_backticked(&detail, "invalid type at `") {
        return DecodeError::TypeMismatch { path, detail };
    }
    if detail.contains("invalid type")
        || detail.contains("invalid value")
        || detail.contains("invalid length")
    {
        return DecodeError::TypeMismatch {
            path: tag.to_string(),
            detail,
        };
    }
    DecodeError::corrupted(detail, raw)
}

fn capture_backticked(detail: &str, prefix: &str) -> Option<String> {
    let rest = detail.strip_prefix(prefix)?;
    rest.split('`').next().map(str::to_string)
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    /// A minimal well-formed frame for every known discriminant.
    fn minimal_frames() -> Vec<(&'static str, String)> {
        let item = r#"{"type": "message", "role": "user", "content": []}"#;
        let call = r#"{"type": "function_call", "call_id": "c1", "name": "fn", "arguments": "{}"}"#;
        let part = r#"{"type": "text", "text": "hi"}"#;

        SERVER_EVENT_TAGS
            .iter()
            .map(|&tag| {
                let payload = match tag {
                    "session.created" | "session.updated" => {
                        r#", "session": {"id": "sess_1"}"#.to_string()
                    }
                    "session.avatar.connecting" => r#", "server_sdp": "v=0""#.to_string(),
                    "conversation.item.created" => format!(r#", "item": {item}"#),
                    "conversation.item.retrieved" => format!(r#", "item": {item}"#),
                    "conversation.item.truncated" | "conversation.item.deleted" => {
                        r#", "item_id": "item_1""#.to_string()
                    }
                    "conversation.item.input_audio_transcription.delta" => {
                        r#", "delta": "he""#.to_string()
                    }
                    "conversation.item.input_audio_transcription.completed" => {
                        r#", "transcript": "hello""#.to_string()
                    }
                    "conversation.item.input_audio_transcription.failed" => {
                        r#", "error": {"message": "bad audio"}"#.to_string()
                    }
                    "response.created" | "response.done" => {
                        r#", "response": {"id": "resp_1"}"#.to_string()
                    }
                    "response.output_item.added" | "response.output_item.done" => {
                        format!(r#", "item": {call}"#)
                    }
                    "response.content_part.added" | "response.content_part.done" => {
                        format!(r#", "part": {part}"#)
                    }
                    "response.text.delta"
                    | "response.audio.delta"
                    | "response.audio_transcript.delta" => r#", "delta": "d""#.to_string(),
                    "response.text.done" => r#", "text": "done""#.to_string(),
                    "response.audio_transcript.done" => r#", "transcript": "done""#.to_string(),
                    "response.animation_blendshapes.delta" => {
                        r#", "frames": [[0.1, 0.2]]"#.to_string()
                    }
                    "response.animation_viseme.delta" => r#", "viseme_id": 7"#.to_string(),
                    "response.audio_timestamp.delta" => r#", "text": "word""#.to_string(),
                    "response.function_call_arguments.delta" => {
                        r#", "call_id": "c1", "delta": "{""#.to_string()
                    }
                    "response.function_call_arguments.done" => {
                        r#", "call_id": "c1", "arguments": "{}""#.to_string()
                    }
                    "response.mcp_call_arguments.delta" => r#", "delta": "{""#.to_string(),
                    "response.mcp_call_arguments.done" => r#", "arguments": "{}""#.to_string(),
                    "error" => r#", "error": {"message": "boom"}"#.to_string(),
                    _ => String::new(),
                };
                (tag, format!(r#"{{"type": "{tag}"{payload}}}"#))
            })
            .collect()
    }

    #[test]
    fn every_known_tag_decodes_to_its_variant() {
        let frames = minimal_frames();
        assert_eq!(frames.len(), 44);

        for (tag, frame) in frames {
            let event = decode_frame(&frame)
                .unwrap_or_else(|e| panic!("tag `{tag}` failed to decode: {e}"));
            assert_eq!(event.event_type(), tag);
            assert!(!matches!(event, ServerEvent::Unknown { .. }));
        }
    }

    #[test]
    fn unrecognized_tag_becomes_unknown_not_error() {
        let event = decode_frame(r#"{"type": "session.hologram.ready", "x": 1}"#).unwrap();
        assert_eq!(
            event,
            ServerEvent::Unknown {
                event_type: "session.hologram.ready".into()
            }
        );
    }

    #[test]
    fn missing_discriminant_is_reported() {
        let err = decode_frame(r#"{"session": {"id": "s"}}"#).unwrap_err();
        assert_eq!(err, DecodeError::MissingField { path: "type".into() });
    }

    #[test]
    fn malformed_json_is_corrupted_with_raw_payload() {
        let err = decode_frame("{not json").unwrap_err();
        match err {
            DecodeError::Corrupted { raw, .. } => assert_eq!(raw, "{not json"),
            other => panic!("expected Corrupted, got {other:?}"),
        }
    }

    #[test]
    fn missing_payload_field_keeps_its_path() {
        let err = decode_frame(r#"{"type": "session.created", "session": {}}"#).unwrap_err();
        assert_eq!(err, DecodeError::MissingField { path: "id".into() });
    }

    #[test]
    fn type_mismatch_is_classified() {
        let err =
            decode_frame(r#"{"type": "response.text.delta", "delta": 42}"#).unwrap_err();
        assert!(matches!(err, DecodeError::TypeMismatch { .. }));
    }

    #[test]
    fn null_payload_is_classified() {
        let err = decode_frame(r#"{"type": "session.created", "session": null}"#).unwrap_err();
        assert!(matches!(err, DecodeError::NullValue { .. }));
    }

    #[test]
    fn nested_item_errors_keep_their_field_path() {
        let frame = r#"{"type": "conversation.item.created", "item": {"type": "message"}}"#;
        let err = decode_frame(frame).unwrap_err();
        assert_eq!(err, DecodeError::MissingField { path: "item.role".into() });
    }

    #[test]
    fn unknown_message_role_is_corrupted_at_frame_level() {
        let frame = r#"{"type": "conversation.item.created", "item": {"type": "message", "role": "narrator"}}"#;
        let err = decode_frame(frame).unwrap_err();
        match err {
            DecodeError::Corrupted { detail, raw } => {
                assert!(detail.contains("narrator"));
                assert_eq!(raw, frame);
            }
            other => panic!("expected Corrupted, got {other:?}"),
        }
    }

    #[test]
    fn max_output_tokens_union_decodes_in_session_payload() {
        let frame = r#"{"type": "session.updated", "session": {"id": "s", "max_response_output_tokens": "inf"}}"#;
        let event = decode_frame(frame).unwrap();
        match event {
            ServerEvent::SessionUpdated { session } => assert_eq!(
                session.max_response_output_tokens,
                Some(crate::config::MaxOutputTokens::Unlimited)
            ),
            other => panic!("expected SessionUpdated, got {other:?}"),
        }
    }
}
