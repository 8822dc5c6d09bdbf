//! Connection and session configuration.
//!
//! Two layers: [`ConnectionConfig`] describes *where* to connect (resource
//! host, API version, model, credential) and templates the WebSocket URL;
//! [`SessionConfig`] describes *what* to configure on the session once the
//! socket is open, and serializes verbatim into the `session.update`
//! command payload.

use serde::{Deserialize, Serialize};

use crate::error::Error;

// ── Constants ──────────────────────────────────────────────────────

/// API version sent as the mandatory `api-version` query parameter.
pub const DEFAULT_API_VERSION: &str = "2025-05-01-preview";

/// WebSocket path of the realtime endpoint, relative to the resource host.
const REALTIME_PATH: &str = "/voice-live/realtime";

// ── Connection configuration ───────────────────────────────────────

/// Where and how to connect.
///
/// The credential is attached once, as the `api-key` request header at
/// connect time; there is no per-frame re-authentication.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Resource host, e.g. `my-resource.cognitiveservices.example.com`.
    pub resource: String,
    /// API version query parameter.
    pub api_version: String,
    /// Model identifier query parameter.
    pub model: String,
    /// Static API key credential.
    pub api_key: String,
}

impl ConnectionConfig {
    /// Create a config with the default API version.
    pub fn new(
        resource: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            resource: resource.into(),
            api_version: DEFAULT_API_VERSION.to_string(),
            model: model.into(),
            api_key: api_key.into(),
        }
    }

    /// Override the API version.
    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    /// Reject obviously unusable configs before any socket work happens.
    pub fn validate(&self) -> Result<(), Error> {
        if self.resource.is_empty() {
            return Err(Error::InvalidConfiguration("resource host is empty".into()));
        }
        if self.model.is_empty() {
            return Err(Error::InvalidConfiguration("model is empty".into()));
        }
        if self.api_key.is_empty() {
            return Err(Error::InvalidConfiguration("api key is empty".into()));
        }
        Ok(())
    }

    /// Build the versioned endpoint URL.
    ///
    /// Wire format: `wss://{resource}/voice-live/realtime?api-version=...&model=...`
    /// Both query parameters are mandatory and percent-encoded.
    pub fn endpoint_url(&self) -> String {
        format!(
            "wss://{}{}?api-version={}&model={}",
            self.resource,
            REALTIME_PATH,
            urlencoding::encode(&self.api_version),
            urlencoding::encode(&self.model),
        )
    }
}

// ── Session configuration (session.update payload) ─────────────────

/// Session parameters applied via the `session.update` command.
///
/// Every field is optional; omitted fields keep their server-side
/// defaults and are skipped on the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Requested output modalities, e.g. `["text", "audio"]`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modalities: Option<Vec<String>>,

    /// System instructions for the model.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,

    /// Output voice selection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<VoiceConfig>,

    /// Input audio encoding, e.g. `pcm16`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_format: Option<AudioFormat>,

    /// Output audio encoding.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_audio_format: Option<AudioFormat>,

    /// Input transcription model selection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_transcription: Option<TranscriptionConfig>,

    /// Turn detection mode (server VAD or semantic VAD).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn_detection: Option<TurnDetection>,

    /// Tools exposed to the model.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,

    /// Tool selection policy, e.g. `auto`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,

    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Output token ceiling: a number or unbounded (`"inf"` on the wire).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_response_output_tokens: Option<MaxOutputTokens>,

    /// Avatar rendering configuration, when the session drives an avatar.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<AvatarConfig>,
}

/// Output voice selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceConfig {
    /// Voice name, e.g. `en-US-AvaNeural`.
    pub name: String,
    /// Voice family, e.g. `neural-standard`.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Prosody temperature for generated speech.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// Audio encodings supported on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioFormat {
    #[serde(rename = "pcm16")]
    Pcm16,
    #[serde(rename = "g711_ulaw")]
    G711Ulaw,
    #[serde(rename = "g711_alaw")]
    G711Alaw,
}

/// Input transcription model selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    /// Transcription model, e.g. `whisper-1`.
    pub model: String,
}

/// Turn detection configuration, discriminated by `type` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TurnDetection {
    /// Silence-based voice activity detection on the server.
    #[serde(rename = "server_vad")]
    ServerVad {
        #[serde(skip_serializing_if = "Option::is_none")]
        threshold: Option<f32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        prefix_padding_ms: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        silence_duration_ms: Option<u32>,
    },
    /// Meaning-based end-of-turn detection.
    #[serde(rename = "semantic_vad")]
    SemanticVad {
        #[serde(skip_serializing_if = "Option::is_none")]
        eagerness: Option<String>,
    },
}

/// A tool the model may call during a response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool family, e.g. `function`.
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for the tool's arguments; opaque to the engine.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
}

/// Avatar rendering configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvatarConfig {
    /// Avatar character name.
    pub character: String,
    /// Character style variant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    /// Whether this is a customized (non-prebuilt) avatar.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub customized: bool,
}

// ── Response options (response.create payload) ─────────────────────

/// Per-response overrides for the `response.create` command.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modalities: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_response_output_tokens: Option<MaxOutputTokens>,
}

// ── Output token ceiling ───────────────────────────────────────────

/// Output token ceiling: either a concrete limit or unbounded.
///
/// The wire encodes unbounded as the literal string `"inf"`; this is a
/// two-variant union, never an integer with a sentinel value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxOutputTokens {
    Limited(u32),
    Unlimited,
}

impl Serialize for MaxOutputTokens {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Limited(n) => serializer.serialize_u32(*n),
            Self::Unlimited => serializer.serialize_str("inf"),
        }
    }
}

impl<'de> Deserialize<'de> for MaxOutputTokens {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        match &value {
            serde_json::Value::Number(n) => n
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .map(Self::Limited)
                .ok_or_else(|| {
                    serde::de::Error::custom(format!(
                        "invalid type at `max_response_output_tokens`: {n} is not a u32"
                    ))
                }),
            serde_json::Value::String(s) if s == "inf" => Ok(Self::Unlimited),
            other => Err(serde::de::Error::custom(format!(
                "invalid type at `max_response_output_tokens`: expected integer or \"inf\", got {other}"
            ))),
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_url_carries_mandatory_query_params() {
        let config = ConnectionConfig::new("acct.example.com", "gpt-realtime", "key");
        let url = config.endpoint_url();
        assert!(url.starts_with("wss://acct.example.com/voice-live/realtime?"));
        assert!(url.contains("api-version=2025-05-01-preview"));
        assert!(url.contains("model=gpt-realtime"));
    }

    #[test]
    fn endpoint_url_percent_encodes_model() {
        let config = ConnectionConfig::new("acct.example.com", "model name/v1", "key");
        assert!(config.endpoint_url().contains("model=model%20name%2Fv1"));
    }

    #[test]
    fn validate_rejects_empty_fields() {
        let config = ConnectionConfig::new("", "m", "k");
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidConfiguration(_))
        ));
        assert!(ConnectionConfig::new("host", "m", "k").validate().is_ok());
    }

    #[test]
    fn session_config_skips_unset_fields() {
        let json = serde_json::to_string(&SessionConfig::default()).unwrap();
        assert_eq!(json, "{}");
    }

    #[test]
    fn turn_detection_tagged_by_type() {
        let vad = TurnDetection::ServerVad {
            threshold: Some(0.5),
            prefix_padding_ms: Some(200),
            silence_duration_ms: Some(700),
        };
        let json = serde_json::to_string(&vad).unwrap();
        assert!(json.contains(r#""type":"server_vad""#));
        assert!(json.contains(r#""silence_duration_ms":700"#));
    }

    #[test]
    fn max_output_tokens_roundtrips_both_variants() {
        let json = serde_json::to_string(&MaxOutputTokens::Limited(2048)).unwrap();
        assert_eq!(json, "2048");
        let parsed: MaxOutputTokens = serde_json::from_str("2048").unwrap();
        assert_eq!(parsed, MaxOutputTokens::Limited(2048));

        let json = serde_json::to_string(&MaxOutputTokens::Unlimited).unwrap();
        assert_eq!(json, r#""inf""#);
        let parsed: MaxOutputTokens = serde_json::from_str(r#""inf""#).unwrap();
        assert_eq!(parsed, MaxOutputTokens::Unlimited);
    }

    #[test]
    fn max_output_tokens_rejects_other_strings() {
        assert!(serde_json::from_str::<MaxOutputTokens>(r#""lots""#).is_err());
        assert!(serde_json::from_str::<MaxOutputTokens>("-3").is_err());
    }
}
