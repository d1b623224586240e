//! Wire messages for the live model service (Gemini Live bidirectional API)

use serde::{Deserialize, Serialize};

use crate::audio::codec::EncodedEnvelope;

/// Live model identifier
pub const MODEL: &str = "models/gemini-2.5-flash-native-audio-preview-09-2025";

/// Fixed voice identity for synthesized responses
pub const VOICE_NAME: &str = "Aoede";

/// Fixed sampling temperature
pub const TEMPERATURE: f32 = 0.40;

/// Outbound message to the model service
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ClientMessage {
    /// Session open configuration, sent exactly once after connect
    Setup(SessionSetup),

    /// Streaming input: a text hint or an encoded audio frame
    RealtimeInput(RealtimeInput),
}

impl ClientMessage {
    /// A priming/greeting text hint
    pub fn text(text: impl Into<String>) -> Self {
        Self::RealtimeInput(RealtimeInput {
            text: Some(text.into()),
            media: None,
        })
    }

    /// An encoded capture frame
    #[must_use]
    pub const fn media(envelope: EncodedEnvelope) -> Self {
        Self::RealtimeInput(RealtimeInput {
            text: None,
            media: Some(envelope),
        })
    }

    /// Whether this message carries an audio frame
    #[must_use]
    pub const fn is_media(&self) -> bool {
        matches!(
            self,
            Self::RealtimeInput(RealtimeInput { media: Some(_), .. })
        )
    }
}

/// Streaming input payload
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<EncodedEnvelope>,
}

/// Session open configuration: audio-only responses, a fixed voice, a fixed
/// temperature and the per-session system instruction
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSetup {
    pub model: String,
    pub generation_config: GenerationConfig,
    pub system_instruction: Content,
}

impl SessionSetup {
    /// Build the fixed audio-session configuration around an instruction
    #[must_use]
    pub fn audio_session(instruction: &str) -> Self {
        Self {
            model: MODEL.to_string(),
            generation_config: GenerationConfig {
                response_modalities: vec!["AUDIO".to_string()],
                temperature: TEMPERATURE,
                speech_config: SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: VOICE_NAME.to_string(),
                        },
                    },
                },
            },
            system_instruction: Content {
                parts: vec![Part {
                    text: instruction.to_string(),
                }],
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<String>,
    pub temperature: f32,
    pub speech_config: SpeechConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    pub voice_config: VoiceConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    pub prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrebuiltVoiceConfig {
    pub voice_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Content {
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Part {
    pub text: String,
}

/// Inbound message from the model service.
///
/// Fields this client does not consume are ignored on parse.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    #[serde(default)]
    pub server_content: Option<ServerContent>,

    #[serde(default)]
    pub setup_complete: Option<serde_json::Value>,
}

impl ServerMessage {
    /// The audio payload, if any (`serverContent.modelTurn.parts[0].inlineData`)
    #[must_use]
    pub fn audio(&self) -> Option<&EncodedEnvelope> {
        self.server_content
            .as_ref()?
            .model_turn
            .as_ref()?
            .parts
            .first()?
            .inline_data
            .as_ref()
    }

    /// Whether this message signals interruption of the model's turn
    #[must_use]
    pub fn interrupted(&self) -> bool {
        self.server_content
            .as_ref()
            .is_some_and(|c| c.interrupted.unwrap_or(false))
    }

    /// Whether this message marks the model's turn as complete
    #[must_use]
    pub fn turn_complete(&self) -> bool {
        self.server_content
            .as_ref()
            .is_some_and(|c| c.turn_complete.unwrap_or(false))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerContent {
    #[serde(default)]
    pub model_turn: Option<ModelTurn>,

    #[serde(default)]
    pub interrupted: Option<bool>,

    #[serde(default)]
    pub turn_complete: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelTurn {
    #[serde(default)]
    pub parts: Vec<InlinePart>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlinePart {
    #[serde(default)]
    pub inline_data: Option<EncodedEnvelope>,
}
