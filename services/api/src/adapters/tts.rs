//! services/api/src/adapters/tts.rs
//!
//! This module contains the adapter for ElevenLabs' Text-to-Speech (TTS) service.
//! It implements the `TextToSpeechService` port from the `core` crate.

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use study_assistant_core::ports::{PortError, PortResult, TextToSpeechService};

use crate::config::SpeechConfig;

const ELEVENLABS_URL: &str = "https://api.elevenlabs.io/v1/text-to-speech";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `TextToSpeechService` port using the ElevenLabs API.
#[derive(Clone)]
pub struct ElevenLabsTtsAdapter {
    http: reqwest::Client,
    config: SpeechConfig,
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
}

impl ElevenLabsTtsAdapter {
    /// Creates a new `ElevenLabsTtsAdapter`.
    pub fn new(http: reqwest::Client, config: SpeechConfig) -> Self {
        Self { http, config }
    }

    fn endpoint(&self) -> String {
        format!("{}/{}", ELEVENLABS_URL, self.config.voice_id)
    }
}

//=========================================================================================
// `TextToSpeechService` Trait Implementation
//=========================================================================================

#[async_trait]
impl TextToSpeechService for ElevenLabsTtsAdapter {
    /// Generates MP3 audio from the given text.
    async fn generate_audio(&self, text: &str) -> PortResult<Bytes> {
        let request = SpeechRequest {
            text,
            model_id: &self.config.model_id,
        };

        let response = self
            .http
            .post(self.endpoint())
            .query(&[("output_format", self.config.output_format.as_str())])
            .header("xi-api-key", &self.config.api_key)
            .header(reqwest::header::ACCEPT, "audio/mpeg")
            .json(&request)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| PortError::Unexpected(format!("Speech request failed: {}", e)))?;

        let audio = response
            .bytes()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        if audio.is_empty() {
            return Err(PortError::Unexpected(
                "Speech service returned no audio.".to_string(),
            ));
        }
        Ok(audio)
    }
}
