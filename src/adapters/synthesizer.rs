//! Speech synthesis adapter for Gemini-style TTS endpoints.
//!
//! Requests an audio response modality with a per-voice prebuilt voice name.
//! The endpoint returns raw 16-bit PCM; the adapter wraps it into a WAV
//! container before handing back a data URI clip.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::Voice;
use crate::media::{pcm_to_wav, AudioClip};

use super::SpeechSynthesizer;

/// Sample rate assumed when the response MIME carries no rate parameter
const DEFAULT_PCM_RATE: u32 = 24_000;

/// Prebuilt voice names used for the two narration voices.
#[derive(Debug, Clone)]
pub struct VoiceNames {
    pub male: String,
    pub female: String,
}

impl Default for VoiceNames {
    fn default() -> Self {
        Self {
            male: "Algenib".to_string(),
            female: "Achernar".to_string(),
        }
    }
}

impl VoiceNames {
    fn for_voice(&self, voice: Voice) -> &str {
        match voice {
            Voice::Male => &self.male,
            Voice::Female => &self.female,
        }
    }
}

/// TTS client for a generateContent-style API
pub struct GeminiSynthesizer {
    endpoint: String,
    model: String,
    api_key: String,
    voices: VoiceNames,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct SpeechResponse {
    #[serde(default)]
    candidates: Vec<SpeechCandidate>,
}

#[derive(Debug, Deserialize)]
struct SpeechCandidate {
    content: SpeechContent,
}

#[derive(Debug, Deserialize)]
struct SpeechContent {
    #[serde(default)]
    parts: Vec<AudioPart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AudioPart {
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default)]
    mime_type: String,
    data: String,
}

impl GeminiSynthesizer {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        voices: VoiceNames,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: api_key.into(),
            voices,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.endpoint.trim_end_matches('/'),
            self.model
        )
    }
}

#[async_trait]
impl SpeechSynthesizer for GeminiSynthesizer {
    fn name(&self) -> &str {
        "gemini-tts"
    }

    async fn synthesize(&self, text: &str, voice: Voice) -> Result<AudioClip> {
        let voice_name = self.voices.for_voice(voice);

        let response = self
            .client
            .post(self.api_url())
            .header("x-goog-api-key", &self.api_key)
            .json(&serde_json::json!({
                "contents": [{ "parts": [{ "text": text }] }],
                "generationConfig": {
                    "responseModalities": ["AUDIO"],
                    "speechConfig": {
                        "voiceConfig": {
                            "prebuiltVoiceConfig": { "voiceName": voice_name },
                        },
                    },
                },
            }))
            .send()
            .await
            .context("Failed to send synthesis request")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "Synthesis request failed with status {}: {}",
                status,
                body.trim()
            );
        }

        let result: SpeechResponse = response
            .json()
            .await
            .context("Failed to parse synthesis response")?;

        let inline = result
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .and_then(|p| p.inline_data)
            .context("Synthesis response contained no audio data")?;

        let pcm = {
            use base64::engine::general_purpose::STANDARD;
            use base64::Engine;
            STANDARD
                .decode(&inline.data)
                .context("Failed to decode synthesized audio payload")?
        };

        let wav = pcm_to_wav(&pcm, pcm_rate(&inline.mime_type))?;
        Ok(AudioClip::from_wav(&wav, voice))
    }
}

/// Extract the sample rate from a PCM MIME type like
/// `audio/L16;codec=pcm;rate=24000`.
fn pcm_rate(mime: &str) -> u32 {
    mime.split(';')
        .filter_map(|param| param.trim().strip_prefix("rate="))
        .find_map(|rate| rate.parse().ok())
        .unwrap_or(DEFAULT_PCM_RATE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pcm_rate_parsing() {
        assert_eq!(pcm_rate("audio/L16;codec=pcm;rate=24000"), 24_000);
        assert_eq!(pcm_rate("audio/L16;rate=16000"), 16_000);
        assert_eq!(pcm_rate("audio/L16"), DEFAULT_PCM_RATE);
        assert_eq!(pcm_rate("audio/L16;rate=bogus"), DEFAULT_PCM_RATE);
    }

    #[test]
    fn test_voice_name_mapping() {
        let voices = VoiceNames::default();
        assert_eq!(voices.for_voice(Voice::Male), "Algenib");
        assert_eq!(voices.for_voice(Voice::Female), "Achernar");
    }

    #[test]
    fn test_response_parsing() {
        let json = r#"{
            "candidates": [{
                "content": {
                    "parts": [{
                        "inlineData": {
                            "mimeType": "audio/L16;codec=pcm;rate=24000",
                            "data": "AAAA"
                        }
                    }]
                }
            }]
        }"#;

        let parsed: SpeechResponse = serde_json::from_str(json).unwrap();
        let inline = parsed.candidates[0].content.parts[0]
            .inline_data
            .as_ref()
            .unwrap();
        assert_eq!(pcm_rate(&inline.mime_type), 24_000);
        assert_eq!(inline.data, "AAAA");
    }
}
