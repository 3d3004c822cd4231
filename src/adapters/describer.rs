//! Vision description adapter for Gemini-style generateContent endpoints.
//!
//! Sends the captured frame inline as base64 image data and extracts the
//! first candidate's text.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use crate::media::decode_data_uri;

use super::DescriptionGenerator;

/// Instruction sent alongside the frame.
const DESCRIBE_PROMPT: &str =
    "Describe this photo in one or two short sentences, as if narrating the \
     scene aloud for someone who cannot see it.";

/// Vision client for a generateContent-style API
pub struct GeminiDescriber {
    /// API base URL (e.g. https://generativelanguage.googleapis.com/v1beta)
    endpoint: String,
    /// Model name
    model: String,
    /// API key sent via the x-goog-api-key header
    api_key: String,
    /// HTTP client
    client: reqwest::Client,
}

/// Response from a generateContent call
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<TextPart>,
}

#[derive(Debug, Deserialize)]
struct TextPart {
    #[serde(default)]
    text: String,
}

impl GeminiDescriber {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Build the generateContent URL for a model
    fn api_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.endpoint.trim_end_matches('/'),
            self.model
        )
    }
}

#[async_trait]
impl DescriptionGenerator for GeminiDescriber {
    fn name(&self) -> &str {
        "gemini-describer"
    }

    async fn describe(&self, photo_data_uri: &str) -> Result<String> {
        let (mime, bytes) = decode_data_uri(photo_data_uri)
            .context("Describer input is not a valid image data URI")?;
        let encoded = {
            use base64::engine::general_purpose::STANDARD;
            use base64::Engine;
            STANDARD.encode(&bytes)
        };

        let response = self
            .client
            .post(self.api_url())
            .header("x-goog-api-key", &self.api_key)
            .json(&serde_json::json!({
                "contents": [{
                    "parts": [
                        { "inlineData": { "mimeType": mime, "data": encoded } },
                        { "text": DESCRIBE_PROMPT },
                    ],
                }],
            }))
            .send()
            .await
            .context("Failed to send description request")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "Description request failed with status {}: {}",
                status,
                body.trim()
            );
        }

        let result: GenerateResponse = response
            .json()
            .await
            .context("Failed to parse description response")?;

        let description = result
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text.trim().to_string())
            .filter(|t| !t.is_empty())
            .context("Description response contained no text")?;

        Ok(description)
    }
}
