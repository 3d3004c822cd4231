//! Captured still frames and data URI encoding.

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use super::camera::FacingMode;

/// A still frame grabbed from the camera, held in memory as JPEG bytes.
#[derive(Debug, Clone)]
pub struct Frame {
    jpeg: Vec<u8>,
    facing: FacingMode,
    captured_at: DateTime<Utc>,
}

impl Frame {
    pub fn new(jpeg: Vec<u8>, facing: FacingMode) -> Self {
        Self {
            jpeg,
            facing,
            captured_at: Utc::now(),
        }
    }

    /// Short content hash (12 hex chars) for correlating logs with captures.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.jpeg);
        let digest = hasher.finalize();
        hex::encode(&digest[..6])
    }

    /// Encode the frame as a `data:image/jpeg;base64,...` URI.
    pub fn to_data_uri(&self) -> String {
        encode_data_uri("image/jpeg", &self.jpeg)
    }

    pub fn facing(&self) -> FacingMode {
        self.facing
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn len(&self) -> usize {
        self.jpeg.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jpeg.is_empty()
    }
}

/// Encode bytes as a data URI with the given MIME type.
pub fn encode_data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, BASE64.encode(bytes))
}

/// Decode a data URI into its MIME type and raw bytes.
pub fn decode_data_uri(uri: &str) -> Result<(String, Vec<u8>)> {
    let rest = uri
        .strip_prefix("data:")
        .with_context(|| format!("Not a data URI: {}", truncate_for_error(uri)))?;

    let (mime, payload) = rest
        .split_once(";base64,")
        .with_context(|| format!("Data URI is not base64-encoded: {}", truncate_for_error(uri)))?;

    let bytes = BASE64
        .decode(payload)
        .context("Failed to decode base64 payload of data URI")?;

    Ok((mime.to_string(), bytes))
}

fn truncate_for_error(uri: &str) -> String {
    if uri.len() > 48 {
        format!("{}...", &uri[..48])
    } else {
        uri.to_string()
    }
}
