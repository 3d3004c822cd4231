//! Adapter interfaces for external AI and geocoding services.
//!
//! Adapters provide a unified interface for the external collaborators of
//! the capture pipeline: vision description, speech synthesis, and reverse
//! geocoding.

pub mod describer;
pub mod location;
pub mod synthesizer;

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::Voice;
use crate::media::AudioClip;

pub use describer::GeminiDescriber;
pub use location::{Coordinates, FixedPosition, LocationResolver, NominatimClient, PositionSource};
pub use synthesizer::{GeminiSynthesizer, VoiceNames};

/// Vision model that turns a captured frame into a short description.
#[async_trait]
pub trait DescriptionGenerator: Send + Sync {
    /// Human-readable adapter name
    fn name(&self) -> &str;

    /// Describe the photo carried by a JPEG data URI.
    async fn describe(&self, photo_data_uri: &str) -> Result<String>;
}

/// Speech model that narrates a description in the requested voice.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Human-readable adapter name
    fn name(&self) -> &str;

    /// Synthesize `text` into a WAV clip using `voice`.
    async fn synthesize(&self, text: &str, voice: Voice) -> Result<AudioClip>;
}
