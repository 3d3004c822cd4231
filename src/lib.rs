//! sightsound - Capture-and-narrate tool
//!
//! Turns camera frames into described, spoken history entries: a photo
//! is captured, its location resolved, a vision model describes the
//! scene, and a speech model narrates the description aloud.
//!
//! # Architecture
//!
//! The system is built around a status-guarded pipeline:
//! - A session holds one captured frame and a pipeline status
//! - Submitting runs describe, narrate, save in order
//! - The entry is stored only after synthesis succeeds
//! - Status transitions are broadcast so observers can follow along
//!
//! # Modules
//!
//! - `adapters`: External services (vision, speech, reverse geocoding)
//! - `core`: Capture session and voice regeneration flows
//! - `domain`: Data structures (HistoryEntry, UserProfile, PipelineStatus)
//! - `media`: Camera capture, frames, audio clips and playback
//! - `store`: JSON-backed history and profile storage
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Create an account and sign in
//! sightsound account signup --email maria@example.com --name "Maria Santos"
//!
//! # Capture, describe, and narrate a photo
//! sightsound snap --lat 14.676 --lon 121.0437
//!
//! # Browse past captures
//! sightsound history list
//!
//! # Re-narrate a capture with the other voice
//! sightsound history revoice <entry-id> male
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod media;
pub mod store;

// Re-export main types at crate root for convenience
pub use core::{CaptureSession, SessionContext, SessionServices, SubmitOutcome, VoiceRegenerator};
pub use domain::{HistoryEntry, PipelineStatus, Theme, UserPreferences, UserProfile, Voice};
pub use media::{AudioClip, Camera, FacingMode, Frame};
pub use store::{HistoryStore, JsonHistoryStore, JsonProfileStore, PreferenceStore};
