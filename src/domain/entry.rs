//! History entries: one durable record per completed capture-and-narrate
//! cycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::preferences::Voice;

/// A persisted capture-description-narration record.
///
/// `id` and `timestamp` are assigned by the history store at write time.
/// After creation, only `audio_url` and `voice_used` are ever mutated, and
/// only together, by the voice regeneration flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Store-assigned unique identifier
    pub id: String,

    /// Owning user
    pub user_id: String,

    /// Captured frame as a JPEG data URI
    pub image_url: String,

    /// Vision model description of the frame
    pub description: String,

    /// Narration as a WAV data URI
    pub audio_url: String,

    /// Resolved place label, or a fallback string
    pub location: String,

    /// Store-assigned write time
    pub timestamp: DateTime<Utc>,

    /// Voice the narration was synthesized with
    pub voice_used: Voice,
}

/// The caller-supplied part of a history entry.
///
/// Everything except the store-assigned `id` and `timestamp`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryDraft {
    pub image_url: String,
    pub description: String,
    pub audio_url: String,
    pub location: String,
    pub voice_used: Voice,
}
