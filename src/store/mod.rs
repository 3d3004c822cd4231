//! Durable storage for history entries and user profiles.
//!
//! Everything lives under the application home directory as JSON files:
//! a catalog-indexed directory of history entries, and a single users
//! file with an active-user marker alongside it.

pub mod history;
pub mod profiles;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::domain::{EntryDraft, HistoryEntry, PreferenceUpdate, UserPreferences, Voice};

pub use history::JsonHistoryStore;
pub use profiles::{uid_for_email, JsonProfileStore};

/// Errors from the storage layer
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("History entry not found: {0}")]
    EntryNotFound(String),

    #[error("No profile for user: {0}")]
    ProfileNotFound(String),

    #[error("Profile already exists for: {0}")]
    ProfileExists(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Persistence for completed capture records.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Persist a draft, assigning its id and timestamp.
    async fn add_entry(&self, user_id: &str, draft: EntryDraft)
        -> Result<HistoryEntry, StoreError>;

    /// All entries for one user, most recent first.
    async fn entries_for_user(&self, user_id: &str) -> Result<Vec<HistoryEntry>, StoreError>;

    /// Look up a single entry by id.
    async fn entry(&self, id: &str) -> Result<HistoryEntry, StoreError>;

    /// Replace an entry's narration and the voice it was made with.
    ///
    /// The two fields always change together so a stored entry never
    /// claims one voice while carrying another voice's audio.
    async fn update_audio(
        &self,
        id: &str,
        audio_url: &str,
        voice: Voice,
    ) -> Result<HistoryEntry, StoreError>;
}

/// Persistence for per-user preference sets.
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn preferences(&self, user_id: &str) -> Result<UserPreferences, StoreError>;

    /// Apply a partial update and return the stored result.
    async fn update_preferences(
        &self,
        user_id: &str,
        update: PreferenceUpdate,
    ) -> Result<UserPreferences, StoreError>;

    /// Watch a user's preferences; each saved update is broadcast.
    fn subscribe(&self, user_id: &str) -> broadcast::Receiver<UserPreferences>;
}
