//! Domain types for sightsound.
//!
//! This module contains the core data structures:
//! - PipelineStatus: the capture pipeline state machine
//! - HistoryEntry: durable capture-narration records
//! - UserPreferences / UserProfile: per-user settings and identity

pub mod entry;
pub mod preferences;
pub mod status;
pub mod user;

// Re-export commonly used types
pub use entry::{EntryDraft, HistoryEntry};
pub use preferences::{PreferenceUpdate, Theme, UserPreferences, Voice};
pub use status::PipelineStatus;
pub use user::{split_display_name, UserAccount, UserProfile};
