//! Core capture-and-narrate flows.
//!
//! This module contains:
//! - CaptureSession: camera, location, and the submit pipeline
//! - VoiceRegenerator: re-voicing stored history entries

pub mod regenerate;
pub mod session;

// Re-export commonly used types
pub use regenerate::{EntryView, RegenOutcome, RegenRefusal, VoiceRegenerator};
pub use session::{
    CaptureSession, PipelineError, SessionContext, SessionServices, SubmitOutcome, SubmitRefusal,
};
