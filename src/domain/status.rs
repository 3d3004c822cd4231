//! Pipeline status state machine.
//!
//! The capture pipeline moves through a fixed set of states. Modeling them as
//! a closed enum makes illegal transitions unrepresentable and gives every
//! state a stable progress label for display.

use serde::{Deserialize, Serialize};

/// Status of the capture pipeline.
///
/// The happy path is `Idle → GeneratingDescription → GeneratingAudio →
/// Saving → Success`, with `Capturing` and `Locating` as short-lived pulse
/// states that return to `Idle`. `Error` is reachable from any non-idle,
/// non-success state. `reset` always returns to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PipelineStatus {
    /// Nothing in progress
    Idle,

    /// Grabbing a still frame from the camera
    Capturing,

    /// Resolving coordinates into a place label
    Locating,

    /// Waiting on the vision model
    GeneratingDescription,

    /// Waiting on speech synthesis
    GeneratingAudio,

    /// Writing the finished entry to the history store
    Saving,

    /// Entry persisted, narration played
    Success,

    /// A submit step failed
    Error,
}

impl PipelineStatus {
    /// User-facing progress label for this state.
    pub fn label(&self) -> &'static str {
        match self {
            PipelineStatus::Idle => "Ready.",
            PipelineStatus::Capturing => "Capturing photo...",
            PipelineStatus::Locating => "Getting location...",
            PipelineStatus::GeneratingDescription => "Generating description...",
            PipelineStatus::GeneratingAudio => "Generating audio...",
            PipelineStatus::Saving => "Saving result...",
            PipelineStatus::Success => "Done!",
            PipelineStatus::Error => "An error occurred.",
        }
    }

    /// True while any step of a sequence is in flight.
    ///
    /// Submit is refused while this holds; it is the only mutual-exclusion
    /// mechanism in the pipeline.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            PipelineStatus::Capturing
                | PipelineStatus::Locating
                | PipelineStatus::GeneratingDescription
                | PipelineStatus::GeneratingAudio
                | PipelineStatus::Saving
        )
    }

    /// True for the two end states of a submit sequence.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineStatus::Success | PipelineStatus::Error)
    }
}

impl Default for PipelineStatus {
    fn default() -> Self {
        Self::Idle
    }
}

impl std::fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PipelineStatus::Idle => "idle",
            PipelineStatus::Capturing => "capturing",
            PipelineStatus::Locating => "locating",
            PipelineStatus::GeneratingDescription => "generatingDescription",
            PipelineStatus::GeneratingAudio => "generatingAudio",
            PipelineStatus::Saving => "saving",
            PipelineStatus::Success => "success",
            PipelineStatus::Error => "error",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&PipelineStatus::GeneratingDescription).unwrap();
        assert_eq!(json, "\"generatingDescription\"");

        let parsed: PipelineStatus = serde_json::from_str("\"generatingAudio\"").unwrap();
        assert_eq!(parsed, PipelineStatus::GeneratingAudio);
    }

    #[test]
    fn test_busy_and_terminal() {
        assert!(!PipelineStatus::Idle.is_busy());
        assert!(PipelineStatus::Saving.is_busy());
        assert!(PipelineStatus::GeneratingAudio.is_busy());

        assert!(PipelineStatus::Success.is_terminal());
        assert!(PipelineStatus::Error.is_terminal());
        assert!(!PipelineStatus::Locating.is_terminal());
    }

    #[test]
    fn test_labels() {
        assert_eq!(PipelineStatus::Capturing.label(), "Capturing photo...");
        assert_eq!(PipelineStatus::Success.label(), "Done!");
        assert_eq!(PipelineStatus::Error.label(), "An error occurred.");
    }
}
