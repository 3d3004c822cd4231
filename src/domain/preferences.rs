//! User preferences and the narration voice.

use serde::{Deserialize, Serialize};

/// Narration voice for synthesized audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Voice {
    Male,
    Female,
}

impl std::fmt::Display for Voice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Voice::Male => write!(f, "male"),
            Voice::Female => write!(f, "female"),
        }
    }
}

impl std::str::FromStr for Voice {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "male" => Ok(Voice::Male),
            "female" => Ok(Voice::Female),
            _ => anyhow::bail!("Unknown voice: {}", s),
        }
    }
}

/// Display theme preference.
///
/// Carried for every user even though the CLI renders no themed UI itself;
/// the preference is part of the durable profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    System,
}

impl std::fmt::Display for Theme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Theme::Light => write!(f, "light"),
            Theme::Dark => write!(f, "dark"),
            Theme::System => write!(f, "system"),
        }
    }
}

impl std::str::FromStr for Theme {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            "system" => Ok(Theme::System),
            _ => anyhow::bail!("Unknown theme: {}", s),
        }
    }
}

/// Durable per-user preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPreferences {
    #[serde(default = "default_theme")]
    pub theme: Theme,

    #[serde(default = "default_voice")]
    pub voice: Voice,
}

fn default_theme() -> Theme {
    Theme::System
}

fn default_voice() -> Voice {
    Voice::Female
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            theme: Theme::System,
            voice: Voice::Female,
        }
    }
}

/// Partial preference update; `None` fields are left unchanged.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PreferenceUpdate {
    pub theme: Option<Theme>,
    pub voice: Option<Voice>,
}

impl PreferenceUpdate {
    /// Update only the voice.
    pub fn voice(voice: Voice) -> Self {
        Self {
            theme: None,
            voice: Some(voice),
        }
    }

    /// Update only the theme.
    pub fn theme(theme: Theme) -> Self {
        Self {
            theme: Some(theme),
            voice: None,
        }
    }

    /// Apply this update to a preference set.
    pub fn apply(&self, prefs: &mut UserPreferences) {
        if let Some(theme) = self.theme {
            prefs.theme = theme;
        }
        if let Some(voice) = self.voice {
            prefs.voice = voice;
        }
    }
}
