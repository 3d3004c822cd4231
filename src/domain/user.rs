//! User identity and profiles.
//!
//! The identity provider supplies a [`UserAccount`] for the signed-in user;
//! the profile store owns the durable [`UserProfile`] record created at
//! signup.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::preferences::UserPreferences;

/// What the identity provider knows about the signed-in user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAccount {
    /// Stable user identifier
    pub uid: String,

    pub email: Option<String>,

    pub photo_url: Option<String>,
}

impl UserAccount {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: None,
            photo_url: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// Durable per-user record, created at signup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,

    pub email: String,

    pub first_name: String,

    pub last_name: String,

    pub created_at: DateTime<Utc>,

    /// Nested preference set, seeded with defaults at creation
    #[serde(default)]
    pub preferences: UserPreferences,
}

impl UserProfile {
    /// Create a profile with default preferences, stamped now.
    pub fn new(
        user_id: impl Into<String>,
        email: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            created_at: Utc::now(),
            preferences: UserPreferences::default(),
        }
    }

    /// Full display name, skipping an empty last name.
    pub fn display_name(&self) -> String {
        if self.last_name.is_empty() {
            self.first_name.clone()
        } else {
            format!("{} {}", self.first_name, self.last_name)
        }
    }

    /// The identity-provider view of this profile.
    pub fn account(&self) -> UserAccount {
        UserAccount {
            uid: self.user_id.clone(),
            email: Some(self.email.clone()),
            photo_url: None,
        }
    }
}

/// Split a display name into first and last parts.
///
/// The first whitespace-separated token becomes the first name; the
/// remainder, if any, becomes the last name.
pub fn split_display_name(name: &str) -> (String, String) {
    let mut parts = name.split_whitespace();
    let first = parts.next().unwrap_or("").to_string();
    let last = parts.collect::<Vec<_>>().join(" ");
    (first, last)
}
