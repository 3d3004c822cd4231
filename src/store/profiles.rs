//! JSON-backed user profiles and the active-user marker.
//!
//! All profiles live in one `users.json` keyed by user id; a plain-text
//! `active_user` file next to it records who is signed in. Preference
//! updates are broadcast to subscribers so live sessions can follow
//! changes made elsewhere.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::domain::{split_display_name, PreferenceUpdate, UserPreferences, UserProfile};

use super::{PreferenceStore, StoreError};

/// Capacity of each per-user preference broadcast channel
const WATCH_CAPACITY: usize = 16;

/// Derive a stable user id from an email address (SHA256[0:16]).
pub fn uid_for_email(email: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(email.trim().to_lowercase().as_bytes());
    let result = hasher.finalize();

    result[..8].iter().map(|b| format!("{:02x}", b)).collect()
}

/// On-disk users file
#[derive(Debug, Clone, Serialize, Deserialize)]
struct UsersFile {
    /// File format version
    version: u32,

    users: HashMap<String, UserProfile>,
}

impl UsersFile {
    fn new() -> Self {
        Self {
            version: 1,
            users: HashMap::new(),
        }
    }
}

/// Profile store rooted at the application home directory
pub struct JsonProfileStore {
    root: PathBuf,
    watchers: Mutex<HashMap<String, broadcast::Sender<UserPreferences>>>,
}

impl JsonProfileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            watchers: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn users_path(&self) -> PathBuf {
        self.root.join("users.json")
    }

    fn active_path(&self) -> PathBuf {
        self.root.join("active_user")
    }

    async fn load_users(&self) -> Result<UsersFile, StoreError> {
        let path = self.users_path();

        if !path.exists() {
            return Ok(UsersFile::new());
        }

        let content = fs::read_to_string(&path).await?;
        Ok(serde_json::from_str(&content)?)
    }

    async fn save_users(&self, users: &UsersFile) -> Result<(), StoreError> {
        fs::create_dir_all(&self.root).await?;
        fs::write(self.users_path(), serde_json::to_string_pretty(users)?).await?;
        Ok(())
    }

    /// Create a profile for a new email, seeded with default preferences.
    pub async fn create_profile(
        &self,
        email: &str,
        display_name: &str,
    ) -> Result<UserProfile, StoreError> {
        let uid = uid_for_email(email);
        let mut users = self.load_users().await?;

        if users.users.contains_key(&uid) {
            return Err(StoreError::ProfileExists(email.to_string()));
        }

        let (first_name, last_name) = split_display_name(display_name);
        let profile = UserProfile::new(&uid, email, first_name, last_name);

        users.users.insert(uid.clone(), profile.clone());
        self.save_users(&users).await?;

        debug!("Created profile {} for {}", uid, email);
        Ok(profile)
    }

    pub async fn profile(&self, user_id: &str) -> Result<UserProfile, StoreError> {
        let users = self.load_users().await?;
        users
            .users
            .get(user_id)
            .cloned()
            .ok_or_else(|| StoreError::ProfileNotFound(user_id.to_string()))
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<UserProfile>, StoreError> {
        let users = self.load_users().await?;
        Ok(users
            .users
            .values()
            .find(|p| p.email.eq_ignore_ascii_case(email.trim()))
            .cloned())
    }

    /// Mark a user as signed in.
    pub async fn set_active(&self, user_id: &str) -> Result<(), StoreError> {
        // Refuse to activate an id nothing knows about
        self.profile(user_id).await?;

        fs::create_dir_all(&self.root).await?;
        fs::write(self.active_path(), user_id).await?;
        Ok(())
    }

    /// The signed-in user's profile, if any.
    pub async fn active(&self) -> Result<Option<UserProfile>, StoreError> {
        let path = self.active_path();

        if !path.exists() {
            return Ok(None);
        }

        let uid = fs::read_to_string(&path).await?;
        let uid = uid.trim();

        match self.profile(uid).await {
            Ok(profile) => Ok(Some(profile)),
            Err(StoreError::ProfileNotFound(_)) => {
                warn!("Active user {} has no profile; treating as signed out", uid);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Sign out.
    pub async fn clear_active(&self) -> Result<(), StoreError> {
        match fs::remove_file(self.active_path()).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn notify_watchers(&self, user_id: &str, preferences: &UserPreferences) {
        let watchers = self.watchers.lock().unwrap();
        if let Some(tx) = watchers.get(user_id) {
            let _ = tx.send(preferences.clone());
        }
    }
}

#[async_trait]
impl PreferenceStore for JsonProfileStore {
    async fn preferences(&self, user_id: &str) -> Result<UserPreferences, StoreError> {
        Ok(self.profile(user_id).await?.preferences)
    }

    async fn update_preferences(
        &self,
        user_id: &str,
        update: PreferenceUpdate,
    ) -> Result<UserPreferences, StoreError> {
        let mut users = self.load_users().await?;

        let profile = users
            .users
            .get_mut(user_id)
            .ok_or_else(|| StoreError::ProfileNotFound(user_id.to_string()))?;

        update.apply(&mut profile.preferences);
        let preferences = profile.preferences.clone();

        self.save_users(&users).await?;
        self.notify_watchers(user_id, &preferences);

        debug!("Updated preferences for {}", user_id);
        Ok(preferences)
    }

    fn subscribe(&self, user_id: &str) -> broadcast::Receiver<UserPreferences> {
        let mut watchers = self.watchers.lock().unwrap();
        watchers
            .entry(user_id.to_string())
            .or_insert_with(|| broadcast::channel(WATCH_CAPACITY).0)
            .subscribe()
    }
}
