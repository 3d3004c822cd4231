//! JSON-backed history storage.
//!
//! Layout under the history root:
//!
//! ```text
//! history/
//! ├── catalog.json          # index: id, owner, timestamp per entry
//! ├── catalog.lock
//! └── <entry-id>/
//!     └── entry.json        # the full record
//! ```
//!
//! The catalog is the listing index; entry files are the source of truth
//! for record contents. Catalog mutations take an exclusive file lock so
//! concurrent processes cannot lose each other's writes.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::{EntryDraft, HistoryEntry, Voice};

use super::{HistoryStore, StoreError};

/// Index over all stored entries
#[derive(Debug, Clone, Serialize, Deserialize)]
struct HistoryCatalog {
    /// Catalog format version
    version: u32,

    items: Vec<CatalogEntry>,
}

impl HistoryCatalog {
    fn new() -> Self {
        Self {
            version: 1,
            items: Vec::new(),
        }
    }

    fn add(&mut self, item: CatalogEntry) {
        if let Some(existing) = self.items.iter_mut().find(|i| i.id == item.id) {
            *existing = item;
        } else {
            self.items.push(item);
        }
    }

    /// Ids owned by one user, most recent first.
    fn ids_for_user(&self, user_id: &str) -> Vec<String> {
        let mut items: Vec<_> = self.items.iter().filter(|i| i.user_id == user_id).collect();
        items.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        items.into_iter().map(|i| i.id.clone()).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CatalogEntry {
    id: String,
    user_id: String,
    timestamp: DateTime<Utc>,
}

/// History store rooted at a directory of JSON files
pub struct JsonHistoryStore {
    root: PathBuf,
}

impl JsonHistoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn catalog_path(&self) -> PathBuf {
        self.root.join("catalog.json")
    }

    fn entry_path(&self, id: &str) -> PathBuf {
        self.root.join(id).join("entry.json")
    }

    async fn load_catalog(&self) -> Result<HistoryCatalog, StoreError> {
        let path = self.catalog_path();

        if !path.exists() {
            return Ok(HistoryCatalog::new());
        }

        let content = fs::read_to_string(&path).await?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Read-modify-write the catalog under an exclusive file lock.
    ///
    /// Lock released when the lock file handle drops.
    fn mutate_catalog<F>(&self, mutate: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut HistoryCatalog),
    {
        std::fs::create_dir_all(&self.root)?;

        let lock = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .open(self.root.join("catalog.lock"))?;
        lock.lock_exclusive()?;

        let path = self.catalog_path();
        let mut catalog = if path.exists() {
            serde_json::from_str(&std::fs::read_to_string(&path)?)?
        } else {
            HistoryCatalog::new()
        };

        mutate(&mut catalog);

        std::fs::write(&path, serde_json::to_string_pretty(&catalog)?)?;
        Ok(())
    }

    async fn write_entry(&self, entry: &HistoryEntry) -> Result<(), StoreError> {
        let path = self.entry_path(&entry.id);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        fs::write(&path, serde_json::to_string_pretty(entry)?).await?;
        Ok(())
    }

    async fn read_entry(&self, id: &str) -> Result<HistoryEntry, StoreError> {
        let path = self.entry_path(id);

        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::EntryNotFound(id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        Ok(serde_json::from_str(&content)?)
    }
}

#[async_trait]
impl HistoryStore for JsonHistoryStore {
    async fn add_entry(
        &self,
        user_id: &str,
        draft: EntryDraft,
    ) -> Result<HistoryEntry, StoreError> {
        let entry = HistoryEntry {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            image_url: draft.image_url,
            description: draft.description,
            audio_url: draft.audio_url,
            location: draft.location,
            timestamp: Utc::now(),
            voice_used: draft.voice_used,
        };

        self.write_entry(&entry).await?;

        self.mutate_catalog(|catalog| {
            catalog.add(CatalogEntry {
                id: entry.id.clone(),
                user_id: entry.user_id.clone(),
                timestamp: entry.timestamp,
            });
        })?;

        debug!("Stored history entry {} for {}", entry.id, user_id);
        Ok(entry)
    }

    async fn entries_for_user(&self, user_id: &str) -> Result<Vec<HistoryEntry>, StoreError> {
        let catalog = self.load_catalog().await?;

        let mut entries = Vec::new();
        for id in catalog.ids_for_user(user_id) {
            match self.read_entry(&id).await {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!("Skipping unreadable entry {}: {}", id, e),
            }
        }

        Ok(entries)
    }

    async fn entry(&self, id: &str) -> Result<HistoryEntry, StoreError> {
        self.read_entry(id).await
    }

    async fn update_audio(
        &self,
        id: &str,
        audio_url: &str,
        voice: Voice,
    ) -> Result<HistoryEntry, StoreError> {
        let mut entry = self.read_entry(id).await?;

        entry.audio_url = audio_url.to_string();
        entry.voice_used = voice;

        self.write_entry(&entry).await?;

        debug!("Updated narration on entry {} to {} voice", id, voice);
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn draft(location: &str) -> EntryDraft {
        EntryDraft {
            image_url: "data:image/jpeg;base64,aGk=".to_string(),
            description: "A test scene.".to_string(),
            audio_url: "data:audio/wav;base64,aGk=".to_string(),
            location: location.to_string(),
            voice_used: Voice::Female,
        }
    }

    #[tokio::test]
    async fn test_add_assigns_id_and_timestamp() {
        let dir = TempDir::new().unwrap();
        let store = JsonHistoryStore::new(dir.path());

        let before = Utc::now();
        let entry = store.add_entry("user-1", draft("Quezon City")).await.unwrap();

        assert!(!entry.id.is_empty());
        assert!(entry.timestamp >= before);
        assert_eq!(entry.user_id, "user-1");
        assert_eq!(entry.location, "Quezon City");
    }

    #[tokio::test]
    async fn test_entries_for_user_newest_first() {
        let dir = TempDir::new().unwrap();
        let store = JsonHistoryStore::new(dir.path());

        let first = store.add_entry("user-1", draft("First")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = store.add_entry("user-1", draft("Second")).await.unwrap();
        store.add_entry("someone-else", draft("Other")).await.unwrap();

        let entries = store.entries_for_user("user-1").await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, second.id);
        assert_eq!(entries[1].id, first.id);
    }

    #[tokio::test]
    async fn test_update_audio_changes_both_fields() {
        let dir = TempDir::new().unwrap();
        let store = JsonHistoryStore::new(dir.path());

        let entry = store.add_entry("user-1", draft("Somewhere")).await.unwrap();
        assert_eq!(entry.voice_used, Voice::Female);

        let updated = store
            .update_audio(&entry.id, "data:audio/wav;base64,bmV3", Voice::Male)
            .await
            .unwrap();

        assert_eq!(updated.audio_url, "data:audio/wav;base64,bmV3");
        assert_eq!(updated.voice_used, Voice::Male);

        // Persisted, not just returned
        let reread = store.entry(&entry.id).await.unwrap();
        assert_eq!(reread.audio_url, "data:audio/wav;base64,bmV3");
        assert_eq!(reread.voice_used, Voice::Male);
    }

    #[tokio::test]
    async fn test_missing_entry() {
        let dir = TempDir::new().unwrap();
        let store = JsonHistoryStore::new(dir.path());

        let result = store.entry("no-such-id").await;
        assert!(matches!(result, Err(StoreError::EntryNotFound(_))));

        let result = store
            .update_audio("no-such-id", "data:audio/wav;base64,", Voice::Male)
            .await;
        assert!(matches!(result, Err(StoreError::EntryNotFound(_))));
    }

    #[tokio::test]
    async fn test_entries_survive_reopen() {
        let dir = TempDir::new().unwrap();

        let id = {
            let store = JsonHistoryStore::new(dir.path());
            store.add_entry("user-1", draft("Persistent")).await.unwrap().id
        };

        let store = JsonHistoryStore::new(dir.path());
        let entry = store.entry(&id).await.unwrap();
        assert_eq!(entry.location, "Persistent");
    }
}
