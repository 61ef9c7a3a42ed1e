//! services/api/src/adapters/store.rs
//!
//! This module contains the storage adapter, the concrete implementation of
//! the `UserStore` port. Each storage key maps to one JSON file under the
//! configured data directory, mirroring the key-value records the browser
//! frontend keeps: a single login-session record plus one data record per
//! user id.
//!
//! Failure semantics are deliberate: reads of missing or corrupt records
//! fall back to the zero value, writes that fail are logged and dropped.
//! There is no locking; the last write wins.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{error, warn};

use epignosis_core::domain::{User, UserData};
use epignosis_core::ports::UserStore;

/// Storage key of the persisted login session.
const USER_KEY: &str = "epignosis_hub_user";
/// Storage key prefix of the per-user data records.
const USER_DATA_KEY_PREFIX: &str = "epignosis_hub_user_data";
/// Storage key of the email -> derived-id index. This record survives logout
/// so a returning user gets the same id (and therefore the same progress).
const KNOWN_USERS_KEY: &str = "epignosis_hub_known_users";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A storage adapter that implements the `UserStore` port on top of a
/// directory of JSON files.
#[derive(Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    /// Creates a new `JsonFileStore` rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Creates the data directory at startup. The only store operation that
    /// surfaces an error, since a missing directory means every later write
    /// would be dropped.
    pub async fn ensure_root(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }

    fn user_data_path(&self, user_id: &str) -> PathBuf {
        self.key_path(&format!("{USER_DATA_KEY_PREFIX}_{user_id}"))
    }
}

/// Reads and parses one record. `Ok(None)` means the record does not exist;
/// a read or parse failure is reported as `Err` so callers can decide
/// whether the corrupt record should be cleared.
async fn read_record<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, String> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.to_string()),
    };
    serde_json::from_str(&raw).map(Some).map_err(|e| e.to_string())
}

/// Serializes and writes one record, logging and swallowing any failure.
async fn write_record<T: Serialize>(path: &Path, value: &T) {
    let json = match serde_json::to_string(value) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize record {}: {}", path.display(), e);
            return;
        }
    };
    if let Err(e) = tokio::fs::write(path, json).await {
        error!("Failed to write record {}: {}", path.display(), e);
    }
}

//=========================================================================================
// `UserStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl UserStore for JsonFileStore {
    async fn load_session(&self) -> Option<User> {
        let path = self.key_path(USER_KEY);
        match read_record::<User>(&path).await {
            Ok(user) => user,
            Err(e) => {
                // A session record that cannot be read leaves the app logged
                // out; clearing it stops the failure from repeating on every
                // start.
                error!("Failed to load stored session, clearing it: {}", e);
                let _ = tokio::fs::remove_file(&path).await;
                None
            }
        }
    }

    async fn save_session(&self, user: &User) {
        write_record(&self.key_path(USER_KEY), user).await;

        let index_path = self.key_path(KNOWN_USERS_KEY);
        let mut index = match read_record::<HashMap<String, String>>(&index_path).await {
            Ok(Some(index)) => index,
            Ok(None) => HashMap::new(),
            Err(e) => {
                warn!("Failed to load known-users index, rebuilding: {}", e);
                HashMap::new()
            }
        };
        index.insert(user.email.to_lowercase(), user.id.clone());
        write_record(&index_path, &index).await;
    }

    async fn clear_session(&self) {
        let path = self.key_path(USER_KEY);
        if let Err(e) = tokio::fs::remove_file(&path).await {
            if e.kind() != ErrorKind::NotFound {
                error!("Failed to clear stored session: {}", e);
            }
        }
    }

    async fn known_user_id(&self, email: &str) -> Option<String> {
        let index_path = self.key_path(KNOWN_USERS_KEY);
        match read_record::<HashMap<String, String>>(&index_path).await {
            Ok(Some(index)) => index.get(&email.to_lowercase()).cloned(),
            Ok(None) => None,
            Err(e) => {
                warn!("Failed to load known-users index: {}", e);
                None
            }
        }
    }

    async fn load_user_data(&self, user_id: &str) -> UserData {
        match read_record::<UserData>(&self.user_data_path(user_id)).await {
            Ok(Some(data)) => data,
            Ok(None) => UserData::default(),
            Err(e) => {
                error!("Failed to load user data for {}: {}", user_id, e);
                UserData::default()
            }
        }
    }

    async fn save_user_data(&self, user_id: &str, data: &UserData) {
        write_record(&self.user_data_path(user_id), data).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use epignosis_core::domain::UserQuizProgress;
    use tempfile::TempDir;

    async fn store() -> (TempDir, JsonFileStore) {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path());
        store.ensure_root().await.unwrap();
        (dir, store)
    }

    fn user(id: &str, email: &str) -> User {
        User {
            id: id.to_string(),
            name: "Thabo".to_string(),
            email: email.to_string(),
        }
    }

    #[tokio::test]
    async fn never_seen_user_gets_the_zero_value() {
        let (_dir, store) = store().await;
        let data = store.load_user_data("user_nobody_abc").await;
        assert!(data.quiz_progress.is_empty());
    }

    #[tokio::test]
    async fn user_data_round_trips() {
        let (_dir, store) = store().await;
        let mut data = UserData::default();
        data.quiz_progress.insert(
            "q1".to_string(),
            UserQuizProgress {
                score: 4,
                ..Default::default()
            },
        );

        store.save_user_data("user_thabo_x1", &data).await;
        let loaded = store.load_user_data("user_thabo_x1").await;
        assert_eq!(loaded, data);
    }

    #[tokio::test]
    async fn corrupt_user_data_defaults_without_error() {
        let (dir, store) = store().await;
        tokio::fs::write(
            dir.path().join("epignosis_hub_user_data_user_bad_1.json"),
            "{not json",
        )
        .await
        .unwrap();

        let data = store.load_user_data("user_bad_1").await;
        assert!(data.quiz_progress.is_empty());
    }

    #[tokio::test]
    async fn corrupt_session_record_is_cleared_on_read() {
        let (dir, store) = store().await;
        let path = dir.path().join("epignosis_hub_user.json");
        tokio::fs::write(&path, "][").await.unwrap();

        assert!(store.load_session().await.is_none());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn session_round_trip_and_clear() {
        let (_dir, store) = store().await;
        let u = user("user_thabo_x1", "thabo@example.org");

        store.save_session(&u).await;
        assert_eq!(store.load_session().await, Some(u.clone()));

        store.clear_session().await;
        assert!(store.load_session().await.is_none());
        // Clearing an already-missing record is a no-op.
        store.clear_session().await;
    }

    #[tokio::test]
    async fn known_user_index_survives_logout() {
        let (_dir, store) = store().await;
        store
            .save_session(&user("user_thabo_x1", "Thabo@Example.org"))
            .await;
        store.clear_session().await;

        assert_eq!(
            store.known_user_id("thabo@example.org").await.as_deref(),
            Some("user_thabo_x1")
        );
    }
}
