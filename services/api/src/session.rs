//! services/api/src/session.rs
//!
//! The user session manager: login, logout, and startup restore over the
//! `UserStore` port. There is no password; a login is a (name, email) pair
//! and the derived id is what keys all per-user data.

use chrono::Utc;
use regex::Regex;
use std::sync::Arc;
use tracing::{error, info};

use epignosis_core::domain::User;
use epignosis_core::ports::UserStore;

/// Manages the single active login session.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn UserStore>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    /// Attempts to restore the persisted session at startup. A corrupt
    /// record was already cleared by the store, so this either yields the
    /// previous user or a logged-out state.
    pub async fn restore(&self) -> Option<User> {
        let user = self.store.load_session().await;
        if let Some(user) = &user {
            self.initialize_user_data(&user.id).await;
            info!("Restored session for {}", user.id);
        }
        user
    }

    /// Logs a user in. Both fields must be non-empty after trimming;
    /// otherwise the attempt is logged and ignored, mirroring the silent
    /// validation of the original flow.
    ///
    /// The derived id is stable per email: a match against the current
    /// session or the known-users index reuses the existing id, so progress
    /// follows the user across login cycles.
    pub async fn login(&self, name: &str, email: &str) -> Option<User> {
        let name = name.trim();
        let email = email.trim();
        if name.is_empty() || email.is_empty() {
            error!("Name and email cannot be empty for login.");
            return None;
        }

        let id = match self.existing_id(email).await {
            Some(id) => id,
            None => derive_user_id(email),
        };

        let user = User {
            id,
            name: name.to_string(),
            email: email.to_string(),
        };
        self.store.save_session(&user).await;
        self.initialize_user_data(&user.id).await;
        Some(user)
    }

    /// Clears the session only. The user's data records are deliberately
    /// left intact so progress survives a re-login with the same email.
    pub async fn logout(&self) {
        self.store.clear_session().await;
    }

    pub async fn current_user(&self) -> Option<User> {
        self.store.load_session().await
    }

    async fn existing_id(&self, email: &str) -> Option<String> {
        if let Some(current) = self.store.load_session().await {
            if current.email.to_lowercase() == email.to_lowercase() {
                return Some(current.id);
            }
        }
        self.store.known_user_id(email).await
    }

    /// Ensures the user's data record exists; a no-op for returning users.
    async fn initialize_user_data(&self, user_id: &str) {
        let data = self.store.load_user_data(user_id).await;
        self.store.save_user_data(user_id, &data).await;
    }
}

/// Synthesizes a fresh user id from the sanitized email plus the current
/// time in base36.
fn derive_user_id(email: &str) -> String {
    let sanitized = Regex::new("[^a-z0-9]")
        .unwrap()
        .replace_all(&email.to_lowercase(), "")
        .into_owned();
    format!(
        "user_{}_{}",
        sanitized,
        to_base36(Utc::now().timestamp_millis().max(0) as u64)
    )
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize] as char);
        value /= 36;
    }
    out.into_iter().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::store::JsonFileStore;
    use epignosis_core::domain::{ProgressPatch, UserQuizProgress};
    use tempfile::TempDir;

    async fn manager() -> (TempDir, SessionManager, Arc<dyn UserStore>) {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path());
        store.ensure_root().await.unwrap();
        let store: Arc<dyn UserStore> = Arc::new(store);
        (dir, SessionManager::new(Arc::clone(&store)), store)
    }

    #[test]
    fn derived_ids_embed_the_sanitized_email() {
        let id = derive_user_id("Naledi.M+test@Example.org");
        assert!(id.starts_with("user_naledimtestexampleorg_"));
    }

    #[test]
    fn base36_renders_digits() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
    }

    #[tokio::test]
    async fn login_rejects_empty_fields_silently() {
        let (_dir, sessions, _store) = manager().await;
        assert!(sessions.login("  ", "naledi@example.org").await.is_none());
        assert!(sessions.login("Naledi", "").await.is_none());
        assert!(sessions.current_user().await.is_none());
    }

    #[tokio::test]
    async fn relogin_with_same_email_reuses_the_id() {
        let (_dir, sessions, _store) = manager().await;
        let first = sessions.login("Naledi", "Naledi@Example.org").await.unwrap();
        let second = sessions
            .login("Naledi Mokoena", "naledi@example.org")
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.name, "Naledi Mokoena");
    }

    #[tokio::test]
    async fn different_email_derives_a_different_id() {
        let (_dir, sessions, _store) = manager().await;
        let first = sessions.login("Naledi", "naledi@example.org").await.unwrap();
        let second = sessions.login("Sipho", "sipho@example.org").await.unwrap();
        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn progress_survives_logout_and_relogin() {
        let (_dir, sessions, store) = manager().await;
        let user = sessions.login("Naledi", "naledi@example.org").await.unwrap();

        let mut data = store.load_user_data(&user.id).await;
        let mut record = UserQuizProgress::default();
        record.apply(&ProgressPatch {
            score: Some(8),
            completed: Some(true),
            ..Default::default()
        });
        data.quiz_progress.insert("q1".to_string(), record);
        store.save_user_data(&user.id, &data).await;

        sessions.logout().await;
        assert!(sessions.current_user().await.is_none());

        let back = sessions.login("Naledi", "NALEDI@example.org").await.unwrap();
        assert_eq!(back.id, user.id);
        let restored = store.load_user_data(&back.id).await;
        assert_eq!(restored.quiz_progress["q1"].score, 8);
    }
}
