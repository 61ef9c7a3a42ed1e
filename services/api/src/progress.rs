//! services/api/src/progress.rs
//!
//! The quiz progress tracker: merge-style updates and resets of the
//! per-user, per-quiz records, persisted through the `UserStore` port.

use chrono::Utc;
use std::sync::Arc;

use epignosis_core::domain::{ProgressPatch, UserData, UserQuizProgress};
use epignosis_core::ports::UserStore;

/// Tracks quiz progress for all users. Stateless itself; every operation
/// reads and writes the whole `UserData` record, last write wins.
#[derive(Clone)]
pub struct ProgressTracker {
    store: Arc<dyn UserStore>,
}

impl ProgressTracker {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    /// The full data record for a user; the zero value for a never-seen id.
    pub async fn user_data(&self, user_id: &str) -> UserData {
        self.store.load_user_data(user_id).await
    }

    pub async fn get(&self, user_id: &str, quiz_id: &str) -> Option<UserQuizProgress> {
        self.user_data(user_id)
            .await
            .quiz_progress
            .get(quiz_id)
            .cloned()
    }

    /// Merges the patch onto the existing record (or a fresh zero record),
    /// stamps the write time, and persists. Question indexes are not bounds
    /// checked against the quiz; callers own that consistency.
    pub async fn update(
        &self,
        user_id: &str,
        quiz_id: &str,
        patch: &ProgressPatch,
    ) -> UserQuizProgress {
        let mut data = self.store.load_user_data(user_id).await;
        let record = data.quiz_progress.entry(quiz_id.to_string()).or_default();
        record.apply(patch);
        record.timestamp = Utc::now().timestamp_millis();
        let updated = record.clone();
        self.store.save_user_data(user_id, &data).await;
        updated
    }

    /// Zeroes the record's fields while keeping the record itself present.
    pub async fn reset(&self, user_id: &str, quiz_id: &str) -> UserQuizProgress {
        self.update(user_id, quiz_id, &ProgressPatch::reset()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::store::JsonFileStore;
    use std::collections::HashMap;
    use tempfile::TempDir;

    async fn tracker() -> (TempDir, ProgressTracker) {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path());
        store.ensure_root().await.unwrap();
        (dir, ProgressTracker::new(Arc::new(store)))
    }

    #[tokio::test]
    async fn never_seen_user_reads_as_empty() {
        let (_dir, tracker) = tracker().await;
        assert!(tracker.user_data("user_ghost_1").await.quiz_progress.is_empty());
        assert!(tracker.get("user_ghost_1", "q1").await.is_none());
    }

    #[tokio::test]
    async fn partial_updates_merge_rather_than_replace() {
        let (_dir, tracker) = tracker().await;

        tracker
            .update(
                "user_naledi_1",
                "q1",
                &ProgressPatch {
                    score: Some(3),
                    ..Default::default()
                },
            )
            .await;
        let record = tracker
            .update(
                "user_naledi_1",
                "q1",
                &ProgressPatch {
                    completed: Some(true),
                    ..Default::default()
                },
            )
            .await;

        assert_eq!(record.score, 3);
        assert!(record.completed);
        assert!(record.timestamp > 0);
    }

    #[tokio::test]
    async fn updates_are_scoped_to_one_quiz() {
        let (_dir, tracker) = tracker().await;
        tracker
            .update(
                "user_naledi_1",
                "q1",
                &ProgressPatch {
                    score: Some(5),
                    ..Default::default()
                },
            )
            .await;
        tracker
            .update(
                "user_naledi_1",
                "q2",
                &ProgressPatch {
                    score: Some(1),
                    ..Default::default()
                },
            )
            .await;

        let data = tracker.user_data("user_naledi_1").await;
        assert_eq!(data.quiz_progress.len(), 2);
        assert_eq!(data.quiz_progress["q1"].score, 5);
        assert_eq!(data.quiz_progress["q2"].score, 1);
    }

    #[tokio::test]
    async fn reset_zeroes_fields_but_keeps_the_record() {
        let (_dir, tracker) = tracker().await;

        tracker
            .update(
                "user_naledi_1",
                "q1",
                &ProgressPatch {
                    score: Some(7),
                    completed: Some(true),
                    current_question_index: Some(9),
                    answers: Some(HashMap::from([("q1_1".to_string(), "c".to_string())])),
                },
            )
            .await;
        let record = tracker.reset("user_naledi_1", "q1").await;

        assert_eq!(record.score, 0);
        assert!(!record.completed);
        assert_eq!(record.current_question_index, 0);
        assert!(record.answers.is_empty());

        let data = tracker.user_data("user_naledi_1").await;
        assert!(data.quiz_progress.contains_key("q1"));
    }
}
