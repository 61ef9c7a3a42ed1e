//! crates/epignosis_core/src/domain.rs
//!
//! Defines the core data structures for the application.
//!
//! These types double as the persisted and wire JSON shapes, so they all
//! serialize with camelCase field names. Catalog entities (blog posts,
//! quizzes, study topics, scriptures) are read-only; the per-user records
//! (`User`, `UserData`) are the only mutable state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;

/// The authenticated user. Created on login, overwritten on each login,
/// and removed (session only, never historical progress) on logout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
}

/// Difficulty tier of a quiz. Each tier carries a fixed question count the
/// catalog normalizes to at build time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum QuizLevel {
    Beginner,
    Intermediate,
    Advanced,
}

impl QuizLevel {
    /// The normalized question count for quizzes of this level.
    pub fn target_question_count(self) -> usize {
        match self {
            QuizLevel::Beginner => 10,
            QuizLevel::Intermediate => 20,
            QuizLevel::Advanced => 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuizOption {
    pub id: String,
    pub text: String,
}

/// A single multiple-choice question. `correct_option_id` must name one of
/// the entries in `options`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub id: String,
    pub text: String,
    pub options: Vec<QuizOption>,
    pub correct_option_id: String,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    pub id: String,
    pub title: String,
    pub description: String,
    pub level: QuizLevel,
    pub questions: Vec<QuizQuestion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub duration_minutes: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BlogPost {
    pub id: String,
    pub title: String,
    pub author: String,
    pub date: DateTime<Utc>,
    pub image_url: String,
    pub summary: String,
    /// Full content, may include HTML markup.
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StudyTopicSection {
    pub id: String,
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StudyTopic {
    pub id: String,
    pub title: String,
    pub description: String,
    pub image_url: String,
    pub content_sections: Vec<StudyTopicSection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_verses: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verse_count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DailyScripture {
    pub id: String,
    pub reference: String,
    pub text: String,
}

/// Saved progress for one (user, quiz) pair. Reset zeroes the fields but the
/// record itself stays in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserQuizProgress {
    pub score: u32,
    pub completed: bool,
    pub current_question_index: usize,
    /// question id -> selected option id
    pub answers: HashMap<String, String>,
    /// Epoch millis of the last write.
    pub timestamp: i64,
}

impl UserQuizProgress {
    /// Merges the patch's present fields onto this record. Absent fields are
    /// left untouched; the caller stamps `timestamp`.
    pub fn apply(&mut self, patch: &ProgressPatch) {
        if let Some(score) = patch.score {
            self.score = score;
        }
        if let Some(completed) = patch.completed {
            self.completed = completed;
        }
        if let Some(index) = patch.current_question_index {
            self.current_question_index = index;
        }
        if let Some(answers) = &patch.answers {
            self.answers = answers.clone();
        }
    }
}

/// A partial progress update. Every field is optional so callers can submit
/// just the pieces that changed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProgressPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_question_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answers: Option<HashMap<String, String>>,
}

impl ProgressPatch {
    /// The full zero-value patch used to reset a quiz.
    pub fn reset() -> Self {
        Self {
            score: Some(0),
            completed: Some(false),
            current_question_index: Some(0),
            answers: Some(HashMap::new()),
        }
    }
}

/// Everything persisted for one user id, keyed by quiz id. Lazily created
/// with an empty map on first access.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    pub quiz_progress: HashMap<String, UserQuizProgress>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ChatSender {
    User,
    Ai,
}

/// One turn of the chat transcript. Never persisted beyond the session.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub sender: ChatSender,
    pub text: String,
    /// Epoch millis.
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<GroundingChunk>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WebSource {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RetrievedContext {
    pub uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Citation metadata attached to a generated response, pointing at a web
/// resource or a retrieved document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GroundingChunk {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web: Option<WebSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retrieved_context: Option<RetrievedContext>,
}

impl GroundingChunk {
    /// Whether this citation carries a usable web URI. Display layers filter
    /// on this before rendering source links.
    pub fn has_web_uri(&self) -> bool {
        self.web
            .as_ref()
            .and_then(|w| w.uri.as_deref())
            .is_some_and(|uri| !uri.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with_score(score: u32) -> UserQuizProgress {
        UserQuizProgress {
            score,
            completed: false,
            current_question_index: 2,
            answers: HashMap::from([("q1_1".to_string(), "c".to_string())]),
            timestamp: 1,
        }
    }

    #[test]
    fn patches_merge_field_wise() {
        let mut record = record_with_score(3);
        record.apply(&ProgressPatch {
            completed: Some(true),
            ..Default::default()
        });

        assert_eq!(record.score, 3);
        assert!(record.completed);
        assert_eq!(record.current_question_index, 2);
        assert_eq!(record.answers.len(), 1);
    }

    #[test]
    fn reset_patch_zeroes_every_field() {
        let mut record = record_with_score(7);
        record.apply(&ProgressPatch::reset());

        assert_eq!(record.score, 0);
        assert!(!record.completed);
        assert_eq!(record.current_question_index, 0);
        assert!(record.answers.is_empty());
    }

    #[test]
    fn level_targets_are_fixed() {
        assert_eq!(QuizLevel::Beginner.target_question_count(), 10);
        assert_eq!(QuizLevel::Intermediate.target_question_count(), 20);
        assert_eq!(QuizLevel::Advanced.target_question_count(), 30);
    }

    #[test]
    fn grounding_chunk_web_uri_filter() {
        let with_uri = GroundingChunk {
            web: Some(WebSource {
                uri: Some("https://example.org/article".to_string()),
                title: None,
            }),
            retrieved_context: None,
        };
        let without_uri = GroundingChunk {
            web: Some(WebSource::default()),
            retrieved_context: None,
        };

        assert!(with_uri.has_web_uri());
        assert!(!without_uri.has_web_uri());
        assert!(!GroundingChunk::default().has_web_uri());
    }

    #[test]
    fn user_data_round_trips_camel_case() {
        let mut data = UserData::default();
        data.quiz_progress
            .insert("q1".to_string(), record_with_score(5));

        let json = serde_json::to_string(&data).unwrap();
        assert!(json.contains("quizProgress"));
        assert!(json.contains("currentQuestionIndex"));

        let back: UserData = serde_json::from_str(&json).unwrap();
        assert_eq!(back, data);
    }
}
