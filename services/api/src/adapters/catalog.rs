//! services/api/src/adapters/catalog.rs
//!
//! This module contains the content catalog adapter, the concrete
//! implementation of the `ContentCatalog` port. The collections are authored
//! as JSON assets embedded at compile time; quizzes pass through
//! question-count normalization once, when the catalog is constructed.
//!
//! Every accessor awaits a short artificial delay so callers exercise the
//! same suspension points they would against a remote content service.

use async_trait::async_trait;
use std::time::Duration;

use epignosis_core::domain::{
    BlogPost, DailyScripture, Quiz, QuizOption, QuizQuestion, StudyTopic,
};
use epignosis_core::ports::ContentCatalog;

/// Simulated latency of the list accessors.
const LIST_DELAY: Duration = Duration::from_millis(300);
/// Simulated latency of the lookup-by-id accessors.
const DETAIL_DELAY: Duration = Duration::from_millis(200);
/// Simulated latency of the daily-scripture accessor.
const SCRIPTURE_DELAY: Duration = Duration::from_millis(100);

//=========================================================================================
// Question-count Normalization
//=========================================================================================

/// Builds the deterministic filler question appended to under-filled
/// quizzes. `index` counts from zero over the appended questions;
/// `existing_count` is the authored question count.
fn placeholder_question(quiz_id: &str, index: usize, existing_count: usize) -> QuizQuestion {
    let question_number = existing_count + index + 1;
    let answer = 2 + index;
    let option = |id: &str, text: String| QuizOption {
        id: id.to_string(),
        text,
    };
    QuizQuestion {
        id: format!("{quiz_id}_placeholder_{question_number}"),
        text: format!("Placeholder Question {question_number} for this quiz. What is 2 + {index}?"),
        options: vec![
            option("a", format!("Answer is {}", answer - 1)),
            option("b", format!("Correct answer: {answer}")),
            option("c", format!("Answer is {}", answer + 1)),
            option("d", format!("Answer is {}", answer + 2)),
        ],
        correct_option_id: "b".to_string(),
        explanation: format!(
            "This is a placeholder explanation. The correct answer is indeed {answer}."
        ),
    }
}

/// Pads or truncates a quiz's question list to the fixed target for its
/// level. Pure and idempotent.
fn normalize_question_count(mut quiz: Quiz) -> Quiz {
    let target = quiz.level.target_question_count();
    let current = quiz.questions.len();
    if current < target {
        for index in 0..(target - current) {
            quiz.questions
                .push(placeholder_question(&quiz.id, index, current));
        }
    } else {
        quiz.questions.truncate(target);
    }
    quiz
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A catalog adapter serving the authored in-memory collections.
#[derive(Clone)]
pub struct StaticCatalog {
    blog_posts: Vec<BlogPost>,
    quizzes: Vec<Quiz>,
    study_topics: Vec<StudyTopic>,
    daily_scriptures: Vec<DailyScripture>,
}

impl StaticCatalog {
    /// Builds the catalog from the embedded content assets, normalizing
    /// every quiz's question count. The assets are part of the binary, so a
    /// parse failure is a build defect, not a runtime condition.
    pub fn new() -> Self {
        let blog_posts: Vec<BlogPost> =
            serde_json::from_str(include_str!("catalog/blog_posts.json"))
                .expect("embedded blog_posts.json is well-formed");
        let quizzes: Vec<Quiz> = serde_json::from_str(include_str!("catalog/quizzes.json"))
            .expect("embedded quizzes.json is well-formed");
        let study_topics: Vec<StudyTopic> =
            serde_json::from_str(include_str!("catalog/study_topics.json"))
                .expect("embedded study_topics.json is well-formed");
        let daily_scriptures: Vec<DailyScripture> =
            serde_json::from_str(include_str!("catalog/daily_scriptures.json"))
                .expect("embedded daily_scriptures.json is well-formed");

        Self {
            blog_posts,
            quizzes: quizzes.into_iter().map(normalize_question_count).collect(),
            study_topics,
            daily_scriptures,
        }
    }
}

impl Default for StaticCatalog {
    fn default() -> Self {
        Self::new()
    }
}

//=========================================================================================
// `ContentCatalog` Trait Implementation
//=========================================================================================

#[async_trait]
impl ContentCatalog for StaticCatalog {
    async fn blog_posts(&self) -> Vec<BlogPost> {
        tokio::time::sleep(LIST_DELAY).await;
        self.blog_posts.clone()
    }

    async fn blog_post(&self, id: &str) -> Option<BlogPost> {
        tokio::time::sleep(DETAIL_DELAY).await;
        self.blog_posts.iter().find(|post| post.id == id).cloned()
    }

    async fn quizzes(&self) -> Vec<Quiz> {
        tokio::time::sleep(LIST_DELAY).await;
        self.quizzes.clone()
    }

    async fn quiz(&self, id: &str) -> Option<Quiz> {
        tokio::time::sleep(DETAIL_DELAY).await;
        self.quizzes.iter().find(|quiz| quiz.id == id).cloned()
    }

    async fn study_topics(&self) -> Vec<StudyTopic> {
        tokio::time::sleep(LIST_DELAY).await;
        self.study_topics.clone()
    }

    async fn study_topic(&self, id: &str) -> Option<StudyTopic> {
        tokio::time::sleep(DETAIL_DELAY).await;
        self.study_topics.iter().find(|topic| topic.id == id).cloned()
    }

    async fn daily_scriptures(&self) -> Vec<DailyScripture> {
        tokio::time::sleep(SCRIPTURE_DELAY).await;
        self.daily_scriptures.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use epignosis_core::domain::QuizLevel;

    fn authored_quiz(level: QuizLevel, count: usize) -> Quiz {
        let questions = (0..count)
            .map(|i| QuizQuestion {
                id: format!("t_{i}"),
                text: format!("Authored question {i}"),
                options: vec![
                    QuizOption {
                        id: "a".to_string(),
                        text: "Yes".to_string(),
                    },
                    QuizOption {
                        id: "b".to_string(),
                        text: "No".to_string(),
                    },
                ],
                correct_option_id: "a".to_string(),
                explanation: String::new(),
            })
            .collect();
        Quiz {
            id: "t".to_string(),
            title: "Test".to_string(),
            description: String::new(),
            level,
            questions,
            image_url: None,
            duration_minutes: 10,
        }
    }

    #[test]
    fn under_filled_beginner_quiz_is_padded_to_ten() {
        let quiz = normalize_question_count(authored_quiz(QuizLevel::Beginner, 3));
        assert_eq!(quiz.questions.len(), 10);

        // The first placeholder continues the authored numbering.
        let first_filler = &quiz.questions[3];
        assert_eq!(first_filler.id, "t_placeholder_4");
        assert_eq!(first_filler.correct_option_id, "b");
        assert!(first_filler.text.contains("What is 2 + 0?"));
    }

    #[test]
    fn over_filled_advanced_quiz_is_truncated_to_thirty() {
        let quiz = normalize_question_count(authored_quiz(QuizLevel::Advanced, 35));
        assert_eq!(quiz.questions.len(), 30);
        assert_eq!(quiz.questions.last().unwrap().id, "t_29");
    }

    #[test]
    fn normalization_is_idempotent() {
        let once = normalize_question_count(authored_quiz(QuizLevel::Intermediate, 7));
        let twice = normalize_question_count(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn every_catalog_quiz_is_normalized_and_consistent() {
        let catalog = StaticCatalog::new();
        assert!(!catalog.quizzes.is_empty());
        for quiz in &catalog.quizzes {
            assert_eq!(
                quiz.questions.len(),
                quiz.level.target_question_count(),
                "quiz {} is not normalized",
                quiz.id
            );
            for question in &quiz.questions {
                assert!(
                    question
                        .options
                        .iter()
                        .any(|option| option.id == question.correct_option_id),
                    "question {} has a dangling correct option",
                    question.id
                );
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn lookup_miss_is_none_not_an_error() {
        let catalog = StaticCatalog::new();
        assert!(catalog.quiz("no-such-quiz").await.is_none());
        assert!(catalog.blog_post("no-such-post").await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn daily_scriptures_are_served() {
        let catalog = StaticCatalog::new();
        let scriptures = catalog.daily_scriptures().await;
        assert!(!scriptures.is_empty());
        assert!(scriptures.iter().any(|s| s.reference == "Isaiah 41:10"));
    }
}
