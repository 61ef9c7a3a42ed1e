//! crates/epignosis_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the
//! core to be independent of the concrete storage, catalog, and hosted-model
//! implementations.

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use crate::domain::{
    BlogPost, DailyScripture, GroundingChunk, Quiz, StudyTopic, User, UserData,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
///
/// The `Unavailable` and `Misconfigured` variants carry the fixed user-facing
/// wording the chat surface shows verbatim, so handlers never have to rewrite
/// them.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Chat not initialized. AI service might be unavailable or misconfigured.")]
    Unavailable,
    #[error("There was an issue with the AI service configuration. Please contact support.")]
    Misconfigured,
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Key-value persistence for the login session and per-user data records.
///
/// Deliberately infallible: reads of missing or corrupt records fall back to
/// the zero value and writes that fail are logged and dropped by the adapter.
/// Nothing downstream ever branches on a storage failure.
#[async_trait]
pub trait UserStore: Send + Sync {
    // --- Login Session ---

    /// Loads the persisted login session. A record that cannot be parsed is
    /// cleared so the next start comes up logged out.
    async fn load_session(&self) -> Option<User>;

    /// Persists the login session and remembers the email -> id mapping so a
    /// later login with the same email derives the same id.
    async fn save_session(&self, user: &User);

    /// Removes the login session record only. User data records survive.
    async fn clear_session(&self);

    /// Looks up the id previously derived for an email (case-insensitive).
    /// Survives logout, which is what lets progress follow a user across
    /// login cycles.
    async fn known_user_id(&self, email: &str) -> Option<String>;

    // --- Per-user Data ---

    /// Loads the user's data record, or the zero value for a never-seen id.
    async fn load_user_data(&self, user_id: &str) -> UserData;

    async fn save_user_data(&self, user_id: &str, data: &UserData);
}

/// Read access to the static content collections. Not-found is an empty
/// result, never an error.
#[async_trait]
pub trait ContentCatalog: Send + Sync {
    async fn blog_posts(&self) -> Vec<BlogPost>;
    async fn blog_post(&self, id: &str) -> Option<BlogPost>;

    async fn quizzes(&self) -> Vec<Quiz>;
    async fn quiz(&self, id: &str) -> Option<Quiz>;

    async fn study_topics(&self) -> Vec<StudyTopic>;
    async fn study_topic(&self, id: &str) -> Option<StudyTopic>;

    async fn daily_scriptures(&self) -> Vec<DailyScripture>;
}

/// Incremental response text from one chat turn. An `Err` item is a
/// mid-stream failure; the stream ends after it.
pub type TextStream = Pin<Box<dyn Stream<Item = PortResult<String>> + Send>>;

/// Citation metadata accompanying a chat turn, one batch per upstream chunk
/// that carried any.
pub type SourcesStream = Pin<Box<dyn Stream<Item = Vec<GroundingChunk>> + Send>>;

/// The two independently consumable sequences produced by one streamed chat
/// turn. Both are fed from a single pass over the underlying response, so
/// consuming them in any order (or dropping one) is safe.
pub struct MessageStreams {
    pub text: TextStream,
    pub sources: SourcesStream,
}

/// A stateful conversation with the hosted generative model.
#[async_trait]
pub trait ChatModelService: Send + Sync {
    /// (Re)creates the conversation session. Returns false, leaving the
    /// service failed, when the client cannot be constructed.
    async fn initialize_chat(&self) -> bool;

    /// Reports readiness. Has no side effects unless the service is still
    /// uninitialized, in which case it attempts client construction only.
    async fn is_ready(&self) -> bool;

    /// Drops the session so the next send starts a fresh conversation.
    async fn reset_chat(&self);

    /// Sends one user message and returns the text and citation streams for
    /// the model's reply. Lazily initializes the session once if needed.
    async fn send_message_stream(&self, message: &str) -> PortResult<MessageStreams>;

    /// Stateless one-shot generation, independent of the chat session.
    async fn generate_text(&self, prompt: &str) -> PortResult<String>;
}
