//! services/api/src/adapters/gemini.rs
//!
//! This module contains the adapter for the hosted generative model. It
//! implements the `ChatModelService` port against the generative-language
//! REST API, streaming responses over SSE.
//!
//! One conversation session exists per adapter instance. The upstream chunk
//! stream is consumed exactly once by a fan-out task that feeds the text and
//! citation channels independently, so both outward streams stay safe to
//! iterate in any order.

const SYSTEM_INSTRUCTION: &str = "You are EpignosAI, a helpful AI assistant for Epignosis Hub. \
Your knowledge base and responses are rooted in the teachings of the Bible, understood through a \
mainstream Evangelical Christian lens. Your purpose is to assist users in deepening their \
knowledge of Christ Jesus and the Scriptures. Provide clear, biblically-grounded, and encouraging \
responses using plain English. Be respectful, patient, and focus on providing knowledge and \
understanding. If asked about topics clearly outside the scope of Christian theology, the Bible, \
or spiritual growth (e.g., complex secular philosophies, other religions in-depth, \
non-theological advice), gently state that it's outside your primary area of expertise or guide \
the conversation back to Christian themes. When appropriate, cite Bible verses to support your \
answers. You can ask clarifying questions. Avoid overly academic language unless necessary, and \
then explain terms simply.";

const ONE_SHOT_SYSTEM_INSTRUCTION: &str =
    "You are a helpful assistant for Epignosis Hub, focused on Evangelical Christian topics.";

/// In-band token that replaces a response blocked by the safety policy.
/// Delivered as ordinary text so transcripts render it inline.
pub const SAFETY_BLOCK_NOTICE: &str =
    "[Content blocked due to safety policy. Please rephrase your query or try a different topic.]";

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest_eventsource::{Event as SseEvent, Error as SseError, EventSource};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, warn};

use epignosis_core::domain::{GroundingChunk, RetrievedContext, WebSource};
use epignosis_core::ports::{ChatModelService, MessageStreams, PortError, PortResult};

//=========================================================================================
// Wire Types (generative-language REST)
//=========================================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

/// One conversational turn on the wire. Messages ride as an ordered list of
/// parts; only text parts are produced today but the shape admits more.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

impl Content {
    fn user(text: &str) -> Self {
        Self {
            role: Some("user".to_string()),
            parts: vec![Part {
                text: Some(text.to_string()),
            }],
        }
    }

    fn model(text: String) -> Self {
        Self {
            role: Some("model".to_string()),
            parts: vec![Part { text: Some(text) }],
        }
    }

    fn instruction(text: &str) -> Self {
        Self {
            role: None,
            parts: vec![Part {
                text: Some(text.to_string()),
            }],
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    system_instruction: Content,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentChunk {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<WireGroundingChunk>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireGroundingChunk {
    web: Option<WireSource>,
    retrieved_context: Option<WireSource>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireSource {
    uri: Option<String>,
    title: Option<String>,
}

impl GenerateContentChunk {
    /// The text delta this chunk contributes, if any.
    fn text_delta(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    fn is_safety_block(&self) -> bool {
        self.candidates
            .first()
            .and_then(|candidate| candidate.finish_reason.as_deref())
            == Some("SAFETY")
    }

    /// Maps this chunk's citation metadata into the domain shape. The wire
    /// side is duck-typed, so the optional fields are validated here, once:
    /// a retrieved-context entry without a URI is dropped.
    fn grounding_chunks(&self) -> Vec<GroundingChunk> {
        let Some(metadata) = self
            .candidates
            .first()
            .and_then(|candidate| candidate.grounding_metadata.as_ref())
        else {
            return Vec::new();
        };
        metadata
            .grounding_chunks
            .iter()
            .map(|chunk| GroundingChunk {
                web: chunk.web.as_ref().map(|web| WebSource {
                    uri: web.uri.clone(),
                    title: web.title.clone(),
                }),
                retrieved_context: chunk.retrieved_context.as_ref().and_then(|ctx| {
                    ctx.uri.clone().map(|uri| RetrievedContext {
                        uri,
                        title: ctx.title.clone(),
                    })
                }),
            })
            .collect()
    }
}

//=========================================================================================
// Session State
//=========================================================================================

#[derive(Debug, Default)]
struct ChatSession {
    /// Accumulated conversation turns, resent with every message so the
    /// hosted model sees the full history.
    history: Vec<Content>,
}

#[derive(Debug)]
enum ChatState {
    Uninitialized,
    Ready(ChatSession),
    Failed,
}

//=========================================================================================
// Error Mapping
//=========================================================================================

/// Maps an upstream failure description to a port error. Anything that looks
/// like a credential problem is rewritten to the generic configuration
/// message before it can reach a user.
fn rewrite_model_error(detail: String) -> PortError {
    let lowered = detail.to_lowercase();
    if detail.contains("API_KEY")
        || lowered.contains("api key")
        || lowered.contains("authentication")
        || lowered.contains("unauthorized")
    {
        error!("Model credential problem: {}", detail);
        PortError::Misconfigured
    } else {
        PortError::Unexpected(detail)
    }
}

//=========================================================================================
// Streaming Plumbing
//=========================================================================================

/// Adapts the raw SSE connection into a stream of parsed response chunks.
/// Malformed frames are skipped; the first transport failure ends the
/// stream after surfacing one error item.
fn chunk_stream(
    mut es: EventSource,
) -> impl Stream<Item = PortResult<GenerateContentChunk>> + Send {
    async_stream::stream! {
        while let Some(event) = es.next().await {
            match event {
                Ok(SseEvent::Open) => {}
                Ok(SseEvent::Message(message)) => {
                    match serde_json::from_str::<GenerateContentChunk>(&message.data) {
                        Ok(chunk) => yield Ok(chunk),
                        Err(e) => warn!("Skipping malformed stream chunk: {}", e),
                    }
                }
                Err(SseError::StreamEnded) => break,
                Err(SseError::InvalidStatusCode(status, response)) => {
                    let body = response.text().await.unwrap_or_default();
                    es.close();
                    yield Err(rewrite_model_error(format!(
                        "model request failed with {status}: {body}"
                    )));
                    break;
                }
                Err(e) => {
                    es.close();
                    yield Err(rewrite_model_error(e.to_string()));
                    break;
                }
            }
        }
    }
}

/// Consumes the upstream chunk sequence exactly once, fanning text deltas
/// and citation batches out to independent channels. On clean completion the
/// turn is committed to the session history; on failure the session is reset
/// so the next send starts fresh.
fn fan_out(
    chunks: impl Stream<Item = PortResult<GenerateContentChunk>> + Send + 'static,
    state: Arc<Mutex<ChatState>>,
    user_content: Content,
) -> MessageStreams {
    let (text_tx, text_rx) = mpsc::channel::<PortResult<String>>(32);
    let (sources_tx, sources_rx) = mpsc::channel::<Vec<GroundingChunk>>(32);

    tokio::spawn(async move {
        futures::pin_mut!(chunks);
        let mut reply = String::new();
        while let Some(item) = chunks.next().await {
            match item {
                Ok(chunk) => {
                    let sources = chunk.grounding_chunks();
                    if !sources.is_empty() {
                        let _ = sources_tx.send(sources).await;
                    }
                    let delta = chunk.text_delta();
                    if chunk.is_safety_block() && delta.is_none() {
                        warn!("Model response blocked by safety policy");
                        let _ = text_tx.send(Ok(SAFETY_BLOCK_NOTICE.to_string())).await;
                        return;
                    }
                    if let Some(delta) = delta {
                        reply.push_str(&delta);
                        let _ = text_tx.send(Ok(delta)).await;
                    }
                }
                Err(e) => {
                    error!("Chat stream failed, resetting session: {}", e);
                    *state.lock().await = ChatState::Uninitialized;
                    let _ = text_tx.send(Err(e)).await;
                    return;
                }
            }
        }

        // Clean completion: both sides of the turn join the history.
        let mut guard = state.lock().await;
        if let ChatState::Ready(session) = &mut *guard {
            session.history.push(user_content);
            session.history.push(Content::model(reply));
        }
    });

    MessageStreams {
        text: Box::pin(ReceiverStream::new(text_rx)),
        sources: Box::pin(ReceiverStream::new(sources_rx)),
    }
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ChatModelService` against the hosted
/// generative-model API.
#[derive(Clone)]
pub struct GeminiChatAdapter {
    http: reqwest::Client,
    api_key: Option<String>,
    model: String,
    state: Arc<Mutex<ChatState>>,
}

impl GeminiChatAdapter {
    /// Creates a new `GeminiChatAdapter`. A missing credential is not an
    /// error here; every chat operation degrades to the unavailable notice.
    pub fn new(http: reqwest::Client, api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            http,
            api_key: api_key.filter(|key| !key.is_empty()),
            model: model.into(),
            state: Arc::new(Mutex::new(ChatState::Uninitialized)),
        }
    }

    fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    fn request_url(&self, method: &str, api_key: &str) -> String {
        let model = &self.model;
        let mut url = format!("{GEMINI_API_BASE}/models/{model}:{method}?key={api_key}");
        if method == "streamGenerateContent" {
            url.push_str("&alt=sse");
        }
        url
    }
}

//=========================================================================================
// `ChatModelService` Trait Implementation
//=========================================================================================

#[async_trait]
impl ChatModelService for GeminiChatAdapter {
    async fn initialize_chat(&self) -> bool {
        let mut state = self.state.lock().await;
        if !self.has_credential() {
            error!("GEMINI_API_KEY is not set. AI features will not be available.");
            *state = ChatState::Failed;
            return false;
        }
        *state = ChatState::Ready(ChatSession::default());
        true
    }

    async fn is_ready(&self) -> bool {
        let mut state = self.state.lock().await;
        match *state {
            ChatState::Ready(_) => true,
            ChatState::Failed => false,
            // Client construction only; the session itself stays lazy.
            ChatState::Uninitialized => {
                if self.has_credential() {
                    true
                } else {
                    *state = ChatState::Failed;
                    false
                }
            }
        }
    }

    async fn reset_chat(&self) {
        *self.state.lock().await = ChatState::Uninitialized;
    }

    async fn send_message_stream(&self, message: &str) -> PortResult<MessageStreams> {
        let Some(api_key) = self.api_key.clone() else {
            let mut state = self.state.lock().await;
            *state = ChatState::Failed;
            return Err(PortError::Unavailable);
        };

        // One lazy initialization attempt, then snapshot the history for
        // this turn.
        let history = {
            let mut state = self.state.lock().await;
            if !matches!(*state, ChatState::Ready(_)) {
                *state = ChatState::Ready(ChatSession::default());
            }
            match &*state {
                ChatState::Ready(session) => session.history.clone(),
                _ => return Err(PortError::Unavailable),
            }
        };

        let user_content = Content::user(message);
        let mut contents = history;
        contents.push(user_content.clone());
        let body = GenerateContentRequest {
            contents,
            system_instruction: Content::instruction(SYSTEM_INSTRUCTION),
        };

        let request = self
            .http
            .post(self.request_url("streamGenerateContent", &api_key))
            .json(&body);
        let es = EventSource::new(request).map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(fan_out(
            chunk_stream(es),
            Arc::clone(&self.state),
            user_content,
        ))
    }

    async fn generate_text(&self, prompt: &str) -> PortResult<String> {
        let Some(api_key) = self.api_key.clone() else {
            error!("GEMINI_API_KEY is not set. AI features will not be available.");
            return Err(PortError::Unavailable);
        };

        let body = GenerateContentRequest {
            contents: vec![Content::user(prompt)],
            system_instruction: Content::instruction(ONE_SHOT_SYSTEM_INSTRUCTION),
        };

        let response = self
            .http
            .post(self.request_url("generateContent", &api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| rewrite_model_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(rewrite_model_error(format!(
                "model request failed with {status}: {detail}"
            )));
        }

        let chunk: GenerateContentChunk = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        chunk
            .text_delta()
            .ok_or_else(|| PortError::Unexpected("model response contained no text".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn chunk(json: &str) -> GenerateContentChunk {
        serde_json::from_str(json).unwrap()
    }

    fn text_chunk(text: &str) -> GenerateContentChunk {
        chunk(&format!(
            r#"{{"candidates":[{{"content":{{"role":"model","parts":[{{"text":"{text}"}}]}}}}]}}"#
        ))
    }

    fn ready_state() -> Arc<Mutex<ChatState>> {
        Arc::new(Mutex::new(ChatState::Ready(ChatSession::default())))
    }

    async fn collect_text(mut streams: MessageStreams) -> Vec<PortResult<String>> {
        let mut items = Vec::new();
        while let Some(item) = streams.text.next().await {
            items.push(item);
        }
        items
    }

    #[tokio::test]
    async fn safety_block_without_text_yields_exactly_the_notice() {
        let blocked = chunk(r#"{"candidates":[{"finishReason":"SAFETY"}]}"#);
        let state = ready_state();
        let streams = fan_out(
            stream::iter(vec![Ok(blocked), Ok(text_chunk("never delivered"))]),
            Arc::clone(&state),
            Content::user("hi"),
        );

        let items = collect_text(streams).await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_deref().unwrap(), SAFETY_BLOCK_NOTICE);

        // The blocked turn never joins the history.
        match &*state.lock().await {
            ChatState::Ready(session) => assert!(session.history.is_empty()),
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[tokio::test]
    async fn text_and_sources_fan_out_from_one_pass() {
        let grounded = chunk(
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"see "}]},
                "groundingMetadata":{"groundingChunks":[
                    {"web":{"uri":"https://example.org/a","title":"A"}},
                    {"retrievedContext":{"title":"no uri, dropped"}}
                ]}}]}"#,
        );
        let streams = fan_out(
            stream::iter(vec![Ok(grounded), Ok(text_chunk("John 3:16"))]),
            ready_state(),
            Content::user("verse?"),
        );

        let mut sources = streams.sources;
        let mut text = streams.text;

        let batch = sources.next().await.unwrap();
        assert_eq!(batch.len(), 2);
        assert!(batch[0].has_web_uri());
        assert!(batch[1].retrieved_context.is_none());
        assert!(sources.next().await.is_none());

        assert_eq!(text.next().await.unwrap().unwrap(), "see ");
        assert_eq!(text.next().await.unwrap().unwrap(), "John 3:16");
        assert!(text.next().await.is_none());
    }

    #[tokio::test]
    async fn completed_turn_is_committed_to_history() {
        let state = ready_state();
        let streams = fan_out(
            stream::iter(vec![Ok(text_chunk("Grace ")), Ok(text_chunk("and peace."))]),
            Arc::clone(&state),
            Content::user("greeting"),
        );

        let items = collect_text(streams).await;
        assert_eq!(items.len(), 2);

        match &*state.lock().await {
            ChatState::Ready(session) => {
                assert_eq!(session.history.len(), 2);
                assert_eq!(session.history[0].role.as_deref(), Some("user"));
                assert_eq!(
                    session.history[1].parts[0].text.as_deref(),
                    Some("Grace and peace.")
                );
            }
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[tokio::test]
    async fn stream_failure_resets_the_session() {
        let state = ready_state();
        let streams = fan_out(
            stream::iter(vec![
                Ok(text_chunk("partial")),
                Err(PortError::Unexpected("connection reset".to_string())),
            ]),
            Arc::clone(&state),
            Content::user("hi"),
        );

        let items = collect_text(streams).await;
        assert_eq!(items.len(), 2);
        assert!(items[1].is_err());
        assert!(matches!(*state.lock().await, ChatState::Uninitialized));
    }

    #[tokio::test]
    async fn readiness_without_credential_fails_sticky() {
        let adapter = GeminiChatAdapter::new(reqwest::Client::new(), None, "test-model");
        assert!(!adapter.is_ready().await);
        assert!(!adapter.initialize_chat().await);
        assert!(matches!(
            adapter.send_message_stream("hello").await,
            Err(PortError::Unavailable)
        ));
    }

    #[tokio::test]
    async fn readiness_with_credential_is_lazy() {
        let adapter =
            GeminiChatAdapter::new(reqwest::Client::new(), Some("k".to_string()), "test-model");
        assert!(adapter.is_ready().await);
        // Readiness alone must not create a session.
        assert!(matches!(*adapter.state.lock().await, ChatState::Uninitialized));

        assert!(adapter.initialize_chat().await);
        assert!(matches!(*adapter.state.lock().await, ChatState::Ready(_)));

        adapter.reset_chat().await;
        assert!(matches!(*adapter.state.lock().await, ChatState::Uninitialized));
    }

    #[test]
    fn credential_failures_are_rewritten() {
        assert!(matches!(
            rewrite_model_error("API_KEY_INVALID".to_string()),
            PortError::Misconfigured
        ));
        assert!(matches!(
            rewrite_model_error("400: API key not valid.".to_string()),
            PortError::Misconfigured
        ));
        assert!(matches!(
            rewrite_model_error("connection reset by peer".to_string()),
            PortError::Unexpected(_)
        ));
    }

    #[test]
    fn multi_part_text_deltas_are_concatenated() {
        let c = chunk(
            r#"{"candidates":[{"content":{"parts":[{"text":"a"},{"text":"b"}]}}]}"#,
        );
        assert_eq!(c.text_delta().as_deref(), Some("ab"));
        assert!(!c.is_safety_block());
    }
}
