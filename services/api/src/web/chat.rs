//! services/api/src/web/chat.rs
//!
//! The chat surface: a streaming message endpoint plus the session
//! management and one-shot generation routes around it.
//!
//! A streamed turn is delivered as SSE with typed events:
//! `meta` (the skeleton of the AI transcript message), `text` (a delta),
//! `sources` (a JSON batch of citations), `error` (inline transcript
//! failure), and a final `done`. A safety block arrives as a plain `text`
//! event carrying the fixed notice, not as an error.

use axum::{
    extract::State,
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use chrono::Utc;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::state::AppState;
use epignosis_core::domain::{ChatMessage, ChatSender, GroundingChunk};
use epignosis_core::ports::PortError;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Deserialize, ToSchema)]
pub struct GenerateRequest {
    pub prompt: String,
}

#[derive(Serialize, ToSchema)]
pub struct GenerateResponse {
    pub text: String,
}

#[derive(Serialize, ToSchema)]
pub struct ChatStatusResponse {
    pub ready: bool,
}

/// Maps a port failure to the HTTP layer. Configuration and availability
/// problems are a 503; anything else is a 500. The error's own wording is
/// already user-safe (credential details were rewritten at the adapter).
fn port_error_response(e: PortError) -> (StatusCode, String) {
    let status = match e {
        PortError::Unavailable | PortError::Misconfigured => StatusCode::SERVICE_UNAVAILABLE,
        PortError::NotFound(_) => StatusCode::NOT_FOUND,
        PortError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, e.to_string())
}

fn json_event<T: Serialize>(name: &str, value: &T) -> Result<Event, axum::Error> {
    Event::default().event(name).json_data(value)
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /chat/messages - Send one message, stream the reply
pub async fn chat_stream_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, (StatusCode, String)> {
    let streams = state
        .chat
        .send_message_stream(&req.message)
        .await
        .map_err(|e| {
            error!("Failed to start chat turn: {}", e);
            port_error_response(e)
        })?;

    // Skeleton of the AI transcript entry; the client appends text deltas
    // and citations to it as they arrive.
    let meta = ChatMessage {
        id: Uuid::new_v4().to_string(),
        sender: ChatSender::Ai,
        text: String::new(),
        timestamp: Utc::now().timestamp_millis(),
        sources: None,
    };

    let mut text = streams.text;
    let mut sources = streams.sources;
    let event_stream = async_stream::stream! {
        yield json_event("meta", &meta);

        let mut text_done = false;
        let mut sources_done = false;
        while !(text_done && sources_done) {
            tokio::select! {
                item = text.next(), if !text_done => match item {
                    Some(Ok(delta)) => yield json_event("text", &delta),
                    // Mid-stream failure: the session was already reset by
                    // the adapter; surface it inline and keep draining the
                    // citation side.
                    Some(Err(e)) => yield json_event("error", &e.to_string()),
                    None => text_done = true,
                },
                batch = sources.next(), if !sources_done => match batch {
                    Some(chunks) => {
                        let usable: Vec<GroundingChunk> = chunks
                            .into_iter()
                            .filter(GroundingChunk::has_web_uri)
                            .collect();
                        if !usable.is_empty() {
                            yield json_event("sources", &usable);
                        }
                    }
                    None => sources_done = true,
                },
            }
        }

        yield Ok(Event::default().event("done").data(""));
    };

    Ok(Sse::new(event_stream).keep_alive(KeepAlive::default()))
}

/// POST /chat/generate - Stateless one-shot generation
#[utoipa::path(
    post,
    path = "/chat/generate",
    request_body = GenerateRequest,
    responses(
        (status = 200, body = GenerateResponse),
        (status = 503, description = "AI service unavailable or misconfigured")
    )
)]
pub async fn generate_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, (StatusCode, String)> {
    let text = state
        .chat
        .generate_text(&req.prompt)
        .await
        .map_err(port_error_response)?;
    Ok(Json(GenerateResponse { text }))
}

/// GET /chat/status - Readiness of the chat service
#[utoipa::path(
    get,
    path = "/chat/status",
    responses((status = 200, body = ChatStatusResponse))
)]
pub async fn chat_status_handler(State(state): State<Arc<AppState>>) -> Json<ChatStatusResponse> {
    Json(ChatStatusResponse {
        ready: state.chat.is_ready().await,
    })
}

/// POST /chat/reset - Drop the conversation so the next message starts fresh
#[utoipa::path(post, path = "/chat/reset", responses((status = 200)))]
pub async fn chat_reset_handler(State(state): State<Arc<AppState>>) -> StatusCode {
    state.chat.reset_chat().await;
    StatusCode::OK
}
