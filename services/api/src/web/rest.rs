//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the catalog, profile, and progress REST
//! endpoints, and the master definition for the OpenAPI specification.

use crate::web::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    Extension,
};
use serde::Serialize;
use std::sync::Arc;
use utoipa::{OpenApi, ToSchema};

use epignosis_core::domain::{
    BlogPost, DailyScripture, ProgressPatch, Quiz, StudyTopic, User, UserData, UserQuizProgress,
};

pub const APP_NAME: &str = "Epignosis Hub";
pub const APP_TAGLINE: &str = "Epignosis Hub helps you deepen your understanding of Scripture \
through interactive Bible study, quizzes, and AI-assisted learning.";

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        about_handler,
        list_blog_posts_handler,
        get_blog_post_handler,
        list_quizzes_handler,
        get_quiz_handler,
        list_study_topics_handler,
        get_study_topic_handler,
        daily_scriptures_handler,
        profile_handler,
        get_progress_handler,
        update_progress_handler,
        reset_progress_handler,
        crate::web::auth::login_handler,
        crate::web::auth::logout_handler,
    ),
    components(
        schemas(AboutResponse, ProfileResponse)
    ),
    tags(
        (name = "Epignosis Hub API", description = "Bible study content, quizzes, and progress tracking.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response Structs
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct AboutResponse {
    pub name: String,
    pub tagline: String,
}

/// The current user together with everything persisted for them.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub user: User,
    pub user_data: UserData,
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Application name and tagline.
#[utoipa::path(get, path = "/about", responses((status = 200, body = AboutResponse)))]
pub async fn about_handler() -> Json<AboutResponse> {
    Json(AboutResponse {
        name: APP_NAME.to_string(),
        tagline: APP_TAGLINE.to_string(),
    })
}

#[utoipa::path(get, path = "/blog", responses((status = 200, body = [BlogPost])))]
pub async fn list_blog_posts_handler(State(state): State<Arc<AppState>>) -> Json<Vec<BlogPost>> {
    Json(state.catalog.blog_posts().await)
}

#[utoipa::path(
    get,
    path = "/blog/{id}",
    params(("id" = String, Path, description = "Blog post id")),
    responses(
        (status = 200, body = BlogPost),
        (status = 404, description = "No such post")
    )
)]
pub async fn get_blog_post_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<BlogPost>, (StatusCode, String)> {
    state
        .catalog
        .blog_post(&id)
        .await
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, "Blog post not found.".to_string()))
}

#[utoipa::path(get, path = "/quizzes", responses((status = 200, body = [Quiz])))]
pub async fn list_quizzes_handler(State(state): State<Arc<AppState>>) -> Json<Vec<Quiz>> {
    Json(state.catalog.quizzes().await)
}

/// Quiz detail. Requires an active session.
#[utoipa::path(
    get,
    path = "/quizzes/{id}",
    params(("id" = String, Path, description = "Quiz id")),
    responses(
        (status = 200, body = Quiz),
        (status = 401, description = "No active session"),
        (status = 404, description = "No such quiz")
    )
)]
pub async fn get_quiz_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Quiz>, (StatusCode, String)> {
    state
        .catalog
        .quiz(&id)
        .await
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, "Quiz not found.".to_string()))
}

#[utoipa::path(get, path = "/study-topics", responses((status = 200, body = [StudyTopic])))]
pub async fn list_study_topics_handler(
    State(state): State<Arc<AppState>>,
) -> Json<Vec<StudyTopic>> {
    Json(state.catalog.study_topics().await)
}

#[utoipa::path(
    get,
    path = "/study-topics/{id}",
    params(("id" = String, Path, description = "Study topic id")),
    responses(
        (status = 200, body = StudyTopic),
        (status = 404, description = "No such topic")
    )
)]
pub async fn get_study_topic_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<StudyTopic>, (StatusCode, String)> {
    state
        .catalog
        .study_topic(&id)
        .await
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, "Study topic not found.".to_string()))
}

#[utoipa::path(get, path = "/scriptures/daily", responses((status = 200, body = [DailyScripture])))]
pub async fn daily_scriptures_handler(
    State(state): State<Arc<AppState>>,
) -> Json<Vec<DailyScripture>> {
    Json(state.catalog.daily_scriptures().await)
}

/// The current user and their saved data. Requires an active session.
#[utoipa::path(
    get,
    path = "/profile",
    responses(
        (status = 200, body = ProfileResponse),
        (status = 401, description = "No active session")
    )
)]
pub async fn profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Json<ProfileResponse> {
    let user_data = state.progress.user_data(&user.id).await;
    Json(ProfileResponse { user, user_data })
}

/// Saved progress for one quiz; `null` when none has been recorded yet.
#[utoipa::path(
    get,
    path = "/quizzes/{id}/progress",
    params(("id" = String, Path, description = "Quiz id")),
    responses((status = 200, body = UserQuizProgress, description = "The record, or null when absent"))
)]
pub async fn get_progress_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(quiz_id): Path<String>,
) -> Json<Option<UserQuizProgress>> {
    Json(state.progress.get(&user.id, &quiz_id).await)
}

/// Merges a partial update onto the saved progress record.
#[utoipa::path(
    put,
    path = "/quizzes/{id}/progress",
    params(("id" = String, Path, description = "Quiz id")),
    request_body = ProgressPatch,
    responses((status = 200, body = UserQuizProgress))
)]
pub async fn update_progress_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(quiz_id): Path<String>,
    Json(patch): Json<ProgressPatch>,
) -> Json<UserQuizProgress> {
    Json(state.progress.update(&user.id, &quiz_id, &patch).await)
}

/// Zeroes the saved progress record, keeping it in place.
#[utoipa::path(
    post,
    path = "/quizzes/{id}/progress/reset",
    params(("id" = String, Path, description = "Quiz id")),
    responses((status = 200, body = UserQuizProgress))
)]
pub async fn reset_progress_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(quiz_id): Path<String>,
) -> Json<UserQuizProgress> {
    Json(state.progress.reset(&user.id, &quiz_id).await)
}
