//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for user login and logout. There is no password
//! flow: a login is a (name, email) pair and the derived user id doubles as
//! the session cookie value.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::web::state::AppState;
use epignosis_core::domain::User;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub name: String,
    pub email: String,
}

#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    pub user: User,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/login - Start (or resume) a session for a name/email pair
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 400, description = "Name or email missing")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // The session manager validates silently; the wire surface still has to
    // answer something, so a refused login becomes a 400.
    let user = state.sessions.login(&req.name, &req.email).await.ok_or((
        StatusCode::BAD_REQUEST,
        "Name and email are required".to_string(),
    ))?;

    let cookie = format!(
        "session={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        user.id,
        Duration::days(30).num_seconds()
    );

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(AuthResponse { user }),
    ))
}

/// POST /auth/logout - End the session, keeping saved progress
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logout successful")
    )
)]
pub async fn logout_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.sessions.logout().await;

    let cookie = "session=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0";
    (StatusCode::OK, [(header::SET_COOKIE, cookie.to_string())])
}
