//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{GeminiChatAdapter, JsonFileStore, StaticCatalog},
    config::Config,
    error::ApiError,
    progress::ProgressTracker,
    session::SessionManager,
    web::{
        auth::{login_handler, logout_handler},
        chat::{chat_reset_handler, chat_status_handler, chat_stream_handler, generate_handler},
        middleware::require_session,
        rest::{
            about_handler, daily_scriptures_handler, get_blog_post_handler, get_progress_handler,
            get_quiz_handler, get_study_topic_handler, list_blog_posts_handler,
            list_quizzes_handler, list_study_topics_handler, profile_handler,
            reset_progress_handler, update_progress_handler, ApiDoc,
        },
        state::AppState,
    },
};
use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use epignosis_core::ports::{ChatModelService, ContentCatalog, UserStore};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Prepare the Data Directory ---
    let store = JsonFileStore::new(config.data_dir.clone());
    store.ensure_root().await?;
    let store: Arc<dyn UserStore> = Arc::new(store);

    // --- 3. Initialize Service Adapters ---
    let catalog: Arc<dyn ContentCatalog> = Arc::new(StaticCatalog::new());
    let chat: Arc<dyn ChatModelService> = Arc::new(GeminiChatAdapter::new(
        reqwest::Client::new(),
        config.gemini_api_key.clone(),
        config.chat_model.clone(),
    ));
    let sessions = SessionManager::new(Arc::clone(&store));
    let progress = ProgressTracker::new(Arc::clone(&store));

    // --- 4. Restore the Persisted Session & Warm Up Chat ---
    if let Some(user) = sessions.restore().await {
        info!("Active session: {} <{}>", user.name, user.email);
    }
    if !chat.initialize_chat().await {
        warn!("Chat session could not be initialized. AI features will be degraded.");
    }

    // --- 5. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        config: config.clone(),
        catalog,
        chat,
        sessions,
        progress,
    });

    let cors_origin = config
        .frontend_origin
        .parse::<HeaderValue>()
        .map_err(|e| ApiError::Internal(format!("Invalid FRONTEND_ORIGIN: {e}")))?;
    let cors = CorsLayer::new()
        .allow_origin(cors_origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 6. Create the Web Router ---
    // Public routes (no session required)
    let public_routes = Router::new()
        .route("/about", get(about_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/logout", post(logout_handler))
        .route("/blog", get(list_blog_posts_handler))
        .route("/blog/{id}", get(get_blog_post_handler))
        .route("/quizzes", get(list_quizzes_handler))
        .route("/study-topics", get(list_study_topics_handler))
        .route("/study-topics/{id}", get(get_study_topic_handler))
        .route("/scriptures/daily", get(daily_scriptures_handler));

    // Protected routes (active session required)
    let protected_routes = Router::new()
        .route("/quizzes/{id}", get(get_quiz_handler))
        .route(
            "/quizzes/{id}/progress",
            get(get_progress_handler).put(update_progress_handler),
        )
        .route("/quizzes/{id}/progress/reset", post(reset_progress_handler))
        .route("/profile", get(profile_handler))
        .route("/chat/messages", post(chat_stream_handler))
        .route("/chat/generate", post(generate_handler))
        .route("/chat/status", get(chat_status_handler))
        .route("/chat/reset", post(chat_reset_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_session,
        ));

    // Combine API routes
    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 7. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
