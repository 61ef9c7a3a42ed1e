pub mod auth;
pub mod chat;
pub mod middleware;
pub mod rest;
pub mod state;

// Re-export the pieces the binary wires together.
pub use middleware::require_session;
pub use state::AppState;
