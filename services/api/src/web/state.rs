//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use crate::progress::ProgressTracker;
use crate::session::SessionManager;
use epignosis_core::ports::{ChatModelService, ContentCatalog};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all
/// handlers. The chat adapter lives here rather than as module-level state,
/// so tests (and any future multi-session setup) can construct isolated
/// instances.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub catalog: Arc<dyn ContentCatalog>,
    pub chat: Arc<dyn ChatModelService>,
    pub sessions: SessionManager,
    pub progress: ProgressTracker,
}
