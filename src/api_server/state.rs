//! Shared application state (spec §6 wiring).
//!
//! Grounded on the teacher's `api_server/state.rs` `AppState` shape; the
//! broadcast channel for WebSocket progress events is dropped (no streaming
//! surface in this spec) in favor of the vault's own collaborators.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::session::SessionRegistry;
use crate::store::RecordStore;

/// Cloned into every request (cheap: every field is an `Arc`). Handlers
/// reach the record store, the in-memory session registry, and resolved
/// configuration through this single extractor.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RecordStore>,
    pub sessions: Arc<SessionRegistry>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(store: RecordStore, config: AppConfig) -> Self {
        let sessions = SessionRegistry::new(config.app_session_idle_minutes);
        Self {
            store: Arc::new(store),
            sessions: Arc::new(sessions),
            config: Arc::new(config),
        }
    }
}
