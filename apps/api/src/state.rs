use std::sync::Arc;
use std::time::Duration;

use crate::detection::engine::DetectionEngine;
use crate::detection::session::SessionStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Read-only after start-up; shared by every scan without locking.
    pub engine: Arc<DetectionEngine>,
    pub sessions: Arc<SessionStore>,
}

impl AppState {
    pub fn new(engine: Arc<DetectionEngine>, scan_cooldown: Duration, max_sessions: usize) -> Self {
        let sessions = Arc::new(SessionStore::new(
            Arc::clone(&engine),
            scan_cooldown,
            max_sessions,
        ));
        Self { engine, sessions }
    }
}
