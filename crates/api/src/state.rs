//! Shared application state for the Axum API server.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use taskbell_engine::NotificationOrchestrator;
use taskbell_notifier::realtime::RealtimePublisher;

/// Application state shared across all route handlers via Axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<NotificationOrchestrator>,
    pub publisher: RealtimePublisher,
    /// Cancelled on shutdown; in-flight sends stop starting new channels and
    /// live streams end.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        orchestrator: Arc<NotificationOrchestrator>,
        publisher: RealtimePublisher,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            orchestrator,
            publisher,
            shutdown,
        }
    }
}
