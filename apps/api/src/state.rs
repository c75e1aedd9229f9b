use std::sync::Arc;

use crate::activities::ActivityLibrary;
use crate::feed::ingest::FeedIngestor;
use crate::feed::store::ArticleStore;
use crate::llm_client::breaker::CircuitBreaker;
use crate::llm_client::TextGenerator;
use crate::sessions::store::SessionStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Catalog and keyword index, built once at startup.
    pub library: Arc<ActivityLibrary>,
    /// Breaker-guarded generator used for activity top-up.
    pub generator: Arc<dyn TextGenerator>,
    pub breaker: Arc<CircuitBreaker>,
    pub sessions: SessionStore,
    pub articles: Arc<dyn ArticleStore>,
    pub ingestor: Arc<FeedIngestor>,
}
