use std::sync::Arc;

use tokio::time::Instant;

use crate::assistant::sessions::SessionStore;
use crate::config::Config;
use crate::llm_client::ChatModel;
use crate::middleware::rate_limit::RateLimiter;
use crate::store::Store;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    /// Generative model behind the chat assistant and research auto-fill.
    pub model: Arc<dyn ChatModel>,
    /// Per-session conversation history. In-memory LRU or Redis.
    pub sessions: Arc<dyn SessionStore>,
    pub limiter: Arc<RateLimiter>,
    pub config: Config,
    pub started_at: Instant,
}
