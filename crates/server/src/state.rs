use std::sync::Arc;

use assetflow_core::{Config, RateLimiter, TicketStore};

/// Shared application state
pub struct AppState {
    config: Config,
    ticket_store: Arc<dyn TicketStore>,
    rate_limiter: Option<Arc<RateLimiter>>,
}

impl AppState {
    /// Build state from config. A rate limiter is created when enabled.
    pub fn new(config: Config, ticket_store: Arc<dyn TicketStore>) -> Self {
        let rate_limiter = config
            .rate_limit
            .enabled
            .then(|| Arc::new(RateLimiter::new(config.rate_limit.requests_per_minute)));

        Self {
            config,
            ticket_store,
            rate_limiter,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn ticket_store(&self) -> &Arc<dyn TicketStore> {
        &self.ticket_store
    }

    pub fn rate_limiter(&self) -> Option<&RateLimiter> {
        self.rate_limiter.as_deref()
    }
}
