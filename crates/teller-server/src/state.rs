//! Application state shared across handlers.

use std::sync::Arc;

use teller_auth::ExchangeCache;
use teller_config::Settings;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Multi-tenant exchange cache resolving inbound bearer credentials.
    pub exchange: Arc<ExchangeCache>,

    /// Server settings.
    pub settings: Arc<Settings>,
}

impl AppState {
    /// Create application state, wiring the exchange cache to the
    /// configured provider.
    pub fn new(settings: Settings) -> Self {
        let exchange = ExchangeCache::new(
            settings.discovery_url.clone(),
            settings.client_id.clone(),
            settings.client_secret.clone(),
        );
        Self {
            exchange: Arc::new(exchange),
            settings: Arc::new(settings),
        }
    }

    /// Create application state with a pre-built exchange cache.
    pub fn with_exchange(settings: Settings, exchange: ExchangeCache) -> Self {
        Self {
            exchange: Arc::new(exchange),
            settings: Arc::new(settings),
        }
    }
}
