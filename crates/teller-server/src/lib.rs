//! Hosted-mode HTTP server for teller.
//!
//! Every inbound request presents a bearer credential; the auth
//! middleware resolves it through the multi-tenant exchange cache and
//! scopes the resulting access token to that request. Unauthorized
//! requests are answered with a `WWW-Authenticate` challenge referencing
//! the protected-resource metadata document.
//!
//! # Example
//!
//! ```ignore
//! use teller_config::Settings;
//! use teller_server::Server;
//!
//! let server = Server::new(Settings::load()?);
//! server.run().await?;
//! ```

pub mod auth;
pub mod error;
pub mod routes;
pub mod state;

pub use auth::{PROTECTED_RESOURCE_PATH, auth_middleware};
pub use error::{Result, ServerError};
pub use state::AppState;

use std::net::SocketAddr;

use axum::{Router, middleware, routing::get};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use teller_config::Settings;

/// The teller hosted-mode server.
pub struct Server {
    state: AppState,
}

impl Server {
    /// Create a new server from settings.
    pub fn new(settings: Settings) -> Self {
        Self {
            state: AppState::new(settings),
        }
    }

    /// Create a server from a pre-built application state.
    pub fn from_state(state: AppState) -> Self {
        Self { state }
    }

    /// Build the router with all routes and middleware.
    pub fn router(&self) -> Router {
        Router::new()
            // Unauthenticated discovery and health endpoints
            .route("/health", get(routes::handle_health))
            .route(
                PROTECTED_RESOURCE_PATH,
                get(routes::protected_resource_metadata),
            )
            .nest("/api/v1", self.api_routes())
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// API routes (v1). All require bearer authentication.
    fn api_routes(&self) -> Router<AppState> {
        Router::new()
            .route("/status", get(routes::auth_status))
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                auth::auth_middleware,
            ))
    }

    /// Run the server on the configured bind address.
    pub async fn run(self) -> Result<()> {
        let addr: SocketAddr = self
            .state
            .settings
            .bind_address
            .parse()
            .map_err(|e| ServerError::Internal(format!("invalid bind address: {e}")))?;
        self.run_on(addr).await
    }

    /// Run the server on a specific address (useful for testing).
    pub async fn run_on(self, addr: SocketAddr) -> Result<()> {
        let router = self.router();

        info!("Starting server on {}", addr);

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Internal(format!("Failed to bind: {e}")))?;

        axum::serve(listener, router)
            .await
            .map_err(|e| ServerError::Internal(format!("Server error: {e}")))?;

        Ok(())
    }
}
