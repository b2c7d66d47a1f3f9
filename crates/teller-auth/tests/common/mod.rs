//! Shared test fixtures: an in-process OIDC provider.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use axum::{
    Form, Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::json;

/// How the mock token endpoint answers grants.
#[derive(Debug, Clone, Copy)]
pub enum TokenMode {
    /// Issue tokens derived from the presented refresh token or code.
    Success,
    /// Reject every grant with 400 `invalid_grant`.
    RejectInvalidGrant,
    /// Fail every grant with 500.
    ServerError,
}

struct ProviderState {
    addr: SocketAddr,
    mode: TokenMode,
    delay_ms: u64,
    discovery_hits: AtomicU32,
    token_hits: AtomicU32,
}

/// An axum-backed OIDC provider bound to an ephemeral port.
pub struct MockProvider {
    state: Arc<ProviderState>,
    handle: tokio::task::JoinHandle<()>,
}

impl MockProvider {
    pub async fn spawn(mode: TokenMode) -> Self {
        Self::spawn_with_delay(mode, 0).await
    }

    /// `delay_ms` holds each token request open so concurrent callers
    /// genuinely overlap.
    pub async fn spawn_with_delay(mode: TokenMode, delay_ms: u64) -> Self {
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0))
            .await
            .expect("bind mock provider");
        let addr = listener.local_addr().expect("mock provider addr");

        let state = Arc::new(ProviderState {
            addr,
            mode,
            delay_ms,
            discovery_hits: AtomicU32::new(0),
            token_hits: AtomicU32::new(0),
        });

        let app = Router::new()
            .route("/.well-known/openid-configuration", get(discovery_doc))
            .route("/authorize", get(authorize_endpoint))
            .route("/token", post(token_endpoint))
            .with_state(Arc::clone(&state));

        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self { state, handle }
    }

    pub fn discovery_url(&self) -> String {
        format!(
            "http://{}/.well-known/openid-configuration",
            self.state.addr
        )
    }

    pub fn discovery_hits(&self) -> u32 {
        self.state.discovery_hits.load(Ordering::SeqCst)
    }

    pub fn token_hits(&self) -> u32 {
        self.state.token_hits.load(Ordering::SeqCst)
    }
}

impl Drop for MockProvider {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn discovery_doc(State(state): State<Arc<ProviderState>>) -> Json<serde_json::Value> {
    state.discovery_hits.fetch_add(1, Ordering::SeqCst);
    Json(json!({
        "authorization_endpoint": format!("http://{}/authorize", state.addr),
        "token_endpoint": format!("http://{}/token", state.addr),
    }))
}

async fn authorize_endpoint() -> &'static str {
    "sign-in page"
}

async fn token_endpoint(
    State(state): State<Arc<ProviderState>>,
    Form(form): Form<HashMap<String, String>>,
) -> axum::response::Response {
    let hit = state.token_hits.fetch_add(1, Ordering::SeqCst) + 1;

    if state.delay_ms > 0 {
        tokio::time::sleep(std::time::Duration::from_millis(state.delay_ms)).await;
    }

    match state.mode {
        TokenMode::RejectInvalidGrant => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "invalid_grant" })),
        )
            .into_response(),
        TokenMode::ServerError => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "temporarily_unavailable" })),
        )
            .into_response(),
        TokenMode::Success => {
            let grant_type = form.get("grant_type").cloned().unwrap_or_default();
            let subject = match grant_type.as_str() {
                "refresh_token" => form.get("refresh_token").cloned().unwrap_or_default(),
                "authorization_code" => form.get("code").cloned().unwrap_or_default(),
                _ => {
                    return (
                        StatusCode::BAD_REQUEST,
                        Json(json!({ "error": "unsupported_grant_type" })),
                    )
                        .into_response();
                }
            };

            Json(json!({
                "access_token": format!("access-{subject}-{hit}"),
                "refresh_token": format!("rotated-{subject}"),
                "token_type": "Bearer",
                "expires_in": 300,
                "refresh_expires_in": 1800,
            }))
            .into_response()
        }
    }
}
