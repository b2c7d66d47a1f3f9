//! Route handlers.

use axum::{Json, extract::State, response::IntoResponse};
use serde::Serialize;

use crate::state::AppState;

/// Protected-resource metadata document, referenced from the
/// `WWW-Authenticate` challenge on unauthorized requests.
#[derive(Debug, Serialize)]
pub struct ProtectedResourceMetadata {
    pub resource: String,
    pub authorization_servers: Vec<String>,
    pub scopes_supported: Vec<String>,
    pub bearer_methods_supported: Vec<String>,
}

/// Handle GET /.well-known/oauth-protected-resource
pub async fn protected_resource_metadata(State(state): State<AppState>) -> impl IntoResponse {
    Json(ProtectedResourceMetadata {
        resource: state.settings.resource.clone(),
        authorization_servers: vec![state.settings.authorization_server()],
        scopes_supported: state.settings.scopes.clone(),
        bearer_methods_supported: vec!["header".to_string()],
    })
}

/// Handle GET /health
pub async fn handle_health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "teller-server",
    }))
}

/// Handle GET /api/v1/status
///
/// Authenticated probe: reaching this handler means the middleware
/// resolved the caller's credential and scoped the access token.
pub async fn auth_status() -> impl IntoResponse {
    Json(serde_json::json!({
        "authorized": teller_auth::current_request_token().is_some(),
    }))
}
