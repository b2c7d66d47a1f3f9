//! Bearer authentication middleware.
//!
//! Every authenticated route receives its access token through this
//! middleware: the inbound bearer credential is resolved via the
//! multi-tenant exchange cache and the rest of the request runs inside a
//! task-local token scope, so concurrent requests never observe each
//! other's tokens.

use axum::{
    Json,
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use teller_auth::{AuthError, with_request_token};

use crate::error::ServerError;
use crate::state::AppState;

/// Well-known path of the protected-resource metadata document.
pub const PROTECTED_RESOURCE_PATH: &str = "/.well-known/oauth-protected-resource";

/// Authentication middleware for hosted-mode API routes.
pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(credential) = bearer_credential(request.headers()) else {
        return challenge_response(&state, "missing bearer credential");
    };

    match state.exchange.resolve(&credential).await {
        Ok(token) => with_request_token(token, next.run(request)).await,
        Err(AuthError::InvalidCredential) => challenge_response(&state, "credential rejected"),
        Err(err) => {
            tracing::warn!(error = %err, "credential resolution failed");
            ServerError::from(err).into_response()
        }
    }
}

/// Extract the bearer credential from the Authorization header.
fn bearer_credential(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    value.strip_prefix("Bearer ").map(str::to_string)
}

/// 401 with a `WWW-Authenticate` challenge pointing at the
/// protected-resource metadata document.
fn challenge_response(state: &AppState, message: &str) -> Response {
    let metadata_url = format!(
        "{}{}",
        state.settings.resource.trim_end_matches('/'),
        PROTECTED_RESOURCE_PATH
    );

    let body = Json(serde_json::json!({
        "code": "unauthorized",
        "message": message,
    }));
    let mut response = (StatusCode::UNAUTHORIZED, body).into_response();
    if let Ok(value) =
        header::HeaderValue::from_str(&format!("Bearer resource_metadata=\"{metadata_url}\""))
    {
        response
            .headers_mut()
            .insert(header::WWW_AUTHENTICATE, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_credential_extraction() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer abc123".parse().unwrap());
        assert_eq!(bearer_credential(&headers).as_deref(), Some("abc123"));
    }

    #[test]
    fn test_bearer_credential_missing_or_malformed() {
        let headers = HeaderMap::new();
        assert!(bearer_credential(&headers).is_none());

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Basic dXNlcg==".parse().unwrap());
        assert!(bearer_credential(&headers).is_none());
    }
}
