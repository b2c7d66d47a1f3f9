//! Error types for the server.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Server error type.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Authentication failed.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The identity provider or backend could not be reached.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

impl From<teller_auth::AuthError> for ServerError {
    fn from(e: teller_auth::AuthError) -> Self {
        use teller_auth::AuthError;
        match e {
            AuthError::InvalidCredential | AuthError::NotAuthenticated => {
                ServerError::Unauthorized(e.to_string())
            }
            AuthError::ExchangeFailed(_)
            | AuthError::DiscoveryUnavailable(_)
            | AuthError::DiscoveryMalformed(_) => ServerError::Upstream(e.to_string()),
            other => ServerError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ServerError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ServerError::Upstream(_) => (StatusCode::BAD_GATEWAY, "upstream_error"),
            ServerError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let body = serde_json::json!({
            "code": code,
            "message": self.to_string(),
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use teller_auth::AuthError;

    #[test]
    fn test_auth_error_mapping() {
        assert!(matches!(
            ServerError::from(AuthError::InvalidCredential),
            ServerError::Unauthorized(_)
        ));
        assert!(matches!(
            ServerError::from(AuthError::ExchangeFailed("x".into())),
            ServerError::Upstream(_)
        ));
        assert!(matches!(
            ServerError::from(AuthError::DiscoveryUnavailable("x".into())),
            ServerError::Upstream(_)
        ));
        assert!(matches!(
            ServerError::from(AuthError::Storage("x".into())),
            ServerError::Internal(_)
        ));
    }
}
