//! Error types for the authentication core.

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Errors that can occur in the token lifecycle.
///
/// Every variant carries owned data only, so the error is `Clone`; the
/// single-flight refresh hands one result to every concurrent caller.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    /// No stored credentials at all.
    #[error("not authenticated — run 'teller auth login' first")]
    NotAuthenticated,

    /// The refresh token is past its expiry; interactive login required.
    #[error("session expired — run 'teller auth login' to sign in again")]
    SessionExpired,

    /// The provider refused or failed a refresh grant.
    #[error("token refresh failed: {0}")]
    RefreshFailed(String),

    /// The provider refused or failed a token exchange.
    #[error("token exchange failed: {0}")]
    ExchangeFailed(String),

    /// The provider explicitly rejected the presented credential.
    #[error("credential rejected by the identity provider")]
    InvalidCredential,

    /// The discovery document could not be fetched.
    #[error("provider discovery unavailable: {0}")]
    DiscoveryUnavailable(String),

    /// The discovery document is missing required fields.
    #[error("provider discovery document malformed: {0}")]
    DiscoveryMalformed(String),

    /// The login callback carried an unknown or missing state value.
    #[error("login callback state mismatch")]
    StateMismatch,

    /// No provider callback arrived within the login window.
    #[error("login timed out waiting for the provider callback")]
    LoginTimedOut,

    /// The loopback callback listener failed.
    #[error("callback listener error: {0}")]
    Listener(String),

    /// Credential file I/O failed.
    #[error("credential storage error: {0}")]
    Storage(String),

    /// Credential (de)serialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl AuthError {
    /// Whether recovery requires re-running the interactive login.
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            AuthError::NotAuthenticated | AuthError::SessionExpired
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_login() {
        assert!(AuthError::NotAuthenticated.requires_login());
        assert!(AuthError::SessionExpired.requires_login());
        assert!(!AuthError::RefreshFailed("x".into()).requires_login());
        assert!(!AuthError::InvalidCredential.requires_login());
    }

    #[test]
    fn test_errors_are_cloneable() {
        let err = AuthError::RefreshFailed("provider said no".to_string());
        let copy = err.clone();
        assert_eq!(err.to_string(), copy.to_string());
    }
}
