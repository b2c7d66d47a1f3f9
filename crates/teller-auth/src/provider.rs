//! Form-encoded grants against the provider's token endpoint.

use serde::Deserialize;

/// Successful token-endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Access-token lifetime in seconds.
    pub expires_in: u64,
    /// Refresh-token lifetime in seconds. Absent on providers that do not
    /// report it; callers assume a default.
    #[serde(default)]
    pub refresh_expires_in: Option<u64>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// A token-endpoint failure, split so callers can distinguish a provider
/// rejection from a transport fault.
#[derive(Debug, Clone)]
pub enum GrantError {
    /// The request never completed (connect, timeout, body read).
    Transport(String),
    /// The provider answered with an error status.
    Rejected { status: u16, detail: String },
}

impl GrantError {
    /// Whether the provider explicitly rejected the grant (4xx).
    pub fn is_rejection(&self) -> bool {
        matches!(self, GrantError::Rejected { status, .. } if (400..500).contains(status))
    }
}

impl std::fmt::Display for GrantError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GrantError::Transport(detail) => write!(f, "{detail}"),
            GrantError::Rejected { status, detail } => {
                write!(f, "provider returned {status}: {detail}")
            }
        }
    }
}

/// Exchange an authorization code plus PKCE verifier for tokens.
pub async fn exchange_code(
    http: &reqwest::Client,
    token_endpoint: &str,
    client_id: &str,
    client_secret: Option<&str>,
    code: &str,
    redirect_uri: &str,
    code_verifier: &str,
) -> std::result::Result<TokenResponse, GrantError> {
    let mut form = vec![
        ("grant_type", "authorization_code"),
        ("code", code),
        ("redirect_uri", redirect_uri),
        ("code_verifier", code_verifier),
        ("client_id", client_id),
    ];
    if let Some(secret) = client_secret {
        form.push(("client_secret", secret));
    }
    post_grant(http, token_endpoint, &form).await
}

/// Exchange a refresh token for a new access/refresh token pair.
pub async fn refresh_grant(
    http: &reqwest::Client,
    token_endpoint: &str,
    client_id: &str,
    client_secret: Option<&str>,
    refresh_token: &str,
) -> std::result::Result<TokenResponse, GrantError> {
    let mut form = vec![
        ("grant_type", "refresh_token"),
        ("refresh_token", refresh_token),
        ("client_id", client_id),
    ];
    if let Some(secret) = client_secret {
        form.push(("client_secret", secret));
    }
    post_grant(http, token_endpoint, &form).await
}

async fn post_grant(
    http: &reqwest::Client,
    token_endpoint: &str,
    form: &[(&str, &str)],
) -> std::result::Result<TokenResponse, GrantError> {
    let response = http
        .post(token_endpoint)
        .form(form)
        .send()
        .await
        .map_err(|e| GrantError::Transport(format!("token request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let detail = response
            .text()
            .await
            .unwrap_or_else(|_| "no error detail".to_string());
        return Err(GrantError::Rejected {
            status: status.as_u16(),
            detail,
        });
    }

    response
        .json()
        .await
        .map_err(|e| GrantError::Transport(format!("invalid token response: {e}")))
}
