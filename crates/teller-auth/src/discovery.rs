//! OIDC provider endpoint discovery.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{AuthError, Result};

/// Timeout for the well-known document fetch.
const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Endpoints extracted from a provider's discovery document.
#[derive(Debug, Clone)]
pub struct ProviderEndpoints {
    pub authorization_endpoint: String,
    pub token_endpoint: String,
}

#[derive(Debug, Deserialize)]
struct DiscoveryDocument {
    #[serde(default)]
    authorization_endpoint: Option<String>,
    #[serde(default)]
    token_endpoint: Option<String>,
}

/// Fetch the provider's well-known document and extract the two endpoints.
///
/// No caching at this layer: login and exchange are cold paths and
/// re-fetching keeps endpoint data fresh. Callers that need repeated
/// access cache the result themselves.
pub async fn discover(http: &reqwest::Client, discovery_url: &str) -> Result<ProviderEndpoints> {
    let response = http
        .get(discovery_url)
        .timeout(DISCOVERY_TIMEOUT)
        .send()
        .await
        .map_err(|e| AuthError::DiscoveryUnavailable(format!("{discovery_url}: {e}")))?;

    if !response.status().is_success() {
        return Err(AuthError::DiscoveryUnavailable(format!(
            "{discovery_url}: HTTP {}",
            response.status()
        )));
    }

    let document: DiscoveryDocument = response
        .json()
        .await
        .map_err(|e| AuthError::DiscoveryMalformed(format!("{discovery_url}: {e}")))?;

    let authorization_endpoint =
        require_endpoint(document.authorization_endpoint, "authorization_endpoint")?;
    let token_endpoint = require_endpoint(document.token_endpoint, "token_endpoint")?;

    Ok(ProviderEndpoints {
        authorization_endpoint,
        token_endpoint,
    })
}

fn require_endpoint(value: Option<String>, field: &str) -> Result<String> {
    match value {
        Some(url) if !url.trim().is_empty() => Ok(url),
        _ => Err(AuthError::DiscoveryMalformed(format!("missing {field}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_endpoint_present() {
        let url = require_endpoint(Some("https://id.example.com/auth".to_string()), "x").unwrap();
        assert_eq!(url, "https://id.example.com/auth");
    }

    #[test]
    fn test_require_endpoint_missing() {
        let err = require_endpoint(None, "token_endpoint").unwrap_err();
        assert!(matches!(err, AuthError::DiscoveryMalformed(_)));
        assert!(err.to_string().contains("token_endpoint"));
    }

    #[test]
    fn test_require_endpoint_empty() {
        let err = require_endpoint(Some("   ".to_string()), "authorization_endpoint").unwrap_err();
        assert!(matches!(err, AuthError::DiscoveryMalformed(_)));
    }

    #[tokio::test]
    async fn test_discover_unreachable_provider() {
        let http = reqwest::Client::new();
        // Port 9 (discard) refuses connections.
        let err = discover(&http, "http://127.0.0.1:9/.well-known/openid-configuration")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::DiscoveryUnavailable(_)));
    }
}
