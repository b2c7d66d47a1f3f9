//! Main client implementation.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use teller_auth::SharedTokenSupplier;
use url::Url;

use crate::error::{Error, ErrorResponse, Result};

/// Default timeout for requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Wallet backend API client.
///
/// Every request reads the effective access token through the configured
/// [`teller_auth::AccessTokenSupplier`] — the single-tenant token cache
/// locally, the request-scoped supplier in hosted mode. The client itself
/// carries no deployment-mode branching.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use teller_auth::{CredentialStore, TokenCache};
/// use teller_client::ApiClient;
///
/// # async fn example() -> teller_client::Result<()> {
/// let cache = TokenCache::new(CredentialStore::new("/home/me/.config/teller".as_ref()));
/// let client = ApiClient::builder()
///     .base_url("https://api.tellerwallet.dev")
///     .token_supplier(Arc::new(cache))
///     .build()?;
///
/// let balances: serde_json::Value = client.get("balances").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: reqwest::Client,
    base_url: Url,
    timeout: Duration,
    supplier: SharedTokenSupplier,
}

impl ApiClient {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Build a URL for an API path.
    fn url(&self, path: &str) -> Result<Url> {
        let path = path.trim_start_matches('/');
        self.inner
            .base_url
            .join(&format!("v1/{}", path))
            .map_err(Error::from)
    }

    /// Make an authorized GET request.
    pub async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path)?;
        let token = self.inner.supplier.access_token().await?;
        let response = self
            .inner
            .http
            .get(url)
            .bearer_auth(token)
            .timeout(self.inner.timeout)
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// Make an authorized POST request.
    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
        B: serde::Serialize + ?Sized,
    {
        let url = self.url(path)?;
        let token = self.inner.supplier.access_token().await?;
        let response = self
            .inner
            .http
            .post(url)
            .bearer_auth(token)
            .json(body)
            .timeout(self.inner.timeout)
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// Check backend reachability (unauthenticated).
    pub async fn is_healthy(&self) -> bool {
        let Ok(url) = self.inner.base_url.join("health") else {
            return false;
        };
        match self
            .inner
            .http
            .get(url)
            .timeout(self.inner.timeout)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    /// Handle a response, extracting the body or error.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            Err(self.extract_error(response).await)
        }
    }

    /// Extract an error from a failed response.
    async fn extract_error(&self, response: reqwest::Response) -> Error {
        let status = response.status().as_u16();
        tracing::debug!(status, "backend returned an error response");

        match response.json::<ErrorResponse>().await {
            Ok(err) => {
                if status == 401 {
                    Error::Auth(err.message)
                } else {
                    Error::Api {
                        status,
                        code: err.code,
                        message: err.message,
                    }
                }
            }
            Err(_) => Error::Api {
                status,
                code: "unknown".to_string(),
                message: format!("HTTP {}", status),
            },
        }
    }
}

/// Builder for creating an [`ApiClient`].
pub struct ClientBuilder {
    base_url: Option<String>,
    supplier: Option<SharedTokenSupplier>,
    timeout: Duration,
    user_agent: Option<String>,
}

impl ClientBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self {
            base_url: None,
            supplier: None,
            timeout: DEFAULT_TIMEOUT,
            user_agent: None,
        }
    }

    /// Set the backend base URL.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the access-token supplier.
    pub fn token_supplier(mut self, supplier: SharedTokenSupplier) -> Self {
        self.supplier = Some(supplier);
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set a custom user agent.
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<ApiClient> {
        let base_url = self
            .base_url
            .ok_or_else(|| Error::Config("base_url is required".to_string()))?;
        let supplier = self
            .supplier
            .ok_or_else(|| Error::Config("token_supplier is required".to_string()))?;

        let mut base_url = Url::parse(&base_url)?;
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let user_agent = self
            .user_agent
            .unwrap_or_else(|| format!("teller-client/{}", env!("CARGO_PKG_VERSION")));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(user_agent)
            .build()?;

        Ok(ApiClient {
            inner: Arc::new(ClientInner {
                http,
                base_url,
                timeout: self.timeout,
                supplier,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
