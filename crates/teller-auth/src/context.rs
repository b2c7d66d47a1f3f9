//! Request-scoped token propagation and the supplier seam.
//!
//! The outbound API client reads its access token through one
//! abstraction, [`AccessTokenSupplier`], with two implementations chosen
//! by deployment mode: the single-tenant [`TokenCache`] for a local
//! process, and [`RequestTokenSupplier`] for a hosted server where each
//! inbound request scopes its own resolved token.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{AuthError, Result};
use crate::token_cache::TokenCache;

tokio::task_local! {
    /// Access token resolved for the current inbound request.
    static REQUEST_TOKEN: Option<String>;
}

/// Source of the effective access token for outbound API calls.
#[async_trait]
pub trait AccessTokenSupplier: Send + Sync {
    async fn access_token(&self) -> Result<String>;
}

/// Shared supplier handle for use across async contexts.
pub type SharedTokenSupplier = Arc<dyn AccessTokenSupplier>;

#[async_trait]
impl AccessTokenSupplier for TokenCache {
    async fn access_token(&self) -> Result<String> {
        TokenCache::access_token(self).await
    }
}

/// Run `fut` with `token` visible as the current request's access token.
///
/// Each concurrently in-flight request scopes its own value; none can
/// observe another's token.
pub async fn with_request_token<F>(token: String, fut: F) -> F::Output
where
    F: Future,
{
    REQUEST_TOKEN.scope(Some(token), fut).await
}

/// The token scoped to the current task, if any.
pub fn current_request_token() -> Option<String> {
    REQUEST_TOKEN.try_with(|t| t.clone()).ok().flatten()
}

/// Supplier that prefers the request-scoped token and falls back to a
/// wrapped supplier when no request scope is active.
pub struct RequestTokenSupplier {
    fallback: Option<SharedTokenSupplier>,
}

impl RequestTokenSupplier {
    /// Request-scope only; no fallback.
    pub fn new() -> Self {
        Self { fallback: None }
    }

    /// Fall back to `supplier` outside a request scope.
    pub fn with_fallback(supplier: SharedTokenSupplier) -> Self {
        Self {
            fallback: Some(supplier),
        }
    }
}

impl Default for RequestTokenSupplier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AccessTokenSupplier for RequestTokenSupplier {
    async fn access_token(&self) -> Result<String> {
        if let Some(token) = current_request_token() {
            return Ok(token);
        }
        match &self.fallback {
            Some(supplier) => supplier.access_token().await,
            None => Err(AuthError::NotAuthenticated),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedSupplier(&'static str);

    #[async_trait]
    impl AccessTokenSupplier for FixedSupplier {
        async fn access_token(&self) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    #[tokio::test]
    async fn test_no_scope_no_fallback() {
        let supplier = RequestTokenSupplier::new();
        let err = supplier.access_token().await.unwrap_err();
        assert!(matches!(err, AuthError::NotAuthenticated));
    }

    #[tokio::test]
    async fn test_scoped_token_preferred_over_fallback() {
        let supplier = RequestTokenSupplier::with_fallback(Arc::new(FixedSupplier("fallback")));

        let token = with_request_token("scoped".to_string(), async {
            supplier.access_token().await
        })
        .await
        .unwrap();
        assert_eq!(token, "scoped");

        let token = supplier.access_token().await.unwrap();
        assert_eq!(token, "fallback");
    }

    #[tokio::test]
    async fn test_concurrent_scopes_are_isolated() {
        let supplier = Arc::new(RequestTokenSupplier::new());

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let supplier = Arc::clone(&supplier);
                tokio::spawn(with_request_token(format!("token-{i}"), async move {
                    // Yield so the tasks interleave.
                    tokio::task::yield_now().await;
                    supplier.access_token().await.unwrap()
                }))
            })
            .collect();

        for (i, task) in tasks.into_iter().enumerate() {
            assert_eq!(task.await.unwrap(), format!("token-{i}"));
        }
    }

    #[tokio::test]
    async fn test_scope_is_dropped_after_future() {
        with_request_token("t".to_string(), async {}).await;
        assert!(current_request_token().is_none());
    }
}
