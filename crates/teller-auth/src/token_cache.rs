//! Single-tenant access-token cache with refresh-ahead and single-flight.

use std::sync::Arc;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tokio::sync::Mutex;

use crate::credentials::{CredentialRecord, CredentialStore};
use crate::discovery::discover;
use crate::error::{AuthError, Result};
use crate::provider::refresh_grant;

/// Buffer before access-token expiry at which a refresh is triggered
/// instead of serving the cached token (2 minutes).
pub(crate) const REFRESH_BUFFER_MS: u64 = 2 * 60 * 1000;

type RefreshFuture = Shared<BoxFuture<'static, Result<String>>>;

/// Refresh-ahead cache over the credential store.
///
/// Explicitly constructed and injectable — tests instantiate isolated
/// caches per case instead of sharing process globals. Cloning shares the
/// underlying cache state.
#[derive(Clone)]
pub struct TokenCache {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    store: CredentialStore,
    http: reqwest::Client,
    slot: parking_lot::Mutex<Slot>,
    /// Single-flight coordination: at most one refresh in flight per
    /// process. Concurrent callers await the same shared future, so they
    /// all observe the same token or the same failure. This is the one
    /// intentional lock spanning I/O in this crate.
    inflight: Mutex<Option<RefreshFuture>>,
}

#[derive(Default)]
struct Slot {
    loaded: bool,
    creds: Option<CredentialRecord>,
}

impl TokenCache {
    pub fn new(store: CredentialStore) -> Self {
        Self::with_client(store, reqwest::Client::new())
    }

    /// Create with a custom HTTP client (shared connection pool, tests).
    pub fn with_client(store: CredentialStore, http: reqwest::Client) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                store,
                http,
                slot: parking_lot::Mutex::new(Slot::default()),
                inflight: Mutex::new(None),
            }),
        }
    }

    /// Current access token, refreshing ahead of expiry.
    ///
    /// A cached token outside the refresh buffer returns immediately with
    /// no I/O. A stale token triggers one refresh shared by every
    /// concurrent caller. No stored credentials fails with
    /// [`AuthError::NotAuthenticated`] without touching the network; a
    /// refresh token past expiry fails with [`AuthError::SessionExpired`].
    pub async fn access_token(&self) -> Result<String> {
        if let Some(token) = self.inner.fresh_token()? {
            return Ok(token);
        }

        let fut = {
            let mut inflight = self.inner.inflight.lock().await;
            if let Some(fut) = inflight.clone() {
                fut
            } else {
                // Re-check under the lock: a refresh that completed
                // between the fast path and here already renewed it.
                if let Some(token) = self.inner.fresh_token()? {
                    return Ok(token);
                }
                let inner = Arc::clone(&self.inner);
                let fut = async move {
                    let result = inner.refresh_once().await;
                    // The slot holds this future until it completes;
                    // clearing here lets the next stale read start a
                    // fresh attempt instead of re-observing this one.
                    *inner.inflight.lock().await = None;
                    result
                }
                .boxed()
                .shared();
                *inflight = Some(fut.clone());
                fut
            }
        };

        fut.await
    }

    /// Drop the in-memory credential slot. The next call re-reads the
    /// store (logout support).
    pub fn invalidate(&self) {
        let mut slot = self.inner.slot.lock();
        *slot = Slot::default();
    }

    /// The credential store backing this cache.
    pub fn store(&self) -> &CredentialStore {
        &self.inner.store
    }
}

impl CacheInner {
    /// Cached token if present and outside the refresh buffer.
    ///
    /// `Ok(None)` means a refresh is needed. No stored credentials at all
    /// is `NotAuthenticated`.
    fn fresh_token(&self) -> Result<Option<String>> {
        let mut slot = self.slot.lock();
        if !slot.loaded {
            slot.creds = self.store.load()?;
            slot.loaded = true;
        }
        match &slot.creds {
            None => Err(AuthError::NotAuthenticated),
            Some(creds) if !creds.access_token_stale(REFRESH_BUFFER_MS) => {
                Ok(Some(creds.access_token.clone()))
            }
            Some(_) => Ok(None),
        }
    }

    async fn refresh_once(&self) -> Result<String> {
        let creds = {
            let slot = self.slot.lock();
            slot.creds.clone().ok_or(AuthError::NotAuthenticated)?
        };

        // Checked before any network call: an expired refresh token has
        // no automatic recovery.
        if creds.refresh_token_expired() {
            return Err(AuthError::SessionExpired);
        }

        let endpoints = discover(&self.http, &creds.discovery_url).await?;

        let response = refresh_grant(
            &self.http,
            &endpoints.token_endpoint,
            &creds.client_id,
            creds.client_secret.as_deref(),
            &creds.refresh_token,
        )
        .await
        .map_err(|e| AuthError::RefreshFailed(e.to_string()))?;

        let record = CredentialRecord::from_token_response(
            &response,
            Some(&creds.refresh_token),
            &creds.discovery_url,
            &creds.client_id,
            creds.client_secret.as_deref(),
        )?;

        // Persist first, then swap the in-memory record: a failed write
        // leaves both the store and the cache on the previous credentials.
        self.store.save(&record)?;
        let token = record.access_token.clone();
        {
            let mut slot = self.slot.lock();
            slot.creds = Some(record);
            slot.loaded = true;
        }
        tracing::info!("access token refreshed");
        Ok(token)
    }
}
