//! Multi-tenant credential-to-token exchange cache.
//!
//! The hosted deployment serves many distinct callers concurrently; each
//! presents a bearer credential that is exchanged (refresh grant) for a
//! short-lived backend access token. Results are cached per caller under
//! a one-way hash of the credential so one caller's token can never leak
//! to another, and so no map key, memory dump, or log line discloses the
//! raw credential.

use std::collections::HashMap;
use std::time::Instant;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use crate::credentials::now_millis;
use crate::discovery::discover;
use crate::error::{AuthError, Result};
use crate::provider::{GrantError, refresh_grant};

/// Refresh-ahead buffer for exchanged tokens (1 minute).
const EXCHANGE_BUFFER_MS: u64 = 60 * 1000;

/// Entry cap. The least-recently-used entry is evicted at capacity so
/// distinct-caller churn cannot grow the map without bound.
const MAX_ENTRIES: usize = 4096;

#[derive(Debug, Clone)]
struct ExchangeEntry {
    access_token: String,
    expires_at: u64,
    last_used: Instant,
}

/// Per-caller token cache for hosted deployments.
///
/// Explicitly constructed and injectable; tests run isolated instances.
/// The map lock is never held across I/O: exchange results are inserted
/// or removed whole, so readers never observe a half-written entry.
pub struct ExchangeCache {
    discovery_url: String,
    client_id: String,
    client_secret: Option<String>,
    http: reqwest::Client,
    entries: Mutex<HashMap<String, ExchangeEntry>>,
    max_entries: usize,
}

impl ExchangeCache {
    pub fn new(discovery_url: String, client_id: String, client_secret: Option<String>) -> Self {
        Self::with_client(discovery_url, client_id, client_secret, reqwest::Client::new())
    }

    /// Create with a custom HTTP client.
    pub fn with_client(
        discovery_url: String,
        client_id: String,
        client_secret: Option<String>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            discovery_url,
            client_id,
            client_secret,
            http,
            entries: Mutex::new(HashMap::new()),
            max_entries: MAX_ENTRIES,
        }
    }

    /// Override the entry cap.
    pub fn with_capacity(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// Resolve an inbound bearer credential to a backend access token.
    ///
    /// A cached token outside the refresh buffer returns immediately. On
    /// miss or near-expiry the credential is exchanged as a refresh grant;
    /// a provider 4xx rejection purges any stale entry and fails with
    /// [`AuthError::InvalidCredential`] (never cached, so the next
    /// resolve re-attempts); any other failure is
    /// [`AuthError::ExchangeFailed`].
    pub async fn resolve(&self, credential: &str) -> Result<String> {
        let key = hash_credential(credential);

        if let Some(token) = self.cached(&key) {
            return Ok(token);
        }

        let endpoints = discover(&self.http, &self.discovery_url).await?;

        match refresh_grant(
            &self.http,
            &endpoints.token_endpoint,
            &self.client_id,
            self.client_secret.as_deref(),
            credential,
        )
        .await
        {
            Ok(response) => {
                let entry = ExchangeEntry {
                    access_token: response.access_token.clone(),
                    expires_at: now_millis() + response.expires_in * 1000,
                    last_used: Instant::now(),
                };
                self.insert(key, entry);
                Ok(response.access_token)
            }
            Err(err @ GrantError::Rejected { .. }) if err.is_rejection() => {
                self.entries.lock().remove(&key);
                tracing::warn!(detail = %err, "credential exchange rejected, cache entry purged");
                Err(AuthError::InvalidCredential)
            }
            Err(err) => Err(AuthError::ExchangeFailed(err.to_string())),
        }
    }

    /// Live entry count. Expired-but-unreplaced entries are included;
    /// they are only replaced lazily on their next lookup.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    fn cached(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock();
        let entry = entries.get_mut(key)?;
        if now_millis() >= entry.expires_at.saturating_sub(EXCHANGE_BUFFER_MS) {
            return None;
        }
        entry.last_used = Instant::now();
        Some(entry.access_token.clone())
    }

    fn insert(&self, key: String, entry: ExchangeEntry) {
        let mut entries = self.entries.lock();
        if entries.len() >= self.max_entries && !entries.contains_key(&key) {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                entries.remove(&oldest);
                tracing::debug!("exchange cache at capacity, evicted least recently used entry");
            }
        }
        entries.insert(key, entry);
    }
}

/// One-way key derivation for the cache map.
pub fn hash_credential(credential: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(credential.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> ExchangeCache {
        ExchangeCache::new(
            "http://127.0.0.1:9/.well-known/openid-configuration".to_string(),
            "teller-server".to_string(),
            None,
        )
    }

    fn entry(token: &str, expires_at: u64) -> ExchangeEntry {
        ExchangeEntry {
            access_token: token.to_string(),
            expires_at,
            last_used: Instant::now(),
        }
    }

    #[test]
    fn test_hash_is_not_the_credential() {
        let hash = hash_credential("super-secret-bearer");
        assert_ne!(hash, "super-secret-bearer");
        assert!(!hash.contains("secret"));
        // SHA-256, URL-safe encoded without padding.
        assert_eq!(hash.len(), 43);
    }

    #[test]
    fn test_distinct_credentials_hash_distinctly() {
        assert_ne!(hash_credential("caller-a"), hash_credential("caller-b"));
    }

    #[test]
    fn test_cached_hit_within_buffer_is_stale() {
        let cache = cache();
        let key = hash_credential("caller");
        cache.insert(key.clone(), entry("tok", now_millis() + 30_000));

        // 30 s from expiry is inside the 1-minute buffer.
        assert!(cache.cached(&key).is_none());
    }

    #[test]
    fn test_cached_hit_outside_buffer() {
        let cache = cache();
        let key = hash_credential("caller");
        cache.insert(key.clone(), entry("tok", now_millis() + 10 * 60 * 1000));

        assert_eq!(cache.cached(&key).as_deref(), Some("tok"));
    }

    #[test]
    fn test_entries_isolated_per_key() {
        let cache = cache();
        let far = now_millis() + 10 * 60 * 1000;
        cache.insert(hash_credential("caller-a"), entry("token-a", far));
        cache.insert(hash_credential("caller-b"), entry("token-b", far));

        assert_eq!(
            cache.cached(&hash_credential("caller-a")).as_deref(),
            Some("token-a")
        );
        assert_eq!(
            cache.cached(&hash_credential("caller-b")).as_deref(),
            Some("token-b")
        );
    }

    #[test]
    fn test_capacity_evicts_least_recently_used() {
        let cache = cache().with_capacity(2);
        let far = now_millis() + 10 * 60 * 1000;

        cache.insert("a".to_string(), entry("token-a", far));
        std::thread::sleep(std::time::Duration::from_millis(5));
        cache.insert("b".to_string(), entry("token-b", far));

        // Touch "a" so "b" becomes the eviction candidate.
        std::thread::sleep(std::time::Duration::from_millis(5));
        {
            let mut entries = cache.entries.lock();
            entries.get_mut("a").unwrap().last_used = Instant::now();
        }

        cache.insert("c".to_string(), entry("token-c", far));

        assert_eq!(cache.len(), 2);
        let entries = cache.entries.lock();
        assert!(entries.contains_key("a"));
        assert!(entries.contains_key("c"));
        assert!(!entries.contains_key("b"));
    }

    #[tokio::test]
    async fn test_resolve_with_unreachable_provider() {
        let cache = cache();
        let err = cache.resolve("some-credential").await.unwrap_err();
        assert!(matches!(err, AuthError::DiscoveryUnavailable(_)));
        assert!(cache.is_empty());
    }
}
