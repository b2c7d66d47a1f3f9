//! Credential record and its on-disk store.
//!
//! One record per installation. The file is written atomically
//! (temp sibling + rename) with owner-only permissions; confidentiality
//! relies entirely on those permissions — the contents are not encrypted.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AuthError, Result};
use crate::provider::TokenResponse;
use crate::token_cache::REFRESH_BUFFER_MS;

/// Credential file name within the teller config directory.
pub const CREDENTIALS_FILE: &str = "credentials.json";

/// Assumed refresh-token lifetime when the provider omits
/// `refresh_expires_in` (30 days).
pub const DEFAULT_REFRESH_TTL_MS: u64 = 30 * 24 * 60 * 60 * 1000;

/// Current time as epoch milliseconds.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// One installation's tokens plus the provider coordinates used to obtain
/// them.
///
/// Access and refresh expiries are tracked independently; providers make
/// no ordering guarantee between the two.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub access_token: String,
    pub refresh_token: String,
    /// Absolute access-token expiry, epoch milliseconds.
    pub access_expires_at: u64,
    /// Absolute refresh-token expiry, epoch milliseconds.
    pub refresh_expires_at: u64,
    pub discovery_url: String,
    pub client_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub created_at: String,
}

impl CredentialRecord {
    /// Build a record from a token response, carrying the provider
    /// coordinates forward. The previous refresh token is kept when the
    /// provider omits a new one.
    pub fn from_token_response(
        response: &TokenResponse,
        previous_refresh_token: Option<&str>,
        discovery_url: &str,
        client_id: &str,
        client_secret: Option<&str>,
    ) -> Result<Self> {
        let refresh_token = response
            .refresh_token
            .clone()
            .or_else(|| previous_refresh_token.map(str::to_string))
            .ok_or_else(|| {
                AuthError::Serialization("token response contained no refresh token".to_string())
            })?;

        let now = now_millis();
        let refresh_ttl_ms = response
            .refresh_expires_in
            .map(|secs| secs * 1000)
            .unwrap_or(DEFAULT_REFRESH_TTL_MS);

        Ok(Self {
            access_token: response.access_token.clone(),
            refresh_token,
            access_expires_at: now + response.expires_in * 1000,
            refresh_expires_at: now + refresh_ttl_ms,
            discovery_url: discovery_url.to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.map(str::to_string),
            created_at: chrono::Utc::now().to_rfc3339(),
        })
    }

    /// Whether the access token is expired or within `buffer_ms` of expiry.
    pub fn access_token_stale(&self, buffer_ms: u64) -> bool {
        now_millis() >= self.access_expires_at.saturating_sub(buffer_ms)
    }

    /// Whether the refresh token is past its expiry.
    pub fn refresh_token_expired(&self) -> bool {
        now_millis() >= self.refresh_expires_at
    }
}

/// Stored credential state, reported without touching the network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AuthStatus {
    NotAuthenticated,
    /// Access token valid and outside the refresh buffer.
    Valid { expires_in_secs: u64 },
    /// Access token stale, but the refresh token can still renew it.
    Refreshable,
    /// Refresh token past expiry; interactive login required.
    SessionExpired,
}

/// On-disk store for the single credential record.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// Store rooted at the given directory.
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(CREDENTIALS_FILE),
        }
    }

    /// Store at an explicit file path.
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    /// Path of the credential file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a credential file exists.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Serialize and write the record, replacing any previous one.
    ///
    /// Writes to a temp sibling and renames over the target so readers
    /// never observe a partial record. The file is restricted to owner
    /// read/write and the containing directory to owner-only access.
    pub fn save(&self, record: &CredentialRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AuthError::Storage(format!("failed to create credential directory: {e}"))
            })?;
            restrict_mode(parent, 0o700)?;
        }

        let json = serde_json::to_string_pretty(record)
            .map_err(|e| AuthError::Serialization(format!("failed to serialize credentials: {e}")))?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .map_err(|e| AuthError::Storage(format!("failed to write credential file: {e}")))?;
        restrict_mode(&tmp, 0o600)?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| AuthError::Storage(format!("failed to replace credential file: {e}")))?;

        tracing::debug!(path = %self.path.display(), "credentials saved");
        Ok(())
    }

    /// Load the stored record, if any.
    pub fn load(&self) -> Result<Option<CredentialRecord>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| AuthError::Storage(format!("failed to read credential file: {e}")))?;

        let record: CredentialRecord = serde_json::from_str(&content)
            .map_err(|e| AuthError::Serialization(format!("failed to parse credential file: {e}")))?;

        Ok(Some(record))
    }

    /// Remove the credential file. Idempotent.
    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::info!("credentials removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AuthError::Storage(format!(
                "failed to remove credential file: {e}"
            ))),
        }
    }

    /// Report the stored credential state without any network call.
    pub fn status(&self) -> Result<AuthStatus> {
        let Some(record) = self.load()? else {
            return Ok(AuthStatus::NotAuthenticated);
        };
        if record.refresh_token_expired() {
            return Ok(AuthStatus::SessionExpired);
        }
        if record.access_token_stale(REFRESH_BUFFER_MS) {
            return Ok(AuthStatus::Refreshable);
        }
        Ok(AuthStatus::Valid {
            expires_in_secs: record.access_expires_at.saturating_sub(now_millis()) / 1000,
        })
    }
}

#[cfg(unix)]
fn restrict_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .map_err(|e| AuthError::Storage(format!("failed to set permissions: {e}")))
}

#[cfg(not(unix))]
fn restrict_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(access_expires_at: u64, refresh_expires_at: u64) -> CredentialRecord {
        CredentialRecord {
            access_token: "at".to_string(),
            refresh_token: "rt".to_string(),
            access_expires_at,
            refresh_expires_at,
            discovery_url: "https://id.example.com/.well-known/openid-configuration".to_string(),
            client_id: "teller-cli".to_string(),
            client_secret: None,
            created_at: String::new(),
        }
    }

    #[test]
    fn test_save_load_round_trip() {
        let temp = tempdir().unwrap();
        let store = CredentialStore::new(temp.path());

        let saved = record(now_millis() + 3_600_000, now_millis() + 86_400_000);
        store.save(&saved).unwrap();
        assert!(store.exists());

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.access_token, "at");
        assert_eq!(loaded.refresh_token, "rt");
        assert_eq!(loaded.client_id, "teller-cli");
    }

    #[test]
    fn test_load_absent_returns_none() {
        let temp = tempdir().unwrap();
        let store = CredentialStore::new(temp.path());
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_clear_is_idempotent() {
        let temp = tempdir().unwrap();
        let store = CredentialStore::new(temp.path());

        store
            .save(&record(now_millis() + 1000, now_millis() + 1000))
            .unwrap();
        store.clear().unwrap();
        assert!(!store.exists());
        store.clear().unwrap();
    }

    #[test]
    fn test_save_leaves_no_temp_file() {
        let temp = tempdir().unwrap();
        let store = CredentialStore::new(temp.path());
        store
            .save(&record(now_millis() + 1000, now_millis() + 1000))
            .unwrap();

        let names: Vec<String> = std::fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![CREDENTIALS_FILE.to_string()]);
    }

    #[cfg(unix)]
    #[test]
    fn test_save_restricts_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempdir().unwrap();
        let dir = temp.path().join("teller");
        let store = CredentialStore::new(&dir);
        store
            .save(&record(now_millis() + 1000, now_millis() + 1000))
            .unwrap();

        let file_mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(file_mode & 0o777, 0o600);

        let dir_mode = std::fs::metadata(&dir).unwrap().permissions().mode();
        assert_eq!(dir_mode & 0o777, 0o700);
    }

    #[test]
    fn test_expiry_checks_are_independent() {
        let now = now_millis();

        // Access token long dead, refresh token still alive.
        let stale_access = record(now.saturating_sub(1000), now + 86_400_000);
        assert!(stale_access.access_token_stale(0));
        assert!(!stale_access.refresh_token_expired());

        // Refresh expiry before access expiry is legal.
        let odd_provider = record(now + 3_600_000, now.saturating_sub(1000));
        assert!(!odd_provider.access_token_stale(0));
        assert!(odd_provider.refresh_token_expired());
    }

    #[test]
    fn test_access_token_stale_respects_buffer() {
        let now = now_millis();
        let expiring = record(now + 60_000, now + 86_400_000);
        assert!(expiring.access_token_stale(2 * 60 * 1000));
        assert!(!expiring.access_token_stale(0));
    }

    #[test]
    fn test_from_token_response_keeps_previous_refresh_token() {
        let response = crate::provider::TokenResponse {
            access_token: "new-at".to_string(),
            refresh_token: None,
            expires_in: 300,
            refresh_expires_in: None,
            token_type: Some("Bearer".to_string()),
            scope: None,
        };

        let record = CredentialRecord::from_token_response(
            &response,
            Some("old-rt"),
            "https://id.example.com/.well-known/openid-configuration",
            "teller-cli",
            None,
        )
        .unwrap();

        assert_eq!(record.access_token, "new-at");
        assert_eq!(record.refresh_token, "old-rt");
        assert!(record.access_expires_at > now_millis());
        // Default refresh TTL applied when the provider omits it.
        assert!(record.refresh_expires_at >= now_millis() + DEFAULT_REFRESH_TTL_MS - 5000);
    }

    #[test]
    fn test_from_token_response_without_any_refresh_token() {
        let response = crate::provider::TokenResponse {
            access_token: "at".to_string(),
            refresh_token: None,
            expires_in: 300,
            refresh_expires_in: None,
            token_type: None,
            scope: None,
        };

        let err =
            CredentialRecord::from_token_response(&response, None, "https://x", "c", None)
                .unwrap_err();
        assert!(matches!(err, AuthError::Serialization(_)));
    }

    #[test]
    fn test_status_reporting() {
        let temp = tempdir().unwrap();
        let store = CredentialStore::new(temp.path());
        let now = now_millis();

        assert_eq!(store.status().unwrap(), AuthStatus::NotAuthenticated);

        store.save(&record(now + 3_600_000, now + 86_400_000)).unwrap();
        assert!(matches!(store.status().unwrap(), AuthStatus::Valid { .. }));

        store.save(&record(now + 60_000, now + 86_400_000)).unwrap();
        assert_eq!(store.status().unwrap(), AuthStatus::Refreshable);

        store.save(&record(now + 60_000, now.saturating_sub(1))).unwrap();
        assert_eq!(store.status().unwrap(), AuthStatus::SessionExpired);
    }
}
