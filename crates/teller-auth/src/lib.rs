//! OAuth 2.0 / OIDC token lifecycle for the teller wallet agent.
//!
//! Every outbound call teller makes to the wallet backend is authorized
//! by an access token obtained through this crate, in one of two modes:
//! a local process authenticates once via the interactive PKCE login and
//! refreshes through a single-flight token cache; a hosted server
//! exchanges each caller's bearer credential through a multi-tenant
//! cache and scopes the result to the inbound request.
//!
//! # Components
//!
//! - [`pkce`] — verifier/challenge/state generation (S256)
//! - [`discovery`] — provider endpoint resolution from the well-known document
//! - [`credentials`] — the persisted credential record and its store
//! - [`token_cache`] — single-tenant refresh-ahead cache with single-flight
//! - [`login`] — interactive flow with the loopback callback listener
//! - [`exchange_cache`] — per-caller token exchange for hosted deployments
//! - [`context`] — request-scoped token propagation and the supplier seam

pub mod context;
pub mod credentials;
pub mod discovery;
pub mod error;
pub mod exchange_cache;
pub mod login;
pub mod pkce;
pub mod provider;
pub mod token_cache;

pub use context::{
    AccessTokenSupplier, RequestTokenSupplier, SharedTokenSupplier, current_request_token,
    with_request_token,
};
pub use credentials::{AuthStatus, CredentialRecord, CredentialStore};
pub use discovery::{ProviderEndpoints, discover};
pub use error::{AuthError, Result};
pub use exchange_cache::ExchangeCache;
pub use login::{LoginConfig, LoginFlow, PendingLogins, StartedLogin};
pub use pkce::{PkceChallenge, generate_state};
pub use token_cache::TokenCache;
