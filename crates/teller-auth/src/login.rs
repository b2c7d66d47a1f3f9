//! Interactive browser login.
//!
//! Authorization-code flow with PKCE: discover the provider, hand the
//! authorization URL to the user's browser, receive the redirect on a
//! short-lived loopback listener, exchange the code, persist the result.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use crate::credentials::{CredentialRecord, CredentialStore};
use crate::discovery::{ProviderEndpoints, discover};
use crate::error::{AuthError, Result};
use crate::pkce::{PkceChallenge, generate_state};
use crate::provider::exchange_code;

/// How long one pending login may wait for its callback before passive
/// sweep discards it (10 minutes).
const PENDING_LOGIN_TTL: Duration = Duration::from_secs(10 * 60);

/// Overall bound on the wait for a provider callback (5 minutes).
const CALLBACK_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Path the provider redirects back to on the loopback listener.
const CALLBACK_PATH: &str = "/callback";

/// Provider coordinates and client registration for a login.
#[derive(Debug, Clone)]
pub struct LoginConfig {
    pub discovery_url: String,
    pub client_id: String,
    pub client_secret: Option<String>,
    pub scopes: Vec<String>,
    /// Fixed loopback port the registered redirect URI points at.
    pub callback_port: u16,
    /// Print the authorization URL instead of opening a browser.
    pub no_browser: bool,
}

#[derive(Debug, Clone)]
struct PendingLogin {
    verifier: String,
    created_at: Instant,
}

/// In-memory registry of pending logins, keyed by state value.
///
/// The CLI holds one at a time; a hosted login page keys many concurrent
/// attempts independently. Entries past their TTL are swept on each
/// access to bound growth. Never persisted.
#[derive(Default)]
pub struct PendingLogins {
    inner: parking_lot::Mutex<HashMap<String, PendingLogin>>,
}

impl PendingLogins {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&self, state: String, verifier: String) {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        inner.retain(|_, p| now.duration_since(p.created_at) <= PENDING_LOGIN_TTL);
        inner.insert(
            state,
            PendingLogin {
                verifier,
                created_at: now,
            },
        );
    }

    /// Consume the pending login matching `state`, if present and
    /// unexpired. Each entry is consumed at most once.
    fn consume(&self, state: &str) -> Option<PendingLogin> {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        inner.retain(|_, p| now.duration_since(p.created_at) <= PENDING_LOGIN_TTL);
        inner.remove(state)
    }

    /// Number of pending attempts (post-sweep count not guaranteed).
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

/// Query parameters the provider may send to the callback.
#[derive(Debug, Deserialize)]
struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// What one callback resolved to: the code/verifier pair to exchange, or
/// a terminal flow error.
type CallbackOutcome = std::result::Result<(String, String), AuthError>;

struct CallbackState {
    pending: Arc<PendingLogins>,
    /// Taken by the first callback; later hits get a generic response.
    outcome_tx: parking_lot::Mutex<Option<oneshot::Sender<CallbackOutcome>>>,
}

/// A login attempt whose loopback listener is up and waiting.
pub struct StartedLogin {
    authorize_url: String,
    redirect_uri: String,
    state: String,
    callback_addr: SocketAddr,
    endpoints: ProviderEndpoints,
    outcome_rx: oneshot::Receiver<CallbackOutcome>,
    shutdown_tx: oneshot::Sender<()>,
    server: tokio::task::JoinHandle<()>,
}

impl StartedLogin {
    /// The authorization URL to hand to the user's browser.
    pub fn authorize_url(&self) -> &str {
        &self.authorize_url
    }

    /// The state value issued for this attempt.
    pub fn state(&self) -> &str {
        &self.state
    }

    /// Address the loopback listener is bound to.
    pub fn callback_addr(&self) -> SocketAddr {
        self.callback_addr
    }
}

/// The interactive login flow.
///
/// Each step's failure is terminal for the attempt; nothing here retries.
pub struct LoginFlow {
    config: LoginConfig,
    store: CredentialStore,
    pending: Arc<PendingLogins>,
    http: reqwest::Client,
    callback_timeout: Duration,
}

impl LoginFlow {
    pub fn new(config: LoginConfig, store: CredentialStore) -> Self {
        Self {
            config,
            store,
            pending: Arc::new(PendingLogins::new()),
            http: reqwest::Client::new(),
            callback_timeout: CALLBACK_TIMEOUT,
        }
    }

    /// Override the callback wait bound.
    pub fn with_callback_timeout(mut self, timeout: Duration) -> Self {
        self.callback_timeout = timeout;
        self
    }

    /// Run the whole flow: start the listener, hand off to the browser,
    /// wait for the callback, exchange the code, persist the record.
    pub async fn login(&self) -> Result<CredentialRecord> {
        let started = self.start().await?;

        if self.config.no_browser {
            println!(
                "Open this URL in your browser to sign in:\n\n  {}\n",
                started.authorize_url()
            );
        } else if open_browser(started.authorize_url()).is_err() {
            println!(
                "Could not open a browser automatically. Open this URL to sign in:\n\n  {}\n",
                started.authorize_url()
            );
        }

        self.finish(started).await
    }

    /// Discover the provider, register the pending attempt, and bring up
    /// the loopback listener.
    pub async fn start(&self) -> Result<StartedLogin> {
        let endpoints = discover(&self.http, &self.config.discovery_url).await?;

        let pkce = PkceChallenge::generate();
        let state = generate_state();
        self.pending.insert(state.clone(), pkce.verifier.clone());

        let bind_addr: SocketAddr = ([127, 0, 0, 1], self.config.callback_port).into();
        let listener = TcpListener::bind(bind_addr)
            .await
            .map_err(|e| AuthError::Listener(format!("failed to bind {bind_addr}: {e}")))?;
        let callback_addr = listener
            .local_addr()
            .map_err(|e| AuthError::Listener(e.to_string()))?;

        let redirect_uri = format!("http://localhost:{}{}", callback_addr.port(), CALLBACK_PATH);
        let authorize_url = build_authorization_url(
            &endpoints.authorization_endpoint,
            &self.config,
            &pkce.challenge,
            &state,
            &redirect_uri,
        );

        let (outcome_tx, outcome_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let callback_state = Arc::new(CallbackState {
            pending: Arc::clone(&self.pending),
            outcome_tx: parking_lot::Mutex::new(Some(outcome_tx)),
        });

        let router = callback_router(callback_state);
        let server = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        tracing::debug!(addr = %callback_addr, "login callback listener started");

        Ok(StartedLogin {
            authorize_url,
            redirect_uri,
            state,
            callback_addr,
            endpoints,
            outcome_rx,
            shutdown_tx,
            server,
        })
    }

    /// Wait for the callback, tear the listener down, exchange the code,
    /// and persist the credential record.
    pub async fn finish(&self, started: StartedLogin) -> Result<CredentialRecord> {
        let StartedLogin {
            redirect_uri,
            endpoints,
            outcome_rx,
            shutdown_tx,
            server,
            ..
        } = started;

        let outcome = match tokio::time::timeout(self.callback_timeout, outcome_rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(AuthError::Listener(
                "callback listener closed unexpectedly".to_string(),
            )),
            Err(_) => Err(AuthError::LoginTimedOut),
        };

        // Stop accepting connections before anything else, success or not.
        let _ = shutdown_tx.send(());
        let _ = server.await;

        let (code, verifier) = outcome?;

        let response = exchange_code(
            &self.http,
            &endpoints.token_endpoint,
            &self.config.client_id,
            self.config.client_secret.as_deref(),
            &code,
            &redirect_uri,
            &verifier,
        )
        .await
        .map_err(|e| AuthError::ExchangeFailed(e.to_string()))?;

        let record = CredentialRecord::from_token_response(
            &response,
            None,
            &self.config.discovery_url,
            &self.config.client_id,
            self.config.client_secret.as_deref(),
        )?;
        self.store.save(&record)?;

        tracing::info!("login complete, credentials persisted");
        Ok(record)
    }
}

fn callback_router(state: Arc<CallbackState>) -> Router {
    Router::new()
        .route(CALLBACK_PATH, get(handle_callback))
        .fallback(handle_not_found)
        .with_state(state)
}

async fn handle_not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "not found")
}

async fn handle_callback(
    State(state): State<Arc<CallbackState>>,
    Query(params): Query<CallbackParams>,
) -> impl IntoResponse {
    // First callback wins; the flow is already tearing the listener down
    // by the time a second one could land.
    let Some(tx) = state.outcome_tx.lock().take() else {
        return (StatusCode::GONE, "login already completed".to_string());
    };

    let outcome = evaluate_callback(&state.pending, params);
    let body = match &outcome {
        Ok(_) => "Signed in. You can close this tab and return to the terminal.".to_string(),
        Err(e) => format!("Login failed: {e}"),
    };
    let _ = tx.send(outcome);

    (StatusCode::OK, body)
}

fn evaluate_callback(pending: &PendingLogins, params: CallbackParams) -> CallbackOutcome {
    // State binding comes first: an unknown state must never reach the
    // token exchange.
    let Some(state) = params.state.as_deref() else {
        return Err(AuthError::StateMismatch);
    };
    let Some(pending_login) = pending.consume(state) else {
        return Err(AuthError::StateMismatch);
    };

    if let Some(error) = params.error {
        let detail = match params.error_description {
            Some(description) => format!("{error}: {description}"),
            None => error,
        };
        return Err(AuthError::ExchangeFailed(detail));
    }

    let Some(code) = params.code else {
        return Err(AuthError::ExchangeFailed(
            "provider callback carried no authorization code".to_string(),
        ));
    };

    Ok((code, pending_login.verifier))
}

fn build_authorization_url(
    authorization_endpoint: &str,
    config: &LoginConfig,
    challenge: &str,
    state: &str,
    redirect_uri: &str,
) -> String {
    let scope = config.scopes.join(" ");
    let params = [
        ("response_type", "code"),
        ("client_id", config.client_id.as_str()),
        ("redirect_uri", redirect_uri),
        ("scope", scope.as_str()),
        ("code_challenge", challenge),
        ("code_challenge_method", "S256"),
        ("state", state),
    ];

    let query = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");

    let separator = if authorization_endpoint.contains('?') {
        '&'
    } else {
        '?'
    };
    format!("{authorization_endpoint}{separator}{query}")
}

/// Hand a URL to the platform's default browser.
fn open_browser(url: &str) -> std::io::Result<()> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open").arg(url).status()?;
    }
    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open").arg(url).status()?;
    }
    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/C", "start", url])
            .status()?;
    }
    let _ = url;
    Ok(())
}
