//! Credential store contract and its HTTP-backed implementation.
//!
//! The connection manager reads credentials through [`CredentialStore`]
//! and never persists them itself. [`HttpCredentialStore`] keeps the
//! current pair in memory, optionally mirrors it to a JSON session file,
//! and mints new pairs via the auth API's refresh endpoint.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use campus_core::credential::CredentialPair;
use serde::Serialize;

/// Auth API base URL used when `AUTH_API_URL` is unset.
pub const DEFAULT_AUTH_API_URL: &str = "http://localhost:5000/api";

/// Errors from credential refresh and session persistence.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The refresh credential is invalid, expired or revoked.
    #[error("Refresh credential rejected ({status}): {body}")]
    Rejected { status: u16, body: String },

    /// The auth API returned any other non-2xx status.
    #[error("Auth API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// The HTTP request itself failed (network, DNS, TLS, decode).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Reading or writing the session file failed.
    #[error("Session file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The session file does not contain a credential pair.
    #[error("Malformed session file: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Holder of the session's access and refresh credentials.
///
/// Implementations own their consistency; callers treat each method as
/// atomic.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Current access credential, if logged in.
    fn access_credential(&self) -> Option<String>;

    /// Current refresh credential, if logged in.
    fn refresh_credential(&self) -> Option<String>;

    /// Exchange `refresh_credential` for a new pair. Does not store it.
    async fn refresh(&self, refresh_credential: &str) -> Result<CredentialPair, AuthError>;

    /// Replace the stored pair and mark the session authenticated.
    fn set_credentials(&self, pair: CredentialPair);

    /// Remove all stored credentials.
    fn clear(&self);

    /// Clear credentials and mark the session unauthenticated.
    fn logout(&self);

    /// Whether a user is currently logged in.
    fn is_authenticated(&self) -> bool;
}

/// Credential store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Base URL of the REST auth API.
    pub api_url: String,
    /// Where to persist the credential pair, if anywhere.
    pub session_file: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_AUTH_API_URL.to_string(),
            session_file: None,
        }
    }
}

impl StoreConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var        | Default                      |
    /// |----------------|------------------------------|
    /// | `AUTH_API_URL` | `http://localhost:5000/api`  |
    /// | `SESSION_FILE` | unset (memory only)          |
    pub fn from_env() -> Self {
        let api_url = std::env::var("AUTH_API_URL")
            .ok()
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_AUTH_API_URL.to_string());

        let session_file = std::env::var("SESSION_FILE")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        Self {
            api_url,
            session_file,
        }
    }
}

/// Request body for `POST /auth/refresh`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// [`CredentialStore`] backed by the REST auth API.
#[derive(Debug)]
pub struct HttpCredentialStore {
    client: reqwest::Client,
    config: StoreConfig,
    session: RwLock<Option<CredentialPair>>,
    authenticated: AtomicBool,
}

impl HttpCredentialStore {
    /// Create an empty (logged-out) store.
    pub fn new(config: StoreConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    /// Create an empty store reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, config: StoreConfig) -> Self {
        Self {
            client,
            config,
            session: RwLock::new(None),
            authenticated: AtomicBool::new(false),
        }
    }

    /// Create a store and restore the pair from the session file, if one
    /// is configured and present.
    pub fn load(config: StoreConfig) -> Result<Self, AuthError> {
        let store = Self::new(config);

        if let Some(path) = &store.config.session_file {
            match std::fs::read(path) {
                Ok(bytes) => {
                    let pair: CredentialPair = serde_json::from_slice(&bytes)?;
                    tracing::info!(path = %path.display(), "Restored session from file");
                    store.replace(Some(pair));
                    store.authenticated.store(true, Ordering::SeqCst);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::debug!(path = %path.display(), "No session file yet");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(store)
    }

    fn refresh_url(&self) -> String {
        format!("{}/auth/refresh", self.config.api_url)
    }

    fn replace(&self, pair: Option<CredentialPair>) {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = pair;
    }

    fn read<T>(&self, f: impl FnOnce(&CredentialPair) -> T) -> Option<T> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(f)
    }

    /// Mirror the in-memory pair to the session file. Failures are logged;
    /// the in-memory session stays authoritative.
    fn persist(&self) {
        let Some(path) = &self.config.session_file else {
            return;
        };

        let result = match self.read(|pair| serde_json::to_vec(pair)) {
            Some(Ok(bytes)) => std::fs::write(path, bytes),
            Some(Err(e)) => {
                tracing::error!(error = %e, "Failed to encode session");
                return;
            }
            None => match std::fs::remove_file(path) {
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                other => other,
            },
        };

        if let Err(e) = result {
            tracing::warn!(path = %path.display(), error = %e, "Failed to persist session");
        }
    }
}

#[async_trait]
impl CredentialStore for HttpCredentialStore {
    fn access_credential(&self) -> Option<String> {
        self.read(|pair| pair.access_token.clone())
    }

    fn refresh_credential(&self) -> Option<String> {
        self.read(|pair| pair.refresh_token.clone())
    }

    async fn refresh(&self, refresh_credential: &str) -> Result<CredentialPair, AuthError> {
        let response = self
            .client
            .post(self.refresh_url())
            .json(&RefreshRequest {
                refresh_token: refresh_credential,
            })
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let pair = response.json::<CredentialPair>().await?;
            tracing::debug!("Credential pair refreshed");
            return Ok(pair);
        }

        let body = response.text().await.unwrap_or_default();
        let status = status.as_u16();
        if status == 401 || status == 403 {
            Err(AuthError::Rejected { status, body })
        } else {
            Err(AuthError::Api { status, body })
        }
    }

    fn set_credentials(&self, pair: CredentialPair) {
        self.replace(Some(pair));
        self.authenticated.store(true, Ordering::SeqCst);
        self.persist();
    }

    fn clear(&self) {
        self.replace(None);
        self.persist();
    }

    fn logout(&self) {
        self.clear();
        self.authenticated.store(false, Ordering::SeqCst);
        tracing::info!("Session logged out");
    }

    fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst) && self.read(|_| ()).is_some()
    }
}
