//! Persisted session state and the session manager that owns it.
//!
//! Every component that issues requests shares one [`SessionManager`]
//! through an `Arc`. It is the only path to the stored credential pair, and
//! it carries the guard that lets concurrent requests share a single
//! renewal.

use crate::{
    claims::{self, Claims, CredentialPair},
    config::{ClientConfig, RefreshPolicy},
    errors::SessionError,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::MutexGuard;

/// Storage key of the access token
pub const ACCESS_TOKEN_KEY: &str = "access_token";
/// Storage key of the refresh token
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// Tokens currently held in storage; either may be missing or expired away
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionTokens {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl SessionTokens {
    /// No credential of any kind is stored
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none()
    }
}

/// Storage lifetime of each key, independent of the token's own `exp`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageExpiry {
    pub access: Duration,
    pub refresh: Duration,
}

impl StorageExpiry {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            access: Duration::days(config.access_token_days),
            refresh: Duration::days(config.refresh_token_days),
        }
    }
}

impl Default for StorageExpiry {
    fn default() -> Self {
        Self {
            access: Duration::days(1),
            refresh: Duration::days(7),
        }
    }
}

/// Backing storage for the credential pair
pub trait SessionStore: Send + Sync {
    /// Read the stored tokens, dropping any whose storage lifetime has passed
    fn load(&self) -> Result<SessionTokens, SessionError>;

    /// Overwrite the stored pair
    fn save(&self, pair: &CredentialPair) -> Result<(), SessionError>;

    /// Delete both tokens
    fn clear(&self) -> Result<(), SessionError>;
}

/// One stored value and the instant it stops being readable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct StoredValue {
    value: String,
    expires_at: DateTime<Utc>,
}

impl StoredValue {
    fn new(value: &str, lifetime: Duration, now: DateTime<Utc>) -> Self {
        Self {
            value: value.to_string(),
            expires_at: now
                .checked_add_signed(lifetime)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    fn live(self, now: DateTime<Utc>) -> Option<String> {
        (now < self.expires_at).then_some(self.value)
    }
}

/// On-disk layout: one entry per fixed key
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredSession {
    #[serde(rename = "access_token", default, skip_serializing_if = "Option::is_none")]
    access: Option<StoredValue>,
    #[serde(rename = "refresh_token", default, skip_serializing_if = "Option::is_none")]
    refresh: Option<StoredValue>,
}

impl StoredSession {
    fn from_pair(pair: &CredentialPair, expiry: StorageExpiry, now: DateTime<Utc>) -> Self {
        Self {
            access: Some(StoredValue::new(&pair.access_token, expiry.access, now)),
            refresh: Some(StoredValue::new(&pair.refresh_token, expiry.refresh, now)),
        }
    }

    fn tokens(&self, now: DateTime<Utc>) -> SessionTokens {
        SessionTokens {
            access_token: self.access.clone().and_then(|v| v.live(now)),
            refresh_token: self.refresh.clone().and_then(|v| v.live(now)),
        }
    }
}

/// Process-local store; the session ends with the process
#[derive(Debug, Default)]
pub struct MemoryStore {
    expiry: StorageExpiry,
    state: Mutex<StoredSession>,
}

impl MemoryStore {
    pub fn new(expiry: StorageExpiry) -> Self {
        Self {
            expiry,
            state: Mutex::new(StoredSession::default()),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, StoredSession> {
        // A panic while holding the lock cannot leave a half-written pair
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SessionStore for MemoryStore {
    fn load(&self) -> Result<SessionTokens, SessionError> {
        Ok(self.state().tokens(Utc::now()))
    }

    fn save(&self, pair: &CredentialPair) -> Result<(), SessionError> {
        *self.state() = StoredSession::from_pair(pair, self.expiry, Utc::now());
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        *self.state() = StoredSession::default();
        Ok(())
    }
}

/// JSON file store, shared by every process pointing at the same path
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    expiry: StorageExpiry,
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>, expiry: StorageExpiry) -> Self {
        Self {
            path: path.into(),
            expiry,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<StoredSession, SessionError> {
        match std::fs::read(&self.path) {
            Ok(bytes) if bytes.is_empty() => Ok(StoredSession::default()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoredSession::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, session: &StoredSession) -> Result<(), SessionError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(session)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl SessionStore for FileStore {
    fn load(&self) -> Result<SessionTokens, SessionError> {
        Ok(self.read()?.tokens(Utc::now()))
    }

    fn save(&self, pair: &CredentialPair) -> Result<(), SessionError> {
        self.write(&StoredSession::from_pair(pair, self.expiry, Utc::now()))
    }

    fn clear(&self) -> Result<(), SessionError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Owner of the persisted credential pair
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    policy: RefreshPolicy,
    refresh_guard: tokio::sync::Mutex<()>,
}

impl SessionManager {
    /// Create a session manager over `store`
    pub fn new(store: Arc<dyn SessionStore>, policy: RefreshPolicy) -> Self {
        Self {
            store,
            policy,
            refresh_guard: tokio::sync::Mutex::new(()),
        }
    }

    /// Session manager backed by the store the configuration asks for
    pub fn from_config(config: &ClientConfig) -> Self {
        let expiry = StorageExpiry::from_config(config);
        let store: Arc<dyn SessionStore> = match &config.session_file {
            Some(path) => Arc::new(FileStore::new(path.clone(), expiry)),
            None => Arc::new(MemoryStore::new(expiry)),
        };
        Self::new(store, config.refresh_policy)
    }

    pub fn policy(&self) -> RefreshPolicy {
        self.policy
    }

    /// Currently stored tokens.
    ///
    /// A storage failure reads as an empty session so that request
    /// interception never fails.
    pub fn tokens(&self) -> SessionTokens {
        self.store.load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to read session state, treating as logged out");
            SessionTokens::default()
        })
    }

    /// Persist a freshly issued pair (login, registration, renewal)
    pub fn set_tokens(&self, pair: &CredentialPair) -> Result<(), SessionError> {
        self.store.save(pair)?;
        tracing::debug!("Session tokens stored");
        Ok(())
    }

    /// Forget the session (logout)
    pub fn clear(&self) -> Result<(), SessionError> {
        self.store.clear()?;
        tracing::debug!("Session cleared");
        Ok(())
    }

    /// Identity of the logged-in user, decoded from the stored access token
    pub fn user(&self) -> Option<Claims> {
        let access = self.tokens().access_token?;
        claims::decode(&access).ok()
    }

    /// Serialize renewals under the single-flight policy.
    ///
    /// Returns `None` when every request renews on its own.
    pub(crate) async fn refresh_guard(&self) -> Option<MutexGuard<'_, ()>> {
        match self.policy {
            RefreshPolicy::SingleFlight => Some(self.refresh_guard.lock().await),
            RefreshPolicy::PerRequest => None,
        }
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
