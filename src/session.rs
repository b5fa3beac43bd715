//! Session lifecycle: load, validate, create and persist.
//!
//! Sessions live in `<session_dir>/<account>_session.json`. A persisted session
//! that cannot be restored is deleted and replaced by a fresh login.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::error::AppResult;
use crate::instagram::{ApiError, Credentials, LoginError, PlatformApi, Session};

/// JSON file store for sessions, one file per account.
#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self, account: &str) -> PathBuf {
        self.dir.join(format!("{}_session.json", account))
    }

    /// `Ok(None)` when no file exists; unreadable or malformed files are errors.
    pub async fn load(&self, account: &str) -> AppResult<Option<Session>> {
        let path = self.path(account);
        let contents = match fs_err::tokio::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&contents)?))
    }

    /// Whole-file rewrite through a temporary file and a rename.
    pub async fn save(&self, session: &Session) -> AppResult<()> {
        let path = self.path(&session.account);
        let json = serde_json::to_string_pretty(session)?;
        write_atomic(&path, json.as_bytes()).await
    }

    /// Returns whether a file was removed.
    pub async fn delete(&self, account: &str) -> AppResult<bool> {
        let path = self.path(account);
        match fs_err::tokio::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Write `contents` to `path` via `<path>.tmp` and a rename.
pub(crate) async fn write_atomic(path: &Path, contents: &[u8]) -> AppResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs_err::tokio::create_dir_all(parent).await?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs_err::tokio::write(&tmp, contents).await?;
    fs_err::tokio::rename(&tmp, path).await?;
    Ok(())
}

/// Owns the active session of one account.
pub struct SessionManager {
    api: Arc<dyn PlatformApi>,
    store: SessionStore,
    credentials: Credentials,
    current: Option<Session>,
}

impl SessionManager {
    pub fn new(api: Arc<dyn PlatformApi>, store: SessionStore, credentials: Credentials) -> Self {
        Self {
            api,
            store,
            credentials,
            current: None,
        }
    }

    pub fn account(&self) -> &str {
        &self.credentials.username
    }

    pub fn current(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    /// Drop the in-memory session so the next [`ensure_valid`](Self::ensure_valid) logs in.
    pub fn invalidate(&mut self) {
        self.current = None;
    }

    /// Existing session that passes a probe, otherwise [`login`](Self::login).
    ///
    /// Idempotent: repeated calls with a working session only probe.
    pub async fn ensure_valid(&mut self) -> Result<Session, LoginError> {
        if let Some(session) = &self.current {
            match self.api.probe(session).await {
                Ok(()) => {
                    log::debug!("Using existing valid session for {}", session.account);
                    return Ok(session.clone());
                }
                // Never reached the server; the session is not known to be bad.
                Err(ApiError::Throttled(e)) => {
                    log::warn!("Session probe skipped ({}), keeping session for {}", e, session.account);
                    return Ok(session.clone());
                }
                Err(e) => log::info!("Session invalid or expired ({}), logging in...", e),
            }
        }
        self.login().await
    }

    /// Restore the persisted session, or authenticate fresh and persist.
    ///
    /// A persisted session that fails to load or restore is deleted first. A restore
    /// refused by the client's own request budget keeps the file and fails the login.
    /// Never retries: one restore attempt at most, then one authentication.
    pub async fn login(&mut self) -> Result<Session, LoginError> {
        let account = self.credentials.username.clone();

        let persisted = match self.store.load(&account).await {
            Ok(Some(session)) => Some(session),
            Ok(None) => {
                log::info!("No existing session found, creating new session...");
                None
            }
            Err(e) => {
                log::warn!("Persisted session is unreadable: {}", e);
                self.discard_persisted(&account).await;
                None
            }
        };

        if let Some(session) = persisted {
            log::info!("Loading existing session...");
            match self.api.restore_session(&session).await {
                Ok(restored) => {
                    log::info!("Session established from persisted state for {}", account);
                    self.current = Some(restored.clone());
                    return Ok(restored);
                }
                Err(ApiError::Throttled(e)) => {
                    log::warn!("Restore of persisted session deferred: {}", e);
                    self.current = None;
                    return Err(LoginError::RateLimited(e));
                }
                Err(e) => {
                    log::warn!("Existing session failed: {}", e);
                    log::info!("Creating new session...");
                    self.discard_persisted(&account).await;
                }
            }
        }

        let session = match self.api.authenticate(&self.credentials).await {
            Ok(session) => session,
            Err(e) => {
                match &e {
                    LoginError::InvalidCredentials(_) => log::error!("Login rejected, check credentials: {}", e),
                    LoginError::VerificationRequired(_) => log::error!("Verification required: {}", e),
                    LoginError::RateLimited(_) => log::error!("Instagram asked to wait, trying again later: {}", e),
                    LoginError::Other(_) => log::error!("Login failed: {}", e),
                }
                self.current = None;
                return Err(e);
            }
        };

        if let Err(e) = self.store.save(&session).await {
            log::warn!("Could not persist session to {}: {}", self.store.path(&account).display(), e);
        }

        log::info!("Session established with a fresh login for {}", account);
        self.current = Some(session.clone());
        Ok(session)
    }

    async fn discard_persisted(&self, account: &str) {
        match self.store.delete(account).await {
            Ok(true) => log::info!("Removed stale session file {}", self.store.path(account).display()),
            Ok(false) => {}
            Err(e) => log::warn!("Could not remove stale session file: {}", e),
        }
    }
}
