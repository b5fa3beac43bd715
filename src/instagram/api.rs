//! The platform boundary.
//!
//! Everything above this trait is transport agnostic: the session manager, the
//! resolver and the poll loop only ever see `Arc<dyn PlatformApi>`.

use async_trait::async_trait;
use serde_json::Value;

use super::error::{ApiError, LoginError};
use super::types::{Credentials, Message, Session, Thread};

/// Operations the relay needs from the platform.
///
/// All methods are `&self`; implementations use interior mutability for any
/// bookkeeping (rate limiting, call counters).
#[async_trait]
pub trait PlatformApi: Send + Sync {
    /// Fresh login with username and password.
    async fn authenticate(&self, credentials: &Credentials) -> Result<Session, LoginError>;

    /// Re-activate a persisted session. Fails when the server no longer accepts it.
    async fn restore_session(&self, session: &Session) -> Result<Session, ApiError>;

    /// Cheap authenticated call telling whether `session` still works.
    async fn probe(&self, session: &Session) -> Result<(), ApiError>;

    /// Most recent inbox threads, newest first.
    async fn list_recent_threads(&self, session: &Session, limit: usize) -> Result<Vec<Thread>, ApiError>;

    /// Most recent messages of one thread, newest first.
    async fn list_recent_messages(
        &self,
        session: &Session,
        thread_id: &str,
        limit: usize,
    ) -> Result<Vec<Message>, ApiError>;

    /// Full media info by numeric media id (bare pk or `<pk>_<owner>`).
    async fn media_info(&self, session: &Session, media_id: &str) -> Result<Value, ApiError>;

    /// Media id for a canonical post URL.
    async fn media_id_from_url(&self, session: &Session, url: &str) -> Result<String, ApiError>;

    /// Media info from the older web endpoint, keyed by shortcode.
    ///
    /// The payload is converted to the same shape [`media_info`](Self::media_info) returns.
    async fn media_info_legacy(&self, session: &Session, shortcode: &str) -> Result<Value, ApiError>;
}
