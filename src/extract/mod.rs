//! Content extraction: post identifier to [`ContentRecord`].
//!
//! Lookups are tried in order, each only when the previous one failed:
//! 1. shortcode decoded locally to a media id, then full media info
//! 2. media id looked up from the canonical URL, then full media info
//! 3. the older web endpoint keyed by shortcode
//! 4. a minimal placeholder record
//!
//! No error escapes [`ContentExtractor::extract`]: it always produces a record.

pub mod record;
pub mod transport;

pub use record::ContentRecord;

use serde_json::Value;
use std::sync::Arc;

use crate::instagram::shortcode::shortcode_to_media_id;
use crate::instagram::{repair, ApiError, PlatformApi, RawMedia, Session};
use crate::session::SessionManager;
use crate::share::url::{normalize, shortcode_from_url};
use crate::share::PostIdentifier;

pub struct ContentExtractor {
    api: Arc<dyn PlatformApi>,
}

impl ContentExtractor {
    pub fn new(api: Arc<dyn PlatformApi>) -> Self {
        Self { api }
    }

    /// Build a record for `identifier`. `source_url` is the link the post was
    /// shared as; the canonical link is derived when it is absent.
    pub async fn extract(
        &self,
        session: &Session,
        identifier: &PostIdentifier,
        source_url: Option<&str>,
    ) -> ContentRecord {
        let shortcode = identifier.shortcode();
        let url = source_url
            .map(str::to_string)
            .or_else(|| identifier.url())
            .unwrap_or_default();
        let fallback_pk = shortcode.clone().unwrap_or_else(|| identifier.as_str().to_string());

        log::info!("Extracting content from: {}", url);

        match self.primary(session, identifier).await {
            Ok(raw) => {
                log::info!("Used primary media info lookup");
                return map_media(raw, &url, &fallback_pk);
            }
            Err(e) => log::warn!("Primary lookup failed: {}", e),
        }

        if !url.is_empty() {
            match self.by_url(session, &url).await {
                Ok(raw) => {
                    log::info!("Used media id from URL lookup");
                    return map_media(raw, &url, &fallback_pk);
                }
                Err(e) => log::warn!("URL lookup failed: {}", e),
            }
        }

        if let Some(code) = shortcode.as_deref() {
            match self.api.media_info_legacy(session, code).await {
                Ok(raw) => {
                    log::info!("Used legacy media info lookup");
                    return map_media(raw, &url, &fallback_pk);
                }
                Err(e) => log::warn!("Legacy lookup failed: {}", e),
            }
        }

        log::info!("Using placeholder record for {}", url);
        ContentRecord::placeholder(&url, &fallback_pk)
    }

    async fn primary(&self, session: &Session, identifier: &PostIdentifier) -> Result<Value, ApiError> {
        let media_id = match identifier {
            PostIdentifier::MediaId(id) => id.clone(),
            PostIdentifier::Shortcode(code) => shortcode_to_media_id(code)
                .map(|pk| pk.to_string())
                .ok_or_else(|| ApiError::Other(format!("cannot decode shortcode {}", code)))?,
        };
        self.api.media_info(session, &media_id).await
    }

    async fn by_url(&self, session: &Session, url: &str) -> Result<Value, ApiError> {
        let media_id = self.api.media_id_from_url(session, url).await?;
        self.api.media_info(session, &media_id).await
    }

    /// Single-shot extraction for a raw link.
    ///
    /// `None` when the link is not a post link or no session could be established.
    pub async fn extract_post_content(&self, sessions: &mut SessionManager, raw_url: &str) -> Option<ContentRecord> {
        let normalized = normalize(raw_url);
        let Some(shortcode) = shortcode_from_url(&normalized.url) else {
            log::error!("Invalid Instagram URL format: {}", raw_url);
            return None;
        };

        let session = match sessions.ensure_valid().await {
            Ok(session) => session,
            Err(e) => {
                log::error!("Login failed, cannot extract content: {}", e);
                return None;
            }
        };

        let record = self
            .extract(&session, &PostIdentifier::Shortcode(shortcode), Some(&normalized.url))
            .await;
        log::info!("Successfully extracted content from @{}", record.username);
        Some(record)
    }
}

/// Repair, read leniently, map; a payload that is not an object yields defaults.
fn map_media(raw: Value, url: &str, fallback_pk: &str) -> ContentRecord {
    match RawMedia::from_value(repair(raw)) {
        Ok(media) => ContentRecord::from_raw(&media, url, fallback_pk),
        Err(e) => {
            log::error!("Error extracting media fields: {}", e);
            ContentRecord::degraded(url, fallback_pk)
        }
    }
}
