//! Shortcode resolution cascade.
//!
//! A shared post reaches us as a link, a bare shortcode, a numeric id, or an
//! opaque share handle whose identifying fields vary between app versions. The
//! resolver walks its strategies in a fixed order and stops at the first hit.

use std::sync::Arc;

use crate::instagram::shortcode::{self, is_numeric, is_shortcode, media_id_to_shortcode};
use crate::instagram::{repair, PlatformApi, RawMedia, Session, ShareHandle};
use crate::share::url::{normalize, post_url, shortcode_from_url};

/// Numeric ids longer than this are treated as media pks and encoded locally.
const MIN_ENCODABLE_DIGITS: usize = 10;

/// Something that points at a post.
#[derive(Debug, Clone, PartialEq)]
pub enum PostReference {
    CanonicalUrl(String),
    Shortcode(String),
    NumericMediaId(String),
    OpaqueShareHandle(ShareHandle),
}

/// What the extractor is given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostIdentifier {
    Shortcode(String),
    /// Numeric media pk
    MediaId(String),
}

impl PostIdentifier {
    /// Shortcode form, encoding a pk locally when needed.
    pub fn shortcode(&self) -> Option<String> {
        match self {
            PostIdentifier::Shortcode(code) => Some(code.clone()),
            PostIdentifier::MediaId(id) => shortcode::media_pk(id).map(media_id_to_shortcode),
        }
    }

    /// Canonical link for the post, when one can be built.
    pub fn url(&self) -> Option<String> {
        self.shortcode().map(|code| post_url(&code))
    }

    pub fn as_str(&self) -> &str {
        match self {
            PostIdentifier::Shortcode(s) | PostIdentifier::MediaId(s) => s,
        }
    }
}

type Strategy = fn(&PostReference) -> Option<PostIdentifier>;

/// Local strategies tried before any network lookup, in order.
const LOCAL_STRATEGIES: [(u8, &str, Strategy); 3] = [
    (1, "link or bare shortcode", from_link),
    (2, "share handle code", from_handle_code),
    (3, "share handle numeric pk/id", from_handle_pk),
];

/// Resolves [`PostReference`]s into [`PostIdentifier`]s.
pub struct ShortcodeResolver {
    api: Arc<dyn PlatformApi>,
}

impl ShortcodeResolver {
    pub fn new(api: Arc<dyn PlatformApi>) -> Self {
        Self { api }
    }

    /// First successful strategy wins; `None` means unresolved (callers log and skip).
    pub async fn resolve(&self, session: &Session, reference: &PostReference) -> Option<PostIdentifier> {
        for (number, name, strategy) in LOCAL_STRATEGIES {
            if let Some(identifier) = strategy(reference) {
                log::info!("Resolved via strategy {} ({}): {}", number, name, identifier.as_str());
                return Some(identifier);
            }
        }

        if let Some(identifier) = self.from_media_lookup(session, reference).await {
            log::info!("Resolved via strategy 4 (media lookup): {}", identifier.as_str());
            return Some(identifier);
        }

        if let Some(identifier) = from_long_numeric(reference) {
            log::info!("Resolved via strategy 5 (local pk encoding): {}", identifier.as_str());
            return Some(identifier);
        }

        log::warn!("Could not resolve post reference: {:?}", reference);
        None
    }

    /// Strategy 4: a handle that looks like full media (capture time and author)
    /// with a compound id is looked up to obtain its canonical code.
    async fn from_media_lookup(&self, session: &Session, reference: &PostReference) -> Option<PostIdentifier> {
        let PostReference::OpaqueShareHandle(handle) = reference else {
            return None;
        };
        if handle.taken_at.is_none() || handle.user.is_none() {
            return None;
        }
        let media_id = handle_ids(handle).find(|id| shortcode::media_pk(id).is_some())?;

        log::info!("Fetching media info for share handle id {}", media_id);
        match self.api.media_info(session, &media_id).await {
            Ok(raw) => {
                let media = RawMedia::from_value(repair(raw)).ok()?;
                media.code().map(|code| PostIdentifier::Shortcode(code.to_string()))
            }
            Err(e) => {
                log::warn!("Media lookup for {} failed: {}", media_id, e);
                None
            }
        }
    }
}

/// Strategy 1: path segment after `/p/` or `/reel/`, or a bare shortcode.
fn from_link(reference: &PostReference) -> Option<PostIdentifier> {
    let code = match reference {
        PostReference::CanonicalUrl(url) => shortcode_from_url(&normalize(url).url),
        PostReference::Shortcode(code) => Some(code.trim().to_string()).filter(|c| is_shortcode(c)),
        PostReference::OpaqueShareHandle(handle) => handle.permalink.as_deref().and_then(shortcode_from_url),
        PostReference::NumericMediaId(_) => None,
    }?;
    is_shortcode(&code).then_some(PostIdentifier::Shortcode(code))
}

/// Strategy 2: the handle's native `code`.
fn from_handle_code(reference: &PostReference) -> Option<PostIdentifier> {
    let PostReference::OpaqueShareHandle(handle) = reference else {
        return None;
    };
    handle
        .code
        .as_deref()
        .map(str::trim)
        .filter(|code| is_shortcode(code))
        .map(|code| PostIdentifier::Shortcode(code.to_string()))
}

/// Strategy 3: the handle's native `pk`, then `id`, when purely numeric.
fn from_handle_pk(reference: &PostReference) -> Option<PostIdentifier> {
    let PostReference::OpaqueShareHandle(handle) = reference else {
        return None;
    };
    handle_ids(handle).find(|id| is_numeric(id)).map(PostIdentifier::MediaId)
}

/// Strategy 5: a numeric id longer than ten digits, base-64 encoded locally.
fn from_long_numeric(reference: &PostReference) -> Option<PostIdentifier> {
    let candidates: Vec<String> = match reference {
        PostReference::NumericMediaId(id) => vec![id.trim().to_string()],
        PostReference::OpaqueShareHandle(handle) => handle_ids(handle).collect(),
        _ => Vec::new(),
    };
    candidates.iter().find_map(|id| {
        let digits = id.split('_').next()?;
        if digits.len() <= MIN_ENCODABLE_DIGITS {
            return None;
        }
        shortcode::media_pk(digits).map(|pk| PostIdentifier::Shortcode(media_id_to_shortcode(pk)))
    })
}

/// Non-empty `pk` and `id` values of a handle, in that order.
fn handle_ids(handle: &ShareHandle) -> impl Iterator<Item = String> + '_ {
    [handle.pk.as_ref(), handle.id.as_ref()]
        .into_iter()
        .flatten()
        .map(|id| id.as_string())
        .filter(|id| !id.is_empty())
}
