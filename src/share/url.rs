//! Post link normalization and discovery.

use lazy_regex::{lazy_regex, Lazy, Regex};
use url::Url;

/// Platform domain every post link must carry.
pub const DOMAIN: &str = "instagram.com";

/// Path markers of post and reel links.
const PATH_MARKERS: &[&str] = &["/p/", "/reel/"];

/// Path segments that precede a shortcode.
const CONTENT_SEGMENTS: &[&str] = &["p", "reel"];

/// Quoted URL inside a stringified attachment, e.g. `LinkContext(text='https://...')`.
static EMBEDDED_TEXT: Lazy<Regex> = lazy_regex!(r"text='([^']+)'");

/// Outcome of [`normalize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedUrl {
    /// Canonical link, or the untouched input when `canonical` is false
    pub url: String,
    pub canonical: bool,
}

/// Turn a raw string into a canonical post link.
///
/// Steps: pick the embedded `text='...'` URL if any, drop the query string and
/// fragment, require the platform domain and a `/p/` or `/reel/` path, end with `/`.
/// Inputs that do not qualify come back unchanged with `canonical == false`.
pub fn normalize(raw: &str) -> NormalizedUrl {
    let candidate = EMBEDDED_TEXT
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(raw)
        .trim();

    let without_query = candidate.split(['?', '#']).next().unwrap_or_default();

    if !is_post_link(without_query) {
        log::warn!("Could not normalize URL: {}", raw);
        return NormalizedUrl {
            url: raw.to_string(),
            canonical: false,
        };
    }

    let mut url = without_query.to_string();
    if !url.ends_with('/') {
        url.push('/');
    }
    NormalizedUrl { url, canonical: true }
}

/// True when `s` names the platform domain and a post or reel path.
pub fn is_post_link(s: &str) -> bool {
    s.contains(DOMAIN) && PATH_MARKERS.iter().any(|marker| s.contains(marker))
}

/// Shortcode from a post link.
///
/// Supports `/p/<code>/`, `/reel/<code>/` and the `/<username>/p/<code>/` form.
/// Links without a scheme are accepted.
pub fn shortcode_from_url(link: &str) -> Option<String> {
    let link = link.trim();
    let parsed = if link.contains("://") {
        Url::parse(link).ok()?
    } else {
        Url::parse(&format!("https://{}", link)).ok()?
    };
    let host = parsed.host_str()?.to_lowercase();
    if host != DOMAIN && !host.ends_with(".instagram.com") {
        return None;
    }

    let segments: Vec<&str> = parsed.path_segments()?.filter(|s| !s.is_empty()).collect();
    // Format: /p/<code>/ (2 segments)
    if segments.len() >= 2 && CONTENT_SEGMENTS.contains(&segments[0]) {
        return Some(segments[1].to_string());
    }
    // Format: /<username>/p/<code>/ (3 segments)
    if segments.len() >= 3 && CONTENT_SEGMENTS.contains(&segments[1]) {
        return Some(segments[2].to_string());
    }
    None
}

/// Canonical link for a shortcode.
pub fn post_url(shortcode: &str) -> String {
    format!("https://www.{}/p/{}/", DOMAIN, shortcode)
}

/// Words of a free text that look like post links, in order of appearance.
pub fn find_post_links(text: &str) -> Vec<String> {
    if !text.contains(DOMAIN) {
        return Vec::new();
    }
    text.split_whitespace()
        .map(trim_word)
        .filter(|word| is_post_link(word))
        .map(str::to_string)
        .collect()
}

/// Punctuation that wraps or ends a link in running text.
const LEADING_PUNCTUATION: &[char] = &['(', '<', '"', '\''];
const TRAILING_PUNCTUATION: &[char] = &[',', '.', ')', '!', '?', '\'', '"', '>', ';', ':'];

/// Strip sentence punctuation around a word, keeping embedded `text='...'` intact.
fn trim_word(word: &str) -> &str {
    if EMBEDDED_TEXT.is_match(word) {
        return word;
    }
    word.trim_start_matches(LEADING_PUNCTUATION)
        .trim_end_matches(TRAILING_PUNCTUATION)
}
