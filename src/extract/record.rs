//! The normalized record handed downstream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::instagram::{MediaKind, RawMedia};

/// One extracted post. Field names are part of the downstream protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRecord {
    /// Author handle, `"unknown"` when missing
    pub username: String,
    pub caption: String,
    pub media_type: MediaKind,
    /// Video URL, else first image, else empty
    pub media_url: String,
    /// Ordered, without duplicates
    pub image_urls: Vec<String>,
    /// Capture time, extraction time when unknown
    pub timestamp: DateTime<Utc>,
    pub url: String,
    /// Media pk, or the shortcode when the pk is unknown
    pub pk: String,
}

pub const UNKNOWN_AUTHOR: &str = "unknown";

impl ContentRecord {
    /// Map a media payload field by field; a missing field falls back to its default.
    pub fn from_raw(media: &RawMedia, url: &str, fallback_pk: &str) -> Self {
        let image_candidates: Vec<String> = if !media.carousel_media.is_empty() {
            let images: Vec<String> = media
                .carousel_media
                .iter()
                .filter_map(|resource| resource.image_url())
                .map(str::to_string)
                .collect();
            if images.is_empty() {
                log::warn!("No carousel images extracted despite finding resources");
            } else {
                log::info!("Extracted {} carousel images", images.len());
            }
            images
        } else {
            media.candidate_urls().into_iter().map(str::to_string).collect()
        };
        let mut image_urls = dedupe_preserving_order(image_candidates);

        let media_url = media
            .video_url()
            .map(str::to_string)
            .or_else(|| image_urls.first().cloned())
            .unwrap_or_default();

        if image_urls.is_empty() {
            if let Some(single) = media.thumbnail_or_display() {
                image_urls.push(single.to_string());
            }
        }

        Self {
            username: media.username().unwrap_or(UNKNOWN_AUTHOR).to_string(),
            caption: media.caption().unwrap_or_default().to_string(),
            media_type: media.kind(),
            media_url,
            image_urls,
            timestamp: media.taken_at().unwrap_or_else(Utc::now),
            url: url.to_string(),
            pk: media.pk_string().unwrap_or_else(|| fallback_pk.to_string()),
        }
    }

    /// All defaults, used when a payload could not be read at all.
    pub fn degraded(url: &str, pk: &str) -> Self {
        Self {
            username: UNKNOWN_AUTHOR.to_string(),
            caption: format!("Content from {}", url),
            media_type: MediaKind::Unknown,
            media_url: String::new(),
            image_urls: Vec::new(),
            timestamp: Utc::now(),
            url: url.to_string(),
            pk: pk.to_string(),
        }
    }

    /// Terminal fallback when every lookup failed.
    pub fn placeholder(url: &str, shortcode: &str) -> Self {
        Self {
            caption: format!("Content from {} (extracted using shortcode: {})", url, shortcode),
            ..Self::degraded(url, shortcode)
        }
    }
}

/// Drop repeated entries, keeping the first occurrence of each.
pub fn dedupe_preserving_order(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items.into_iter().filter(|item| seen.insert(item.clone())).collect()
}
