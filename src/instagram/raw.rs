//! Typed, lenient view of a media payload.
//!
//! Every field is optional and parsed on its own: a field with an unexpected shape
//! becomes `None` instead of failing the whole object. Accessors walk the fallback
//! order for each piece of information.

use chrono::{DateTime, TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::str::FromStr;
use strum::{AsRefStr, Display, EnumString};

/// Kind of a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, AsRefStr, Serialize, Deserialize)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MediaKind {
    Photo,
    Video,
    Carousel,
    #[default]
    Unknown,
}

impl MediaKind {
    /// Legacy integer codes used by the private API.
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => MediaKind::Photo,
            2 => MediaKind::Video,
            8 => MediaKind::Carousel,
            _ => MediaKind::Unknown,
        }
    }
}

/// An id that may arrive as a JSON number or a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IdValue {
    Number(u64),
    Text(String),
}

impl IdValue {
    pub fn as_string(&self) -> String {
        match self {
            IdValue::Number(n) => n.to_string(),
            IdValue::Text(s) => s.trim().to_string(),
        }
    }
}

/// `media_type` as sent: integer code or textual name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MediaTypeField {
    Code(i64),
    Text(String),
}

/// Capture time as epoch seconds or an RFC 3339 string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeValue {
    Epoch(i64),
    Text(String),
}

impl TimeValue {
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            TimeValue::Epoch(secs) => Utc.timestamp_opt(*secs, 0).single(),
            TimeValue::Text(s) => DateTime::parse_from_rfc3339(s.trim())
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
                .or_else(|| s.trim().parse::<i64>().ok().and_then(|secs| Utc.timestamp_opt(secs, 0).single())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(default, deserialize_with = "lenient")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageVersions {
    #[serde(default, deserialize_with = "lenient_vec")]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawUser {
    #[serde(default, deserialize_with = "lenient")]
    pub username: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub pk: Option<IdValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawCaption {
    #[serde(default, deserialize_with = "lenient")]
    pub text: Option<String>,
}

/// One item of a carousel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawResource {
    #[serde(default, deserialize_with = "lenient")]
    pub image_versions2: Option<ImageVersions>,
    #[serde(default, deserialize_with = "lenient")]
    pub thumbnail_url: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub display_url: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub video_url: Option<String>,
}

impl RawResource {
    /// First available of: best candidate, thumbnail, display URL.
    pub fn image_url(&self) -> Option<&str> {
        let candidate = self
            .image_versions2
            .as_ref()
            .and_then(|v| v.candidates.iter().find_map(|c| non_empty(c.url.as_deref())));
        candidate
            .or_else(|| non_empty(self.thumbnail_url.as_deref()))
            .or_else(|| non_empty(self.display_url.as_deref()))
    }
}

/// Full media info as returned by the info endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawMedia {
    #[serde(default, deserialize_with = "lenient")]
    pub pk: Option<IdValue>,
    #[serde(default, deserialize_with = "lenient")]
    pub id: Option<IdValue>,
    #[serde(default, deserialize_with = "lenient")]
    pub code: Option<String>,
    /// Named kind, set by converters that already know the enum.
    #[serde(default, deserialize_with = "lenient")]
    pub media_kind: Option<MediaKind>,
    #[serde(default, deserialize_with = "lenient")]
    pub media_type: Option<MediaTypeField>,
    #[serde(default, deserialize_with = "lenient")]
    pub user: Option<RawUser>,
    #[serde(default, deserialize_with = "lenient")]
    pub caption: Option<RawCaption>,
    #[serde(default, deserialize_with = "lenient")]
    pub caption_text: Option<String>,
    #[serde(default, alias = "resources", deserialize_with = "lenient_vec")]
    pub carousel_media: Vec<RawResource>,
    #[serde(default, deserialize_with = "lenient")]
    pub image_versions2: Option<ImageVersions>,
    #[serde(default, deserialize_with = "lenient")]
    pub thumbnail_url: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub display_url: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub video_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub video_versions: Vec<Candidate>,
    #[serde(default, deserialize_with = "lenient")]
    pub taken_at: Option<TimeValue>,
}

impl RawMedia {
    /// Parse a payload; only a non-object input fails.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        if !value.is_object() {
            return Err(serde::de::Error::custom("media payload is not an object"));
        }
        serde_json::from_value(value)
    }

    pub fn username(&self) -> Option<&str> {
        self.user.as_ref().and_then(|u| non_empty(u.username.as_deref()))
    }

    pub fn caption(&self) -> Option<&str> {
        self.caption
            .as_ref()
            .and_then(|c| c.text.as_deref())
            .or(self.caption_text.as_deref())
    }

    /// Named kind, then textual `media_type`, then the legacy integer code.
    pub fn kind(&self) -> MediaKind {
        if let Some(kind) = self.media_kind {
            return kind;
        }
        match &self.media_type {
            Some(MediaTypeField::Text(name)) => MediaKind::from_str(name.trim()).unwrap_or_default(),
            Some(MediaTypeField::Code(code)) => MediaKind::from_code(*code),
            None => MediaKind::Unknown,
        }
    }

    pub fn video_url(&self) -> Option<&str> {
        non_empty(self.video_url.as_deref())
            .or_else(|| self.video_versions.iter().find_map(|c| non_empty(c.url.as_deref())))
    }

    /// Every candidate URL of a single post, in order.
    pub fn candidate_urls(&self) -> Vec<&str> {
        self.image_versions2
            .as_ref()
            .map(|v| v.candidates.iter().filter_map(|c| non_empty(c.url.as_deref())).collect())
            .unwrap_or_default()
    }

    pub fn thumbnail_or_display(&self) -> Option<&str> {
        non_empty(self.thumbnail_url.as_deref()).or_else(|| non_empty(self.display_url.as_deref()))
    }

    pub fn taken_at(&self) -> Option<DateTime<Utc>> {
        self.taken_at.as_ref().and_then(TimeValue::to_datetime)
    }

    /// Media pk as a string, from `pk` or the numeric part of `id`.
    pub fn pk_string(&self) -> Option<String> {
        self.pk
            .as_ref()
            .map(IdValue::as_string)
            .filter(|s| !s.is_empty())
            .or_else(|| {
                self.id
                    .as_ref()
                    .map(IdValue::as_string)
                    .and_then(|id| id.split('_').next().map(str::to_string))
                    .filter(|s| !s.is_empty())
            })
    }

    pub fn code(&self) -> Option<&str> {
        non_empty(self.code.as_deref())
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

/// Deserialize a field, turning any shape mismatch into `None`.
pub(crate) fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).ok())
}

/// Deserialize a list, dropping the elements that do not parse.
pub(crate) fn lenient_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items.into_iter().filter_map(|item| T::deserialize(item).ok()).collect(),
        _ => Vec::new(),
    })
}
