//! Session and inbox types exchanged with [`PlatformApi`](super::PlatformApi).

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::raw::{IdValue, RawUser, TimeValue};

/// Account credentials. The password never appears in `Debug` output.
#[derive(Debug)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }
}

/// Transport state needed to replay an authenticated session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransportSettings {
    /// `Authorization` header value issued at login
    #[serde(default)]
    pub authorization: Option<String>,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub mid: Option<String>,
    #[serde(default)]
    pub csrftoken: Option<String>,
}

/// An authenticated session, persisted as `<account>_session.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub account: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub settings: TransportSettings,
}

/// One inbox thread, newest first as listed by the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    #[serde(alias = "thread_id", deserialize_with = "id_string")]
    pub id: String,
    #[serde(default)]
    pub thread_title: Option<String>,
    /// Preview items included in the inbox listing
    #[serde(default)]
    pub items: Vec<Message>,
}

/// Reel metadata attached to shares. Parsed strictly: missing required
/// sound fields fail the whole message list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipsMetadata {
    #[serde(default)]
    pub original_sound_info: Option<OriginalSoundInfo>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OriginalSoundInfo {
    pub audio_asset_id: Value,
    pub dash_manifest: Value,
    pub duration_in_ms: Value,
    pub original_media_id: Value,
    pub progressive_download_url: Value,
    pub time_created: Value,
    pub ig_artist: IgArtist,
    pub consumption_info: Value,
    pub fb_downstream_use_xpost_metadata: Value,
    #[serde(default)]
    pub original_audio_title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IgArtist {
    pub profile_pic_id: Value,
    #[serde(default)]
    pub username: Option<String>,
}

/// A forwarded post as attached to a message. Identifying fields are partial
/// and inconsistent between app versions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShareHandle {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub pk: Option<IdValue>,
    #[serde(default)]
    pub id: Option<IdValue>,
    #[serde(default)]
    pub taken_at: Option<TimeValue>,
    #[serde(default)]
    pub user: Option<RawUser>,
    #[serde(default)]
    pub permalink: Option<String>,
    #[serde(default)]
    pub clips_metadata: Option<ClipsMetadata>,
}

/// Reel shares wrap the media one level down.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipShare {
    pub clip: ShareHandle,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkContext {
    #[serde(default)]
    pub link_url: Option<String>,
}

/// A link preview attachment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkAttachment {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub link_context: Option<LinkContext>,
}

impl LinkAttachment {
    pub fn url(&self) -> Option<&str> {
        self.link_context
            .as_ref()
            .and_then(|c| c.link_url.as_deref())
            .or(self.text.as_deref())
            .filter(|s| !s.trim().is_empty())
    }
}

/// A direct message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(alias = "item_id", deserialize_with = "id_string")]
    pub id: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub media_share: Option<ShareHandle>,
    #[serde(default)]
    pub clip: Option<ClipShare>,
    #[serde(default)]
    pub link: Option<LinkAttachment>,
}

impl Message {
    /// A text-only message.
    pub fn text(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: Some(text.into()),
            media_share: None,
            clip: None,
            link: None,
        }
    }

    /// A message carrying a forwarded post.
    pub fn share(id: impl Into<String>, handle: ShareHandle) -> Self {
        Self {
            id: id.into(),
            text: None,
            media_share: Some(handle),
            clip: None,
            link: None,
        }
    }

    /// The forwarded post, from `media_share` or a reel `clip`.
    pub fn share_handle(&self) -> Option<&ShareHandle> {
        self.media_share.as_ref().or(self.clip.as_ref().map(|c| &c.clip))
    }
}

/// Accept ids sent as JSON numbers or strings.
fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(IdValue::deserialize(deserializer)?.as_string())
}
