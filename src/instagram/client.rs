//! HttpApi: [`PlatformApi`] over Instagram's private mobile API.
//!
//! Features:
//! - Username/password login, `Authorization` header replay for later calls
//! - Inbox and thread listing with payload repair before strict parsing
//! - Media info by id, media id lookup by URL (oEmbed)
//! - Web GraphQL post query by shortcode as the older info path
//!   (`doc_id` configurable via `INSTAGRAM_DOC_ID`, rotates every few weeks)
//! - Optional proxy via `INSTAGRAM_PROXY`
//! - Sliding-window rate limiter on post lookups (180 req/hr)

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::{RequestBuilder, StatusCode};
use secrecy::ExposeSecret;
use serde_json::{json, Value};
use std::sync::Mutex;
use std::time::Instant;

use super::api::PlatformApi;
use super::error::{ApiError, LoginError};
use super::raw::{IdValue, MediaKind};
use super::repair::repair;
use super::types::{Credentials, Message, Session, Thread, TransportSettings};
use crate::core::config;

/// Private API host.
const API_BASE: &str = "https://i.instagram.com";

/// Web host, used for the GraphQL post query.
const WEB_BASE: &str = "https://www.instagram.com";

/// Android app ID sent with private API calls.
const ANDROID_APP_ID: &str = "567067343352427";

/// Instagram internal web app ID (public, embedded in the web app).
const IG_APP_ID: &str = "936619743392459";

/// Facebook LSD token (anti-CSRF, public static value used by web clients).
const FB_LSD_TOKEN: &str = "AVqbxe3J_YA";

/// Facebook ASBD ID (public, embedded in the web app).
const FB_ASBD_ID: &str = "129477";

const ANDROID_USER_AGENT: &str =
    "Instagram 269.0.0.18.75 Android (26/8.0.0; 480dpi; 1080x1920; OnePlus; 6T Dev; devitron; qcom; en_US; 314665256)";

const WEB_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Sliding-window rate limiter for post lookups.
/// Tracks timestamps of recent requests.
struct RateLimiter {
    timestamps: Mutex<Vec<Instant>>,
    limit: usize,
}

impl RateLimiter {
    fn new(limit: usize) -> Self {
        Self {
            timestamps: Mutex::new(Vec::new()),
            limit,
        }
    }

    /// Try to acquire a slot. Returns true if under limit, false if rate-limited.
    fn acquire(&self) -> bool {
        let mut ts = self.timestamps.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        ts.retain(|t| now.duration_since(*t).as_secs() < 3600);
        if ts.len() >= self.limit {
            return false;
        }
        ts.push(now);
        true
    }
}

/// Instagram private API client.
pub struct HttpApi {
    client: reqwest::Client,
    api_base: String,
    web_base: String,
    rate_limiter: RateLimiter,
}

impl HttpApi {
    /// Client for the real hosts, honoring `INSTAGRAM_PROXY`.
    pub fn new() -> Result<Self, ApiError> {
        Self::build(API_BASE, WEB_BASE, config::api::PROXY.as_deref())
    }

    /// Client against arbitrary hosts, without proxy. Used against local mock servers.
    pub fn with_base_urls(api_base: &str, web_base: &str) -> Result<Self, ApiError> {
        Self::build(api_base, web_base, None)
    }

    fn build(api_base: &str, web_base: &str, proxy: Option<&str>) -> Result<Self, ApiError> {
        let mut client_builder = reqwest::Client::builder()
            .user_agent(ANDROID_USER_AGENT)
            .timeout(config::api::timeout())
            .connect_timeout(config::api::connect_timeout());

        if let Some(proxy_url) = proxy {
            match reqwest::Proxy::all(proxy_url) {
                Ok(proxy) => {
                    log::info!("HttpApi: using proxy for Instagram traffic");
                    client_builder = client_builder.proxy(proxy);
                }
                Err(e) => {
                    log::warn!("HttpApi: failed to configure proxy: {}", e);
                }
            }
        }

        let client = client_builder
            .build()
            .map_err(|e| ApiError::Other(format!("HTTP client build failed: {}", e)))?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            web_base: web_base.trim_end_matches('/').to_string(),
            rate_limiter: RateLimiter::new(config::api::RATE_LIMIT_PER_HOUR),
        })
    }

    /// Override the hourly post lookup budget.
    #[must_use]
    pub fn with_lookup_limit(mut self, per_hour: usize) -> Self {
        self.rate_limiter = RateLimiter::new(per_hour);
        self
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    /// Attach the replayed session headers.
    fn authed(&self, builder: RequestBuilder, session: &Session) -> RequestBuilder {
        let settings = &session.settings;
        let mut builder = builder.header("X-IG-App-ID", ANDROID_APP_ID);
        if let Some(ref authorization) = settings.authorization {
            builder = builder.header("Authorization", authorization);
        }
        if let Some(ref device_id) = settings.device_id {
            builder = builder.header("X-IG-Device-ID", device_id);
        }
        if let Some(ref mid) = settings.mid {
            builder = builder.header("X-MID", mid);
        }
        builder
    }

    /// Take a slot from the hourly lookup budget.
    fn acquire_lookup(&self) -> Result<(), ApiError> {
        if self.rate_limiter.acquire() {
            Ok(())
        } else {
            log::warn!("HttpApi: hourly lookup budget exhausted");
            Err(ApiError::Throttled("hourly post lookup budget exhausted".to_string()))
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<(HeaderMap, Value), ApiError> {
        let response = request.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let text = response.text().await?;
        let body: Option<Value> = serde_json::from_str(&text).ok();

        if let Some(err) = error_from_response(status, body.as_ref(), &text) {
            log::debug!("HttpApi: request failed ({}): {}", status, err);
            return Err(err);
        }

        let body = body.ok_or_else(|| ApiError::Other(format!("non-JSON response: {}", preview(&text))))?;
        Ok((headers, body))
    }

    async fn get_json(&self, session: &Session, path: &str) -> Result<Value, ApiError> {
        let request = self.authed(self.client.get(self.api_url(path)), session);
        Ok(self.send(request).await?.1)
    }
}

#[async_trait]
impl PlatformApi for HttpApi {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Session, LoginError> {
        let device_id = format!("android-{}", &uuid::Uuid::new_v4().simple().to_string()[..16]);
        let guid = uuid::Uuid::new_v4().to_string();
        let phone_id = uuid::Uuid::new_v4().to_string();
        let enc_password = format!(
            "#PWD_INSTAGRAM:0:{}:{}",
            Utc::now().timestamp(),
            credentials.password.expose_secret()
        );
        let body = form_body(&[
            ("username", credentials.username.as_str()),
            ("enc_password", enc_password.as_str()),
            ("device_id", device_id.as_str()),
            ("guid", guid.as_str()),
            ("phone_id", phone_id.as_str()),
            ("login_attempt_count", "0"),
        ]);

        log::info!("HttpApi: logging in as {}", credentials.username);

        let request = self
            .client
            .post(self.api_url("/api/v1/accounts/login/"))
            .header("X-IG-App-ID", ANDROID_APP_ID)
            .header("X-IG-Device-ID", device_id.as_str())
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body);
        let (headers, body) = self.send(request).await?;

        let user = body
            .get("logged_in_user")
            .ok_or_else(|| LoginError::Other("response carries no logged_in_user".to_string()))?;
        let user_id = user
            .get("pk")
            .and_then(|pk| serde_json::from_value::<IdValue>(pk.clone()).ok())
            .map(|pk| pk.as_string())
            .filter(|pk| !pk.is_empty())
            .ok_or_else(|| LoginError::Other("logged_in_user has no pk".to_string()))?;

        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
                .filter(|v| !v.is_empty())
        };

        Ok(Session {
            account: credentials.username.clone(),
            user_id,
            created_at: Utc::now(),
            settings: TransportSettings {
                authorization: header("ig-set-authorization"),
                device_id: Some(device_id),
                uuid: Some(guid),
                mid: header("ig-set-x-mid"),
                csrftoken: None,
            },
        })
    }

    async fn restore_session(&self, session: &Session) -> Result<Session, ApiError> {
        if session.settings.authorization.is_none() {
            return Err(ApiError::SessionInvalid("no authorization stored".to_string()));
        }

        let body = self.get_json(session, "/api/v1/accounts/current_user/?edit=true").await?;
        let pk = body
            .pointer("/user/pk")
            .and_then(|pk| serde_json::from_value::<IdValue>(pk.clone()).ok())
            .map(|pk| pk.as_string());

        match pk {
            Some(pk) if pk == session.user_id => Ok(session.clone()),
            Some(pk) => Err(ApiError::SessionInvalid(format!(
                "session belongs to user {}, expected {}",
                pk, session.user_id
            ))),
            None => Err(ApiError::SessionInvalid("current user missing from response".to_string())),
        }
    }

    async fn probe(&self, session: &Session) -> Result<(), ApiError> {
        let path = format!("/api/v1/users/{}/info/", urlencoding::encode(&session.user_id));
        self.get_json(session, &path).await.map(|_| ())
    }

    async fn list_recent_threads(&self, session: &Session, limit: usize) -> Result<Vec<Thread>, ApiError> {
        let path = format!(
            "/api/v1/direct_v2/inbox/?persistentBadging=true&limit={}&thread_message_limit=10",
            limit
        );
        let body = repair(self.get_json(session, &path).await?);
        let threads = body.pointer("/inbox/threads").cloned().unwrap_or(Value::Array(Vec::new()));
        let mut threads: Vec<Thread> =
            serde_json::from_value(threads).map_err(|e| ApiError::Validation(format!("inbox threads: {}", e)))?;
        threads.truncate(limit);
        Ok(threads)
    }

    async fn list_recent_messages(
        &self,
        session: &Session,
        thread_id: &str,
        limit: usize,
    ) -> Result<Vec<Message>, ApiError> {
        let path = format!(
            "/api/v1/direct_v2/threads/{}/?limit={}",
            urlencoding::encode(thread_id),
            limit
        );
        let body = repair(self.get_json(session, &path).await?);
        let items = body.pointer("/thread/items").cloned().unwrap_or(Value::Array(Vec::new()));
        let mut messages: Vec<Message> =
            serde_json::from_value(items).map_err(|e| ApiError::Validation(format!("thread items: {}", e)))?;
        messages.truncate(limit);
        Ok(messages)
    }

    async fn media_info(&self, session: &Session, media_id: &str) -> Result<Value, ApiError> {
        self.acquire_lookup()?;
        let path = format!("/api/v1/media/{}/info/", urlencoding::encode(media_id));
        let body = self.get_json(session, &path).await?;
        body.pointer("/items/0")
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("media {}", media_id)))
    }

    async fn media_id_from_url(&self, session: &Session, url: &str) -> Result<String, ApiError> {
        self.acquire_lookup()?;
        let path = format!("/api/v1/oembed/?url={}", urlencoding::encode(url));
        let body = self.get_json(session, &path).await?;
        body.get("media_id")
            .and_then(|id| serde_json::from_value::<IdValue>(id.clone()).ok())
            .map(|id| id.as_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ApiError::NotFound(format!("no media id for {}", url)))
    }

    async fn media_info_legacy(&self, _session: &Session, shortcode: &str) -> Result<Value, ApiError> {
        self.acquire_lookup()?;
        let doc_id = config::api::DOC_ID.as_str();
        let variables = json!({ "shortcode": shortcode }).to_string();
        let body = format!(
            "doc_id={}&variables={}&lsd={}",
            doc_id,
            urlencoding::encode(&variables),
            FB_LSD_TOKEN
        );

        log::info!("HttpApi: GraphQL post query for {}", shortcode);

        let request = self
            .client
            .post(format!("{}/api/graphql", self.web_base))
            .header(reqwest::header::USER_AGENT, WEB_USER_AGENT)
            .header("X-IG-App-ID", IG_APP_ID)
            .header("X-FB-LSD", FB_LSD_TOKEN)
            .header("X-ASBD-ID", FB_ASBD_ID)
            .header("X-Requested-With", "XMLHttpRequest")
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header("Referer", format!("{}/", self.web_base))
            .header("Origin", self.web_base.as_str())
            .body(body);
        let (_, body) = self.send(request).await?;

        // Detect doc_id expiry
        if let Some(message) = body.get("message").and_then(Value::as_str) {
            if message.contains("useragent mismatch") || message.contains("doc_id") {
                log::error!("HttpApi: possible doc_id expiry: {}", message);
                return Err(ApiError::Other(format!("doc_id may be expired: {}", message)));
            }
        }

        let media = body
            .pointer("/data/xdt_shortcode_media")
            .or_else(|| body.pointer("/data/shortcode_media"))
            .filter(|m| !m.is_null())
            .ok_or_else(|| ApiError::NotFound(format!("post {} not found or unavailable", shortcode)))?;

        Ok(graphql_to_v1(media))
    }
}

/// Map an HTTP response to an error, or `None` when it is a success.
fn error_from_response(status: StatusCode, body: Option<&Value>, text: &str) -> Option<ApiError> {
    let field = |name: &str| body.and_then(|b| b.get(name)).and_then(Value::as_str).unwrap_or("");
    let failed = !status.is_success() || field("status") == "fail";
    if !failed {
        return None;
    }

    let message = match field("message") {
        "" => preview(text),
        m => m.to_string(),
    };
    let lowered = format!("{} {}", message, field("error_type")).to_lowercase();

    let err = if status == StatusCode::TOO_MANY_REQUESTS
        || lowered.contains("please wait")
        || lowered.contains("feedback_required")
        || lowered.contains("rate_limit")
    {
        ApiError::RateLimited(message)
    } else if lowered.contains("checkpoint")
        || lowered.contains("challenge_required")
        || lowered.contains("two_factor_required")
    {
        ApiError::VerificationRequired(message)
    } else if lowered.contains("bad_password")
        || lowered.contains("invalid_user")
        || lowered.contains("invalid_credentials")
    {
        ApiError::InvalidCredentials(message)
    } else if lowered.contains("login_required") || status == StatusCode::UNAUTHORIZED {
        ApiError::SessionInvalid(message)
    } else if status == StatusCode::NOT_FOUND {
        ApiError::NotFound(message)
    } else if status.is_success() {
        ApiError::Other(message)
    } else {
        ApiError::Http {
            status: status.as_u16(),
            message,
        }
    };
    Some(err)
}

/// Convert a GraphQL `shortcode_media` node to the private API media shape.
fn graphql_to_v1(media: &Value) -> Value {
    let sidecar = media.pointer("/edge_sidecar_to_children/edges").and_then(Value::as_array);
    let is_video = media.get("is_video").and_then(Value::as_bool).unwrap_or(false);
    let kind = if sidecar.is_some() {
        MediaKind::Carousel
    } else if is_video {
        MediaKind::Video
    } else {
        MediaKind::Photo
    };

    let resources: Vec<Value> = sidecar
        .map(|edges| {
            edges
                .iter()
                .filter_map(|edge| edge.get("node"))
                .map(|node| {
                    json!({
                        "display_url": node.get("display_url"),
                        "video_url": node.get("video_url"),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    json!({
        "pk": media.get("id"),
        "code": media.get("shortcode"),
        "media_kind": kind,
        "user": { "username": media.pointer("/owner/username") },
        "caption": { "text": media.pointer("/edge_media_to_caption/edges/0/node/text") },
        "video_url": media.get("video_url"),
        "display_url": media.get("display_url"),
        "thumbnail_url": media.get("thumbnail_src"),
        "carousel_media": resources,
        "taken_at": media.get("taken_at_timestamp"),
    })
}

fn form_body(pairs: &[(&str, &str)]) -> String {
    pairs
        .iter()
        .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

fn preview(text: &str) -> String {
    text.chars().take(300).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instagram::raw::RawMedia;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_rate_limiter_allows_under_limit() {
        let limiter = RateLimiter::new(config::api::RATE_LIMIT_PER_HOUR);
        for _ in 0..10 {
            assert!(limiter.acquire());
        }
    }

    #[test]
    fn test_rate_limiter_blocks_at_limit() {
        let limiter = RateLimiter::new(config::api::RATE_LIMIT_PER_HOUR);
        for _ in 0..config::api::RATE_LIMIT_PER_HOUR {
            assert!(limiter.acquire());
        }
        // Should be blocked now
        assert!(!limiter.acquire());
    }

    #[test]
    fn test_success_is_not_an_error() {
        let body = json!({"status": "ok"});
        assert_eq!(error_from_response(StatusCode::OK, Some(&body), ""), None);
    }

    #[test]
    fn test_error_mapping() {
        let bad_password = json!({"message": "The password you entered is incorrect.", "error_type": "bad_password", "status": "fail"});
        assert!(matches!(
            error_from_response(StatusCode::BAD_REQUEST, Some(&bad_password), ""),
            Some(ApiError::InvalidCredentials(_))
        ));

        let challenge = json!({"message": "challenge_required", "status": "fail"});
        assert!(matches!(
            error_from_response(StatusCode::BAD_REQUEST, Some(&challenge), ""),
            Some(ApiError::VerificationRequired(_))
        ));

        let wait = json!({"message": "Please wait a few minutes before you try again.", "status": "fail"});
        assert!(matches!(
            error_from_response(StatusCode::BAD_REQUEST, Some(&wait), ""),
            Some(ApiError::RateLimited(_))
        ));

        let login = json!({"message": "login_required", "status": "fail"});
        assert!(matches!(
            error_from_response(StatusCode::FORBIDDEN, Some(&login), ""),
            Some(ApiError::SessionInvalid(_))
        ));

        assert!(matches!(
            error_from_response(StatusCode::TOO_MANY_REQUESTS, None, "slow down"),
            Some(ApiError::RateLimited(_))
        ));

        assert!(matches!(
            error_from_response(StatusCode::BAD_GATEWAY, None, "<html>"),
            Some(ApiError::Http { status: 502, .. })
        ));
    }

    #[test]
    fn test_fail_status_with_200_is_error() {
        let body = json!({"status": "fail", "message": "something broke"});
        assert_eq!(
            error_from_response(StatusCode::OK, Some(&body), ""),
            Some(ApiError::Other("something broke".to_string()))
        );
    }

    #[test]
    fn test_graphql_sidecar_converts_to_carousel() {
        let media = json!({
            "id": "3100",
            "shortcode": "CODE1",
            "owner": {"username": "author"},
            "edge_media_to_caption": {"edges": [{"node": {"text": "hello"}}]},
            "display_url": "https://cdn/cover.jpg",
            "taken_at_timestamp": 1_700_000_000,
            "edge_sidecar_to_children": {"edges": [
                {"node": {"display_url": "https://cdn/1.jpg"}},
                {"node": {"display_url": "https://cdn/2.jpg", "is_video": true, "video_url": "https://cdn/2.mp4"}}
            ]}
        });
        let raw = RawMedia::from_value(graphql_to_v1(&media)).unwrap();
        assert_eq!(raw.kind(), MediaKind::Carousel);
        assert_eq!(raw.username(), Some("author"));
        assert_eq!(raw.caption(), Some("hello"));
        assert_eq!(raw.code(), Some("CODE1"));
        assert_eq!(raw.pk_string().as_deref(), Some("3100"));
        assert_eq!(raw.carousel_media.len(), 2);
        assert_eq!(raw.carousel_media[1].image_url(), Some("https://cdn/2.jpg"));
    }

    #[test]
    fn test_graphql_single_video() {
        let media = json!({"shortcode": "V", "is_video": true, "video_url": "https://cdn/v.mp4"});
        let raw = RawMedia::from_value(graphql_to_v1(&media)).unwrap();
        assert_eq!(raw.kind(), MediaKind::Video);
        assert_eq!(raw.video_url(), Some("https://cdn/v.mp4"));
        assert!(raw.carousel_media.is_empty());
    }

    #[test]
    fn test_form_body_encodes_values() {
        assert_eq!(form_body(&[("a", "x y"), ("b", "#1:2")]), "a=x%20y&b=%231%3A2");
    }
}
