//! HttpApi against a local mock server (wiremock).

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use igrelay::instagram::{ApiError, Credentials, FailureClass, HttpApi, LoginError, PlatformApi, RawMedia};
use igrelay::testing::MockApi;
use igrelay::watcher::{ChannelSink, DedupStore, DmWatcher};
use igrelay::{SessionManager, SessionStore};

async fn setup() -> (MockServer, HttpApi) {
    common::init_logging();
    let server = MockServer::start().await;
    let api = HttpApi::with_base_urls(&server.uri(), &server.uri()).unwrap();
    (server, api)
}

#[tokio::test]
async fn test_login_builds_session_from_headers() {
    let (server, api) = setup().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/accounts/login/"))
        .and(body_string_contains("username=alice"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("ig-set-authorization", "Bearer IGT:2:token")
                .set_body_json(json!({"status": "ok", "logged_in_user": {"pk": 4242, "username": "alice"}})),
        )
        .mount(&server)
        .await;

    let session = api.authenticate(&Credentials::new("alice", "pw")).await.unwrap();
    assert_eq!(session.account, "alice");
    assert_eq!(session.user_id, "4242");
    assert_eq!(session.settings.authorization.as_deref(), Some("Bearer IGT:2:token"));
    assert!(session.settings.device_id.unwrap().starts_with("android-"));
}

#[tokio::test]
async fn test_login_rejections_are_classified() {
    let (server, api) = setup().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/accounts/login/"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "status": "fail",
            "message": "challenge_required",
            "error_type": "checkpoint_challenge_required"
        })))
        .mount(&server)
        .await;

    let err = api.authenticate(&Credentials::new("alice", "pw")).await.unwrap_err();
    assert!(matches!(err, LoginError::VerificationRequired(_)));
}

#[tokio::test]
async fn test_inbox_repaired_before_parsing() {
    let (server, api) = setup().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/direct_v2/inbox/"))
        .and(header("authorization", "Bearer IGT:2:alice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ok",
            "inbox": {"threads": [
                {"thread_id": "340282366841710300949128", "thread_title": "friend", "items": [{
                    "item_id": "m1",
                    "media_share": {
                        "code": "ABC",
                        "clips_metadata": {"original_sound_info": {"_proxy____args": ["x"]}}
                    }
                }]},
                {"thread_id": 17, "items": [{
                    "item_id": "m2",
                    "clip": {"clip": {
                        "code": "REEL",
                        "clips_metadata": {"original_sound_info": {"audio_asset_id": 1}}
                    }}
                }]}
            ]}
        })))
        .mount(&server)
        .await;

    let threads = api.list_recent_threads(&MockApi::session("alice"), 5).await.unwrap();
    assert_eq!(threads.len(), 2);
    assert_eq!(threads[0].id, "340282366841710300949128");
    assert_eq!(threads[1].id, "17");
    assert_eq!(threads[0].items[0].share_handle().and_then(|h| h.code.as_deref()), Some("ABC"));
    assert_eq!(threads[1].items[0].share_handle().and_then(|h| h.code.as_deref()), Some("REEL"));
}

#[tokio::test]
async fn test_unrepairable_thread_items_are_transient() {
    let (server, api) = setup().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/direct_v2/threads/t1/"))
        .and(query_param("limit", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ok",
            "thread": {"items": [{
                "item_id": "m1",
                "media_share": {"clips_metadata": {"original_sound_info": "broken"}}
            }]}
        })))
        .mount(&server)
        .await;

    let err = api
        .list_recent_messages(&MockApi::session("alice"), "t1", 3)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Validation(_)));
    assert_eq!(err.classify(), FailureClass::TransientSkip);
}

#[tokio::test]
async fn test_thread_messages_parsed() {
    let (server, api) = setup().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/direct_v2/threads/t1/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ok",
            "thread": {"items": [
                {"item_id": "m1", "text": "https://www.instagram.com/p/ABC/"},
                {"item_id": "m2", "link": {"text": "see", "link_context": {"link_url": "https://www.instagram.com/reel/R/"}}},
                {"item_id": "m3", "text": "third"},
                {"item_id": "m4", "text": "dropped by limit"}
            ]}
        })))
        .mount(&server)
        .await;

    let messages = api
        .list_recent_messages(&MockApi::session("alice"), "t1", 3)
        .await
        .unwrap();
    let ids: Vec<_> = messages.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["m1", "m2", "m3"]);
    assert_eq!(
        messages[1].link.as_ref().and_then(|l| l.url()),
        Some("https://www.instagram.com/reel/R/")
    );
}

#[tokio::test]
async fn test_media_info_and_oembed() {
    let (server, api) = setup().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/oembed/"))
        .and(query_param("url", "https://www.instagram.com/p/ABC/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"media_id": "123_456"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/media/123_456/info/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ok",
            "items": [{"pk": 123, "code": "ABC", "media_type": 2, "video_versions": [{"url": "https://cdn/v.mp4"}]}]
        })))
        .mount(&server)
        .await;

    let session = MockApi::session("alice");
    let media_id = api
        .media_id_from_url(&session, "https://www.instagram.com/p/ABC/")
        .await
        .unwrap();
    assert_eq!(media_id, "123_456");

    let raw = RawMedia::from_value(api.media_info(&session, &media_id).await.unwrap()).unwrap();
    assert_eq!(raw.code(), Some("ABC"));
    assert_eq!(raw.video_url(), Some("https://cdn/v.mp4"));
}

#[tokio::test]
async fn test_missing_media_is_not_found() {
    let (server, api) = setup().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/media/1/info/"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"status": "fail", "message": "Media not found"})))
        .mount(&server)
        .await;

    let err = api.media_info(&MockApi::session("alice"), "1").await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}

#[tokio::test]
async fn test_graphql_legacy_lookup() {
    let (server, api) = setup().await;
    Mock::given(method("POST"))
        .and(path("/api/graphql"))
        .and(body_string_contains("ABC"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"xdt_shortcode_media": {
                "id": "99",
                "shortcode": "ABC",
                "owner": {"username": "author"},
                "display_url": "https://cdn/d.jpg"
            }}
        })))
        .mount(&server)
        .await;

    let raw = RawMedia::from_value(api.media_info_legacy(&MockApi::session("alice"), "ABC").await.unwrap()).unwrap();
    assert_eq!(raw.username(), Some("author"));
    assert_eq!(raw.pk_string().as_deref(), Some("99"));
}

#[tokio::test]
async fn test_rate_limit_and_session_errors() {
    let (server, api) = setup().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/direct_v2/inbox/"))
        .respond_with(ResponseTemplate::new(429).set_body_string("Please wait a few minutes"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/users/1000/info/"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({"status": "fail", "message": "login_required"})))
        .mount(&server)
        .await;

    let session = MockApi::session("alice");
    let err = api.list_recent_threads(&session, 5).await.unwrap_err();
    assert!(matches!(err, ApiError::RateLimited(_)));
    assert_eq!(err.classify(), FailureClass::Relogin);

    let err = api.probe(&session).await.unwrap_err();
    assert!(matches!(err, ApiError::SessionInvalid(_)));
}

#[tokio::test]
async fn test_lookup_budget_refuses_locally() {
    let (server, api) = setup().await;
    let api = api.with_lookup_limit(1);
    Mock::given(method("GET"))
        .and(path("/api/v1/media/7/info/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok", "items": [{"pk": 7}]})))
        .expect(1)
        .mount(&server)
        .await;

    let session = MockApi::session("alice");
    api.media_info(&session, "7").await.unwrap();
    let err = api.media_info(&session, "7").await.unwrap_err();
    assert!(matches!(err, ApiError::Throttled(_)));
    assert_eq!(err.classify(), FailureClass::TransientSkip);
}

#[tokio::test]
async fn test_steady_polling_keeps_persisted_session() {
    let (server, api) = setup().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/accounts/current_user/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok", "user": {"pk": 1000}})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/users/1000/info/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok", "user": {"pk": 1000}})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/direct_v2/inbox/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ok",
            "inbox": {"threads": [{"thread_id": "t1"}, {"thread_id": "t2"}]}
        })))
        .mount(&server)
        .await;
    for thread in ["t1", "t2"] {
        Mock::given(method("GET"))
            .and(path(format!("/api/v1/direct_v2/threads/{}/", thread)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok", "thread": {"items": []}})))
            .mount(&server)
            .await;
    }
    Mock::given(method("POST"))
        .and(path("/api/v1/accounts/login/"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let store = SessionStore::new(dir.path());
    store.save(&MockApi::session("alice")).await.unwrap();
    let session_path = store.path("alice");

    let api: Arc<dyn PlatformApi> = Arc::new(api);
    let sessions = SessionManager::new(api.clone(), store, Credentials::new("alice", "pw"));
    let dedup = DedupStore::load(dir.path().join("processed_messages.json"), 0).await.unwrap();
    let (sink, _records) = ChannelSink::channel();
    let mut watcher = DmWatcher::new(api, sessions, dedup, Box::new(sink));

    // well past an hour of 60 s cycles at four requests each
    for cycle in 0..250 {
        assert_eq!(watcher.run_cycle().await, Duration::from_secs(60), "cycle {}", cycle);
        assert!(session_path.exists(), "session file gone after cycle {}", cycle);
    }
}
