//! Scripted in-memory [`PlatformApi`].
//!
//! Each operation pops a scripted result if one is queued and otherwise falls
//! back to a benign default. Every call is counted.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

use crate::instagram::{ApiError, Credentials, LoginError, Message, PlatformApi, Session, Thread, TransportSettings};

/// Number of calls per operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub authenticate: usize,
    pub restore_session: usize,
    pub probe: usize,
    pub list_recent_threads: usize,
    pub list_recent_messages: usize,
    pub media_info: usize,
    pub media_id_from_url: usize,
    pub media_info_legacy: usize,
}

#[derive(Default)]
struct State {
    calls: CallCounts,
    authenticate: VecDeque<Result<Session, LoginError>>,
    restore: VecDeque<Result<Session, ApiError>>,
    probe: VecDeque<Result<(), ApiError>>,
    threads: VecDeque<Result<Vec<Thread>, ApiError>>,
    default_threads: Vec<Thread>,
    messages: HashMap<String, VecDeque<Result<Vec<Message>, ApiError>>>,
    default_messages: HashMap<String, Vec<Message>>,
    media_info: HashMap<String, Result<Value, ApiError>>,
    media_ids: HashMap<String, Result<String, ApiError>>,
    legacy: HashMap<String, Result<Value, ApiError>>,
    cancel_after_thread_fetches: Option<(usize, CancellationToken)>,
}

/// In-memory platform used by unit and integration tests.
#[derive(Default)]
pub struct MockApi {
    state: Mutex<State>,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// A deterministic session for `account`.
    pub fn session(account: &str) -> Session {
        Session {
            account: account.to_string(),
            user_id: "1000".to_string(),
            created_at: Utc.timestamp_opt(1_700_000_000, 0).single().unwrap_or_else(Utc::now),
            settings: TransportSettings {
                authorization: Some(format!("Bearer IGT:2:{}", account)),
                device_id: Some("android-0123456789abcdef".to_string()),
                ..TransportSettings::default()
            },
        }
    }

    pub fn thread(id: &str) -> Thread {
        Thread {
            id: id.to_string(),
            thread_title: None,
            items: Vec::new(),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn calls(&self) -> CallCounts {
        self.state().calls.clone()
    }

    pub fn push_authenticate(&self, result: Result<Session, LoginError>) {
        self.state().authenticate.push_back(result);
    }

    pub fn push_restore(&self, result: Result<Session, ApiError>) {
        self.state().restore.push_back(result);
    }

    pub fn push_probe(&self, result: Result<(), ApiError>) {
        self.state().probe.push_back(result);
    }

    /// Queue one thread listing result (used before the default listing).
    pub fn push_threads(&self, result: Result<Vec<Thread>, ApiError>) {
        self.state().threads.push_back(result);
    }

    /// Listing returned once the queue is drained.
    pub fn set_threads(&self, threads: Vec<Thread>) {
        self.state().default_threads = threads;
    }

    pub fn push_messages(&self, thread_id: &str, result: Result<Vec<Message>, ApiError>) {
        self.state()
            .messages
            .entry(thread_id.to_string())
            .or_default()
            .push_back(result);
    }

    pub fn set_messages(&self, thread_id: &str, messages: Vec<Message>) {
        self.state().default_messages.insert(thread_id.to_string(), messages);
    }

    pub fn set_media_info(&self, media_id: &str, raw: Value) {
        self.state().media_info.insert(media_id.to_string(), Ok(raw));
    }

    pub fn fail_media_info(&self, media_id: &str, err: ApiError) {
        self.state().media_info.insert(media_id.to_string(), Err(err));
    }

    pub fn set_media_id(&self, url: &str, media_id: &str) {
        self.state().media_ids.insert(url.to_string(), Ok(media_id.to_string()));
    }

    pub fn set_legacy(&self, shortcode: &str, raw: Value) {
        self.state().legacy.insert(shortcode.to_string(), Ok(raw));
    }

    /// Cancel `token` once the thread listing has been requested `fetches` times.
    pub fn cancel_after_thread_fetches(&self, fetches: usize, token: CancellationToken) {
        self.state().cancel_after_thread_fetches = Some((fetches, token));
    }
}

#[async_trait]
impl PlatformApi for MockApi {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Session, LoginError> {
        let mut state = self.state();
        state.calls.authenticate += 1;
        state
            .authenticate
            .pop_front()
            .unwrap_or_else(|| Ok(Self::session(&credentials.username)))
    }

    async fn restore_session(&self, session: &Session) -> Result<Session, ApiError> {
        let mut state = self.state();
        state.calls.restore_session += 1;
        state.restore.pop_front().unwrap_or_else(|| Ok(session.clone()))
    }

    async fn probe(&self, _session: &Session) -> Result<(), ApiError> {
        let mut state = self.state();
        state.calls.probe += 1;
        state.probe.pop_front().unwrap_or(Ok(()))
    }

    async fn list_recent_threads(&self, _session: &Session, limit: usize) -> Result<Vec<Thread>, ApiError> {
        let mut state = self.state();
        state.calls.list_recent_threads += 1;
        let fetches = state.calls.list_recent_threads;
        if let Some((after, token)) = &state.cancel_after_thread_fetches {
            if fetches >= *after {
                token.cancel();
            }
        }
        let result = match state.threads.pop_front() {
            Some(result) => result,
            None => Ok(state.default_threads.clone()),
        };
        result.map(|mut threads| {
            threads.truncate(limit);
            threads
        })
    }

    async fn list_recent_messages(
        &self,
        _session: &Session,
        thread_id: &str,
        limit: usize,
    ) -> Result<Vec<Message>, ApiError> {
        let mut state = self.state();
        state.calls.list_recent_messages += 1;
        let scripted = state.messages.get_mut(thread_id).and_then(VecDeque::pop_front);
        let result = match scripted {
            Some(result) => result,
            None => Ok(state.default_messages.get(thread_id).cloned().unwrap_or_default()),
        };
        result.map(|mut messages| {
            messages.truncate(limit);
            messages
        })
    }

    async fn media_info(&self, _session: &Session, media_id: &str) -> Result<Value, ApiError> {
        let mut state = self.state();
        state.calls.media_info += 1;
        state
            .media_info
            .get(media_id)
            .cloned()
            .unwrap_or_else(|| Err(ApiError::NotFound(format!("media {}", media_id))))
    }

    async fn media_id_from_url(&self, _session: &Session, url: &str) -> Result<String, ApiError> {
        let mut state = self.state();
        state.calls.media_id_from_url += 1;
        state
            .media_ids
            .get(url)
            .cloned()
            .unwrap_or_else(|| Err(ApiError::NotFound(format!("no media id for {}", url))))
    }

    async fn media_info_legacy(&self, _session: &Session, shortcode: &str) -> Result<Value, ApiError> {
        let mut state = self.state();
        state.calls.media_info_legacy += 1;
        state
            .legacy
            .get(shortcode)
            .cloned()
            .unwrap_or_else(|| Err(ApiError::NotFound(format!("post {}", shortcode))))
    }
}
