//! Direct message poll loop.
//!
//! One cycle: make sure a session exists, list recent threads, read the newest
//! messages of the first few threads, and turn every unseen message into
//! records. Each cycle ends by flushing the dedup store and choosing a pause.
//! The loop runs until its cancellation token fires.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::extract::ContentExtractor;
use crate::instagram::{FailureClass, Message, PlatformApi, Session, Thread};
use crate::session::SessionManager;
use crate::share::{detect_references, normalize, PostReference, ShortcodeResolver};
use crate::watcher::backoff::{BackoffPolicy, PollState};
use crate::watcher::dedup::DedupStore;
use crate::watcher::sink::RecordSink;

/// How a cycle ended, short of an unexpected failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Threads were fetched and inspected
    Completed,
    /// Thread listing hit a transient schema failure
    TransientSkip,
    /// The session could not be re-established
    LoginFailed,
}

/// Inbox poller. Owns the session, the dedup store and the sink.
pub struct DmWatcher {
    api: Arc<dyn PlatformApi>,
    sessions: SessionManager,
    resolver: ShortcodeResolver,
    extractor: ContentExtractor,
    dedup: DedupStore,
    sink: Box<dyn RecordSink>,
    policy: BackoffPolicy,
    state: PollState,
}

impl DmWatcher {
    pub fn new(
        api: Arc<dyn PlatformApi>,
        sessions: SessionManager,
        dedup: DedupStore,
        sink: Box<dyn RecordSink>,
    ) -> Self {
        Self {
            resolver: ShortcodeResolver::new(api.clone()),
            extractor: ContentExtractor::new(api.clone()),
            api,
            sessions,
            dedup,
            sink,
            policy: BackoffPolicy::default(),
            state: PollState::default(),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: BackoffPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn state(&self) -> &PollState {
        &self.state
    }

    pub fn dedup(&self) -> &DedupStore {
        &self.dedup
    }

    /// Poll until `token` is cancelled. Cancellation is honored between
    /// cycles and during pauses; the dedup store is flushed on the way out.
    pub async fn run(mut self, token: CancellationToken) -> AppResult<()> {
        log::info!(
            "Starting DM monitoring for {} (interval: {}s)",
            self.sessions.account(),
            self.policy.interval.as_secs()
        );

        while !token.is_cancelled() {
            let pause = self.run_cycle().await;
            log::info!("Waiting {} seconds before next check...", pause.as_secs());
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(pause) => {}
            }
        }

        log::info!("DM monitoring stopped, saving processed messages");
        self.dedup.flush().await
    }

    /// One full cycle including bookkeeping; returns the pause before the next.
    pub async fn run_cycle(&mut self) -> Duration {
        let outcome = self.poll_once().await;

        if let Err(e) = self.dedup.flush().await {
            log::error!("Failed to save processed messages: {}", e);
        }

        match outcome {
            Ok(CycleOutcome::Completed) => {
                self.state.record_success();
                self.policy.interval
            }
            Ok(CycleOutcome::TransientSkip) => self.state.record_validation_failure(&self.policy),
            Ok(CycleOutcome::LoginFailed) => {
                log::error!("Re-login failed, waiting {}s", self.policy.long_backoff.as_secs());
                self.policy.long_backoff
            }
            Err(e) => {
                log::error!("Critical error in DM fetching: {}", e);
                self.state.record_critical_failure(&self.policy)
            }
        }
    }

    async fn poll_once(&mut self) -> AppResult<CycleOutcome> {
        let mut session = match self.sessions.ensure_valid().await {
            Ok(session) => session,
            Err(e) => {
                log::error!("No usable session: {}", e);
                return Ok(CycleOutcome::LoginFailed);
            }
        };

        log::info!("Fetching recent DMs...");
        let threads = match self.api.list_recent_threads(&session, config::poll::THREAD_FETCH_LIMIT).await {
            Ok(threads) => threads,
            Err(e) => {
                log::error!("Failed to fetch threads: {}", e);
                match e.classify() {
                    FailureClass::TransientSkip => return Ok(CycleOutcome::TransientSkip),
                    FailureClass::Relogin => {
                        session = match self.sessions.login().await {
                            Ok(session) => session,
                            Err(_) => return Ok(CycleOutcome::LoginFailed),
                        };
                        self.api
                            .list_recent_threads(&session, config::poll::THREAD_FETCH_LIMIT)
                            .await?
                    }
                }
            }
        };
        log::info!("Successfully fetched {} threads", threads.len());

        if threads.is_empty() {
            log::info!("No threads available for processing");
        }
        for thread in threads.iter().take(config::poll::THREADS_PER_CYCLE) {
            self.poll_thread(&session, thread).await;
        }
        Ok(CycleOutcome::Completed)
    }

    async fn poll_thread(&mut self, session: &Session, thread: &Thread) {
        log::info!("Checking thread: {}", thread.id);
        let messages = match self
            .api
            .list_recent_messages(session, &thread.id, config::poll::MESSAGES_PER_THREAD)
            .await
        {
            Ok(messages) => messages,
            Err(e) => {
                match e.classify() {
                    FailureClass::TransientSkip => {
                        log::warn!("Skipping thread {} after transient error: {}", thread.id, e)
                    }
                    FailureClass::Relogin => {
                        log::error!("Error processing thread {}: {}", thread.id, e);
                        self.sessions.invalidate();
                    }
                }
                return;
            }
        };

        for message in &messages {
            if self.dedup.is_processed(&message.id) {
                continue;
            }
            log::info!("Processing new message: {}", message.id);
            match self.process_message(session, message).await {
                Ok(0) => log::info!("No Instagram links found in message {}", message.id),
                Ok(emitted) => log::info!("Emitted {} record(s) for message {}", emitted, message.id),
                Err(e) => log::error!("Error processing message {}: {}", message.id, e),
            }
            self.dedup.mark_processed(&message.id);
        }
    }

    /// Detect, resolve, extract and emit every post in `message`.
    ///
    /// A failed delivery does not stop the remaining posts; it is reported once
    /// all of them were tried.
    async fn process_message(&self, session: &Session, message: &Message) -> AppResult<usize> {
        let references = detect_references(message);
        let mut emitted = 0;
        let mut undelivered = 0;
        for reference in &references {
            let Some(identifier) = self.resolver.resolve(session, reference).await else {
                log::warn!("Skipping unresolvable reference in message {}", message.id);
                continue;
            };
            let source_url = match reference {
                PostReference::CanonicalUrl(url) => Some(normalize(url).url),
                _ => None,
            };
            let record = self
                .extractor
                .extract(session, &identifier, source_url.as_deref())
                .await;
            log::info!(
                "Extracted @{} ({}, {} image(s))",
                record.username,
                record.media_type,
                record.image_urls.len()
            );
            match self.sink.emit(&record).await {
                Ok(()) => emitted += 1,
                Err(e) => {
                    log::error!("Delivery failed for {}: {}", record.url, e);
                    undelivered += 1;
                }
            }
        }
        if undelivered > 0 {
            return Err(AppError::Delivery(format!(
                "{} of {} record(s) not delivered",
                undelivered,
                emitted + undelivered
            )));
        }
        Ok(emitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instagram::{ApiError, Credentials, LoginError};
    use crate::session::SessionStore;
    use crate::testing::MockApi;
    use crate::watcher::sink::ChannelSink;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;
    use tokio::sync::mpsc::UnboundedReceiver;

    use crate::extract::ContentRecord;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Refuses the first record, forwards the rest.
    struct FirstFailsSink {
        inner: ChannelSink,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RecordSink for FirstFailsSink {
        async fn emit(&self, record: &ContentRecord) -> AppResult<()> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(AppError::Delivery("consumer busy".into()));
            }
            self.inner.emit(record).await
        }
    }

    struct Harness {
        api: Arc<MockApi>,
        watcher: DmWatcher,
        records: UnboundedReceiver<ContentRecord>,
        _dir: TempDir,
    }

    fn harness() -> Harness {
        let dir = TempDir::new().unwrap();
        let api = Arc::new(MockApi::new());
        let sessions = SessionManager::new(
            api.clone(),
            SessionStore::new(dir.path()),
            Credentials::new("alice", "hunter2"),
        );
        let dedup = DedupStore::new(dir.path().join("processed.json"), 0);
        let (sink, records) = ChannelSink::channel();
        let watcher = DmWatcher::new(api.clone(), sessions, dedup, Box::new(sink));
        Harness {
            api,
            watcher,
            records,
            _dir: dir,
        }
    }

    fn drain(rx: &mut UnboundedReceiver<ContentRecord>) -> Vec<ContentRecord> {
        let mut out = Vec::new();
        while let Ok(record) = rx.try_recv() {
            out.push(record);
        }
        out
    }

    #[tokio::test]
    async fn test_link_message_emitted_and_marked() {
        let mut h = harness();
        h.api.set_threads(vec![MockApi::thread("t1")]);
        h.api.set_messages(
            "t1",
            vec![Message::text("m1", "look https://www.instagram.com/p/B58TfHTnY2u/?igsh=xyz")],
        );
        h.api.set_media_info("2196716419282734510", json!({"user": {"username": "author"}}));

        let pause = h.watcher.run_cycle().await;
        assert_eq!(pause, Duration::from_secs(60));

        let records = drain(&mut h.records);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].username, "author");
        assert_eq!(records[0].url, "https://www.instagram.com/p/B58TfHTnY2u/");
        assert!(h.watcher.dedup().is_processed("m1"));
    }

    #[tokio::test]
    async fn test_processed_message_not_extracted_again() {
        let mut h = harness();
        h.api.set_threads(vec![MockApi::thread("t1")]);
        h.api.set_messages("t1", vec![Message::text("m1", "https://www.instagram.com/p/ABC/")]);

        h.watcher.run_cycle().await;
        h.watcher.run_cycle().await;

        assert_eq!(drain(&mut h.records).len(), 1);
        assert_eq!(h.api.calls().media_info_legacy, 1);
    }

    #[tokio::test]
    async fn test_plain_message_marked_without_record() {
        let mut h = harness();
        h.api.set_threads(vec![MockApi::thread("t1")]);
        h.api.set_messages("t1", vec![Message::text("m1", "hi there")]);

        assert_eq!(h.watcher.run_cycle().await, Duration::from_secs(60));
        assert!(drain(&mut h.records).is_empty());
        assert!(h.watcher.dedup().is_processed("m1"));
    }

    #[tokio::test]
    async fn test_only_first_two_threads_inspected() {
        let mut h = harness();
        h.api.set_threads(vec![
            MockApi::thread("t1"),
            MockApi::thread("t2"),
            MockApi::thread("t3"),
        ]);
        h.watcher.run_cycle().await;
        assert_eq!(h.api.calls().list_recent_messages, 2);
    }

    #[tokio::test]
    async fn test_relogin_then_refetch() {
        let mut h = harness();
        h.api.push_threads(Err(ApiError::SessionInvalid("expired".into())));
        h.api.set_threads(vec![MockApi::thread("t1")]);

        assert_eq!(h.watcher.run_cycle().await, Duration::from_secs(60));
        assert_eq!(h.api.calls().list_recent_threads, 2);
        assert_eq!(h.api.calls().list_recent_messages, 1);
    }

    #[tokio::test]
    async fn test_failed_relogin_takes_long_pause() {
        let mut h = harness();
        h.watcher.run_cycle().await;
        h.api.push_threads(Err(ApiError::Network("reset".into())));
        h.api.push_restore(Err(ApiError::SessionInvalid("gone".into())));
        h.api.push_authenticate(Err(LoginError::RateLimited("wait".into())));

        assert_eq!(h.watcher.run_cycle().await, Duration::from_secs(300));
    }

    #[tokio::test]
    async fn test_failure_after_relogin_is_critical() {
        let mut h = harness();
        h.api.push_threads(Err(ApiError::Network("reset".into())));
        h.api.push_threads(Err(ApiError::Network("reset again".into())));

        assert_eq!(h.watcher.run_cycle().await, Duration::from_secs(120));
        assert_eq!(h.watcher.state().critical_errors, 1);
    }

    #[tokio::test]
    async fn test_message_fetch_error_skips_thread_only() {
        let mut h = harness();
        h.api.set_threads(vec![MockApi::thread("t1"), MockApi::thread("t2")]);
        h.api.push_messages("t1", Err(ApiError::Validation("clips_metadata".into())));
        h.api.set_messages("t2", vec![Message::text("m2", "no links")]);

        assert_eq!(h.watcher.run_cycle().await, Duration::from_secs(60));
        assert!(h.watcher.dedup().is_processed("m2"));
    }

    #[tokio::test]
    async fn test_delivery_failure_still_marks_message() {
        let mut h = harness();
        h.api.set_threads(vec![MockApi::thread("t1")]);
        h.api.set_messages("t1", vec![Message::text("m1", "https://www.instagram.com/reel/XYZ/")]);
        drop(h.records);

        assert_eq!(h.watcher.run_cycle().await, Duration::from_secs(60));
        assert!(h.watcher.dedup().is_processed("m1"));
    }

    #[tokio::test]
    async fn test_delivery_failure_does_not_drop_later_posts() {
        let dir = TempDir::new().unwrap();
        let api = Arc::new(MockApi::new());
        api.set_threads(vec![MockApi::thread("t1")]);
        api.set_messages(
            "t1",
            vec![Message::text(
                "m1",
                "https://www.instagram.com/p/AAA/ and https://www.instagram.com/p/BBB/",
            )],
        );
        let sessions = SessionManager::new(
            api.clone(),
            SessionStore::new(dir.path()),
            Credentials::new("alice", "hunter2"),
        );
        let (inner, mut records) = ChannelSink::channel();
        let sink = FirstFailsSink {
            inner,
            calls: AtomicUsize::new(0),
        };
        let mut watcher = DmWatcher::new(
            api.clone(),
            sessions,
            DedupStore::new(dir.path().join("processed.json"), 0),
            Box::new(sink),
        );

        assert_eq!(watcher.run_cycle().await, Duration::from_secs(60));
        let delivered = drain(&mut records);
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].url, "https://www.instagram.com/p/BBB/");
        assert!(watcher.dedup().is_processed("m1"));
    }
}
