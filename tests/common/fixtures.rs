//! Fixtures for watcher integration tests
//!
//! [`WatcherEnv`] wires a [`DmWatcher`] to a scripted [`MockApi`], a temporary
//! state directory and an in-process record channel.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;

use igrelay::instagram::Credentials;
use igrelay::testing::MockApi;
use igrelay::watcher::{BackoffPolicy, ChannelSink, DedupStore, DmWatcher};
use igrelay::{ContentRecord, SessionManager, SessionStore};

pub fn init_logging() {
    let _ = pretty_env_logger::try_init();
}

pub struct WatcherEnv {
    pub api: Arc<MockApi>,
    pub records: UnboundedReceiver<ContentRecord>,
    pub dir: TempDir,
    sink: Option<ChannelSink>,
}

impl WatcherEnv {
    pub fn new() -> Self {
        init_logging();
        let (sink, records) = ChannelSink::channel();
        Self {
            api: Arc::new(MockApi::new()),
            records,
            dir: TempDir::new().expect("temp dir"),
            sink: Some(sink),
        }
    }

    pub fn dedup_path(&self) -> PathBuf {
        self.dir.path().join("processed_messages.json")
    }

    pub fn session_path(&self) -> PathBuf {
        self.dir.path().join("alice_session.json")
    }

    /// Build a watcher over the current state files.
    pub async fn watcher(&mut self, policy: BackoffPolicy) -> DmWatcher {
        let sessions = SessionManager::new(
            self.api.clone(),
            SessionStore::new(self.dir.path()),
            Credentials::new("alice", "hunter2"),
        );
        let dedup = DedupStore::load(self.dedup_path(), 0).await.expect("dedup load");
        let sink = self.sink.take().unwrap_or_else(|| {
            let (sink, records) = ChannelSink::channel();
            self.records = records;
            sink
        });
        DmWatcher::new(self.api.clone(), sessions, dedup, Box::new(sink)).with_policy(policy)
    }

    pub fn drain(&mut self) -> Vec<ContentRecord> {
        let mut out = Vec::new();
        while let Ok(record) = self.records.try_recv() {
            out.push(record);
        }
        out
    }
}
