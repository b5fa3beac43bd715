//! Processed message ids, persisted as a JSON array.
//!
//! Retention is bounded by insertion order: once `max_entries` ids are held,
//! recording a new one evicts the oldest. `0` keeps everything.

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

use crate::core::error::AppResult;
use crate::session::write_atomic;

#[derive(Debug)]
pub struct DedupStore {
    path: PathBuf,
    order: VecDeque<String>,
    ids: HashSet<String>,
    max_entries: usize,
    dirty: bool,
}

impl DedupStore {
    /// Empty store that will persist to `path`.
    pub fn new(path: impl Into<PathBuf>, max_entries: usize) -> Self {
        Self {
            path: path.into(),
            order: VecDeque::new(),
            ids: HashSet::new(),
            max_entries,
            dirty: false,
        }
    }

    /// Read the persisted ids. A missing file gives an empty store; a file
    /// that is not a JSON array of strings is logged and ignored.
    pub async fn load(path: impl Into<PathBuf>, max_entries: usize) -> AppResult<Self> {
        let mut store = Self::new(path, max_entries);
        let contents = match fs_err::tokio::read_to_string(&store.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No processed message file at {}, starting empty", store.path.display());
                return Ok(store);
            }
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str::<Vec<String>>(&contents) {
            Ok(ids) => {
                for id in ids {
                    store.insert(id);
                }
                store.dirty = false;
                log::info!("Loaded {} processed message ids", store.len());
            }
            Err(e) => log::warn!(
                "Ignoring malformed processed message file {}: {}",
                store.path.display(),
                e
            ),
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn is_processed(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Record `id`; returns false when it was already present.
    pub fn mark_processed(&mut self, id: &str) -> bool {
        if self.ids.contains(id) {
            return false;
        }
        self.insert(id.to_string());
        true
    }

    fn insert(&mut self, id: String) {
        if !self.ids.insert(id.clone()) {
            return;
        }
        self.order.push_back(id);
        if self.max_entries > 0 {
            while self.order.len() > self.max_entries {
                if let Some(oldest) = self.order.pop_front() {
                    self.ids.remove(&oldest);
                }
            }
        }
        self.dirty = true;
    }

    /// Rewrite the file if anything changed since the last flush.
    pub async fn flush(&mut self) -> AppResult<()> {
        if !self.dirty {
            return Ok(());
        }
        let json = serde_json::to_string(&self.order)?;
        write_atomic(&self.path, json.as_bytes()).await?;
        self.dirty = false;
        log::debug!("Saved {} processed message ids", self.len());
        Ok(())
    }
}
