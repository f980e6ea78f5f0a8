//! Local filesystem storage implementation.
//!
//! Keeps the full state in memory. Content upserts and new alerts are
//! buffered and written by `flush`; watch changes, analysis results and
//! read marks write through. Writes go through a temp file and a rename
//! under the state lock, so files on disk always reflect some complete
//! sequence of mutations. A failed write leaves the file marked pending and
//! the next flush retries it.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── contents.json   # ScrapedContent rows
//! ├── watches.json    # Watch records
//! └── alerts.json     # Alert records
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::state::StoreState;
use super::{ContentStore, UpsertOutcome};
use crate::error::{AppError, Result};
use crate::models::{Alert, ContentItem, ScrapedContent, Watch};

const CONTENTS: &str = "contents.json";
const WATCHES: &str = "watches.json";
const ALERTS: &str = "alerts.json";

/// Files whose on-disk copy is behind the in-memory state.
#[derive(Debug, Default)]
struct Pending {
    contents: bool,
    alerts: bool,
}

#[derive(Debug)]
struct Inner {
    state: StoreState,
    pending: Pending,
}

/// Local filesystem storage backend.
pub struct LocalStorage {
    root_dir: PathBuf,
    inner: Mutex<Inner>,
}

impl LocalStorage {
    /// Open the store rooted at `root_dir`, loading any existing files.
    pub async fn open(root_dir: impl Into<PathBuf>) -> Result<Self> {
        let root_dir = root_dir.into();
        let contents: Vec<ScrapedContent> = read_json(&root_dir.join(CONTENTS))
            .await?
            .unwrap_or_default();
        let watches: Vec<Watch> = read_json(&root_dir.join(WATCHES))
            .await?
            .unwrap_or_default();
        let alerts: Vec<Alert> = read_json(&root_dir.join(ALERTS))
            .await?
            .unwrap_or_default();

        log::debug!(
            "Opened store at {:?}: {} contents, {} watches, {} alerts",
            root_dir,
            contents.len(),
            watches.len(),
            alerts.len()
        );

        Ok(Self {
            root_dir,
            inner: Mutex::new(Inner {
                state: StoreState::from_parts(contents, watches, alerts),
                pending: Pending::default(),
            }),
        })
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Write every pending file; a file stays pending until its write succeeds.
    async fn write_pending(&self, inner: &mut Inner) -> Result<()> {
        if inner.pending.contents {
            self.write_json(CONTENTS, &inner.state.contents).await?;
            inner.pending.contents = false;
        }
        if inner.pending.alerts {
            self.write_json(ALERTS, &inner.state.alerts).await?;
            inner.pending.alerts = false;
        }
        Ok(())
    }
}

/// Read JSON data, returning None if the file doesn't exist.
async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(AppError::Io(e)),
    }
}

#[async_trait]
impl ContentStore for LocalStorage {
    async fn upsert_content(
        &self,
        source_id: Option<&str>,
        item: &ContentItem,
        now: DateTime<Utc>,
    ) -> Result<UpsertOutcome> {
        let mut inner = self.inner.lock().await;
        let outcome = inner.state.upsert(source_id, item, now);
        // last_checked moves even when the hash is unchanged
        inner.pending.contents = true;
        Ok(outcome)
    }

    async fn content_by_url(&self, url: &str) -> Result<Option<ScrapedContent>> {
        Ok(self.inner.lock().await.state.by_url(url).cloned())
    }

    async fn latest_content(&self, limit: usize) -> Result<Vec<ScrapedContent>> {
        Ok(self.inner.lock().await.state.latest(limit))
    }

    async fn matchable_content(&self, window: usize) -> Result<Vec<ScrapedContent>> {
        Ok(self.inner.lock().await.state.matchable(window))
    }

    async fn search_content(&self, query: &str, limit: usize) -> Result<Vec<ScrapedContent>> {
        Ok(self.inner.lock().await.state.search(query, limit))
    }

    async fn record_analysis(
        &self,
        content_id: Uuid,
        summary: Option<String>,
        tags: Vec<String>,
    ) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        if !inner.state.record_analysis(content_id, summary, tags) {
            return Ok(false);
        }
        inner.pending.contents = true;
        self.write_pending(&mut inner).await?;
        Ok(true)
    }

    async fn add_watch(&self, watch: Watch) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.state.add_watch(watch);
        self.write_json(WATCHES, &inner.state.watches).await
    }

    async fn remove_watch(&self, watch_id: Uuid) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        if !inner.state.remove_watch(watch_id) {
            return Ok(false);
        }
        self.write_json(WATCHES, &inner.state.watches).await?;
        Ok(true)
    }

    async fn watches(&self) -> Result<Vec<Watch>> {
        Ok(self.inner.lock().await.state.watches.clone())
    }

    async fn insert_alert(&self, alert: Alert) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        if !inner.state.insert_alert(alert) {
            return Ok(false);
        }
        inner.pending.alerts = true;
        Ok(true)
    }

    async fn alerts_for_user(&self, user_id: &str, unread_only: bool) -> Result<Vec<Alert>> {
        Ok(self
            .inner
            .lock()
            .await
            .state
            .alerts_for_user(user_id, unread_only))
    }

    async fn mark_alert_read(&self, alert_id: Uuid) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        if !inner.state.mark_alert_read(alert_id) {
            return Ok(false);
        }
        inner.pending.alerts = true;
        self.write_pending(&mut inner).await?;
        Ok(true)
    }

    async fn flush(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        self.write_pending(&mut inner).await
    }
}
