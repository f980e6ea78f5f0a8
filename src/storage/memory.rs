//! In-process content store.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::state::StoreState;
use super::{ContentStore, UpsertOutcome};
use crate::error::{AppError, Result};
use crate::models::{Alert, ContentItem, ScrapedContent, Watch};

/// Store holding everything in memory; contents are lost on drop.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with watches.
    pub fn with_watches(watches: Vec<Watch>) -> Self {
        Self {
            state: Mutex::new(StoreState::from_parts(Vec::new(), watches, Vec::new())),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>> {
        self.state.lock().map_err(AppError::storage)
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn upsert_content(
        &self,
        source_id: Option<&str>,
        item: &ContentItem,
        now: DateTime<Utc>,
    ) -> Result<UpsertOutcome> {
        Ok(self.lock()?.upsert(source_id, item, now))
    }

    async fn content_by_url(&self, url: &str) -> Result<Option<ScrapedContent>> {
        Ok(self.lock()?.by_url(url).cloned())
    }

    async fn latest_content(&self, limit: usize) -> Result<Vec<ScrapedContent>> {
        Ok(self.lock()?.latest(limit))
    }

    async fn matchable_content(&self, window: usize) -> Result<Vec<ScrapedContent>> {
        Ok(self.lock()?.matchable(window))
    }

    async fn search_content(&self, query: &str, limit: usize) -> Result<Vec<ScrapedContent>> {
        Ok(self.lock()?.search(query, limit))
    }

    async fn record_analysis(
        &self,
        content_id: Uuid,
        summary: Option<String>,
        tags: Vec<String>,
    ) -> Result<bool> {
        Ok(self.lock()?.record_analysis(content_id, summary, tags))
    }

    async fn add_watch(&self, watch: Watch) -> Result<()> {
        self.lock()?.add_watch(watch);
        Ok(())
    }

    async fn remove_watch(&self, watch_id: Uuid) -> Result<bool> {
        Ok(self.lock()?.remove_watch(watch_id))
    }

    async fn watches(&self) -> Result<Vec<Watch>> {
        Ok(self.lock()?.watches.clone())
    }

    async fn insert_alert(&self, alert: Alert) -> Result<bool> {
        Ok(self.lock()?.insert_alert(alert))
    }

    async fn alerts_for_user(&self, user_id: &str, unread_only: bool) -> Result<Vec<Alert>> {
        Ok(self.lock()?.alerts_for_user(user_id, unread_only))
    }

    async fn mark_alert_read(&self, alert_id: Uuid) -> Result<bool> {
        Ok(self.lock()?.mark_alert_read(alert_id))
    }
}
