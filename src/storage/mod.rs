//! Storage abstractions for scraped content, watches and alerts.
//!
//! Two backends share one in-memory state model:
//! - `MemoryStore`: process-local, used by tests and embedders
//! - `LocalStorage`: the same state persisted as JSON files
//!
//! ## Directory Structure
//!
//! ```text
//! storage/
//! ├── config.toml      # Configuration
//! ├── sources.json     # Source catalog (read-only here)
//! ├── contents.json    # Scraped content, one row per URL
//! ├── watches.json     # User watches
//! └── alerts.json      # Alerts raised by the matcher
//! ```

pub mod local;
pub mod memory;
mod state;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Alert, ContentItem, ScrapedContent, Watch};

pub use local::LocalStorage;
pub use memory::MemoryStore;

/// What an upsert did to the row for a URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No row existed for the URL
    Inserted,
    /// Row existed and its content hash changed
    Changed,
    /// Row existed with the same hash; only `last_checked` moved
    Unchanged,
}

/// Persistence boundary of the ingestion core.
///
/// Mutations are serialized inside the store, so concurrent ingestion
/// workers may share one handle. Upserts and alert inserts may be buffered
/// until `flush`; the ingestor flushes after each source and the matcher
/// after each pass.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Insert or update the row for `item.url` in one atomic step.
    async fn upsert_content(
        &self,
        source_id: Option<&str>,
        item: &ContentItem,
        now: DateTime<Utc>,
    ) -> Result<UpsertOutcome>;

    async fn content_by_url(&self, url: &str) -> Result<Option<ScrapedContent>>;

    /// Most recently changed rows first.
    async fn latest_content(&self, limit: usize) -> Result<Vec<ScrapedContent>>;

    /// Rows in status `new` or `analyzed`, most recently changed first.
    async fn matchable_content(&self, window: usize) -> Result<Vec<ScrapedContent>>;

    /// Case-insensitive substring search over title and body.
    async fn search_content(&self, query: &str, limit: usize) -> Result<Vec<ScrapedContent>>;

    /// Store classifier output and mark the row analyzed.
    ///
    /// Returns false when no row has this id.
    async fn record_analysis(
        &self,
        content_id: Uuid,
        summary: Option<String>,
        tags: Vec<String>,
    ) -> Result<bool>;

    async fn add_watch(&self, watch: Watch) -> Result<()>;

    async fn remove_watch(&self, watch_id: Uuid) -> Result<bool>;

    async fn watches(&self) -> Result<Vec<Watch>>;

    /// Insert an alert unless one exists for its (watch, content) pair.
    ///
    /// Returns true when the alert was stored.
    async fn insert_alert(&self, alert: Alert) -> Result<bool>;

    /// Alerts for a user, newest first.
    async fn alerts_for_user(&self, user_id: &str, unread_only: bool) -> Result<Vec<Alert>>;

    async fn mark_alert_read(&self, alert_id: Uuid) -> Result<bool>;

    /// Persist buffered upserts and alerts.
    ///
    /// Backends that write through, or keep nothing on disk, need not
    /// override this.
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}
