//! Scraped content, transient and persisted.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// SHA-256 hex digest used for change detection.
pub fn content_hash(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// One normalized piece of content produced by a scraper.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    pub url: String,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl ContentItem {
    pub fn new(url: impl Into<String>, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            body: body.into(),
            metadata: BTreeMap::new(),
        }
    }

    /// Attach a metadata entry.
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Items with neither body nor title carry nothing to store.
    pub fn is_empty(&self) -> bool {
        self.body.is_empty() && self.title.is_empty()
    }

    /// Text the change-detection hash is computed over.
    pub fn hash_input(&self) -> &str {
        if self.body.is_empty() {
            &self.title
        } else {
            &self.body
        }
    }

    pub fn content_hash(&self) -> String {
        content_hash(self.hash_input())
    }
}

/// Processing state read by the downstream classifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentStatus {
    #[default]
    New,
    Analyzed,
    Error,
}

/// Persisted, deduplicated record of the content observed at a URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapedContent {
    pub id: Uuid,

    /// Owning source, if still known
    #[serde(default)]
    pub source_id: Option<String>,

    /// Canonical URL, unique per row
    pub url: String,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub body: String,

    pub content_hash: String,

    #[serde(default)]
    pub status: ContentStatus,

    /// Classifier summary, used as alert message when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    /// Classifier category tags
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    pub first_seen: DateTime<Utc>,
    pub last_checked: DateTime<Utc>,
    pub last_changed: DateTime<Utc>,
}

impl ScrapedContent {
    /// Build the first row for a URL.
    pub fn first_observation(source_id: Option<&str>, item: &ContentItem, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_id: source_id.map(str::to_string),
            url: item.url.clone(),
            title: item.title.clone(),
            body: item.body.clone(),
            content_hash: item.content_hash(),
            status: ContentStatus::New,
            summary: None,
            tags: Vec::new(),
            first_seen: now,
            last_checked: now,
            last_changed: now,
        }
    }

    /// Record a fresh observation; returns true when the content changed.
    pub fn observe(&mut self, item: &ContentItem, now: DateTime<Utc>) -> bool {
        self.last_checked = now;

        let hash = item.content_hash();
        if hash == self.content_hash {
            return false;
        }

        self.body = item.body.clone();
        if !item.title.is_empty() {
            self.title = item.title.clone();
        }
        self.content_hash = hash;
        self.status = ContentStatus::New;
        self.last_changed = now;
        true
    }

    /// Whether the row's category tags contain `tag`, ignoring case.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.to_lowercase() == tag.to_lowercase())
    }
}
