// src/models/mod.rs

//! Domain models for the ingestion core.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod content;
mod source;
mod watch;

// Re-export all public types
pub use config::{
    Config, FetcherConfig, GuardConfig, IngestConfig, LoggingConfig, MatcherConfig,
    ScheduleConfig,
};
pub use content::{ContentItem, ContentStatus, ScrapedContent, content_hash};
pub use source::{ScrapeOptions, Source, SourceKind};
pub use watch::{Alert, Watch, WatchKind};

use serde::Serialize;

/// Counters returned by one ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    /// Sources handed to the run
    pub total: usize,
    /// Sources scraped without error
    pub scraped: usize,
    /// Sources whose scrape or upsert failed
    pub errors: usize,
    /// Inactive, URL-less or unmapped sources
    pub skipped: usize,
    /// Rows inserted for previously unseen URLs
    pub new_items: usize,
    /// Existing rows whose content hash changed
    pub changed_items: usize,
}

/// Counters returned by one matching pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MatchStats {
    /// Alerts created
    pub matched: usize,
    pub contents_checked: usize,
    pub watches_active: usize,
}
