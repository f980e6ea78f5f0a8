// src/pipeline/matcher.rs

//! Matches recent content against user watches and raises alerts.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use unicode_segmentation::UnicodeSegmentation;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Alert, MatchStats, MatcherConfig, ScrapedContent, Watch, WatchKind};
use crate::storage::ContentStore;

/// Fallback alert title for untitled content.
const UNTITLED: &str = "New content";

pub struct AlertMatcher {
    store: Arc<dyn ContentStore>,
    window: usize,
    excerpt_chars: usize,
}

impl AlertMatcher {
    pub fn new(store: Arc<dyn ContentStore>, config: &MatcherConfig) -> Self {
        Self {
            store,
            window: config.window,
            excerpt_chars: config.excerpt_chars,
        }
    }

    /// Check the most recent `window` rows against every watch.
    ///
    /// Safe to repeat: the store refuses a second alert for the same
    /// (watch, content) pair.
    pub async fn run(&self) -> Result<MatchStats> {
        let contents = self.store.matchable_content(self.window).await?;
        let watches = self.store.watches().await?;
        let mut stats = MatchStats {
            contents_checked: contents.len(),
            watches_active: watches.len(),
            ..MatchStats::default()
        };
        if contents.is_empty() || watches.is_empty() {
            return Ok(stats);
        }

        let now = Utc::now();
        for content in &contents {
            let haystack = Haystack::new(content);
            for watch in watches.iter().filter(|w| haystack.matches(w)) {
                if self.store.insert_alert(self.alert(watch, content, now)).await? {
                    stats.matched += 1;
                }
            }
        }
        self.store.flush().await?;

        Ok(stats)
    }

    fn alert(&self, watch: &Watch, content: &ScrapedContent, now: DateTime<Utc>) -> Alert {
        let title = if content.title.is_empty() {
            UNTITLED
        } else {
            content.title.as_str()
        };
        let message = content
            .summary
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| excerpt(&content.body, self.excerpt_chars));

        Alert {
            id: Uuid::new_v4(),
            user_id: watch.user_id.clone(),
            watch_id: Some(watch.id),
            content_id: Some(content.id),
            title: format!("Watch: {title}"),
            message,
            read: false,
            created_at: now,
        }
    }
}

/// First `max` grapheme clusters of `text`.
pub fn excerpt(text: &str, max: usize) -> String {
    text.graphemes(true).take(max).collect()
}

/// Lowercased views of one content row.
struct Haystack<'a> {
    content: &'a ScrapedContent,
    title: String,
    body: String,
}

impl<'a> Haystack<'a> {
    fn new(content: &'a ScrapedContent) -> Self {
        Self {
            content,
            title: content.title.to_lowercase(),
            body: content.body.to_lowercase(),
        }
    }

    fn contains(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        !needle.is_empty() && (self.title.contains(&needle) || self.body.contains(&needle))
    }

    fn matches(&self, watch: &Watch) -> bool {
        match watch.kind {
            WatchKind::Source => self.content.source_id.as_deref() == Some(watch.value.as_str()),
            WatchKind::Keyword | WatchKind::GeoZone => self.contains(&watch.value),
            WatchKind::Category => self.content.has_tag(&watch.value),
            WatchKind::Unknown => false,
        }
    }
}
