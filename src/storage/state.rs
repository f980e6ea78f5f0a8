//! Indexed in-memory state shared by the storage backends.

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::UpsertOutcome;
use crate::models::{Alert, ContentItem, ContentStatus, ScrapedContent, Watch};

#[derive(Debug, Default)]
pub(crate) struct StoreState {
    pub contents: Vec<ScrapedContent>,
    pub watches: Vec<Watch>,
    pub alerts: Vec<Alert>,
    by_url: HashMap<String, usize>,
    alert_pairs: HashSet<(Uuid, Uuid)>,
}

impl StoreState {
    /// Rebuild indexes over loaded rows.
    ///
    /// A duplicated URL keeps its first row; a duplicated alert pair keeps
    /// its first alert.
    pub fn from_parts(contents: Vec<ScrapedContent>, watches: Vec<Watch>, alerts: Vec<Alert>) -> Self {
        let mut state = Self {
            watches,
            ..Self::default()
        };
        for row in contents {
            if !state.by_url.contains_key(&row.url) {
                state.by_url.insert(row.url.clone(), state.contents.len());
                state.contents.push(row);
            }
        }
        for alert in alerts {
            if let Some(pair) = alert.pair() {
                if !state.alert_pairs.insert(pair) {
                    continue;
                }
            }
            state.alerts.push(alert);
        }
        state
    }

    pub fn upsert(
        &mut self,
        source_id: Option<&str>,
        item: &ContentItem,
        now: DateTime<Utc>,
    ) -> UpsertOutcome {
        match self.by_url.get(&item.url) {
            Some(&index) => {
                if self.contents[index].observe(item, now) {
                    UpsertOutcome::Changed
                } else {
                    UpsertOutcome::Unchanged
                }
            }
            None => {
                self.by_url.insert(item.url.clone(), self.contents.len());
                self.contents
                    .push(ScrapedContent::first_observation(source_id, item, now));
                UpsertOutcome::Inserted
            }
        }
    }

    pub fn by_url(&self, url: &str) -> Option<&ScrapedContent> {
        self.by_url.get(url).map(|&i| &self.contents[i])
    }

    fn newest_first(&self, filter: impl Fn(&ScrapedContent) -> bool, limit: usize) -> Vec<ScrapedContent> {
        let mut rows: Vec<&ScrapedContent> = self.contents.iter().filter(|&r| filter(r)).collect();
        rows.sort_by_key(|r| Reverse(r.last_changed));
        rows.into_iter().take(limit).cloned().collect()
    }

    pub fn latest(&self, limit: usize) -> Vec<ScrapedContent> {
        self.newest_first(|_| true, limit)
    }

    pub fn matchable(&self, window: usize) -> Vec<ScrapedContent> {
        self.newest_first(
            |r| matches!(r.status, ContentStatus::New | ContentStatus::Analyzed),
            window,
        )
    }

    pub fn search(&self, query: &str, limit: usize) -> Vec<ScrapedContent> {
        let needle = query.to_lowercase();
        self.newest_first(
            |r| r.title.to_lowercase().contains(&needle) || r.body.to_lowercase().contains(&needle),
            limit,
        )
    }

    pub fn record_analysis(&mut self, content_id: Uuid, summary: Option<String>, tags: Vec<String>) -> bool {
        let Some(row) = self.contents.iter_mut().find(|r| r.id == content_id) else {
            return false;
        };
        row.status = ContentStatus::Analyzed;
        row.summary = summary;
        row.tags = tags;
        true
    }

    pub fn add_watch(&mut self, watch: Watch) {
        self.watches.retain(|w| w.id != watch.id);
        self.watches.push(watch);
    }

    pub fn remove_watch(&mut self, watch_id: Uuid) -> bool {
        let before = self.watches.len();
        self.watches.retain(|w| w.id != watch_id);
        self.watches.len() != before
    }

    pub fn insert_alert(&mut self, alert: Alert) -> bool {
        if let Some(pair) = alert.pair() {
            if !self.alert_pairs.insert(pair) {
                return false;
            }
        }
        self.alerts.push(alert);
        true
    }

    pub fn alerts_for_user(&self, user_id: &str, unread_only: bool) -> Vec<Alert> {
        let mut alerts: Vec<Alert> = self
            .alerts
            .iter()
            .filter(|a| a.user_id == user_id && !(unread_only && a.read))
            .cloned()
            .collect();
        alerts.sort_by_key(|a| Reverse(a.created_at));
        alerts
    }

    pub fn mark_alert_read(&mut self, alert_id: Uuid) -> bool {
        match self.alerts.iter_mut().find(|a| a.id == alert_id) {
            Some(alert) => {
                alert.read = true;
                true
            }
            None => false,
        }
    }
}
