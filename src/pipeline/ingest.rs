// src/pipeline/ingest.rs

//! Ingestion run: scrape every source under a concurrency cap and upsert
//! the results with change detection.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::Utc;
use futures::FutureExt;
use futures::stream::{self, StreamExt};

use super::matcher::AlertMatcher;
use crate::error::Result;
use crate::models::{Config, ContentItem, IngestStats, Source};
use crate::services::{Scraper, ScraperRegistry};
use crate::storage::{ContentStore, UpsertOutcome};

/// Result of processing one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceOutcome {
    Skipped,
    Failed,
    Scraped { new_items: usize, changed_items: usize },
}

impl IngestStats {
    fn record(&mut self, outcome: SourceOutcome) {
        match outcome {
            SourceOutcome::Skipped => self.skipped += 1,
            SourceOutcome::Failed => self.errors += 1,
            SourceOutcome::Scraped {
                new_items,
                changed_items,
            } => {
                self.scraped += 1;
                self.new_items += new_items;
                self.changed_items += changed_items;
            }
        }
    }
}

/// Orchestrates one ingestion pass followed by alert matching.
pub struct Ingestor {
    registry: ScraperRegistry,
    store: Arc<dyn ContentStore>,
    matcher: AlertMatcher,
    max_concurrent: usize,
}

impl Ingestor {
    pub fn new(registry: ScraperRegistry, store: Arc<dyn ContentStore>, config: &Config) -> Self {
        Self {
            matcher: AlertMatcher::new(Arc::clone(&store), &config.matcher),
            registry,
            store,
            max_concurrent: config.ingest.max_concurrent.max(1),
        }
    }

    pub fn store(&self) -> &Arc<dyn ContentStore> {
        &self.store
    }

    /// Ingest all sources, then run the matcher once.
    ///
    /// Never fails: per-source problems are counted in the returned stats and
    /// a matcher failure is only logged.
    pub async fn run(&self, sources: &[Source]) -> IngestStats {
        let mut stats = IngestStats {
            total: sources.len(),
            ..IngestStats::default()
        };
        log::info!(
            "Ingesting {} sources (max {} concurrent)",
            sources.len(),
            self.max_concurrent
        );

        let tasks: Vec<_> = sources.iter().map(|source| self.ingest_source(source)).collect();
        let mut outcomes = stream::iter(tasks).buffer_unordered(self.max_concurrent);

        while let Some(outcome) = outcomes.next().await {
            stats.record(outcome);
        }

        log::info!(
            "Ingestion finished: {} scraped, {} errors, {} skipped, {} new, {} changed",
            stats.scraped,
            stats.errors,
            stats.skipped,
            stats.new_items,
            stats.changed_items
        );

        match self.matcher.run().await {
            Ok(matched) => log::info!(
                "Matcher raised {} alerts over {} contents and {} watches",
                matched.matched,
                matched.contents_checked,
                matched.watches_active
            ),
            Err(e) => log::error!("Alert matching failed: {}", e),
        }

        stats
    }

    /// Process one source end to end; panics are contained here.
    async fn ingest_source(&self, source: &Source) -> SourceOutcome {
        let Some(scraper) = self.scraper_for(source) else {
            return SourceOutcome::Skipped;
        };
        let store = Arc::clone(&self.store);

        let work = process_source(scraper, store, source);
        match AssertUnwindSafe(work).catch_unwind().await {
            Ok(Ok((new_items, changed_items))) => SourceOutcome::Scraped {
                new_items,
                changed_items,
            },
            Ok(Err(e)) => {
                log::error!("Source {} ({}) failed: {}", source.id, source.url, e);
                SourceOutcome::Failed
            }
            Err(_) => {
                log::error!("Source {} ({}) panicked", source.id, source.url);
                SourceOutcome::Failed
            }
        }
    }

    fn scraper_for(&self, source: &Source) -> Option<Arc<dyn Scraper>> {
        if !source.active {
            log::debug!("Skipping inactive source {}", source.id);
            return None;
        }
        if source.url.trim().is_empty() {
            log::warn!("Skipping source {} without URL", source.id);
            return None;
        }
        let Some(kind) = source.source_kind() else {
            log::warn!("Skipping source {} with unknown type '{}'", source.id, source.kind);
            return None;
        };
        let scraper = self.registry.get(kind);
        if scraper.is_none() {
            log::warn!("No scraper registered for {} (source {})", kind, source.id);
        }
        scraper
    }
}

/// Scrape a source and upsert its items; returns (new, changed) counts.
async fn process_source(
    scraper: Arc<dyn Scraper>,
    store: Arc<dyn ContentStore>,
    source: &Source,
) -> Result<(usize, usize)> {
    let scraped = scraper.scrape(&source.url, &source.options).await?;
    let scraped_count = scraped.len();
    let items = dedupe_by_url(scraped);
    let now = Utc::now();
    let (mut new_items, mut changed_items) = (0, 0);

    for item in &items {
        match store.upsert_content(Some(&source.id), item, now).await? {
            UpsertOutcome::Inserted => new_items += 1,
            UpsertOutcome::Changed => changed_items += 1,
            UpsertOutcome::Unchanged => {}
        }
    }
    store.flush().await?;

    log::debug!(
        "Source {}: {} items ({} distinct URLs), {} new, {} changed",
        source.id,
        scraped_count,
        items.len(),
        new_items,
        changed_items
    );
    Ok((new_items, changed_items))
}

/// Drop empty items and keep the last item for each URL, in first-seen order.
fn dedupe_by_url(items: Vec<ContentItem>) -> Vec<ContentItem> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut kept: Vec<ContentItem> = Vec::with_capacity(items.len());

    for item in items.into_iter().filter(|item| !item.is_empty()) {
        match index.get(&item.url) {
            Some(&i) => kept[i] = item,
            None => {
                index.insert(item.url.clone(), kept.len());
                kept.push(item);
            }
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::{ContentItem, ContentStatus, ScrapeOptions, SourceKind, Watch, WatchKind};
    use crate::storage::MemoryStore;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves a per-URL item list that tests can edit between runs.
    #[derive(Default)]
    struct FakeSite {
        pages: Mutex<HashMap<String, Vec<ContentItem>>>,
    }

    impl FakeSite {
        fn set(&self, url: &str, items: Vec<ContentItem>) {
            self.pages.lock().unwrap().insert(url.to_string(), items);
        }
    }

    #[async_trait]
    impl Scraper for FakeSite {
        async fn scrape(&self, url: &str, _options: &ScrapeOptions) -> Result<Vec<ContentItem>> {
            match url {
                "https://panic.example" => panic!("scraper bug"),
                "https://bad-selector.example" => Err(AppError::selector("[[", "invalid")),
                _ => Ok(self.pages.lock().unwrap().get(url).cloned().unwrap_or_default()),
            }
        }
    }

    struct Shared(Arc<FakeSite>);

    #[async_trait]
    impl Scraper for Shared {
        async fn scrape(&self, url: &str, options: &ScrapeOptions) -> Result<Vec<ContentItem>> {
            self.0.scrape(url, options).await
        }
    }

    fn setup() -> (Arc<FakeSite>, Arc<MemoryStore>, Ingestor) {
        let site = Arc::new(FakeSite::default());
        let store = Arc::new(MemoryStore::new());
        let registry = ScraperRegistry::new().with(SourceKind::Feed, Shared(Arc::clone(&site)));
        let ingestor = Ingestor::new(registry, store.clone(), &Config::default());
        (site, store, ingestor)
    }

    #[tokio::test]
    async fn test_second_identical_run_reports_nothing_new() {
        let (site, store, ingestor) = setup();
        site.set(
            "https://news.example/feed",
            vec![
                ContentItem::new("https://news.example/1", "One", "first"),
                ContentItem::new("https://news.example/2", "Two", "second"),
            ],
        );
        let sources = vec![Source::new("news", "https://news.example/feed", SourceKind::Feed)];

        let first = ingestor.run(&sources).await;
        assert_eq!(first.new_items, 2);
        assert_eq!(first.scraped, 1);
        let checked = store
            .content_by_url("https://news.example/1")
            .await
            .unwrap()
            .unwrap()
            .last_checked;

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = ingestor.run(&sources).await;
        assert_eq!(second.new_items, 0);
        assert_eq!(second.changed_items, 0);
        let row = store
            .content_by_url("https://news.example/1")
            .await
            .unwrap()
            .unwrap();
        assert!(row.last_checked > checked);
        assert_eq!(row.source_id.as_deref(), Some("news"));
    }

    #[tokio::test]
    async fn test_changed_content_detected() {
        let (site, store, ingestor) = setup();
        let feed = "https://news.example/feed";
        site.set(feed, vec![ContentItem::new("https://news.example/1", "One", "v1")]);
        let sources = vec![Source::new("news", feed, SourceKind::Feed)];
        ingestor.run(&sources).await;

        let before = store
            .content_by_url("https://news.example/1")
            .await
            .unwrap()
            .unwrap();
        store
            .record_analysis(before.id, None, vec![])
            .await
            .unwrap();

        site.set(feed, vec![ContentItem::new("https://news.example/1", "", "v2")]);
        let stats = ingestor.run(&sources).await;
        assert_eq!(stats.changed_items, 1);
        assert_eq!(stats.new_items, 0);

        let after = store
            .content_by_url("https://news.example/1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after.status, ContentStatus::New);
        assert_eq!(after.title, "One");
        assert_ne!(after.content_hash, before.content_hash);
        assert!(after.last_changed >= before.last_changed);
    }

    #[tokio::test]
    async fn test_skips_errors_and_panics_are_isolated() {
        let (site, _store, ingestor) = setup();
        site.set(
            "https://ok.example",
            vec![
                ContentItem::new("https://ok.example/1", "Fine", "body"),
                ContentItem::new("https://ok.example/empty", "", ""),
            ],
        );

        let mut inactive = Source::new("inactive", "https://ok.example", SourceKind::Feed);
        inactive.active = false;
        let mut unknown = Source::new("unknown", "https://ok.example", SourceKind::Feed);
        unknown.kind = "carrier-pigeon".into();
        let sources = vec![
            Source::new("ok", "https://ok.example", SourceKind::Feed),
            Source::new("panics", "https://panic.example", SourceKind::Feed),
            Source::new("bad", "https://bad-selector.example", SourceKind::Feed),
            Source::new("no-url", "", SourceKind::Feed),
            Source::new("unregistered", "https://x.example", SourceKind::Html),
            inactive,
            unknown,
        ];

        let stats = ingestor.run(&sources).await;
        assert_eq!(
            stats,
            IngestStats {
                total: 7,
                scraped: 1,
                errors: 2,
                skipped: 4,
                new_items: 1,
                changed_items: 0,
            }
        );
    }

    #[tokio::test]
    async fn test_items_sharing_a_url_are_stable_across_runs() {
        let (site, store, ingestor) = setup();
        let feed = "https://news.example/feed";
        // two entries without links both fall back to the feed URL
        site.set(
            feed,
            vec![
                ContentItem::new(feed, "First", "first body"),
                ContentItem::new(feed, "Second", "second body"),
            ],
        );
        let sources = vec![Source::new("news", feed, SourceKind::Feed)];

        let first = ingestor.run(&sources).await;
        assert_eq!((first.new_items, first.changed_items), (1, 0));
        for _ in 0..2 {
            let again = ingestor.run(&sources).await;
            assert_eq!((again.new_items, again.changed_items), (0, 0));
        }

        let row = store.content_by_url(feed).await.unwrap().unwrap();
        assert_eq!(row.title, "Second");
        assert_eq!(row.status, ContentStatus::New);
    }

    #[test]
    fn test_dedupe_keeps_last_in_first_seen_order() {
        let items = vec![
            ContentItem::new("https://e.com/a", "a1", "x"),
            ContentItem::new("https://e.com/b", "b", "x"),
            ContentItem::new("https://e.com/empty", "", ""),
            ContentItem::new("https://e.com/a", "a2", "y"),
        ];
        let kept = dedupe_by_url(items);
        let titles: Vec<_> = kept.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["a2", "b"]);
    }

    #[tokio::test]
    async fn test_run_is_spawnable() {
        let (site, store, ingestor) = setup();
        site.set(
            "https://news.example/feed",
            vec![ContentItem::new("https://news.example/1", "One", "first")],
        );
        let ingestor = Arc::new(ingestor);
        let sources = vec![Source::new("news", "https://news.example/feed", SourceKind::Feed)];

        let task = tokio::spawn({
            let ingestor = Arc::clone(&ingestor);
            async move { ingestor.run(&sources).await }
        });
        let stats = task.await.unwrap();

        assert_eq!(stats.new_items, 1);
        assert!(store.content_by_url("https://news.example/1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_matcher_runs_after_ingest() {
        let site = Arc::new(FakeSite::default());
        let store = Arc::new(MemoryStore::with_watches(vec![Watch::new(
            "u1",
            WatchKind::Keyword,
            "solar",
        )]));
        let registry = ScraperRegistry::new().with(SourceKind::Feed, Shared(Arc::clone(&site)));
        let ingestor = Ingestor::new(registry, store.clone(), &Config::default());

        site.set(
            "https://news.example/feed",
            vec![ContentItem::new("https://news.example/1", "Solar Update", "panels")],
        );
        ingestor
            .run(&[Source::new("news", "https://news.example/feed", SourceKind::Feed)])
            .await;

        let alerts = store.alerts_for_user("u1", false).await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].title, "Watch: Solar Update");
    }
}
