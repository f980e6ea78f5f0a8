// src/services/scrapers/mod.rs

//! Source parsers.
//!
//! Each source type has one scraper behind the [`Scraper`] trait. The
//! orchestrator looks scrapers up in a [`ScraperRegistry`] built at startup.

mod api;
mod feed;
mod html;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{ContentItem, IngestConfig, ScrapeOptions, SourceKind};
use crate::services::fetcher::Fetcher;

pub use api::ApiScraper;
pub use feed::FeedScraper;
pub use html::HtmlScraper;

/// Turns one source URL into normalized content items.
///
/// Fetch and decode failures are logged and produce an empty list. `Err` is
/// reserved for faults in the source's own configuration, such as an invalid
/// CSS selector.
#[async_trait]
pub trait Scraper: Send + Sync {
    async fn scrape(&self, url: &str, options: &ScrapeOptions) -> Result<Vec<ContentItem>>;
}

/// Mapping from source type to scraper.
#[derive(Clone, Default)]
pub struct ScraperRegistry {
    scrapers: HashMap<SourceKind, Arc<dyn Scraper>>,
}

impl ScraperRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The three built-in scrapers sharing one fetcher.
    pub fn standard(fetcher: Arc<Fetcher>, config: &IngestConfig) -> Self {
        Self::new()
            .with(
                SourceKind::Feed,
                FeedScraper::new(Arc::clone(&fetcher), config.feed_max_bytes),
            )
            .with(SourceKind::StructuredApi, ApiScraper::new(Arc::clone(&fetcher)))
            .with(
                SourceKind::Html,
                HtmlScraper::new(fetcher, config.html_max_chars, config.html_max_links),
            )
    }

    /// Builder form of [`register`](Self::register).
    pub fn with(mut self, kind: SourceKind, scraper: impl Scraper + 'static) -> Self {
        self.register(kind, Arc::new(scraper));
        self
    }

    /// Register (or replace) the scraper for a source type.
    pub fn register(&mut self, kind: SourceKind, scraper: Arc<dyn Scraper>) {
        self.scrapers.insert(kind, scraper);
    }

    pub fn get(&self, kind: SourceKind) -> Option<Arc<dyn Scraper>> {
        self.scrapers.get(&kind).cloned()
    }

    pub fn kinds(&self) -> Vec<SourceKind> {
        let mut kinds: Vec<_> = self.scrapers.keys().copied().collect();
        kinds.sort_by_key(|k| k.as_str());
        kinds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FetcherConfig;
    use crate::services::guard::UrlGuard;

    struct Fixed;

    #[async_trait]
    impl Scraper for Fixed {
        async fn scrape(&self, url: &str, _options: &ScrapeOptions) -> Result<Vec<ContentItem>> {
            Ok(vec![ContentItem::new(url, "fixed", "")])
        }
    }

    #[test]
    fn test_standard_registry_covers_all_kinds() {
        let fetcher = Arc::new(Fetcher::new(&FetcherConfig::default(), UrlGuard::new()).unwrap());
        let registry = ScraperRegistry::standard(fetcher, &IngestConfig::default());
        assert_eq!(
            registry.kinds(),
            vec![SourceKind::Feed, SourceKind::Html, SourceKind::StructuredApi]
        );
    }

    #[tokio::test]
    async fn test_registered_fake_is_returned() {
        let registry = ScraperRegistry::new().with(SourceKind::Html, Fixed);
        assert!(registry.get(SourceKind::Feed).is_none());

        let scraper = registry.get(SourceKind::Html).unwrap();
        let items = scraper
            .scrape("https://example.com", &ScrapeOptions::default())
            .await
            .unwrap();
        assert_eq!(items[0].title, "fixed");
    }
}
