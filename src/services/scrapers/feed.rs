// src/services/scrapers/feed.rs

//! RSS/Atom feed scraper.

use std::borrow::Cow;
use std::sync::Arc;

use async_trait::async_trait;
use feed_rs::model::Entry;

use super::Scraper;
use crate::error::Result;
use crate::models::{ContentItem, ScrapeOptions};
use crate::services::fetcher::Fetcher;

pub struct FeedScraper {
    fetcher: Arc<Fetcher>,
    max_bytes: usize,
}

impl FeedScraper {
    pub fn new(fetcher: Arc<Fetcher>, max_bytes: usize) -> Self {
        Self { fetcher, max_bytes }
    }

    /// Parse a feed payload, reading at most `max_bytes` of it.
    ///
    /// An oversized payload keeps only the entries that end within the cap.
    pub fn parse(feed_url: &str, bytes: &[u8], max_bytes: usize) -> Result<Vec<ContentItem>> {
        let payload = truncate_feed(bytes, max_bytes);
        let feed = feed_rs::parser::parse(payload.as_ref())?;
        let feed_title = feed.title.map(|t| t.content).unwrap_or_default();

        Ok(feed
            .entries
            .into_iter()
            .map(|entry| entry_to_item(feed_url, &feed_title, entry))
            .collect())
    }
}

/// Entry closing tags and the root closing tags that follow them.
const ENTRY_ENDS: &[(&str, &str, &str)] = &[
    ("</item>", "<rdf:RDF", "</rdf:RDF>"),
    ("</item>", "<rss", "</channel></rss>"),
    ("</entry>", "<feed", "</feed>"),
];

/// Cut an oversized feed after its last complete entry and close the document.
///
/// Falls back to the raw cut when no complete entry fits, which then fails
/// to parse.
fn truncate_feed(bytes: &[u8], max_bytes: usize) -> Cow<'_, [u8]> {
    if bytes.len() <= max_bytes {
        return Cow::Borrowed(bytes);
    }
    let head = &bytes[..max_bytes];

    for (entry_end, root_open, root_close) in ENTRY_ENDS {
        if find(head, root_open.as_bytes()).is_none() {
            continue;
        }
        if let Some(pos) = rfind(head, entry_end.as_bytes()) {
            let mut closed = head[..pos + entry_end.len()].to_vec();
            closed.extend_from_slice(root_close.as_bytes());
            log::debug!(
                "Feed truncated from {} to {} bytes at an entry boundary",
                bytes.len(),
                closed.len()
            );
            return Cow::Owned(closed);
        }
    }
    Cow::Borrowed(head)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).rposition(|w| w == needle)
}

fn entry_to_item(feed_url: &str, feed_title: &str, entry: Entry) -> ContentItem {
    let url = entry
        .links
        .first()
        .map(|l| l.href.clone())
        .unwrap_or_else(|| feed_url.to_string());
    let body = entry_body(&entry);
    let title = entry.title.map(|t| t.content).unwrap_or_default();

    let mut item = ContentItem::new(url, title.trim(), body.trim())
        .with_meta("feed_title", feed_title);
    if let Some(published) = entry.published.or(entry.updated) {
        item = item.with_meta("published", published.to_rfc3339());
    }
    if let Some(author) = entry.authors.first().filter(|a| !a.name.is_empty()) {
        item = item.with_meta("author", author.name.as_str());
    }
    item
}

/// Entry content, then summary, then the first media description.
fn entry_body(entry: &Entry) -> String {
    entry
        .content
        .as_ref()
        .and_then(|c| c.body.clone())
        .filter(|b| !b.trim().is_empty())
        .or_else(|| {
            entry
                .summary
                .as_ref()
                .map(|s| s.content.clone())
                .filter(|s| !s.trim().is_empty())
        })
        .or_else(|| {
            entry
                .media
                .iter()
                .find_map(|m| m.description.as_ref().map(|d| d.content.clone()))
        })
        .unwrap_or_default()
}

#[async_trait]
impl Scraper for FeedScraper {
    async fn scrape(&self, url: &str, _options: &ScrapeOptions) -> Result<Vec<ContentItem>> {
        let page = match self.fetcher.fetch(url).await {
            Ok(page) => page,
            Err(e) => {
                log::warn!("Feed fetch failed for {}: {}", url, e);
                return Ok(Vec::new());
            }
        };

        match Self::parse(url, &page.body, self.max_bytes) {
            Ok(items) => {
                log::debug!("Feed {} yielded {} items", url, items.len());
                Ok(items)
            }
            Err(e) => {
                log::error!("Feed parse failed for {}: {}", url, e);
                Ok(Vec::new())
            }
        }
    }
}
