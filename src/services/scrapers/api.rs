// src/services/scrapers/api.rs

//! JSON API scraper.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::Scraper;
use crate::error::Result;
use crate::models::{ContentItem, ScrapeOptions};
use crate::services::fetcher::Fetcher;

const DEFAULT_TITLE_FIELD: &str = "title";
const DEFAULT_CONTENT_FIELD: &str = "description";
const DEFAULT_URL_FIELD: &str = "url";

pub struct ApiScraper {
    fetcher: Arc<Fetcher>,
}

impl ApiScraper {
    pub fn new(fetcher: Arc<Fetcher>) -> Self {
        Self { fetcher }
    }

    /// Map a decoded payload to items.
    pub fn extract(source_url: &str, payload: &Value, options: &ScrapeOptions) -> Vec<ContentItem> {
        let title_field = options.title_field.as_deref().unwrap_or(DEFAULT_TITLE_FIELD);
        let content_field = options
            .content_field
            .as_deref()
            .unwrap_or(DEFAULT_CONTENT_FIELD);
        let url_field = options.url_field.as_deref().unwrap_or(DEFAULT_URL_FIELD);

        let Some(node) = navigate(payload, options.items_path.as_deref()) else {
            return Vec::new();
        };
        let records: Vec<&Value> = match node {
            Value::Array(values) => values.iter().collect(),
            Value::Object(_) => vec![node],
            _ => return Vec::new(),
        };

        records
            .into_iter()
            .filter(|record| record.is_object())
            .map(|record| {
                let url = field_text(record, url_field)
                    .filter(|u| !u.is_empty())
                    .unwrap_or_else(|| source_url.to_string());
                ContentItem::new(
                    url,
                    field_text(record, title_field).unwrap_or_default(),
                    field_text(record, content_field).unwrap_or_default(),
                )
                .with_meta("source_url", source_url)
            })
            .collect()
    }
}

/// Follow a dot-separated path of object keys.
fn navigate<'a>(payload: &'a Value, path: Option<&str>) -> Option<&'a Value> {
    let Some(path) = path.filter(|p| !p.is_empty()) else {
        return Some(payload);
    };
    path.split('.')
        .try_fold(payload, |node, key| node.as_object()?.get(key))
}

/// Field rendered as text; strings verbatim, other scalars via JSON.
fn field_text(record: &Value, field: &str) -> Option<String> {
    match record.get(field)? {
        Value::Null => None,
        Value::String(s) => Some(s.trim().to_string()),
        other => Some(other.to_string()),
    }
}

#[async_trait]
impl Scraper for ApiScraper {
    async fn scrape(&self, url: &str, options: &ScrapeOptions) -> Result<Vec<ContentItem>> {
        let page = match self.fetcher.fetch(url).await {
            Ok(page) => page,
            Err(e) => {
                log::warn!("API fetch failed for {}: {}", url, e);
                return Ok(Vec::new());
            }
        };

        let payload: Value = match serde_json::from_slice(&page.body) {
            Ok(payload) => payload,
            Err(e) => {
                log::error!("API response from {} is not JSON: {}", url, e);
                return Ok(Vec::new());
            }
        };

        let items = Self::extract(url, &payload, options);
        log::debug!("API {} yielded {} items", url, items.len());
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SRC: &str = "https://api.example.com/v1/records";

    #[test]
    fn test_nested_path_and_defaults() {
        let payload = json!({
            "data": {"records": [
                {"title": "A", "description": "first", "url": "https://example.com/a"},
                {"title": "B", "description": "second"},
                "not an object",
            ]}
        });
        let options = ScrapeOptions {
            items_path: Some("data.records".into()),
            ..Default::default()
        };

        let items = ApiScraper::extract(SRC, &payload, &options);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].url, "https://example.com/a");
        assert_eq!(items[0].body, "first");
        assert_eq!(items[1].url, SRC);
        assert_eq!(items[1].metadata.get("source_url").map(String::as_str), Some(SRC));
    }

    #[test]
    fn test_single_object_becomes_one_item() {
        let payload = json!({"headline": "Only one", "text": "body", "link": ""});
        let options = ScrapeOptions {
            title_field: Some("headline".into()),
            content_field: Some("text".into()),
            url_field: Some("link".into()),
            ..Default::default()
        };

        let items = ApiScraper::extract(SRC, &payload, &options);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Only one");
        assert_eq!(items[0].url, SRC);
    }

    #[test]
    fn test_scalar_or_missing_path_yields_nothing() {
        let payload = json!({"data": {"count": 3}});
        let at_count = ScrapeOptions {
            items_path: Some("data.count".into()),
            ..Default::default()
        };
        let missing = ScrapeOptions {
            items_path: Some("data.records".into()),
            ..Default::default()
        };

        assert!(ApiScraper::extract(SRC, &payload, &at_count).is_empty());
        assert!(ApiScraper::extract(SRC, &payload, &missing).is_empty());
    }

    #[test]
    fn test_numeric_fields_rendered() {
        let payload = json!([{"title": 42, "description": null}]);
        let items = ApiScraper::extract(SRC, &payload, &ScrapeOptions::default());
        assert_eq!(items[0].title, "42");
        assert_eq!(items[0].body, "");
    }
}
