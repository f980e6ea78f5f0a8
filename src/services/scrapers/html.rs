// src/services/scrapers/html.rs

//! HTML page scraper.
//!
//! Extracts the main text of a page as a single item and, when a link
//! selector is configured, emits linked pages as additional empty-bodied
//! items so they get tracked on later runs.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::Scraper;
use crate::error::{AppError, Result};
use crate::models::{ContentItem, ScrapeOptions};
use crate::services::fetcher::Fetcher;
use crate::utils::resolve_url;

/// Elements whose text is never part of the content.
const STRIPPED: &[&str] = &["script", "style", "nav", "header", "footer", "aside"];

static TITLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("title").expect("valid selector"));
static MAIN: LazyLock<Selector> = LazyLock::new(|| Selector::parse("main").expect("valid selector"));
static ARTICLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("article").expect("valid selector"));
static CLASSED_DIV: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div[class]").expect("valid selector"));
static BODY: LazyLock<Selector> = LazyLock::new(|| Selector::parse("body").expect("valid selector"));

static CONTENT_CLASS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)content|main|article").expect("valid regex"));
static BLANK_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

pub struct HtmlScraper {
    fetcher: Arc<Fetcher>,
    max_chars: usize,
    max_links: usize,
}

impl HtmlScraper {
    pub fn new(fetcher: Arc<Fetcher>, max_chars: usize, max_links: usize) -> Self {
        Self {
            fetcher,
            max_chars,
            max_links,
        }
    }

    /// Extract items from a fetched page.
    ///
    /// `base` resolves relative link targets.
    pub fn extract(
        &self,
        page_url: &str,
        base: Option<&Url>,
        html: &str,
        options: &ScrapeOptions,
    ) -> Result<Vec<ContentItem>> {
        let document = Html::parse_document(html);

        let title = document
            .select(&TITLE)
            .next()
            .map(|t| t.text().collect::<String>().trim().to_string())
            .unwrap_or_default();

        let root = match non_blank(options.selector.as_deref()) {
            Some(selector) => {
                let selector = parse_selector(selector)?;
                first_kept(&document, &selector).unwrap_or_else(|| document.root_element())
            }
            None => detect_main(&document),
        };

        let mut parts = Vec::new();
        collect_text(root, &mut parts);
        let text = BLANK_RUNS.replace_all(&parts.join("\n"), "\n\n").into_owned();
        let text: String = text.chars().take(self.max_chars).collect();

        let mut items = vec![ContentItem::new(page_url, title, text)];

        if let Some(link_selector) = non_blank(options.link_selector.as_deref()) {
            let selector = parse_selector(link_selector)?;
            let links = document
                .select(&selector)
                .filter(|el| !is_stripped(el))
                .take(self.max_links)
                .filter_map(|el| {
                    let href = el.value().attr("href")?.trim();
                    if href.is_empty() || href.starts_with('#') {
                        return None;
                    }
                    let url = match base {
                        Some(base) => resolve_url(base, href),
                        None => href.to_string(),
                    };
                    let label = el.text().collect::<String>().trim().to_string();
                    Some(ContentItem::new(url, label, "").with_meta("parent_url", page_url))
                });
            items.extend(links);
        }

        Ok(items)
    }
}

/// Blank selectors count as unset.
fn non_blank(selector: Option<&str>) -> Option<&str> {
    selector.filter(|s| !s.trim().is_empty())
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

/// Whether the element is, or sits inside, a stripped element.
fn is_stripped(element: &ElementRef<'_>) -> bool {
    STRIPPED.contains(&element.value().name())
        || element.ancestors().any(|node| {
            node.value()
                .as_element()
                .is_some_and(|e| STRIPPED.contains(&e.name()))
        })
}

fn first_kept<'a>(document: &'a Html, selector: &Selector) -> Option<ElementRef<'a>> {
    document.select(selector).find(|el| !is_stripped(el))
}

/// `<main>`, then `<article>`, then a content-like div, then `<body>`.
fn detect_main(document: &Html) -> ElementRef<'_> {
    first_kept(document, &MAIN)
        .or_else(|| first_kept(document, &ARTICLE))
        .or_else(|| {
            document.select(&CLASSED_DIV).find(|el| {
                !is_stripped(el)
                    && el
                        .value()
                        .attr("class")
                        .is_some_and(|class| CONTENT_CLASS.is_match(class))
            })
        })
        .or_else(|| document.select(&BODY).next())
        .unwrap_or_else(|| document.root_element())
}

fn collect_text(element: ElementRef<'_>, out: &mut Vec<String>) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            let text = text.trim();
            if !text.is_empty() {
                out.push(text.to_string());
            }
        } else if let Some(child) = ElementRef::wrap(child) {
            if !STRIPPED.contains(&child.value().name()) {
                collect_text(child, out);
            }
        }
    }
}

#[async_trait]
impl Scraper for HtmlScraper {
    async fn scrape(&self, url: &str, options: &ScrapeOptions) -> Result<Vec<ContentItem>> {
        let page = match self.fetcher.fetch(url).await {
            Ok(page) => page,
            Err(e) => {
                log::warn!("Page fetch failed for {}: {}", url, e);
                return Ok(Vec::new());
            }
        };

        let base = Url::parse(&page.url).ok();
        let items = self.extract(url, base.as_ref(), &page.text(), options)?;
        log::debug!("Page {} yielded {} items", url, items.len());
        Ok(items)
    }
}
