//! Service layer for the ingestion core.
//!
//! This module contains:
//! - Outbound URL validation (`UrlGuard`)
//! - Guarded, retrying HTTP GET (`Fetcher`)
//! - Source parsers behind the `Scraper` trait (`ScraperRegistry`)

pub mod fetcher;
pub mod guard;
pub mod scrapers;

pub use fetcher::{FetchedPage, Fetcher};
pub use guard::{GuardedResolver, UrlGuard};
pub use scrapers::{ApiScraper, FeedScraper, HtmlScraper, Scraper, ScraperRegistry};
