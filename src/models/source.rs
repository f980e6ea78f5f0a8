// src/models/source.rs

//! Configured sources to poll.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Parser family a source is read with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// RSS/Atom feed
    Feed,
    /// JSON REST endpoint
    StructuredApi,
    /// Plain web page
    Html,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Feed => "feed",
            SourceKind::StructuredApi => "structured-api",
            SourceKind::Html => "html",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "feed" | "rss" | "atom" => Ok(SourceKind::Feed),
            "structured-api" | "api" | "json" => Ok(SourceKind::StructuredApi),
            "html" | "scraping" => Ok(SourceKind::Html),
            other => Err(AppError::validation(format!("unknown source type '{other}'"))),
        }
    }
}

/// Per-source parser options.
///
/// Only the fields relevant to the source's kind are read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeOptions {
    /// Dot-separated path to the record list in a JSON payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items_path: Option<String>,

    /// JSON field holding the title (default `title`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_field: Option<String>,

    /// JSON field holding the body (default `description`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_field: Option<String>,

    /// JSON field holding the item URL (default `url`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_field: Option<String>,

    /// CSS selector for the main content of an HTML page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,

    /// CSS selector for links to emit as extra items
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_selector: Option<String>,
}

/// A configured external location to poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Stable identifier, matched by `source` watches
    pub id: String,

    /// Target URL
    #[serde(default)]
    pub url: String,

    /// Type tag (`feed`, `structured-api`, `html`)
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default = "default_active")]
    pub active: bool,

    #[serde(default)]
    pub options: ScrapeOptions,
}

fn default_active() -> bool {
    true
}

impl Source {
    pub fn new(id: impl Into<String>, url: impl Into<String>, kind: SourceKind) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            kind: kind.as_str().to_string(),
            active: true,
            options: ScrapeOptions::default(),
        }
    }

    /// Parsed type tag, `None` when the tag is not one this crate knows.
    pub fn source_kind(&self) -> Option<SourceKind> {
        self.kind.parse().ok()
    }

    /// Load source definitions from a JSON file.
    pub fn load_all(path: impl AsRef<Path>) -> Result<Vec<Self>> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}
