//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP client and retry behavior
    #[serde(default)]
    pub fetcher: FetcherConfig,

    /// Outbound URL guard overrides
    #[serde(default)]
    pub guard: GuardConfig,

    /// Ingestion run limits
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Alert matching window
    #[serde(default)]
    pub matcher: MatcherConfig,

    /// Daily trigger time
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.fetcher.user_agent.trim().is_empty() {
            return Err(AppError::validation("fetcher.user_agent is empty"));
        }
        if self.fetcher.timeout_secs == 0 {
            return Err(AppError::validation("fetcher.timeout_secs must be > 0"));
        }
        if self.fetcher.max_retries == 0 {
            return Err(AppError::validation("fetcher.max_retries must be > 0"));
        }
        if self.ingest.max_concurrent == 0 {
            return Err(AppError::validation("ingest.max_concurrent must be > 0"));
        }
        if self.ingest.feed_max_bytes == 0 {
            return Err(AppError::validation("ingest.feed_max_bytes must be > 0"));
        }
        if self.ingest.html_max_chars == 0 {
            return Err(AppError::validation("ingest.html_max_chars must be > 0"));
        }
        if self.matcher.window == 0 {
            return Err(AppError::validation("matcher.window must be > 0"));
        }
        if self.schedule.hour > 23 || self.schedule.minute > 59 {
            return Err(AppError::validation(format!(
                "schedule time {:02}:{:02} is not a valid time of day",
                self.schedule.hour, self.schedule.minute
            )));
        }
        Ok(())
    }
}

/// HTTP client and retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Per-attempt timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Attempts per URL before giving up
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,

    /// Base delay after a failed attempt, multiplied by the attempt number
    #[serde(default = "defaults::retry_backoff")]
    pub retry_backoff_ms: u64,

    /// Base delay after a 429 response, multiplied by the attempt number
    #[serde(default = "defaults::rate_limit_backoff")]
    pub rate_limit_backoff_ms: u64,

    /// Redirect hops followed per attempt
    #[serde(default = "defaults::max_redirects")]
    pub max_redirects: usize,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            max_retries: defaults::max_retries(),
            retry_backoff_ms: defaults::retry_backoff(),
            rate_limit_backoff_ms: defaults::rate_limit_backoff(),
            max_redirects: defaults::max_redirects(),
        }
    }
}

/// Additions to the built-in guard rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Extra hostnames to refuse
    #[serde(default)]
    pub blocked_hosts: Vec<String>,

    /// Hostnames exempt from every check
    #[serde(default)]
    pub allowed_hosts: Vec<String>,
}

/// Ingestion run settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Sources scraped simultaneously
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Feed payload ceiling in bytes, applied before parsing
    #[serde(default = "defaults::feed_max_bytes")]
    pub feed_max_bytes: usize,

    /// Extracted HTML text ceiling in characters
    #[serde(default = "defaults::html_max_chars")]
    pub html_max_chars: usize,

    /// Discovered links emitted per HTML page
    #[serde(default = "defaults::html_max_links")]
    pub html_max_links: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_concurrent: defaults::max_concurrent(),
            feed_max_bytes: defaults::feed_max_bytes(),
            html_max_chars: defaults::html_max_chars(),
            html_max_links: defaults::html_max_links(),
        }
    }
}

/// Alert matcher settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatcherConfig {
    /// Most recently changed contents examined per pass
    #[serde(default = "defaults::window")]
    pub window: usize,

    /// Body excerpt length used as alert message
    #[serde(default = "defaults::excerpt_chars")]
    pub excerpt_chars: usize,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            window: defaults::window(),
            excerpt_chars: defaults::excerpt_chars(),
        }
    }
}

/// Daily run time, UTC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "defaults::hour")]
    pub hour: u32,

    #[serde(default)]
    pub minute: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            hour: defaults::hour(),
            minute: 0,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    // Fetcher defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; veille-bot/1.0)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn max_retries() -> u32 {
        3
    }
    pub fn retry_backoff() -> u64 {
        2_000
    }
    pub fn rate_limit_backoff() -> u64 {
        5_000
    }
    pub fn max_redirects() -> usize {
        5
    }

    // Ingest defaults
    pub fn max_concurrent() -> usize {
        5
    }
    pub fn feed_max_bytes() -> usize {
        500_000
    }
    pub fn html_max_chars() -> usize {
        50_000
    }
    pub fn html_max_links() -> usize {
        50
    }

    // Matcher defaults
    pub fn window() -> usize {
        200
    }
    pub fn excerpt_chars() -> usize {
        200
    }

    pub fn hour() -> u32 {
        2
    }

    pub fn log_level() -> String {
        "info".into()
    }
}
