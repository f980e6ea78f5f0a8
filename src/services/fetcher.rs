// src/services/fetcher.rs

//! Guarded HTTP GET with bounded retries.

use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, LOCATION};
use reqwest::{Client, StatusCode};
use url::Url;

use crate::error::{FetchError, GuardError, Result};
use crate::models::FetcherConfig;
use crate::services::guard::UrlGuard;
use crate::utils::http::create_async_client;

/// A successful response, fully buffered.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// URL the body was served from, after redirects
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl FetchedPage {
    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Why a single attempt failed.
enum AttemptError {
    Rejected(GuardError),
    RateLimited,
    Status(u16),
    Transport(String),
    TooManyRedirects,
}

/// Retrying fetcher. Holds no per-URL state between calls.
pub struct Fetcher {
    client: Client,
    guard: UrlGuard,
    max_retries: u32,
    retry_backoff: Duration,
    rate_limit_backoff: Duration,
    max_redirects: usize,
}

impl Fetcher {
    /// Build a fetcher from configuration.
    pub fn new(config: &FetcherConfig, guard: UrlGuard) -> Result<Self> {
        Ok(Self {
            client: create_async_client(config, &guard)?,
            guard,
            max_retries: config.max_retries.max(1),
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
            rate_limit_backoff: Duration::from_millis(config.rate_limit_backoff_ms),
            max_redirects: config.max_redirects,
        })
    }

    pub fn guard(&self) -> &UrlGuard {
        &self.guard
    }

    /// Fetch a URL.
    ///
    /// The guard runs before any connection is made; a rejection returns
    /// immediately and is never retried. 429 responses back off
    /// `rate_limit_backoff * attempt`, other failures `retry_backoff * attempt`.
    pub async fn fetch(&self, url: &str) -> std::result::Result<FetchedPage, FetchError> {
        let parsed = Url::parse(url).map_err(|e| GuardError::InvalidUrl {
            url: url.to_string(),
            message: e.to_string(),
        });
        let parsed = match parsed {
            Ok(parsed) => parsed,
            Err(e) => {
                log::warn!("Guard blocked {}: {}", url, e);
                return Err(FetchError::Rejected(e));
            }
        };
        if let Err(e) = self.guard.validate_url(&parsed).await {
            log::warn!("Guard blocked {}: {}", url, e);
            return Err(FetchError::Rejected(e));
        }

        let mut last_error = String::new();
        for attempt in 1..=self.max_retries {
            let wait = match self.attempt(&parsed).await {
                Ok(page) => return Ok(page),
                Err(AttemptError::Rejected(e)) => {
                    log::warn!("Guard blocked redirect from {}: {}", url, e);
                    return Err(FetchError::Rejected(e));
                }
                Err(AttemptError::TooManyRedirects) => {
                    return Err(FetchError::TooManyRedirects(url.to_string()));
                }
                Err(AttemptError::RateLimited) => {
                    last_error = "HTTP 429 Too Many Requests".to_string();
                    let wait = self.rate_limit_backoff * attempt;
                    log::warn!("Rate limited on {}, waiting {:?}", url, wait);
                    wait
                }
                Err(AttemptError::Status(code)) => {
                    last_error = format!("HTTP {code}");
                    log::warn!("HTTP {} for {} (attempt {})", code, url, attempt);
                    self.retry_backoff * attempt
                }
                Err(AttemptError::Transport(message)) => {
                    log::warn!("Fetch error for {}: {} (attempt {})", url, message, attempt);
                    last_error = message;
                    self.retry_backoff * attempt
                }
            };

            if attempt < self.max_retries {
                tokio::time::sleep(wait).await;
            }
        }

        log::error!(
            "Giving up on {} after {} attempts: {}",
            url,
            self.max_retries,
            last_error
        );
        Err(FetchError::Exhausted {
            url: url.to_string(),
            attempts: self.max_retries,
            last_error,
        })
    }

    /// One attempt, following redirects through the guard.
    async fn attempt(&self, start: &Url) -> std::result::Result<FetchedPage, AttemptError> {
        let mut current = start.clone();

        for hop in 0..=self.max_redirects {
            if hop > 0 {
                self.guard
                    .validate_url(&current)
                    .await
                    .map_err(AttemptError::Rejected)?;
            }

            let response = self
                .client
                .get(current.clone())
                .send()
                .await
                .map_err(|e| AttemptError::Transport(e.to_string()))?;
            let status = response.status();

            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok());
                if let Some(location) = location {
                    current = current
                        .join(location)
                        .map_err(|e| AttemptError::Transport(format!("bad redirect: {e}")))?;
                    continue;
                }
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                return Err(AttemptError::RateLimited);
            }
            if !status.is_success() {
                return Err(AttemptError::Status(status.as_u16()));
            }

            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let body = response
                .bytes()
                .await
                .map_err(|e| AttemptError::Transport(e.to_string()))?;

            return Ok(FetchedPage {
                url: current.to_string(),
                status: status.as_u16(),
                content_type,
                body: body.to_vec(),
            });
        }

        Err(AttemptError::TooManyRedirects)
    }
}
