// src/utils/http.rs

//! HTTP client utilities.

use std::sync::Arc;
use std::time::Duration;

use reqwest::redirect::Policy;

use crate::error::Result;
use crate::models::FetcherConfig;
use crate::services::guard::{GuardedResolver, UrlGuard};

/// Create a configured asynchronous HTTP client.
///
/// Redirects are not followed by the client: the fetcher follows them itself
/// so each hop goes through the URL guard. Name resolution for connections
/// also goes through the guard.
pub fn create_async_client(config: &FetcherConfig, guard: &UrlGuard) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .redirect(Policy::none())
        .dns_resolver(Arc::new(GuardedResolver::new(guard.clone())))
        .build()?;
    Ok(client)
}
