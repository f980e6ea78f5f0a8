// src/error.rs

//! Unified error handling for the ingestion core.

use std::fmt;
use std::net::IpAddr;

use thiserror::Error;

/// Result type alias for veille operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client could not be built or used
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization failed
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// Feed document could not be parsed
    #[error("Feed parse error: {0}")]
    Feed(#[from] feed_rs::parser::ParseFeedError),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Content store failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// URL rejected by the outbound guard
    #[error("Unsafe URL: {0}")]
    Guard(#[from] GuardError),

    /// Fetch failed after the guard accepted the URL
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a storage error.
    pub fn storage(message: impl fmt::Display) -> Self {
        Self::Storage(message.to_string())
    }
}

/// Reasons the outbound guard refuses a URL.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GuardError {
    /// Input is not a parseable absolute URL
    #[error("invalid URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    /// Scheme other than http/https
    #[error("disallowed URL scheme: {0}")]
    DisallowedScheme(String),

    /// URL has no host component
    #[error("URL has no host")]
    NoHost,

    /// Host is on the denylist
    #[error("blocked host: {0}")]
    BlockedHost(String),

    /// Host is, or resolves to, a private/loopback/link-local address
    #[error("{host} resolves to blocked address {ip}")]
    BlockedAddress { host: String, ip: IpAddr },

    /// Host could not be resolved
    #[error("DNS resolution failed for {host}: {message}")]
    DnsResolution { host: String, message: String },
}

/// Failures of the retrying fetcher.
#[derive(Error, Debug)]
pub enum FetchError {
    /// The guard refused the URL (or a redirect target); never retried
    #[error("rejected by guard: {0}")]
    Rejected(#[from] GuardError),

    /// Every attempt failed
    #[error("giving up on {url} after {attempts} attempts: {last_error}")]
    Exhausted {
        url: String,
        attempts: u32,
        last_error: String,
    },

    /// Redirect chain longer than allowed
    #[error("too many redirects starting at {0}")]
    TooManyRedirects(String),
}

impl FetchError {
    /// Whether the failure came from the safety guard rather than the network.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}
