// src/config.rs

//! Configuration loading utilities.
//!
//! Loads `config.toml` and the `sources.json` catalog from a storage
//! directory.

use std::collections::HashSet;
use std::path::Path;

use crate::error::{AppError, Result};
use crate::models::{Config, Source};

pub const CONFIG_FILE: &str = "config.toml";
pub const SOURCES_FILE: &str = "sources.json";

/// Load configuration from a TOML file.
///
/// Falls back to defaults if the file is missing or unreadable.
pub fn load_config(path: &Path) -> Config {
    Config::load_or_default(path)
}

/// Load the source catalog; a missing file is an empty catalog.
pub fn load_sources(path: &Path) -> Result<Vec<Source>> {
    if !path.exists() {
        log::warn!("No source catalog at {path:?}");
        return Ok(Vec::new());
    }
    Source::load_all(path)
}

/// Check the catalog for problems that would make runs misleading.
///
/// Duplicate ids are an error; unknown types and missing URLs are only
/// reported, since ingestion skips those sources.
pub fn validate_sources(sources: &[Source]) -> Result<()> {
    let mut seen = HashSet::new();
    for source in sources {
        if !seen.insert(source.id.as_str()) {
            return Err(AppError::validation(format!(
                "duplicate source id '{}'",
                source.id
            )));
        }
        if source.source_kind().is_none() {
            log::warn!("Source {} has unknown type '{}'", source.id, source.kind);
        }
        if source.url.trim().is_empty() {
            log::warn!("Source {} has no URL", source.id);
        }
    }
    Ok(())
}

/// Load and validate both config and sources.
pub fn load_all(storage_dir: &Path) -> Result<(Config, Vec<Source>)> {
    let config = load_config(&storage_dir.join(CONFIG_FILE));
    config
        .validate()
        .map_err(|e| AppError::config(format!("Invalid config: {e}")))?;

    let sources = load_sources(&storage_dir.join(SOURCES_FILE))?;
    validate_sources(&sources)?;

    Ok((config, sources))
}
