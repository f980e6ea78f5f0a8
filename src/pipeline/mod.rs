//! Pipeline entry points for ingestion.
//!
//! - `Ingestor`: scrape all sources and upsert content
//! - `AlertMatcher`: raise alerts for content matching user watches
//! - `Scheduler`: daily and on-demand runs

pub mod ingest;
pub mod matcher;
pub mod schedule;

pub use ingest::{Ingestor, SourceOutcome};
pub use matcher::AlertMatcher;
pub use schedule::{FileCatalog, Scheduler, SchedulerHandle, SourceCatalog, next_run_after};
