//! Veille CLI
//!
//! Local execution entry point for ingestion runs, alert matching and the
//! daily scheduler.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use veille::{
    config::{self, CONFIG_FILE, SOURCES_FILE},
    error::{AppError, Result},
    models::Config,
    pipeline::{AlertMatcher, FileCatalog, Ingestor, Scheduler, next_run_after},
    services::{Fetcher, ScraperRegistry, UrlGuard},
    storage::{ContentStore, LocalStorage},
};

/// Veille - content watch and alerting
#[derive(Parser, Debug)]
#[command(
    name = "veille",
    version,
    about = "Polls feeds, APIs and web pages and raises watch alerts"
)]
struct Cli {
    /// Path to storage directory containing config, sources and data files
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one ingestion pass over all sources, then match alerts
    Ingest,

    /// Match recent content against watches without scraping
    Match,

    /// Run the daily scheduler until interrupted
    Schedule {
        /// Also start a run immediately
        #[arg(long)]
        now: bool,
    },

    /// Validate configuration and source catalog
    Validate,

    /// Check whether a URL would pass the outbound guard
    CheckUrl {
        /// URL to check
        url: String,
    },

    /// Show storage contents summary
    Info,
}

/// Initialize logging at the given default level.
fn init_logging(level: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Build the ingestor and its store from configuration.
async fn build_ingestor(config: &Config, storage_dir: &Path) -> Result<Ingestor> {
    let guard = UrlGuard::from_config(&config.guard);
    let fetcher = Arc::new(Fetcher::new(&config.fetcher, guard)?);
    let registry = ScraperRegistry::standard(fetcher, &config.ingest);
    let store: Arc<dyn ContentStore> = Arc::new(LocalStorage::open(storage_dir).await?);
    Ok(Ingestor::new(registry, store, config))
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.storage_dir.join(CONFIG_FILE);
    let loaded = Config::load(&config_path);
    let level = if cli.verbose {
        "debug"
    } else {
        loaded
            .as_ref()
            .map(|c| c.logging.level.as_str())
            .unwrap_or("info")
    };
    init_logging(level);

    let config = loaded.unwrap_or_else(|e| {
        log::warn!(
            "Config load failed from {}: {}. Using defaults.",
            config_path.display(),
            e
        );
        Config::default()
    });
    let sources_path = cli.storage_dir.join(SOURCES_FILE);

    match cli.command {
        Command::Ingest => {
            config.validate()?;
            let sources = config::load_sources(&sources_path)?;
            config::validate_sources(&sources)?;

            let ingestor = build_ingestor(&config, &cli.storage_dir).await?;
            let stats = ingestor.run(&sources).await;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }

        Command::Match => {
            let store: Arc<dyn ContentStore> = Arc::new(LocalStorage::open(&cli.storage_dir).await?);
            let stats = AlertMatcher::new(store, &config.matcher).run().await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }

        Command::Schedule { now } => {
            config.validate()?;
            let ingestor = Arc::new(build_ingestor(&config, &cli.storage_dir).await?);
            let catalog = Arc::new(FileCatalog::new(&sources_path));
            let handle = Scheduler::new(ingestor, catalog, &config.schedule).spawn();

            if now {
                handle.trigger();
            }

            tokio::signal::ctrl_c().await?;
            log::info!("Interrupted, waiting for the current run to finish...");
            handle.shutdown().await;
        }

        Command::Validate => {
            log::info!("Validating configuration...");
            let (config, sources) = config::load_all(&cli.storage_dir)?;
            log::info!("✓ Config OK");
            log::info!(
                "✓ {} sources ({} active)",
                sources.len(),
                sources.iter().filter(|s| s.active).count()
            );
            log::info!(
                "Daily run at {:02}:{:02} UTC",
                config.schedule.hour,
                config.schedule.minute
            );
        }

        Command::CheckUrl { url } => {
            let guard = UrlGuard::from_config(&config.guard);
            match guard.validate(&url).await {
                Ok(()) => log::info!("✓ {} is allowed", url),
                Err(e) => {
                    log::error!("✗ {} is blocked: {}", url, e);
                    return Err(AppError::Guard(e));
                }
            }
        }

        Command::Info => {
            log::info!("Storage directory: {}", cli.storage_dir.display());
            let sources = config::load_sources(&sources_path)?;
            log::info!("Sources: {}", sources.len());

            let store = LocalStorage::open(&cli.storage_dir).await?;
            let latest = store.latest_content(1).await?;
            log::info!("Watches: {}", store.watches().await?.len());
            match latest.first() {
                Some(row) => log::info!("Last content change: {} ({})", row.last_changed, row.url),
                None => log::info!("No content ingested yet."),
            }

            let next = next_run_after(chrono::Utc::now(), config.schedule.hour, config.schedule.minute);
            log::info!("Next scheduled run: {}", next);
        }
    }

    Ok(())
}
