// src/pipeline/schedule.rs

//! Daily and on-demand ingestion triggers.
//!
//! One background task owns the run loop, so runs never overlap: a manual
//! trigger that arrives mid-run is queued and starts once the current run
//! finishes.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::ingest::Ingestor;
use crate::error::Result;
use crate::models::{IngestStats, ScheduleConfig, Source};

/// Where the scheduler reads the current source list from.
#[async_trait]
pub trait SourceCatalog: Send + Sync {
    async fn sources(&self) -> Result<Vec<Source>>;
}

/// Catalog backed by a JSON file, re-read before every run.
pub struct FileCatalog {
    path: PathBuf,
}

impl FileCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SourceCatalog for FileCatalog {
    async fn sources(&self) -> Result<Vec<Source>> {
        let bytes = tokio::fs::read(&self.path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl SourceCatalog for Vec<Source> {
    async fn sources(&self) -> Result<Vec<Source>> {
        Ok(self.clone())
    }
}

/// First `hour:minute` UTC strictly after `now`.
pub fn next_run_after(now: DateTime<Utc>, hour: u32, minute: u32) -> DateTime<Utc> {
    let Some(today) = now.date_naive().and_hms_opt(hour, minute, 0) else {
        return now + Duration::days(1);
    };
    let today = today.and_utc();
    if today > now {
        today
    } else {
        today + Duration::days(1)
    }
}

/// Why a run started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Scheduled,
    Manual,
}

pub struct Scheduler {
    ingestor: Arc<Ingestor>,
    catalog: Arc<dyn SourceCatalog>,
    hour: u32,
    minute: u32,
}

impl Scheduler {
    pub fn new(ingestor: Arc<Ingestor>, catalog: Arc<dyn SourceCatalog>, config: &ScheduleConfig) -> Self {
        Self {
            ingestor,
            catalog,
            hour: config.hour,
            minute: config.minute,
        }
    }

    /// Load sources and run one ingestion pass.
    ///
    /// Returns `None` when the catalog could not be read.
    pub async fn run_once(&self) -> Option<IngestStats> {
        match self.catalog.sources().await {
            Ok(sources) => Some(self.ingestor.run(&sources).await),
            Err(e) => {
                log::error!("Could not load sources: {}", e);
                None
            }
        }
    }

    /// Start the run loop in a background task.
    pub fn spawn(self) -> SchedulerHandle {
        // Capacity 1: triggers arriving while one is already queued coalesce.
        let (trigger_tx, mut trigger_rx) = mpsc::channel::<()>(1);
        let (stats_tx, stats_rx) = watch::channel(None);

        let task = tokio::spawn(async move {
            loop {
                let next = next_run_after(Utc::now(), self.hour, self.minute);
                let wait = (next - Utc::now()).to_std().unwrap_or_default();
                log::info!("Next scheduled ingestion at {}", next);

                let trigger = tokio::select! {
                    _ = tokio::time::sleep(wait) => Trigger::Scheduled,
                    msg = trigger_rx.recv() => match msg {
                        Some(()) => Trigger::Manual,
                        None => break,
                    },
                };

                log::info!("Starting {:?} ingestion run", trigger);
                if let Some(stats) = self.run_once().await {
                    stats_tx.send_replace(Some(stats));
                }
            }
            log::info!("Scheduler stopped");
        });

        SchedulerHandle {
            trigger_tx,
            stats_rx,
            task,
        }
    }
}

/// Control surface of a running scheduler.
pub struct SchedulerHandle {
    trigger_tx: mpsc::Sender<()>,
    stats_rx: watch::Receiver<Option<IngestStats>>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Request a run now.
    ///
    /// Returns false when a run is already queued or the scheduler stopped.
    pub fn trigger(&self) -> bool {
        self.trigger_tx.try_send(()).is_ok()
    }

    /// Receiver for the stats of each completed run.
    pub fn results(&self) -> watch::Receiver<Option<IngestStats>> {
        self.stats_rx.clone()
    }

    /// Stop accepting triggers and wait for the current run to finish.
    pub async fn shutdown(self) {
        drop(self.trigger_tx);
        if let Err(e) = self.task.await {
            log::error!("Scheduler task ended abnormally: {}", e);
        }
    }
}
