//! Asset reconciliation: deletes stored objects no user or post points at.
//!
//! Uploads happen before the row that references them is written, and a
//! profile edit leaves the previous avatar behind, so orphans are expected.
//! Objects younger than `min_age_secs` are left alone: a request may still
//! be about to write the row that points at them. The sweep runs with the
//! service handle, out of any request.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use crate::backend::{Backend, BackendResult, Connector, Filter, ObjectInfo, Page, Query, Table};
use crate::config::SweepConfig;
use crate::uploads::MANAGED_FOLDERS;

#[derive(Debug, Default, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: u64,
    pub removed: u64,
    pub failed: u64,
}

pub struct AssetSweeper {
    backend: Arc<dyn Backend>,
    folders: Vec<String>,
    page_size: usize,
    min_age_secs: i64,
    running: Mutex<()>,
}

impl AssetSweeper {
    pub fn new(connector: &dyn Connector, config: &SweepConfig) -> Self {
        Self::with_folders(
            connector,
            MANAGED_FOLDERS.iter().map(|f| f.to_string()),
            config,
        )
    }

    pub fn with_folders(
        connector: &dyn Connector,
        folders: impl IntoIterator<Item = String>,
        config: &SweepConfig,
    ) -> Self {
        Self {
            backend: connector.service(),
            folders: folders.into_iter().collect(),
            page_size: config.page_size.max(1),
            min_age_secs: i64::try_from(config.min_age_secs).unwrap_or(i64::MAX),
            running: Mutex::new(()),
        }
    }

    /// One pass over every folder. Returns `None` without doing anything if
    /// another pass is in progress. A shutdown signal stops the pass before
    /// the next folder.
    pub async fn run_once(&self, shutdown: &watch::Receiver<bool>) -> Option<SweepReport> {
        let Ok(_guard) = self.running.try_lock() else {
            tracing::debug!("asset sweep already running, skipping");
            return None;
        };

        let mut report = SweepReport::default();
        for folder in &self.folders {
            if *shutdown.borrow() {
                tracing::info!("asset sweep interrupted by shutdown");
                break;
            }
            self.sweep_folder(folder, &mut report).await;
        }

        tracing::info!(
            scanned = report.scanned,
            removed = report.removed,
            failed = report.failed,
            "asset sweep finished"
        );
        Some(report)
    }

    async fn sweep_folder(&self, folder: &str, report: &mut SweepReport) {
        let objects = match self.collect(folder).await {
            Ok(objects) => objects,
            Err(e) => {
                tracing::warn!(folder, error = %e, "failed to list objects");
                report.failed += 1;
                return;
            }
        };

        let now = Utc::now();
        for object in objects {
            report.scanned += 1;
            if now.signed_duration_since(object.modified).num_seconds() < self.min_age_secs {
                tracing::debug!(path = %object.path, "object too recent to sweep");
                continue;
            }
            match self.reconcile(&object.path).await {
                Ok(true) => {
                    tracing::info!(path = %object.path, "removed orphaned object");
                    report.removed += 1;
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(path = %object.path, error = %e, "failed to reconcile object");
                    report.failed += 1;
                }
            }
        }
    }

    /// Lists the whole folder before anything is removed, so deletions
    /// cannot shift the pages.
    async fn collect(&self, folder: &str) -> BackendResult<Vec<ObjectInfo>> {
        let mut paths = Vec::new();
        let mut offset = 0;
        loop {
            let page = self
                .backend
                .list(
                    folder,
                    Page {
                        limit: self.page_size,
                        offset,
                    },
                )
                .await?;
            let len = page.len();
            paths.extend(page);
            if len < self.page_size {
                return Ok(paths);
            }
            offset += len;
        }
    }

    async fn reconcile(&self, path: &str) -> BackendResult<bool> {
        for table in [Table::Users, Table::Posts] {
            let refs = self
                .backend
                .count(&Query::from(table).filter(Filter::eq("filepath", path)))
                .await?;
            if refs > 0 {
                return Ok(false);
            }
        }
        self.backend.remove(&[path.to_string()]).await?;
        Ok(true)
    }
}

/// Runs the sweep every `interval_secs` until `shutdown` flips to true.
pub fn spawn(
    sweeper: Arc<AssetSweeper>,
    config: &SweepConfig,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    let period = Duration::from_secs(config.interval_secs.max(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    sweeper.run_once(&shutdown).await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::info!("asset sweep stopped");
    })
}
