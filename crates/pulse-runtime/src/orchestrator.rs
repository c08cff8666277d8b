//! Async watch-mode orchestrator.
//!
//! Polls the configured import files in a tokio task, re-ingests any file
//! whose modification time changed, and sends a fresh [`DashboardUpdate`]
//! through an `mpsc` channel whenever the data or the filters change.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use pulse_core::models::{DashboardData, Filters, SourceType};
use pulse_core::notifications::EventBus;
use tokio::sync::{mpsc, watch};
use tokio::time;

use crate::data_manager::DataManager;
use crate::ingest::{ingest_path, IngestOutcome};
use crate::store::KeyValueStore;

// ── Public types ──────────────────────────────────────────────────────────────

/// What caused a dashboard to be sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateReason {
    Initial,
    DataChanged,
    FiltersChanged,
}

/// One dashboard snapshot forwarded to the caller.
#[derive(Debug, Clone)]
pub struct DashboardUpdate {
    pub reason: UpdateReason,
    pub dashboard: DashboardData,
    pub filters: Filters,
    /// Files ingested since the previous update.
    pub ingested: Vec<IngestOutcome>,
}

// ── WatchOrchestrator ─────────────────────────────────────────────────────────

/// Background coordinator for `--watch`.
pub struct WatchOrchestrator {
    /// How often import files are polled.
    update_interval: Duration,
    store: Arc<dyn KeyValueStore>,
    imports: Vec<(SourceType, PathBuf)>,
    filters: Filters,
}

impl WatchOrchestrator {
    pub fn new(
        update_interval_secs: u64,
        store: Arc<dyn KeyValueStore>,
        imports: Vec<(SourceType, PathBuf)>,
        filters: Filters,
    ) -> Self {
        Self {
            update_interval: Duration::from_secs(update_interval_secs.max(1)),
            store,
            imports,
            filters,
        }
    }

    /// Spawn the watch loop. Returns the update stream and a handle for
    /// changing filters or stopping the loop.
    pub fn start(self) -> (mpsc::Receiver<DashboardUpdate>, WatchHandle) {
        let (tx, rx) = mpsc::channel(16);
        let (filters_tx, filters_rx) = watch::channel(self.filters);

        let handle = tokio::spawn(async move {
            self.watch_loop(tx, filters_rx).await;
        });

        (rx, WatchHandle { handle, filters_tx })
    }

    // ── Private implementation ────────────────────────────────────────────

    async fn watch_loop(
        self,
        tx: mpsc::Sender<DashboardUpdate>,
        mut filters_rx: watch::Receiver<Filters>,
    ) {
        let bus = EventBus::new();
        let data_manager = DataManager::new(Arc::clone(&self.store), self.filters);
        data_manager.subscribe(&bus);
        let mut seen: HashMap<PathBuf, SystemTime> = HashMap::new();

        let ingested = self.ingest_changed(&bus, &mut seen).await;
        let Some(mut data_manager) =
            send_update(data_manager, &tx, UpdateReason::Initial, ingested).await
        else {
            return;
        };

        let mut interval = time::interval(self.update_interval);
        // The first tick fires immediately; the initial scan already ran.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let ingested = self.ingest_changed(&bus, &mut seen).await;
                    if data_manager.is_stale() {
                        let reason = UpdateReason::DataChanged;
                        match send_update(data_manager, &tx, reason, ingested).await {
                            Some(mgr) => data_manager = mgr,
                            None => break,
                        }
                    }
                }
                changed = filters_rx.changed() => {
                    if changed.is_err() {
                        tracing::debug!("filter sender dropped; exiting watch loop");
                        break;
                    }
                    let filters = *filters_rx.borrow_and_update();
                    data_manager.set_filters(filters);
                    if data_manager.is_stale() {
                        let reason = UpdateReason::FiltersChanged;
                        match send_update(data_manager, &tx, reason, Vec::new()).await {
                            Some(mgr) => data_manager = mgr,
                            None => break,
                        }
                    }
                }
            }

            if tx.is_closed() {
                tracing::debug!("update channel closed; exiting watch loop");
                break;
            }
        }
    }

    /// Ingest every import whose modification time differs from the last
    /// one seen. Failures are logged and leave the other sources alone.
    async fn ingest_changed(
        &self,
        bus: &EventBus,
        seen: &mut HashMap<PathBuf, SystemTime>,
    ) -> Vec<IngestOutcome> {
        let mut outcomes = Vec::new();

        for (source, path) in &self.imports {
            let modified = match tokio::fs::metadata(path).await.and_then(|m| m.modified()) {
                Ok(t) => t,
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "import not readable");
                    continue;
                }
            };
            if seen.get(path) == Some(&modified) {
                continue;
            }
            seen.insert(path.clone(), modified);

            match ingest_path(self.store.as_ref(), bus, *source, path).await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    tracing::warn!(
                        source = %source,
                        path = %path.display(),
                        error = %e,
                        "import failed"
                    );
                }
            }
        }
        outcomes
    }
}

/// Rebuild the dashboard and send it. The rebuild runs on the blocking pool
/// because the store may read from disk. `None` when the loop should stop.
async fn send_update(
    mut data_manager: DataManager,
    tx: &mpsc::Sender<DashboardUpdate>,
    reason: UpdateReason,
    ingested: Vec<IngestOutcome>,
) -> Option<DataManager> {
    let rebuilt = tokio::task::spawn_blocking(move || {
        let dashboard = data_manager.get_dashboard().cloned();
        (data_manager, dashboard)
    })
    .await;
    let (data_manager, dashboard) = match rebuilt {
        Ok(pair) => pair,
        Err(e) => {
            tracing::error!(error = %e, "dashboard rebuild task failed");
            return None;
        }
    };

    let dashboard = match dashboard {
        Ok(d) => d,
        Err(e) => {
            tracing::warn!(error = %e, "no dashboard available; skipping send");
            return Some(data_manager);
        }
    };

    let update = DashboardUpdate {
        reason,
        dashboard,
        filters: *data_manager.filters(),
        ingested,
    };
    if let Err(e) = tx.send(update).await {
        tracing::warn!(error = %e, "failed to send dashboard update; receiver dropped");
        return None;
    }
    Some(data_manager)
}

// ── WatchHandle ───────────────────────────────────────────────────────────────

/// Handle to the background watch task.
pub struct WatchHandle {
    handle: tokio::task::JoinHandle<()>,
    filters_tx: watch::Sender<Filters>,
}

impl WatchHandle {
    /// Replace the filter snapshot; the loop recomputes if it differs.
    pub fn set_filters(&self, filters: Filters) {
        if self.filters_tx.send(filters).is_err() {
            tracing::debug!("watch loop already stopped");
        }
    }

    /// Immediately abort the watch loop.
    pub fn abort(&self) {
        self.handle.abort();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
