//! Replay of queued mutations after a reconnect.

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{Error, Result};
use crate::models::{
    AttendanceRecord, CampaignConfig, Collection, Member, RecordId, SyncAction, SyncQueueItem,
    LOCAL_ID_PREFIX,
};
use crate::network::NetworkMonitor;
use crate::remote::RemoteStore;
use crate::state::{LocalCache, SyncedRecord};

use super::reconciler::PassGuard;
use super::replicator::decode_confirmed;
use super::{dispatch, RemoteReconciler, SyncNotice, SyncQueue};

/// Outcome of one drain pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub synced: usize,
    pub failed: usize,
}

impl DrainReport {
    /// Notices for the user; empty when nothing was replayed
    pub fn notices(&self) -> Vec<SyncNotice> {
        let mut notices = Vec::new();
        if self.synced > 0 {
            notices.push(SyncNotice::Synced(self.synced));
        }
        if self.failed > 0 {
            notices.push(SyncNotice::Failed(self.failed));
        }
        notices
    }
}

/// Replays the queue in FIFO order, then reconciles.
///
/// Failed items stay queued for the next pass. Only one pass runs at a time;
/// a trigger arriving during a pass is dropped.
#[derive(Clone)]
pub struct QueueDrainer {
    cache: LocalCache,
    queue: SyncQueue,
    remote: Arc<dyn RemoteStore>,
    network: NetworkMonitor,
    reconciler: RemoteReconciler,
    running: Arc<AtomicBool>,
}

impl QueueDrainer {
    pub fn new(
        cache: LocalCache,
        queue: SyncQueue,
        remote: Arc<dyn RemoteStore>,
        network: NetworkMonitor,
        reconciler: RemoteReconciler,
    ) -> Self {
        Self {
            cache,
            queue,
            remote,
            network,
            reconciler,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Run one pass. `Ok(None)` when offline or when a pass is already running.
    pub async fn drain(&self) -> Result<Option<DrainReport>> {
        if !self.network.is_online() {
            tracing::debug!("Offline; not draining sync queue");
            return Ok(None);
        }
        let Some(_guard) = PassGuard::acquire(&self.running) else {
            tracing::debug!("Sync queue drain already running; skipping");
            return Ok(None);
        };

        let items = self.queue.list_pending().await?;
        tracing::info!("Replaying {} queued changes", items.len());

        let mut confirmed_ids: HashMap<String, String> = HashMap::new();
        let mut report = DrainReport::default();
        for mut item in items {
            for (temporary, confirmed) in &confirmed_ids {
                item.retarget(temporary, confirmed);
            }
            match self.replay(&item).await {
                Ok(confirmed) => {
                    if let Some((temporary, remote_id)) = confirmed {
                        self.queue.retarget(&temporary, &remote_id).await?;
                        confirmed_ids.insert(temporary, remote_id);
                    }
                    self.queue.dequeue(&item.id).await?;
                    report.synced += 1;
                }
                Err(error) => {
                    tracing::warn!("{error}");
                    report.failed += 1;
                }
            }
        }

        self.network.reset_was_offline();
        if let Err(error) = self.reconciler.reconcile_all().await {
            tracing::warn!("Reconciliation after drain failed: {error}");
        }

        tracing::info!(
            "Sync queue drained: {} synced, {} failed",
            report.synced,
            report.failed
        );
        Ok(Some(report))
    }

    /// Replay one item; a confirmed `add` yields its `(temporary, remote)` id pair
    async fn replay(&self, item: &SyncQueueItem) -> Result<Option<(String, String)>> {
        let failed = |reason: String| Error::QueueReplayFailed {
            item_id: item.id.clone(),
            reason,
        };

        if let Some(unconfirmed) = unconfirmed_reference(item) {
            return Err(failed(format!("depends on unconfirmed record {unconfirmed}")));
        }

        tracing::debug!("Replaying {} on {} ({})", item.action, item.collection, item.id);
        let row = dispatch(self.remote.as_ref(), item.collection, item.action, &item.payload)
            .await
            .map_err(|error| failed(error.to_string()))?;

        if item.action != SyncAction::Add {
            return Ok(None);
        }
        let Some(temporary) = item.target_id().map(RecordId::from) else {
            return Ok(None);
        };
        let remote_id = match item.collection {
            Collection::Members => self.confirm::<Member>(&temporary, row).await,
            Collection::Attendance => self.confirm::<AttendanceRecord>(&temporary, row).await,
            Collection::Config => self.confirm::<CampaignConfig>(&temporary, row).await,
        }
        .map_err(|error| failed(error.to_string()))?;

        Ok(Some((temporary.to_string(), remote_id.to_string())))
    }

    async fn confirm<T: SyncedRecord>(&self, temporary: &RecordId, row: Option<Value>) -> Result<RecordId> {
        let confirmed = decode_confirmed::<T>(row)?;
        self.cache.swap(temporary, &confirmed).await?;
        Ok(confirmed.id().clone())
    }
}

/// A temporary id the remote cannot resolve yet.
///
/// An `add` may carry its own temporary id; anything else pointing at a
/// temporary id depends on an `add` that has not been confirmed.
fn unconfirmed_reference(item: &SyncQueueItem) -> Option<&str> {
    item.references()
        .filter(|(key, _)| !(item.action == SyncAction::Add && *key == "id"))
        .map(|(_, value)| value)
        .find(|value| value.starts_with(LOCAL_ID_PREFIX))
}
