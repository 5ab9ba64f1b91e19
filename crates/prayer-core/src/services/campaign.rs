//! The cache and sync engine behind the attendance screens.

use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::db::LocalStore;
use crate::error::Result;
use crate::models::{
    AttendanceRecord, CampaignConfig, Collection, ConfigPatch, Member, MemberPatch, PrayerSlot,
    RecordId, SyncQueueItem,
};
use crate::network::{NetworkMonitor, NetworkStatus};
use crate::remote::{RemoteChange, RemoteStore};
use crate::state::{CampaignState, LocalCache};
use crate::sync::{
    Applied, DrainReport, MutationReplicator, QueueDrainer, RemoteReconciler, SyncNotice,
    SyncQueue,
};

const NOTICE_CAPACITY: usize = 32;

/// Thread-safe service owning the local cache and the sync components.
///
/// Reads come from memory and never wait on the network. Writes are applied
/// locally first and then confirmed remotely or queued.
#[derive(Clone)]
pub struct CampaignService {
    cache: LocalCache,
    queue: SyncQueue,
    network: NetworkMonitor,
    remote: Arc<dyn RemoteStore>,
    replicator: MutationReplicator,
    reconciler: RemoteReconciler,
    drainer: QueueDrainer,
    notices: broadcast::Sender<SyncNotice>,
}

/// Background sync tasks; dropping the handle stops them
#[must_use = "background sync stops when SyncTasks is dropped"]
pub struct SyncTasks {
    handles: Vec<JoinHandle<()>>,
}

impl SyncTasks {
    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for SyncTasks {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

impl CampaignService {
    /// Initialize the store and load the cached collections
    pub async fn open(
        store: LocalStore,
        remote: Arc<dyn RemoteStore>,
        network: NetworkMonitor,
    ) -> Result<Self> {
        store.init().await?;
        let cache = LocalCache::new(store.clone());
        cache.load_all().await?;

        let queue = SyncQueue::new(store);
        let reconciler = RemoteReconciler::new(cache.clone(), queue.clone(), remote.clone());
        let replicator =
            MutationReplicator::new(cache.clone(), queue.clone(), remote.clone(), network.clone());
        let drainer = QueueDrainer::new(
            cache.clone(),
            queue.clone(),
            remote.clone(),
            network.clone(),
            reconciler.clone(),
        );
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);

        Ok(Self {
            cache,
            queue,
            network,
            remote,
            replicator,
            reconciler,
            drainer,
            notices,
        })
    }

    /// Bring the cache up to date and start listening for changes.
    ///
    /// Online, a non-empty queue is drained (which reconciles afterwards);
    /// otherwise the cache is reconciled directly.
    pub async fn start(&self) -> SyncTasks {
        let status = self.network.subscribe();
        let subscriptions: Vec<_> = Collection::ALL
            .into_iter()
            .map(|collection| self.remote.subscribe(collection))
            .collect();

        self.mount().await;

        let mut handles = vec![tokio::spawn(watch_connectivity(self.clone(), status))];
        handles.extend(
            subscriptions
                .into_iter()
                .map(|changes| tokio::spawn(watch_remote(self.clone(), changes))),
        );
        tracing::info!("Sync engine started");
        SyncTasks { handles }
    }

    /// One-shot catch-up without background tasks: drain a non-empty queue,
    /// otherwise reconcile. Does nothing offline.
    pub async fn mount(&self) {
        if !self.network.is_online() {
            tracing::info!("Starting offline; serving cached data");
            return;
        }
        match self.queue.is_empty().await {
            Ok(false) => self.drain_and_notify().await,
            Ok(true) => {
                if let Err(error) = self.reconciler.reconcile_all().await {
                    tracing::warn!("Initial reconciliation failed: {error}");
                }
            }
            Err(error) => tracing::warn!("Could not read sync queue: {error}"),
        }
    }

    async fn drain_and_notify(&self) {
        match self.drainer.drain().await {
            Ok(Some(report)) => self.publish(&report),
            Ok(None) => {}
            Err(error) => tracing::warn!("Sync queue drain failed: {error}"),
        }
    }

    fn publish(&self, report: &DrainReport) {
        for notice in report.notices() {
            let _ = self.notices.send(notice);
        }
    }

    fn announce<T>(&self, applied: Applied<T>) -> Applied<T> {
        if applied.is_queued() {
            let _ = self.notices.send(SyncNotice::SavedOffline);
        }
        applied
    }

    pub async fn list_members(&self) -> Vec<Member> {
        self.cache.read(|state| state.members.clone()).await
    }

    pub async fn list_attendance(&self) -> Vec<AttendanceRecord> {
        self.cache.read(|state| state.attendance.clone()).await
    }

    /// Stored configuration, or the campaign defaults
    pub async fn get_config(&self) -> CampaignConfig {
        self.cache.read(CampaignState::config).await
    }

    pub async fn snapshot(&self) -> CampaignState {
        self.cache.snapshot().await
    }

    pub async fn add_member(&self, name: &str, phone: Option<String>) -> Result<Applied<Member>> {
        let applied = self.replicator.add_member(name, phone).await?;
        Ok(self.announce(applied))
    }

    pub async fn toggle_attendance(
        &self,
        member_id: &RecordId,
        date: NaiveDate,
        slot: PrayerSlot,
    ) -> Result<Applied<AttendanceRecord>> {
        let applied = self
            .replicator
            .toggle_attendance(member_id, date, slot)
            .await?;
        Ok(self.announce(applied))
    }

    pub async fn remove_member(&self, id: &RecordId) -> Result<Applied<Member>> {
        let applied = self.replicator.remove_member(id).await?;
        Ok(self.announce(applied))
    }

    pub async fn update_member(&self, id: &RecordId, patch: &MemberPatch) -> Result<Applied<Member>> {
        let applied = self.replicator.update_member(id, patch).await?;
        Ok(self.announce(applied))
    }

    pub async fn update_config(&self, patch: &ConfigPatch) -> Result<Applied<CampaignConfig>> {
        let applied = self.replicator.update_config(patch).await?;
        Ok(self.announce(applied))
    }

    pub fn is_online(&self) -> bool {
        self.network.is_online()
    }

    pub const fn network(&self) -> &NetworkMonitor {
        &self.network
    }

    pub async fn loading(&self) -> bool {
        self.cache.read(|state| state.loading).await
    }

    /// Last reconciliation failure, cleared by the next successful pass
    pub async fn error(&self) -> Option<String> {
        self.cache.read(|state| state.error.clone()).await
    }

    /// Number of queued changes not yet replayed
    pub async fn pending_changes(&self) -> Result<usize> {
        self.queue.len().await
    }

    /// Queued changes, oldest first
    pub async fn pending_items(&self) -> Result<Vec<SyncQueueItem>> {
        self.queue.list_pending().await
    }

    /// Replay the queue now; `Ok(None)` when offline or already draining
    pub async fn sync_now(&self) -> Result<Option<DrainReport>> {
        let report = self.drainer.drain().await?;
        if let Some(report) = &report {
            self.publish(report);
        }
        Ok(report)
    }

    /// Reconcile every collection with the remote
    pub async fn refresh(&self) -> Result<bool> {
        self.reconciler.reconcile_all().await
    }

    /// Cached attendance between two days, inclusive
    pub async fn attendance_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>> {
        self.cache.store().attendance_between(from, to).await
    }

    pub fn notices(&self) -> broadcast::Receiver<SyncNotice> {
        self.notices.subscribe()
    }
}

async fn watch_connectivity(service: CampaignService, mut status: watch::Receiver<NetworkStatus>) {
    while status.changed().await.is_ok() {
        let current = *status.borrow_and_update();
        if current.just_reconnected() {
            tracing::info!("Reconnected; replaying queued changes");
            service.drain_and_notify().await;
        }
    }
}

async fn watch_remote(service: CampaignService, mut changes: broadcast::Receiver<RemoteChange>) {
    loop {
        let collection = match changes.recv().await {
            Ok(RemoteChange { collection }) => Some(collection),
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!("Missed {skipped} change notifications");
                None
            }
            Err(RecvError::Closed) => break,
        };
        if !service.network.is_online() {
            continue;
        }
        let result = match collection {
            Some(collection) => service.reconciler.reconcile_collection(collection).await,
            None => service.reconciler.reconcile_all().await,
        };
        if let Err(error) = result {
            tracing::warn!("Reconciliation after remote change failed: {error}");
        }
    }
}
