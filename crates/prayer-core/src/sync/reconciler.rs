//! Pull authoritative remote state into the local cache.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::models::{AttendanceRecord, CampaignConfig, Collection, Member, RecordId};
use crate::remote::RemoteStore;
use crate::state::{LocalCache, SyncedRecord};

use super::SyncQueue;

/// Clears a running flag when dropped
pub(super) struct PassGuard<'a>(&'a AtomicBool);

impl<'a> PassGuard<'a> {
    /// `None` when another pass already holds the flag
    pub(super) fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Replaces each cached collection with the remote's full set.
///
/// Per collection: fetch, decode, upsert, then prune. A fetch or decode
/// failure leaves that collection's cache untouched.
#[derive(Clone)]
pub struct RemoteReconciler {
    cache: LocalCache,
    queue: SyncQueue,
    remote: Arc<dyn RemoteStore>,
    running: Arc<AtomicBool>,
}

impl RemoteReconciler {
    pub fn new(cache: LocalCache, queue: SyncQueue, remote: Arc<dyn RemoteStore>) -> Self {
        Self {
            cache,
            queue,
            remote,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Reconcile every collection.
    ///
    /// Returns `Ok(false)` when another pass was already running. The first
    /// failure is returned after the remaining collections were attempted and
    /// is recorded as the cache's error.
    pub async fn reconcile_all(&self) -> Result<bool> {
        self.run(&Collection::ALL).await
    }

    /// Reconcile a single collection, e.g. after a change notification
    pub async fn reconcile_collection(&self, collection: Collection) -> Result<bool> {
        self.run(&[collection]).await
    }

    async fn run(&self, collections: &[Collection]) -> Result<bool> {
        let Some(_guard) = PassGuard::acquire(&self.running) else {
            tracing::debug!("Reconciliation already running; skipping");
            return Ok(false);
        };

        self.cache.set_loading(true).await;
        let mut first_error = None;
        for collection in collections {
            let result = match collection {
                Collection::Members => self.reconcile::<Member>().await,
                Collection::Attendance => self.reconcile::<AttendanceRecord>().await,
                Collection::Config => self.reconcile::<CampaignConfig>().await,
            };
            if let Err(error) = result {
                tracing::warn!("{error}");
                if first_error.is_none() {
                    first_error = Some(error);
                }
            }
        }
        self.cache.set_loading(false).await;

        match first_error {
            Some(error) => {
                self.cache.set_error(Some(error.to_string())).await;
                Err(error)
            }
            None => {
                self.cache.set_error(None).await;
                Ok(true)
            }
        }
    }

    /// Reconcile one collection
    pub async fn reconcile<T: SyncedRecord>(&self) -> Result<()> {
        let fetched = self.upsert::<T>().await?;
        let pruned = self.prune::<T>(&fetched).await?;
        tracing::debug!(
            "Reconciled {}: {} fetched, {pruned} pruned",
            T::COLLECTION,
            fetched.len()
        );
        Ok(())
    }

    /// Fetch and store the remote's rows; returns the fetched keys.
    ///
    /// Nothing is written unless every row decodes.
    async fn upsert<T: SyncedRecord>(&self) -> Result<HashSet<String>> {
        let collection = T::COLLECTION;
        let failed = |reason: String| Error::ReconciliationFailed { collection, reason };

        let rows = self
            .remote
            .select_all(collection, collection.default_order())
            .await
            .map_err(|error| failed(error.to_string()))?;
        let records = rows
            .into_iter()
            .map(serde_json::from_value::<T>)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|error| failed(format!("undecodable row: {error}")))?;

        self.cache.store().put_many(&records).await?;
        self.cache.refresh::<T>().await?;
        Ok(records.iter().map(|record| record.key().to_string()).collect())
    }

    /// Remove cached records the remote no longer has
    async fn prune<T: SyncedRecord>(&self, fetched: &HashSet<String>) -> Result<usize> {
        let store = self.cache.store();
        let pending = self.queue.pending_ids().await?;
        let mut pruned = 0;
        for key in store.keys::<T>().await? {
            if fetched.contains(&key) {
                continue;
            }
            // Not on the remote yet; its add is still queued.
            if RecordId::from(key.as_str()).is_temporary() && pending.contains(&key) {
                continue;
            }
            store.remove::<T>(&key).await?;
            pruned += 1;
        }
        if pruned > 0 {
            self.cache.refresh::<T>().await?;
        }
        Ok(pruned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::LocalStore;
    use crate::models::SyncAction;
    use crate::remote::MemoryRemote;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    struct Fixture {
        remote: MemoryRemote,
        cache: LocalCache,
        queue: SyncQueue,
        reconciler: RemoteReconciler,
    }

    async fn fixture() -> Fixture {
        let store = LocalStore::open_in_memory().await.unwrap();
        let cache = LocalCache::new(store.clone());
        let queue = SyncQueue::new(store);
        let remote = MemoryRemote::new();
        let reconciler = RemoteReconciler::new(cache.clone(), queue.clone(), Arc::new(remote.clone()));
        Fixture {
            remote,
            cache,
            queue,
            reconciler,
        }
    }

    fn member_row(id: &str, name: &str) -> serde_json::Value {
        json!({ "id": id, "name": name, "phone": null, "photo_url": null, "created_at": "2026-02-04T08:00:00Z" })
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn prunes_records_missing_remotely() {
        let f = fixture().await;
        f.remote.seed(Collection::Members, [member_row("r1", "A")]);
        let stale = Member {
            id: RecordId::from("gone"),
            ..Member::new_local("Stale", None).unwrap()
        };
        f.cache.write(&stale).await.unwrap();

        assert!(f.reconciler.reconcile_all().await.unwrap());
        let ids: Vec<_> = f
            .cache
            .snapshot()
            .await
            .members
            .into_iter()
            .map(|member| member.id.to_string())
            .collect();
        assert_eq!(ids, vec!["r1".to_string()]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn keeps_optimistic_records_with_pending_adds() {
        let f = fixture().await;
        let optimistic = Member::new_local("Offline", None).unwrap();
        f.cache.write(&optimistic).await.unwrap();
        f.queue
            .enqueue(
                Collection::Members,
                SyncAction::Add,
                serde_json::to_value(&optimistic).unwrap(),
            )
            .await
            .unwrap();

        f.reconciler.reconcile_all().await.unwrap();
        assert_eq!(f.cache.snapshot().await.members, vec![optimistic]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn fetch_failure_leaves_cache_and_sets_error() {
        let f = fixture().await;
        let member = Member::new_local("Cached", None).unwrap();
        f.cache.write(&member).await.unwrap();
        f.remote.set_reachable(false);

        let error = f.reconciler.reconcile_all().await.unwrap_err();
        assert!(matches!(error, Error::ReconciliationFailed { .. }));
        let state = f.cache.snapshot().await;
        assert_eq!(state.members, vec![member]);
        assert!(state.error.is_some());
        assert!(!state.loading);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn undecodable_row_aborts_before_touching_store() {
        let f = fixture().await;
        let member = Member {
            id: RecordId::from("r-old"),
            ..Member::new_local("Cached", None).unwrap()
        };
        f.cache.write(&member).await.unwrap();
        f.remote.seed(
            Collection::Members,
            [member_row("r1", "A"), json!({ "id": "r2", "name": 7 })],
        );

        assert!(f.reconciler.reconcile::<Member>().await.is_err());
        assert_eq!(f.cache.store().get_all::<Member>().await.unwrap(), vec![member]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn repeated_passes_are_idempotent() {
        let f = fixture().await;
        f.remote.seed(Collection::Members, [member_row("r1", "A"), member_row("r2", "B")]);
        f.remote.seed(
            Collection::Attendance,
            [json!({ "id": "a1", "member_id": "r1", "date": "2026-02-10", "fajr": true,
                     "zuhr": false, "asr": false, "maghrib": false, "isha": false })],
        );

        f.reconciler.reconcile_all().await.unwrap();
        let first = f.cache.snapshot().await;
        f.reconciler.reconcile_all().await.unwrap();
        assert_eq!(f.cache.snapshot().await, first);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn pass_stopped_before_prune_keeps_remote_records() {
        let f = fixture().await;
        let stale = Member {
            id: RecordId::from("gone"),
            ..Member::new_local("Stale", None).unwrap()
        };
        f.cache.write(&stale).await.unwrap();
        f.remote.seed(Collection::Members, [member_row("r1", "A"), member_row("r2", "B")]);

        let fetched = f.reconciler.upsert::<Member>().await.unwrap();
        assert_eq!(fetched.len(), 2);
        let mut ids: Vec<_> = f
            .cache
            .snapshot()
            .await
            .members
            .into_iter()
            .map(|member| member.id.to_string())
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["gone", "r1", "r2"]);

        f.reconciler.reconcile_all().await.unwrap();
        let mut ids: Vec<_> = f
            .cache
            .snapshot()
            .await
            .members
            .into_iter()
            .map(|member| member.id.to_string())
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["r1", "r2"]);
    }

    #[test]
    fn guard_rejects_overlap_and_releases_on_drop() {
        let flag = AtomicBool::new(false);
        let guard = PassGuard::acquire(&flag).unwrap();
        assert!(PassGuard::acquire(&flag).is_none());
        drop(guard);
        assert!(PassGuard::acquire(&flag).is_some());
    }
}
