//! In-memory view of the cached collections.
//!
//! [`LocalCache`] pairs the durable [`LocalStore`] with a snapshot readers can
//! take without touching the database. Every write goes to the store first;
//! the affected collection is then reloaded into memory.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::db::{LocalStore, StoredRecord};
use crate::error::Result;
use crate::models::{AttendanceRecord, CampaignConfig, Collection, Member, RecordId};

/// Cached collections plus the loading/error flags shown to consumers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CampaignState {
    /// Oldest first
    pub members: Vec<Member>,
    /// Newest day first
    pub attendance: Vec<AttendanceRecord>,
    pub configs: Vec<CampaignConfig>,
    pub loading: bool,
    pub error: Option<String>,
}

impl CampaignState {
    /// The effective campaign configuration.
    ///
    /// A locally created config still awaiting confirmation wins over a
    /// remote one; with nothing cached the built-in defaults apply.
    pub fn config(&self) -> CampaignConfig {
        self.stored_config().cloned().unwrap_or_default()
    }

    /// The stored configuration record, if any
    pub fn stored_config(&self) -> Option<&CampaignConfig> {
        self.configs
            .iter()
            .find(|config| config.id.is_temporary())
            .or_else(|| self.configs.first())
    }
}

/// A record type kept in both the store and the in-memory state
pub trait SyncedRecord: StoredRecord + Clone {
    const COLLECTION: Collection;

    fn id(&self) -> &RecordId;

    /// Replace this type's slice of the in-memory state
    fn install(state: &mut CampaignState, records: Vec<Self>);
}

impl SyncedRecord for Member {
    const COLLECTION: Collection = Collection::Members;

    fn id(&self) -> &RecordId {
        &self.id
    }

    fn install(state: &mut CampaignState, mut records: Vec<Self>) {
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        state.members = records;
    }
}

impl SyncedRecord for AttendanceRecord {
    const COLLECTION: Collection = Collection::Attendance;

    fn id(&self) -> &RecordId {
        &self.id
    }

    fn install(state: &mut CampaignState, mut records: Vec<Self>) {
        records.sort_by(|a, b| b.date.cmp(&a.date));
        state.attendance = records;
    }
}

impl SyncedRecord for CampaignConfig {
    const COLLECTION: Collection = Collection::Config;

    fn id(&self) -> &RecordId {
        &self.id
    }

    fn install(state: &mut CampaignState, records: Vec<Self>) {
        state.configs = records;
    }
}

/// Durable store plus in-memory snapshot. Cloning shares both.
#[derive(Clone)]
pub struct LocalCache {
    store: LocalStore,
    state: Arc<RwLock<CampaignState>>,
}

impl LocalCache {
    pub fn new(store: LocalStore) -> Self {
        Self {
            store,
            state: Arc::new(RwLock::new(CampaignState::default())),
        }
    }

    pub const fn store(&self) -> &LocalStore {
        &self.store
    }

    pub async fn snapshot(&self) -> CampaignState {
        self.state.read().await.clone()
    }

    /// Read part of the state without cloning all of it
    pub async fn read<R>(&self, f: impl FnOnce(&CampaignState) -> R) -> R {
        f(&*self.state.read().await)
    }

    /// Reload one collection from the store
    pub async fn refresh<T: SyncedRecord>(&self) -> Result<()> {
        let records = self.store.get_all::<T>().await?;
        T::install(&mut *self.state.write().await, records);
        Ok(())
    }

    /// Reload every collection from the store
    pub async fn load_all(&self) -> Result<()> {
        self.refresh::<Member>().await?;
        self.refresh::<AttendanceRecord>().await?;
        self.refresh::<CampaignConfig>().await
    }

    pub async fn write<T: SyncedRecord>(&self, record: &T) -> Result<()> {
        self.store.put(record).await?;
        self.refresh::<T>().await
    }

    pub async fn write_many<T: SyncedRecord>(&self, records: &[T]) -> Result<()> {
        self.store.put_many(records).await?;
        self.refresh::<T>().await
    }

    pub async fn delete<T: SyncedRecord>(&self, id: &RecordId) -> Result<()> {
        self.store.remove::<T>(id.as_str()).await?;
        self.refresh::<T>().await
    }

    /// Replace an optimistic record with its remote-confirmed version.
    ///
    /// Swapping a member also repoints that member's cached attendance.
    pub async fn swap<T: SyncedRecord>(&self, temporary: &RecordId, confirmed: &T) -> Result<()> {
        self.store.replace(temporary.as_str(), confirmed).await?;
        if T::COLLECTION == Collection::Members {
            self.repoint_attendance(temporary, confirmed.id()).await?;
        }
        self.refresh::<T>().await
    }

    /// Attendance rows referencing a member
    pub async fn attendance_of(&self, member_id: &RecordId) -> Result<Vec<AttendanceRecord>> {
        let all = self.store.get_all::<AttendanceRecord>().await?;
        Ok(all
            .into_iter()
            .filter(|record| &record.member_id == member_id)
            .collect())
    }

    async fn repoint_attendance(&self, from: &RecordId, to: &RecordId) -> Result<()> {
        let moved: Vec<AttendanceRecord> = self
            .attendance_of(from)
            .await?
            .into_iter()
            .map(|record| AttendanceRecord {
                member_id: to.clone(),
                ..record
            })
            .collect();
        if !moved.is_empty() {
            tracing::debug!("Repointing {} attendance rows from {from} to {to}", moved.len());
            self.write_many(&moved).await?;
        }
        Ok(())
    }

    pub async fn set_loading(&self, loading: bool) {
        self.state.write().await.loading = loading;
    }

    pub async fn set_error(&self, error: Option<String>) {
        self.state.write().await.error = error;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PrayerSlot;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    async fn cache() -> LocalCache {
        let cache = LocalCache::new(LocalStore::open_in_memory().await.unwrap());
        cache.load_all().await.unwrap();
        cache
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn writes_are_visible_in_snapshot() {
        let cache = cache().await;
        let member = Member::new_local("Karim", None).unwrap();
        cache.write(&member).await.unwrap();

        let state = cache.snapshot().await;
        assert_eq!(state.members, vec![member]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn swapping_a_member_repoints_attendance() {
        let cache = cache().await;
        let member = Member::new_local("Karim", None).unwrap();
        cache.write(&member).await.unwrap();
        let day = NaiveDate::from_ymd_opt(2026, 2, 10).unwrap();
        let record = AttendanceRecord::first_toggle(member.id.clone(), day, PrayerSlot::Fajr);
        cache.write(&record).await.unwrap();

        let confirmed = Member {
            id: RecordId::from("remote-karim"),
            ..member.clone()
        };
        cache.swap(&member.id, &confirmed).await.unwrap();

        let state = cache.snapshot().await;
        assert_eq!(state.members, vec![confirmed.clone()]);
        assert_eq!(state.attendance.len(), 1);
        assert_eq!(state.attendance[0].member_id, confirmed.id);
        assert_eq!(state.attendance[0].id, record.id);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn attendance_is_newest_first() {
        let cache = cache().await;
        for d in [3, 9, 5] {
            let day = NaiveDate::from_ymd_opt(2026, 2, d).unwrap();
            let record = AttendanceRecord::first_toggle("m1".into(), day, PrayerSlot::Asr);
            cache.write(&record).await.unwrap();
        }
        let days: Vec<u32> = cache
            .read(|state| state.attendance.iter().map(|r| chrono::Datelike::day(&r.date)).collect())
            .await;
        assert_eq!(days, vec![9, 5, 3]);
    }

    #[test]
    fn config_prefers_pending_then_stored_then_default() {
        let mut state = CampaignState::default();
        assert_eq!(state.config().streak_target, 41);
        assert!(state.stored_config().is_none());

        let remote = CampaignConfig {
            id: RecordId::from("remote-config"),
            streak_target: 30,
            ..CampaignConfig::default()
        };
        state.configs = vec![remote.clone()];
        assert_eq!(state.config(), remote);

        let pending = CampaignConfig {
            streak_target: 35,
            ..CampaignConfig::default()
        };
        state.configs = vec![remote, pending.clone()];
        assert_eq!(state.config(), pending);
    }
}
