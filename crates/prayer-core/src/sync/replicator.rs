//! Optimistic local writes forwarded to the remote or queued.
//!
//! Every mutation is written locally before any remote call. Online, the
//! remote's answer either confirms the write (temporary ids are swapped for
//! remote ones) or rolls it back. Offline, the canonical payload is queued.
//! A mutation that references a record whose own `add` is still queued is
//! queued as well, even online, so replay order is preserved.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::{json, Value};

use crate::error::{Error, Result};
use crate::models::{
    AttendanceRecord, CampaignConfig, Collection, ConfigPatch, Member, MemberPatch, PrayerSlot,
    RecordId, SyncAction,
};
use crate::network::NetworkMonitor;
use crate::remote::{RemoteError, RemoteStore};
use crate::state::{LocalCache, SyncedRecord};

use super::{dispatch, Applied, SyncQueue};

enum Forwarded {
    Remote(Option<Value>),
    Queued,
}

/// Applies consumer mutations to the cache, the remote and the queue
#[derive(Clone)]
pub struct MutationReplicator {
    cache: LocalCache,
    queue: SyncQueue,
    remote: Arc<dyn RemoteStore>,
    network: NetworkMonitor,
}

impl MutationReplicator {
    pub fn new(
        cache: LocalCache,
        queue: SyncQueue,
        remote: Arc<dyn RemoteStore>,
        network: NetworkMonitor,
    ) -> Self {
        Self {
            cache,
            queue,
            remote,
            network,
        }
    }

    pub async fn add_member(&self, name: &str, phone: Option<String>) -> Result<Applied<Member>> {
        let member = Member::new_local(name, phone)?;
        self.cache.write(&member).await?;

        let payload = serde_json::to_value(&member)?;
        match self
            .forward(Collection::Members, SyncAction::Add, payload, false)
            .await
        {
            Ok(forwarded) => self.settle_add(&member, forwarded).await,
            Err(error) => {
                self.cache.delete::<Member>(&member.id).await?;
                Err(error)
            }
        }
    }

    /// Flip one prayer flag for a member on a day.
    ///
    /// The first toggle of a day creates the record with only that flag set;
    /// later toggles send the flag's new value.
    pub async fn toggle_attendance(
        &self,
        member_id: &RecordId,
        date: NaiveDate,
        slot: PrayerSlot,
    ) -> Result<Applied<AttendanceRecord>> {
        let store = self.cache.store();
        if store.get::<Member>(member_id.as_str()).await?.is_none() {
            return Err(Error::NotFound(format!("member {member_id}")));
        }

        match store.find_attendance(member_id, date).await? {
            None => {
                let record = AttendanceRecord::first_toggle(member_id.clone(), date, slot);
                self.cache.write(&record).await?;

                let payload = serde_json::to_value(&record)?;
                match self
                    .forward(
                        Collection::Attendance,
                        SyncAction::Add,
                        payload,
                        member_id.is_temporary(),
                    )
                    .await
                {
                    Ok(forwarded) => self.settle_add(&record, forwarded).await,
                    Err(error) => {
                        self.cache.delete::<AttendanceRecord>(&record.id).await?;
                        Err(error)
                    }
                }
            }
            Some(existing) => {
                let next = existing.toggled(slot);
                self.cache.write(&next).await?;

                let payload = next.flag_payload(slot);
                let deferred = existing.id.is_temporary();
                match self
                    .forward(Collection::Attendance, SyncAction::Update, payload, deferred)
                    .await
                {
                    Ok(forwarded) => Ok(settle_update(next, &forwarded)),
                    Err(error) => {
                        self.cache.write(&existing).await?;
                        Err(error)
                    }
                }
            }
        }
    }

    /// Delete a member and, locally, their attendance.
    ///
    /// Queued changes to the member's unconfirmed attendance are dropped once
    /// the removal succeeds.
    pub async fn remove_member(&self, id: &RecordId) -> Result<Applied<Member>> {
        let store = self.cache.store();
        let member = store
            .get::<Member>(id.as_str())
            .await?
            .ok_or_else(|| Error::NotFound(format!("member {id}")))?;
        let attendance = self.cache.attendance_of(id).await?;

        for record in &attendance {
            store.remove::<AttendanceRecord>(record.id.as_str()).await?;
        }
        self.cache.refresh::<AttendanceRecord>().await?;
        self.cache.delete::<Member>(id).await?;

        match self
            .forward(
                Collection::Members,
                SyncAction::Delete,
                json!({ "id": id }),
                id.is_temporary(),
            )
            .await
        {
            Ok(forwarded) => {
                let unconfirmed: HashSet<String> = attendance
                    .iter()
                    .filter(|record| record.id.is_temporary())
                    .map(|record| record.id.to_string())
                    .collect();
                if !unconfirmed.is_empty() {
                    self.queue.discard_targeting(&unconfirmed).await?;
                }
                Ok(settle_update(member, &forwarded))
            }
            Err(error) => {
                self.cache.write(&member).await?;
                self.cache.write_many(&attendance).await?;
                Err(error)
            }
        }
    }

    pub async fn update_member(&self, id: &RecordId, patch: &MemberPatch) -> Result<Applied<Member>> {
        if patch.is_empty() {
            return Err(Error::InvalidInput("member update changes nothing".into()));
        }
        let existing = self
            .cache
            .store()
            .get::<Member>(id.as_str())
            .await?
            .ok_or_else(|| Error::NotFound(format!("member {id}")))?;
        let updated = existing.patched(patch)?;
        self.cache.write(&updated).await?;

        let payload = patch.payload_for(&updated);
        match self
            .forward(Collection::Members, SyncAction::Update, payload, id.is_temporary())
            .await
        {
            Ok(forwarded) => Ok(settle_update(updated, &forwarded)),
            Err(error) => {
                self.cache.write(&existing).await?;
                Err(error)
            }
        }
    }

    /// Change the campaign configuration, creating it if none is stored
    pub async fn update_config(&self, patch: &ConfigPatch) -> Result<Applied<CampaignConfig>> {
        if patch.is_empty() {
            return Err(Error::InvalidInput("config update changes nothing".into()));
        }

        let current = self
            .cache
            .read(|state| state.stored_config().cloned())
            .await;
        let Some(current) = current else {
            let config = CampaignConfig::default().patched(patch)?;
            self.cache.write(&config).await?;
            let payload = serde_json::to_value(&config)?;
            return match self
                .forward(Collection::Config, SyncAction::Add, payload, false)
                .await
            {
                Ok(forwarded) => self.settle_add(&config, forwarded).await,
                Err(error) => {
                    self.cache.delete::<CampaignConfig>(&config.id).await?;
                    Err(error)
                }
            };
        };

        let updated = current.patched(patch)?;
        self.cache.write(&updated).await?;
        let payload = updated.update_payload()?;
        match self
            .forward(
                Collection::Config,
                SyncAction::Update,
                payload,
                current.id.is_temporary(),
            )
            .await
        {
            Ok(forwarded) => Ok(settle_update(updated, &forwarded)),
            Err(error) => {
                self.cache.write(&current).await?;
                Err(error)
            }
        }
    }

    /// Send to the remote, or queue when offline or `deferred`
    async fn forward(
        &self,
        collection: Collection,
        action: SyncAction,
        payload: Value,
        deferred: bool,
    ) -> Result<Forwarded> {
        if deferred || !self.network.is_online() {
            self.queue.enqueue(collection, action, payload).await?;
            return Ok(Forwarded::Queued);
        }

        let row = dispatch(self.remote.as_ref(), collection, action, &payload)
            .await
            .inspect_err(|error| {
                tracing::warn!("Remote {action} on {collection} failed, rolling back: {error}");
            })?;
        Ok(Forwarded::Remote(row))
    }

    async fn settle_add<T: SyncedRecord>(
        &self,
        optimistic: &T,
        forwarded: Forwarded,
    ) -> Result<Applied<T>> {
        match forwarded {
            Forwarded::Queued => Ok(Applied::queued(optimistic.clone())),
            Forwarded::Remote(row) => {
                let confirmed = decode_confirmed::<T>(row)?;
                self.cache.swap(optimistic.id(), &confirmed).await?;
                Ok(Applied::confirmed(confirmed))
            }
        }
    }
}

fn settle_update<T>(value: T, forwarded: &Forwarded) -> Applied<T> {
    match forwarded {
        Forwarded::Queued => Applied::queued(value),
        Forwarded::Remote(_) => Applied::confirmed(value),
    }
}

pub(super) fn decode_confirmed<T: SyncedRecord>(row: Option<Value>) -> Result<T> {
    let row = row.ok_or_else(|| {
        RemoteError::Decode(format!("insert into {} returned no row", T::COLLECTION))
    })?;
    serde_json::from_value(row).map_err(|error| {
        Error::RemoteRejected(RemoteError::Decode(format!(
            "confirmed {} row: {error}",
            T::COLLECTION
        )))
    })
}
