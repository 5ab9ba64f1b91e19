//! In-process remote backend.
//!
//! Behaves like the hosted database for the engine's purposes: assigns ids,
//! enforces the one-attendance-row-per-member-and-day constraint, cascades
//! member deletes, and broadcasts a change after every write. Outages and
//! rejections can be injected for tests and demos.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::{Collection, OrderBy};

use super::{RemoteChange, RemoteError, RemoteResult, RemoteStore};

const CHANNEL_CAPACITY: usize = 64;

type Tables = HashMap<Collection, Vec<Map<String, Value>>>;

/// Shared in-memory remote; clones see the same data
#[derive(Clone)]
pub struct MemoryRemote {
    inner: Arc<Inner>,
}

struct Inner {
    tables: Mutex<Tables>,
    reachable: AtomicBool,
    rejections: AtomicUsize,
    writes: AtomicUsize,
    channels: HashMap<Collection, broadcast::Sender<RemoteChange>>,
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRemote {
    pub fn new() -> Self {
        let channels = Collection::ALL
            .into_iter()
            .map(|collection| (collection, broadcast::channel(CHANNEL_CAPACITY).0))
            .collect();
        Self {
            inner: Arc::new(Inner {
                tables: Mutex::new(HashMap::new()),
                reachable: AtomicBool::new(true),
                rejections: AtomicUsize::new(0),
                writes: AtomicUsize::new(0),
                channels,
            }),
        }
    }

    /// Simulate an outage: every call fails with [`RemoteError::Unreachable`]
    pub fn set_reachable(&self, reachable: bool) {
        self.inner.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Reject the next `count` writes with [`RemoteError::Rejected`]
    pub fn reject_next_writes(&self, count: usize) {
        self.inner.rejections.store(count, Ordering::SeqCst);
    }

    /// Number of writes applied so far
    pub fn write_count(&self) -> usize {
        self.inner.writes.load(Ordering::SeqCst)
    }

    /// Insert rows as-is, without notifying subscribers
    pub fn seed(&self, collection: Collection, rows: impl IntoIterator<Item = Value>) {
        let mut tables = self.tables();
        let table = tables.entry(collection).or_default();
        table.extend(rows.into_iter().filter_map(|row| match row {
            Value::Object(fields) => Some(fields),
            _ => None,
        }));
    }

    /// Current rows of a collection, in insertion order
    pub fn rows(&self, collection: Collection) -> Vec<Value> {
        self.tables()
            .get(&collection)
            .map(|rows| rows.iter().cloned().map(Value::Object).collect())
            .unwrap_or_default()
    }

    /// Announce a change made by some other client
    pub fn notify_changed(&self, collection: Collection) {
        if let Some(channel) = self.inner.channels.get(&collection) {
            // No subscribers is fine.
            let _ = channel.send(RemoteChange { collection });
        }
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.inner
            .tables
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn check_reachable(&self) -> RemoteResult<()> {
        if self.inner.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RemoteError::Unreachable("memory remote is offline".into()))
        }
    }

    fn check_write(&self) -> RemoteResult<()> {
        self.check_reachable()?;
        let rejected = self
            .inner
            .rejections
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if rejected {
            return Err(RemoteError::Rejected {
                status: Some(403),
                message: "write rejected by policy".into(),
            });
        }
        Ok(())
    }

    fn committed(&self, collection: Collection) {
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        self.notify_changed(collection);
    }
}

fn into_object(payload: Value) -> RemoteResult<Map<String, Value>> {
    match payload {
        Value::Object(fields) => Ok(fields),
        other => Err(RemoteError::rejected(format!(
            "expected a JSON object, got {other}"
        ))),
    }
}

fn same_member_day(row: &Map<String, Value>, other: &Map<String, Value>) -> bool {
    row.get("member_id") == other.get("member_id") && row.get("date") == other.get("date")
}

fn has_id(row: &Map<String, Value>, id: &str) -> bool {
    row.get("id").and_then(Value::as_str) == Some(id)
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn select_all(
        &self,
        collection: Collection,
        order_by: Option<OrderBy>,
    ) -> RemoteResult<Vec<Value>> {
        self.check_reachable()?;
        let mut rows = self.rows(collection);
        if let Some(order) = order_by {
            rows.sort_by(|a, b| {
                let a = a.get(order.column).map(ToString::to_string);
                let b = b.get(order.column).map(ToString::to_string);
                if order.ascending {
                    a.cmp(&b)
                } else {
                    b.cmp(&a)
                }
            });
        }
        Ok(rows)
    }

    async fn insert(&self, collection: Collection, payload: Value) -> RemoteResult<Value> {
        self.check_write()?;
        let mut row = into_object(payload)?;
        row.insert("id".into(), Value::String(Uuid::new_v4().to_string()));
        if collection == Collection::Members && !row.contains_key("created_at") {
            row.insert(
                "created_at".into(),
                Value::String(chrono::Utc::now().to_rfc3339()),
            );
        }

        {
            let mut tables = self.tables();
            let table = tables.entry(collection).or_default();
            if collection == Collection::Attendance
                && table.iter().any(|existing| same_member_day(existing, &row))
            {
                return Err(RemoteError::Rejected {
                    status: Some(409),
                    message: "duplicate key value violates unique constraint \"attendance_member_id_date_key\"".into(),
                });
            }
            table.push(row.clone());
        }

        self.committed(collection);
        Ok(Value::Object(row))
    }

    async fn update(&self, collection: Collection, id: &str, patch: Value) -> RemoteResult<()> {
        self.check_write()?;
        let patch = into_object(patch)?;
        {
            let mut tables = self.tables();
            // Zero matching rows is a successful no-op, as with a filtered UPDATE.
            if let Some(row) = tables
                .get_mut(&collection)
                .and_then(|rows| rows.iter_mut().find(|row| has_id(row, id)))
            {
                for (key, value) in patch {
                    if key != "id" {
                        row.insert(key, value);
                    }
                }
            }
        }
        self.committed(collection);
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: &str) -> RemoteResult<()> {
        self.check_write()?;
        let cascaded = {
            let mut tables = self.tables();
            if let Some(rows) = tables.get_mut(&collection) {
                rows.retain(|row| !has_id(row, id));
            }
            if collection == Collection::Members {
                let attendance = tables.entry(Collection::Attendance).or_default();
                let before = attendance.len();
                attendance.retain(|row| row.get("member_id").and_then(Value::as_str) != Some(id));
                before != attendance.len()
            } else {
                false
            }
        };
        self.committed(collection);
        if cascaded {
            self.notify_changed(Collection::Attendance);
        }
        Ok(())
    }

    fn subscribe(&self, collection: Collection) -> broadcast::Receiver<RemoteChange> {
        self.inner.channels.get(&collection).map_or_else(
            || broadcast::channel(1).1,
            broadcast::Sender::subscribe,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn insert_assigns_id_and_notifies() {
        let remote = MemoryRemote::new();
        let mut changes = remote.subscribe(Collection::Members);

        let row = remote
            .insert(Collection::Members, json!({ "name": "Karim" }))
            .await
            .unwrap();
        assert!(row["id"].as_str().is_some_and(|id| !id.is_empty()));
        assert!(row["created_at"].is_string());
        assert_eq!(
            changes.recv().await.unwrap().collection,
            Collection::Members
        );
    }

    #[tokio::test]
    async fn attendance_insert_enforces_member_day_uniqueness() {
        let remote = MemoryRemote::new();
        let row = json!({ "member_id": "m1", "date": "2026-02-10", "fajr": true });
        remote.insert(Collection::Attendance, row.clone()).await.unwrap();

        let duplicate = remote.insert(Collection::Attendance, row).await;
        assert!(matches!(duplicate, Err(RemoteError::Rejected { status: Some(409), .. })));
    }

    #[tokio::test]
    async fn update_merges_and_missing_rows_are_noops() {
        let remote = MemoryRemote::new();
        let row = remote
            .insert(
                Collection::Attendance,
                json!({ "member_id": "m1", "date": "2026-02-10", "fajr": true, "isha": false }),
            )
            .await
            .unwrap();
        let id = row["id"].as_str().unwrap();

        remote
            .update(Collection::Attendance, id, json!({ "id": id, "isha": true }))
            .await
            .unwrap();
        remote
            .update(Collection::Attendance, "missing", json!({ "isha": true }))
            .await
            .unwrap();

        let rows = remote.rows(Collection::Attendance);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["isha"], true);
        assert_eq!(rows[0]["fajr"], true);
    }

    #[tokio::test]
    async fn member_delete_cascades_attendance() {
        let remote = MemoryRemote::new();
        let member = remote
            .insert(Collection::Members, json!({ "name": "Karim" }))
            .await
            .unwrap();
        let member_id = member["id"].as_str().unwrap();
        remote
            .insert(
                Collection::Attendance,
                json!({ "member_id": member_id, "date": "2026-02-10", "fajr": true }),
            )
            .await
            .unwrap();

        remote.delete(Collection::Members, member_id).await.unwrap();
        assert!(remote.rows(Collection::Members).is_empty());
        assert!(remote.rows(Collection::Attendance).is_empty());
    }

    #[tokio::test]
    async fn outages_and_rejections_are_injectable() {
        let remote = MemoryRemote::new();
        remote.set_reachable(false);
        assert!(matches!(
            remote.select_all(Collection::Members, None).await,
            Err(RemoteError::Unreachable(_))
        ));

        remote.set_reachable(true);
        remote.reject_next_writes(1);
        assert!(remote.insert(Collection::Members, json!({ "name": "A" })).await.is_err());
        assert!(remote.insert(Collection::Members, json!({ "name": "A" })).await.is_ok());
        assert_eq!(remote.write_count(), 1);
    }

    #[tokio::test]
    async fn select_all_honours_order() {
        let remote = MemoryRemote::new();
        remote.seed(
            Collection::Attendance,
            [
                json!({ "id": "a", "date": "2026-02-09" }),
                json!({ "id": "b", "date": "2026-02-11" }),
                json!({ "id": "c", "date": "2026-02-10" }),
            ],
        );
        let rows = remote
            .select_all(Collection::Attendance, Collection::Attendance.default_order())
            .await
            .unwrap();
        let ids: Vec<_> = rows.iter().map(|row| row["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }
}
