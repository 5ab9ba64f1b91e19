//! Mutation replication, queue replay and reconciliation.

mod drainer;
mod queue;
mod reconciler;
mod replicator;

use std::fmt;

use serde_json::Value;

use crate::models::{Collection, SyncAction};
use crate::remote::{RemoteError, RemoteResult, RemoteStore};

pub use drainer::{DrainReport, QueueDrainer};
pub use queue::SyncQueue;
pub use reconciler::RemoteReconciler;
pub use replicator::MutationReplicator;

/// How a successful mutation reached the remote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Applied remotely; the value is the confirmed record
    Confirmed,
    /// Saved locally and queued for replay
    Queued,
}

/// Result of a successful mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied<T> {
    pub value: T,
    pub delivery: Delivery,
}

impl<T> Applied<T> {
    pub const fn confirmed(value: T) -> Self {
        Self {
            value,
            delivery: Delivery::Confirmed,
        }
    }

    pub const fn queued(value: T) -> Self {
        Self {
            value,
            delivery: Delivery::Queued,
        }
    }

    pub fn is_queued(&self) -> bool {
        self.delivery == Delivery::Queued
    }
}

/// User-facing sync notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncNotice {
    Synced(usize),
    Failed(usize),
    SavedOffline,
}

impl fmt::Display for SyncNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Synced(count) => write!(f, "{count} changes synced"),
            Self::Failed(count) => write!(f, "{count} changes failed to sync"),
            Self::SavedOffline => f.write_str("Saved offline"),
        }
    }
}

/// Send one canonical payload to the remote.
///
/// `add` strips the optimistic id and returns the stored row; `update` and
/// `delete` address the record by the payload's `id`. An `add` of the
/// campaign config updates the remote's existing row when it has one.
pub(crate) async fn dispatch(
    remote: &dyn RemoteStore,
    collection: Collection,
    action: SyncAction,
    payload: &Value,
) -> RemoteResult<Option<Value>> {
    let mut body = payload.clone();
    let fields = body
        .as_object_mut()
        .ok_or_else(|| RemoteError::rejected(format!("{action} payload is not an object")))?;
    let id = fields.remove("id").and_then(|id| id.as_str().map(str::to_string));

    match action {
        SyncAction::Add if collection == Collection::Config => {
            add_singleton(remote, collection, body).await
        }
        SyncAction::Add => remote.insert(collection, body).await.map(Some),
        SyncAction::Update => {
            let id = id.ok_or_else(|| RemoteError::rejected("update payload has no id"))?;
            remote.update(collection, &id, body).await.map(|()| None)
        }
        SyncAction::Delete => {
            let id = id.ok_or_else(|| RemoteError::rejected("delete payload has no id"))?;
            remote.delete(collection, &id).await.map(|()| None)
        }
    }
}

/// Insert into a single-row collection, or merge into the row already there
async fn add_singleton(
    remote: &dyn RemoteStore,
    collection: Collection,
    body: Value,
) -> RemoteResult<Option<Value>> {
    let existing = remote
        .select_all(collection, collection.default_order())
        .await?
        .into_iter()
        .find_map(|row| {
            let Value::Object(fields) = row else {
                return None;
            };
            let id = fields.get("id")?.as_str()?.to_string();
            Some((id, fields))
        });
    let Some((id, mut row)) = existing else {
        return remote.insert(collection, body).await.map(Some);
    };

    tracing::debug!("{collection} already exists remotely; updating {id} instead");
    remote.update(collection, &id, body.clone()).await?;
    if let Value::Object(fields) = body {
        row.extend(fields);
    }
    Ok(Some(Value::Object(row)))
}
