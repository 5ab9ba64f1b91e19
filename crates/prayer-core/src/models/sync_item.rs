//! Pending mutation model for the offline queue

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

use crate::util::monotonic_millis;

use super::collection::Collection;

/// Prefix of locally generated queue item ids
pub const SYNC_ITEM_PREFIX: &str = "sync_";

/// Payload fields holding record ids; everything else is user data
const REFERENCE_FIELDS: [&str; 2] = ["id", "member_id"];

/// Kind of mutation a queue item replays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncAction {
    Add,
    Update,
    Delete,
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Add => "add",
            Self::Update => "update",
            Self::Delete => "delete",
        })
    }
}

/// A mutation that has not been confirmed by the remote system yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncQueueItem {
    pub id: String,
    pub collection: Collection,
    pub action: SyncAction,
    /// Canonical payload for `collection`/`action`
    pub payload: Value,
    /// Enqueue time (Unix ms); FIFO ordering key only
    pub timestamp: i64,
}

impl SyncQueueItem {
    #[must_use]
    pub fn new(collection: Collection, action: SyncAction, payload: Value) -> Self {
        Self {
            id: format!("{SYNC_ITEM_PREFIX}{}", Uuid::now_v7().simple()),
            collection,
            action,
            payload,
            timestamp: monotonic_millis(),
        }
    }

    /// Id of the record this item targets, when the payload carries one
    pub fn target_id(&self) -> Option<&str> {
        self.payload.get("id").and_then(Value::as_str)
    }

    /// Point the payload's id and foreign references from `from` to `to`.
    /// Returns whether anything changed.
    pub fn retarget(&mut self, from: &str, to: &str) -> bool {
        let Some(fields) = self.payload.as_object_mut() else {
            return false;
        };
        let mut changed = false;
        for key in REFERENCE_FIELDS {
            if let Some(value) = fields.get_mut(key) {
                if value.as_str() == Some(from) {
                    *value = Value::String(to.to_string());
                    changed = true;
                }
            }
        }
        changed
    }

    /// Record ids the payload points at, keyed by field
    pub(crate) fn references(&self) -> impl Iterator<Item = (&'static str, &str)> {
        REFERENCE_FIELDS.into_iter().filter_map(move |key| {
            self.payload
                .get(key)
                .and_then(Value::as_str)
                .map(|value| (key, value))
        })
    }

    /// Ids and foreign references in the payload
    pub(crate) fn referenced_ids(&self) -> impl Iterator<Item = &str> {
        self.references().map(|(_, value)| value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_items_are_ordered_by_timestamp() {
        let first = SyncQueueItem::new(Collection::Members, SyncAction::Add, json!({}));
        let second = SyncQueueItem::new(Collection::Members, SyncAction::Add, json!({}));
        assert!(first.timestamp < second.timestamp);
        assert!(first.id.starts_with(SYNC_ITEM_PREFIX));
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn retarget_rewrites_ids_and_references() {
        let mut item = SyncQueueItem::new(
            Collection::Attendance,
            SyncAction::Add,
            json!({ "id": "local_a", "member_id": "local_m", "fajr": true }),
        );
        assert!(item.retarget("local_m", "remote-m"));
        assert_eq!(item.payload["member_id"], "remote-m");
        assert_eq!(item.target_id(), Some("local_a"));
        assert!(!item.retarget("missing", "x"));
    }

    #[test]
    fn user_text_is_never_treated_as_a_reference() {
        let mut item = SyncQueueItem::new(
            Collection::Members,
            SyncAction::Update,
            json!({ "id": "remote-m", "name": "local_karim", "phone": "local_karim" }),
        );
        assert!(!item.retarget("local_karim", "remote-x"));
        assert_eq!(item.payload["name"], "local_karim");
        assert_eq!(item.referenced_ids().collect::<Vec<_>>(), vec!["remote-m"]);
    }

    #[test]
    fn action_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&SyncAction::Delete).unwrap(), "\"delete\"");
    }
}
