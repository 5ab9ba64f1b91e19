//! Mapping between typed records and store tables

use libsql::Value;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::models::{AttendanceRecord, CampaignConfig, Member, SyncQueueItem};

/// A record persisted as a JSON body keyed by its primary id.
///
/// `INDEX_COLUMNS` are stored next to the body so the store can enforce
/// uniqueness and serve range scans; `index_values` must return one value per
/// column, in the same order.
pub trait StoredRecord: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Table holding this record type
    const TABLE: &'static str;
    /// Extra indexed columns
    const INDEX_COLUMNS: &'static [&'static str] = &[];

    /// Primary key
    fn key(&self) -> &str;

    fn index_values(&self) -> Vec<Value> {
        Vec::new()
    }
}

impl StoredRecord for Member {
    const TABLE: &'static str = "members";

    fn key(&self) -> &str {
        self.id.as_str()
    }
}

impl StoredRecord for AttendanceRecord {
    const TABLE: &'static str = "attendance";
    const INDEX_COLUMNS: &'static [&'static str] = &["member_id", "date"];

    fn key(&self) -> &str {
        self.id.as_str()
    }

    fn index_values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.member_id.to_string()),
            Value::Text(self.date.to_string()),
        ]
    }
}

impl StoredRecord for CampaignConfig {
    const TABLE: &'static str = "config";

    fn key(&self) -> &str {
        self.id.as_str()
    }
}

impl StoredRecord for SyncQueueItem {
    const TABLE: &'static str = "sync_queue";
    const INDEX_COLUMNS: &'static [&'static str] = &["timestamp"];

    fn key(&self) -> &str {
        &self.id
    }

    fn index_values(&self) -> Vec<Value> {
        vec![Value::Integer(self.timestamp)]
    }
}
