//! Async, key-indexed store shared by every engine component.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use libsql::params::Params;
use libsql::{Connection, Value};
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};

use crate::error::{Error, Result};
use crate::models::{AttendanceRecord, RecordId};

use super::connection::Database;
use super::record::StoredRecord;

#[derive(Debug, Clone)]
enum Location {
    Path(PathBuf),
    Memory,
}

/// Durable table set surviving process restarts.
///
/// Every operation is atomic on its own. Operations issued before
/// [`LocalStore::init`] completes fail with [`Error::StoreUnavailable`].
#[derive(Clone)]
pub struct LocalStore {
    db: Arc<Mutex<Option<Database>>>,
    location: Location,
}

impl LocalStore {
    /// Create a store backed by a file; call [`LocalStore::init`] before use
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            db: Arc::new(Mutex::new(None)),
            location: Location::Path(path.into()),
        }
    }

    /// Create an in-memory store (primarily for tests)
    pub fn in_memory() -> Self {
        Self {
            db: Arc::new(Mutex::new(None)),
            location: Location::Memory,
        }
    }

    /// Open a file-backed store and wait for it to become ready
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let store = Self::new(path);
        store.init().await?;
        Ok(store)
    }

    /// Open an in-memory store and wait for it to become ready
    pub async fn open_in_memory() -> Result<Self> {
        let store = Self::in_memory();
        store.init().await?;
        Ok(store)
    }

    /// Create the schema. Idempotent; later calls return immediately.
    pub async fn init(&self) -> Result<()> {
        let mut slot = self.db.lock().await;
        if slot.is_some() {
            return Ok(());
        }

        let database = match &self.location {
            Location::Path(path) => {
                if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent)?;
                    }
                }
                tracing::debug!("Opening local store at {}", path.display());
                Database::open(path).await?
            }
            Location::Memory => Database::open_in_memory().await?,
        };
        *slot = Some(database);
        tracing::info!("Local store ready");
        Ok(())
    }

    /// Whether [`LocalStore::init`] has completed
    pub async fn is_ready(&self) -> bool {
        self.db.lock().await.is_some()
    }

    async fn ready(&self) -> Result<MappedMutexGuard<'_, Database>> {
        MutexGuard::try_map(self.db.lock().await, Option::as_mut)
            .map_err(|_| Error::StoreUnavailable)
    }

    /// All records of a collection, in insertion order
    pub async fn get_all<T: StoredRecord>(&self) -> Result<Vec<T>> {
        let db = self.ready().await?;
        let sql = format!("SELECT body FROM {} ORDER BY rowid", T::TABLE);
        query_bodies(db.connection(), &sql, Params::None).await
    }

    /// A single record by primary key
    pub async fn get<T: StoredRecord>(&self, key: &str) -> Result<Option<T>> {
        let db = self.ready().await?;
        let sql = format!("SELECT body FROM {} WHERE id = ?1", T::TABLE);
        let mut records =
            query_bodies(db.connection(), &sql, positional([text(key)])).await?;
        Ok(records.pop())
    }

    /// Upsert by primary key.
    ///
    /// A row of the same table holding one of this record's unique index
    /// values under another id is replaced as well.
    pub async fn put<T: StoredRecord>(&self, record: &T) -> Result<()> {
        let db = self.ready().await?;
        put_record(db.connection(), record).await
    }

    /// Upsert a batch; each record is written atomically, the batch is not
    pub async fn put_many<T: StoredRecord>(&self, records: &[T]) -> Result<()> {
        let db = self.ready().await?;
        for record in records {
            put_record(db.connection(), record).await?;
        }
        Ok(())
    }

    /// Replace the record stored under `old_key` with `record`, in one transaction
    pub async fn replace<T: StoredRecord>(&self, old_key: &str, record: &T) -> Result<()> {
        let db = self.ready().await?;
        let conn = db.connection();
        conn.execute("BEGIN TRANSACTION", ()).await?;
        let result = async {
            let sql = format!("DELETE FROM {} WHERE id = ?1", T::TABLE);
            conn.execute(&sql, positional([text(old_key)])).await?;
            put_record(conn, record).await
        }
        .await;

        match result {
            Ok(()) => {
                conn.execute("COMMIT", ()).await?;
                Ok(())
            }
            Err(error) => {
                let _ = conn.execute("ROLLBACK", ()).await;
                Err(error)
            }
        }
    }

    /// Delete by primary key; deleting a missing key is not an error
    pub async fn remove<T: StoredRecord>(&self, key: &str) -> Result<()> {
        let db = self.ready().await?;
        let sql = format!("DELETE FROM {} WHERE id = ?1", T::TABLE);
        db.connection()
            .execute(&sql, positional([text(key)]))
            .await?;
        Ok(())
    }

    /// Delete every record of a collection
    pub async fn clear<T: StoredRecord>(&self) -> Result<()> {
        let db = self.ready().await?;
        let sql = format!("DELETE FROM {}", T::TABLE);
        db.connection().execute(&sql, ()).await?;
        Ok(())
    }

    /// Primary keys currently cached for a collection
    pub async fn keys<T: StoredRecord>(&self) -> Result<Vec<String>> {
        let db = self.ready().await?;
        let sql = format!("SELECT id FROM {} ORDER BY rowid", T::TABLE);
        let mut rows = db.connection().query(&sql, ()).await?;
        let mut keys = Vec::new();
        while let Some(row) = rows.next().await? {
            keys.push(row.get::<String>(0)?);
        }
        Ok(keys)
    }

    /// Number of records in a collection
    pub async fn count<T: StoredRecord>(&self) -> Result<usize> {
        let db = self.ready().await?;
        let sql = format!("SELECT COUNT(*) FROM {}", T::TABLE);
        let mut rows = db.connection().query(&sql, ()).await?;
        let count = match rows.next().await? {
            Some(row) => row.get::<i64>(0)?,
            None => 0,
        };
        usize::try_from(count).map_err(|error| Error::Database(error.to_string()))
    }

    /// Attendance of one member on one day, via the `(member_id, date)` index
    pub async fn find_attendance(
        &self,
        member_id: &RecordId,
        date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>> {
        let db = self.ready().await?;
        let mut records = query_bodies(
            db.connection(),
            "SELECT body FROM attendance WHERE member_id = ?1 AND date = ?2",
            positional([text(member_id.as_str()), text(&date.to_string())]),
        )
        .await?;
        Ok(records.pop())
    }

    /// Attendance of every member between two days (inclusive), via the `date` index
    pub async fn attendance_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>> {
        let db = self.ready().await?;
        query_bodies(
            db.connection(),
            "SELECT body FROM attendance WHERE date BETWEEN ?1 AND ?2 ORDER BY date, rowid",
            positional([text(&from.to_string()), text(&to.to_string())]),
        )
        .await
    }
}

fn text(value: &str) -> Value {
    Value::Text(value.to_string())
}

fn positional<const N: usize>(values: [Value; N]) -> Params {
    Params::Positional(values.into())
}

async fn put_record<T: StoredRecord>(conn: &Connection, record: &T) -> Result<()> {
    let mut columns = vec!["id", "body"];
    columns.extend_from_slice(T::INDEX_COLUMNS);
    let placeholders = (1..=columns.len())
        .map(|index| format!("?{index}"))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "INSERT OR REPLACE INTO {} ({}) VALUES ({placeholders})",
        T::TABLE,
        columns.join(", ")
    );

    let mut values = vec![text(record.key()), Value::Text(serde_json::to_string(record)?)];
    values.extend(record.index_values());
    if values.len() != columns.len() {
        return Err(Error::Database(format!(
            "{} expects {} index values, got {}",
            T::TABLE,
            T::INDEX_COLUMNS.len(),
            values.len() - 2
        )));
    }

    conn.execute(&sql, Params::Positional(values)).await?;
    Ok(())
}

async fn query_bodies<T: StoredRecord>(
    conn: &Connection,
    sql: &str,
    params: Params,
) -> Result<Vec<T>> {
    let mut rows = conn.query(sql, params).await?;
    let mut records = Vec::new();
    while let Some(row) = rows.next().await? {
        let body: String = row.get(0)?;
        records.push(serde_json::from_str(&body)?);
    }
    Ok(records)
}
