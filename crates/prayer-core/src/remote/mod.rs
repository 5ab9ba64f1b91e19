//! Remote system of record.
//!
//! The engine only needs read-all, insert, update, delete and change
//! notifications; any backend exposing that shape can implement
//! [`RemoteStore`].

mod memory;
mod postgrest;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::models::{Collection, OrderBy};

pub use memory::MemoryRemote;
pub use postgrest::PostgrestRemote;

/// Errors reported by a remote backend
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// The backend refused the operation (validation, authorization, constraint)
    #[error("{message}")]
    Rejected {
        status: Option<u16>,
        message: String,
    },
    /// The backend could not be reached
    #[error("remote unreachable: {0}")]
    Unreachable(String),
    /// The backend answered with something that could not be decoded
    #[error("unexpected remote response: {0}")]
    Decode(String),
}

impl RemoteError {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            status: None,
            message: message.into(),
        }
    }
}

pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Notification that a remote collection changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteChange {
    pub collection: Collection,
}

/// Operations the sync engine consumes from the remote system
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Every record of a collection
    async fn select_all(
        &self,
        collection: Collection,
        order_by: Option<OrderBy>,
    ) -> RemoteResult<Vec<Value>>;

    /// Insert a record; the remote assigns its id and returns the stored row
    async fn insert(&self, collection: Collection, payload: Value) -> RemoteResult<Value>;

    /// Apply a partial update to the record with `id`
    async fn update(&self, collection: Collection, id: &str, patch: Value) -> RemoteResult<()>;

    /// Delete the record with `id`
    async fn delete(&self, collection: Collection, id: &str) -> RemoteResult<()>;

    /// Change notifications for a collection; dropping the receiver unsubscribes
    fn subscribe(&self, collection: Collection) -> broadcast::Receiver<RemoteChange>;
}
