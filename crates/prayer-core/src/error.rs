//! Error types for prayer-core

use thiserror::Error;

use crate::models::Collection;
use crate::remote::RemoteError;

/// Result type alias using prayer-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in prayer-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// The local store has not finished initializing
    #[error("Local store is not ready yet")]
    StoreUnavailable,

    /// A remote call failed while online; the optimistic write was rolled back
    #[error("Remote rejected the change: {0}")]
    RemoteRejected(#[from] RemoteError),

    /// A queued mutation could not be replayed (it stays queued)
    #[error("Replay of queued change {item_id} failed: {reason}")]
    QueueReplayFailed { item_id: String, reason: String },

    /// Fetching the authoritative set failed; cached state was kept
    #[error("Reconciliation of {collection} failed: {reason}")]
    ReconciliationFailed {
        collection: Collection,
        reason: String,
    },

    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Remote settings are missing or malformed
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
