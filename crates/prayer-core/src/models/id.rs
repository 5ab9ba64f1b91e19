//! Record identifiers shared by every collection

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::Error;

/// Prefix marking an id synthesized on this device and not yet confirmed remotely.
pub const LOCAL_ID_PREFIX: &str = "local_";

/// Opaque record identifier.
///
/// Remote-assigned ids are stored verbatim. Ids created while a record is
/// still optimistic start with [`LOCAL_ID_PREFIX`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Create a new temporary id using UUID v7 (time-sortable)
    #[must_use]
    pub fn temporary() -> Self {
        Self(format!("{LOCAL_ID_PREFIX}{}", Uuid::now_v7().simple()))
    }

    /// Whether this id was synthesized locally and has not been confirmed
    #[must_use]
    pub fn is_temporary(&self) -> bool {
        self.0.starts_with(LOCAL_ID_PREFIX)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl FromStr for RecordId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput("record id cannot be empty".into()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl AsRef<str> for RecordId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
