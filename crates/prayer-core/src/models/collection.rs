//! Named collections shared by the local store and the remote system

use serde::{Deserialize, Serialize};
use std::fmt;

/// A synchronized data collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Members,
    Attendance,
    Config,
}

impl Collection {
    /// Every synchronized collection, in reconciliation order
    pub const ALL: [Self; 3] = [Self::Members, Self::Attendance, Self::Config];

    /// Table name in the local store
    pub const fn local_table(self) -> &'static str {
        match self {
            Self::Members => "members",
            Self::Attendance => "attendance",
            Self::Config => "config",
        }
    }

    /// Table name on the remote system of record
    pub const fn remote_table(self) -> &'static str {
        match self {
            Self::Members => "members",
            Self::Attendance => "attendance",
            Self::Config => "campaign_config",
        }
    }

    /// Ordering used when fetching the full authoritative set
    pub const fn default_order(self) -> Option<OrderBy> {
        match self {
            Self::Members => Some(OrderBy::ascending("created_at")),
            Self::Attendance => Some(OrderBy::descending("date")),
            Self::Config => None,
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.local_table())
    }
}

/// Sort order for a remote read-all
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    pub column: &'static str,
    pub ascending: bool,
}

impl OrderBy {
    pub const fn ascending(column: &'static str) -> Self {
        Self {
            column,
            ascending: true,
        }
    }

    pub const fn descending(column: &'static str) -> Self {
        Self {
            column,
            ascending: false,
        }
    }
}
