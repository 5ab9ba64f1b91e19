//! prayer-core - offline-first cache and sync engine for Prayer Tracker
//!
//! This crate contains the models, the local store, and the components that
//! keep the local cache and the remote system of record in step: the
//! reachability monitor, the sync queue, the mutation replicator, the remote
//! reconciler and the queue drainer.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod network;
pub mod remote;
pub mod services;
pub mod state;
pub mod sync;
pub mod util;

pub use config::{RemoteConfig, RemoteEndpoint};
pub use db::LocalStore;
pub use error::{Error, Result};
pub use models::{
    AttendanceRecord, CampaignConfig, Collection, ConfigPatch, Member, MemberPatch, PrayerSlot,
    RecordId,
};
pub use network::{Connectivity, NetworkMonitor, NetworkStatus};
pub use remote::{MemoryRemote, PostgrestRemote, RemoteError, RemoteStore};
pub use services::{CampaignService, SyncTasks};
pub use sync::{Applied, Delivery, DrainReport, SyncNotice};
