//! Consumer-facing services

mod campaign;

pub use campaign::{CampaignService, SyncTasks};
