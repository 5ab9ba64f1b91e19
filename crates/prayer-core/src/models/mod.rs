//! Data models for Prayer Tracker

mod attendance;
mod campaign;
mod collection;
mod id;
mod member;
mod sync_item;

pub use attendance::{AttendanceRecord, PrayerFlags, PrayerSlot};
pub use campaign::{CampaignConfig, ConfigPatch};
pub use collection::{Collection, OrderBy};
pub use id::{RecordId, LOCAL_ID_PREFIX};
pub use member::{Member, MemberPatch};
pub use sync_item::{SyncAction, SyncQueueItem, SYNC_ITEM_PREFIX};
