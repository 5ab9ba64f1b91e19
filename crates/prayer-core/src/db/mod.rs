//! Local persistent store for Prayer Tracker

mod connection;
mod migrations;
mod record;
mod store;

pub use connection::Database;
pub use record::StoredRecord;
pub use store::LocalStore;
