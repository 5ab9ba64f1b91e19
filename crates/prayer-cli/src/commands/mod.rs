pub mod attendance;
pub mod common;
pub mod config;
pub mod member;
pub mod queue;
pub mod sync;
pub mod toggle;
