use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] prayer_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No member name provided")]
    EmptyName,
    #[error("Member identifier cannot be empty")]
    EmptyMemberId,
    #[error("No member matches: {0}")]
    MemberNotFound(String),
    #[error("{0}")]
    AmbiguousMember(String),
    #[error("Nothing to change; pass --start, --end or --target")]
    EmptyConfigPatch,
    #[error("Attendance range is inverted: {from} is after {to}")]
    InvertedRange { from: String, to: String },
    #[error(
        "Sync needs a remote. Set SUPABASE_URL and SUPABASE_ANON_KEY (a .env file works too) and drop --offline."
    )]
    SyncUnavailable,
}
