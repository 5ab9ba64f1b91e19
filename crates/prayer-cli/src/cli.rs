use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use prayer_core::PrayerSlot;

#[derive(Parser)]
#[command(name = "prayer")]
#[command(about = "Track daily prayer attendance for a campaign, online or offline")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Work offline: queue every change instead of contacting the remote
    #[arg(long, global = true)]
    pub offline: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage campaign members
    #[command(subcommand)]
    Member(MemberCommands),
    /// Toggle one prayer for a member on a day
    Toggle {
        /// Member ID, ID prefix, or name
        member: String,
        /// Day in YYYY-MM-DD form
        date: NaiveDate,
        /// Prayer to toggle
        #[arg(value_enum)]
        slot: SlotArg,
    },
    /// Show attendance records
    Attendance {
        /// First day to include
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Last day to include
        #[arg(long)]
        to: Option<NaiveDate>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show or change the campaign configuration
    #[command(subcommand)]
    Config(ConfigCommands),
    /// List changes waiting to be synced
    Queue {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Replay queued changes and refresh from the remote
    Sync,
}

#[derive(Subcommand)]
pub enum MemberCommands {
    /// Add a member
    #[command(alias = "new")]
    Add {
        /// Member name
        name: Vec<String>,
        /// Optional phone number
        #[arg(long)]
        phone: Option<String>,
    },
    /// List members
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a member and their attendance
    #[command(alias = "rm")]
    Remove {
        /// Member ID, ID prefix, or name
        member: String,
    },
    /// Set or clear a member's phone number
    Phone {
        /// Member ID, ID prefix, or name
        member: String,
        /// New phone number; omit to clear
        phone: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change campaign dates or streak target
    Set {
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
        /// Days needed for a full streak
        #[arg(long)]
        target: Option<u32>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum SlotArg {
    Fajr,
    Zuhr,
    Asr,
    Maghrib,
    Isha,
}

impl From<SlotArg> for PrayerSlot {
    fn from(value: SlotArg) -> Self {
        match value {
            SlotArg::Fajr => Self::Fajr,
            SlotArg::Zuhr => Self::Zuhr,
            SlotArg::Asr => Self::Asr,
            SlotArg::Maghrib => Self::Maghrib,
            SlotArg::Isha => Self::Isha,
        }
    }
}
