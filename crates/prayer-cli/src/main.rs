//! Prayer CLI - track campaign attendance from the terminal
//!
//! Works against the same local store as the apps. Without a configured
//! remote, or with `--offline`, every change is queued for a later `sync`.

mod cli;
mod commands;
mod error;
#[cfg(test)]
mod tests;

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands, ConfigCommands, MemberCommands};
use crate::commands::attendance::run_attendance;
use crate::commands::common::open_session;
use crate::commands::config::{run_config_set, run_config_show};
use crate::commands::member::{run_member_add, run_member_list, run_member_phone, run_member_remove};
use crate::commands::queue::run_queue;
use crate::commands::sync::run_sync;
use crate::commands::toggle::run_toggle;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("prayer=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);
    let session = open_session(&db_path, cli.offline).await?;
    if !matches!(cli.command, Commands::Queue { .. } | Commands::Sync) {
        session.catch_up().await;
    }

    match cli.command {
        Commands::Member(MemberCommands::Add { name, phone }) => {
            run_member_add(&session, &name, phone).await
        }
        Commands::Member(MemberCommands::List { json }) => run_member_list(&session, json).await,
        Commands::Member(MemberCommands::Remove { member }) => {
            run_member_remove(&session, &member).await
        }
        Commands::Member(MemberCommands::Phone { member, phone }) => {
            run_member_phone(&session, &member, phone).await
        }
        Commands::Toggle { member, date, slot } => {
            run_toggle(&session, &member, date, slot.into()).await
        }
        Commands::Attendance { from, to, json } => {
            run_attendance(&session, from, to, json).await
        }
        Commands::Config(ConfigCommands::Show { json }) => run_config_show(&session, json).await,
        Commands::Config(ConfigCommands::Set { start, end, target }) => {
            run_config_set(&session, start, end, target).await
        }
        Commands::Queue { json } => run_queue(&session, json).await,
        Commands::Sync => run_sync(&session).await,
    }
}

fn resolve_db_path(explicit: Option<PathBuf>) -> PathBuf {
    explicit.unwrap_or_else(default_db_path)
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("prayer-tracker")
        .join("prayer.db")
}
