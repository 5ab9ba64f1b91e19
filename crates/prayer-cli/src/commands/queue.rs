use chrono::DateTime;
use prayer_core::models::SyncQueueItem;

use crate::commands::common::Session;
use crate::error::CliError;

pub fn format_queue_line(item: &SyncQueueItem) -> String {
    let queued_at = DateTime::from_timestamp_millis(item.timestamp)
        .map_or_else(|| item.timestamp.to_string(), |time| time.format("%Y-%m-%d %H:%M:%S").to_string());
    format!(
        "{queued_at}  {:<6} {:<10} {}",
        item.action.to_string(),
        item.collection.to_string(),
        item.target_id().unwrap_or("-")
    )
}

pub async fn run_queue(session: &Session, as_json: bool) -> Result<(), CliError> {
    let items = session.service.pending_items().await?;
    if as_json {
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if items.is_empty() {
        println!("No pending changes.");
        return Ok(());
    }
    for item in &items {
        println!("{}", format_queue_line(item));
    }
    println!("{} pending", items.len());
    Ok(())
}
