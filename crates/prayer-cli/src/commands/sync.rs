use crate::commands::common::Session;
use crate::error::CliError;

pub async fn run_sync(session: &Session) -> Result<(), CliError> {
    if !session.connected {
        return Err(CliError::SyncUnavailable);
    }

    let Some(report) = session.service.sync_now().await? else {
        println!("A sync is already running");
        return Ok(());
    };

    let notices = report.notices();
    if notices.is_empty() {
        println!("Nothing to sync; local data refreshed");
    }
    for notice in notices {
        println!("{notice}");
    }
    if let Some(error) = session.service.error().await {
        println!("Refresh failed: {error}");
    }
    Ok(())
}
