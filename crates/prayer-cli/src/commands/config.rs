use chrono::NaiveDate;
use prayer_core::{CampaignConfig, ConfigPatch};

use crate::commands::common::{delivery_suffix, Session};
use crate::error::CliError;

pub fn format_config_lines(config: &CampaignConfig) -> Vec<String> {
    let mut lines = vec![
        format!("start:         {}", config.start_date),
        format!("end:           {}", config.end_date),
        format!("days:          {}", config.duration_days()),
        format!("streak target: {}", config.streak_target),
    ];
    if config.id.is_temporary() {
        lines.push("(not yet saved remotely)".to_string());
    }
    lines
}

pub async fn run_config_show(session: &Session, as_json: bool) -> Result<(), CliError> {
    let config = session.service.get_config().await;
    if as_json {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }
    for line in format_config_lines(&config) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_config_set(
    session: &Session,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    streak_target: Option<u32>,
) -> Result<(), CliError> {
    let patch = ConfigPatch {
        start_date,
        end_date,
        streak_target,
    };
    if patch.is_empty() {
        return Err(CliError::EmptyConfigPatch);
    }

    let applied = session.service.update_config(&patch).await?;
    for line in format_config_lines(&applied.value) {
        println!("{line}");
    }
    let suffix = delivery_suffix(applied.delivery).trim();
    if !suffix.is_empty() {
        println!("{suffix}");
    }
    Ok(())
}
