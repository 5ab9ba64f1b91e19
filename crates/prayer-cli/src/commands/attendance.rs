use chrono::NaiveDate;

use crate::commands::common::{format_attendance_lines, Session};
use crate::error::CliError;

pub async fn run_attendance(
    session: &Session,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    as_json: bool,
) -> Result<(), CliError> {
    let records = match (from, to) {
        (None, None) => session.service.list_attendance().await,
        (from, to) => {
            let from = from.unwrap_or_else(earliest_day);
            let to = to.unwrap_or_else(latest_day);
            if from > to {
                return Err(CliError::InvertedRange {
                    from: from.to_string(),
                    to: to.to_string(),
                });
            }
            session.service.attendance_between(from, to).await?
        }
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No attendance recorded.");
    }
    let members = session.service.list_members().await;
    for line in format_attendance_lines(&records, &members) {
        println!("{line}");
    }
    Ok(())
}

// Stored dates compare as `YYYY-MM-DD` text, so the open bounds stay four-digit years.
fn earliest_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(1, 1, 1).unwrap_or(NaiveDate::MIN)
}

fn latest_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(9999, 12, 31).unwrap_or(NaiveDate::MAX)
}
