use chrono::NaiveDate;
use prayer_core::PrayerSlot;

use crate::commands::common::{delivery_suffix, format_prayers, resolve_member, Session};
use crate::error::CliError;

pub async fn run_toggle(
    session: &Session,
    query: &str,
    date: NaiveDate,
    slot: PrayerSlot,
) -> Result<(), CliError> {
    let members = session.service.list_members().await;
    let member = resolve_member(&members, query)?;
    let applied = session
        .service
        .toggle_attendance(&member.id, date, slot)
        .await?;

    let state = if applied.value.prayers.get(slot) {
        "done"
    } else {
        "not done"
    };
    println!(
        "{} {date} {slot}: {state} [{}]{}",
        member.name,
        format_prayers(&applied.value),
        delivery_suffix(applied.delivery)
    );
    Ok(())
}
