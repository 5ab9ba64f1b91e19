use prayer_core::MemberPatch;

use crate::commands::common::{
    delivery_suffix, format_member_line, normalize_name, resolve_member, Session,
};
use crate::error::CliError;

pub async fn run_member_add(
    session: &Session,
    name_parts: &[String],
    phone: Option<String>,
) -> Result<(), CliError> {
    let name = normalize_name(name_parts)?;
    let applied = session.service.add_member(&name, phone).await?;
    println!(
        "{}{}",
        applied.value.id,
        delivery_suffix(applied.delivery)
    );
    Ok(())
}

pub async fn run_member_list(session: &Session, as_json: bool) -> Result<(), CliError> {
    let members = session.service.list_members().await;
    if as_json {
        println!("{}", serde_json::to_string_pretty(&members)?);
        return Ok(());
    }

    if members.is_empty() {
        println!("No members yet.");
    }
    for member in &members {
        println!("{}", format_member_line(member));
    }
    Ok(())
}

pub async fn run_member_remove(session: &Session, query: &str) -> Result<(), CliError> {
    let members = session.service.list_members().await;
    let member = resolve_member(&members, query)?;
    let applied = session.service.remove_member(&member.id).await?;
    println!(
        "Removed {}{}",
        applied.value.name,
        delivery_suffix(applied.delivery)
    );
    Ok(())
}

pub async fn run_member_phone(
    session: &Session,
    query: &str,
    phone: Option<String>,
) -> Result<(), CliError> {
    let members = session.service.list_members().await;
    let member = resolve_member(&members, query)?;
    let patch = MemberPatch::default().phone(phone);
    let applied = session.service.update_member(&member.id, &patch).await?;
    println!(
        "{}{}",
        format_member_line(&applied.value),
        delivery_suffix(applied.delivery)
    );
    Ok(())
}
