use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use prayer_core::{
    AttendanceRecord, CampaignService, Delivery, LocalStore, Member, MemoryRemote,
    NetworkMonitor, PostgrestRemote, PrayerSlot, RemoteConfig, RemoteStore,
};

use crate::error::CliError;

/// An opened local store plus, when configured, a live remote
pub struct Session {
    pub service: CampaignService,
    pub connected: bool,
}

impl Session {
    /// Replay pending changes, or refresh from the remote when none are queued
    pub async fn catch_up(&self) {
        if self.connected {
            self.service.mount().await;
        }
    }
}

pub async fn open_session(db_path: &Path, offline: bool) -> Result<Session, CliError> {
    let endpoint = RemoteConfig::from_env().resolve()?;
    let (remote, connected): (Arc<dyn RemoteStore>, bool) = match endpoint {
        Some(endpoint) if !offline => {
            let remote = PostgrestRemote::new(endpoint)?;
            tracing::debug!("Using remote at {}", remote.endpoint().rest_url);
            (Arc::new(remote), true)
        }
        Some(_) => (detached_remote(), false),
        None => {
            tracing::info!("No remote configured; changes will be queued locally");
            (detached_remote(), false)
        }
    };

    let service = CampaignService::open(
        LocalStore::new(db_path),
        remote,
        NetworkMonitor::new(connected),
    )
    .await?;
    Ok(Session { service, connected })
}

/// Stand-in remote for offline sessions; the engine never reaches it while offline
fn detached_remote() -> Arc<dyn RemoteStore> {
    let remote = MemoryRemote::new();
    remote.set_reachable(false);
    Arc::new(remote)
}

pub fn normalize_name(parts: &[String]) -> Result<String, CliError> {
    let name = parts.join(" ");
    let name = name.trim();
    if name.is_empty() {
        return Err(CliError::EmptyName);
    }
    Ok(name.to_string())
}

/// Find a member by exact id, case-insensitive name, or unique id prefix
pub fn resolve_member(members: &[Member], query: &str) -> Result<Member, CliError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(CliError::EmptyMemberId);
    }

    if let Some(member) = members.iter().find(|member| member.id.as_str() == query) {
        return Ok(member.clone());
    }

    let by_name: Vec<&Member> = members
        .iter()
        .filter(|member| member.name.eq_ignore_ascii_case(query))
        .collect();
    let by_prefix: Vec<&Member> = members
        .iter()
        .filter(|member| member.id.as_str().starts_with(query))
        .collect();
    let candidates = if by_name.is_empty() { by_prefix } else { by_name };

    match candidates.as_slice() {
        [] => Err(CliError::MemberNotFound(query.to_string())),
        [member] => Ok((*member).clone()),
        many => {
            let ids = many
                .iter()
                .map(|member| format!("{} ({})", member.id, member.name))
                .collect::<Vec<_>>()
                .join(", ");
            Err(CliError::AmbiguousMember(format!(
                "'{query}' matches several members: {ids}"
            )))
        }
    }
}

pub const fn delivery_suffix(delivery: Delivery) -> &'static str {
    match delivery {
        Delivery::Confirmed => "",
        Delivery::Queued => " (saved offline)",
    }
}

pub fn format_member_line(member: &Member) -> String {
    let pending = if member.id.is_temporary() {
        "  [pending]"
    } else {
        ""
    };
    format!(
        "{}  {}  {}{pending}",
        member.id,
        member.name,
        member.phone.as_deref().unwrap_or("-")
    )
}

pub fn format_prayers(record: &AttendanceRecord) -> String {
    let done: Vec<&str> = PrayerSlot::ALL
        .into_iter()
        .filter(|slot| record.prayers.get(*slot))
        .map(PrayerSlot::as_str)
        .collect();
    if done.is_empty() {
        "-".to_string()
    } else {
        done.join(" ")
    }
}

pub fn format_attendance_lines(records: &[AttendanceRecord], members: &[Member]) -> Vec<String> {
    let names: HashMap<&str, &str> = members
        .iter()
        .map(|member| (member.id.as_str(), member.name.as_str()))
        .collect();
    records
        .iter()
        .map(|record| {
            let name = names
                .get(record.member_id.as_str())
                .copied()
                .unwrap_or("(unknown member)");
            format!(
                "{}  {name}  {}  ({}/5)",
                record.date,
                format_prayers(record),
                record.prayers.count()
            )
        })
        .collect()
}
