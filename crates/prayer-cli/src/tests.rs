use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use prayer_core::{AttendanceRecord, CampaignConfig, Delivery, Member, PrayerSlot, RecordId};
use tempfile::tempdir;

use crate::cli::SlotArg;
use crate::commands::common::{
    delivery_suffix, format_attendance_lines, format_member_line, normalize_name, open_session,
    resolve_member,
};
use crate::commands::config::format_config_lines;
use crate::commands::sync::run_sync;
use crate::error::CliError;

fn member(id: &str, name: &str) -> Member {
    Member {
        id: RecordId::from(id),
        ..Member::new_local(name, None).unwrap()
    }
}

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 2, 10).unwrap()
}

#[test]
fn normalize_name_joins_words_and_rejects_empty() {
    assert_eq!(
        normalize_name(&["Abdul".to_string(), "Karim".to_string()]).unwrap(),
        "Abdul Karim"
    );
    assert!(matches!(
        normalize_name(&["  ".to_string()]),
        Err(CliError::EmptyName)
    ));
}

#[test]
fn resolve_member_prefers_exact_id_then_name_then_prefix() {
    let members = vec![
        member("a1b2", "Karim"),
        member("a1c3", "Rahim"),
        member("karim", "Salma"),
    ];

    assert_eq!(resolve_member(&members, "karim").unwrap().name, "Salma");
    assert_eq!(resolve_member(&members, "RAHIM").unwrap().id.as_str(), "a1c3");
    assert_eq!(resolve_member(&members, "a1b").unwrap().name, "Karim");
}

#[test]
fn resolve_member_reports_ambiguity_and_misses() {
    let members = vec![member("a1b2", "Karim"), member("a1c3", "Rahim")];
    assert!(matches!(
        resolve_member(&members, "a1"),
        Err(CliError::AmbiguousMember(_))
    ));
    assert!(matches!(
        resolve_member(&members, "zz"),
        Err(CliError::MemberNotFound(_))
    ));
    assert!(matches!(
        resolve_member(&members, " "),
        Err(CliError::EmptyMemberId)
    ));
}

#[test]
fn member_line_marks_pending_members() {
    let pending = Member::new_local("Karim", Some("01700".to_string())).unwrap();
    assert!(format_member_line(&pending).ends_with("[pending]"));
    assert!(format_member_line(&pending).contains("01700"));

    let confirmed = member("r1", "Rahim");
    assert_eq!(format_member_line(&confirmed), "r1  Rahim  -");
}

#[test]
fn attendance_lines_show_names_and_done_prayers() {
    let members = vec![member("r1", "Karim")];
    let record = AttendanceRecord::first_toggle("r1".into(), day(), PrayerSlot::Fajr)
        .toggled(PrayerSlot::Isha);
    let orphan = AttendanceRecord::first_toggle("gone".into(), day(), PrayerSlot::Asr);

    assert_eq!(
        format_attendance_lines(&[record, orphan], &members),
        vec![
            "2026-02-10  Karim  fajr isha  (2/5)".to_string(),
            "2026-02-10  (unknown member)  asr  (1/5)".to_string(),
        ]
    );
}

#[test]
fn config_lines_flag_unsaved_defaults() {
    let lines = format_config_lines(&CampaignConfig::default());
    assert_eq!(lines[0], "start:         2026-02-04");
    assert_eq!(lines[2], "days:          50");
    assert_eq!(lines.last().map(String::as_str), Some("(not yet saved remotely)"));
}

#[test]
fn slot_args_map_to_prayer_slots() {
    assert_eq!(PrayerSlot::from(SlotArg::Maghrib), PrayerSlot::Maghrib);
    assert_eq!(delivery_suffix(Delivery::Confirmed), "");
    assert_eq!(delivery_suffix(Delivery::Queued), " (saved offline)");
}

#[tokio::test(flavor = "multi_thread")]
async fn offline_session_queues_changes_durably() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("prayer.db");

    {
        let session = open_session(&path, true).await.unwrap();
        assert!(!session.connected);
        let applied = session.service.add_member("Karim", None).await.unwrap();
        assert_eq!(applied.delivery, Delivery::Queued);
        assert!(matches!(
            run_sync(&session).await,
            Err(CliError::SyncUnavailable)
        ));
    }

    let session = open_session(&path, true).await.unwrap();
    assert_eq!(session.service.pending_changes().await.unwrap(), 1);
    assert_eq!(session.service.list_members().await[0].name, "Karim");
}
