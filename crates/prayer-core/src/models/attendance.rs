//! Attendance model

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

use super::id::RecordId;

/// One of the five daily prayer slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrayerSlot {
    Fajr,
    Zuhr,
    Asr,
    Maghrib,
    Isha,
}

impl PrayerSlot {
    pub const ALL: [Self; 5] = [Self::Fajr, Self::Zuhr, Self::Asr, Self::Maghrib, Self::Isha];

    /// Column name used by both stores
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fajr => "fajr",
            Self::Zuhr => "zuhr",
            Self::Asr => "asr",
            Self::Maghrib => "maghrib",
            Self::Isha => "isha",
        }
    }
}

impl fmt::Display for PrayerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrayerSlot {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|slot| slot.as_str() == wanted)
            .ok_or_else(|| Error::InvalidInput(format!("unknown prayer slot: {s}")))
    }
}

/// Completion flags for the five slots of one day
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrayerFlags {
    #[serde(default)]
    pub fajr: bool,
    #[serde(default)]
    pub zuhr: bool,
    #[serde(default)]
    pub asr: bool,
    #[serde(default)]
    pub maghrib: bool,
    #[serde(default)]
    pub isha: bool,
}

impl PrayerFlags {
    /// Flags with exactly `slot` set
    #[must_use]
    pub fn only(slot: PrayerSlot) -> Self {
        let mut flags = Self::default();
        flags.set(slot, true);
        flags
    }

    pub const fn get(&self, slot: PrayerSlot) -> bool {
        match slot {
            PrayerSlot::Fajr => self.fajr,
            PrayerSlot::Zuhr => self.zuhr,
            PrayerSlot::Asr => self.asr,
            PrayerSlot::Maghrib => self.maghrib,
            PrayerSlot::Isha => self.isha,
        }
    }

    pub fn set(&mut self, slot: PrayerSlot, value: bool) {
        match slot {
            PrayerSlot::Fajr => self.fajr = value,
            PrayerSlot::Zuhr => self.zuhr = value,
            PrayerSlot::Asr => self.asr = value,
            PrayerSlot::Maghrib => self.maghrib = value,
            PrayerSlot::Isha => self.isha = value,
        }
    }

    /// Number of completed slots
    pub fn count(&self) -> usize {
        PrayerSlot::ALL
            .into_iter()
            .filter(|slot| self.get(*slot))
            .count()
    }
}

/// Attendance of one member on one calendar day.
///
/// At most one record exists per `(member_id, date)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub id: RecordId,
    pub member_id: RecordId,
    pub date: NaiveDate,
    #[serde(flatten)]
    pub prayers: PrayerFlags,
}

impl AttendanceRecord {
    /// Record created by the first toggle of a day: only `slot` is set
    #[must_use]
    pub fn first_toggle(member_id: RecordId, date: NaiveDate, slot: PrayerSlot) -> Self {
        Self {
            id: RecordId::temporary(),
            member_id,
            date,
            prayers: PrayerFlags::only(slot),
        }
    }

    /// Copy with `slot` flipped
    #[must_use]
    pub fn toggled(&self, slot: PrayerSlot) -> Self {
        let mut next = self.clone();
        next.prayers.set(slot, !self.prayers.get(slot));
        next
    }

    /// Update payload carrying the current value of `slot`
    pub(crate) fn flag_payload(&self, slot: PrayerSlot) -> Value {
        let mut payload = serde_json::Map::new();
        payload.insert("id".into(), Value::String(self.id.to_string()));
        payload.insert(slot.as_str().into(), Value::Bool(self.prayers.get(slot)));
        Value::Object(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 10).unwrap()
    }

    #[test]
    fn first_toggle_sets_exactly_one_flag() {
        let record = AttendanceRecord::first_toggle("m1".into(), day(), PrayerSlot::Fajr);
        assert!(record.prayers.fajr);
        assert_eq!(record.prayers.count(), 1);
        assert!(record.id.is_temporary());
    }

    #[test]
    fn toggled_flips_only_requested_slot() {
        let record = AttendanceRecord::first_toggle("m1".into(), day(), PrayerSlot::Fajr);
        let next = record.toggled(PrayerSlot::Isha);
        assert!(next.prayers.fajr);
        assert!(next.prayers.isha);
        assert_eq!(next.prayers.count(), 2);

        let back = next.toggled(PrayerSlot::Fajr);
        assert!(!back.prayers.fajr);
        assert_eq!(back.prayers.count(), 1);
    }

    #[test]
    fn flag_payload_carries_absolute_value() {
        let record = AttendanceRecord::first_toggle("m1".into(), day(), PrayerSlot::Asr);
        let payload = record.flag_payload(PrayerSlot::Asr);
        assert_eq!(payload["asr"], Value::Bool(true));
        assert_eq!(payload["id"], Value::String(record.id.to_string()));
        assert_eq!(payload.as_object().unwrap().len(), 2);
    }

    #[test]
    fn serializes_flat_row() {
        let record = AttendanceRecord::first_toggle("m1".into(), day(), PrayerSlot::Fajr);
        let row = serde_json::to_value(&record).unwrap();
        assert_eq!(row["date"], "2026-02-10");
        assert_eq!(row["fajr"], true);
        assert_eq!(row["zuhr"], false);
    }

    #[test]
    fn parses_slot_names_case_insensitively() {
        assert_eq!("Maghrib".parse::<PrayerSlot>().unwrap(), PrayerSlot::Maghrib);
        assert!("tahajjud".parse::<PrayerSlot>().is_err());
    }
}
