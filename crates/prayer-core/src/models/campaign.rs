//! Campaign configuration model

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

use super::id::RecordId;

const DEFAULT_START: (i32, u32, u32) = (2026, 2, 4);
const DEFAULT_END: (i32, u32, u32) = (2026, 3, 25);
const DEFAULT_STREAK_TARGET: u32 = 41;

/// Singleton campaign settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignConfig {
    pub id: RecordId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Consecutive qualifying days needed for winner status
    pub streak_target: u32,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        let date = |(y, m, d): (i32, u32, u32)| {
            NaiveDate::from_ymd_opt(y, m, d).unwrap_or(NaiveDate::MIN)
        };
        Self {
            id: RecordId::temporary(),
            start_date: date(DEFAULT_START),
            end_date: date(DEFAULT_END),
            streak_target: DEFAULT_STREAK_TARGET,
        }
    }
}

impl CampaignConfig {
    /// Return a validated copy with the patch applied
    pub fn patched(&self, patch: &ConfigPatch) -> Result<Self> {
        let updated = Self {
            id: self.id.clone(),
            start_date: patch.start_date.unwrap_or(self.start_date),
            end_date: patch.end_date.unwrap_or(self.end_date),
            streak_target: patch.streak_target.unwrap_or(self.streak_target),
        };
        updated.validate()?;
        Ok(updated)
    }

    pub fn validate(&self) -> Result<()> {
        if self.start_date > self.end_date {
            return Err(Error::InvalidInput(format!(
                "campaign start {} is after end {}",
                self.start_date, self.end_date
            )));
        }
        if self.streak_target == 0 {
            return Err(Error::InvalidInput(
                "streak target must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Number of calendar days covered, inclusive
    pub fn duration_days(&self) -> i64 {
        (self.end_date - self.start_date).num_days() + 1
    }

    /// Update payload with every setting at its current value
    pub(crate) fn update_payload(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Partial update for the campaign settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigPatch {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub streak_target: Option<u32>,
}

impl ConfigPatch {
    pub const fn is_empty(&self) -> bool {
        self.start_date.is_none() && self.end_date.is_none() && self.streak_target.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_campaign_calendar() {
        let config = CampaignConfig::default();
        assert_eq!(config.start_date.to_string(), "2026-02-04");
        assert_eq!(config.end_date.to_string(), "2026-03-25");
        assert_eq!(config.streak_target, 41);
        assert_eq!(config.duration_days(), 50);
        assert!(config.id.is_temporary());
    }

    #[test]
    fn patch_rejects_inverted_range() {
        let config = CampaignConfig::default();
        let patch = ConfigPatch {
            end_date: NaiveDate::from_ymd_opt(2026, 1, 1),
            ..ConfigPatch::default()
        };
        assert!(matches!(config.patched(&patch), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn patch_rejects_zero_target() {
        let config = CampaignConfig::default();
        let patch = ConfigPatch {
            streak_target: Some(0),
            ..ConfigPatch::default()
        };
        assert!(config.patched(&patch).is_err());
    }

    #[test]
    fn patch_keeps_unset_fields() {
        let config = CampaignConfig::default();
        let patch = ConfigPatch {
            streak_target: Some(30),
            ..ConfigPatch::default()
        };
        let updated = config.patched(&patch).unwrap();
        assert_eq!(updated.streak_target, 30);
        assert_eq!(updated.start_date, config.start_date);
        assert_eq!(updated.id, config.id);
    }
}
