//! Member model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::util::normalize_text_option;

use super::id::RecordId;

/// A participant in the campaign
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Remote-assigned id, or a temporary id while unconfirmed
    pub id: RecordId,
    /// Display name
    pub name: String,
    /// Optional contact number
    #[serde(default)]
    pub phone: Option<String>,
    /// Optional photo reference
    #[serde(default)]
    pub photo_url: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Member {
    /// Create a member with a temporary id, ready for an optimistic write
    pub fn new_local(name: &str, phone: Option<String>) -> Result<Self> {
        Ok(Self {
            id: RecordId::temporary(),
            name: normalize_name(name)?,
            phone: normalize_text_option(phone),
            photo_url: None,
            created_at: Utc::now(),
        })
    }

    /// Return a copy with the patch applied
    pub fn patched(&self, patch: &MemberPatch) -> Result<Self> {
        let mut updated = self.clone();
        if let Some(name) = &patch.name {
            updated.name = normalize_name(name)?;
        }
        if let Some(phone) = &patch.phone {
            updated.phone = normalize_text_option(phone.clone());
        }
        if let Some(photo_url) = &patch.photo_url {
            updated.photo_url = normalize_text_option(photo_url.clone());
        }
        Ok(updated)
    }
}

fn normalize_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput("member name cannot be empty".into()));
    }
    Ok(trimmed.to_string())
}

/// Partial update for a member.
///
/// `Some(None)` clears an optional field; `None` leaves it unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MemberPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<Option<String>>,
}

impl MemberPatch {
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn phone(mut self, phone: Option<String>) -> Self {
        self.phone = Some(phone);
        self
    }

    #[must_use]
    pub fn photo_url(mut self, photo_url: Option<String>) -> Self {
        self.photo_url = Some(photo_url);
        self
    }

    pub const fn is_empty(&self) -> bool {
        self.name.is_none() && self.phone.is_none() && self.photo_url.is_none()
    }

    /// Update payload carrying the normalized values of `member` for every patched field
    pub(crate) fn payload_for(&self, member: &Member) -> Value {
        let mut payload = serde_json::Map::new();
        payload.insert("id".into(), Value::String(member.id.to_string()));
        if self.name.is_some() {
            payload.insert("name".into(), Value::String(member.name.clone()));
        }
        if self.phone.is_some() {
            payload.insert("phone".into(), member.phone.clone().map_or(Value::Null, Value::String));
        }
        if self.photo_url.is_some() {
            payload.insert(
                "photo_url".into(),
                member.photo_url.clone().map_or(Value::Null, Value::String),
            );
        }
        Value::Object(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_local_trims_and_assigns_temporary_id() {
        let member = Member::new_local("  Karim  ", Some("  ".to_string())).unwrap();
        assert_eq!(member.name, "Karim");
        assert_eq!(member.phone, None);
        assert!(member.id.is_temporary());
    }

    #[test]
    fn new_local_rejects_blank_name() {
        assert!(matches!(
            Member::new_local("   ", None),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn patch_clears_phone() {
        let member = Member::new_local("Karim", Some("01700".to_string())).unwrap();
        let patch = MemberPatch::default().phone(None);
        let updated = member.patched(&patch).unwrap();
        assert_eq!(updated.phone, None);

        let payload = patch.payload_for(&updated);
        assert_eq!(payload["phone"], Value::Null);
        assert!(payload.get("name").is_none());
    }

    #[test]
    fn deserializes_remote_row_with_extra_columns() {
        let row = serde_json::json!({
            "id": "5b0c",
            "name": "Rahim",
            "phone": null,
            "photo_url": null,
            "created_at": "2026-02-04T08:00:00.123+00:00",
            "created_by": "user-1"
        });
        let member: Member = serde_json::from_value(row).unwrap();
        assert_eq!(member.id.as_str(), "5b0c");
        assert!(!member.id.is_temporary());
    }
}
