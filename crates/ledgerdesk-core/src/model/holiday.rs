// ── Holiday ──

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{EntityId, Record, UserSummary};

/// A branch holiday as returned by `/api/v1/holiday`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holiday {
    pub id: EntityId,
    pub name: String,
    pub entry_date: NaiveDate,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<UserSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Record for Holiday {
    fn record_id(&self) -> &EntityId {
        &self.id
    }
}

/// Create/update payload for [`Holiday`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct HolidayRequest {
    #[validate(length(min = 1, max = 120, message = "Name is required"))]
    pub name: String,
    #[validate(required(message = "Entry date is required"))]
    pub entry_date: Option<NaiveDate>,
    #[validate(length(max = 500, message = "Description is too long"))]
    pub description: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_serializes_wire_shape() {
        let req = HolidayRequest {
            name: "New Year".into(),
            entry_date: NaiveDate::from_ymd_opt(2025, 1, 1),
            description: "Holiday".into(),
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({ "name": "New Year", "entry_date": "2025-01-01", "description": "Holiday" })
        );
        assert!(req.validate().is_ok());
    }

    #[test]
    fn default_request_fails_validation() {
        let errors = HolidayRequest::default().validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("name"));
        assert!(fields.contains_key("entry_date"));
    }

    #[test]
    fn record_tolerates_missing_relations() {
        let holiday: Holiday = serde_json::from_value(json!({
            "id": "550e8400-e29b-41d4-a716-446655440000",
            "name": "New Year",
            "entry_date": "2025-01-01"
        }))
        .unwrap();
        assert!(holiday.created_by.is_none());
        assert_eq!(holiday.description, "");
    }
}
