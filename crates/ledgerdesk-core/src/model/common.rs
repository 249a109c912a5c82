// Display-only relations the server denormalizes onto records.

use serde::{Deserialize, Serialize};

use super::EntityId;

/// The user who created or last touched a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: EntityId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Ledger account referenced by a voucher line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub id: EntityId,
    pub code: String,
    pub name: String,
}
