// ── Journal voucher ──
//
// Amounts are integer minor units. A voucher is postable only when the
// debit and credit columns balance.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::{AccountSummary, EntityId, Record, UserSummary};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum VoucherStatus {
    #[default]
    Draft,
    Submitted,
    Approved,
    Posted,
    Rejected,
}

/// A journal voucher as returned by `/api/v1/voucher`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Voucher {
    pub id: EntityId,
    pub voucher_no: String,
    pub entry_date: NaiveDate,
    #[serde(default)]
    pub narration: String,
    #[serde(default)]
    pub status: VoucherStatus,
    #[serde(default)]
    pub entries: Vec<VoucherEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<UserSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Voucher {
    /// `None` when the column does not fit in a `u64`.
    pub fn total_debit(&self) -> Option<u64> {
        checked_total(self.entries.iter().map(|e| e.debit))
    }

    pub fn total_credit(&self) -> Option<u64> {
        checked_total(self.entries.iter().map(|e| e.credit))
    }
}

fn checked_total(amounts: impl IntoIterator<Item = u64>) -> Option<u64> {
    amounts.into_iter().try_fold(0_u64, u64::checked_add)
}

impl Record for Voucher {
    fn record_id(&self) -> &EntityId {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoucherEntry {
    pub id: EntityId,
    pub account_id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<AccountSummary>,
    #[serde(default)]
    pub debit: u64,
    #[serde(default)]
    pub credit: u64,
    #[serde(default)]
    pub description: String,
}

/// Create/update payload for [`Voucher`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
#[validate(schema(function = "validate_balanced"))]
pub struct VoucherRequest {
    #[validate(required(message = "Entry date is required"))]
    pub entry_date: Option<NaiveDate>,
    #[validate(length(max = 500, message = "Narration is too long"))]
    pub narration: String,
    #[validate(length(min = 2, message = "At least two lines are required"), nested)]
    pub entries: Vec<VoucherEntryRequest>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
#[validate(schema(function = "validate_one_sided"))]
pub struct VoucherEntryRequest {
    #[validate(length(min = 1, message = "Account is required"))]
    pub account_id: String,
    pub debit: u64,
    pub credit: u64,
    pub description: String,
}

fn validate_balanced(req: &VoucherRequest) -> Result<(), ValidationError> {
    let debit = checked_total(req.entries.iter().map(|e| e.debit));
    let credit = checked_total(req.entries.iter().map(|e| e.credit));
    match (debit, credit) {
        (Some(debit), Some(credit)) if debit == credit => Ok(()),
        (Some(_), Some(_)) => Err(ValidationError::new("unbalanced")
            .with_message("Debit and credit totals must match".into())),
        _ => Err(ValidationError::new("overflow").with_message("Voucher totals are too large".into())),
    }
}

fn validate_one_sided(entry: &VoucherEntryRequest) -> Result<(), ValidationError> {
    match (entry.debit, entry.credit) {
        (0, 0) => Err(ValidationError::new("empty_line").with_message("Enter a debit or a credit".into())),
        (d, c) if d > 0 && c > 0 => Err(ValidationError::new("two_sided")
            .with_message("A line cannot carry both debit and credit".into())),
        _ => Ok(()),
    }
}
