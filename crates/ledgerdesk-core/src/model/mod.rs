// ── Domain model ──
//
// Wire DTOs for the representative ledger entities plus the `Record` seam
// the generic data layer and table state are written against.

pub mod common;
pub mod entity_id;
pub mod holiday;
pub mod voucher;

pub use common::{AccountSummary, UserSummary};
pub use entity_id::EntityId;
pub use holiday::{Holiday, HolidayRequest};
pub use voucher::{Voucher, VoucherEntry, VoucherEntryRequest, VoucherRequest, VoucherStatus};

/// A server-owned record with an immutable identity.
pub trait Record {
    fn record_id(&self) -> &EntityId;
}
