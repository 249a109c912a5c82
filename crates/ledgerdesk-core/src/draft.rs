// ── Draft line items ──
//
// Rows added in an editable entry table before they exist server-side.
// Each carries a client-generated `RowId` until the server assigns an id
// or the row is thrown away.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::model::EntityId;

/// Client-side identity of a draft row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowId(Uuid);

impl RowId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RowId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DraftState {
    /// Local only.
    Pending,
    /// Submitted and now known to the server under `id`.
    Saved { id: EntityId },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftRow<R> {
    pub row_id: RowId,
    pub state: DraftState,
    pub value: R,
}

/// Ordered set of draft rows.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftRows<R> {
    rows: IndexMap<RowId, DraftRow<R>>,
}

impl<R> Default for DraftRows<R> {
    fn default() -> Self {
        Self {
            rows: IndexMap::new(),
        }
    }
}

impl<R> DraftRows<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append a pending row and return its id.
    pub fn add(&mut self, value: R) -> RowId {
        let row_id = RowId::new();
        self.rows.insert(
            row_id,
            DraftRow {
                row_id,
                state: DraftState::Pending,
                value,
            },
        );
        row_id
    }

    pub fn get(&self, row_id: RowId) -> Option<&DraftRow<R>> {
        self.rows.get(&row_id)
    }

    /// Edit a row in place. Returns `false` if the row is gone.
    pub fn update(&mut self, row_id: RowId, f: impl FnOnce(&mut R)) -> bool {
        match self.rows.get_mut(&row_id) {
            Some(row) => {
                f(&mut row.value);
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, row_id: RowId) -> Option<R> {
        self.rows.shift_remove(&row_id).map(|row| row.value)
    }

    /// Rows not yet accepted by the server, in insertion order.
    pub fn pending(&self) -> impl Iterator<Item = &DraftRow<R>> {
        self.rows
            .values()
            .filter(|row| row.state == DraftState::Pending)
    }

    /// Record the server id for a submitted row.
    pub fn reconcile(&mut self, row_id: RowId, id: EntityId) -> bool {
        match self.rows.get_mut(&row_id) {
            Some(row) => {
                row.state = DraftState::Saved { id };
                true
            }
            None => false,
        }
    }

    /// Drop a row the server rejected or the user abandoned.
    pub fn discard(&mut self, row_id: RowId) -> bool {
        self.rows.shift_remove(&row_id).is_some()
    }

    /// Remove every saved row, leaving only pending drafts.
    pub fn clear_saved(&mut self) {
        self.rows.retain(|_, row| row.state == DraftState::Pending);
    }

    pub fn iter(&self) -> impl Iterator<Item = &DraftRow<R>> {
        self.rows.values()
    }
}
