use crate::catalog::RowKey;
use crate::catalog::types::{ColumnValues, Row};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Client-side identity of a row created in the grid and not yet persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TempId(pub(crate) u64);

impl fmt::Display for TempId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "new-{}", self.0)
    }
}

/// Stable row identity. Loaded rows are known by their primary key, new rows
/// by a temporary id, so identities survive reordering and deletion of other
/// rows.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RowId {
    Persisted(RowKey),
    Pending(TempId),
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowId::Persisted(key) => write!(f, "[{key}]"),
            RowId::Pending(temp) => temp.fmt(f),
        }
    }
}

impl From<RowKey> for RowId {
    fn from(key: RowKey) -> Self {
        RowId::Persisted(key)
    }
}

impl From<TempId> for RowId {
    fn from(temp: TempId) -> Self {
        RowId::Pending(temp)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowOrigin {
    Existing,
    New,
    Removed,
}

/// Grid indicator for one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowStatus {
    Clean,
    Modified,
    Inserted,
    Removed,
}

/// Pending changes of one Existing row. Only present while at least one
/// column differs from `original`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    /// Row as loaded, captured on the first edit.
    pub original: Row,
    pub changes: ColumnValues,
}

impl MutationRecord {
    pub(crate) fn new(original: Row) -> Self {
        Self {
            original,
            changes: ColumnValues::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellEditOutcome {
    /// The cell now holds a pending value.
    Changed,
    /// The cell is back at its loaded value and no longer pending.
    Reverted,
    /// Nothing changed: unknown row or column, removed row, or same value.
    Ignored,
}

/// One row as the grid should render it.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedRow {
    pub id: RowId,
    pub origin: RowOrigin,
    pub status: RowStatus,
    pub values: Row,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditStats {
    pub updated: usize,
    pub inserted: usize,
    pub deleted: usize,
    pub total: usize,
    pub has_pending: bool,
}
