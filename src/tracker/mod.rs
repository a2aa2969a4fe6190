//! Client-side overlay of pending edits on top of one loaded page.
//!
//! The tracker never talks to a database. Loaded rows keep their values as
//! loaded; edits live in per-row mutation records keyed by primary key, new
//! rows in a separate map keyed by temporary id, and deletions in a set of
//! removed keys. A row is in at most one of those states at any time.

pub mod row;

pub use row::{
    CellEditOutcome, EditStats, MutationRecord, RowId, RowOrigin, RowStatus, TempId, TrackedRow,
};

use crate::catalog::types::{Row, Value};
use crate::catalog::{ColumnDescriptor, PageRequest, RowKey, TablePage, TableRef};
use crate::commit::batch::{BatchRequest, BatchResult, RowUpdate};
use crate::error::BatchError;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// What the caller should do after a batch result has been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// The overlay was committed and cleared; load this page again.
    Reload(PageRequest),
    /// The batch failed; every pending edit is still in place.
    Retained { error: String },
}

#[derive(Debug, Clone)]
pub struct EditTracker {
    table: TableRef,
    columns: Vec<ColumnDescriptor>,
    primary_key: Vec<String>,
    page: u32,
    page_size: u32,
    total_rows: u64,
    /// Display order: loaded rows first, then rows added in the grid.
    order: Vec<RowId>,
    loaded: BTreeMap<RowKey, Row>,
    mutations: BTreeMap<RowKey, MutationRecord>,
    removed: BTreeSet<RowKey>,
    added: BTreeMap<TempId, Row>,
    next_temp: u64,
}

impl EditTracker {
    /// Fails when the table has no primary key or the page holds two rows with
    /// the same key; neither can be edited safely.
    pub fn open(page: TablePage) -> Result<Self, BatchError> {
        let primary_key: Vec<String> = page
            .primary_key_columns()
            .into_iter()
            .map(str::to_string)
            .collect();
        if primary_key.is_empty() {
            return Err(BatchError::validation(format!(
                "table {} has no primary key; editing is disabled",
                page.table
            )));
        }

        let mut order = Vec::with_capacity(page.rows.len());
        let mut loaded = BTreeMap::new();
        for row in page.rows {
            let key = RowKey::from_row(&row, primary_key.iter().map(String::as_str));
            if loaded.contains_key(&key) {
                return Err(BatchError::validation(format!(
                    "duplicate primary key [{key}] in loaded page"
                )));
            }
            order.push(RowId::Persisted(key.clone()));
            loaded.insert(key, row);
        }

        Ok(Self {
            table: page.table,
            columns: page.columns,
            primary_key,
            page: page.page,
            page_size: page.page_size,
            total_rows: page.total_rows,
            order,
            loaded,
            mutations: BTreeMap::new(),
            removed: BTreeSet::new(),
            added: BTreeMap::new(),
            next_temp: 0,
        })
    }

    /// Swaps in a freshly loaded page. Pending edits are dropped.
    pub fn replace_page(&mut self, page: TablePage) -> Result<(), BatchError> {
        *self = Self::open(page)?;
        Ok(())
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn primary_key(&self) -> &[String] {
        &self.primary_key
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn total_rows(&self) -> u64 {
        self.total_rows
    }

    /// Request that reloads the page this tracker was opened on.
    pub fn page_request(&self) -> PageRequest {
        PageRequest::new(self.table.clone(), self.page, self.page_size)
    }

    pub fn mutation(&self, key: &RowKey) -> Option<&MutationRecord> {
        self.mutations.get(key)
    }

    pub fn record_cell_change(
        &mut self,
        row: &RowId,
        column: &str,
        value: impl Into<Value>,
    ) -> CellEditOutcome {
        let value = value.into();
        if !self.columns.iter().any(|c| c.name == column) {
            return CellEditOutcome::Ignored;
        }
        match row {
            RowId::Pending(temp) => {
                let Some(values) = self.added.get_mut(temp) else {
                    return CellEditOutcome::Ignored;
                };
                if values.get(column) == Some(&value) {
                    return CellEditOutcome::Ignored;
                }
                values.set(column, value);
                CellEditOutcome::Changed
            }
            RowId::Persisted(key) => {
                if self.removed.contains(key) {
                    return CellEditOutcome::Ignored;
                }
                let Some(loaded) = self.loaded.get(key) else {
                    return CellEditOutcome::Ignored;
                };
                let original = loaded.get(column).cloned().unwrap_or(Value::Null);

                if value == original {
                    let Some(record) = self.mutations.get_mut(key) else {
                        return CellEditOutcome::Ignored;
                    };
                    if record.changes.remove(column).is_none() {
                        return CellEditOutcome::Ignored;
                    }
                    if record.changes.is_empty() {
                        self.mutations.remove(key);
                    }
                    debug!(row = %key, column, "cell reverted");
                    return CellEditOutcome::Reverted;
                }

                let record = self
                    .mutations
                    .entry(key.clone())
                    .or_insert_with(|| MutationRecord::new(loaded.clone()));
                if record.changes.get(column) == Some(&value) {
                    return CellEditOutcome::Ignored;
                }
                record.changes.insert(column.to_string(), value);
                CellEditOutcome::Changed
            }
        }
    }

    /// Appends a new row after every loaded row, filled with each column's
    /// literal default or null.
    pub fn add_row(&mut self) -> RowId {
        let temp = TempId(self.next_temp);
        self.next_temp += 1;
        let values: Row = self
            .columns
            .iter()
            .map(|c| (c.name.clone(), c.initial_value()))
            .collect();
        self.added.insert(temp, values);
        let id = RowId::Pending(temp);
        self.order.push(id.clone());
        id
    }

    /// New rows vanish; loaded rows are flagged for deletion and lose any
    /// pending edit. Returns how many rows changed state.
    pub fn mark_rows_deleted<'a>(&mut self, rows: impl IntoIterator<Item = &'a RowId>) -> usize {
        let mut changed = 0;
        for row in rows {
            match row {
                RowId::Pending(temp) => {
                    if self.added.remove(temp).is_some() {
                        self.order.retain(|id| id != row);
                        changed += 1;
                    }
                }
                RowId::Persisted(key) => {
                    if self.loaded.contains_key(key) && self.removed.insert(key.clone()) {
                        self.mutations.remove(key);
                        changed += 1;
                    }
                }
            }
        }
        changed
    }

    pub fn compute_stats(&self) -> EditStats {
        let updated = self.mutations.len();
        let inserted = self.added.len();
        let deleted = self.removed.len();
        let total = updated + inserted + deleted;
        EditStats {
            updated,
            inserted,
            deleted,
            total,
            has_pending: total > 0,
        }
    }

    pub fn has_pending(&self) -> bool {
        self.compute_stats().has_pending
    }

    /// Drops every pending edit and returns the request for the reload.
    pub fn discard(&mut self) -> PageRequest {
        self.clear_overlay();
        self.page_request()
    }

    fn clear_overlay(&mut self) {
        self.mutations.clear();
        self.removed.clear();
        self.added.clear();
        self.order.retain(|id| matches!(id, RowId::Persisted(_)));
    }

    /// Serializes the overlay into one batch, or `None` when nothing is
    /// pending. Updates and deletes follow display order; inserts carry
    /// every declared column.
    pub fn build_batch_request(&self) -> Option<BatchRequest> {
        if !self.has_pending() {
            return None;
        }
        let mut request = BatchRequest::for_table(&self.table);
        for id in &self.order {
            match id {
                RowId::Persisted(key) => {
                    if self.removed.contains(key) {
                        request.deletes.push(key.as_map().clone());
                    } else if let Some(record) = self.mutations.get(key) {
                        request
                            .updates
                            .push(RowUpdate::new(key.as_map().clone(), record.changes.clone()));
                    }
                }
                RowId::Pending(temp) => {
                    if let Some(values) = self.added.get(temp) {
                        request.inserts.push(
                            values.project(self.columns.iter().map(|c| c.name.as_str())),
                        );
                    }
                }
            }
        }
        Some(request)
    }

    /// Applies a batch outcome: success clears the overlay, failure keeps it
    /// so the user can fix the offending values and retry.
    pub fn reconcile(&mut self, result: &BatchResult) -> Reconciliation {
        if result.success {
            self.clear_overlay();
            Reconciliation::Reload(self.page_request())
        } else {
            Reconciliation::Retained {
                error: result
                    .error
                    .clone()
                    .unwrap_or_else(|| "batch failed".to_string()),
            }
        }
    }

    pub fn row_status(&self, row: &RowId) -> Option<RowStatus> {
        match row {
            RowId::Pending(temp) => self.added.contains_key(temp).then_some(RowStatus::Inserted),
            RowId::Persisted(key) => {
                if !self.loaded.contains_key(key) {
                    None
                } else if self.removed.contains(key) {
                    Some(RowStatus::Removed)
                } else if self.mutations.contains_key(key) {
                    Some(RowStatus::Modified)
                } else {
                    Some(RowStatus::Clean)
                }
            }
        }
    }

    pub fn row_origin(&self, row: &RowId) -> Option<RowOrigin> {
        self.row_status(row).map(|status| match status {
            RowStatus::Inserted => RowOrigin::New,
            RowStatus::Removed => RowOrigin::Removed,
            RowStatus::Clean | RowStatus::Modified => RowOrigin::Existing,
        })
    }

    /// True when the cell of a loaded row holds a pending value.
    pub fn is_cell_modified(&self, row: &RowId, column: &str) -> bool {
        match row {
            RowId::Persisted(key) => self
                .mutations
                .get(key)
                .is_some_and(|record| record.changes.contains_key(column)),
            RowId::Pending(_) => false,
        }
    }

    /// Values as the grid shows them: loaded values overlaid with edits.
    pub fn current_row(&self, row: &RowId) -> Option<Row> {
        match row {
            RowId::Pending(temp) => self.added.get(temp).cloned(),
            RowId::Persisted(key) => {
                let mut values = self.loaded.get(key)?.clone();
                if let Some(record) = self.mutations.get(key) {
                    for (column, value) in &record.changes {
                        values.set(column.clone(), value.clone());
                    }
                }
                Some(values)
            }
        }
    }

    /// Every row in display order, removed rows included.
    pub fn rows(&self) -> impl Iterator<Item = TrackedRow> + '_ {
        self.order.iter().filter_map(|id| {
            let status = self.row_status(id)?;
            let origin = self.row_origin(id)?;
            Some(TrackedRow {
                id: id.clone(),
                origin,
                status,
                values: self.current_row(id)?,
            })
        })
    }
}
