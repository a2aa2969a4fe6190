use crate::catalog::TableRef;
use crate::catalog::types::ColumnValues;
use crate::error::BatchError;
use serde::{Deserialize, Serialize};

/// One existing row to update: its identity plus the changed columns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RowUpdate {
    pub primary_key: ColumnValues,
    pub changes: ColumnValues,
}

impl RowUpdate {
    pub fn new(primary_key: ColumnValues, changes: ColumnValues) -> Self {
        Self {
            primary_key,
            changes,
        }
    }
}

/// Everything pending for one table, submitted as a single atomic unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    pub database: String,
    pub schema: String,
    pub table: String,
    #[serde(default)]
    pub updates: Vec<RowUpdate>,
    #[serde(default)]
    pub inserts: Vec<ColumnValues>,
    #[serde(default)]
    pub deletes: Vec<ColumnValues>,
}

impl BatchRequest {
    pub fn new(
        database: impl Into<String>,
        schema: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self::for_table(&TableRef::new(database, schema, table))
    }

    pub fn for_table(table: &TableRef) -> Self {
        Self {
            database: table.database.clone(),
            schema: table.schema.clone(),
            table: table.table.clone(),
            updates: Vec::new(),
            inserts: Vec::new(),
            deletes: Vec::new(),
        }
    }

    pub fn table_ref(&self) -> TableRef {
        TableRef::new(&self.database, &self.schema, &self.table)
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty() && self.inserts.is_empty() && self.deletes.is_empty()
    }

    /// Logical rows touched by the batch.
    pub fn row_count(&self) -> usize {
        self.updates.len() + self.inserts.len() + self.deletes.len()
    }
}

/// Aggregate outcome of one batch as reported to the grid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub success: bool,
    pub rows_affected: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statement_index: Option<usize>,
}

impl BatchResult {
    pub fn success(rows_affected: u64) -> Self {
        Self {
            success: true,
            rows_affected,
            error: None,
            error_code: None,
            statement_index: None,
        }
    }

    pub fn failure(err: &BatchError) -> Self {
        Self {
            success: false,
            rows_affected: 0,
            error: Some(err.to_string()),
            error_code: Some(err.code_str().to_string()),
            statement_index: err.statement_index(),
        }
    }
}

impl From<Result<u64, BatchError>> for BatchResult {
    fn from(result: Result<u64, BatchError>) -> Self {
        match result {
            Ok(rows_affected) => BatchResult::success(rows_affected),
            Err(err) => BatchResult::failure(&err),
        }
    }
}
