pub mod builder;
pub mod format;

use crate::catalog::TableRef;
use crate::commit::batch::BatchRequest;
use crate::error::BatchError;
use serde::Serialize;
use std::fmt;

pub use builder::{build_delete, build_insert, build_update};
pub use format::{format_value, qualified_table, quote_ident};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatementKind {
    Update,
    Insert,
    Delete,
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatementKind::Update => write!(f, "update"),
            StatementKind::Insert => write!(f, "insert"),
            StatementKind::Delete => write!(f, "delete"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub kind: StatementKind,
    pub sql: String,
    /// Logical rows the statement covers.
    pub rows: usize,
}

/// The full, ordered statement set for one batch: updates, then inserts, then
/// deletes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementPlan {
    pub table: TableRef,
    statements: Vec<Statement>,
}

impl StatementPlan {
    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn count(&self, kind: StatementKind) -> usize {
        self.statements.iter().filter(|s| s.kind == kind).count()
    }
}

/// Validates a whole batch and renders every statement up front, so a batch
/// that cannot be built never reaches the database.
pub fn build_statement_plan(request: &BatchRequest) -> Result<StatementPlan, BatchError> {
    if request.is_empty() {
        return Err(BatchError::validation("batch contains no changes"));
    }
    let table = request.table_ref();
    let mut statements = Vec::with_capacity(
        request.updates.len() + usize::from(!request.inserts.is_empty()) + request.deletes.len(),
    );

    for (i, update) in request.updates.iter().enumerate() {
        let sql = build_update(&table, update).map_err(|e| with_context(e, "update", i))?;
        statements.push(Statement {
            kind: StatementKind::Update,
            sql,
            rows: 1,
        });
    }

    if !request.inserts.is_empty() {
        let sql = build_insert(&table, &request.inserts)?;
        statements.push(Statement {
            kind: StatementKind::Insert,
            sql,
            rows: request.inserts.len(),
        });
    }

    for (i, key) in request.deletes.iter().enumerate() {
        let sql = build_delete(&table, key).map_err(|e| with_context(e, "delete", i))?;
        statements.push(Statement {
            kind: StatementKind::Delete,
            sql,
            rows: 1,
        });
    }

    Ok(StatementPlan { table, statements })
}

fn with_context(err: BatchError, what: &str, index: usize) -> BatchError {
    match err {
        BatchError::Validation(message) => {
            BatchError::Validation(format!("{what} {}: {message}", index + 1))
        }
        other => other,
    }
}
