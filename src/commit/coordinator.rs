use crate::audit::{AuditEntry, AuditStatus, StatementAuditLog, now_micros, sql_preview};
use crate::backend::{BackendError, BatchConnection, ConnectionSource};
use crate::commit::batch::{BatchRequest, BatchResult};
use crate::commit::validation::validate_batch_request;
use crate::config::EngineConfig;
use crate::error::BatchError;
use crate::statement::{Statement, StatementKind, StatementPlan};
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Lifecycle of one batch on its connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Idle,
    TransactionOpen,
    /// Executing the statement at this zero-based position.
    Applying(usize),
    Committed,
    RolledBack,
}

impl TransactionState {
    pub fn is_open(self) -> bool {
        matches!(
            self,
            TransactionState::TransactionOpen | TransactionState::Applying(_)
        )
    }
}

/// Applies a batch request atomically: every statement commits together or
/// none does.
pub struct TransactionCoordinator<S> {
    source: S,
    config: EngineConfig,
    audit: Option<Arc<StatementAuditLog>>,
}

impl<S: ConnectionSource> TransactionCoordinator<S> {
    pub fn new(source: S, config: EngineConfig) -> Result<Self, BatchError> {
        config.validate()?;
        let audit = match &config.audit_log_path {
            Some(path) => Some(Arc::new(StatementAuditLog::open(path)?)),
            None => None,
        };
        Ok(Self {
            source,
            config,
            audit,
        })
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Wire-level entry point; never fails, the outcome is in the result.
    pub async fn execute_batch(&self, request: &BatchRequest) -> BatchResult {
        self.try_execute_batch(request).await.into()
    }

    /// Returns the total affected row count, or the first failure after the
    /// transaction has been rolled back.
    pub async fn try_execute_batch(&self, request: &BatchRequest) -> Result<u64, BatchError> {
        let plan = match validate_batch_request(request, &self.config) {
            Ok(plan) => plan,
            Err(err) => {
                warn!(table = %request.table_ref(), error = %err, "batch rejected");
                return Err(err);
            }
        };
        info!(
            table = %plan.table,
            updates = plan.count(StatementKind::Update),
            inserts = request.inserts.len(),
            deletes = plan.count(StatementKind::Delete),
            statements = plan.len(),
            "executing batch"
        );

        let conn = self
            .source
            .acquire(&plan.table)
            .await
            .map_err(|e| BatchError::Connection {
                message: e.to_string(),
            })?;
        let mut scope = TransactionScope::new(conn);
        scope.begin().await?;

        match self.apply(&mut scope, &plan).await {
            Ok(total) => {
                scope.commit().await?;
                info!(table = %plan.table, rows_affected = total, "batch committed");
                Ok(total)
            }
            Err(err) => {
                warn!(table = %plan.table, error = %err, "batch failed; rolling back");
                scope.rollback().await;
                Err(err)
            }
        }
    }

    async fn apply<C: BatchConnection>(
        &self,
        scope: &mut TransactionScope<C>,
        plan: &StatementPlan,
    ) -> Result<u64, BatchError> {
        let mut total = 0u64;
        for (index, statement) in plan.statements().iter().enumerate() {
            let sql_for_log = if self.config.log_statements {
                Cow::Borrowed(statement.sql.as_str())
            } else {
                sql_preview(&statement.sql, self.config.sql_preview_chars)
            };
            debug!(
                index,
                kind = %statement.kind,
                rows = statement.rows,
                sql = %sql_for_log,
                "executing statement"
            );
            let started = Instant::now();
            let outcome = scope.execute(index, &statement.sql).await;
            self.audit(plan, statement, started, &outcome);
            let affected = outcome?;
            debug!(index, affected, "statement applied");
            total += affected;
        }
        Ok(total)
    }

    fn audit(
        &self,
        plan: &StatementPlan,
        statement: &Statement,
        started: Instant,
        outcome: &Result<u64, BatchError>,
    ) {
        let Some(log) = &self.audit else {
            return;
        };
        let entry = AuditEntry {
            timestamp_micros: now_micros(),
            table: plan.table.to_string(),
            kind: statement.kind.to_string(),
            sql: sql_preview(&statement.sql, self.config.sql_preview_chars).into_owned(),
            status: if outcome.is_ok() {
                AuditStatus::Success
            } else {
                AuditStatus::Error
            },
            duration_micros: u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX),
            affected_rows: outcome.as_ref().ok().copied(),
            error: outcome.as_ref().err().map(ToString::to_string),
        };
        if let Err(err) = log.record(&entry) {
            warn!(path = %log.path().display(), error = %err, "failed to write statement audit entry");
        }
    }
}

/// Owns the batch connection and tracks where the transaction stands.
struct TransactionScope<C: BatchConnection> {
    conn: C,
    state: TransactionState,
}

impl<C: BatchConnection> TransactionScope<C> {
    fn new(conn: C) -> Self {
        Self {
            conn,
            state: TransactionState::Idle,
        }
    }

    async fn begin(&mut self) -> Result<(), BatchError> {
        self.conn
            .begin()
            .await
            .map_err(|e| BatchError::Connection {
                message: e.to_string(),
            })?;
        self.state = TransactionState::TransactionOpen;
        Ok(())
    }

    async fn execute(&mut self, index: usize, sql: &str) -> Result<u64, BatchError> {
        self.state = TransactionState::Applying(index);
        self.conn.execute(sql).await.map_err(|e| match e {
            BackendError::Connection(message) => BatchError::Connection { message },
            BackendError::Statement(message) => BatchError::Statement { index, message },
        })
    }

    async fn commit(&mut self) -> Result<(), BatchError> {
        match self.conn.commit().await {
            Ok(()) => {
                self.state = TransactionState::Committed;
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "commit failed; rolling back");
                self.rollback().await;
                Err(BatchError::Commit {
                    message: err.to_string(),
                })
            }
        }
    }

    /// Best effort: a failed rollback leaves nothing committed, so it is only
    /// logged.
    async fn rollback(&mut self) {
        if let Err(err) = self.conn.rollback().await {
            warn!(error = %err, "rollback failed");
        }
        self.state = TransactionState::RolledBack;
    }
}

impl<C: BatchConnection> Drop for TransactionScope<C> {
    fn drop(&mut self) {
        if self.state.is_open() {
            warn!(state = ?self.state, "transaction scope dropped while open");
        }
    }
}
