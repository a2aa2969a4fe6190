pub mod audit;
pub mod backend;
pub mod catalog;
pub mod commit;
pub mod config;
pub mod error;
pub mod session;
pub mod statement;
pub mod tracker;

pub use backend::postgres::PgConnectionSource;
pub use backend::sqlite::SqliteSource;
pub use backend::{Backend, BackendError, BatchConnection, ConnectionSource, PageLoader};
pub use catalog::types::{ColumnType, ColumnValues, Row, Value};
pub use catalog::{ColumnDescriptor, PageRequest, RowKey, TablePage, TableRef};
pub use commit::{BatchRequest, BatchResult, RowUpdate, TransactionCoordinator, TransactionState};
pub use config::{ConnectionConfig, EngineConfig};
pub use error::{BatchError, BatchErrorCode};
pub use session::{EditSession, SaveOutcome};
pub use statement::{StatementKind, StatementPlan, build_statement_plan, format_value};
pub use tracker::{CellEditOutcome, EditStats, EditTracker, Reconciliation, RowId, RowStatus};
