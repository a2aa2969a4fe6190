//! Embedded SQLite backend.
//!
//! A single `rusqlite::Connection` is shared behind an async mutex, so batches
//! against one source run one after another. The schema segment of a table
//! reference names the attached database (`main` for the primary file).

use crate::backend::{BackendError, BatchConnection, ConnectionSource, PageLoader, page_offset};
use crate::catalog::schema::primary_key_columns;
use crate::catalog::types::{ColumnType, Row, Value};
use crate::catalog::{
    ColumnDescriptor, PageRequest, TablePage, TableRef, decode_text_value, parse_default_literal,
};
use crate::error::BatchError;
use crate::statement::{qualified_table, quote_ident};
use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, params};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::warn;

#[derive(Clone)]
pub struct SqliteSource {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, BatchError> {
        let conn = Connection::open(path).map_err(connection_error)?;
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self, BatchError> {
        let conn = Connection::open_in_memory().map_err(connection_error)?;
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Runs a semicolon-separated script outside any batch (schema setup,
    /// fixtures).
    pub async fn run_script(&self, sql: &str) -> Result<(), BatchError> {
        let conn = self.conn.lock().await;
        conn.execute_batch(sql).map_err(connection_error)
    }

    /// Reads one scalar with a one-off query. Intended for assertions and
    /// tooling, not for the edit path.
    pub async fn query_scalar(&self, sql: &str) -> Result<Value, BatchError> {
        let conn = self.conn.lock().await;
        conn.query_row(sql, [], |row| {
            Ok(match row.get_ref(0)? {
                ValueRef::Null => Value::Null,
                ValueRef::Integer(i) => Value::Integer(i),
                ValueRef::Real(f) => Value::Float(f),
                ValueRef::Text(bytes) => Value::text(String::from_utf8_lossy(bytes).as_ref()),
                ValueRef::Blob(bytes) => Value::raw(hex(bytes)),
            })
        })
        .map_err(connection_error)
    }
}

pub struct SqliteConnection {
    conn: OwnedMutexGuard<Connection>,
}

impl SqliteConnection {
    fn run(&self, sql: &str) -> Result<(), BackendError> {
        self.conn
            .execute_batch(sql)
            .map_err(|e| BackendError::Statement(e.to_string()))
    }
}

#[async_trait]
impl BatchConnection for SqliteConnection {
    async fn begin(&mut self) -> Result<(), BackendError> {
        self.conn
            .execute_batch("BEGIN")
            .map_err(|e| BackendError::Connection(e.to_string()))
    }

    async fn execute(&mut self, sql: &str) -> Result<u64, BackendError> {
        let affected = self
            .conn
            .execute(sql, [])
            .map_err(|e| BackendError::Statement(e.to_string()))?;
        Ok(affected as u64)
    }

    async fn commit(&mut self) -> Result<(), BackendError> {
        self.run("COMMIT")
    }

    async fn rollback(&mut self) -> Result<(), BackendError> {
        self.run("ROLLBACK")
    }
}

impl Drop for SqliteConnection {
    fn drop(&mut self) {
        if !self.conn.is_autocommit() {
            if let Err(err) = self.conn.execute_batch("ROLLBACK") {
                warn!(error = %err, "failed to roll back abandoned sqlite transaction");
            }
        }
    }
}

#[async_trait]
impl ConnectionSource for SqliteSource {
    type Connection = SqliteConnection;

    async fn acquire(&self, _table: &TableRef) -> Result<SqliteConnection, BackendError> {
        Ok(SqliteConnection {
            conn: Arc::clone(&self.conn).lock_owned().await,
        })
    }
}

#[async_trait]
impl PageLoader for SqliteSource {
    async fn load_page(&self, request: &PageRequest) -> Result<TablePage, BatchError> {
        let conn = self.conn.lock().await;
        load_page_sync(&conn, request)
    }
}

fn load_page_sync(conn: &Connection, request: &PageRequest) -> Result<TablePage, BatchError> {
    let columns = table_columns(conn, &request.table)?;
    let table = qualified_table(&request.table);

    let total: i64 = conn
        .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
        .map_err(connection_error)?;

    let select_list = columns
        .iter()
        .map(|c| quote_ident(&c.name))
        .collect::<Vec<_>>()
        .join(", ");
    let order_by = primary_key_columns(&columns)
        .into_iter()
        .map(quote_ident)
        .collect::<Vec<_>>()
        .join(", ");
    let order_clause = if order_by.is_empty() {
        "rowid".to_string()
    } else {
        order_by
    };
    let sql = format!(
        "SELECT {select_list} FROM {table} ORDER BY {order_clause} LIMIT ?1 OFFSET ?2"
    );

    let types: Vec<ColumnType> = columns.iter().map(ColumnDescriptor::column_type).collect();
    let mut stmt = conn.prepare(&sql).map_err(connection_error)?;
    let mut cursor = stmt
        .query(params![i64::from(request.page_size), page_offset(request)?])
        .map_err(connection_error)?;
    let mut rows = Vec::new();
    while let Some(raw) = cursor.next().map_err(connection_error)? {
        let mut row = Row::new();
        for (i, column) in columns.iter().enumerate() {
            let value = raw.get_ref(i).map_err(connection_error)?;
            row.set(column.name.clone(), decode_sqlite_value(&column.name, value, &types[i])?);
        }
        rows.push(row);
    }

    Ok(TablePage {
        table: request.table.clone(),
        columns,
        rows,
        total_rows: u64::try_from(total).unwrap_or(0),
        page: request.page,
        page_size: request.page_size,
    })
}

fn table_columns(conn: &Connection, table: &TableRef) -> Result<Vec<ColumnDescriptor>, BatchError> {
    let mut stmt = conn
        .prepare(
            "SELECT name, type, \"notnull\", dflt_value, pk \
             FROM pragma_table_info(?1, ?2) ORDER BY cid",
        )
        .map_err(connection_error)?;
    let columns = stmt
        .query_map(params![table.table, table.schema], |row| {
            let name: String = row.get(0)?;
            let declared: String = row.get(1)?;
            let not_null: i64 = row.get(2)?;
            let default: Option<String> = row.get(3)?;
            let pk: i64 = row.get(4)?;
            let mut column = ColumnDescriptor::new(name, declared);
            column.nullable = not_null == 0;
            column.is_primary_key = pk > 0;
            column.default = default
                .as_deref()
                .and_then(|expr| parse_default_literal(expr, &column.column_type()));
            Ok(column)
        })
        .map_err(connection_error)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(connection_error)?;
    if columns.is_empty() {
        return Err(BatchError::validation(format!("table {table} does not exist")));
    }
    Ok(columns)
}

/// SQLite stores by value, not by declared type; this folds the stored value
/// back into the declared type's shape.
fn decode_sqlite_value(
    column: &str,
    value: ValueRef<'_>,
    column_type: &ColumnType,
) -> Result<Value, BatchError> {
    Ok(match (value, column_type) {
        (ValueRef::Null, _) => Value::Null,
        (ValueRef::Integer(i), ColumnType::Boolean) => Value::Boolean(i != 0),
        (ValueRef::Integer(i), ColumnType::Float) => Value::Float(i as f64),
        (ValueRef::Integer(i), ColumnType::Text) => Value::text(i.to_string()),
        (ValueRef::Integer(i), _) => Value::Integer(i),
        (ValueRef::Real(f), ColumnType::Text) => Value::text(f.to_string()),
        (ValueRef::Real(f), _) => Value::Float(f),
        (ValueRef::Text(bytes), column_type) => {
            let text = std::str::from_utf8(bytes).map_err(|_| {
                BatchError::Decode(format!("column '{column}': text is not valid UTF-8"))
            })?;
            decode_text_value(column, Some(text), column_type)?
        }
        (ValueRef::Blob(bytes), _) => Value::raw(hex(bytes)),
    })
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn connection_error(err: rusqlite::Error) -> BatchError {
    BatchError::Connection {
        message: err.to_string(),
    }
}
