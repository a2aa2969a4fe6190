//! PostgreSQL backend over `tokio-postgres`.
//!
//! Every batch opens its own connection to the table's database; dropping the
//! connection handle closes the session, which makes the server discard any
//! transaction still open on it.

use crate::backend::{BackendError, BatchConnection, ConnectionSource, PageLoader, page_offset};
use crate::catalog::schema::primary_key_columns;
use crate::catalog::types::{ColumnType, Row};
use crate::catalog::{
    ColumnDescriptor, PageRequest, TablePage, TableRef, decode_text_value, parse_default_literal,
};
use crate::config::ConnectionConfig;
use crate::error::BatchError;
use crate::statement::{qualified_table, quote_ident};
use async_trait::async_trait;
use tokio_postgres::{Client, NoTls, SimpleQueryMessage};
use tracing::{debug, error};

const COLUMNS_SQL: &str = "
    SELECT a.attname::text,
           format_type(a.atttypid, a.atttypmod),
           NOT a.attnotnull,
           COALESCE(a.attnum = ANY(i.indkey), false),
           pg_get_expr(d.adbin, d.adrelid)
    FROM pg_catalog.pg_attribute a
    LEFT JOIN pg_catalog.pg_index i
           ON i.indrelid = a.attrelid AND i.indisprimary
    LEFT JOIN pg_catalog.pg_attrdef d
           ON d.adrelid = a.attrelid AND d.adnum = a.attnum
    WHERE a.attrelid = to_regclass($1::text)
      AND a.attnum > 0
      AND NOT a.attisdropped
    ORDER BY a.attnum";

#[derive(Debug, Clone)]
pub struct PgConnectionSource {
    config: ConnectionConfig,
}

impl PgConnectionSource {
    pub fn new(config: ConnectionConfig) -> Result<Self, BatchError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    async fn connect(&self, database: &str) -> Result<Client, tokio_postgres::Error> {
        let database = if database.trim().is_empty() {
            self.config.default_database.as_str()
        } else {
            database
        };
        let mut pg = tokio_postgres::Config::new();
        pg.host(&self.config.host)
            .port(self.config.port)
            .user(&self.config.user)
            .dbname(database);
        if !self.config.password().is_empty() {
            pg.password(self.config.password());
        }
        let (client, connection) = pg.connect(NoTls).await?;
        tokio::spawn(async move {
            if let Err(err) = connection.await {
                error!(error = %err, "postgres connection terminated");
            }
        });
        debug!(host = %self.config.host, database, "postgres connection opened");
        Ok(client)
    }
}

pub struct PgConnection {
    client: Client,
}

#[async_trait]
impl BatchConnection for PgConnection {
    async fn begin(&mut self) -> Result<(), BackendError> {
        self.client
            .batch_execute("BEGIN")
            .await
            .map_err(|e| BackendError::Connection(message(&e)))
    }

    async fn execute(&mut self, sql: &str) -> Result<u64, BackendError> {
        self.client.execute(sql, &[]).await.map_err(backend_error)
    }

    async fn commit(&mut self) -> Result<(), BackendError> {
        self.client
            .batch_execute("COMMIT")
            .await
            .map_err(backend_error)
    }

    async fn rollback(&mut self) -> Result<(), BackendError> {
        self.client
            .batch_execute("ROLLBACK")
            .await
            .map_err(backend_error)
    }
}

#[async_trait]
impl ConnectionSource for PgConnectionSource {
    type Connection = PgConnection;

    async fn acquire(&self, table: &TableRef) -> Result<PgConnection, BackendError> {
        let client = self
            .connect(&table.database)
            .await
            .map_err(|e| BackendError::Connection(message(&e)))?;
        Ok(PgConnection { client })
    }
}

#[async_trait]
impl PageLoader for PgConnectionSource {
    async fn load_page(&self, request: &PageRequest) -> Result<TablePage, BatchError> {
        let client = self
            .connect(&request.table.database)
            .await
            .map_err(connection_error)?;
        let table = qualified_table(&request.table);

        let columns = client
            .query(COLUMNS_SQL, &[&table])
            .await
            .map_err(connection_error)?
            .iter()
            .map(|row| {
                let name: String = row.try_get(0)?;
                let declared: String = row.try_get(1)?;
                let mut column = ColumnDescriptor::new(name, declared);
                column.nullable = row.try_get(2)?;
                column.is_primary_key = row.try_get(3)?;
                let default: Option<String> = row.try_get(4)?;
                column.default = default
                    .as_deref()
                    .and_then(|expr| parse_default_literal(expr, &column.column_type()));
                Ok(column)
            })
            .collect::<Result<Vec<_>, tokio_postgres::Error>>()
            .map_err(connection_error)?;
        if columns.is_empty() {
            return Err(BatchError::validation(format!(
                "table {} does not exist",
                request.table
            )));
        }

        let count_sql = format!("SELECT count(*) FROM {table}");
        let total: i64 = client
            .query_one(count_sql.as_str(), &[])
            .await
            .and_then(|row| row.try_get(0))
            .map_err(connection_error)?;

        let select_list = columns
            .iter()
            .map(|c| quote_ident(&c.name))
            .collect::<Vec<_>>()
            .join(", ");
        let key = primary_key_columns(&columns)
            .into_iter()
            .map(quote_ident)
            .collect::<Vec<_>>()
            .join(", ");
        let order_clause = if key.is_empty() {
            String::new()
        } else {
            format!(" ORDER BY {key}")
        };
        let sql = format!(
            "SELECT {select_list} FROM {table}{order_clause} LIMIT {} OFFSET {}",
            request.page_size,
            page_offset(request)?
        );

        let types: Vec<ColumnType> = columns.iter().map(ColumnDescriptor::column_type).collect();
        let mut rows = Vec::new();
        for reply in client.simple_query(&sql).await.map_err(connection_error)? {
            let SimpleQueryMessage::Row(raw) = reply else {
                continue;
            };
            let mut row = Row::new();
            for (i, column) in columns.iter().enumerate() {
                let text = raw.try_get(i).map_err(connection_error)?;
                row.set(column.name.clone(), decode_text_value(&column.name, text, &types[i])?);
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
}

/// Database errors keep the server's own wording; everything else uses the
/// client error text.
fn message(err: &tokio_postgres::Error) -> String {
    match err.as_db_error() {
        Some(db) => db.to_string(),
        None => err.to_string(),
    }
}

fn backend_error(err: tokio_postgres::Error) -> BackendError {
    if err.is_closed() {
        BackendError::Connection(message(&err))
    } else {
        BackendError::Statement(message(&err))
    }
}

fn connection_error(err: tokio_postgres::Error) -> BatchError {
    BatchError::Connection {
        message: message(&err),
    }
}
