use crate::catalog::types::{ColumnType, Row, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The single table a page and a batch target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableRef {
    pub database: String,
    pub schema: String,
    pub table: String,
}

impl TableRef {
    pub fn new(
        database: impl Into<String>,
        schema: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            database: database.into(),
            schema: schema.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.database, self.schema, self.table)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub declared_type: String,
    pub nullable: bool,
    pub is_primary_key: bool,
    /// Literal default applied to rows added in the grid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared_type: declared_type.into(),
            nullable: true,
            is_primary_key: false,
            default: None,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self.nullable = false;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn column_type(&self) -> ColumnType {
        ColumnType::from_declared(&self.declared_type)
    }

    /// Value a freshly added row starts with.
    pub fn initial_value(&self) -> Value {
        self.default.clone().unwrap_or(Value::Null)
    }
}

/// Page Loader request. Pages are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub table: TableRef,
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    pub fn new(table: TableRef, page: u32, page_size: u32) -> Self {
        Self {
            table,
            page: page.max(1),
            page_size: page_size.max(1),
        }
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }
}

/// One loaded page of a table together with its column metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TablePage {
    pub table: TableRef,
    pub columns: Vec<ColumnDescriptor>,
    pub rows: Vec<Row>,
    pub total_rows: u64,
    pub page: u32,
    pub page_size: u32,
}

impl TablePage {
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn primary_key_columns(&self) -> Vec<&str> {
        primary_key_columns(&self.columns)
    }

    pub fn page_count(&self) -> u32 {
        let size = u64::from(self.page_size.max(1));
        let pages = self.total_rows.div_ceil(size).max(1);
        u32::try_from(pages).unwrap_or(u32::MAX)
    }
}

pub(crate) fn primary_key_columns(columns: &[ColumnDescriptor]) -> Vec<&str> {
    columns
        .iter()
        .filter(|c| c.is_primary_key)
        .map(|c| c.name.as_str())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{ColumnDescriptor, PageRequest, TablePage, TableRef};

    #[test]
    fn page_request_is_one_based() {
        let req = PageRequest::new(TableRef::new("db", "public", "users"), 0, 50);
        assert_eq!(req.page, 1);
        assert_eq!(req.offset(), 0);
        assert_eq!(req.with_page(3).offset(), 100);
    }

    #[test]
    fn column_descriptor_wire_shape_matches_page_loader_contract() {
        let col = ColumnDescriptor::new("id", "integer").primary_key();
        let json = serde_json::to_value(&col).expect("encode");
        assert_eq!(
            json,
            serde_json::json!({
                "name": "id",
                "type": "integer",
                "nullable": false,
                "isPrimaryKey": true
            })
        );
    }

    #[test]
    fn page_count_rounds_up() {
        let page = TablePage {
            table: TableRef::new("db", "public", "users"),
            columns: vec![ColumnDescriptor::new("id", "integer").primary_key()],
            rows: Vec::new(),
            total_rows: 101,
            page: 1,
            page_size: 50,
        };
        assert_eq!(page.page_count(), 3);
        assert_eq!(page.primary_key_columns(), vec!["id"]);
    }
}
