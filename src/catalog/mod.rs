pub mod schema;
pub mod types;

use crate::catalog::types::{ColumnType, ColumnValues, Row, Value};
use crate::error::BatchError;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use schema::{ColumnDescriptor, PageRequest, TablePage, TableRef};

/// Identity of an existing row: its projection onto the primary-key columns.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowKey(ColumnValues);

impl RowKey {
    pub fn from_row<'a>(row: &Row, primary_key: impl IntoIterator<Item = &'a str>) -> Self {
        Self(row.project(primary_key))
    }

    pub fn from_map(values: ColumnValues) -> Self {
        Self(values)
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(column)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &ColumnValues {
        &self.0
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (column, value)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{column}={value:?}")?;
        }
        Ok(())
    }
}

/// Decodes the text form of a database value (psql / simple-query output)
/// according to the column's classified type. `None` is SQL NULL.
pub fn decode_text_value(
    column: &str,
    text: Option<&str>,
    column_type: &ColumnType,
) -> Result<Value, BatchError> {
    let Some(text) = text else {
        return Ok(Value::Null);
    };
    let mismatch = || {
        BatchError::Decode(format!(
            "column '{column}': cannot decode {text:?} as {column_type:?}"
        ))
    };
    match column_type {
        ColumnType::Boolean => match text.trim().to_ascii_lowercase().as_str() {
            "t" | "true" | "1" | "yes" | "on" => Ok(Value::Boolean(true)),
            "f" | "false" | "0" | "no" | "off" => Ok(Value::Boolean(false)),
            _ => Err(mismatch()),
        },
        ColumnType::Integer => text
            .trim()
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|_| mismatch()),
        ColumnType::Float => text
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| mismatch()),
        ColumnType::Text => Ok(Value::text(text)),
        ColumnType::Other(_) => Ok(Value::raw(text)),
    }
}

/// Interprets a column default expression as reported by the catalog.
///
/// Only plain literals (optionally followed by a PostgreSQL `::type` cast)
/// yield a value; expressions such as `nextval(...)` or `now()` return `None`
/// and the grid falls back to null.
pub fn parse_default_literal(expr: &str, column_type: &ColumnType) -> Option<Value> {
    let mut expr = expr.trim();
    while expr.len() >= 2 && expr.starts_with('(') && expr.ends_with(')') {
        expr = expr[1..expr.len() - 1].trim();
    }
    if expr.is_empty() {
        return None;
    }

    if let Some(rest) = expr.strip_prefix('\'') {
        let (literal, tail) = split_quoted(rest)?;
        if !(tail.is_empty() || tail.starts_with("::")) {
            return None;
        }
        return typed_literal(&literal, column_type);
    }

    let bare = expr.split("::").next().unwrap_or(expr).trim();
    if bare.eq_ignore_ascii_case("null") {
        return Some(Value::Null);
    }
    let is_literal = bare.eq_ignore_ascii_case("true")
        || bare.eq_ignore_ascii_case("false")
        || bare.parse::<f64>().is_ok_and(f64::is_finite);
    if !is_literal {
        return None;
    }
    typed_literal(bare, column_type)
}

fn split_quoted(rest: &str) -> Option<(String, &str)> {
    let mut literal = String::new();
    let mut chars = rest.char_indices().peekable();
    while let Some((pos, ch)) = chars.next() {
        if ch == '\'' {
            if matches!(chars.peek(), Some((_, '\''))) {
                literal.push('\'');
                chars.next();
                continue;
            }
            return Some((literal, rest[pos + 1..].trim()));
        }
        literal.push(ch);
    }
    None
}

fn typed_literal(text: &str, column_type: &ColumnType) -> Option<Value> {
    match column_type {
        ColumnType::Boolean => match text.to_ascii_lowercase().as_str() {
            "t" | "true" | "1" => Some(Value::Boolean(true)),
            "f" | "false" | "0" => Some(Value::Boolean(false)),
            _ => None,
        },
        ColumnType::Integer => text.parse::<i64>().ok().map(Value::Integer),
        ColumnType::Float => text.parse::<f64>().ok().map(Value::Float),
        ColumnType::Text => Some(Value::text(text)),
        ColumnType::Other(_) => Some(Value::raw(text)),
    }
}
