use crate::catalog::TableRef;
use crate::catalog::types::Value;
use crate::error::BatchError;
use std::fmt::Write;

/// Renders a value as an inline SQL literal.
///
/// Null, booleans and numbers are unquoted; text is single-quoted with every
/// embedded quote doubled and nothing else escaped. Raw values are pre-rendered
/// text and take the text path. Non-finite floats have no literal form and are
/// rejected.
pub fn format_value(value: &Value) -> Result<String, BatchError> {
    let mut out = String::new();
    write_value(&mut out, value)?;
    Ok(out)
}

pub(crate) fn write_value(out: &mut String, value: &Value) -> Result<(), BatchError> {
    match value {
        Value::Null => out.push_str("NULL"),
        Value::Boolean(true) => out.push_str("true"),
        Value::Boolean(false) => out.push_str("false"),
        Value::Integer(i) => {
            let _ = write!(out, "{i}");
        }
        Value::Float(f) => {
            if !f.is_finite() {
                return Err(BatchError::validation(format!(
                    "float value {f} has no SQL literal form"
                )));
            }
            let _ = write!(out, "{f}");
        }
        Value::Text(s) | Value::Raw(s) => write_quoted(out, s, '\''),
    }
    Ok(())
}

/// Double-quotes an identifier, doubling embedded double quotes.
pub fn quote_ident(ident: &str) -> String {
    let mut out = String::with_capacity(ident.len() + 2);
    write_quoted(&mut out, ident, '"');
    out
}

/// `"schema"."table"`; the database is chosen by the connection.
pub fn qualified_table(table: &TableRef) -> String {
    format!("{}.{}", quote_ident(&table.schema), quote_ident(&table.table))
}

fn write_quoted(out: &mut String, text: &str, quote: char) {
    out.reserve(text.len() + 2);
    out.push(quote);
    for ch in text.chars() {
        if ch == quote {
            out.push(quote);
        }
        out.push(ch);
    }
    out.push(quote);
}
