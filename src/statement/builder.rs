use crate::catalog::TableRef;
use crate::catalog::types::ColumnValues;
use crate::commit::batch::RowUpdate;
use crate::error::BatchError;
use crate::statement::format::{qualified_table, quote_ident, write_value};

/// `UPDATE t SET c = v, ... WHERE pk1 = v AND pk2 = v`.
pub fn build_update(table: &TableRef, update: &RowUpdate) -> Result<String, BatchError> {
    if update.changes.is_empty() {
        return Err(BatchError::validation("no changed columns to update"));
    }
    if update.primary_key.is_empty() {
        return Err(BatchError::validation("primary key must not be empty"));
    }

    let mut sql = format!("UPDATE {} SET ", qualified_table(table));
    write_comparisons(&mut sql, &update.changes, ", ")?;
    sql.push_str(" WHERE ");
    write_comparisons(&mut sql, &update.primary_key, " AND ")?;
    Ok(sql)
}

/// One multi-row `INSERT` with an explicit column list. Every row must carry
/// exactly the same column set.
pub fn build_insert(table: &TableRef, rows: &[ColumnValues]) -> Result<String, BatchError> {
    let Some(first) = rows.first() else {
        return Err(BatchError::validation("no rows to insert"));
    };
    if first.is_empty() {
        return Err(BatchError::validation("insert row 1 has no columns"));
    }
    for (i, row) in rows.iter().enumerate().skip(1) {
        if !row.keys().eq(first.keys()) {
            return Err(BatchError::validation(format!(
                "insert row {} column set differs from row 1",
                i + 1
            )));
        }
    }

    let columns = first
        .keys()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    let mut sql = format!("INSERT INTO {} ({columns}) VALUES ", qualified_table(table));
    for (i, row) in rows.iter().enumerate() {
        if i > 0 {
            sql.push_str(", ");
        }
        sql.push('(');
        for (j, value) in row.values().enumerate() {
            if j > 0 {
                sql.push_str(", ");
            }
            write_value(&mut sql, value)?;
        }
        sql.push(')');
    }
    Ok(sql)
}

/// `DELETE FROM t WHERE pk1 = v AND pk2 = v` for one row identity.
pub fn build_delete(table: &TableRef, primary_key: &ColumnValues) -> Result<String, BatchError> {
    if primary_key.is_empty() {
        return Err(BatchError::validation("primary key must not be empty"));
    }
    let mut sql = format!("DELETE FROM {} WHERE ", qualified_table(table));
    write_comparisons(&mut sql, primary_key, " AND ")?;
    Ok(sql)
}

fn write_comparisons(
    sql: &mut String,
    values: &ColumnValues,
    separator: &str,
) -> Result<(), BatchError> {
    for (i, (column, value)) in values.iter().enumerate() {
        if i > 0 {
            sql.push_str(separator);
        }
        sql.push_str(&quote_ident(column));
        sql.push_str(" = ");
        write_value(sql, value)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{build_delete, build_insert, build_update};
    use crate::catalog::TableRef;
    use crate::catalog::types::{ColumnValues, Value};
    use crate::commit::batch::RowUpdate;
    use crate::error::BatchErrorCode;

    fn users() -> TableRef {
        TableRef::new("app", "public", "users")
    }

    fn values(pairs: &[(&str, Value)]) -> ColumnValues {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn update_sets_changes_and_and_combines_key() {
        let update = RowUpdate::new(
            values(&[("user_id", 1.into()), ("role_id", 2.into())]),
            values(&[("name", "Alice".into()), ("age", 30.into())]),
        );
        let sql = build_update(&users(), &update).unwrap();
        assert_eq!(
            sql,
            "UPDATE \"public\".\"users\" SET \"age\" = 30, \"name\" = 'Alice' \
             WHERE \"role_id\" = 2 AND \"user_id\" = 1"
        );
        assert!(!sql.contains(" OR "));
    }

    #[test]
    fn update_escapes_text_in_set_and_where() {
        let update = RowUpdate::new(
            values(&[("code", "x'y".into())]),
            values(&[("note", "it's".into()), ("deleted", Value::Null)]),
        );
        assert_eq!(
            build_update(&users(), &update).unwrap(),
            "UPDATE \"public\".\"users\" SET \"deleted\" = NULL, \"note\" = 'it''s' \
             WHERE \"code\" = 'x''y'"
        );
    }

    #[test]
    fn update_rejects_empty_changes_or_key() {
        let no_changes = RowUpdate::new(values(&[("id", 1.into())]), ColumnValues::new());
        let err = build_update(&users(), &no_changes).unwrap_err();
        assert_eq!(err.code(), BatchErrorCode::Validation);

        let no_key = RowUpdate::new(ColumnValues::new(), values(&[("name", "a".into())]));
        let err = build_update(&users(), &no_key).unwrap_err();
        assert_eq!(err.code(), BatchErrorCode::Validation);
    }

    #[test]
    fn insert_builds_one_multi_row_statement() {
        let rows = vec![
            values(&[("id", 1.into()), ("name", "a".into()), ("active", true.into())]),
            values(&[("id", 2.into()), ("name", Value::Null), ("active", false.into())]),
        ];
        assert_eq!(
            build_insert(&users(), &rows).unwrap(),
            "INSERT INTO \"public\".\"users\" (\"active\", \"id\", \"name\") \
             VALUES (true, 1, 'a'), (false, 2, NULL)"
        );
    }

    #[test]
    fn insert_rejects_empty_and_mismatched_rows() {
        let err = build_insert(&users(), &[]).unwrap_err();
        assert_eq!(err.code(), BatchErrorCode::Validation);

        let err = build_insert(&users(), &[ColumnValues::new()]).unwrap_err();
        assert_eq!(err.code(), BatchErrorCode::Validation);

        let rows = vec![
            values(&[("id", 1.into()), ("name", "a".into())]),
            values(&[("id", 2.into())]),
        ];
        let err = build_insert(&users(), &rows).unwrap_err();
        assert!(err.to_string().contains("row 2"));

        let rows = vec![
            values(&[("id", 1.into()), ("name", "a".into())]),
            values(&[("id", 2.into()), ("email", "b".into())]),
        ];
        assert!(build_insert(&users(), &rows).is_err());
    }

    #[test]
    fn delete_and_combines_composite_key() {
        let key = values(&[("user_id", 1.into()), ("role_id", 2.into())]);
        assert_eq!(
            build_delete(&TableRef::new("app", "public", "user_roles"), &key).unwrap(),
            "DELETE FROM \"public\".\"user_roles\" WHERE \"role_id\" = 2 AND \"user_id\" = 1"
        );
    }

    #[test]
    fn delete_rejects_empty_key() {
        let err = build_delete(&users(), &ColumnValues::new()).unwrap_err();
        assert_eq!(err.code(), BatchErrorCode::Validation);
    }

    #[test]
    fn non_finite_float_fails_the_build() {
        let update = RowUpdate::new(
            values(&[("id", 1.into())]),
            values(&[("score", Value::Float(f64::NAN))]),
        );
        assert!(build_update(&users(), &update).is_err());
    }
}
