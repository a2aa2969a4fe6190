use gridbatch::catalog::types::{ColumnValues, Value};
use gridbatch::commit::{BatchRequest, RowUpdate, TransactionCoordinator};
use gridbatch::config::EngineConfig;
use gridbatch::{PageLoader, PageRequest, Row, SqliteSource, TableRef};

const SCHEMA: &str = r#"
    CREATE TABLE notes (
        id INTEGER PRIMARY KEY,
        body TEXT,
        "odd ""name""" TEXT,
        ratio REAL,
        qty INTEGER,
        flag BOOLEAN,
        created DATE
    );
"#;

async fn source() -> SqliteSource {
    let source = SqliteSource::open_in_memory().expect("open");
    source.run_script(SCHEMA).await.expect("schema");
    source
}

fn table() -> TableRef {
    TableRef::new("grid", "main", "notes")
}

fn note(id: i64, body: Value, ratio: Value, flag: Value) -> ColumnValues {
    ColumnValues::from([
        ("id".to_string(), Value::Integer(id)),
        ("body".to_string(), body),
        ("odd \"name\"".to_string(), Value::text("x")),
        ("ratio".to_string(), ratio),
        ("qty".to_string(), Value::Integer(-42)),
        ("flag".to_string(), flag),
        ("created".to_string(), Value::raw("2024-02-29")),
    ])
}

async fn load_row(source: &SqliteSource, id: i64) -> Row {
    let page = source
        .load_page(&PageRequest::new(table(), 1, 100))
        .await
        .expect("page");
    page.rows
        .into_iter()
        .find(|r| r.get("id") == Some(&Value::Integer(id)))
        .expect("row present")
}

#[tokio::test]
async fn awkward_text_survives_insert_and_update() {
    let source = source().await;
    let coordinator =
        TransactionCoordinator::new(source.clone(), EngineConfig::default()).expect("coordinator");

    let samples = [
        "O'Brien",
        "''",
        "'; DROP TABLE notes; --",
        "a,b",
        "back\\slash",
        "line\nbreak",
        "ünïcødé ✓",
        "",
    ];
    let mut insert = BatchRequest::for_table(&table());
    for (i, text) in samples.iter().enumerate() {
        insert.inserts.push(note(
            i as i64 + 1,
            Value::text(*text),
            Value::Null,
            Value::Null,
        ));
    }
    let result = coordinator.execute_batch(&insert).await;
    assert!(result.success, "{result:?}");
    assert_eq!(result.rows_affected, samples.len() as u64);

    for (i, text) in samples.iter().enumerate() {
        let row = load_row(&source, i as i64 + 1).await;
        assert_eq!(row.get("body"), Some(&Value::text(*text)));
        assert_eq!(row.get("odd \"name\""), Some(&Value::text("x")));
        assert_eq!(row.get("created"), Some(&Value::raw("2024-02-29")));
    }

    let mut update = BatchRequest::for_table(&table());
    update.updates.push(RowUpdate::new(
        ColumnValues::from([("id".to_string(), Value::Integer(1))]),
        ColumnValues::from([("body".to_string(), Value::text("it's \"quoted\""))]),
    ));
    assert!(coordinator.execute_batch(&update).await.success);
    assert_eq!(
        load_row(&source, 1).await.get("body"),
        Some(&Value::text("it's \"quoted\""))
    );
}

#[tokio::test]
async fn numbers_booleans_and_nulls_round_trip() {
    let source = source().await;
    let coordinator =
        TransactionCoordinator::new(source.clone(), EngineConfig::default()).expect("coordinator");

    let mut req = BatchRequest::for_table(&table());
    req.inserts.push(note(1, Value::Null, Value::Float(3.14), Value::Boolean(true)));
    req.inserts.push(note(2, Value::Null, Value::Float(-2.5), Value::Boolean(false)));
    req.inserts.push(note(3, Value::Null, Value::Float(3.0), Value::Null));
    req.inserts.push(note(4, Value::Null, Value::Float(1e-7), Value::Null));
    assert!(coordinator.execute_batch(&req).await.success);

    let expected = [
        (1, Value::Float(3.14), Value::Boolean(true)),
        (2, Value::Float(-2.5), Value::Boolean(false)),
        (3, Value::Float(3.0), Value::Null),
        (4, Value::Float(1e-7), Value::Null),
    ];
    for (id, ratio, flag) in expected {
        let row = load_row(&source, id).await;
        assert_eq!(row.get("ratio"), Some(&ratio), "ratio of row {id}");
        assert_eq!(row.get("flag"), Some(&flag), "flag of row {id}");
        assert_eq!(row.get("body"), Some(&Value::Null));
        assert_eq!(row.get("qty"), Some(&Value::Integer(-42)), "qty of row {id}");
    }

    let mut update = BatchRequest::for_table(&table());
    update.updates.push(RowUpdate::new(
        ColumnValues::from([("id".to_string(), Value::Integer(2))]),
        ColumnValues::from([("qty".to_string(), Value::Integer(-7))]),
    ));
    assert!(coordinator.execute_batch(&update).await.success);
    assert_eq!(
        load_row(&source, 2).await.get("qty"),
        Some(&Value::Integer(-7))
    );
}

#[tokio::test]
async fn non_finite_float_is_rejected_before_execution() {
    let source = source().await;
    let coordinator =
        TransactionCoordinator::new(source.clone(), EngineConfig::default()).expect("coordinator");

    let mut req = BatchRequest::for_table(&table());
    req.inserts.push(note(1, Value::Null, Value::Float(f64::NAN), Value::Null));
    let result = coordinator.execute_batch(&req).await;
    assert!(!result.success);
    assert_eq!(result.error_code.as_deref(), Some("validation"));
    assert_eq!(
        source
            .query_scalar("SELECT COUNT(*) FROM notes")
            .await
            .expect("count"),
        Value::Integer(0)
    );
}
