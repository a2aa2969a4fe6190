use gridbatch::catalog::types::Value;
use gridbatch::config::EngineConfig;
use gridbatch::session::{EditSession, SaveOutcome};
use gridbatch::tracker::{CellEditOutcome, RowId, RowStatus};
use gridbatch::{PageRequest, SqliteSource, TableRef};

const SCHEMA: &str = "
    CREATE TABLE tasks (
        id INTEGER PRIMARY KEY,
        title TEXT NOT NULL,
        done BOOLEAN NOT NULL DEFAULT 0,
        priority INTEGER DEFAULT 3
    );
    INSERT INTO tasks (id, title, done) VALUES
        (1, 'write', 0), (2, 'review', 1), (3, 'ship', 0), (4, 'rest', 0), (5, 'repeat', 0);
";

async fn session(page_size: u32) -> EditSession<SqliteSource> {
    let source = SqliteSource::open_in_memory().expect("open");
    source.run_script(SCHEMA).await.expect("schema");
    EditSession::open(
        source,
        EngineConfig::default(),
        PageRequest::new(TableRef::new("grid", "main", "tasks"), 1, page_size),
    )
    .await
    .expect("session")
}

fn row_with_title(session: &EditSession<SqliteSource>, title: &str) -> RowId {
    session
        .tracker()
        .rows()
        .find(|r| r.values.get("title") == Some(&Value::text(title)))
        .map(|r| r.id)
        .expect("row by title")
}

async fn count(session: &EditSession<SqliteSource>, sql: &str) -> Value {
    session.backend().query_scalar(sql).await.expect("scalar")
}

#[tokio::test]
async fn save_commits_every_kind_of_edit_and_reloads() {
    let mut session = session(10).await;
    let review = row_with_title(&session, "review");
    let ship = row_with_title(&session, "ship");

    let tracker = session.tracker_mut();
    assert_eq!(
        tracker.record_cell_change(&review, "done", false),
        CellEditOutcome::Changed
    );
    tracker.mark_rows_deleted([&ship]);
    let new_row = tracker.add_row();
    tracker.record_cell_change(&new_row, "title", "celebrate");
    let stats = tracker.compute_stats();
    assert_eq!((stats.updated, stats.inserted, stats.deleted), (1, 1, 1));

    let SaveOutcome::Committed(result) = session.save().await.expect("save") else {
        panic!("expected commit");
    };
    assert_eq!(result.rows_affected, 3);
    assert!(!session.tracker().has_pending());

    let titles: Vec<_> = session
        .tracker()
        .rows()
        .filter_map(|r| r.values.get("title").cloned())
        .collect();
    assert_eq!(titles.len(), 5);
    assert!(titles.contains(&Value::text("celebrate")));
    assert!(!titles.contains(&Value::text("ship")));

    let celebrate = row_with_title(&session, "celebrate");
    let reloaded = session.tracker().current_row(&celebrate).expect("reloaded");
    assert_eq!(reloaded.get("priority"), Some(&Value::Integer(3)));
    assert_eq!(reloaded.get("done"), Some(&Value::Boolean(false)));
    assert!(matches!(celebrate, RowId::Persisted(_)));
}

#[tokio::test]
async fn failed_save_keeps_edits_for_retry() {
    let mut session = session(10).await;
    let write = row_with_title(&session, "write");
    let rest = row_with_title(&session, "rest");

    session
        .tracker_mut()
        .record_cell_change(&write, "title", "write more");
    session
        .tracker_mut()
        .record_cell_change(&rest, "title", Value::Null);

    let SaveOutcome::Failed(result) = session.save().await.expect("save") else {
        panic!("expected failure");
    };
    assert!(!result.success);
    assert!(
        result
            .error
            .as_deref()
            .is_some_and(|e| e.contains("rolled back"))
    );
    assert_eq!(session.tracker().compute_stats().updated, 2);
    assert_eq!(
        count(&session, "SELECT COUNT(*) FROM tasks WHERE title = 'write more'").await,
        Value::Integer(0)
    );

    session
        .tracker_mut()
        .record_cell_change(&rest, "title", "rest well");
    assert!(matches!(
        session.save().await.expect("retry"),
        SaveOutcome::Committed(_)
    ));
    assert_eq!(
        count(
            &session,
            "SELECT COUNT(*) FROM tasks WHERE title IN ('write more', 'rest well')"
        )
        .await,
        Value::Integer(2)
    );
}

#[tokio::test]
async fn saving_nothing_is_a_no_op() {
    let mut session = session(10).await;
    let write = row_with_title(&session, "write");
    session.tracker_mut().record_cell_change(&write, "title", "x");
    session
        .tracker_mut()
        .record_cell_change(&write, "title", "write");
    assert_eq!(
        session.save().await.expect("save"),
        SaveOutcome::NothingPending
    );
}

#[tokio::test]
async fn paging_and_discard_reload_from_the_database() {
    let mut session = session(2).await;
    assert_eq!(session.tracker().rows().count(), 2);
    assert_eq!(session.tracker().total_rows(), 5);

    session.go_to_page(3).await.expect("page 3");
    let rows: Vec<_> = session.tracker().rows().collect();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].values.get("title"), Some(&Value::text("repeat")));
    assert_eq!(rows[0].status, RowStatus::Clean);

    let repeat = rows[0].id.clone();
    session.tracker_mut().mark_rows_deleted([&repeat]);
    session.discard().await.expect("discard");
    assert_eq!(session.tracker().row_status(&repeat), Some(RowStatus::Clean));
    assert_eq!(session.tracker().page(), 3);

    session.refresh().await.expect("refresh");
    assert_eq!(
        count(&session, "SELECT COUNT(*) FROM tasks").await,
        Value::Integer(5)
    );
}
