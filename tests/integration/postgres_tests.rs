//! Integration tests for PostgresSession
//!
//! Each test that needs tables creates its own schema and drops it again,
//! so any empty database the test user can write to will do.

use pgexplorer::app::{App, StatusLevel};
use pgexplorer::config::{ConnectionProfile, PreferenceStore, SslMode};
use pgexplorer::db::types::{CellValue, DataType};
use pgexplorer::db::{Database, PostgresSession, QueryOutcome};
use pgexplorer::error::DbError;
use pgexplorer::runtime::Driver;
use pgexplorer::sql::QueryTemplate;
use pgexplorer::viz::ChartKind;
use std::sync::atomic::{AtomicUsize, Ordering};

static SCHEMA_SEQ: AtomicUsize = AtomicUsize::new(0);

/// Get test database connection profile
fn test_profile() -> ConnectionProfile {
    let mut profile = ConnectionProfile::new(
        &std::env::var("TEST_DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
        &std::env::var("TEST_DB_NAME").unwrap_or_else(|_| "test_db".to_string()),
        &std::env::var("TEST_DB_USER").unwrap_or_else(|_| "test_user".to_string()),
    );
    profile.port = std::env::var("TEST_DB_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(5433);
    profile.password = Some(
        std::env::var("TEST_DB_PASSWORD").unwrap_or_else(|_| "test_password".to_string()),
    );
    profile.ssl_mode = SslMode::Disable;
    profile
}

async fn connect_or_skip() -> Option<PostgresSession> {
    let profile = test_profile();
    match PostgresSession::connect(&profile).await {
        Ok(session) => Some(session),
        Err(e) => {
            eprintln!(
                "Skipping test: Database not available at {}:{} - {}",
                profile.host, profile.port, e
            );
            None
        }
    }
}

/// Create a throwaway schema with one populated table
async fn create_fixture(session: &PostgresSession) -> String {
    let schema = format!(
        "pgexplorer_it_{}_{}",
        std::process::id(),
        SCHEMA_SEQ.fetch_add(1, Ordering::SeqCst)
    );
    let sql = format!(
        "CREATE SCHEMA {s};
         CREATE TABLE {s}.orders (
             id integer PRIMARY KEY,
             region text NOT NULL,
             amount numeric(10,2),
             placed date
         );
         CREATE INDEX orders_region_idx ON {s}.orders (region, placed);
         INSERT INTO {s}.orders VALUES
             (1, 'north', 120.00, '2024-01-05'),
             (2, 'south', 80.50, '2024-01-09'),
             (3, 'north', NULL, '2024-02-11'),
             (4, 'east', 60.00, '2024-03-15');",
        s = schema
    );
    session
        .execute(&sql)
        .await
        .expect("fixture schema should be created");
    schema
}

async fn drop_fixture(session: &PostgresSession, schema: &str) {
    let _ = session
        .execute(&format!("DROP SCHEMA {} CASCADE", schema))
        .await;
}

#[tokio::test]
async fn test_select_one() {
    let Some(session) = connect_or_skip().await else {
        return;
    };
    let outcome = session.execute("SELECT 1").await.unwrap();
    let QueryOutcome::Rows(results) = outcome else {
        panic!("expected rows");
    };
    assert_eq!(results.columns.len(), 1);
    assert_eq!(results.rows.len(), 1);
    assert_eq!(results.rows[0].values[0], CellValue::Integer(1));
    session.close().await.unwrap();
}

#[tokio::test]
async fn test_execute_typed_values() {
    let Some(session) = connect_or_skip().await else {
        return;
    };
    let outcome = session
        .execute("SELECT 1 AS num, 'hello' AS msg, NULL::text AS nothing, DATE '2024-01-02' AS day")
        .await
        .unwrap();
    let QueryOutcome::Rows(results) = outcome else {
        panic!("expected rows");
    };
    assert_eq!(results.column_names(), ["num", "msg", "nothing", "day"]);
    let row = &results.rows[0];
    assert_eq!(row.values[0], CellValue::Integer(1));
    assert_eq!(row.values[1], CellValue::Text("hello".into()));
    assert_eq!(row.values[2], CellValue::Null);
    assert_eq!(row.values[3], CellValue::DateTime("2024-01-02".into()));
}

#[tokio::test]
async fn test_invalid_query_keeps_session_open() {
    let Some(session) = connect_or_skip().await else {
        return;
    };
    let err = session
        .execute("SELECT * FROM pgexplorer_no_such_table")
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::QueryFailed(_)));
    // Still usable
    assert!(session.execute("SELECT 1").await.is_ok());
}

#[tokio::test]
async fn test_connection_failure() {
    let mut profile = test_profile();
    profile.port = 1;
    let err = PostgresSession::connect(&profile).await.err();
    assert!(matches!(err, Some(DbError::ConnectionFailed(_))));
}

#[tokio::test]
async fn test_catalog_lookups() {
    let Some(session) = connect_or_skip().await else {
        return;
    };
    let schema = create_fixture(&session).await;

    let schemas = session.list_schemas().await.unwrap();
    assert!(schemas.contains(&schema));
    assert!(!schemas.iter().any(|s| s.starts_with("pg_") || s == "information_schema"));

    let tables = session.list_tables(&schema).await.unwrap();
    assert_eq!(tables, ["orders"]);

    let columns = session.list_columns(&schema, "orders").await.unwrap();
    let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["id", "region", "amount", "placed"]);
    assert!(!columns[0].nullable);
    assert!(columns[2].nullable);

    let indexes = session.list_indexes(&schema, "orders").await.unwrap();
    assert!(indexes.iter().any(|i| i.name == "orders_pkey" && i.column == "id"));
    let composite: Vec<&str> = indexes
        .iter()
        .filter(|i| i.name == "orders_region_idx")
        .map(|i| i.column.as_str())
        .collect();
    assert_eq!(composite, ["region", "placed"]);
    assert!(indexes.iter().all(|i| i.method == "btree"));

    drop_fixture(&session, &schema).await;
}

#[tokio::test]
async fn test_multi_statement_keeps_last_result() {
    let Some(session) = connect_or_skip().await else {
        return;
    };
    let outcome = session.execute("SELECT 1; SELECT 2 AS two").await.unwrap();
    let QueryOutcome::Rows(results) = outcome else {
        panic!("expected rows");
    };
    assert_eq!(results.columns[0].name, "two");
    assert!(matches!(results.columns[0].data_type, DataType::Unknown(_)));
    assert_eq!(results.rows[0].values[0], CellValue::Text("2".into()));
}

#[tokio::test]
async fn test_affected_rows() {
    let Some(session) = connect_or_skip().await else {
        return;
    };
    let schema = create_fixture(&session).await;
    let outcome = session
        .execute(&format!(
            "UPDATE {}.orders SET amount = 0 WHERE region = 'north'",
            schema
        ))
        .await
        .unwrap();
    assert!(matches!(outcome, QueryOutcome::Affected { count: 2, .. }));
    drop_fixture(&session, &schema).await;
}

#[tokio::test]
async fn test_shell_flow_against_server() {
    let Some(session) = connect_or_skip().await else {
        return;
    };
    let schema = create_fixture(&session).await;
    session.close().await.unwrap();

    let mut app = App::new(PreferenceStore::in_memory());
    let mut driver = Driver::<PostgresSession>::new();
    let action = app.connect(test_profile());
    driver.run(&mut app, action).await;
    assert!(app.is_connected());

    let action = app.expand_schema(&schema);
    driver.run(&mut app, action).await;
    let path = app.catalog.find_table(&schema, "orders").unwrap();
    let action = app.run_template(&path, QueryTemplate::Browse);
    driver.run(&mut app, action).await;
    assert_eq!(app.grid.status_text(), "4 rows, 4 columns");

    app.viz.select(Some("region"), Some("amount"), None);
    let spec = app.viz.spec_for(ChartKind::Bar);
    assert!(app.render_chart(&spec).is_some());

    let action = app.execute(&format!("DROP SCHEMA {} CASCADE", schema));
    driver.run(&mut app, action).await;
    assert_ne!(
        app.status_message.as_ref().map(|s| s.level),
        Some(StatusLevel::Error)
    );

    let action = app.disconnect();
    driver.run(&mut app, action).await;
    assert!(!app.is_connected());
}
