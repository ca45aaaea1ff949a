//! End-to-end shell flows against the in-memory database
//!
//! connect → browse the catalog → run queries → grid, copy, CSV and charts,
//! all through the same `Driver` the binary uses.

mod common;

use clap::Parser;
use common::{DOOMED_DB, FLAKY_DB, MockDatabase, UNREACHABLE_HOST, profile};
use pgexplorer::app::{App, StatusLevel};
use pgexplorer::cli::{self, Cli};
use pgexplorer::config::PreferenceStore;
use pgexplorer::db::LoadRequest;
use pgexplorer::runtime::Driver;
use pgexplorer::sql::QueryTemplate;
use pgexplorer::viz::{ChartKind, ChartSpec};
use tempfile::TempDir;
use tokio_test::block_on;

fn setup() -> (App, Driver<MockDatabase>) {
    (App::new(PreferenceStore::in_memory()), Driver::new())
}

fn connect(app: &mut App, driver: &mut Driver<MockDatabase>) {
    let action = app.connect(profile());
    block_on(driver.run(app, action));
    assert!(app.is_connected(), "{:?}", app.status_message);
}

fn status(app: &App) -> (StatusLevel, String) {
    let s = app.status_message.as_ref().expect("status set");
    (s.level, s.message.clone())
}

#[test]
fn test_connect_loads_schemas_and_remembers_profile() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");
    let mut app = App::new(PreferenceStore::load_from(path.clone()));
    let mut driver = Driver::<MockDatabase>::new();

    connect(&mut app, &mut driver);
    assert!(driver.is_connected());
    assert_eq!(app.catalog.roots.len(), 2);

    // Persisted without the password
    let stored = PreferenceStore::load_from(path);
    let recent = stored.recent_connections();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].dbname, "shop");
    assert_eq!(recent[0].password, None);
    let raw = std::fs::read_to_string(dir.path().join("config.json")).unwrap();
    assert!(!raw.contains("hunter2"));
}

#[test]
fn test_failed_connect_has_no_session() {
    let (mut app, mut driver) = setup();
    let mut bad = profile();
    bad.host = UNREACHABLE_HOST.into();
    let action = app.connect(bad);
    block_on(driver.run(&mut app, action));

    assert!(!app.is_connected());
    assert!(!driver.is_connected());
    assert!(app.preferences().recent_connections().is_empty());
    let (level, message) = status(&app);
    assert_eq!(level, StatusLevel::Error);
    assert!(message.starts_with("Could not connect to database."));
}

#[test]
fn test_second_session_rejected() {
    let (mut app, mut driver) = setup();
    connect(&mut app, &mut driver);
    let action = app.connect(profile());
    block_on(driver.run(&mut app, action));
    let (level, message) = status(&app);
    assert_eq!(level, StatusLevel::Error);
    assert!(message.contains("Already connected"));
    assert!(driver.is_connected());
}

#[test]
fn test_lazy_catalog_and_browse() {
    let (mut app, mut driver) = setup();
    connect(&mut app, &mut driver);

    let action = app.expand(&[0]);
    assert_eq!(
        action,
        pgexplorer::app::Action::LoadChildren(LoadRequest::Tables {
            schema: "public".into()
        })
    );
    block_on(driver.run(&mut app, action));
    let action = app.expand_table("public", "orders");
    block_on(driver.run(&mut app, action));

    let lines = app.catalog.lines();
    assert_eq!(lines[0], "v public");
    assert!(lines.iter().any(|l| l.ends_with("amount (double precision, Nullable: YES)")));

    // Empty schema renders a placeholder
    let action = app.expand_schema("sales");
    block_on(driver.run(&mut app, action));
    assert!(app.catalog.lines().iter().any(|l| l.ends_with("No tables")));

    let path = app.catalog.find_table("public", "orders").unwrap();
    let action = app.run_template(&path, QueryTemplate::Browse);
    block_on(driver.run(&mut app, action));

    assert_eq!(app.grid.status_text(), "6 rows, 4 columns");
    let executed = driver.session().unwrap().executed.lock().unwrap().clone();
    assert_eq!(executed, ["SELECT * FROM public.orders LIMIT 100;"]);
    assert_eq!(app.history(), ["SELECT * FROM public.orders LIMIT 100;"]);
}

#[test]
fn test_generated_column_queries_are_quoted() {
    let (mut app, mut driver) = setup();
    connect(&mut app, &mut driver);
    let action = app.expand_schema("public");
    block_on(driver.run(&mut app, action));
    let action = app.expand_table("public", "customers");
    block_on(driver.run(&mut app, action));

    let path = app.catalog.find_column("public", "customers", "Full Name").unwrap();
    let action = app.run_template(&path, QueryTemplate::SelectDistinct);
    assert_eq!(
        action,
        pgexplorer::app::Action::ExecuteQuery {
            sql: "SELECT DISTINCT \"Full Name\" FROM public.customers LIMIT 100;".into()
        }
    );
}

#[test]
fn test_catalog_failure_allows_retry() {
    let (mut app, mut driver) = setup();
    connect(&mut app, &mut driver);
    let action = app.expand_schema("public");
    block_on(driver.run(&mut app, action));

    // A table the mock has no columns for
    app.handle_event(pgexplorer::app::AppEvent::TablesLoaded {
        schema: "public".into(),
        tables: vec!["ghost".into()],
    });
    let action = app.expand_table("public", "ghost");
    block_on(driver.run(&mut app, action));
    assert_eq!(status(&app).0, StatusLevel::Error);
    let path = app.catalog.find_table("public", "ghost").unwrap();
    let node = app.catalog.node(&path).unwrap();
    assert!(node.is_pending());
    assert!(!node.expanded);
}

#[test]
fn test_query_results_feed_grid_copy_and_chart() {
    let (mut app, mut driver) = setup();
    connect(&mut app, &mut driver);
    let action = app.execute("SELECT * FROM public.orders");
    block_on(driver.run(&mut app, action));

    // NULL shows as NULL but copies as an empty field
    assert_eq!(app.grid.cell(3, 2).unwrap().display, "NULL");
    app.grid.selection.select_rect(3, 0, 3, 2);
    assert_eq!(app.grid.copy_selection().unwrap(), "4\teast\t");

    // region is categorical, placed a date
    let kinds = app.viz.column_kinds();
    assert_eq!(kinds[1].1, pgexplorer::viz::ColumnKind::Categorical);
    assert_eq!(kinds[3].1, pgexplorer::viz::ColumnKind::Date);

    app.viz.select(None, Some("amount"), None);
    let spec = app.viz.spec_for(ChartKind::Bar);
    let image = app.render_chart(&spec).expect("bar chart");
    assert!(image.svg.contains("<svg"));
    assert!(image.svg.contains("amount by region"));

    let spec = app.viz.spec_for(ChartKind::Heatmap);
    assert!(app.render_chart(&spec).is_some());

    let pie = ChartSpec::from_json(
        r#"{"kind":"pie","x_column":"region","y_column":"amount","labels":"both"}"#,
    )
    .unwrap();
    assert!(app.render_chart(&pie).is_some());
}

#[test]
fn test_failed_query_keeps_session_and_grid() {
    let (mut app, mut driver) = setup();
    connect(&mut app, &mut driver);
    let action = app.execute("SELECT 1");
    block_on(driver.run(&mut app, action));
    assert_eq!(app.grid.status_text(), "1 rows, 1 columns");

    let action = app.execute("SELEC oops");
    block_on(driver.run(&mut app, action));
    let (level, message) = status(&app);
    assert_eq!(level, StatusLevel::Error);
    assert!(message.contains("syntax error"));
    assert!(driver.is_connected());
    assert_eq!(app.grid.status_text(), "1 rows, 1 columns");
}

#[test]
fn test_statement_without_rows_reports_count() {
    let (mut app, mut driver) = setup();
    connect(&mut app, &mut driver);
    let action = app.execute("UPDATE orders SET amount = 0 WHERE region = 'east'");
    block_on(driver.run(&mut app, action));
    assert!(status(&app).1.contains("3 rows affected"));
    assert!(app.grid.is_empty());
}

#[test]
fn test_disconnect_clears_session_even_on_error() {
    let (mut app, mut driver) = setup();
    let mut flaky = profile();
    flaky.dbname = FLAKY_DB.into();
    let action = app.connect(flaky);
    block_on(driver.run(&mut app, action));
    assert!(app.is_connected());

    let action = app.disconnect();
    block_on(driver.run(&mut app, action));
    assert!(!app.is_connected());
    assert!(!driver.is_connected());
    assert_eq!(status(&app).0, StatusLevel::Warning);

    // A fresh session can be opened afterwards
    connect(&mut app, &mut driver);
}

#[test]
fn test_connection_lost_is_reported() {
    let (mut app, mut driver) = setup();
    let mut doomed = profile();
    doomed.dbname = DOOMED_DB.into();
    let action = app.connect(doomed);
    block_on(driver.run(&mut app, action));

    // The loss is noticed before the schema list is requested
    assert!(!driver.is_connected());
    assert!(!app.is_connected());
    let (level, message) = status(&app);
    assert_eq!(level, StatusLevel::Error);
    assert!(message.contains("server closed the connection"));

    // Reconnecting works
    connect(&mut app, &mut driver);
}

#[test]
fn test_query_abandoned_when_connection_drops() {
    let (mut app, mut driver) = setup();
    let mut doomed = profile();
    doomed.dbname = DOOMED_DB.into();
    let action = app.connect(doomed);
    let event = block_on(driver.perform(action)).unwrap();
    app.handle_event(event);
    assert!(app.is_connected());

    let action = app.execute("SELECT 1");
    block_on(driver.run(&mut app, action));

    assert!(!driver.is_connected());
    assert!(!app.is_connected());
    let (level, message) = status(&app);
    assert_eq!(level, StatusLevel::Error);
    assert!(message.contains("server closed the connection"));
    assert!(message.ends_with("query not sent"));
}

#[test]
fn test_history_survives_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");
    {
        let mut app = App::new(PreferenceStore::load_from(path.clone()));
        let mut driver = Driver::<MockDatabase>::new();
        connect(&mut app, &mut driver);
        for sql in ["SELECT 1", "SELECT * FROM public.orders", "SELECT 1"] {
            let action = app.execute(sql);
            block_on(driver.run(&mut app, action));
        }
    }
    let app = App::new(PreferenceStore::load_from(path));
    assert_eq!(app.history(), ["SELECT 1", "SELECT * FROM public.orders"]);
}

#[test]
fn test_cli_query_writes_table_csv_and_chart() {
    let dir = TempDir::new().unwrap();
    let csv = dir.path().join("orders.csv");
    let svg = dir.path().join("orders.svg");
    let cli = Cli::try_parse_from([
        "pgexplorer",
        "--host",
        "mock",
        "--url",
        "postgres://tester@mock/shop",
        "query",
        "SELECT * FROM public.orders",
        "--csv",
        csv.to_str().unwrap(),
        "--chart",
        "line",
        "--x",
        "placed",
        "--y",
        "amount",
        "--out",
        svg.to_str().unwrap(),
    ])
    .unwrap();

    let (mut app, mut driver) = setup();
    let mut out = Vec::new();
    block_on(cli::run(&cli, &mut app, &mut driver, &mut out, false)).unwrap();

    let printed = String::from_utf8(out).unwrap();
    assert!(printed.starts_with("id"));
    assert!(printed.contains("(6 rows, 4 columns)"));

    let written = std::fs::read_to_string(&csv).unwrap();
    let mut lines = written.lines();
    assert_eq!(lines.next(), Some("id,region,amount,placed"));
    assert!(written.contains("4,east,,2024-02-20"));

    let chart = std::fs::read_to_string(&svg).unwrap();
    assert!(chart.contains("<svg"));

    // The command disconnects when done
    assert!(!driver.is_connected());
    assert!(!app.is_connected());
}

#[test]
fn test_cli_tree_and_indexes() {
    let (mut app, mut driver) = setup();
    let cli = Cli::try_parse_from([
        "pgexplorer",
        "--url",
        "postgres://tester@mock/shop",
        "tree",
        "--expand",
        "public.orders",
    ])
    .unwrap();
    let mut out = Vec::new();
    block_on(cli::run(&cli, &mut app, &mut driver, &mut out, false)).unwrap();
    let printed = String::from_utf8(out).unwrap();
    assert!(printed.contains("v public"));
    assert!(printed.contains("v orders"));
    assert!(printed.contains("id (integer, Nullable: NO)"));
    assert!(printed.contains("> sales"));

    let cli = Cli::try_parse_from([
        "pgexplorer",
        "--url",
        "postgres://tester@mock/shop",
        "indexes",
        "public",
        "orders",
    ])
    .unwrap();
    let mut out = Vec::new();
    block_on(cli::run(&cli, &mut app, &mut driver, &mut out, false)).unwrap();
    let printed = String::from_utf8(out).unwrap();
    assert_eq!(printed.lines().count(), 3);
    assert!(printed.starts_with("orders_pkey\tid\tbtree"));
}

#[test]
fn test_cli_failed_query_is_an_error() {
    let (mut app, mut driver) = setup();
    let cli = Cli::try_parse_from([
        "pgexplorer",
        "--url",
        "postgres://tester@mock/shop",
        "query",
        "SELEC 1",
    ])
    .unwrap();
    let mut out = Vec::new();
    let err = block_on(cli::run(&cli, &mut app, &mut driver, &mut out, false)).unwrap_err();
    assert!(err.to_string().contains("syntax error"));
    assert!(!driver.is_connected());
}

#[test]
fn test_cli_sample_needs_column_for_distinct() {
    let (mut app, mut driver) = setup();
    let cli = Cli::try_parse_from([
        "pgexplorer",
        "--url",
        "postgres://tester@mock/shop",
        "sample",
        "public",
        "orders",
        "--template",
        "distinct",
    ])
    .unwrap();
    let mut out = Vec::new();
    let err = block_on(cli::run(&cli, &mut app, &mut driver, &mut out, false)).unwrap_err();
    assert!(err.to_string().contains("--column"));
}
