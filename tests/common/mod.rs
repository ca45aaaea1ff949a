//! Common test utilities and helpers
//!
//! An in-memory [`Database`] with a small fixed catalog, so the whole
//! shell can be driven without a server.

#![allow(dead_code)]

use pgexplorer::config::ConnectionProfile;
use pgexplorer::db::{
    CellValue, ColumnDef, ColumnInfo, DataType, Database, IndexInfo, QueryOutcome, QueryResults,
    Row,
};
use pgexplorer::error::{DbError, DbResult};
use std::sync::Mutex;
use std::time::Duration;

/// Host name the mock refuses to connect to
pub const UNREACHABLE_HOST: &str = "unreachable.invalid";

/// Database name whose sessions fail to close cleanly
pub const FLAKY_DB: &str = "flaky";

/// Database name whose background connection dies right after connecting
pub const DOOMED_DB: &str = "doomed";

pub struct MockDatabase {
    profile: ConnectionProfile,
    /// Every statement passed to `execute`, in order
    pub executed: Mutex<Vec<String>>,
    /// Queued background connection failure
    pub connection_error: Option<String>,
}

pub fn profile() -> ConnectionProfile {
    let mut p = ConnectionProfile::new("mock", "shop", "tester");
    p.password = Some("hunter2".into());
    p
}

fn column(name: &str, data_type: &str, nullable: bool) -> ColumnInfo {
    ColumnInfo {
        name: name.into(),
        data_type: data_type.into(),
        nullable,
    }
}

fn text(s: &str) -> CellValue {
    CellValue::Text(s.into())
}

fn date(s: &str) -> CellValue {
    CellValue::DateTime(s.into())
}

/// `public.orders` as the mock returns it
pub fn orders() -> QueryResults {
    let columns = vec![
        ColumnDef::new("id", DataType::Integer),
        ColumnDef::new("region", DataType::Text),
        ColumnDef::new("amount", DataType::Double),
        ColumnDef::new("placed", DataType::Date),
    ];
    let data = [
        (1, "north", Some(120.0), "2024-01-05"),
        (2, "south", Some(80.5), "2024-01-09"),
        (3, "north", Some(99.0), "2024-02-11"),
        (4, "east", None, "2024-02-20"),
        (5, "south", Some(150.25), "2024-03-02"),
        (6, "east", Some(60.0), "2024-03-15"),
    ];
    let rows = data
        .iter()
        .map(|(id, region, amount, placed)| {
            Row::new(vec![
                CellValue::Integer(*id),
                text(region),
                amount.map(CellValue::Float).unwrap_or(CellValue::Null),
                date(placed),
            ])
        })
        .collect::<Vec<_>>();
    let count = rows.len();
    QueryResults::new(columns, rows, Duration::from_millis(2), count)
}

fn single(name: &str, data_type: DataType, value: CellValue) -> QueryOutcome {
    QueryOutcome::Rows(QueryResults::new(
        vec![ColumnDef::new(name, data_type)],
        vec![Row::new(vec![value])],
        Duration::from_millis(1),
        1,
    ))
}

impl Database for MockDatabase {
    async fn connect(profile: &ConnectionProfile) -> DbResult<Self> {
        if profile.host == UNREACHABLE_HOST {
            return Err(DbError::ConnectionFailed(format!(
                "could not translate host name \"{}\"",
                profile.host
            )));
        }
        Ok(Self {
            profile: profile.clone(),
            executed: Mutex::new(Vec::new()),
            connection_error: (profile.dbname == DOOMED_DB)
                .then(|| "Connection lost: server closed the connection unexpectedly".to_string()),
        })
    }

    async fn close(self) -> DbResult<()> {
        if self.profile.dbname == FLAKY_DB {
            return Err(DbError::CloseFailed("connection reset by peer".into()));
        }
        Ok(())
    }

    async fn execute(&self, sql: &str) -> DbResult<QueryOutcome> {
        if let Ok(mut log) = self.executed.lock() {
            log.push(sql.to_string());
        }
        let upper = sql.trim().to_ascii_uppercase();
        if upper == "SELECT 1" {
            return Ok(single("?column?", DataType::Integer, CellValue::Integer(1)));
        }
        if upper.starts_with("SELECT COUNT(*) FROM PUBLIC.ORDERS") {
            return Ok(single("count", DataType::BigInt, CellValue::Integer(6)));
        }
        if upper.starts_with("SELECT * FROM PUBLIC.ORDERS") {
            return Ok(QueryOutcome::Rows(orders()));
        }
        if upper.starts_with("UPDATE") || upper.starts_with("DELETE") {
            return Ok(QueryOutcome::Affected {
                count: 3,
                execution_time: Duration::from_millis(1),
            });
        }
        Err(DbError::QueryFailed(format!(
            "syntax error at or near \"{}\"",
            sql.split_whitespace().next().unwrap_or_default()
        )))
    }

    async fn list_schemas(&self) -> DbResult<Vec<String>> {
        Ok(vec!["public".into(), "sales".into()])
    }

    async fn list_tables(&self, schema: &str) -> DbResult<Vec<String>> {
        match schema {
            "public" => Ok(vec!["customers".into(), "orders".into()]),
            "sales" => Ok(vec![]),
            other => Err(DbError::CatalogLoadFailed {
                target: format!("tables for schema '{}'", other),
                message: "permission denied".into(),
            }),
        }
    }

    async fn list_columns(&self, schema: &str, table: &str) -> DbResult<Vec<ColumnInfo>> {
        match (schema, table) {
            ("public", "orders") => Ok(vec![
                column("id", "integer", false),
                column("region", "text", true),
                column("amount", "double precision", true),
                column("placed", "date", true),
            ]),
            ("public", "customers") => Ok(vec![
                column("id", "integer", false),
                column("Full Name", "character varying", true),
            ]),
            _ => Err(DbError::CatalogLoadFailed {
                target: format!("columns for table '{}.{}'", schema, table),
                message: "relation does not exist".into(),
            }),
        }
    }

    async fn list_indexes(&self, schema: &str, table: &str) -> DbResult<Vec<IndexInfo>> {
        match (schema, table) {
            ("public", "orders") => Ok(vec![
                IndexInfo {
                    name: "orders_pkey".into(),
                    column: "id".into(),
                    method: "btree".into(),
                },
                IndexInfo {
                    name: "orders_region_placed_idx".into(),
                    column: "region".into(),
                    method: "btree".into(),
                },
                IndexInfo {
                    name: "orders_region_placed_idx".into(),
                    column: "placed".into(),
                    method: "btree".into(),
                },
            ]),
            _ => Ok(vec![]),
        }
    }

    fn take_connection_error(&mut self) -> Option<String> {
        self.connection_error.take()
    }
}
