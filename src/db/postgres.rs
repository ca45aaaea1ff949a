//! PostgreSQL session
//!
//! Concrete implementation using tokio-postgres.

use crate::config::{CONNECT_TIMEOUT, ConnectionProfile, SslMode};
use crate::db::Database;
use crate::db::schema::{ColumnInfo, IndexInfo};
use crate::db::types::{CellValue, ColumnDef, DataType, QueryOutcome, QueryResults, Row};
use crate::error::{DbError, DbResult};
use rust_decimal::Decimal;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_postgres::error::SqlState;
use tokio_postgres::types::Type;
use tokio_postgres::{Client, SimpleQueryMessage};

const SCHEMAS_SQL: &str = "SELECT schema_name::text \
     FROM information_schema.schemata \
     WHERE schema_name NOT LIKE 'pg_%' \
     AND schema_name <> 'information_schema' \
     ORDER BY schema_name";

const TABLES_SQL: &str = "SELECT table_name::text \
     FROM information_schema.tables \
     WHERE table_schema::text = $1 \
     AND table_type = 'BASE TABLE' \
     ORDER BY table_name";

const COLUMNS_SQL: &str = "SELECT column_name::text, data_type::text, is_nullable::text \
     FROM information_schema.columns \
     WHERE table_schema::text = $1 AND table_name::text = $2 \
     ORDER BY ordinal_position";

const INDEXES_SQL: &str = "SELECT i.relname::text, a.attname::text, am.amname::text \
     FROM pg_index ix \
     JOIN pg_class t ON t.oid = ix.indrelid \
     JOIN pg_class i ON i.oid = ix.indexrelid \
     JOIN pg_am am ON am.oid = i.relam \
     JOIN pg_namespace n ON n.oid = t.relnamespace \
     JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = ANY(ix.indkey) \
     WHERE t.relkind = 'r' \
     AND n.nspname = $1 AND t.relname = $2 \
     ORDER BY i.relname, array_position(ix.indkey::int2[], a.attnum)";

/// An open PostgreSQL session
pub struct PostgresSession {
    /// The tokio-postgres client
    client: Client,
    /// Fires if the background connection task dies
    conn_err_rx: mpsc::UnboundedReceiver<String>,
}

impl Database for PostgresSession {
    async fn connect(profile: &ConnectionProfile) -> DbResult<Self> {
        tracing::info!(target_db = %profile.display_name(), ssl_mode = ?profile.ssl_mode, "Connecting");
        match tokio::time::timeout(CONNECT_TIMEOUT, open(profile)).await {
            Ok(Ok(session)) => {
                tracing::info!(target_db = %profile.display_name(), "Connected");
                Ok(session)
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Connection failed");
                Err(e)
            }
            Err(_) => {
                tracing::warn!("Connection attempt timed out");
                Err(DbError::ConnectionFailed(format!(
                    "timeout expired after {} seconds",
                    CONNECT_TIMEOUT.as_secs()
                )))
            }
        }
    }

    async fn close(self) -> DbResult<()> {
        // Dropping the client ends the connection task
        drop(self.client);
        tracing::info!("Disconnected");
        Ok(())
    }

    async fn execute(&self, sql: &str) -> DbResult<QueryOutcome> {
        tracing::debug!(sql, "Executing query");
        let start = Instant::now();

        let stmt = match self.client.prepare(sql).await {
            Ok(stmt) => stmt,
            Err(e) if is_multi_statement(&e) => return self.execute_simple(sql, start).await,
            Err(e) => return Err(query_failed(&e)),
        };

        if stmt.columns().is_empty() {
            let count = self
                .client
                .execute(&stmt, &[])
                .await
                .map_err(|e| query_failed(&e))?;
            return Ok(QueryOutcome::Affected {
                count,
                execution_time: start.elapsed(),
            });
        }

        let columns: Vec<ColumnDef> = stmt
            .columns()
            .iter()
            .map(|col| ColumnDef {
                name: col.name().to_string(),
                data_type: pg_type_to_datatype(col.type_()),
                nullable: true,
            })
            .collect();

        let pg_rows = self
            .client
            .query(&stmt, &[])
            .await
            .map_err(|e| query_failed(&e))?;

        let row_count = pg_rows.len();
        let mut rows = Vec::with_capacity(row_count);

        for pg_row in &pg_rows {
            let mut values = Vec::with_capacity(columns.len());
            for (i, col_def) in columns.iter().enumerate() {
                values.push(extract_cell_value(pg_row, i, &col_def.data_type));
            }
            rows.push(Row { values });
        }

        let elapsed = start.elapsed();
        tracing::info!(rows = row_count, elapsed_ms = elapsed.as_millis() as u64, "Query finished");
        Ok(QueryOutcome::Rows(QueryResults::new(
            columns, rows, elapsed, row_count,
        )))
    }

    async fn list_schemas(&self) -> DbResult<Vec<String>> {
        let rows = self
            .client
            .query(SCHEMAS_SQL, &[])
            .await
            .map_err(|e| catalog_failed("schemas", &e))?;
        Ok(rows.iter().map(|r| r.get(0)).collect())
    }

    async fn list_tables(&self, schema: &str) -> DbResult<Vec<String>> {
        let rows = self
            .client
            .query(TABLES_SQL, &[&schema])
            .await
            .map_err(|e| catalog_failed(&format!("tables for schema '{}'", schema), &e))?;
        Ok(rows.iter().map(|r| r.get(0)).collect())
    }

    async fn list_columns(&self, schema: &str, table: &str) -> DbResult<Vec<ColumnInfo>> {
        let rows = self
            .client
            .query(COLUMNS_SQL, &[&schema, &table])
            .await
            .map_err(|e| {
                catalog_failed(&format!("columns for table '{}.{}'", schema, table), &e)
            })?;
        Ok(rows
            .iter()
            .map(|r| {
                let nullable: String = r.get(2);
                ColumnInfo {
                    name: r.get(0),
                    data_type: r.get(1),
                    nullable: nullable == "YES",
                }
            })
            .collect())
    }

    async fn list_indexes(&self, schema: &str, table: &str) -> DbResult<Vec<IndexInfo>> {
        let rows = self
            .client
            .query(INDEXES_SQL, &[&schema, &table])
            .await
            .map_err(|e| {
                catalog_failed(&format!("indexes for table '{}.{}'", schema, table), &e)
            })?;
        Ok(rows
            .iter()
            .map(|r| IndexInfo {
                name: r.get(0),
                column: r.get(1),
                method: r.get(2),
            })
            .collect())
    }

    fn take_connection_error(&mut self) -> Option<String> {
        self.conn_err_rx.try_recv().ok()
    }
}

impl PostgresSession {
    /// Multi-statement text cannot be prepared; run it through the simple
    /// query protocol and keep the last statement's outcome. Values arrive
    /// as text.
    async fn execute_simple(&self, sql: &str, start: Instant) -> DbResult<QueryOutcome> {
        tracing::debug!("Falling back to simple query protocol");
        let messages = self
            .client
            .simple_query(sql)
            .await
            .map_err(|e| query_failed(&e))?;

        let mut last: Option<(Option<Vec<ColumnDef>>, Vec<Row>, u64)> = None;
        let mut columns: Option<Vec<ColumnDef>> = None;
        let mut rows: Vec<Row> = Vec::new();

        for message in messages {
            match message {
                SimpleQueryMessage::RowDescription(cols) => {
                    columns = Some(
                        cols.iter()
                            .map(|c| untyped_column(c.name()))
                            .collect(),
                    );
                }
                SimpleQueryMessage::Row(row) => {
                    if columns.is_none() {
                        columns = Some(
                            row.columns()
                                .iter()
                                .map(|c| untyped_column(c.name()))
                                .collect(),
                        );
                    }
                    let values = (0..row.len())
                        .map(|i| match row.get(i) {
                            Some(text) => CellValue::Text(text.to_string()),
                            None => CellValue::Null,
                        })
                        .collect();
                    rows.push(Row { values });
                }
                SimpleQueryMessage::CommandComplete(count) => {
                    last = Some((columns.take(), std::mem::take(&mut rows), count));
                }
                _ => {}
            }
        }

        let execution_time = start.elapsed();
        Ok(match last {
            Some((Some(columns), rows, _)) => {
                let row_count = rows.len();
                QueryOutcome::Rows(QueryResults::new(columns, rows, execution_time, row_count))
            }
            Some((None, _, count)) => QueryOutcome::Affected {
                count,
                execution_time,
            },
            None => QueryOutcome::Affected {
                count: 0,
                execution_time,
            },
        })
    }
}

/// Connect without the time bound; the caller applies it
async fn open(profile: &ConnectionProfile) -> DbResult<PostgresSession> {
    let config = profile.pg_config();
    let (conn_err_tx, conn_err_rx) = mpsc::unbounded_channel();

    let client = match profile.ssl_mode {
        SslMode::Disable => {
            let (client, connection) = config
                .connect(tokio_postgres::NoTls)
                .await
                .map_err(|e| DbError::ConnectionFailed(error_message(&e)))?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    let _ = conn_err_tx.send(format!("Connection lost: {}", e));
                }
            });
            client
        }
        SslMode::Prefer | SslMode::Require => {
            let tls = tokio_postgres_rustls::MakeRustlsConnect::new(make_tls_config());
            let (client, connection) = config
                .connect(tls)
                .await
                .map_err(|e| DbError::ConnectionFailed(error_message(&e)))?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    let _ = conn_err_tx.send(format!("Connection lost: {}", e));
                }
            });
            client
        }
    };

    Ok(PostgresSession {
        client,
        conn_err_rx,
    })
}

fn is_multi_statement(e: &tokio_postgres::Error) -> bool {
    e.as_db_error().is_some_and(|db| {
        *db.code() == SqlState::SYNTAX_ERROR && db.message().contains("multiple commands")
    })
}

/// Server errors read better as "ERROR: message" than the driver's "db error" prefix
fn error_message(e: &tokio_postgres::Error) -> String {
    match e.as_db_error() {
        Some(db) => format!("{}: {}", db.severity(), db.message()),
        None => e.to_string(),
    }
}

fn query_failed(e: &tokio_postgres::Error) -> DbError {
    let message = error_message(e);
    tracing::warn!(error = %message, "Query failed");
    DbError::QueryFailed(message)
}

fn catalog_failed(target: &str, e: &tokio_postgres::Error) -> DbError {
    let message = error_message(e);
    tracing::warn!(target_object = target, error = %message, "Catalog lookup failed");
    DbError::CatalogLoadFailed {
        target: target.to_string(),
        message,
    }
}

/// Simple query results carry no type information
fn untyped_column(name: &str) -> ColumnDef {
    ColumnDef::new(name, DataType::Unknown("unknown".to_string()))
}

/// Map tokio_postgres Type to our DataType enum
fn pg_type_to_datatype(pg_type: &Type) -> DataType {
    match *pg_type {
        Type::INT2 => DataType::SmallInt,
        Type::INT4 => DataType::Integer,
        Type::INT8 => DataType::BigInt,
        Type::FLOAT4 => DataType::Real,
        Type::FLOAT8 => DataType::Double,
        Type::NUMERIC => DataType::Numeric,
        Type::TEXT | Type::NAME => DataType::Text,
        Type::VARCHAR => DataType::Varchar(None),
        Type::CHAR | Type::BPCHAR => DataType::Char(None),
        Type::BOOL => DataType::Boolean,
        Type::DATE => DataType::Date,
        Type::TIME => DataType::Time,
        Type::TIMESTAMP => DataType::Timestamp,
        Type::TIMESTAMPTZ => DataType::TimestampTz,
        Type::INTERVAL => DataType::Interval,
        Type::JSON => DataType::Json,
        Type::JSONB => DataType::Jsonb,
        Type::BYTEA => DataType::Bytea,
        Type::UUID => DataType::Uuid,
        Type::BOOL_ARRAY => DataType::Array(Box::new(DataType::Boolean)),
        Type::INT2_ARRAY => DataType::Array(Box::new(DataType::SmallInt)),
        Type::INT4_ARRAY => DataType::Array(Box::new(DataType::Integer)),
        Type::INT8_ARRAY => DataType::Array(Box::new(DataType::BigInt)),
        Type::FLOAT4_ARRAY => DataType::Array(Box::new(DataType::Real)),
        Type::FLOAT8_ARRAY => DataType::Array(Box::new(DataType::Double)),
        Type::TEXT_ARRAY | Type::VARCHAR_ARRAY | Type::NAME_ARRAY => {
            DataType::Array(Box::new(DataType::Text))
        }
        Type::UUID_ARRAY => DataType::Array(Box::new(DataType::Uuid)),
        Type::NUMERIC_ARRAY => DataType::Array(Box::new(DataType::Numeric)),
        _ => DataType::Unknown(pg_type.name().to_string()),
    }
}

/// Build a rustls ClientConfig that trusts OS certificates (with Mozilla roots as fallback)
fn make_tls_config() -> rustls::ClientConfig {
    let mut root_store = rustls::RootCertStore::empty();

    let native_certs = rustls_native_certs::load_native_certs();
    let mut loaded = 0;
    for cert in native_certs.certs {
        if root_store.add(cert).is_ok() {
            loaded += 1;
        }
    }
    if loaded == 0 {
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    }

    rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth()
}

/// Extract a cell value from a tokio_postgres Row based on the column's DataType.
///
/// Typed extraction first, then the text fallback. Returns `CellValue::Null`
/// only for actual NULL values.
fn extract_cell_value(row: &tokio_postgres::Row, idx: usize, data_type: &DataType) -> CellValue {
    match data_type {
        DataType::SmallInt => typed(row, idx, |v: i16| CellValue::Integer(v as i64)),
        DataType::Integer => typed(row, idx, |v: i32| CellValue::Integer(v as i64)),
        DataType::BigInt => typed(row, idx, CellValue::Integer),
        DataType::Real => typed(row, idx, |v: f32| CellValue::Float(v as f64)),
        DataType::Double => typed(row, idx, CellValue::Float),
        DataType::Numeric => typed(row, idx, CellValue::Decimal),
        DataType::Boolean => typed(row, idx, CellValue::Boolean),
        DataType::Json | DataType::Jsonb => typed(row, idx, CellValue::Json),
        DataType::Bytea => typed(row, idx, CellValue::Binary),
        DataType::Uuid => typed(row, idx, |v: uuid::Uuid| CellValue::Uuid(v.to_string())),
        DataType::Date => typed(row, idx, |v: chrono::NaiveDate| {
            CellValue::DateTime(v.to_string())
        }),
        DataType::Time => typed(row, idx, |v: chrono::NaiveTime| {
            CellValue::DateTime(v.to_string())
        }),
        DataType::Timestamp => typed(row, idx, |v: chrono::NaiveDateTime| {
            CellValue::DateTime(v.to_string())
        }),
        DataType::TimestampTz => typed(row, idx, |v: chrono::DateTime<chrono::Utc>| {
            CellValue::DateTime(v.to_string())
        }),
        DataType::Array(inner) => extract_array_value(row, idx, inner),
        // Text types and fallback for unknown types
        _ => try_as_string(row, idx),
    }
}

/// Typed extraction with the text fallback on a type mismatch
fn typed<'a, T, F>(row: &'a tokio_postgres::Row, idx: usize, wrap: F) -> CellValue
where
    T: tokio_postgres::types::FromSql<'a>,
    F: FnOnce(T) -> CellValue,
{
    match row.try_get::<_, Option<T>>(idx) {
        Ok(Some(v)) => wrap(v),
        Ok(None) => CellValue::Null,
        Err(_) => try_as_string(row, idx),
    }
}

/// Extract an array value from a tokio_postgres Row.
fn extract_array_value(row: &tokio_postgres::Row, idx: usize, inner: &DataType) -> CellValue {
    fn list<T>(items: Vec<T>, f: impl Fn(T) -> CellValue) -> CellValue {
        CellValue::Array(items.into_iter().map(f).collect())
    }
    match inner {
        DataType::Text => typed(row, idx, |v: Vec<String>| list(v, CellValue::Text)),
        DataType::SmallInt => typed(row, idx, |v: Vec<i16>| {
            list(v, |n| CellValue::Integer(n as i64))
        }),
        DataType::Integer => typed(row, idx, |v: Vec<i32>| {
            list(v, |n| CellValue::Integer(n as i64))
        }),
        DataType::BigInt => typed(row, idx, |v: Vec<i64>| list(v, CellValue::Integer)),
        DataType::Real => typed(row, idx, |v: Vec<f32>| {
            list(v, |n| CellValue::Float(n as f64))
        }),
        DataType::Double => typed(row, idx, |v: Vec<f64>| list(v, CellValue::Float)),
        DataType::Boolean => typed(row, idx, |v: Vec<bool>| list(v, CellValue::Boolean)),
        DataType::Uuid => typed(row, idx, |v: Vec<uuid::Uuid>| {
            list(v, |u| CellValue::Uuid(u.to_string()))
        }),
        DataType::Numeric => typed(row, idx, |v: Vec<Decimal>| list(v, CellValue::Decimal)),
        _ => try_as_string(row, idx),
    }
}

/// Try to extract a value as a string (fallback for type mismatches).
///
/// When even the string fallback fails, includes the postgres type name
/// in the message so the user knows what type couldn't be displayed.
fn try_as_string(row: &tokio_postgres::Row, idx: usize) -> CellValue {
    match row.try_get::<_, Option<String>>(idx) {
        Ok(Some(v)) => CellValue::Text(v),
        Ok(None) => CellValue::Null,
        Err(_) => {
            let type_name = row
                .columns()
                .get(idx)
                .map_or("unknown", |c| c.type_().name());
            CellValue::Text(format!("<unable to display: {}>", type_name))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pg_type_mapping() {
        assert_eq!(pg_type_to_datatype(&Type::INT4), DataType::Integer);
        assert_eq!(pg_type_to_datatype(&Type::NUMERIC), DataType::Numeric);
        assert_eq!(pg_type_to_datatype(&Type::DATE), DataType::Date);
        assert_eq!(
            pg_type_to_datatype(&Type::INT8_ARRAY),
            DataType::Array(Box::new(DataType::BigInt))
        );
        assert_eq!(
            pg_type_to_datatype(&Type::INET),
            DataType::Unknown("inet".to_string())
        );
    }

    #[test]
    fn test_simple_query_columns_are_untyped() {
        let column = untyped_column("two");
        assert_eq!(column.name, "two");
        assert!(matches!(column.data_type, DataType::Unknown(_)));
    }

    #[test]
    fn test_catalog_queries_use_bind_parameters() {
        assert!(TABLES_SQL.contains("$1"));
        assert!(COLUMNS_SQL.contains("$1") && COLUMNS_SQL.contains("$2"));
        assert!(INDEXES_SQL.contains("$1") && INDEXES_SQL.contains("$2"));
    }
}
