//! Database abstraction layer
//!
//! This module provides a trait-based abstraction over database operations,
//! so the shell can be driven against PostgreSQL or against a mock in tests.

pub mod postgres;
pub mod schema;
pub mod types;

use crate::config::ConnectionProfile;
use crate::error::DbResult;

// Re-export main types
pub use postgres::PostgresSession;
pub use schema::{CatalogTree, ColumnInfo, IndexInfo, LoadRequest, SchemaNode};
pub use types::{CellValue, ColumnDef, DataType, QueryOutcome, QueryResults, Row};

/// One open database session.
///
/// Callers issue one operation at a time; nothing here is safe to call
/// concurrently on the same session.
#[allow(async_fn_in_trait)]
pub trait Database: Sized {
    /// Open a session. Every failure is `DbError::ConnectionFailed`.
    async fn connect(profile: &ConnectionProfile) -> DbResult<Self>;

    /// Release the session
    async fn close(self) -> DbResult<()>;

    /// Run arbitrary SQL
    async fn execute(&self, sql: &str) -> DbResult<QueryOutcome>;

    /// User schemas, ordered by name
    async fn list_schemas(&self) -> DbResult<Vec<String>>;

    /// Base tables of a schema, ordered by name
    async fn list_tables(&self, schema: &str) -> DbResult<Vec<String>>;

    /// Columns of a table in ordinal order
    async fn list_columns(&self, schema: &str, table: &str) -> DbResult<Vec<ColumnInfo>>;

    /// Indexes of a table, one entry per indexed column
    async fn list_indexes(&self, schema: &str, table: &str) -> DbResult<Vec<IndexInfo>>;

    /// Message from the background connection task if it has died
    fn take_connection_error(&mut self) -> Option<String> {
        None
    }
}
