//! Database type definitions
//!
//! Core data structures for representing database query results,
//! data types, and values.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::cmp::Ordering;
use std::time::Duration;
use unicode_truncate::UnicodeTruncateStr;

/// What a statement produced
#[derive(Debug, Clone)]
pub enum QueryOutcome {
    /// A row-returning statement (possibly zero rows)
    Rows(QueryResults),
    /// A statement without a result set
    Affected { count: u64, execution_time: Duration },
}

impl QueryOutcome {
    pub fn execution_time(&self) -> Duration {
        match self {
            QueryOutcome::Rows(results) => results.execution_time,
            QueryOutcome::Affected { execution_time, .. } => *execution_time,
        }
    }
}

/// Query execution results
#[derive(Debug, Clone)]
pub struct QueryResults {
    /// Column definitions
    pub columns: Vec<ColumnDef>,
    /// Result rows
    pub rows: Vec<Row>,
    /// Query execution time
    pub execution_time: Duration,
    /// Total row count (may differ from rows.len() if limited)
    pub row_count: usize,
}

/// Column definition in query results
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    /// Column name
    pub name: String,
    /// Data type
    pub data_type: DataType,
    /// Whether column can contain NULL
    pub nullable: bool,
}

/// Database data types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataType {
    // Integer types
    SmallInt,
    Integer,
    BigInt,

    // Floating point
    Real,
    Double,
    Numeric,

    // Text types
    Text,
    Varchar(Option<usize>),
    Char(Option<usize>),

    // Boolean
    Boolean,

    // Date/time types
    Date,
    Time,
    Timestamp,
    TimestampTz,
    Interval,

    // JSON types
    Json,
    Jsonb,

    // Binary data
    Bytea,

    // UUID
    Uuid,

    // Array type
    Array(Box<DataType>),

    // Other/unknown types
    Unknown(String),
}

/// A single row of query results
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Cell values in column order
    pub values: Vec<CellValue>,
}

/// A cell value (single column value in a row)
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// NULL value
    Null,

    /// Integer value
    Integer(i64),

    /// Floating point value
    Float(f64),

    /// Exact numeric value
    Decimal(Decimal),

    /// Text/string value
    Text(String),

    /// Boolean value
    Boolean(bool),

    /// JSON value (parsed)
    Json(serde_json::Value),

    /// Binary data
    Binary(Vec<u8>),

    /// Date/time value in its ISO text form
    DateTime(String),

    /// UUID value
    Uuid(String),

    /// Array value
    Array(Vec<CellValue>),
}

impl QueryResults {
    /// Build a result set, padding short rows with NULL and dropping extra
    /// values so every row has exactly one value per column.
    pub fn new(
        columns: Vec<ColumnDef>,
        mut rows: Vec<Row>,
        execution_time: Duration,
        row_count: usize,
    ) -> Self {
        let width = columns.len();
        for row in &mut rows {
            row.values.resize(width, CellValue::Null);
        }
        Self {
            columns,
            rows,
            execution_time,
            row_count,
        }
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() || self.rows.is_empty()
    }
}

impl ColumnDef {
    pub fn new(name: &str, data_type: DataType) -> Self {
        Self {
            name: name.to_string(),
            data_type,
            nullable: true,
        }
    }
}

impl Row {
    pub fn new(values: Vec<CellValue>) -> Self {
        Self { values }
    }
}

impl DataType {
    /// Get a human-readable display name for this type
    pub fn display_name(&self) -> String {
        match self {
            DataType::SmallInt => "smallint".to_string(),
            DataType::Integer => "integer".to_string(),
            DataType::BigInt => "bigint".to_string(),
            DataType::Real => "real".to_string(),
            DataType::Double => "double precision".to_string(),
            DataType::Numeric => "numeric".to_string(),
            DataType::Text => "text".to_string(),
            DataType::Varchar(Some(n)) => format!("varchar({})", n),
            DataType::Varchar(None) => "varchar".to_string(),
            DataType::Char(Some(n)) => format!("char({})", n),
            DataType::Char(None) => "char".to_string(),
            DataType::Boolean => "boolean".to_string(),
            DataType::Date => "date".to_string(),
            DataType::Time => "time".to_string(),
            DataType::Timestamp => "timestamp".to_string(),
            DataType::TimestampTz => "timestamptz".to_string(),
            DataType::Interval => "interval".to_string(),
            DataType::Json => "json".to_string(),
            DataType::Jsonb => "jsonb".to_string(),
            DataType::Bytea => "bytea".to_string(),
            DataType::Uuid => "uuid".to_string(),
            DataType::Array(inner) => format!("{}[]", inner.display_name()),
            DataType::Unknown(s) => s.clone(),
        }
    }

    /// Integer, floating point and exact numeric types
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            DataType::SmallInt
                | DataType::Integer
                | DataType::BigInt
                | DataType::Real
                | DataType::Double
                | DataType::Numeric
        )
    }
}

impl CellValue {
    /// Full text form of the value
    pub fn display_text(&self) -> String {
        match self {
            CellValue::Null => "NULL".to_string(),
            CellValue::Integer(i) => i.to_string(),
            CellValue::Float(f) => f.to_string(),
            CellValue::Decimal(d) => d.to_string(),
            CellValue::Text(s) => s.clone(),
            CellValue::Boolean(b) => b.to_string(),
            CellValue::Json(v) => v.to_string(),
            CellValue::Binary(b) => format!("<binary {} bytes>", b.len()),
            CellValue::DateTime(s) => s.clone(),
            CellValue::Uuid(s) => s.clone(),
            CellValue::Array(arr) => {
                let items: Vec<String> = arr.iter().map(|v| v.display_text()).collect();
                format!("{{{}}}", items.join(","))
            }
        }
    }

    /// Get a display string for this cell value (truncated if needed)
    pub fn display_string(&self, max_len: usize) -> String {
        let full = self.display_text();
        if full.chars().count() > max_len {
            let (head, _) = full.unicode_truncate(max_len.saturating_sub(3));
            format!("{}...", head)
        } else {
            full
        }
    }

    /// Check if this is a NULL value
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Numeric view of the value. Text counts when it parses as a number.
    pub fn as_f64(&self) -> Option<f64> {
        let value = match self {
            CellValue::Integer(i) => *i as f64,
            CellValue::Float(f) => *f,
            CellValue::Decimal(d) => d.to_f64()?,
            CellValue::Text(s) => s.trim().parse::<f64>().ok()?,
            _ => return None,
        };
        value.is_finite().then_some(value)
    }

    /// Text payload for values that are stored as strings
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) | CellValue::DateTime(s) | CellValue::Uuid(s) => Some(s),
            _ => None,
        }
    }

    /// Ordering used when sorting a column: numbers numerically, everything
    /// else by its text form, NULL after every value.
    pub fn sort_cmp(&self, other: &CellValue) -> Ordering {
        match (self.is_null(), other.is_null()) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Greater,
            (false, true) => return Ordering::Less,
            (false, false) => {}
        }
        match (self, other) {
            (CellValue::Boolean(a), CellValue::Boolean(b)) => a.cmp(b),
            (CellValue::Text(_), _) | (_, CellValue::Text(_)) => {
                self.display_text().cmp(&other.display_text())
            }
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a.total_cmp(&b),
                _ => self.display_text().cmp(&other.display_text()),
            },
        }
    }
}
