//! Column kind inference
//!
//! Each result column is tagged once per data set as numeric, date or
//! categorical. The tag decides which axes and charts a column can drive.

use crate::db::types::{CellValue, ColumnDef, DataType};
use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Numeric,
    Date,
    Categorical,
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ColumnKind::Numeric => "numeric",
            ColumnKind::Date => "date",
            ColumnKind::Categorical => "categorical",
        })
    }
}

/// Tag one column.
///
/// Numeric when the declared type is numeric or every non-null value is a
/// number. Text only counts as a number when the column has no known type,
/// as with results read back over the simple query protocol. Otherwise date
/// when the first non-null value is text in `YYYY-MM-DD` form. Everything
/// else is categorical.
pub fn infer_kind<'a>(column: &ColumnDef, values: impl Iterator<Item = &'a CellValue>) -> ColumnKind {
    let non_null: Vec<&CellValue> = values.filter(|v| !v.is_null()).collect();
    let untyped = matches!(column.data_type, DataType::Unknown(_));

    let is_number = |v: &&CellValue| match v {
        CellValue::Integer(_) | CellValue::Float(_) | CellValue::Decimal(_) => true,
        CellValue::Text(_) => untyped && v.as_f64().is_some(),
        _ => false,
    };
    if column.data_type.is_numeric() || (!non_null.is_empty() && non_null.iter().all(is_number)) {
        return ColumnKind::Numeric;
    }

    match non_null.first().and_then(|v| v.as_text()) {
        Some(sample) if parse_date(sample).is_some() => ColumnKind::Date,
        _ => ColumnKind::Categorical,
    }
}

/// Strict `YYYY-MM-DD`
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").ok()
}
