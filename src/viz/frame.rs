//! Column-oriented copy of a result set for charting

use super::infer::{ColumnKind, infer_kind, parse_date};
use crate::db::types::{CellValue, ColumnDef, Row};
use crate::error::{RenderError, RenderResult};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

#[derive(Debug, Clone)]
pub struct DataColumn {
    pub name: String,
    pub kind: ColumnKind,
    pub values: Vec<CellValue>,
}

/// Result set held by the visualization engine
#[derive(Debug, Clone)]
pub struct DataTable {
    columns: Vec<DataColumn>,
    rows: usize,
}

/// Grouping key for a value on a category-like axis.
/// Numbers order numerically and before any text.
#[derive(Debug, Clone)]
pub enum AxisKey {
    Number(f64),
    Text(String),
}

impl PartialEq for AxisKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for AxisKey {}

impl PartialOrd for AxisKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AxisKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (AxisKey::Number(a), AxisKey::Number(b)) => a.total_cmp(b),
            (AxisKey::Number(_), AxisKey::Text(_)) => Ordering::Less,
            (AxisKey::Text(_), AxisKey::Number(_)) => Ordering::Greater,
            (AxisKey::Text(a), AxisKey::Text(b)) => a.cmp(b),
        }
    }
}

impl std::hash::Hash for AxisKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self {
            AxisKey::Number(n) => {
                0u8.hash(state);
                n.to_bits().hash(state);
            }
            AxisKey::Text(s) => {
                1u8.hash(state);
                s.hash(state);
            }
        }
    }
}

impl AxisKey {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            AxisKey::Number(n) => Some(*n),
            AxisKey::Text(_) => None,
        }
    }
}

impl fmt::Display for AxisKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AxisKey::Number(n) => write!(f, "{}", n),
            AxisKey::Text(s) => f.write_str(s),
        }
    }
}

impl DataColumn {
    /// Key of row `i`, `None` for NULL
    pub fn key(&self, i: usize) -> Option<AxisKey> {
        let value = self.values.get(i)?;
        if value.is_null() {
            return None;
        }
        match (self.kind, value.as_f64()) {
            (ColumnKind::Numeric, Some(n)) => Some(AxisKey::Number(n)),
            _ => Some(AxisKey::Text(value.display_text())),
        }
    }

    /// Numeric value of row `i`
    pub fn number(&self, i: usize) -> Option<f64> {
        self.values.get(i)?.as_f64()
    }

    /// Date of row `i` as days since the common era
    pub fn day(&self, i: usize) -> Option<f64> {
        let text = self.values.get(i)?.as_text()?;
        parse_date(text).map(|d| chrono::Datelike::num_days_from_ce(&d) as f64)
    }
}

impl DataTable {
    /// Build from a result set; `None` when there are no columns or no rows
    pub fn new(columns: &[ColumnDef], rows: &[Row]) -> Option<Self> {
        if columns.is_empty() || rows.is_empty() {
            return None;
        }
        let columns = columns
            .iter()
            .enumerate()
            .map(|(i, def)| {
                let values: Vec<CellValue> = rows
                    .iter()
                    .map(|r| r.values.get(i).cloned().unwrap_or(CellValue::Null))
                    .collect();
                DataColumn {
                    name: def.name.clone(),
                    kind: infer_kind(def, values.iter()),
                    values,
                }
            })
            .collect();
        Some(Self {
            columns,
            rows: rows.len(),
        })
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> &[DataColumn] {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> RenderResult<&DataColumn> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| RenderError::MissingColumn(name.to_string()))
    }

    pub fn numeric_columns(&self) -> Vec<&DataColumn> {
        self.columns
            .iter()
            .filter(|c| c.kind == ColumnKind::Numeric)
            .collect()
    }
}

/// The `limit` most frequent keys of a column, or `None` when the column
/// has no more than `limit` distinct keys. Ties keep the smaller key.
pub fn top_keys(column: &DataColumn, rows: usize, limit: usize) -> Option<Vec<AxisKey>> {
    let mut counts: HashMap<AxisKey, usize> = HashMap::new();
    for i in 0..rows {
        if let Some(key) = column.key(i) {
            *counts.entry(key).or_default() += 1;
        }
    }
    if counts.len() <= limit {
        return None;
    }
    let mut ranked: Vec<(AxisKey, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(limit);
    Some(ranked.into_iter().map(|(k, _)| k).collect())
}

/// Distinct keys of the given rows in order of first appearance
pub fn keys_in_order(column: &DataColumn, rows: &[usize]) -> Vec<AxisKey> {
    let mut seen = Vec::new();
    for &i in rows {
        if let Some(key) = column.key(i) {
            if !seen.contains(&key) {
                seen.push(key);
            }
        }
    }
    seen
}

/// Values of `value_col` grouped by the key of `key_col`, keys sorted.
/// Rows where either side is missing are dropped.
pub fn group_numbers(
    key_col: &DataColumn,
    value_col: &DataColumn,
    rows: &[usize],
) -> BTreeMap<AxisKey, Vec<f64>> {
    let mut groups: BTreeMap<AxisKey, Vec<f64>> = BTreeMap::new();
    for &i in rows {
        if let (Some(key), Some(v)) = (key_col.key(i), value_col.number(i)) {
            groups.entry(key).or_default().push(v);
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::types::DataType;

    fn table() -> DataTable {
        let columns = vec![
            ColumnDef::new("color", DataType::Text),
            ColumnDef::new("n", DataType::Integer),
        ];
        let rows = vec![
            Row::new(vec![CellValue::Text("red".into()), CellValue::Integer(1)]),
            Row::new(vec![CellValue::Text("blue".into()), CellValue::Integer(2)]),
            Row::new(vec![CellValue::Text("red".into()), CellValue::Null]),
            Row::new(vec![CellValue::Null, CellValue::Integer(4)]),
        ];
        DataTable::new(&columns, &rows).unwrap()
    }

    #[test]
    fn test_empty_inputs_give_no_table() {
        assert!(DataTable::new(&[], &[]).is_none());
        assert!(DataTable::new(&[ColumnDef::new("a", DataType::Text)], &[]).is_none());
    }

    #[test]
    fn test_kinds_inferred_once() {
        let t = table();
        assert_eq!(t.columns()[0].kind, ColumnKind::Categorical);
        assert_eq!(t.columns()[1].kind, ColumnKind::Numeric);
        assert_eq!(t.numeric_columns().len(), 1);
    }

    #[test]
    fn test_missing_column() {
        assert_eq!(
            table().column("nope").unwrap_err(),
            RenderError::MissingColumn("nope".into())
        );
    }

    #[test]
    fn test_axis_key_order() {
        let mut keys = vec![
            AxisKey::Text("b".into()),
            AxisKey::Number(10.0),
            AxisKey::Text("a".into()),
            AxisKey::Number(2.0),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                AxisKey::Number(2.0),
                AxisKey::Number(10.0),
                AxisKey::Text("a".into()),
                AxisKey::Text("b".into()),
            ]
        );
    }

    #[test]
    fn test_group_numbers_drops_missing() {
        let t = table();
        let rows: Vec<usize> = (0..t.row_count()).collect();
        let groups = group_numbers(&t.columns()[0], &t.columns()[1], &rows);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[&AxisKey::Text("red".into())], vec![1.0]);
        assert_eq!(groups[&AxisKey::Text("blue".into())], vec![2.0]);
    }

    #[test]
    fn test_top_keys() {
        let t = table();
        assert!(top_keys(&t.columns()[0], t.row_count(), 5).is_none());
        let top = top_keys(&t.columns()[0], t.row_count(), 1).unwrap();
        assert_eq!(top, vec![AxisKey::Text("red".into())]);
    }

    #[test]
    fn test_keys_in_order() {
        let t = table();
        assert_eq!(
            keys_in_order(&t.columns()[0], &[0, 1, 2, 3]),
            vec![AxisKey::Text("red".into()), AxisKey::Text("blue".into())]
        );
    }

    #[test]
    fn test_day_parsing() {
        let columns = vec![ColumnDef::new("d", DataType::Text)];
        let rows = vec![
            Row::new(vec![CellValue::Text("2024-01-01".into())]),
            Row::new(vec![CellValue::Text("2024-01-02".into())]),
        ];
        let t = DataTable::new(&columns, &rows).unwrap();
        let col = &t.columns()[0];
        assert_eq!(col.day(1).unwrap() - col.day(0).unwrap(), 1.0);
    }
}
