//! Result grid
//!
//! The tabular view of a result set: display text per cell, a selection
//! model, clipboard text for the selection, and column sorting. NULL shows
//! as `NULL` but copies and exports as an empty field.

pub mod selection;
pub mod table;

pub use selection::Selection;
pub use table::render_table;

use crate::db::types::{CellValue, ColumnDef, QueryResults, Row};

/// Display text for NULL cells
pub const NULL_DISPLAY: &str = "NULL";

/// One rendered cell
#[derive(Debug, Clone, PartialEq)]
pub struct GridCell {
    /// What the table shows
    pub display: String,
    /// The typed value
    pub value: CellValue,
}

impl GridCell {
    fn new(value: CellValue) -> Self {
        let display = match &value {
            CellValue::Null => NULL_DISPLAY.to_string(),
            other => other.display_text(),
        };
        Self { display, value }
    }

    pub fn is_null(&self) -> bool {
        self.value.is_null()
    }

    /// Text used for clipboard and CSV: the display text, or empty for NULL
    pub fn export_value(&self) -> String {
        if self.is_null() {
            String::new()
        } else {
            self.display.clone()
        }
    }
}

/// A rendered result set with its selection
#[derive(Debug, Clone, Default)]
pub struct Grid {
    columns: Vec<ColumnDef>,
    rows: Vec<Vec<GridCell>>,
    pub selection: Selection,
}

impl Grid {
    /// Render rows against their column definitions. Rows are padded or
    /// truncated to the column count.
    pub fn render(columns: Vec<ColumnDef>, rows: Vec<Row>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|row| {
                let mut cells: Vec<GridCell> = row.values.into_iter().map(GridCell::new).collect();
                cells.resize_with(width, || GridCell::new(CellValue::Null));
                cells.truncate(width);
                cells
            })
            .collect();
        Self {
            columns,
            rows,
            selection: Selection::default(),
        }
    }

    pub fn from_results(results: &QueryResults) -> Self {
        Self::render(results.columns.clone(), results.rows.clone())
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&GridCell> {
        self.rows.get(row)?.get(col)
    }

    pub fn rows(&self) -> impl Iterator<Item = &[GridCell]> {
        self.rows.iter().map(Vec::as_slice)
    }

    /// Status line: "N rows, M columns", or "No results"
    pub fn status_text(&self) -> String {
        if self.columns.is_empty() {
            "No results".to_string()
        } else {
            format!(
                "{} rows, {} columns",
                self.row_count(),
                self.column_count()
            )
        }
    }

    /// Select every cell
    pub fn select_all(&mut self) {
        if self.row_count() > 0 && self.column_count() > 0 {
            self.selection
                .select_rect(0, 0, self.row_count() - 1, self.column_count() - 1);
        }
    }

    /// Clipboard text for the selection: the bounding rectangle of the
    /// selected cells, tab-separated fields, one line per row, no trailing
    /// newline. Unselected cells inside the rectangle become empty fields.
    /// `None` when nothing is selected.
    pub fn copy_selection(&self) -> Option<String> {
        let (top, bottom, left, right) = self.selection.bounds()?;
        let mut lines = Vec::with_capacity(bottom - top + 1);
        for row in top..=bottom {
            let fields: Vec<String> = (left..=right)
                .map(|col| {
                    if self.selection.contains(row, col) {
                        self.cell(row, col)
                            .map(GridCell::export_value)
                            .unwrap_or_default()
                    } else {
                        String::new()
                    }
                })
                .collect();
            lines.push(fields.join("\t"));
        }
        Some(lines.join("\n"))
    }

    /// Sort rows by one column. NULL always sorts last. Clears the selection
    /// since row positions change.
    pub fn sort_by_column(&mut self, col: usize, ascending: bool) {
        if col >= self.columns.len() {
            return;
        }
        self.rows.sort_by(|a, b| {
            let (x, y) = (&a[col].value, &b[col].value);
            match (x.is_null(), y.is_null()) {
                (false, false) if !ascending => y.sort_cmp(x),
                _ => x.sort_cmp(y),
            }
        });
        self.selection.clear();
    }

    /// Back to a result set, e.g. for charting the sorted data
    pub fn to_rows(&self) -> Vec<Row> {
        self.rows
            .iter()
            .map(|cells| Row::new(cells.iter().map(|c| c.value.clone()).collect()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::types::DataType;

    fn grid_3x3() -> Grid {
        let columns = vec![
            ColumnDef::new("a", DataType::Integer),
            ColumnDef::new("b", DataType::Text),
            ColumnDef::new("c", DataType::Integer),
        ];
        let rows = (0..3)
            .map(|r| {
                Row::new(vec![
                    CellValue::Integer(r),
                    CellValue::Text(format!("t{}", r)),
                    CellValue::Integer(r * 10),
                ])
            })
            .collect();
        Grid::render(columns, rows)
    }

    #[test]
    fn test_null_display_and_export() {
        let grid = Grid::render(
            vec![ColumnDef::new("a", DataType::Integer)],
            vec![
                Row::new(vec![CellValue::Null]),
                Row::new(vec![CellValue::Integer(5)]),
            ],
        );
        let null = grid.cell(0, 0).unwrap();
        assert_eq!(null.display, "NULL");
        assert_eq!(null.export_value(), "");
        assert!(null.is_null());
        assert_eq!(grid.cell(1, 0).unwrap().export_value(), "5");
    }

    #[test]
    fn test_text_null_is_not_null() {
        let grid = Grid::render(
            vec![ColumnDef::new("a", DataType::Text)],
            vec![Row::new(vec![CellValue::Text("NULL".into())])],
        );
        assert_eq!(grid.cell(0, 0).unwrap().export_value(), "NULL");
    }

    #[test]
    fn test_rows_padded_to_columns() {
        let grid = Grid::render(
            vec![
                ColumnDef::new("a", DataType::Integer),
                ColumnDef::new("b", DataType::Integer),
            ],
            vec![Row::new(vec![CellValue::Integer(1)])],
        );
        assert!(grid.cell(0, 1).unwrap().is_null());
    }

    #[test]
    fn test_status_text() {
        assert_eq!(grid_3x3().status_text(), "3 rows, 3 columns");
        assert_eq!(Grid::default().status_text(), "No results");
    }

    #[test]
    fn test_copy_rectangle() {
        let mut grid = grid_3x3();
        grid.selection.select_rect(0, 0, 1, 1);
        assert_eq!(grid.copy_selection().unwrap(), "0\tt0\n1\tt1");
    }

    #[test]
    fn test_copy_sparse_selection_fills_gaps() {
        let mut grid = grid_3x3();
        grid.selection.select_cell(0, 0);
        grid.selection.toggle_cell(1, 1);
        let text = grid.copy_selection().unwrap();
        let lines: Vec<&str> = text.split('\n').collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "0\t");
        assert_eq!(lines[1], "\tt1");
        assert!(!text.ends_with('\n'));
    }

    #[test]
    fn test_copy_nothing_selected() {
        assert!(grid_3x3().copy_selection().is_none());
    }

    #[test]
    fn test_copy_null_is_empty() {
        let mut grid = Grid::render(
            vec![
                ColumnDef::new("a", DataType::Integer),
                ColumnDef::new("b", DataType::Integer),
            ],
            vec![Row::new(vec![CellValue::Null, CellValue::Integer(2)])],
        );
        grid.selection.select_row(0, 2);
        assert_eq!(grid.copy_selection().unwrap(), "\t2");
    }

    #[test]
    fn test_select_all() {
        let mut grid = grid_3x3();
        grid.select_all();
        let text = grid.copy_selection().unwrap();
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn test_sort_nulls_last_both_directions() {
        let mut grid = Grid::render(
            vec![ColumnDef::new("a", DataType::Integer)],
            vec![
                Row::new(vec![CellValue::Integer(2)]),
                Row::new(vec![CellValue::Null]),
                Row::new(vec![CellValue::Integer(10)]),
            ],
        );
        grid.sort_by_column(0, true);
        let shown: Vec<&str> = grid.rows().map(|r| r[0].display.as_str()).collect();
        assert_eq!(shown, ["2", "10", "NULL"]);

        grid.sort_by_column(0, false);
        let shown: Vec<&str> = grid.rows().map(|r| r[0].display.as_str()).collect();
        assert_eq!(shown, ["10", "2", "NULL"]);
    }

    #[test]
    fn test_export_reuses_display_text() {
        let grid = Grid::render(
            vec![
                ColumnDef::new("b", DataType::Bytea),
                ColumnDef::new("tags", DataType::Array(Box::new(DataType::Text))),
            ],
            vec![Row::new(vec![
                CellValue::Binary(vec![0xde, 0xad]),
                CellValue::Array(vec![CellValue::Text("a".into()), CellValue::Null]),
            ])],
        );
        let bytes = grid.cell(0, 0).unwrap();
        assert_eq!(bytes.display, "<binary 2 bytes>");
        assert_eq!(bytes.export_value(), bytes.display);
        let tags = grid.cell(0, 1).unwrap();
        assert_eq!(tags.export_value(), "{a,NULL}");
    }
}
