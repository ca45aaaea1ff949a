//! Result set export to CSV
//!
//! Serialization is a pure function over the grid; `write_csv` adds the
//! file I/O. A failed write may leave a partial file behind.

use crate::error::{ExportError, ExportResult};
use crate::grid::Grid;
use std::path::Path;

/// Serialize the grid as RFC 4180 CSV: a header line, then one line per
/// row. NULL cells are empty fields.
pub fn to_csv(grid: &Grid) -> String {
    let mut out = String::new();

    // Header row
    for (i, col) in grid.columns().iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        csv_escape_into(&mut out, &col.name);
    }
    out.push('\n');

    // Data rows
    for cells in grid.rows() {
        for (i, cell) in cells.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            csv_escape_into(&mut out, &cell.export_value());
        }
        out.push('\n');
    }

    out
}

/// Write the grid to `path` as CSV. Returns the number of data rows written.
pub fn write_csv(grid: &Grid, path: &Path) -> ExportResult<usize> {
    if grid.is_empty() {
        return Err(ExportError::NoData);
    }
    std::fs::write(path, to_csv(grid)).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(path = %path.display(), rows = grid.row_count(), "Exported CSV");
    Ok(grid.row_count())
}

/// Quote a field if it contains `,` `"` or a newline (RFC 4180).
fn csv_escape_into(out: &mut String, field: &str) {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        out.push('"');
        for c in field.chars() {
            if c == '"' {
                out.push_str("\"\"");
            } else {
                out.push(c);
            }
        }
        out.push('"');
    } else {
        out.push_str(field);
    }
}
