//! Plain-text table rendering for the terminal

use super::{Grid, GridCell};
use unicode_truncate::{Alignment, UnicodeTruncateStr};
use unicode_width::UnicodeWidthStr;

const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

/// Rows sampled when sizing columns
const WIDTH_SAMPLE_ROWS: usize = 100;
const MIN_WIDTH: usize = 4;
const MAX_WIDTH: usize = 40;

/// Render the grid as an aligned table. At most `max_rows` rows are shown;
/// NULL cells are dimmed when `color` is set.
pub fn render_table(grid: &Grid, max_rows: usize, color: bool) -> String {
    if grid.is_empty() {
        return format!("({})\n", grid.status_text());
    }

    let widths = column_widths(grid);
    let numeric: Vec<bool> = grid
        .columns()
        .iter()
        .map(|c| c.data_type.is_numeric())
        .collect();

    let mut out = String::new();

    let header: Vec<String> = grid
        .columns()
        .iter()
        .zip(&widths)
        .map(|(c, w)| pad(&c.name, *w, Alignment::Left))
        .collect();
    out.push_str(header.join(" | ").trim_end());
    out.push('\n');

    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&rule.join("-+-"));
    out.push('\n');

    for cells in grid.rows().take(max_rows) {
        let line: Vec<String> = cells
            .iter()
            .enumerate()
            .map(|(i, cell)| render_cell(cell, widths[i], numeric[i], color))
            .collect();
        out.push_str(line.join(" | ").trim_end());
        out.push('\n');
    }

    if grid.row_count() > max_rows {
        out.push_str(&format!("... {} more rows\n", grid.row_count() - max_rows));
    }
    out.push_str(&format!("({})\n", grid.status_text()));
    out
}

fn render_cell(cell: &GridCell, width: usize, numeric: bool, color: bool) -> String {
    let align = if numeric && !cell.is_null() {
        Alignment::Right
    } else {
        Alignment::Left
    };
    let text = single_line(&cell.display);
    let padded = pad(&text, width, align);
    if cell.is_null() && color {
        format!("{}{}{}", DIM, padded, RESET)
    } else {
        padded
    }
}

fn pad(text: &str, width: usize, align: Alignment) -> String {
    if text.width() > width {
        let (head, _) = text.unicode_truncate(width.saturating_sub(1));
        format!("{}…", head).unicode_pad(width, align, true).into_owned()
    } else {
        text.unicode_pad(width, align, false).into_owned()
    }
}

/// Embedded newlines and tabs would break the layout
fn single_line(text: &str) -> String {
    text.replace(['\n', '\r', '\t'], " ")
}

/// Display width per column from the header and the first rows, clamped
fn column_widths(grid: &Grid) -> Vec<usize> {
    let mut widths: Vec<usize> = grid.columns().iter().map(|c| c.name.width()).collect();
    for cells in grid.rows().take(WIDTH_SAMPLE_ROWS) {
        for (i, cell) in cells.iter().enumerate() {
            widths[i] = widths[i].max(single_line(&cell.display).width());
        }
    }
    widths
        .into_iter()
        .map(|w| w.clamp(MIN_WIDTH, MAX_WIDTH))
        .collect()
}
