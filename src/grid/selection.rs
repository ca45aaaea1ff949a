//! Cell selection
//!
//! A set of (row, column) positions. Supports single cells, rectangles,
//! whole rows and toggling, in any combination.

use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    cells: BTreeSet<(usize, usize)>,
}

impl Selection {
    /// Replace the selection with one cell
    pub fn select_cell(&mut self, row: usize, col: usize) {
        self.cells.clear();
        self.cells.insert((row, col));
    }

    /// Add or remove one cell
    pub fn toggle_cell(&mut self, row: usize, col: usize) {
        if !self.cells.remove(&(row, col)) {
            self.cells.insert((row, col));
        }
    }

    /// Replace the selection with the rectangle spanning both corners
    pub fn select_rect(&mut self, row_a: usize, col_a: usize, row_b: usize, col_b: usize) {
        self.cells.clear();
        self.extend_rect(row_a, col_a, row_b, col_b);
    }

    /// Add a rectangle to the current selection
    pub fn extend_rect(&mut self, row_a: usize, col_a: usize, row_b: usize, col_b: usize) {
        let (top, bottom) = (row_a.min(row_b), row_a.max(row_b));
        let (left, right) = (col_a.min(col_b), col_a.max(col_b));
        for row in top..=bottom {
            for col in left..=right {
                self.cells.insert((row, col));
            }
        }
    }

    /// Replace the selection with a whole row of `columns` cells
    pub fn select_row(&mut self, row: usize, columns: usize) {
        self.cells.clear();
        for col in 0..columns {
            self.cells.insert((row, col));
        }
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }

    pub fn contains(&self, row: usize, col: usize) -> bool {
        self.cells.contains(&(row, col))
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Bounding rectangle as (top, bottom, left, right), inclusive
    pub fn bounds(&self) -> Option<(usize, usize, usize, usize)> {
        let top = self.cells.first()?.0;
        let bottom = self.cells.last()?.0;
        let left = self.cells.iter().map(|c| c.1).min()?;
        let right = self.cells.iter().map(|c| c.1).max()?;
        Some((top, bottom, left, right))
    }
}
