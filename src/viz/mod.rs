//! Charts over the current result set
//!
//! The engine owns a column-oriented copy of the last result set, the
//! user's axis selections and the canvas size. Rendering is a pure function
//! of that state plus a [`ChartSpec`]; every failure comes back as a
//! [`RenderError`] so the shell can keep showing the previous chart.

pub mod frame;
pub mod infer;
pub mod palette;
pub mod plot;
pub mod prepare;
pub mod spec;
pub mod stats;

pub use frame::DataTable;
pub use infer::ColumnKind;
pub use palette::ColorScheme;
pub use spec::{ChartKind, ChartOptions, ChartSpec};

use crate::db::types::{ColumnDef, Row};
use crate::error::{ExportError, ExportResult, RenderError, RenderResult};
use plotters::prelude::*;
use std::path::Path;

pub const DEFAULT_WIDTH: u32 = 800;
pub const DEFAULT_HEIGHT: u32 = 600;

/// Outcome of loading a result set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataState {
    Ready,
    NoData,
}

/// A rendered chart
#[derive(Debug, Clone)]
pub struct ChartImage {
    pub svg: String,
    pub width: u32,
    pub height: u32,
    /// Notes on data left out of the chart
    pub warnings: Vec<String>,
}

/// Current axis choices
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub x: Option<String>,
    pub y: Option<String>,
    pub group: Option<String>,
}

#[derive(Debug)]
pub struct VisualizationEngine {
    table: Option<DataTable>,
    selection: Selection,
    size: (u32, u32),
}

impl Default for VisualizationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl VisualizationEngine {
    pub fn new() -> Self {
        Self {
            table: None,
            selection: Selection::default(),
            size: (DEFAULT_WIDTH, DEFAULT_HEIGHT),
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.size = (width.max(100), height.max(100));
        self
    }

    /// Replace the data set. Column kinds are inferred here, once. An empty
    /// result clears the engine.
    pub fn set_data(&mut self, columns: &[ColumnDef], rows: &[Row]) -> DataState {
        self.table = DataTable::new(columns, rows);
        match &self.table {
            Some(table) => {
                tracing::debug!(
                    columns = table.columns().len(),
                    rows = table.row_count(),
                    "Chart data loaded"
                );
                self.choose_defaults();
                DataState::Ready
            }
            None => DataState::NoData,
        }
    }

    pub fn has_data(&self) -> bool {
        self.table.is_some()
    }

    pub fn table(&self) -> Option<&DataTable> {
        self.table.as_ref()
    }

    /// `(name, kind)` for each column of the current data
    pub fn column_kinds(&self) -> Vec<(String, ColumnKind)> {
        self.table
            .iter()
            .flat_map(|t| t.columns().iter().map(|c| (c.name.clone(), c.kind)))
            .collect()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Pick axes for a fresh data set. Selections whose column still exists
    /// are kept. Otherwise x is the first categorical or date column and y
    /// the first numeric column, each falling back to the first column.
    pub fn choose_defaults(&mut self) {
        let Some(table) = &self.table else {
            return;
        };
        let first = table.columns().first().map(|c| c.name.clone());
        let keep = |current: &Option<String>| current.clone().filter(|name| table.has_column(name));

        let x = keep(&self.selection.x).or_else(|| {
            table
                .columns()
                .iter()
                .find(|c| matches!(c.kind, ColumnKind::Categorical | ColumnKind::Date))
                .map(|c| c.name.clone())
                .or_else(|| first.clone())
        });
        let y = keep(&self.selection.y).or_else(|| {
            table
                .columns()
                .iter()
                .find(|c| c.kind == ColumnKind::Numeric)
                .map(|c| c.name.clone())
                .or_else(|| first.clone())
        });
        let group = keep(&self.selection.group);
        self.selection = Selection { x, y, group };
    }

    /// Set the axis columns; `None` leaves a choice unchanged, an empty
    /// group clears it
    pub fn select(&mut self, x: Option<&str>, y: Option<&str>, group: Option<&str>) {
        if let Some(x) = x {
            self.selection.x = Some(x.to_string());
        }
        if let Some(y) = y {
            self.selection.y = Some(y.to_string());
        }
        if let Some(group) = group {
            self.selection.group = (!group.is_empty()).then(|| group.to_string());
        }
    }

    /// Spec for `kind` from the current selections with default labels
    pub fn spec_for(&self, kind: ChartKind) -> ChartSpec {
        let x = self.selection.x.as_deref().unwrap_or_default();
        let y = self.selection.y.as_deref().unwrap_or_default();
        ChartSpec::new(kind, x, y).with_group(self.selection.group.as_deref())
    }

    /// Check that the data and the columns the chart reads are present
    fn validate(&self, spec: &ChartSpec) -> RenderResult<&DataTable> {
        let table = self.table.as_ref().ok_or(RenderError::NoData)?;
        let kind = spec.kind();
        let mut needed = Vec::new();
        if kind.uses_x() {
            needed.push(&spec.x_column);
        }
        if kind.uses_y() {
            needed.push(&spec.y_column);
        }
        if kind != ChartKind::Heatmap {
            needed.extend(spec.group_column.iter());
        }
        for name in needed {
            if !table.has_column(name) {
                return Err(RenderError::MissingColumn(name.clone()));
            }
        }
        Ok(table)
    }

    /// Render to SVG
    pub fn render(&self, spec: &ChartSpec) -> RenderResult<ChartImage> {
        let table = self.validate(spec)?;
        let prepared = prepare::prepare(table, spec)?;
        for warning in &prepared.warnings {
            tracing::warn!(chart = %spec.kind(), "{}", warning);
        }

        let (width, height) = self.size;
        let mut svg = String::new();
        {
            let root = SVGBackend::with_string(&mut svg, (width, height)).into_drawing_area();
            plot::draw(&root, spec, &prepared.data, true)?;
            root.present()
                .map_err(|e| RenderError::Backend(e.to_string()))?;
        }
        tracing::info!(chart = %spec.kind(), width, height, "Chart rendered");
        Ok(ChartImage {
            svg,
            width,
            height,
            warnings: prepared.warnings,
        })
    }

    /// Render and write to `path`. `.svg` gives a vector image; `.png`,
    /// `.jpg`, `.jpeg` and `.bmp` give a raster image without text.
    /// Returns the chart's warnings.
    pub fn export(&self, spec: &ChartSpec, path: &Path) -> ExportResult<Vec<String>> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        let warnings = match extension.as_str() {
            "svg" => {
                let image = self.render(spec)?;
                std::fs::write(path, &image.svg).map_err(|source| ExportError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                image.warnings
            }
            "png" | "jpg" | "jpeg" | "bmp" => {
                let table = self.validate(spec)?;
                let prepared = prepare::prepare(table, spec)?;
                let root = BitMapBackend::new(path, self.size).into_drawing_area();
                plot::draw(&root, spec, &prepared.data, false)?;
                root.present()
                    .map_err(|e| RenderError::Backend(e.to_string()))?;
                prepared.warnings
            }
            _ => return Err(ExportError::UnsupportedFormat(extension)),
        };
        tracing::info!(path = %path.display(), chart = %spec.kind(), "Exported chart");
        Ok(warnings)
    }
}
