//! Turning a data table and a chart spec into plot-ready series
//!
//! Everything here is pure: aggregation, category limits and the warnings
//! they produce are decided before any drawing happens, so the drawing code
//! only has to place shapes.

use super::frame::{AxisKey, DataColumn, DataTable, group_numbers, keys_in_order, top_keys};
use super::infer::ColumnKind;
use super::spec::{ChartOptions, ChartSpec};
use super::stats::{self, BoxStats};
use crate::error::{RenderError, RenderResult};
use std::collections::{BTreeMap, BTreeSet};

/// Distinct values a categorical axis may show
pub const MAX_CATEGORIES: usize = 20;
/// Slices a pie may show
pub const MAX_PIE_SLICES: usize = 10;

const KDE_POINTS: usize = 200;
const VIOLIN_POINTS: usize = 100;

/// How positions along an axis are labelled
#[derive(Debug, Clone, PartialEq)]
pub enum XScale {
    Numeric,
    /// Days since the common era
    Date,
    /// Category `i` sits at position `i`
    Category(Vec<String>),
}

/// One value per category, `None` where the series has no data
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PointSeries {
    pub name: String,
    pub points: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Slice {
    pub label: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistSeries {
    pub name: String,
    pub counts: Vec<u64>,
    /// Density curve scaled to counts
    pub density: Option<Vec<(f64, f64)>>,
}

/// Summary of one violin
#[derive(Debug, Clone, PartialEq)]
pub struct ViolinStats {
    pub stats: BoxStats,
    /// `(value, density)` pairs; empty when the values are constant
    pub curve: Vec<(f64, f64)>,
    pub values: Vec<f64>,
}

impl ViolinStats {
    pub fn compute(values: &[f64]) -> Option<Self> {
        let stats = BoxStats::compute(values)?;
        let sorted = stats::sorted(values);
        let curve = match stats::scott_bandwidth(&sorted) {
            Some(bw) => {
                let lo = sorted[0] - 2.0 * bw;
                let hi = sorted[sorted.len() - 1] + 2.0 * bw;
                let xs = stats::linspace(lo, hi, VIOLIN_POINTS);
                let ys = stats::kde(&sorted, bw, &xs);
                xs.into_iter().zip(ys).collect()
            }
            None => Vec::new(),
        };
        Some(Self {
            stats,
            curve,
            values: sorted,
        })
    }
}

/// Per-category, per-group summaries for box and violin plots
#[derive(Debug, Clone, PartialEq)]
pub struct Distribution<T> {
    pub categories: Vec<String>,
    pub groups: Vec<String>,
    /// `cells[category][group]`
    pub cells: Vec<Vec<Option<T>>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChartData {
    Bar {
        categories: Vec<String>,
        series: Vec<Series>,
    },
    Line {
        scale: XScale,
        series: Vec<PointSeries>,
    },
    Area {
        scale: XScale,
        xs: Vec<f64>,
        /// Missing points are filled with zero
        series: Vec<(String, Vec<f64>)>,
    },
    Scatter {
        x_scale: XScale,
        y_scale: XScale,
        series: Vec<PointSeries>,
    },
    Pie {
        slices: Vec<Slice>,
    },
    Histogram {
        edges: Vec<f64>,
        series: Vec<HistSeries>,
    },
    Box(Distribution<BoxStats>),
    Violin(Distribution<ViolinStats>),
    Heatmap {
        labels: Vec<String>,
        matrix: Vec<Vec<Option<f64>>>,
    },
}

/// Plot-ready data plus any notes on what was left out
#[derive(Debug, Clone, PartialEq)]
pub struct Prepared {
    pub data: ChartData,
    pub warnings: Vec<String>,
}

pub fn prepare(table: &DataTable, spec: &ChartSpec) -> RenderResult<Prepared> {
    let mut warnings = Vec::new();
    let data = match spec.options.clone().clamped() {
        ChartOptions::Bar(_) => bar(table, spec, &mut warnings)?,
        ChartOptions::Line(_) => line(table, spec, &mut warnings)?,
        ChartOptions::Area(_) => area(table, spec, &mut warnings)?,
        ChartOptions::Scatter(_) => scatter(table, spec, &mut warnings)?,
        ChartOptions::Pie(_) => pie(table, spec, &mut warnings)?,
        ChartOptions::Histogram(o) => histogram(table, spec, o.bins as usize, o.kde)?,
        ChartOptions::Box(_) => {
            ChartData::Box(distribution(table, spec, &mut warnings, BoxStats::compute)?)
        }
        ChartOptions::Violin(_) => {
            ChartData::Violin(distribution(table, spec, &mut warnings, ViolinStats::compute)?)
        }
        ChartOptions::Heatmap(_) => heatmap(table)?,
    };
    Ok(Prepared { data, warnings })
}

fn all_rows(table: &DataTable) -> Vec<usize> {
    (0..table.row_count()).collect()
}

fn numeric_column<'a>(table: &'a DataTable, name: &str) -> RenderResult<&'a DataColumn> {
    let column = table.column(name)?;
    if column.kind == ColumnKind::Numeric {
        Ok(column)
    } else {
        Err(RenderError::NonNumeric(name.to_string()))
    }
}

fn group_column<'a>(table: &'a DataTable, spec: &ChartSpec) -> RenderResult<Option<&'a DataColumn>> {
    spec.group_column
        .as_deref()
        .map(|g| table.column(g))
        .transpose()
}

/// Drop rows outside the most frequent categories of a wide categorical column
fn limit_categories(
    table: &DataTable,
    column: &DataColumn,
    rows: Vec<usize>,
    warnings: &mut Vec<String>,
) -> Vec<usize> {
    if column.kind != ColumnKind::Categorical {
        return rows;
    }
    match top_keys(column, table.row_count(), MAX_CATEGORIES) {
        None => rows,
        Some(keep) => {
            warnings.push(format!(
                "'{}' has more than {} distinct values; showing the {} most frequent",
                column.name, MAX_CATEGORIES, MAX_CATEGORIES
            ));
            rows.into_iter()
                .filter(|&i| column.key(i).is_some_and(|k| keep.contains(&k)))
                .collect()
        }
    }
}

/// Split rows by the group column's value, groups in key order. Without a
/// group column everything is one series named `fallback`.
fn partition(group: Option<&DataColumn>, rows: &[usize], fallback: &str) -> Vec<(String, Vec<usize>)> {
    match group {
        None => vec![(fallback.to_string(), rows.to_vec())],
        Some(column) => {
            let mut groups: BTreeMap<AxisKey, Vec<usize>> = BTreeMap::new();
            for &i in rows {
                if let Some(key) = column.key(i) {
                    groups.entry(key).or_default().push(i);
                }
            }
            groups
                .into_iter()
                .map(|(key, rows)| (key.to_string(), rows))
                .collect()
        }
    }
}

/// Position of rows along a line or area x axis
struct XAxis<'a> {
    column: &'a DataColumn,
    categories: Vec<AxisKey>,
}

impl<'a> XAxis<'a> {
    fn new(column: &'a DataColumn, rows: &[usize], sort_categories: bool) -> Self {
        let categories = if column.kind == ColumnKind::Categorical {
            let mut keys = keys_in_order(column, rows);
            if sort_categories {
                keys.sort();
            }
            keys
        } else {
            Vec::new()
        };
        Self { column, categories }
    }

    fn position(&self, i: usize) -> Option<f64> {
        match self.column.kind {
            ColumnKind::Numeric => self.column.number(i),
            ColumnKind::Date => self.column.day(i),
            ColumnKind::Categorical => {
                let key = self.column.key(i)?;
                self.categories
                    .iter()
                    .position(|k| *k == key)
                    .map(|p| p as f64)
            }
        }
    }

    fn scale(&self) -> XScale {
        match self.column.kind {
            ColumnKind::Numeric => XScale::Numeric,
            ColumnKind::Date => XScale::Date,
            ColumnKind::Categorical => {
                XScale::Category(self.categories.iter().map(ToString::to_string).collect())
            }
        }
    }
}

/// Mean of y per x category, one series per group
fn bar(table: &DataTable, spec: &ChartSpec, warnings: &mut Vec<String>) -> RenderResult<ChartData> {
    let x = table.column(&spec.x_column)?;
    let y = numeric_column(table, &spec.y_column)?;
    let group = group_column(table, spec)?;
    let rows = limit_categories(table, x, all_rows(table), warnings);

    let grouped: Vec<(String, BTreeMap<AxisKey, Vec<f64>>)> = partition(group, &rows, &y.name)
        .into_iter()
        .map(|(name, rows)| (name, group_numbers(x, y, &rows)))
        .collect();
    let keys: BTreeSet<AxisKey> = grouped
        .iter()
        .flat_map(|(_, m)| m.keys().cloned())
        .collect();
    if keys.is_empty() {
        return Err(RenderError::EmptyData(y.name.clone()));
    }

    let series = grouped
        .into_iter()
        .map(|(name, m)| Series {
            name,
            values: keys
                .iter()
                .map(|k| m.get(k).and_then(|v| stats::mean(v)))
                .collect(),
        })
        .collect();
    Ok(ChartData::Bar {
        categories: keys.iter().map(ToString::to_string).collect(),
        series,
    })
}

/// Raw points; numeric and date x sorted, categorical x in row order
fn line(table: &DataTable, spec: &ChartSpec, warnings: &mut Vec<String>) -> RenderResult<ChartData> {
    let x = table.column(&spec.x_column)?;
    let y = numeric_column(table, &spec.y_column)?;
    let group = group_column(table, spec)?;
    let rows = limit_categories(table, x, all_rows(table), warnings);
    let axis = XAxis::new(x, &rows, false);

    let series: Vec<PointSeries> = partition(group, &rows, &y.name)
        .into_iter()
        .map(|(name, rows)| {
            let mut points: Vec<(f64, f64)> = rows
                .iter()
                .filter_map(|&i| Some((axis.position(i)?, y.number(i)?)))
                .collect();
            if x.kind != ColumnKind::Categorical {
                points.sort_by(|a, b| a.0.total_cmp(&b.0));
            }
            PointSeries { name, points }
        })
        .filter(|s| !s.points.is_empty())
        .collect();
    if series.is_empty() {
        return Err(RenderError::EmptyData(y.name.clone()));
    }
    Ok(ChartData::Line {
        scale: axis.scale(),
        series,
    })
}

/// Mean of y per x, groups pivoted onto a shared sorted x
fn area(table: &DataTable, spec: &ChartSpec, warnings: &mut Vec<String>) -> RenderResult<ChartData> {
    let x = table.column(&spec.x_column)?;
    let y = numeric_column(table, &spec.y_column)?;
    let group = group_column(table, spec)?;
    let rows = limit_categories(table, x, all_rows(table), warnings);
    let axis = XAxis::new(x, &rows, true);

    let grouped: Vec<(String, BTreeMap<AxisKey, Vec<f64>>)> = partition(group, &rows, &y.name)
        .into_iter()
        .map(|(name, rows)| {
            let mut by_x: BTreeMap<AxisKey, Vec<f64>> = BTreeMap::new();
            for i in rows {
                if let (Some(p), Some(v)) = (axis.position(i), y.number(i)) {
                    by_x.entry(AxisKey::Number(p)).or_default().push(v);
                }
            }
            (name, by_x)
        })
        .collect();
    let keys: BTreeSet<AxisKey> = grouped
        .iter()
        .flat_map(|(_, m)| m.keys().cloned())
        .collect();
    if keys.is_empty() {
        return Err(RenderError::EmptyData(y.name.clone()));
    }

    let series = grouped
        .into_iter()
        .map(|(name, m)| {
            let values = keys
                .iter()
                .map(|k| m.get(k).and_then(|v| stats::mean(v)).unwrap_or(0.0))
                .collect();
            (name, values)
        })
        .collect();
    Ok(ChartData::Area {
        scale: axis.scale(),
        xs: keys.iter().filter_map(AxisKey::as_number).collect(),
        series,
    })
}

/// Map a scatter axis to numbers. Narrow categorical columns become codes,
/// wide ones become ranks.
fn scatter_axis(
    column: &DataColumn,
    rows: &[usize],
    warnings: &mut Vec<String>,
) -> (XScale, Vec<Option<f64>>) {
    match column.kind {
        ColumnKind::Numeric => (XScale::Numeric, rows.iter().map(|&i| column.number(i)).collect()),
        ColumnKind::Date => (XScale::Date, rows.iter().map(|&i| column.day(i)).collect()),
        ColumnKind::Categorical => {
            let keys = keys_in_order(column, rows);
            let code = |keys: &[AxisKey], i: usize| -> Option<f64> {
                let key = column.key(i)?;
                keys.iter().position(|k| *k == key).map(|p| p as f64)
            };
            if keys.len() <= MAX_CATEGORIES {
                let codes = rows.iter().map(|&i| code(&keys, i)).collect();
                let labels = keys.iter().map(ToString::to_string).collect();
                return (XScale::Category(labels), codes);
            }

            warnings.push(format!(
                "'{}' has more than {} distinct values; plotted by rank",
                column.name, MAX_CATEGORIES
            ));
            let mut ordered = keys;
            ordered.sort();
            let present: Vec<(usize, f64)> = rows
                .iter()
                .enumerate()
                .filter_map(|(slot, &i)| Some((slot, code(&ordered, i)?)))
                .collect();
            let codes: Vec<f64> = present.iter().map(|p| p.1).collect();
            let mut ranked = vec![None; rows.len()];
            for ((slot, _), rank) in present.iter().zip(stats::average_ranks(&codes)) {
                ranked[*slot] = Some(rank);
            }
            (XScale::Numeric, ranked)
        }
    }
}

fn scatter(table: &DataTable, spec: &ChartSpec, warnings: &mut Vec<String>) -> RenderResult<ChartData> {
    let x = table.column(&spec.x_column)?;
    let y = table.column(&spec.y_column)?;
    let group = group_column(table, spec)?;
    let rows = all_rows(table);
    let (x_scale, xs) = scatter_axis(x, &rows, warnings);
    let (y_scale, ys) = scatter_axis(y, &rows, warnings);

    let series: Vec<PointSeries> = partition(group, &rows, &y.name)
        .into_iter()
        .map(|(name, rows)| PointSeries {
            name,
            points: rows
                .iter()
                .filter_map(|&i| Some((xs[i]?, ys[i]?)))
                .collect(),
        })
        .filter(|s| !s.points.is_empty())
        .collect();
    if series.is_empty() {
        return Err(RenderError::EmptyData(y.name.clone()));
    }
    Ok(ChartData::Scatter {
        x_scale,
        y_scale,
        series,
    })
}

/// Sum of y per x. Keeps the largest slices when there are too many.
fn pie(table: &DataTable, spec: &ChartSpec, warnings: &mut Vec<String>) -> RenderResult<ChartData> {
    let x = table.column(&spec.x_column)?;
    let y = numeric_column(table, &spec.y_column)?;

    let mut slices: Vec<Slice> = group_numbers(x, y, &all_rows(table))
        .into_iter()
        .map(|(key, values)| Slice {
            label: key.to_string(),
            value: values.iter().sum(),
        })
        .collect();
    if slices.is_empty() {
        return Err(RenderError::EmptyData(y.name.clone()));
    }
    if slices.iter().any(|s| s.value < 0.0) {
        return Err(RenderError::InvalidData(format!(
            "Pie charts cannot show negative totals in '{}'",
            y.name
        )));
    }
    if slices.iter().map(|s| s.value).sum::<f64>() <= 0.0 {
        return Err(RenderError::InvalidData(format!(
            "Values in '{}' sum to zero",
            y.name
        )));
    }

    if slices.len() > MAX_PIE_SLICES {
        warnings.push(format!(
            "Showing the {} largest of {} slices",
            MAX_PIE_SLICES,
            slices.len()
        ));
        slices.sort_by(|a, b| b.value.total_cmp(&a.value));
        slices.truncate(MAX_PIE_SLICES);
    }
    Ok(ChartData::Pie { slices })
}

/// Counts over bins shared by every group
fn histogram(table: &DataTable, spec: &ChartSpec, bins: usize, kde: bool) -> RenderResult<ChartData> {
    let x = numeric_column(table, &spec.x_column)?;
    let group = group_column(table, spec)?;

    let groups: Vec<(String, Vec<f64>)> = partition(group, &all_rows(table), &x.name)
        .into_iter()
        .map(|(name, rows)| (name, rows.iter().filter_map(|&i| x.number(i)).collect::<Vec<f64>>()))
        .filter(|(_, values)| !values.is_empty())
        .collect();
    if groups.is_empty() {
        return Err(RenderError::EmptyData(x.name.clone()));
    }

    let (min, max) = groups
        .iter()
        .flat_map(|(_, v)| v.iter())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let edges = stats::histogram_edges(min, max, bins);
    let width = edges[1] - edges[0];
    let lo = edges[0];
    let hi = edges[edges.len() - 1];

    let series = groups
        .into_iter()
        .map(|(name, values)| {
            let density = if kde {
                stats::scott_bandwidth(&values).map(|bw| {
                    let xs = stats::linspace(lo, hi, KDE_POINTS);
                    let scale = values.len() as f64 * width;
                    let ys = stats::kde(&values, bw, &xs);
                    xs.into_iter().zip(ys.into_iter().map(|d| d * scale)).collect()
                })
            } else {
                None
            };
            HistSeries {
                name,
                counts: stats::histogram_counts(&values, &edges),
                density,
            }
        })
        .collect();
    Ok(ChartData::Histogram { edges, series })
}

/// y summarized per x category and group
fn distribution<T>(
    table: &DataTable,
    spec: &ChartSpec,
    warnings: &mut Vec<String>,
    summarize: impl Fn(&[f64]) -> Option<T>,
) -> RenderResult<Distribution<T>> {
    let x = table.column(&spec.x_column)?;
    let y = numeric_column(table, &spec.y_column)?;
    let group = group_column(table, spec)?;
    let rows = limit_categories(table, x, all_rows(table), warnings);

    let grouped: Vec<(String, BTreeMap<AxisKey, Vec<f64>>)> = partition(group, &rows, &y.name)
        .into_iter()
        .map(|(name, rows)| (name, group_numbers(x, y, &rows)))
        .collect();
    let keys: BTreeSet<AxisKey> = grouped
        .iter()
        .flat_map(|(_, m)| m.keys().cloned())
        .collect();
    if keys.is_empty() {
        return Err(RenderError::EmptyData(y.name.clone()));
    }

    let cells = keys
        .iter()
        .map(|k| {
            grouped
                .iter()
                .map(|(_, m)| m.get(k).and_then(|v| summarize(v)))
                .collect()
        })
        .collect();
    Ok(Distribution {
        categories: keys.iter().map(ToString::to_string).collect(),
        groups: grouped.into_iter().map(|(name, _)| name).collect(),
        cells,
    })
}

/// Pairwise-complete Pearson correlation of every numeric column
fn heatmap(table: &DataTable) -> RenderResult<ChartData> {
    let numeric = table.numeric_columns();
    if numeric.len() < 2 {
        return Err(RenderError::NotEnoughNumericColumns {
            found: numeric.len(),
        });
    }
    let values: Vec<Vec<Option<f64>>> = numeric
        .iter()
        .map(|c| (0..table.row_count()).map(|i| c.number(i)).collect())
        .collect();
    let matrix = values
        .iter()
        .map(|a| values.iter().map(|b| stats::pearson(a, b)).collect())
        .collect();
    Ok(ChartData::Heatmap {
        labels: numeric.iter().map(|c| c.name.clone()).collect(),
        matrix,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::types::{CellValue, ColumnDef, DataType, Row};
    use crate::viz::spec::{ChartKind, HistogramOptions};

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    fn sales() -> DataTable {
        let columns = vec![
            ColumnDef::new("region", DataType::Text),
            ColumnDef::new("amount", DataType::Integer),
            ColumnDef::new("year", DataType::Integer),
            ColumnDef::new("team", DataType::Text),
        ];
        let rows = vec![
            ("north", 10, 2021, "a"),
            ("north", 20, 2022, "b"),
            ("south", 5, 2021, "a"),
            ("east", 7, 2020, "b"),
        ]
        .into_iter()
        .map(|(r, a, y, t)| {
            Row::new(vec![
                text(r),
                CellValue::Integer(a),
                CellValue::Integer(y),
                text(t),
            ])
        })
        .collect::<Vec<_>>();
        DataTable::new(&columns, &rows).unwrap()
    }

    fn wide(distinct: usize) -> DataTable {
        let columns = vec![
            ColumnDef::new("name", DataType::Text),
            ColumnDef::new("v", DataType::Integer),
        ];
        let mut rows = Vec::new();
        for i in 0..distinct {
            // Earlier names appear more often
            let repeats = if i < 3 { 3 } else { 1 };
            for _ in 0..repeats {
                rows.push(Row::new(vec![
                    text(&format!("n{:02}", i)),
                    CellValue::Integer(i as i64 + 1),
                ]));
            }
        }
        DataTable::new(&columns, &rows).unwrap()
    }

    #[test]
    fn test_bar_means_sorted() {
        let out = prepare(&sales(), &ChartSpec::new(ChartKind::Bar, "region", "amount")).unwrap();
        assert!(out.warnings.is_empty());
        match out.data {
            ChartData::Bar { categories, series } => {
                assert_eq!(categories, vec!["east", "north", "south"]);
                assert_eq!(series.len(), 1);
                assert_eq!(series[0].name, "amount");
                assert_eq!(series[0].values, vec![Some(7.0), Some(15.0), Some(5.0)]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_bar_grouped() {
        let spec = ChartSpec::new(ChartKind::Bar, "region", "amount").with_group(Some("team"));
        match prepare(&sales(), &spec).unwrap().data {
            ChartData::Bar { series, .. } => {
                assert_eq!(series.len(), 2);
                assert_eq!(series[0].name, "a");
                assert_eq!(series[0].values, vec![None, Some(10.0), Some(5.0)]);
                assert_eq!(series[1].values, vec![Some(7.0), Some(20.0), None]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_bar_needs_numeric_y() {
        let err = prepare(&sales(), &ChartSpec::new(ChartKind::Bar, "amount", "region")).unwrap_err();
        assert_eq!(err, RenderError::NonNumeric("region".into()));
    }

    #[test]
    fn test_missing_group_column() {
        let spec = ChartSpec::new(ChartKind::Bar, "region", "amount").with_group(Some("nope"));
        assert_eq!(
            prepare(&sales(), &spec).unwrap_err(),
            RenderError::MissingColumn("nope".into())
        );
    }

    #[test]
    fn test_wide_category_limited() {
        let out = prepare(&wide(25), &ChartSpec::new(ChartKind::Bar, "name", "v")).unwrap();
        assert_eq!(out.warnings.len(), 1);
        match out.data {
            ChartData::Bar { categories, .. } => {
                assert_eq!(categories.len(), MAX_CATEGORIES);
                assert!(categories.contains(&"n00".to_string()));
                assert!(categories.contains(&"n02".to_string()));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_line_sorted_by_x() {
        let out = prepare(&sales(), &ChartSpec::new(ChartKind::Line, "year", "amount")).unwrap();
        match out.data {
            ChartData::Line { scale, series } => {
                assert_eq!(scale, XScale::Numeric);
                let xs: Vec<f64> = series[0].points.iter().map(|p| p.0).collect();
                assert_eq!(xs, vec![2020.0, 2021.0, 2021.0, 2022.0]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_line_categorical_keeps_row_order() {
        let out = prepare(&sales(), &ChartSpec::new(ChartKind::Line, "region", "amount")).unwrap();
        match out.data {
            ChartData::Line { scale, series } => {
                assert_eq!(
                    scale,
                    XScale::Category(vec!["north".into(), "south".into(), "east".into()])
                );
                assert_eq!(series[0].points[3], (2.0, 7.0));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_line_date_axis() {
        let columns = vec![
            ColumnDef::new("day", DataType::Date),
            ColumnDef::new("n", DataType::Integer),
        ];
        let rows = vec![
            Row::new(vec![CellValue::DateTime("2024-01-03".into()), CellValue::Integer(3)]),
            Row::new(vec![CellValue::DateTime("2024-01-01".into()), CellValue::Integer(1)]),
        ];
        let table = DataTable::new(&columns, &rows).unwrap();
        match prepare(&table, &ChartSpec::new(ChartKind::Line, "day", "n")).unwrap().data {
            ChartData::Line { scale, series } => {
                assert_eq!(scale, XScale::Date);
                assert_eq!(series[0].points[0].1, 1.0);
                assert_eq!(series[0].points[1].0 - series[0].points[0].0, 2.0);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_area_fills_missing_with_zero() {
        let spec = ChartSpec::new(ChartKind::Area, "year", "amount").with_group(Some("team"));
        match prepare(&sales(), &spec).unwrap().data {
            ChartData::Area { xs, series, .. } => {
                assert_eq!(xs, vec![2020.0, 2021.0, 2022.0]);
                assert_eq!(series[0], ("a".to_string(), vec![0.0, 7.5, 0.0]));
                assert_eq!(series[1], ("b".to_string(), vec![7.0, 0.0, 20.0]));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_scatter_codes_categories() {
        let out = prepare(&sales(), &ChartSpec::new(ChartKind::Scatter, "region", "amount")).unwrap();
        assert!(out.warnings.is_empty());
        match out.data {
            ChartData::Scatter { x_scale, series, .. } => {
                assert!(matches!(x_scale, XScale::Category(ref l) if l.len() == 3));
                assert_eq!(series[0].points[0], (0.0, 10.0));
                assert_eq!(series[0].points[3], (2.0, 7.0));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_scatter_ranks_wide_categories() {
        let out = prepare(&wide(25), &ChartSpec::new(ChartKind::Scatter, "name", "v")).unwrap();
        assert_eq!(out.warnings.len(), 1);
        match out.data {
            ChartData::Scatter { x_scale, series, .. } => {
                assert_eq!(x_scale, XScale::Numeric);
                // The three copies of n00 tie for ranks 1..3
                assert_eq!(series[0].points[0].0, 2.0);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_pie_sums() {
        match prepare(&sales(), &ChartSpec::new(ChartKind::Pie, "region", "amount")).unwrap().data {
            ChartData::Pie { slices } => {
                let values: Vec<f64> = slices.iter().map(|s| s.value).collect();
                assert_eq!(values, vec![7.0, 30.0, 5.0]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_pie_keeps_largest_slices() {
        let out = prepare(&wide(15), &ChartSpec::new(ChartKind::Pie, "name", "v")).unwrap();
        assert_eq!(out.warnings.len(), 1);
        match out.data {
            ChartData::Pie { slices } => {
                assert_eq!(slices.len(), MAX_PIE_SLICES);
                assert_eq!(slices[0].label, "n14");
                assert_eq!(slices[0].value, 15.0);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_pie_rejects_negative() {
        let columns = vec![
            ColumnDef::new("k", DataType::Text),
            ColumnDef::new("v", DataType::Integer),
        ];
        let rows = vec![
            Row::new(vec![text("a"), CellValue::Integer(-1)]),
            Row::new(vec![text("b"), CellValue::Integer(3)]),
        ];
        let table = DataTable::new(&columns, &rows).unwrap();
        let err = prepare(&table, &ChartSpec::new(ChartKind::Pie, "k", "v")).unwrap_err();
        assert!(matches!(err, RenderError::InvalidData(_)));
    }

    #[test]
    fn test_histogram_shared_edges() {
        let spec = ChartSpec::new(ChartKind::Histogram, "amount", "")
            .with_group(Some("team"))
            .with_options(ChartOptions::Histogram(HistogramOptions { bins: 3, kde: true }));
        match prepare(&sales(), &spec).unwrap().data {
            ChartData::Histogram { edges, series } => {
                assert_eq!(edges, vec![5.0, 10.0, 15.0, 20.0]);
                assert_eq!(series[0].counts, vec![1, 1, 0]);
                assert_eq!(series[1].counts, vec![1, 0, 1]);
                assert!(series[0].density.is_some());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_histogram_needs_numeric_x() {
        let err = prepare(&sales(), &ChartSpec::new(ChartKind::Histogram, "region", "")).unwrap_err();
        assert_eq!(err, RenderError::NonNumeric("region".into()));
    }

    #[test]
    fn test_box_per_category() {
        match prepare(&sales(), &ChartSpec::new(ChartKind::Box, "region", "amount")).unwrap().data {
            ChartData::Box(d) => {
                assert_eq!(d.categories, vec!["east", "north", "south"]);
                assert_eq!(d.groups, vec!["amount"]);
                let north = d.cells[1][0].as_ref().unwrap();
                assert_eq!(north.median, 15.0);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_violin_curve() {
        match prepare(&sales(), &ChartSpec::new(ChartKind::Violin, "team", "amount")).unwrap().data {
            ChartData::Violin(d) => {
                let a = d.cells[0][0].as_ref().unwrap();
                assert_eq!(a.values, vec![5.0, 10.0]);
                assert_eq!(a.curve.len(), VIOLIN_POINTS);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_heatmap_needs_two_numeric_columns() {
        let columns = vec![
            ColumnDef::new("k", DataType::Text),
            ColumnDef::new("v", DataType::Integer),
        ];
        let rows = vec![Row::new(vec![text("a"), CellValue::Integer(1)])];
        let table = DataTable::new(&columns, &rows).unwrap();
        let err = prepare(&table, &ChartSpec::new(ChartKind::Heatmap, "", "")).unwrap_err();
        assert_eq!(err, RenderError::NotEnoughNumericColumns { found: 1 });
    }

    #[test]
    fn test_heatmap_matrix() {
        match prepare(&sales(), &ChartSpec::new(ChartKind::Heatmap, "", "")).unwrap().data {
            ChartData::Heatmap { labels, matrix } => {
                assert_eq!(labels, vec!["amount", "year"]);
                assert!((matrix[0][0].unwrap() - 1.0).abs() < 1e-9);
                assert_eq!(matrix[0][1], matrix[1][0]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
