//! Drawing prepared chart data onto a plotters backend
//!
//! Category axes use plain f64 coordinates: category `i` is centred on `i`
//! and its label is placed by hand below (or left of) the plotting area.
//! Raster backends cannot rasterize glyphs with the built-in font, so they
//! are drawn with `text: false`, which leaves out every caption, tick label,
//! legend and annotation.

use super::palette::contrast_text;
use super::prepare::{ChartData, Distribution, HistSeries, PointSeries, Series, Slice, ViolinStats, XScale};
use super::spec::{
    AreaOptions, BarOptions, BoxOptions, ChartOptions, ChartSpec, HeatmapOptions, LineOptions,
    LineStyle, Marker, Orientation, PieLabels, PieOptions, ScatterOptions, ViolinInner,
    ViolinOptions,
};
use super::stats::BoxStats;
use crate::error::{RenderError, RenderResult};
use chrono::NaiveDate;
use plotters::coord::Shift;
use plotters::coord::cartesian::Cartesian2d;
use plotters::coord::types::RangedCoordf64;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::error::Error;
use std::ops::Range;
use unicode_truncate::UnicodeTruncateStr;
use unicode_width::UnicodeWidthStr;

type DrawResult<T = ()> = Result<T, Box<dyn Error>>;
type Chart<'a, DB> = ChartContext<'a, DB, Cartesian2d<RangedCoordf64, RangedCoordf64>>;

const FONT: &str = "sans-serif";
/// Display width of a category label before it is cut
const LABEL_WIDTH: usize = 14;
const GRID: RGBColor = RGBColor(225, 225, 225);
const MISSING: RGBColor = RGBColor(235, 235, 235);
/// Share of a category slot used by its boxes, violins or bars
const SLOT: f64 = 0.8;

/// Draw `data` for `spec` onto `root`
pub fn draw<DB>(
    root: &DrawingArea<DB, Shift>,
    spec: &ChartSpec,
    data: &ChartData,
    text: bool,
) -> RenderResult<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let painter = Painter {
        spec,
        options: spec.options.clone().clamped(),
        text,
    };
    painter
        .paint(root, data)
        .map_err(|e| RenderError::Backend(e.to_string()))
}

struct Painter<'s> {
    spec: &'s ChartSpec,
    options: ChartOptions,
    text: bool,
}

/// Axis titles and tick formatting for one chart
struct Axes<'f> {
    x_desc: &'f str,
    y_desc: &'f str,
    x_fmt: &'f dyn Fn(&f64) -> String,
    y_fmt: &'f dyn Fn(&f64) -> String,
    margin_right: u32,
}

/// Grouped distributions colour by group, ungrouped ones by category
struct CellColors {
    colors: Vec<RGBColor>,
    grouped: bool,
}

impl CellColors {
    fn get(&self, category: usize, group: usize) -> RGBColor {
        self.colors[if self.grouped { group } else { category }]
    }
}

#[derive(Clone, Copy)]
enum Side {
    Bottom,
    Left,
}

impl Painter<'_> {
    fn paint<DB>(&self, root: &DrawingArea<DB, Shift>, data: &ChartData) -> DrawResult
    where
        DB: DrawingBackend,
        DB::ErrorType: 'static,
    {
        root.fill(&WHITE)?;
        match (data, &self.options) {
            (ChartData::Bar { categories, series }, ChartOptions::Bar(o)) => {
                self.bar(root, categories, series, o)
            }
            (ChartData::Line { scale, series }, ChartOptions::Line(o)) => {
                self.line(root, scale, series, o)
            }
            (ChartData::Area { scale, xs, series }, ChartOptions::Area(o)) => {
                self.area(root, scale, xs, series, o)
            }
            (ChartData::Scatter { x_scale, y_scale, series }, ChartOptions::Scatter(o)) => {
                self.scatter(root, x_scale, y_scale, series, o)
            }
            (ChartData::Pie { slices }, ChartOptions::Pie(o)) => self.pie(root, slices, o),
            (ChartData::Histogram { edges, series }, ChartOptions::Histogram(_)) => {
                self.histogram(root, edges, series)
            }
            (ChartData::Box(d), ChartOptions::Box(o)) => self.boxes(root, d, o),
            (ChartData::Violin(d), ChartOptions::Violin(o)) => self.violins(root, d, o),
            (ChartData::Heatmap { labels, matrix }, ChartOptions::Heatmap(o)) => {
                self.heatmap(root, labels, matrix, o)
            }
            _ => Err("chart data does not match the chart kind".into()),
        }
    }

    fn font(&self, size: f64) -> TextStyle<'static> {
        (FONT, size).into_font().color(&BLACK)
    }

    fn grouped(&self) -> bool {
        self.spec.group_column.is_some()
    }

    fn chart<'a, DB>(
        &self,
        root: &'a DrawingArea<DB, Shift>,
        x: Range<f64>,
        y: Range<f64>,
        axes: &Axes<'_>,
    ) -> DrawResult<Chart<'a, DB>>
    where
        DB: DrawingBackend,
        DB::ErrorType: 'static,
    {
        let mut builder = ChartBuilder::on(root);
        builder.margin(15).margin_right(axes.margin_right);
        if self.text {
            builder.x_label_area_size(45).y_label_area_size(70);
            if !self.spec.title.is_empty() {
                builder.caption(&self.spec.title, self.font(20.0));
            }
        } else {
            builder.x_label_area_size(10).y_label_area_size(10);
        }
        let mut chart = builder.build_cartesian_2d(x.clone(), y.clone())?;

        if self.text {
            chart
                .configure_mesh()
                .light_line_style(GRID)
                .x_desc(axes.x_desc)
                .y_desc(axes.y_desc)
                .x_label_formatter(axes.x_fmt)
                .y_label_formatter(axes.y_fmt)
                .label_style(self.font(12.0))
                .axis_desc_style(self.font(14.0))
                .draw()?;
        } else {
            chart.plotting_area().draw(&Rectangle::new(
                [(x.start, y.start), (x.end, y.end)],
                BLACK.stroke_width(1),
            ))?;
        }
        Ok(chart)
    }

    /// Write category names next to an axis. `at` is the value of the other
    /// axis where the labelled axis sits.
    fn category_labels<DB>(
        &self,
        root: &DrawingArea<DB, Shift>,
        chart: &Chart<'_, DB>,
        labels: &[(f64, String)],
        side: Side,
        at: f64,
    ) -> DrawResult
    where
        DB: DrawingBackend,
        DB::ErrorType: 'static,
    {
        if !self.text {
            return Ok(());
        }
        for (pos, label) in labels {
            let (x, y, anchor) = match side {
                Side::Bottom => {
                    let (x, y) = chart.backend_coord(&(*pos, at));
                    (x, y + 6, Pos::new(HPos::Center, VPos::Top))
                }
                Side::Left => {
                    let (x, y) = chart.backend_coord(&(at, *pos));
                    (x - 6, y, Pos::new(HPos::Right, VPos::Center))
                }
            };
            root.draw(&Text::new(short(label), (x, y), self.font(12.0).pos(anchor)))?;
        }
        Ok(())
    }

    fn legend<'a, DB>(&self, chart: &mut Chart<'a, DB>) -> DrawResult
    where
        DB: DrawingBackend + 'a,
        DB::ErrorType: 'static,
    {
        if self.text && self.grouped() {
            chart
                .configure_series_labels()
                .position(SeriesLabelPosition::UpperRight)
                .background_style(WHITE.mix(0.85))
                .border_style(BLACK)
                .draw()?;
        }
        Ok(())
    }

    /// Register a legend entry without drawing anything on the chart
    fn legend_entry<DB>(&self, chart: &mut Chart<'_, DB>, name: &str, color: RGBColor) -> DrawResult
    where
        DB: DrawingBackend,
        DB::ErrorType: 'static,
    {
        if self.grouped() {
            chart
                .draw_series(std::iter::empty::<Rectangle<(f64, f64)>>())?
                .label(name)
                .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 12, y + 5)], color.filled()));
        }
        Ok(())
    }

    fn bar<DB>(
        &self,
        root: &DrawingArea<DB, Shift>,
        categories: &[String],
        series: &[Series],
        o: &BarOptions,
    ) -> DrawResult
    where
        DB: DrawingBackend,
        DB::ErrorType: 'static,
    {
        let horizontal = o.orientation == Orientation::Horizontal;
        let values = from_zero(extent(
            series.iter().flat_map(|s| s.values.iter().flatten().copied()),
        ));
        let cats = category_range(categories.len());
        let blank = |_: &f64| String::new();
        let numeric = |v: &f64| format_number(*v);
        let axes = if horizontal {
            Axes {
                x_desc: &self.spec.y_label,
                y_desc: &self.spec.x_label,
                x_fmt: &numeric,
                y_fmt: &blank,
                margin_right: 15,
            }
        } else {
            Axes {
                x_desc: &self.spec.x_label,
                y_desc: &self.spec.y_label,
                x_fmt: &blank,
                y_fmt: &numeric,
                margin_right: 15,
            }
        };
        let (xr, yr) = orient(horizontal, cats, values.clone());
        let mut chart = self.chart(root, xr, yr, &axes)?;

        let colors = self.spec.color_scheme.colors(series.len());
        let slot = o.width_pct as f64 / 100.0;
        let width = slot / series.len().max(1) as f64;
        for (j, (s, &color)) in series.iter().zip(&colors).enumerate() {
            let bars = s.values.iter().enumerate().filter_map(|(i, v)| {
                let v = (*v)?;
                let left = i as f64 - slot / 2.0 + j as f64 * width;
                Some(Rectangle::new(
                    [place(horizontal, left, 0.0), place(horizontal, left + width, v)],
                    color.filled(),
                ))
            });
            chart.draw_series(bars)?;
            self.legend_entry(&mut chart, &s.name, color)?;
        }

        let side = if horizontal { Side::Left } else { Side::Bottom };
        self.category_labels(root, &chart, &indexed(categories), side, values.start)?;
        self.legend(&mut chart)
    }

    fn line<DB>(
        &self,
        root: &DrawingArea<DB, Shift>,
        scale: &XScale,
        series: &[PointSeries],
        o: &LineOptions,
    ) -> DrawResult
    where
        DB: DrawingBackend,
        DB::ErrorType: 'static,
    {
        let points = || series.iter().flat_map(|s| s.points.iter());
        let xr = scale_range(scale, extent(points().map(|p| p.0)));
        let yr = padded(extent(points().map(|p| p.1)));
        let x_fmt = tick_format(scale);
        let y_fmt = |v: &f64| format_number(*v);
        let axes = Axes {
            x_desc: &self.spec.x_label,
            y_desc: &self.spec.y_label,
            x_fmt: &*x_fmt,
            y_fmt: &y_fmt,
            margin_right: 15,
        };
        let mut chart = self.chart(root, xr, yr.clone(), &axes)?;

        let colors = self.spec.color_scheme.colors(series.len());
        for (s, &color) in series.iter().zip(&colors) {
            let style = color.stroke_width(o.width);
            if o.style == LineStyle::Solid {
                chart.draw_series(LineSeries::new(s.points.iter().copied(), style))?;
            } else {
                let pixels: Vec<(i32, i32)> =
                    s.points.iter().map(|p| chart.backend_coord(p)).collect();
                for dash in dash_segments(&pixels, &dash_pattern(o.style, o.width)) {
                    root.draw(&PathElement::new(dash, style))?;
                }
            }
            self.markers(&mut chart, &s.points, o.marker, color)?;
            if self.grouped() {
                chart
                    .draw_series(std::iter::empty::<PathElement<(f64, f64)>>())?
                    .label(s.name.as_str())
                    .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], style));
            }
        }

        if let XScale::Category(labels) = scale {
            self.category_labels(root, &chart, &indexed(labels), Side::Bottom, yr.start)?;
        }
        self.legend(&mut chart)
    }

    fn markers<DB>(
        &self,
        chart: &mut Chart<'_, DB>,
        points: &[(f64, f64)],
        marker: Marker,
        color: RGBColor,
    ) -> DrawResult
    where
        DB: DrawingBackend,
        DB::ErrorType: 'static,
    {
        let fill = color.filled();
        let stroke = color.stroke_width(2);
        let pts = points.iter().copied();
        match marker {
            Marker::None => {}
            Marker::Circle => {
                chart.draw_series(pts.map(|p| Circle::new(p, 4, fill)))?;
            }
            Marker::Square => {
                chart.draw_series(
                    pts.map(|p| EmptyElement::at(p) + Rectangle::new([(-4, -4), (4, 4)], fill)),
                )?;
            }
            Marker::Triangle => {
                chart.draw_series(pts.map(|p| TriangleMarker::new(p, 5, fill)))?;
            }
            Marker::Star => {
                let star = star_points(6.0);
                chart.draw_series(pts.map(|p| EmptyElement::at(p) + Polygon::new(star.clone(), fill)))?;
            }
            Marker::Plus => {
                chart.draw_series(pts.map(|p| {
                    EmptyElement::at(p)
                        + PathElement::new(vec![(-5, 0), (5, 0)], stroke)
                        + PathElement::new(vec![(0, -5), (0, 5)], stroke)
                }))?;
            }
            Marker::X => {
                chart.draw_series(pts.map(|p| Cross::new(p, 4, stroke)))?;
            }
        }
        Ok(())
    }

    fn area<DB>(
        &self,
        root: &DrawingArea<DB, Shift>,
        scale: &XScale,
        xs: &[f64],
        series: &[(String, Vec<f64>)],
        o: &AreaOptions,
    ) -> DrawResult
    where
        DB: DrawingBackend,
        DB::ErrorType: 'static,
    {
        // (lower, upper) per series
        let mut baseline = vec![0.0; xs.len()];
        let layers: Vec<(Vec<f64>, Vec<f64>)> = series
            .iter()
            .map(|(_, values)| {
                let lower = if o.stacked {
                    baseline.clone()
                } else {
                    vec![0.0; xs.len()]
                };
                let upper: Vec<f64> = lower.iter().zip(values).map(|(l, v)| l + v).collect();
                if o.stacked {
                    baseline = upper.clone();
                }
                (lower, upper)
            })
            .collect();

        let xr = scale_range(scale, extent(xs.iter().copied()));
        let yr = from_zero(extent(
            layers.iter().flat_map(|(l, u)| l.iter().chain(u.iter())).copied(),
        ));
        let x_fmt = tick_format(scale);
        let y_fmt = |v: &f64| format_number(*v);
        let axes = Axes {
            x_desc: &self.spec.x_label,
            y_desc: &self.spec.y_label,
            x_fmt: &*x_fmt,
            y_fmt: &y_fmt,
            margin_right: 15,
        };
        let mut chart = self.chart(root, xr, yr.clone(), &axes)?;

        let alpha = o.opacity as f64 / 100.0;
        let colors = self.spec.color_scheme.colors(series.len());
        for (((name, _), (lower, upper)), &color) in series.iter().zip(&layers).zip(&colors) {
            let mut outline: Vec<(f64, f64)> = xs.iter().copied().zip(upper.iter().copied()).collect();
            outline.extend(xs.iter().copied().zip(lower.iter().copied()).rev());
            chart.draw_series(std::iter::once(Polygon::new(outline, color.mix(alpha).filled())))?;
            chart.draw_series(LineSeries::new(
                xs.iter().copied().zip(upper.iter().copied()),
                color.stroke_width(2),
            ))?;
            self.legend_entry(&mut chart, name, color)?;
        }

        if let XScale::Category(labels) = scale {
            self.category_labels(root, &chart, &indexed(labels), Side::Bottom, yr.start)?;
        }
        self.legend(&mut chart)
    }

    fn scatter<DB>(
        &self,
        root: &DrawingArea<DB, Shift>,
        x_scale: &XScale,
        y_scale: &XScale,
        series: &[PointSeries],
        o: &ScatterOptions,
    ) -> DrawResult
    where
        DB: DrawingBackend,
        DB::ErrorType: 'static,
    {
        let points = || series.iter().flat_map(|s| s.points.iter());
        let xr = scale_range(x_scale, extent(points().map(|p| p.0)));
        let yr = scale_range(y_scale, extent(points().map(|p| p.1)));
        let x_fmt = tick_format(x_scale);
        let y_fmt = tick_format(y_scale);
        let axes = Axes {
            x_desc: &self.spec.x_label,
            y_desc: &self.spec.y_label,
            x_fmt: &*x_fmt,
            y_fmt: &*y_fmt,
            margin_right: 15,
        };
        let mut chart = self.chart(root, xr.clone(), yr.clone(), &axes)?;

        // Point size is an area, as in matplotlib
        let radius = ((o.point_size as f64).sqrt() / 2.0).round().max(1.0) as i32;
        let alpha = o.opacity as f64 / 100.0;
        let colors = self.spec.color_scheme.colors(series.len());
        for (s, &color) in series.iter().zip(&colors) {
            let style = color.mix(alpha).filled();
            chart.draw_series(s.points.iter().map(|&p| Circle::new(p, radius, style)))?;
            self.legend_entry(&mut chart, &s.name, color)?;
        }

        if let XScale::Category(labels) = x_scale {
            self.category_labels(root, &chart, &indexed(labels), Side::Bottom, yr.start)?;
        }
        if let XScale::Category(labels) = y_scale {
            self.category_labels(root, &chart, &indexed(labels), Side::Left, xr.start)?;
        }
        self.legend(&mut chart)
    }

    fn pie<DB>(&self, root: &DrawingArea<DB, Shift>, slices: &[Slice], o: &PieOptions) -> DrawResult
    where
        DB: DrawingBackend,
        DB::ErrorType: 'static,
    {
        if self.text && !self.spec.title.is_empty() {
            let area = root.titled(&self.spec.title, self.font(20.0))?;
            self.wedges(&area, slices, o)
        } else {
            self.wedges(root, slices, o)
        }
    }

    fn wedges<DB>(&self, area: &DrawingArea<DB, Shift>, slices: &[Slice], o: &PieOptions) -> DrawResult
    where
        DB: DrawingBackend,
        DB::ErrorType: 'static,
    {
        let (w, h) = area.dim_in_pixel();
        let radius = w.min(h) as f64 * 0.35;
        let centre = (w as f64 / 2.0, h as f64 / 2.0);
        let total: f64 = slices.iter().map(|s| s.value).sum();
        let largest = slices
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.value.total_cmp(&b.1.value))
            .map(|(i, _)| i);
        let colors = self.spec.color_scheme.colors(slices.len());

        let mut angle = o.start_angle as f64;
        for (i, (slice, &color)) in slices.iter().zip(&colors).enumerate() {
            let sweep = slice.value / total * 360.0;
            if sweep <= 0.0 {
                continue;
            }
            let mid = angle + sweep / 2.0;
            let centre = if o.explode && largest == Some(i) {
                polar(centre, radius * 0.1, mid)
            } else {
                centre
            };

            let steps = (sweep / 2.0).ceil().max(1.0) as usize;
            let mut wedge = vec![pixel(centre)];
            for k in 0..=steps {
                let a = angle + sweep * k as f64 / steps as f64;
                wedge.push(pixel(polar(centre, radius, a)));
            }
            area.draw(&Polygon::new(wedge.clone(), color.filled()))?;
            wedge.push(wedge[0]);
            area.draw(&PathElement::new(wedge, WHITE.stroke_width(2)))?;

            if self.text {
                let (lx, ly) = polar(centre, radius * 1.12, mid);
                let h_pos = if (lx - centre.0).abs() < 1.0 {
                    HPos::Center
                } else if lx > centre.0 {
                    HPos::Left
                } else {
                    HPos::Right
                };
                area.draw(&Text::new(
                    short(&slice.label),
                    pixel((lx, ly)),
                    self.font(12.0).pos(Pos::new(h_pos, VPos::Center)),
                ))?;

                let pct = format!("{:.1}%", slice.value / total * 100.0);
                let inner = match o.labels {
                    PieLabels::None => None,
                    PieLabels::Percentage => Some(pct),
                    PieLabels::Value => Some(format_number(slice.value)),
                    PieLabels::Both => Some(format!("{} ({})", format_number(slice.value), pct)),
                };
                if let Some(inner) = inner {
                    let text_color = contrast_text(color);
                    let style = self
                        .font(11.0)
                        .color(&text_color)
                        .pos(Pos::new(HPos::Center, VPos::Center));
                    area.draw(&Text::new(inner, pixel(polar(centre, radius * 0.6, mid)), style))?;
                }
            }
            angle += sweep;
        }
        Ok(())
    }

    fn histogram<DB>(&self, root: &DrawingArea<DB, Shift>, edges: &[f64], series: &[HistSeries]) -> DrawResult
    where
        DB: DrawingBackend,
        DB::ErrorType: 'static,
    {
        let lo = edges[0];
        let hi = edges[edges.len() - 1];
        let peak = series.iter().flat_map(|s| {
            s.counts
                .iter()
                .map(|&c| c as f64)
                .chain(s.density.iter().flatten().map(|p| p.1))
        });
        let yr = from_zero(extent(peak));
        let fmt = |v: &f64| format_number(*v);
        let axes = Axes {
            x_desc: &self.spec.x_label,
            y_desc: "Frequency",
            x_fmt: &fmt,
            y_fmt: &fmt,
            margin_right: 15,
        };
        let mut chart = self.chart(root, padded((lo, hi)), yr, &axes)?;

        let alpha = if series.len() > 1 { 0.5 } else { 0.8 };
        let colors = self.spec.color_scheme.colors(series.len());
        for (s, &color) in series.iter().zip(&colors) {
            let bars = s.counts.iter().enumerate().filter(|(_, c)| **c > 0).map(|(i, &c)| {
                [(edges[i], 0.0), (edges[i + 1], c as f64)]
            });
            chart.draw_series(bars.clone().map(|r| Rectangle::new(r, color.mix(alpha).filled())))?;
            chart.draw_series(bars.map(|r| Rectangle::new(r, WHITE.stroke_width(1))))?;
            if let Some(density) = &s.density {
                chart.draw_series(LineSeries::new(density.iter().copied(), color.stroke_width(2)))?;
            }
            self.legend_entry(&mut chart, &s.name, color)?;
        }
        self.legend(&mut chart)
    }

    /// Chart with categories on one axis and values on the other, shared by
    /// box and violin plots
    fn distribution_chart<'a, DB>(
        &self,
        root: &'a DrawingArea<DB, Shift>,
        n: usize,
        values: Range<f64>,
        horizontal: bool,
    ) -> DrawResult<Chart<'a, DB>>
    where
        DB: DrawingBackend,
        DB::ErrorType: 'static,
    {
        let blank: &dyn Fn(&f64) -> String = &|_: &f64| String::new();
        let numeric: &dyn Fn(&f64) -> String = &|v: &f64| format_number(*v);
        let axes = if horizontal {
            Axes {
                x_desc: &self.spec.y_label,
                y_desc: &self.spec.x_label,
                x_fmt: numeric,
                y_fmt: blank,
                margin_right: 15,
            }
        } else {
            Axes {
                x_desc: &self.spec.x_label,
                y_desc: &self.spec.y_label,
                x_fmt: blank,
                y_fmt: numeric,
                margin_right: 15,
            }
        };
        let (xr, yr) = orient(horizontal, category_range(n), values);
        self.chart(root, xr, yr, &axes)
    }

    fn cell_colors<T>(&self, d: &Distribution<T>) -> CellColors {
        let grouped = self.grouped();
        let colors = self
            .spec
            .color_scheme
            .colors(if grouped { d.groups.len() } else { d.categories.len() });
        CellColors { colors, grouped }
    }

    fn boxes<DB>(&self, root: &DrawingArea<DB, Shift>, d: &Distribution<BoxStats>, o: &BoxOptions) -> DrawResult
    where
        DB: DrawingBackend,
        DB::ErrorType: 'static,
    {
        let horizontal = o.orientation == Orientation::Horizontal;
        let values = padded(extent(d.cells.iter().flatten().flatten().flat_map(|b| {
            [b.whisker_low, b.whisker_high]
                .into_iter()
                .chain(b.outliers.iter().copied())
        })));
        let mut chart = self.distribution_chart(root, d.categories.len(), values.clone(), horizontal)?;
        let colors = self.cell_colors(d);
        let at = |c: f64, v: f64| place(horizontal, c, v);

        for (i, row) in d.cells.iter().enumerate() {
            for (j, cell) in row.iter().enumerate() {
                let Some(b) = cell else { continue };
                let (c, w) = slot(i, j, d.groups.len());
                let (l, r) = (c - w / 2.0, c + w / 2.0);
                let outline: Vec<(f64, f64)> = if o.notch {
                    let (nl, nh) = (b.median - b.notch, b.median + b.notch);
                    vec![
                        at(l, b.q1),
                        at(l, nl),
                        at(c - w / 4.0, b.median),
                        at(l, nh),
                        at(l, b.q3),
                        at(r, b.q3),
                        at(r, nh),
                        at(c + w / 4.0, b.median),
                        at(r, nl),
                        at(r, b.q1),
                    ]
                } else {
                    vec![at(l, b.q1), at(l, b.q3), at(r, b.q3), at(r, b.q1)]
                };
                let area = chart.plotting_area();
                area.draw(&Polygon::new(outline.clone(), colors.get(i, j).mix(0.8).filled()))?;
                let mut closed = outline;
                closed.push(closed[0]);
                area.draw(&PathElement::new(closed, BLACK.stroke_width(1)))?;

                let (ml, mr) = if o.notch {
                    (c - w / 4.0, c + w / 4.0)
                } else {
                    (l, r)
                };
                area.draw(&PathElement::new(vec![at(ml, b.median), at(mr, b.median)], BLACK.stroke_width(2)))?;
                let stroke = BLACK.stroke_width(1);
                for (from, to) in [(b.q1, b.whisker_low), (b.q3, b.whisker_high)] {
                    area.draw(&PathElement::new(vec![at(c, from), at(c, to)], stroke))?;
                    area.draw(&PathElement::new(vec![at(c - w / 4.0, to), at(c + w / 4.0, to)], stroke))?;
                }
                for &v in &b.outliers {
                    area.draw(&Circle::new(at(c, v), 3, stroke))?;
                }
            }
        }

        for (j, name) in d.groups.iter().enumerate() {
            self.legend_entry(&mut chart, name, colors.get(0, j))?;
        }
        let side = if horizontal { Side::Left } else { Side::Bottom };
        self.category_labels(root, &chart, &indexed(&d.categories), side, values.start)?;
        self.legend(&mut chart)
    }

    fn violins<DB>(
        &self,
        root: &DrawingArea<DB, Shift>,
        d: &Distribution<ViolinStats>,
        o: &ViolinOptions,
    ) -> DrawResult
    where
        DB: DrawingBackend,
        DB::ErrorType: 'static,
    {
        let horizontal = o.orientation == Orientation::Horizontal;
        let values = padded(extent(d.cells.iter().flatten().flatten().flat_map(|v| {
            v.curve
                .iter()
                .map(|p| p.0)
                .chain(v.values.iter().copied())
        })));
        let mut chart = self.distribution_chart(root, d.categories.len(), values.clone(), horizontal)?;
        let colors = self.cell_colors(d);
        let at = |c: f64, v: f64| place(horizontal, c, v);

        for (i, row) in d.cells.iter().enumerate() {
            for (j, cell) in row.iter().enumerate() {
                let Some(v) = cell else { continue };
                let (c, w) = slot(i, j, d.groups.len());
                let half = w / 2.0;
                let area = chart.plotting_area();
                let color = colors.get(i, j);

                // Each violin is scaled to its own widest point
                let peak = v.curve.iter().map(|p| p.1).fold(0.0, f64::max);
                let width_at = |value: f64| -> f64 {
                    if peak > 0.0 {
                        density_at(&v.curve, value) / peak * half
                    } else {
                        half
                    }
                };
                if peak > 0.0 {
                    let mut outline: Vec<(f64, f64)> =
                        v.curve.iter().map(|&(x, dens)| at(c + dens / peak * half, x)).collect();
                    outline.extend(v.curve.iter().rev().map(|&(x, dens)| at(c - dens / peak * half, x)));
                    area.draw(&Polygon::new(outline.clone(), color.mix(0.8).filled()))?;
                    area.draw(&PathElement::new(outline, BLACK.stroke_width(1)))?;
                } else {
                    let m = v.stats.median;
                    area.draw(&PathElement::new(vec![at(c - half, m), at(c + half, m)], color.stroke_width(3)))?;
                }

                let b = &v.stats;
                match o.inner {
                    ViolinInner::None => {}
                    ViolinInner::Box => {
                        area.draw(&PathElement::new(vec![at(c, b.whisker_low), at(c, b.whisker_high)], BLACK.stroke_width(1)))?;
                        area.draw(&PathElement::new(vec![at(c, b.q1), at(c, b.q3)], BLACK.stroke_width(5)))?;
                        area.draw(&Circle::new(at(c, b.median), 3, WHITE.filled()))?;
                    }
                    ViolinInner::Quartile => {
                        for (q, stroke) in [(b.q1, 1), (b.median, 2), (b.q3, 1)] {
                            let half_w = width_at(q);
                            area.draw(&PathElement::new(
                                vec![at(c - half_w, q), at(c + half_w, q)],
                                BLACK.stroke_width(stroke),
                            ))?;
                        }
                    }
                    ViolinInner::Point => {
                        for &value in &v.values {
                            area.draw(&Circle::new(at(c, value), 2, BLACK.filled()))?;
                        }
                    }
                    ViolinInner::Stick => {
                        for &value in &v.values {
                            let half_w = width_at(value);
                            area.draw(&PathElement::new(
                                vec![at(c - half_w, value), at(c + half_w, value)],
                                BLACK.stroke_width(1),
                            ))?;
                        }
                    }
                }
            }
        }

        for (j, name) in d.groups.iter().enumerate() {
            self.legend_entry(&mut chart, name, colors.get(0, j))?;
        }
        let side = if horizontal { Side::Left } else { Side::Bottom };
        self.category_labels(root, &chart, &indexed(&d.categories), side, values.start)?;
        self.legend(&mut chart)
    }

    fn heatmap<DB>(
        &self,
        root: &DrawingArea<DB, Shift>,
        labels: &[String],
        matrix: &[Vec<Option<f64>>],
        o: &HeatmapOptions,
    ) -> DrawResult
    where
        DB: DrawingBackend,
        DB::ErrorType: 'static,
    {
        let n = labels.len();
        let size = n as f64;
        let blank = |_: &f64| String::new();
        let axes = Axes {
            x_desc: "",
            y_desc: "",
            x_fmt: &blank,
            y_fmt: &blank,
            margin_right: 90,
        };
        let chart = self.chart(root, 0.0..size, 0.0..size, &axes)?;
        let area = chart.plotting_area();

        for (i, row) in matrix.iter().enumerate() {
            // First column's row at the top
            let y0 = (n - 1 - i) as f64;
            for (j, &r) in row.iter().enumerate() {
                let x0 = j as f64;
                let cell = [(x0, y0), (x0 + 1.0, y0 + 1.0)];
                let fill = r.map_or(MISSING, |r| o.colormap.at((r + 1.0) / 2.0));
                area.draw(&Rectangle::new(cell, fill.filled()))?;
                area.draw(&Rectangle::new(cell, WHITE.stroke_width(1)))?;
                match r {
                    Some(r) if self.text && o.show_values => {
                        let text_color = contrast_text(fill);
                        let style = self
                            .font(12.0)
                            .color(&text_color)
                            .pos(Pos::new(HPos::Center, VPos::Center));
                        area.draw(&Text::new(format!("{:.2}", r), (x0 + 0.5, y0 + 0.5), style))?;
                    }
                    _ => {}
                }
            }
        }

        let columns: Vec<(f64, String)> = labels
            .iter()
            .enumerate()
            .map(|(j, l)| (j as f64 + 0.5, l.clone()))
            .collect();
        let rows: Vec<(f64, String)> = labels
            .iter()
            .enumerate()
            .map(|(i, l)| ((n - 1 - i) as f64 + 0.5, l.clone()))
            .collect();
        self.category_labels(root, &chart, &columns, Side::Bottom, 0.0)?;
        self.category_labels(root, &chart, &rows, Side::Left, 0.0)?;

        // Colour bar from -1 at the bottom to 1 at the top
        let (right, bottom) = chart.backend_coord(&(size, 0.0));
        let (_, top) = chart.backend_coord(&(size, size));
        let (left, right) = (right + 20, right + 36);
        let strips = 50;
        let step = (bottom - top) as f64 / strips as f64;
        for k in 0..strips {
            let t = (k as f64 + 0.5) / strips as f64;
            let y1 = bottom - (step * k as f64).round() as i32;
            let y2 = bottom - (step * (k + 1) as f64).round() as i32;
            root.draw(&Rectangle::new([(left, y2), (right, y1)], o.colormap.at(t).filled()))?;
        }
        root.draw(&Rectangle::new([(left, top), (right, bottom)], BLACK.stroke_width(1)))?;
        if self.text {
            let style = self.font(11.0).pos(Pos::new(HPos::Left, VPos::Center));
            for (value, y) in [(1.0, top), (0.0, (top + bottom) / 2), (-1.0, bottom)] {
                root.draw(&Text::new(format_number(value), (right + 4, y), style.clone()))?;
            }
        }
        Ok(())
    }
}

/// `(x, y)` for a `(category, value)` pair
fn place(horizontal: bool, category: f64, value: f64) -> (f64, f64) {
    if horizontal {
        (value, category)
    } else {
        (category, value)
    }
}

fn orient(horizontal: bool, categories: Range<f64>, values: Range<f64>) -> (Range<f64>, Range<f64>) {
    if horizontal {
        (values, categories)
    } else {
        (categories, values)
    }
}

/// Centre and width of the box for category `i`, group `j` of `groups`
fn slot(i: usize, j: usize, groups: usize) -> (f64, f64) {
    let width = SLOT / groups.max(1) as f64;
    let centre = i as f64 - SLOT / 2.0 + (j as f64 + 0.5) * width;
    (centre, width * 0.8)
}

fn indexed(labels: &[String]) -> Vec<(f64, String)> {
    labels
        .iter()
        .enumerate()
        .map(|(i, l)| (i as f64, l.clone()))
        .collect()
}

fn extent(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}

/// Range around `[lo, hi]` with 5% headroom on both sides
fn padded((lo, hi): (f64, f64)) -> Range<f64> {
    if !lo.is_finite() || !hi.is_finite() {
        return 0.0..1.0;
    }
    if hi > lo {
        let pad = (hi - lo) * 0.05;
        (lo - pad)..(hi + pad)
    } else {
        (lo - 1.0)..(hi + 1.0)
    }
}

/// Range that always includes zero, padded away from it only
fn from_zero((lo, hi): (f64, f64)) -> Range<f64> {
    if !lo.is_finite() || !hi.is_finite() {
        return 0.0..1.0;
    }
    let (lo, hi) = (lo.min(0.0), hi.max(0.0));
    if hi == lo {
        return 0.0..1.0;
    }
    let pad = (hi - lo) * 0.05;
    let start = if lo < 0.0 { lo - pad } else { 0.0 };
    let end = if hi > 0.0 { hi + pad } else { 0.0 };
    start..end
}

fn category_range(n: usize) -> Range<f64> {
    -0.5..(n.max(1) as f64 - 0.5)
}

fn scale_range(scale: &XScale, ext: (f64, f64)) -> Range<f64> {
    match scale {
        XScale::Category(labels) => category_range(labels.len()),
        XScale::Numeric | XScale::Date => padded(ext),
    }
}

fn tick_format(scale: &XScale) -> Box<dyn Fn(&f64) -> String> {
    match scale {
        XScale::Numeric => Box::new(|v: &f64| format_number(*v)),
        XScale::Date => Box::new(|v: &f64| format_day(*v)),
        XScale::Category(_) => Box::new(|_: &f64| String::new()),
    }
}

/// Compact tick and label text for a number
pub fn format_number(v: f64) -> String {
    if v == 0.0 {
        return "0".to_string();
    }
    let magnitude = v.abs();
    if !(1e-3..1e6).contains(&magnitude) {
        format!("{:.2e}", v)
    } else if v.fract() == 0.0 {
        format!("{}", v as i64)
    } else {
        let text = format!("{:.3}", v);
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

fn format_day(days: f64) -> String {
    NaiveDate::from_num_days_from_ce_opt(days.round() as i32)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

fn short(label: &str) -> String {
    if label.width() <= LABEL_WIDTH {
        label.to_string()
    } else {
        format!("{}…", label.unicode_truncate(LABEL_WIDTH - 1).0)
    }
}

/// Point at `degrees` counter-clockwise from the positive x axis, in pixel
/// space where y grows downwards
fn polar((cx, cy): (f64, f64), radius: f64, degrees: f64) -> (f64, f64) {
    let rad = degrees.to_radians();
    (cx + radius * rad.cos(), cy - radius * rad.sin())
}

fn pixel((x, y): (f64, f64)) -> (i32, i32) {
    (x.round() as i32, y.round() as i32)
}

/// Five-pointed star around the origin, pointing up
fn star_points(radius: f64) -> Vec<(i32, i32)> {
    (0..10)
        .map(|k| {
            let r = if k % 2 == 0 { radius } else { radius * 0.45 };
            pixel(polar((0.0, 0.0), r, 90.0 + 36.0 * k as f64))
        })
        .collect()
}

/// Linear interpolation of a density curve sorted by value
fn density_at(curve: &[(f64, f64)], value: f64) -> f64 {
    for pair in curve.windows(2) {
        let ((x0, d0), (x1, d1)) = (pair[0], pair[1]);
        if value >= x0 && value <= x1 {
            if x1 == x0 {
                return d0;
            }
            return d0 + (d1 - d0) * (value - x0) / (x1 - x0);
        }
    }
    0.0
}

/// On/off lengths in pixels for a line style
fn dash_pattern(style: LineStyle, width: u32) -> Vec<f64> {
    let w = width.max(1) as f64;
    match style {
        LineStyle::Solid => vec![f64::INFINITY],
        LineStyle::Dashed => vec![4.0 * w, 2.0 * w],
        LineStyle::Dotted => vec![w, 1.5 * w],
        LineStyle::DashDot => vec![6.0 * w, 1.5 * w, w, 1.5 * w],
    }
}

/// Split a polyline into the "on" pieces of a dash pattern
fn dash_segments(points: &[(i32, i32)], pattern: &[f64]) -> Vec<Vec<(i32, i32)>> {
    let mut out = Vec::new();
    if points.len() < 2 || pattern.is_empty() {
        return out;
    }
    let mut current: Vec<(i32, i32)> = Vec::new();
    let mut idx = 0;
    let mut left = pattern[0];
    let mut on = true;

    for pair in points.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let (dx, dy) = ((b.0 - a.0) as f64, (b.1 - a.1) as f64);
        let len = dx.hypot(dy);
        if on && current.is_empty() {
            current.push(a);
        }
        let mut t = 0.0;
        while len - t > left {
            t += left;
            let p = pixel((a.0 as f64 + dx * t / len, a.1 as f64 + dy * t / len));
            if on {
                current.push(p);
                out.push(std::mem::take(&mut current));
            } else {
                current = vec![p];
            }
            on = !on;
            idx = (idx + 1) % pattern.len();
            left = pattern[idx];
        }
        left -= len - t;
        if on {
            current.push(b);
        }
    }
    if on && current.len() > 1 {
        out.push(current);
    }
    out
}
