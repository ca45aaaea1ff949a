//! Chart description: kind, columns, labels and per-kind options
//!
//! The kind lives in the options variant, so a spec can never carry options
//! for a different chart than the one it names. Specs serialize as JSON with
//! the kind as a `"kind"` tag next to its options, which is the form the CLI
//! accepts through `--chart-spec`.

use super::palette::ColorScheme;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChartKind {
    Bar,
    Line,
    Scatter,
    Pie,
    Histogram,
    Box,
    Heatmap,
    Area,
    Violin,
}

impl ChartKind {
    pub const ALL: [ChartKind; 9] = [
        ChartKind::Bar,
        ChartKind::Line,
        ChartKind::Scatter,
        ChartKind::Pie,
        ChartKind::Histogram,
        ChartKind::Box,
        ChartKind::Heatmap,
        ChartKind::Area,
        ChartKind::Violin,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ChartKind::Bar => "Bar Chart",
            ChartKind::Line => "Line Chart",
            ChartKind::Scatter => "Scatter Plot",
            ChartKind::Pie => "Pie Chart",
            ChartKind::Histogram => "Histogram",
            ChartKind::Box => "Box Plot",
            ChartKind::Heatmap => "Heatmap",
            ChartKind::Area => "Area Chart",
            ChartKind::Violin => "Violin Plot",
        }
    }

    fn name(&self) -> &'static str {
        match self {
            ChartKind::Bar => "bar",
            ChartKind::Line => "line",
            ChartKind::Scatter => "scatter",
            ChartKind::Pie => "pie",
            ChartKind::Histogram => "histogram",
            ChartKind::Box => "box",
            ChartKind::Heatmap => "heatmap",
            ChartKind::Area => "area",
            ChartKind::Violin => "violin",
        }
    }

    /// Whether the chart reads the y column
    pub fn uses_y(&self) -> bool {
        !matches!(self, ChartKind::Histogram | ChartKind::Heatmap)
    }

    /// Whether the chart reads the x column
    pub fn uses_x(&self) -> bool {
        !matches!(self, ChartKind::Heatmap)
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ChartKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ChartKind::ALL
            .into_iter()
            .find(|k| k.name() == wanted)
            .ok_or_else(|| format!("unknown chart kind '{}'", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Vertical,
    Horizontal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineStyle {
    #[default]
    Solid,
    Dashed,
    Dotted,
    DashDot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Marker {
    #[default]
    None,
    Circle,
    Square,
    Triangle,
    Star,
    Plus,
    X,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PieLabels {
    #[default]
    None,
    Percentage,
    Value,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViolinInner {
    #[default]
    Box,
    Quartile,
    Point,
    Stick,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BarOptions {
    pub orientation: Orientation,
    /// Bar width as a percentage of the category slot
    pub width_pct: u32,
}

impl Default for BarOptions {
    fn default() -> Self {
        Self {
            orientation: Orientation::Vertical,
            width_pct: 80,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineOptions {
    pub style: LineStyle,
    pub marker: Marker,
    pub width: u32,
}

impl Default for LineOptions {
    fn default() -> Self {
        Self {
            style: LineStyle::Solid,
            marker: Marker::None,
            width: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScatterOptions {
    /// Marker area in square points
    pub point_size: u32,
    pub opacity: u32,
}

impl Default for ScatterOptions {
    fn default() -> Self {
        Self {
            point_size: 50,
            opacity: 70,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PieOptions {
    pub labels: PieLabels,
    /// Pull the largest slice out of the pie
    pub explode: bool,
    /// Degrees counter-clockwise from the positive x axis
    pub start_angle: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistogramOptions {
    pub bins: u32,
    /// Overlay a kernel density estimate
    pub kde: bool,
}

impl Default for HistogramOptions {
    fn default() -> Self {
        Self { bins: 10, kde: false }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoxOptions {
    pub notch: bool,
    pub orientation: Orientation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeatmapOptions {
    pub show_values: bool,
    pub colormap: ColorScheme,
}

impl Default for HeatmapOptions {
    fn default() -> Self {
        Self {
            show_values: true,
            colormap: ColorScheme::Viridis,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AreaOptions {
    pub opacity: u32,
    pub stacked: bool,
}

impl Default for AreaOptions {
    fn default() -> Self {
        Self {
            opacity: 60,
            stacked: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViolinOptions {
    pub inner: ViolinInner,
    pub orientation: Orientation,
}

/// Chart kind together with its options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChartOptions {
    Bar(BarOptions),
    Line(LineOptions),
    Scatter(ScatterOptions),
    Pie(PieOptions),
    Histogram(HistogramOptions),
    Box(BoxOptions),
    Heatmap(HeatmapOptions),
    Area(AreaOptions),
    Violin(ViolinOptions),
}

impl ChartOptions {
    /// Default options for a kind
    pub fn default_for(kind: ChartKind) -> Self {
        match kind {
            ChartKind::Bar => ChartOptions::Bar(BarOptions::default()),
            ChartKind::Line => ChartOptions::Line(LineOptions::default()),
            ChartKind::Scatter => ChartOptions::Scatter(ScatterOptions::default()),
            ChartKind::Pie => ChartOptions::Pie(PieOptions::default()),
            ChartKind::Histogram => ChartOptions::Histogram(HistogramOptions::default()),
            ChartKind::Box => ChartOptions::Box(BoxOptions::default()),
            ChartKind::Heatmap => ChartOptions::Heatmap(HeatmapOptions::default()),
            ChartKind::Area => ChartOptions::Area(AreaOptions::default()),
            ChartKind::Violin => ChartOptions::Violin(ViolinOptions::default()),
        }
    }

    pub fn kind(&self) -> ChartKind {
        match self {
            ChartOptions::Bar(_) => ChartKind::Bar,
            ChartOptions::Line(_) => ChartKind::Line,
            ChartOptions::Scatter(_) => ChartKind::Scatter,
            ChartOptions::Pie(_) => ChartKind::Pie,
            ChartOptions::Histogram(_) => ChartKind::Histogram,
            ChartOptions::Box(_) => ChartKind::Box,
            ChartOptions::Heatmap(_) => ChartKind::Heatmap,
            ChartOptions::Area(_) => ChartKind::Area,
            ChartOptions::Violin(_) => ChartKind::Violin,
        }
    }

    /// Pull every numeric option into its allowed range
    pub fn clamped(mut self) -> Self {
        match &mut self {
            ChartOptions::Bar(o) => o.width_pct = o.width_pct.clamp(1, 100),
            ChartOptions::Line(o) => o.width = o.width.clamp(1, 10),
            ChartOptions::Scatter(o) => {
                o.point_size = o.point_size.clamp(5, 500);
                o.opacity = o.opacity.min(100);
            }
            ChartOptions::Pie(o) => o.start_angle %= 360,
            ChartOptions::Histogram(o) => o.bins = o.bins.clamp(2, 100),
            ChartOptions::Area(o) => o.opacity = o.opacity.min(100),
            ChartOptions::Box(_) | ChartOptions::Heatmap(_) | ChartOptions::Violin(_) => {}
        }
        self
    }
}

/// Everything needed to draw one chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    #[serde(default)]
    pub x_column: String,
    #[serde(default)]
    pub y_column: String,
    #[serde(default)]
    pub group_column: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub x_label: String,
    #[serde(default)]
    pub y_label: String,
    #[serde(default)]
    pub color_scheme: ColorScheme,
    #[serde(flatten)]
    pub options: ChartOptions,
}

impl ChartSpec {
    pub fn new(kind: ChartKind, x_column: &str, y_column: &str) -> Self {
        Self {
            x_column: x_column.to_string(),
            y_column: y_column.to_string(),
            group_column: None,
            title: format!("{} by {}", y_column, x_column),
            x_label: x_column.to_string(),
            y_label: y_column.to_string(),
            color_scheme: ColorScheme::Default,
            options: ChartOptions::default_for(kind),
        }
    }

    pub fn kind(&self) -> ChartKind {
        self.options.kind()
    }

    pub fn with_group(mut self, group: Option<&str>) -> Self {
        self.group_column = group.filter(|g| !g.is_empty()).map(String::from);
        self
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    pub fn with_options(mut self, options: ChartOptions) -> Self {
        self.options = options;
        self
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}
