//! SVG chart generation for benchmark results.
//!
//! Renders the five standard views of a run: sorted bpsp, sorted compression
//! throughput and sorted decompression throughput per model (index vs. value
//! curves), plus mean-bpsp vs. mean-throughput scatters for compression and
//! decompression. Throughput axes are log-scaled.
//! All charts support light and dark mode via CSS media queries.

use std::f64::consts::PI;
use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::bench::report::{PlotPayload, ScatterPoint, Series};
use crate::error::Result;

/// Lower bound of throughput axes, in MB/s.
pub const THROUGHPUT_FLOOR: f64 = 0.01;

/// Scatter marker shape, named after the matplotlib code it mirrors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Marker {
    Circle,
    TriangleDown,
    TriangleUp,
    TriangleLeft,
    TriangleRight,
    Octagon,
    Square,
    Pentagon,
    Star,
    Hexagon,
    HexagonFlat,
    Diamond,
    ThinDiamond,
    Plus,
    Cross,
}

/// Marker palette, cycled by registration order.
pub const MARKERS: [Marker; 15] = [
    Marker::Circle,
    Marker::TriangleDown,
    Marker::TriangleUp,
    Marker::TriangleLeft,
    Marker::TriangleRight,
    Marker::Octagon,
    Marker::Square,
    Marker::Pentagon,
    Marker::Star,
    Marker::Hexagon,
    Marker::HexagonFlat,
    Marker::Diamond,
    Marker::ThinDiamond,
    Marker::Plus,
    Marker::Cross,
];

/// Series colors, cycled by registration order.
pub const COLORS: [&str; 10] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
    "#bcbd22", "#17becf",
];

impl Marker {
    /// Marker for the model registered at position `index`.
    #[must_use]
    pub fn for_index(index: usize) -> Self {
        MARKERS[index % MARKERS.len()]
    }

    /// The matplotlib marker code.
    #[must_use]
    pub fn code(self) -> char {
        match self {
            Self::Circle => 'o',
            Self::TriangleDown => 'v',
            Self::TriangleUp => '^',
            Self::TriangleLeft => '<',
            Self::TriangleRight => '>',
            Self::Octagon => '8',
            Self::Square => 's',
            Self::Pentagon => 'p',
            Self::Star => '*',
            Self::Hexagon => 'h',
            Self::HexagonFlat => 'H',
            Self::Diamond => 'D',
            Self::ThinDiamond => 'd',
            Self::Plus => 'P',
            Self::Cross => 'X',
        }
    }

    /// SVG element drawing this marker centred on `(cx, cy)` with radius `r`.
    fn svg(self, cx: f64, cy: f64, r: f64, color: &str) -> String {
        let outline: Vec<(f64, f64)> = match self {
            Self::Circle => {
                return format!(r#"<circle cx="{cx:.2}" cy="{cy:.2}" r="{r:.2}" fill="{color}"/>"#);
            }
            Self::TriangleUp => regular(3, 0.0),
            Self::TriangleRight => regular(3, 90.0),
            Self::TriangleDown => regular(3, 180.0),
            Self::TriangleLeft => regular(3, 270.0),
            Self::Octagon => regular(8, 22.5),
            Self::Square => regular(4, 45.0),
            Self::Pentagon => regular(5, 0.0),
            Self::Hexagon => regular(6, 0.0),
            Self::HexagonFlat => regular(6, 30.0),
            Self::Diamond => regular(4, 0.0),
            Self::ThinDiamond => regular(4, 0.0).into_iter().map(|(x, y)| (x * 0.6, y)).collect(),
            Self::Star => (0..10)
                .map(|k| {
                    let radius = if k % 2 == 0 { 1.0 } else { 0.4 };
                    let a = f64::from(k) * PI / 5.0;
                    (radius * a.sin(), -radius * a.cos())
                })
                .collect(),
            Self::Plus => plus(0.0),
            Self::Cross => plus(45.0),
        };

        let mut points = String::new();
        for (x, y) in outline {
            let _ = write!(points, "{:.2},{:.2} ", cx + x * r, cy + y * r);
        }
        format!(r#"<polygon points="{}" fill="{color}"/>"#, points.trim_end())
    }
}

/// Unit regular polygon, first vertex at `rotation` degrees clockwise from up.
fn regular(sides: u32, rotation: f64) -> Vec<(f64, f64)> {
    (0..sides)
        .map(|k| {
            let a = rotation.to_radians() + f64::from(k) * 2.0 * PI / f64::from(sides);
            (a.sin(), -a.cos())
        })
        .collect()
}

/// Unit filled plus sign, rotated by `rotation` degrees.
fn plus(rotation: f64) -> Vec<(f64, f64)> {
    let w = 1.0 / 3.0;
    let (s, c) = rotation.to_radians().sin_cos();
    [
        (-w, -1.0),
        (w, -1.0),
        (w, -w),
        (1.0, -w),
        (1.0, w),
        (w, w),
        (w, 1.0),
        (-w, 1.0),
        (-w, w),
        (-1.0, w),
        (-1.0, -w),
        (-w, -w),
    ]
    .into_iter()
    .map(|(x, y)| (x * c - y * s, x * s + y * c))
    .collect()
}

/// Data point for a chart series.
#[derive(Debug, Clone, Copy)]
pub struct ChartPoint {
    /// X-axis value.
    pub x: f64,
    /// Y-axis value.
    pub y: f64,
}

/// A series of data points with styling.
#[derive(Debug, Clone)]
pub struct ChartSeries {
    /// Series identifier (used in legend).
    pub name: String,
    /// CSS color for the series.
    pub color: String,
    /// Marker used in scatter charts and the legend.
    pub marker: Marker,
    /// Data points.
    pub points: Vec<ChartPoint>,
}

/// How series are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    /// Connected line, no markers.
    Line,
    /// Markers only.
    Scatter,
}

/// Chart configuration.
#[derive(Debug, Clone)]
pub struct ChartConfig {
    /// Chart title.
    pub title: String,
    /// X-axis label.
    pub x_label: String,
    /// Y-axis label.
    pub y_label: String,
    /// Line or scatter.
    pub kind: ChartKind,
    /// Logarithmic Y axis. Non-positive values are dropped.
    pub log_y: bool,
    /// Fixed lower bound of the X axis.
    pub x_min: Option<f64>,
    /// Fixed lower bound of the Y axis.
    pub y_min: Option<f64>,
    /// Chart width in pixels.
    pub width: u32,
    /// Chart height in pixels.
    pub height: u32,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            title: "Compression Rate".to_string(),
            x_label: "Sorted Images Index".to_string(),
            y_label: "Compression Rate [bpsp]".to_string(),
            kind: ChartKind::Line,
            log_y: false,
            x_min: None,
            y_min: None,
            width: 700,
            height: 450,
        }
    }
}

impl ChartConfig {
    /// Creates a new chart configuration with the given title.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Sets the axis labels.
    #[must_use]
    pub fn with_labels(mut self, x_label: impl Into<String>, y_label: impl Into<String>) -> Self {
        self.x_label = x_label.into();
        self.y_label = y_label.into();
        self
    }

    /// Sets the drawing style.
    #[must_use]
    pub fn with_kind(mut self, kind: ChartKind) -> Self {
        self.kind = kind;
        self
    }

    /// Log-scale the Y axis with a fixed floor.
    #[must_use]
    pub fn with_log_y(mut self, floor: f64) -> Self {
        self.log_y = true;
        self.y_min = Some(floor);
        self
    }

    /// Fix the lower bound of the X axis.
    #[must_use]
    pub fn with_x_min(mut self, x_min: f64) -> Self {
        self.x_min = Some(x_min);
        self
    }
}

/// Generates an SVG chart from the given series.
///
/// Non-finite points are skipped. Returns an empty string when nothing is plottable.
///
/// # Example
///
/// ```rust
/// use codec_bench::stats::chart::{generate_svg, ChartConfig, ChartPoint, ChartSeries, Marker};
///
/// let series = vec![ChartSeries {
///     name: "png".to_string(),
///     color: "#1f77b4".to_string(),
///     marker: Marker::Circle,
///     points: vec![ChartPoint { x: 0.0, y: 3.1 }, ChartPoint { x: 1.0, y: 4.2 }],
/// }];
///
/// let svg = generate_svg(&series, &ChartConfig::new("Compression Rate"));
/// assert!(svg.starts_with("<svg"));
/// ```
#[must_use]
pub fn generate_svg(series: &[ChartSeries], config: &ChartConfig) -> String {
    let ty = |v: f64| if config.log_y { v.log10() } else { v };
    let plottable = |p: &ChartPoint| p.x.is_finite() && p.y.is_finite() && (!config.log_y || p.y > 0.0);

    let non_empty: Vec<(&ChartSeries, Vec<ChartPoint>)> = series
        .iter()
        .map(|s| (s, s.points.iter().copied().filter(plottable).collect::<Vec<_>>()))
        .filter(|(_, points)| !points.is_empty())
        .collect();
    if non_empty.is_empty() {
        return String::new();
    }

    let all_x: Vec<f64> = non_empty.iter().flat_map(|(_, ps)| ps.iter().map(|p| p.x)).collect();
    let all_y: Vec<f64> = non_empty.iter().flat_map(|(_, ps)| ps.iter().map(|p| ty(p.y))).collect();

    let (mut min_x, mut max_x) = bounds_with_padding(&all_x, 0.05);
    let (mut min_y, mut max_y) = bounds_with_padding(&all_y, 0.05);
    if let Some(x_min) = config.x_min {
        min_x = x_min;
        max_x = max_x.max(min_x + 1.0);
    }
    if let Some(y_min) = config.y_min {
        min_y = ty(y_min);
        max_y = max_y.max(min_y + 1.0);
    }

    let width = config.width;
    let height = config.height;
    let margin_top = 50;
    let margin_right = 160;
    let margin_bottom = 70;
    let margin_left = 90;
    let plot_width = width - margin_left - margin_right;
    let plot_height = height - margin_top - margin_bottom;

    let scale_x = |v: f64| -> f64 {
        f64::from(margin_left) + (v - min_x) / (max_x - min_x) * f64::from(plot_width)
    };
    let scale_y = |v: f64| -> f64 {
        f64::from(margin_top) + (1.0 - (v - min_y) / (max_y - min_y)) * f64::from(plot_height)
    };

    let mut svg = String::with_capacity(8192);

    // SVG header
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {} {}">"#,
        width, height
    );

    // CSS with dark mode support
    svg.push_str(
        r#"<style>
  :root {
    --bg-color: #ffffff;
    --text-color: #1a1a1a;
    --grid-color: #e0e0e0;
    --axis-color: #333333;
    --legend-bg: #ffffff;
    --legend-border: #cccccc;
  }
  @media (prefers-color-scheme: dark) {
    :root {
      --bg-color: #1a1a1a;
      --text-color: #e0e0e0;
      --grid-color: #404040;
      --axis-color: #b0b0b0;
      --legend-bg: #2a2a2a;
      --legend-border: #505050;
    }
  }
  .background { fill: var(--bg-color); }
  .title { font: bold 18px system-ui, sans-serif; fill: var(--text-color); }
  .axis-label { font: 13px system-ui, sans-serif; fill: var(--text-color); }
  .tick-label { font: 11px system-ui, sans-serif; fill: var(--text-color); }
  .legend { font: 13px system-ui, sans-serif; fill: var(--text-color); }
  .grid { stroke: var(--grid-color); stroke-width: 1; }
  .axis { stroke: var(--axis-color); stroke-width: 1.5; }
  .legend-bg { fill: var(--legend-bg); stroke: var(--legend-border); }
</style>
"#,
    );

    let _ = writeln!(
        svg,
        r#"<rect class="background" width="{}" height="{}"/>"#,
        width, height
    );
    let _ = writeln!(
        svg,
        r#"<text x="{}" y="30" text-anchor="middle" class="title">{}</text>"#,
        f64::from(width) / 2.0,
        escape(&config.title)
    );

    // Grid lines and tick labels
    for i in 0..=5 {
        let frac = f64::from(i) / 5.0;
        let x_val = min_x + frac * (max_x - min_x);
        let y_val = min_y + frac * (max_y - min_y);
        let x = scale_x(x_val);
        let y = scale_y(y_val);

        let _ = writeln!(
            svg,
            r#"<line x1="{:.2}" y1="{}" x2="{:.2}" y2="{}" class="grid"/>"#,
            x,
            margin_top,
            x,
            height - margin_bottom
        );
        let _ = writeln!(
            svg,
            r#"<line x1="{}" y1="{:.2}" x2="{}" y2="{:.2}" class="grid"/>"#,
            margin_left,
            y,
            width - margin_right,
            y
        );
        let _ = writeln!(
            svg,
            r#"<text x="{:.2}" y="{}" text-anchor="middle" class="tick-label">{:.2}</text>"#,
            x,
            height - margin_bottom + 20,
            x_val
        );
        let _ = writeln!(
            svg,
            r#"<text x="{}" y="{:.2}" text-anchor="end" class="tick-label">{}</text>"#,
            margin_left - 10,
            y + 4.0,
            tick_label(if config.log_y { 10f64.powf(y_val) } else { y_val })
        );
    }

    // Axes
    let _ = writeln!(
        svg,
        r#"<line x1="{}" y1="{}" x2="{}" y2="{}" class="axis"/>"#,
        margin_left,
        height - margin_bottom,
        width - margin_right,
        height - margin_bottom
    );
    let _ = writeln!(
        svg,
        r#"<line x1="{}" y1="{}" x2="{}" y2="{}" class="axis"/>"#,
        margin_left,
        margin_top,
        margin_left,
        height - margin_bottom
    );

    let _ = writeln!(
        svg,
        r#"<text x="{}" y="{}" text-anchor="middle" class="axis-label">{}</text>"#,
        f64::from(width) / 2.0,
        height - 20,
        escape(&config.x_label)
    );
    let _ = writeln!(
        svg,
        r#"<text x="25" y="{}" text-anchor="middle" class="axis-label" transform="rotate(-90 25 {})">{}</text>"#,
        f64::from(height) / 2.0,
        f64::from(height) / 2.0,
        escape(&config.y_label)
    );

    // Plot series
    for (s, points) in &non_empty {
        match config.kind {
            ChartKind::Line => {
                let mut path = String::new();
                for (i, p) in points.iter().enumerate() {
                    let prefix = if i == 0 { "M" } else { " L" };
                    let _ = write!(path, "{} {:.2},{:.2}", prefix, scale_x(p.x), scale_y(ty(p.y)));
                }
                let _ = writeln!(
                    svg,
                    r#"<path d="{}" stroke="{}" stroke-width="2" fill="none"/>"#,
                    path, s.color
                );
            }
            ChartKind::Scatter => {
                for p in points {
                    let _ = writeln!(svg, "{}", s.marker.svg(scale_x(p.x), scale_y(ty(p.y)), 6.0, &s.color));
                }
            }
        }
    }

    // Legend
    let legend_x = width - margin_right + 15;
    let legend_y = margin_top + 20;
    let legend_height = 20 + non_empty.len() as u32 * 25;

    let _ = writeln!(
        svg,
        r#"<rect x="{}" y="{}" width="135" height="{}" rx="4" class="legend-bg"/>"#,
        legend_x,
        legend_y - 15,
        legend_height
    );

    for (i, (s, _)) in non_empty.iter().enumerate() {
        let y_offset = legend_y + i as u32 * 25;
        let swatch = match config.kind {
            ChartKind::Line => format!(
                r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{}" stroke-width="2"/>"#,
                legend_x + 8,
                y_offset + 5,
                legend_x + 22,
                y_offset + 5,
                s.color
            ),
            ChartKind::Scatter => s.marker.svg(
                f64::from(legend_x + 15),
                f64::from(y_offset + 5),
                5.0,
                &s.color,
            ),
        };
        let _ = writeln!(svg, "{swatch}");
        let _ = writeln!(
            svg,
            r#"<text x="{}" y="{}" class="legend">{}</text>"#,
            legend_x + 28,
            y_offset + 9,
            escape(&s.name)
        );
    }

    svg.push_str("</svg>\n");
    svg
}

fn tick_label(v: f64) -> String {
    if v.abs() < 0.0001 && v != 0.0 {
        format!("{:.6}", v)
    } else if v.abs() < 0.1 {
        format!("{:.4}", v)
    } else {
        format!("{:.2}", v)
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Calculates min/max bounds with padding. A zero range is widened to one unit.
fn bounds_with_padding(values: &[f64], padding: f64) -> (f64, f64) {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    if range <= f64::EPSILON {
        return (min - 0.5, max + 0.5);
    }
    (min - range * padding, max + range * padding)
}

/// Consumer of aggregated benchmark results.
pub trait PlotSink {
    /// Render one run's aggregated results.
    fn render(&mut self, payload: &PlotPayload) -> Result<()>;
}

/// Writes the five standard charts as SVG files into a directory.
#[derive(Debug, Clone)]
pub struct SvgPlotter {
    out_dir: PathBuf,
}

impl SvgPlotter {
    /// Write charts into `out_dir` (created if missing).
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    /// Render every chart as `(file name, svg)`. Charts with nothing to plot are omitted.
    #[must_use]
    pub fn charts(payload: &PlotPayload) -> Vec<(&'static str, String)> {
        let sorted = |title: &str, y_label: &str| {
            ChartConfig::new(title).with_labels("Sorted Images Index", y_label)
        };
        let scatter = |title: &str, y_label: &str| {
            ChartConfig::new(title)
                .with_labels("Compression Rate [bpsp]", y_label)
                .with_kind(ChartKind::Scatter)
                .with_x_min(0.0)
                .with_log_y(THROUGHPUT_FLOOR)
        };

        let charts = [
            (
                "bpsp_sorted.svg",
                curves(&payload.sorted_bpsp),
                sorted("Compression Rate", "Compression Rate [bpsp]"),
            ),
            (
                "compression_throughput_sorted.svg",
                curves(&payload.sorted_compression),
                sorted("Compression Throughput", "Compression Throughput [MB/s]")
                    .with_log_y(THROUGHPUT_FLOOR),
            ),
            (
                "decompression_throughput_sorted.svg",
                curves(&payload.sorted_decompression),
                sorted("Decompression Throughput", "Decompression Throughput [MB/s]")
                    .with_log_y(THROUGHPUT_FLOOR),
            ),
            (
                "compression_scatter.svg",
                points(&payload.compression_scatter),
                scatter("Rate vs Compression Throughput", "Compression Throughput [MB/s]"),
            ),
            (
                "decompression_scatter.svg",
                points(&payload.decompression_scatter),
                scatter("Rate vs Decompression Throughput", "Decompression Throughput [MB/s]"),
            ),
        ];

        charts
            .into_iter()
            .map(|(file, series, config)| (file, generate_svg(&series, &config)))
            .filter(|(_, svg)| !svg.is_empty())
            .collect()
    }
}

impl PlotSink for SvgPlotter {
    fn render(&mut self, payload: &PlotPayload) -> Result<()> {
        fs::create_dir_all(&self.out_dir)?;
        for (file, svg) in Self::charts(payload) {
            let path = self.out_dir.join(file);
            fs::write(&path, svg)?;
            tracing::info!(chart = %path.display(), "wrote chart");
        }
        Ok(())
    }
}

fn curves(series: &[Series]) -> Vec<ChartSeries> {
    series
        .iter()
        .enumerate()
        .map(|(i, s)| ChartSeries {
            name: s.name.clone(),
            color: COLORS[i % COLORS.len()].to_string(),
            marker: s.marker,
            points: s
                .values
                .iter()
                .enumerate()
                .map(|(x, &y)| ChartPoint { x: x as f64, y })
                .collect(),
        })
        .collect()
}

fn points(scatter: &[ScatterPoint]) -> Vec<ChartSeries> {
    scatter
        .iter()
        .enumerate()
        .map(|(i, p)| ChartSeries {
            name: p.name.clone(),
            color: COLORS[i % COLORS.len()].to_string(),
            marker: p.marker,
            points: vec![ChartPoint {
                x: p.mean_bpsp,
                y: p.mean_mbps,
            }],
        })
        .collect()
}
