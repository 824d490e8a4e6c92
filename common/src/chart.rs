use std::{
    fmt::Display,
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use itertools::Itertools;
use plotters::{
    coord::Shift,
    prelude::*,
    style::text_anchor::{HPos, Pos, VPos},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{error::ReportError, interp::resample_cubic};

const FONT: &str = "sans-serif";
const TITLE_FONT_SIZE: u32 = 24;
const PANEL_TITLE_FONT_SIZE: u32 = 18;
const AXIS_FONT_SIZE: u32 = 14;
const VALUE_FONT_SIZE: u32 = 12;

/// Colours handed out to series that do not configure one
pub const DEFAULT_PALETTE: &[&str] = &[
    "#93c47dff",
    "#a4c2f4ff",
    "#ea9999ff",
    "#cfe2f3ff",
    "#e01e20",
    "#00ff00",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChartKind {
    Bar,
    GroupedBar,
    Scatter,
    Surface,
    Line,
}

impl Display for ChartKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ChartKind::Bar => "bar",
            ChartKind::GroupedBar => "grouped-bar",
            ChartKind::Scatter => "scatter",
            ChartKind::Surface => "surface",
            ChartKind::Line => "line",
        })
    }
}

/// Where a rendered chart goes. `Stdout` streams the SVG document so it can be
/// piped into a viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    File(PathBuf),
    Stdout,
}

impl Display for OutputTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputTarget::File(path) => write!(f, "{}", path.display()),
            OutputTarget::Stdout => f.write_str("<stdout>"),
        }
    }
}

/// Parses `#rrggbb`, `#rrggbbaa` or a handful of colour names
pub fn parse_color(raw: &str) -> Result<RGBAColor, ReportError> {
    let invalid = || ReportError::Parse(format!("Invalid colour {raw:?}"));
    let raw = raw.trim();
    if let Some(hex) = raw.strip_prefix('#') {
        if !hex.is_ascii() || !(hex.len() == 6 || hex.len() == 8) {
            return Err(invalid());
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
        let alpha = if hex.len() == 8 {
            channel(6)? as f64 / 255.0
        } else {
            1.0
        };
        return Ok(RGBAColor(channel(0)?, channel(2)?, channel(4)?, alpha));
    }

    let (r, g, b) = match raw.to_lowercase().as_str() {
        "black" => (0, 0, 0),
        "white" => (255, 255, 255),
        "red" => (255, 0, 0),
        "green" => (0, 128, 0),
        "blue" => (0, 0, 255),
        "grey" | "gray" => (128, 128, 128),
        "yellow" => (255, 255, 0),
        "orange" => (255, 165, 0),
        "cyan" => (0, 255, 255),
        "magenta" => (255, 0, 255),
        _ => return Err(invalid()),
    };
    Ok(RGBAColor(r, g, b, 1.0))
}

/// Configured colour, or the palette entry for `idx`
pub fn series_color(configured: Option<&str>, idx: usize) -> Result<RGBAColor, ReportError> {
    parse_color(configured.unwrap_or(DEFAULT_PALETTE[idx % DEFAULT_PALETTE.len()]))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BarLayout {
    pub bar_width: f64,
    /// Gap between bars of the same category
    pub spacing: f64,
    /// Extra gap between categories
    pub group_spacing: f64,
}

impl Default for BarLayout {
    fn default() -> Self {
        Self {
            bar_width: 0.2,
            spacing: 0.05,
            group_spacing: 0.3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BarSeries {
    pub label: String,
    pub color: RGBAColor,
    /// One value per category, `None` leaves a gap
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone)]
pub struct BarData {
    pub categories: Vec<String>,
    pub series: Vec<BarSeries>,
    pub layout: BarLayout,
    /// Decimal places of the value labels
    pub precision: usize,
}

/// A bar with its horizontal extent in chart coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedBar {
    pub category: usize,
    pub series: usize,
    pub left: f64,
    pub right: f64,
    pub value: f64,
    pub label: String,
}

impl BarData {
    pub fn new(categories: Vec<String>, series: Vec<BarSeries>) -> Self {
        Self {
            categories,
            series,
            layout: BarLayout::default(),
            precision: 2,
        }
    }

    pub fn with_layout(mut self, layout: BarLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_precision(mut self, precision: usize) -> Self {
        self.precision = precision;
        self
    }

    fn stride(&self) -> f64 {
        self.layout.bar_width + self.layout.spacing
    }

    fn group_start(&self, category: usize) -> f64 {
        category as f64 * (self.series.len() as f64 * self.stride() + self.layout.group_spacing)
    }

    /// Centre of the bars belonging to `category`
    pub fn category_center(&self, category: usize) -> f64 {
        self.group_start(category)
            + (self.series.len().saturating_sub(1)) as f64 * self.stride() / 2.0
            + self.layout.bar_width / 2.0
    }

    fn x_range(&self) -> (f64, f64) {
        let last = self.categories.len().saturating_sub(1);
        let end = self.group_start(last)
            + self.series.len().saturating_sub(1) as f64 * self.stride()
            + self.layout.bar_width;
        let pad = self.layout.group_spacing.max(self.layout.bar_width);
        (-pad, end + pad)
    }

    fn validate(&self) -> Result<(), ReportError> {
        let BarLayout {
            bar_width,
            spacing,
            group_spacing,
        } = self.layout;
        if !(bar_width > 0.0 && spacing >= 0.0 && group_spacing >= 0.0) {
            return Err(ReportError::Render(format!(
                "invalid bar layout {:?}",
                self.layout
            )));
        }
        if self.categories.is_empty() || self.series.is_empty() {
            return Err(ReportError::Render("bar chart without data".to_owned()));
        }
        if let Some(series) = self
            .series
            .iter()
            .find(|s| s.values.len() != self.categories.len())
        {
            return Err(ReportError::Render(format!(
                "series {} has {} values for {} categories",
                series.label,
                series.values.len(),
                self.categories.len()
            )));
        }
        let values = self
            .series
            .iter()
            .flat_map(|s| s.values.iter().flatten())
            .collect::<Vec<_>>();
        if values.is_empty() {
            return Err(ReportError::Render("bar chart without values".to_owned()));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ReportError::Render("bar values must be finite".to_owned()));
        }
        Ok(())
    }

    /// Lays out every present value. Series `i` of category `c` starts at
    /// `group_start(c) + i * (bar_width + spacing)`.
    pub fn place(&self) -> Result<Vec<PlacedBar>, ReportError> {
        self.validate()?;
        let mut bars = Vec::new();
        for category in 0..self.categories.len() {
            for (idx, series) in self.series.iter().enumerate() {
                let Some(value) = series.values[category] else {
                    continue;
                };
                let left = self.group_start(category) + idx as f64 * self.stride();
                bars.push(PlacedBar {
                    category,
                    series: idx,
                    left,
                    right: left + self.layout.bar_width,
                    value,
                    label: format!("{value:.prec$}", prec = self.precision),
                });
            }
        }
        Ok(bars)
    }
}

#[derive(Debug, Clone)]
pub struct PointSeries {
    pub label: String,
    pub color: RGBAColor,
    pub points: Vec<(f64, f64)>,
    pub size: u32,
}

/// Horizontal line across a scatter plot
#[derive(Debug, Clone)]
pub struct ReferenceLine {
    pub label: String,
    pub value: f64,
    pub color: RGBAColor,
    pub text: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ScatterData {
    pub series: Vec<PointSeries>,
    pub reference: Option<ReferenceLine>,
}

#[derive(Debug, Clone)]
pub struct LineSeriesData {
    pub label: String,
    pub color: RGBAColor,
    pub points: Vec<(f64, f64)>,
    /// Empty, or one text per point
    pub annotations: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct LineData {
    pub series: Vec<LineSeriesData>,
    pub log_y: bool,
}

#[derive(Debug, Clone)]
pub struct SurfaceData {
    pub points: Vec<(f64, f64, f64)>,
    pub resolution: usize,
}

#[derive(Debug, Clone)]
pub enum PanelData {
    Bars(BarData),
    Scatter(ScatterData),
    Line(LineData),
    Surface(SurfaceData),
}

impl PanelData {
    pub fn kind(&self) -> ChartKind {
        match self {
            PanelData::Bars(data) if data.series.len() > 1 => ChartKind::GroupedBar,
            PanelData::Bars(_) => ChartKind::Bar,
            PanelData::Scatter(_) => ChartKind::Scatter,
            PanelData::Line(_) => ChartKind::Line,
            PanelData::Surface(_) => ChartKind::Surface,
        }
    }

    fn validate(&self) -> Result<(), ReportError> {
        match self {
            PanelData::Bars(data) => data.validate(),
            PanelData::Scatter(data) => {
                let points = data.series.iter().flat_map(|s| &s.points).collect::<Vec<_>>();
                if points.is_empty() {
                    return Err(ReportError::Render("scatter plot without points".to_owned()));
                }
                if points.iter().any(|p| !(p.0.is_finite() && p.1.is_finite()))
                    || data.reference.as_ref().is_some_and(|r| !r.value.is_finite())
                {
                    return Err(ReportError::Render("scatter values must be finite".to_owned()));
                }
                Ok(())
            }
            PanelData::Line(data) => {
                let points = data.series.iter().flat_map(|s| &s.points).collect::<Vec<_>>();
                if points.is_empty() {
                    return Err(ReportError::Render("line chart without points".to_owned()));
                }
                if points.iter().any(|p| !(p.0.is_finite() && p.1.is_finite())) {
                    return Err(ReportError::Render("line values must be finite".to_owned()));
                }
                if data.log_y && points.iter().any(|p| p.1 <= 0.0) {
                    return Err(ReportError::Render(
                        "log scale needs strictly positive values".to_owned(),
                    ));
                }
                if let Some(series) = data
                    .series
                    .iter()
                    .find(|s| !s.annotations.is_empty() && s.annotations.len() != s.points.len())
                {
                    return Err(ReportError::Render(format!(
                        "series {} has {} annotations for {} points",
                        series.label,
                        series.annotations.len(),
                        series.points.len()
                    )));
                }
                Ok(())
            }
            PanelData::Surface(data) => {
                if data.points.is_empty() {
                    return Err(ReportError::Render("surface without points".to_owned()));
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Panel {
    pub title: Option<String>,
    pub x_label: String,
    pub y_label: String,
    pub z_label: Option<String>,
    pub data: PanelData,
}

impl Panel {
    pub fn new(x_label: &str, y_label: &str, data: PanelData) -> Self {
        Self {
            title: None,
            x_label: x_label.to_owned(),
            y_label: y_label.to_owned(),
            z_label: None,
            data,
        }
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = Some(title.to_owned());
        self
    }

    pub fn with_z_label(mut self, z_label: &str) -> Self {
        self.z_label = Some(z_label.to_owned());
        self
    }
}

/// Everything needed to draw one image
#[derive(Debug, Clone)]
pub struct ChartSpec {
    pub title: String,
    pub size: (u32, u32),
    pub output: OutputTarget,
    /// Drawn side by side
    pub panels: Vec<Panel>,
}

impl ChartSpec {
    pub fn new(title: &str, output: OutputTarget) -> Self {
        Self {
            title: title.to_owned(),
            size: (1200, 600),
            output,
            panels: Vec::new(),
        }
    }

    pub fn with_size(mut self, size: (u32, u32)) -> Self {
        self.size = size;
        self
    }

    pub fn with_panel(mut self, panel: Panel) -> Self {
        self.panels.push(panel);
        self
    }

    pub fn kind(&self) -> Option<ChartKind> {
        self.panels.first().map(|p| p.data.kind())
    }

    fn validate(&self) -> Result<ChartKind, ReportError> {
        let kind = self
            .kind()
            .ok_or_else(|| ReportError::Render(format!("chart {:?} has no panels", self.title)))?;
        for panel in &self.panels {
            panel.data.validate()?;
        }
        Ok(kind)
    }
}

/// A rendered chart
#[derive(Debug, Clone, PartialEq)]
pub struct ChartArtifact {
    pub kind: ChartKind,
    pub target: OutputTarget,
    pub bytes: usize,
}

impl ChartArtifact {
    pub fn path(&self) -> Option<&Path> {
        match &self.target {
            OutputTarget::File(path) => Some(path),
            OutputTarget::Stdout => None,
        }
    }
}

/// Draws `spec` as SVG and writes it to the output target, replacing any
/// existing file.
pub fn render(spec: &ChartSpec) -> Result<ChartArtifact, ReportError> {
    let kind = spec.validate()?;
    debug!("Rendering {kind} chart {:?} to {}", spec.title, spec.output);

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, spec.size).into_drawing_area();
        draw_chart(&root, spec)?;
        root.present()?;
    }

    match &spec.output {
        OutputTarget::File(path) => {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, &svg)?;
        }
        OutputTarget::Stdout => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(svg.as_bytes())?;
            stdout.flush()?;
        }
    }

    info!("Wrote {kind} chart to {}", spec.output);
    Ok(ChartArtifact {
        kind,
        target: spec.output.clone(),
        bytes: svg.len(),
    })
}

fn draw_chart<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    spec: &ChartSpec,
) -> Result<(), ReportError> {
    root.fill(&WHITE)?;
    let body = root.titled(&spec.title, (FONT, TITLE_FONT_SIZE).into_font())?;
    let areas = body.split_evenly((1, spec.panels.len()));
    for (area, panel) in areas.iter().zip(&spec.panels) {
        match &panel.data {
            PanelData::Bars(data) => draw_bars(root, area, panel, data)?,
            PanelData::Scatter(data) => draw_scatter(area, panel, data)?,
            PanelData::Line(data) => draw_lines(area, panel, data)?,
            PanelData::Surface(data) => draw_surface(area, panel, data)?,
        }
    }
    Ok(())
}

fn padded(min: f64, max: f64) -> (f64, f64) {
    let pad = if max > min { (max - min) * 0.05 } else { 1.0 };
    (min - pad, max + pad)
}

fn draw_bars<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    area: &DrawingArea<DB, Shift>,
    panel: &Panel,
    data: &BarData,
) -> Result<(), ReportError> {
    let bars = data.place()?;
    let (x_min, x_max) = data.x_range();
    let (low, high) = bars
        .iter()
        .fold((0.0f64, 0.0f64), |(lo, hi), b| (lo.min(b.value), hi.max(b.value)));
    // headroom for the value labels
    let y_max = if high > 0.0 { high * 1.15 } else { 1.0 };
    let y_min = low * 1.15;

    let mut builder = ChartBuilder::on(area);
    builder
        .margin(10)
        .x_label_area_size(60)
        .y_label_area_size(70);
    if let Some(title) = &panel.title {
        builder.caption(title, (FONT, PANEL_TITLE_FONT_SIZE).into_font());
    }
    let mut chart = builder.build_cartesian_2d(x_min..x_max, y_min..y_max)?;
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_label_formatter(&|_| String::new())
        .x_desc(panel.x_label.as_str())
        .y_desc(panel.y_label.as_str())
        .axis_desc_style((FONT, AXIS_FONT_SIZE).into_font())
        .draw()?;

    for (idx, series) in data.series.iter().enumerate() {
        let color = series.color;
        chart
            .draw_series(bars.iter().filter(|b| b.series == idx).map(|b| {
                Rectangle::new([(b.left, 0.0), (b.right, b.value)], color.filled())
            }))?
            .label(series.label.as_str())
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
        chart.draw_series(bars.iter().filter(|b| b.series == idx).map(|b| {
            Rectangle::new([(b.left, 0.0), (b.right, b.value)], BLACK.mix(0.4).stroke_width(1))
        }))?;
    }

    let value_style = TextStyle::from((FONT, VALUE_FONT_SIZE).into_font())
        .pos(Pos::new(HPos::Center, VPos::Bottom));
    chart.draw_series(bars.iter().map(|b| {
        Text::new(
            b.label.clone(),
            ((b.left + b.right) / 2.0, b.value.max(0.0)),
            value_style.clone(),
        )
    }))?;

    let category_style =
        TextStyle::from((FONT, AXIS_FONT_SIZE).into_font()).pos(Pos::new(HPos::Center, VPos::Top));
    for (idx, name) in data.categories.iter().enumerate() {
        let (x, y) = chart
            .plotting_area()
            .map_coordinate(&(data.category_center(idx), y_min));
        root.draw(&Text::new(name.clone(), (x, y + 6), category_style.clone()))?;
    }

    if data.series.len() > 1 {
        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;
    }
    Ok(())
}

fn draw_scatter<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    panel: &Panel,
    data: &ScatterData,
) -> Result<(), ReportError> {
    let points = data.series.iter().flat_map(|s| &s.points).collect::<Vec<_>>();
    let (x_min, x_max) = points
        .iter()
        .map(|p| p.0)
        .minmax()
        .into_option()
        .unwrap_or((0.0, 1.0));
    let (y_min, y_max) = points
        .iter()
        .map(|p| p.1)
        .chain(data.reference.as_ref().map(|r| r.value))
        .minmax()
        .into_option()
        .unwrap_or((0.0, 1.0));
    let (x_min, x_max) = padded(x_min, x_max);
    let (y_min, y_max) = padded(y_min.min(0.0), y_max);

    let mut builder = ChartBuilder::on(area);
    builder.margin(10).x_label_area_size(50).y_label_area_size(70);
    if let Some(title) = &panel.title {
        builder.caption(title, (FONT, PANEL_TITLE_FONT_SIZE).into_font());
    }
    let mut chart = builder.build_cartesian_2d(x_min..x_max, y_min..y_max)?;
    chart
        .configure_mesh()
        .x_desc(panel.x_label.as_str())
        .y_desc(panel.y_label.as_str())
        .axis_desc_style((FONT, AXIS_FONT_SIZE).into_font())
        .draw()?;

    for series in &data.series {
        let color = series.color;
        let size = series.size;
        chart
            .draw_series(
                series
                    .points
                    .iter()
                    .map(|&(x, y)| Circle::new((x, y), size, color.filled())),
            )?
            .label(series.label.as_str())
            .legend(move |(x, y)| Circle::new((x + 5, y), 3, color.filled()));
    }

    if let Some(reference) = &data.reference {
        let color = reference.color;
        chart
            .draw_series(LineSeries::new(
                [(x_min, reference.value), (x_max, reference.value)],
                color.stroke_width(1),
            ))?
            .label(reference.label.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 15, y)], color.stroke_width(1)));
        if let Some(text) = &reference.text {
            let style = TextStyle::from((FONT, AXIS_FONT_SIZE).into_font().style(FontStyle::Bold))
                .color(&color)
                .pos(Pos::new(HPos::Center, VPos::Bottom));
            chart.draw_series([Text::new(
                text.clone(),
                ((x_min + x_max) / 2.0, reference.value),
                style,
            )])?;
        }
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    Ok(())
}

fn format_tick(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        format!("{value}")
    }
}

fn draw_lines<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    panel: &Panel,
    data: &LineData,
) -> Result<(), ReportError> {
    // log axes are drawn on log10 values with exponent ticks
    let project = |y: f64| if data.log_y { y.log10() } else { y };
    let points = data.series.iter().flat_map(|s| &s.points).collect::<Vec<_>>();
    let (x_min, x_max) = points
        .iter()
        .map(|p| p.0)
        .minmax()
        .into_option()
        .unwrap_or((0.0, 1.0));
    let (y_min, y_max) = points
        .iter()
        .map(|p| project(p.1))
        .minmax()
        .into_option()
        .unwrap_or((0.0, 1.0));
    let (x_min, x_max) = padded(x_min, x_max);
    let (y_min, y_max) = padded(y_min, y_max);

    let log_y = data.log_y;
    let y_formatter = move |v: &f64| {
        if !log_y {
            format_tick(*v)
        } else if (v - v.round()).abs() < 1e-9 {
            format_tick(10f64.powf(v.round()))
        } else {
            String::new()
        }
    };

    let mut builder = ChartBuilder::on(area);
    builder.margin(10).x_label_area_size(50).y_label_area_size(70);
    if let Some(title) = &panel.title {
        builder.caption(title, (FONT, PANEL_TITLE_FONT_SIZE).into_font());
    }
    let mut chart = builder.build_cartesian_2d(x_min..x_max, y_min..y_max)?;
    chart
        .configure_mesh()
        .x_desc(panel.x_label.as_str())
        .y_desc(panel.y_label.as_str())
        .x_label_formatter(&|x| format_tick(*x))
        .y_label_formatter(&y_formatter)
        .y_labels(20)
        .light_line_style(BLACK.mix(0.05))
        .axis_desc_style((FONT, AXIS_FONT_SIZE).into_font())
        .draw()?;

    let annotation_style = TextStyle::from((FONT, VALUE_FONT_SIZE).into_font())
        .pos(Pos::new(HPos::Left, VPos::Bottom));
    for series in &data.series {
        let color = series.color;
        let projected = series
            .points
            .iter()
            .map(|&(x, y)| (x, project(y)))
            .collect::<Vec<_>>();
        chart
            .draw_series(LineSeries::new(projected.iter().copied(), color.stroke_width(2)))?
            .label(series.label.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 15, y)], color.stroke_width(2)));
        chart.draw_series(
            projected
                .iter()
                .map(|&point| Circle::new(point, 4, color.filled())),
        )?;
        chart.draw_series(
            projected
                .iter()
                .zip(&series.annotations)
                .map(|(&point, text)| Text::new(text.clone(), point, annotation_style.clone())),
        )?;
    }

    if data.series.len() > 1 {
        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperLeft)
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;
    }
    Ok(())
}

/// Blue for the lowest values through to yellow for the highest
fn gradient(value: f64, min: f64, max: f64) -> HSLColor {
    let t = if max > min {
        ((value - min) / (max - min)).clamp(0.0, 1.0)
    } else {
        0.5
    };
    HSLColor(0.66 - 0.5 * t, 0.8, 0.5)
}

fn draw_surface<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    panel: &Panel,
    data: &SurfaceData,
) -> Result<(), ReportError> {
    let grid = resample_cubic(&data.points, data.resolution)?;
    let (z_min, z_max) = grid.z_range();
    let (z_lo, z_hi) = padded(z_min, z_max);
    let x_range = grid.xs[0]..grid.xs[grid.xs.len() - 1];
    let y_range = grid.ys[0]..grid.ys[grid.ys.len() - 1];

    let mut builder = ChartBuilder::on(area);
    builder.margin(20);
    if let Some(title) = &panel.title {
        builder.caption(title, (FONT, PANEL_TITLE_FONT_SIZE).into_font());
    }
    // plotters puts the vertical axis second
    let mut chart = builder.build_cartesian_3d(x_range, z_lo..z_hi, y_range)?;
    chart.with_projection(|mut pb| {
        pb.pitch = 0.35;
        pb.yaw = -0.87;
        pb.scale = 0.8;
        pb.into_matrix()
    });
    chart
        .configure_axes()
        .light_grid_style(BLACK.mix(0.15))
        .max_light_lines(3)
        .draw()?;

    let style = |z: &f64| gradient(*z, z_min, z_max).filled();
    chart.draw_series(
        SurfaceSeries::xoz(grid.xs.iter().copied(), grid.ys.iter().copied(), |x, y| {
            grid.nearest(x, y)
        })
        .style_func(&style),
    )?;

    let (_, height) = area.dim_in_pixel();
    let legend = format!(
        "x: {}    depth: {}    height: {} ({:.2} to {:.2})",
        panel.x_label,
        panel.y_label,
        panel.z_label.as_deref().unwrap_or("z"),
        z_min,
        z_max
    );
    area.draw(&Text::new(
        legend,
        (10, height as i32 - 24),
        (FONT, AXIS_FONT_SIZE).into_font(),
    ))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phase_bars() -> BarData {
        BarData::new(
            vec!["1".to_owned(), "2".to_owned(), "4".to_owned()],
            vec![
                BarSeries {
                    label: "Generation".to_owned(),
                    color: parse_color("#cfe2f3ff").unwrap(),
                    values: vec![Some(0.57), Some(0.36), Some(0.25)],
                },
                BarSeries {
                    label: "Sorting".to_owned(),
                    color: parse_color("#e01e20").unwrap(),
                    values: vec![Some(1.18), Some(0.86), Some(0.90)],
                },
            ],
        )
    }

    #[test]
    fn grouped_bars_do_not_overlap() {
        let data = phase_bars();
        let bars = data.place().unwrap();
        assert_eq!(bars.len(), 6);
        for (i, a) in bars.iter().enumerate() {
            for b in &bars[i + 1..] {
                assert!(a.right <= b.left || b.right <= a.left, "{a:?} overlaps {b:?}");
            }
        }
        let labels = bars.iter().map(|b| b.label.as_str()).collect::<Vec<_>>();
        assert_eq!(labels, ["0.57", "1.18", "0.36", "0.86", "0.25", "0.90"]);
        assert_eq!(PanelData::Bars(data).kind(), ChartKind::GroupedBar);
    }

    #[test]
    fn series_offsets_follow_layout() {
        let data = phase_bars();
        let bars = data.place().unwrap();
        let stride = data.layout.bar_width + data.layout.spacing;
        for bar in &bars {
            let start = bar.left - data.group_start(bar.category);
            assert!((start - bar.series as f64 * stride).abs() < 1e-12);
        }
        // centre lies between the two bars of the category
        let center = data.category_center(1);
        assert!(bars[2].left < center && center < bars[3].right);
    }

    #[test]
    fn missing_values_leave_gaps() {
        let mut data = phase_bars();
        data.series[1].values[2] = None;
        let bars = data.place().unwrap();
        assert_eq!(bars.len(), 5);
        assert!(!bars.iter().any(|b| b.category == 2 && b.series == 1));
    }

    #[test]
    fn invalid_bar_data() {
        let mut data = phase_bars();
        data.series[0].values.pop();
        assert!(matches!(data.place(), Err(ReportError::Render(_))));

        let mut data = phase_bars();
        data.layout.bar_width = 0.0;
        assert!(data.place().is_err());

        let mut data = phase_bars();
        for series in &mut data.series {
            series.values = vec![None; 3];
        }
        assert!(data.place().is_err());
    }

    #[test]
    fn colours() {
        assert_eq!(parse_color("#e01e20").unwrap(), RGBAColor(0xe0, 0x1e, 0x20, 1.0));
        let translucent = parse_color("#cfe2f380").unwrap();
        assert_eq!((translucent.0, translucent.3), (0xcf, 128.0 / 255.0));
        assert_eq!(parse_color("Blue").unwrap(), RGBAColor(0, 0, 255, 1.0));
        assert!(parse_color("#12345").is_err());
        assert!(parse_color("#gg0000").is_err());
        assert!(parse_color("chartreuse-ish").is_err());
        assert_eq!(series_color(None, 0).unwrap(), parse_color(DEFAULT_PALETTE[0]).unwrap());
    }

    #[test]
    fn renders_to_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("threads.svg");
        let panel = Panel::new("Number of threads", "Time (seconds)", PanelData::Bars(phase_bars()));
        let to_file = render(
            &ChartSpec::new("Vault time", OutputTarget::File(path)).with_panel(panel.clone()),
        )
        .unwrap();

        let shown = render(&ChartSpec::new("Vault time", OutputTarget::Stdout).with_panel(panel)).unwrap();
        assert_eq!(shown.kind, ChartKind::GroupedBar);
        assert_eq!(shown.target, OutputTarget::Stdout);
        assert_eq!(shown.path(), None);
        assert_eq!(shown.bytes, to_file.bytes);
    }

    #[test]
    fn renders_and_overwrites_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("threads.svg");
        let spec = ChartSpec::new("Vault time", OutputTarget::File(path.clone())).with_panel(
            Panel::new("Number of threads", "Time (seconds)", PanelData::Bars(phase_bars())),
        );

        let first = render(&spec).unwrap();
        assert_eq!(first.kind, ChartKind::GroupedBar);
        assert_eq!(first.path(), Some(path.as_path()));
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.len() > 100);
        assert!(written.contains("<svg"));
        assert!(written.contains("0.57"));

        let second = render(&spec).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap().len(), second.bytes);
        assert_eq!(first.bytes, second.bytes);
    }

    #[test]
    fn renders_scatter_line_and_surface() {
        let dir = tempfile::tempdir().unwrap();
        let scatter = ScatterData {
            series: vec![
                PointSeries {
                    label: "Found".to_owned(),
                    color: parse_color("green").unwrap(),
                    points: vec![(0.0, 12.0), (2.0, 10.0)],
                    size: 2,
                },
                PointSeries {
                    label: "Not Found".to_owned(),
                    color: parse_color("red").unwrap(),
                    points: vec![(1.0, 8.0)],
                    size: 2,
                },
            ],
            reference: Some(ReferenceLine {
                label: "Average".to_owned(),
                value: 10.0,
                color: parse_color("blue").unwrap(),
                text: Some("10.00 ms".to_owned()),
            }),
        };
        let line = LineData {
            series: vec![LineSeriesData {
                label: "HDD".to_owned(),
                color: parse_color("blue").unwrap(),
                points: vec![(1956.0, 0.000005), (1991.0, 0.009), (2026.0, 50.0)],
                annotations: vec!["0.005 GB".to_owned(), "9 GB".to_owned(), "50000 GB".to_owned()],
            }],
            log_y: true,
        };
        let surface = SurfaceData {
            points: [1.0, 2.0, 4.0, 8.0]
                .iter()
                .flat_map(|&t| [256.0, 1024.0].map(move |m| (t, m, 8.0 / t + m / 512.0)))
                .collect(),
            resolution: 20,
        };

        for (name, data) in [
            ("scatter.svg", PanelData::Scatter(scatter)),
            ("line.svg", PanelData::Line(line)),
            ("surface.svg", PanelData::Surface(surface)),
        ] {
            let kind = data.kind();
            let path = dir.path().join(name);
            let spec = ChartSpec::new(name, OutputTarget::File(path.clone()))
                .with_panel(Panel::new("x", "y", data).with_z_label("z"));
            let artifact = render(&spec).unwrap();
            assert_eq!(artifact.kind, kind);
            assert!(fs::metadata(&path).unwrap().len() > 0);
        }
    }

    #[test]
    fn degenerate_inputs_fail_to_render() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.svg");

        let empty = ChartSpec::new("empty", OutputTarget::File(path.clone()));
        assert!(matches!(render(&empty), Err(ReportError::Render(_))));

        let surface = ChartSpec::new("surface", OutputTarget::File(path.clone())).with_panel(
            Panel::new(
                "x",
                "y",
                PanelData::Surface(SurfaceData {
                    points: vec![(1.0, 1.0, 1.0), (2.0, 2.0, 2.0), (3.0, 3.0, 1.0)],
                    resolution: 10,
                }),
            ),
        );
        assert!(matches!(render(&surface), Err(ReportError::Render(_))));

        let log = ChartSpec::new("log", OutputTarget::File(path.clone())).with_panel(Panel::new(
            "x",
            "y",
            PanelData::Line(LineData {
                series: vec![LineSeriesData {
                    label: "zero".to_owned(),
                    color: parse_color("red").unwrap(),
                    points: vec![(0.0, 0.0), (1.0, 1.0)],
                    annotations: vec![],
                }],
                log_y: true,
            }),
        ));
        assert!(matches!(render(&log), Err(ReportError::Render(_))));
        assert!(!path.exists());
    }
}
