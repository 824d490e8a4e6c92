use common::{
    chart::{ChartArtifact, ChartSpec, LineData, LineSeriesData, Panel, PanelData, parse_color, render},
    config::Settings,
    record::load,
    report::Report,
    util::{Vars, fill_template, with_var},
};
use eyre::{Result, bail};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// One labelled line, e.g. storage capacity over the years
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrowthLine {
    /// CSV to read the points from, used when `points` is empty
    #[serde(default)]
    pub input: Option<String>,
    #[serde(default)]
    pub points: Vec<(f64, f64)>,
    #[serde(default = "default_x_column")]
    pub x_column: String,
    #[serde(default = "default_y_column")]
    pub y_column: String,
    /// Every y value is divided by this, e.g. 1000 for GB to TB
    #[serde(default = "default_y_scale")]
    pub y_scale: f64,
    #[serde(default)]
    pub log_y: bool,
    /// Text next to each point, `{value}` is the unscaled y value
    #[serde(default)]
    pub annotation: Option<String>,
    #[serde(default = "default_label")]
    pub label: String,
    #[serde(default = "default_color")]
    pub color: String,
    pub output: String,
    pub title: String,
    #[serde(default = "default_x_column")]
    pub x_label: String,
    #[serde(default = "default_y_column")]
    pub y_label: String,
}

fn default_x_column() -> String {
    "Year".to_owned()
}

fn default_y_column() -> String {
    "Capacity".to_owned()
}

fn default_y_scale() -> f64 {
    1.0
}

fn default_label() -> String {
    "Capacity".to_owned()
}

fn default_color() -> String {
    "blue".to_owned()
}

impl Default for GrowthLine {
    fn default() -> Self {
        Self {
            input: None,
            points: Vec::new(),
            x_column: default_x_column(),
            y_column: default_y_column(),
            y_scale: default_y_scale(),
            log_y: false,
            annotation: None,
            label: default_label(),
            color: default_color(),
            output: String::new(),
            title: String::new(),
            x_label: default_x_column(),
            y_label: default_y_column(),
        }
    }
}

impl GrowthLine {
    fn raw_points(&self, vars: &Vars, settings: &Settings) -> Result<Vec<(f64, f64)>> {
        if !self.points.is_empty() {
            return Ok(self.points.clone());
        }
        let Some(input) = &self.input else {
            bail!("Either points or input is required");
        };

        let table = load(&settings.input_path(input, vars)?, &self.required_columns())?;
        let mut points = Vec::new();
        for record in table.records() {
            match record
                .float(&self.x_column)
                .and_then(|x| Ok((x, record.float(&self.y_column)?)))
            {
                Ok(point) => points.push(point),
                Err(err) => debug!("Dropping row {}: {err}", record.index),
            }
        }
        if points.len() < table.len() {
            warn!("Dropped {} of {} rows", table.len() - points.len(), table.len());
        }
        Ok(points)
    }
}

#[typetag::serde]
impl Report for GrowthLine {
    fn required_columns(&self) -> Vec<String> {
        vec![self.x_column.clone(), self.y_column.clone()]
    }

    fn generate(&self, name: &str, vars: &Vars, settings: &Settings) -> Result<Vec<ChartArtifact>> {
        if !(self.y_scale.is_finite() && self.y_scale != 0.0) {
            bail!("{name}: y_scale must be a non-zero number");
        }
        let raw = self.raw_points(vars, settings)?;
        debug!("{name}: {} points", raw.len());

        let annotations = match &self.annotation {
            Some(template) => raw
                .iter()
                .map(|(_, y)| fill_template(template, &with_var(vars, "value", *y)))
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };
        let data = LineData {
            series: vec![LineSeriesData {
                label: self.label.clone(),
                color: parse_color(&self.color)?,
                points: raw.iter().map(|&(x, y)| (x, y / self.y_scale)).collect(),
                annotations,
            }],
            log_y: self.log_y,
        };

        let spec = ChartSpec::new(
            &fill_template(&self.title, vars)?,
            settings.output_target(&self.output, vars)?,
        )
        .with_size(settings.size())
        .with_panel(Panel::new(&self.x_label, &self.y_label, PanelData::Line(data)));
        Ok(vec![render(&spec)?])
    }
}
