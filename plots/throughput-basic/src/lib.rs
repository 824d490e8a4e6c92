use common::{
    chart::{BarData, BarLayout, BarSeries, ChartArtifact, ChartSpec, Panel, PanelData, render, series_color},
    config::Settings,
    record::{BenchmarkRecord, load},
    report::Report,
    stats::{GroupKey, GroupedStats, KeyPart, aggregate_by_columns},
    util::{Vars, fill_template},
};
use eyre::{ContextCompat, Result};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Mean throughput per program and drive
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramBars {
    pub input: String,
    pub output: String,
    pub title: String,
    #[serde(default = "default_program_column")]
    pub program_column: String,
    #[serde(default = "default_drive_column")]
    pub drive_column: String,
    #[serde(default = "default_value_column")]
    pub value_column: String,
    /// Draw one panel per distinct value of this column
    #[serde(default)]
    pub panel_by: Option<String>,
    /// Category column inside each panel, required with `panel_by`
    #[serde(default)]
    pub x_column: Option<String>,
    #[serde(default)]
    pub x_label: Option<String>,
    #[serde(default = "default_y_label")]
    pub y_label: String,
    /// Series colours, the default palette when absent or exhausted
    #[serde(default)]
    pub colors: Vec<String>,
    #[serde(default = "default_layout")]
    pub layout: BarLayout,
    #[serde(default = "default_precision")]
    pub precision: usize,
}

fn default_program_column() -> String {
    "Program".to_owned()
}

fn default_drive_column() -> String {
    "Drive".to_owned()
}

fn default_value_column() -> String {
    "Throughput".to_owned()
}

fn default_y_label() -> String {
    "Throughput (MB/s)".to_owned()
}

fn default_layout() -> BarLayout {
    BarLayout {
        bar_width: 0.15,
        spacing: 0.05,
        group_spacing: 0.1,
    }
}

fn default_precision() -> usize {
    1
}

impl Default for ProgramBars {
    fn default() -> Self {
        Self {
            input: String::new(),
            output: String::new(),
            title: String::new(),
            program_column: default_program_column(),
            drive_column: default_drive_column(),
            value_column: default_value_column(),
            panel_by: None,
            x_column: None,
            x_label: None,
            y_label: default_y_label(),
            colors: Vec::new(),
            layout: default_layout(),
            precision: default_precision(),
        }
    }
}

/// Distinct values of key part `idx`, in the order they appear in `stats`
fn distinct_parts(stats: &GroupedStats<GroupKey>, idx: usize) -> Vec<KeyPart> {
    stats
        .keys()
        .filter_map(|key| key.part(idx).cloned())
        .unique()
        .collect()
}

impl ProgramBars {
    /// Stats keyed by `[category, series]`
    fn bars(
        &self,
        stats: &GroupedStats<GroupKey>,
        categories: &[KeyPart],
        series: &[KeyPart],
    ) -> Result<BarData> {
        let series = series
            .iter()
            .enumerate()
            .map(|(idx, name)| -> Result<BarSeries> {
                let values = categories
                    .iter()
                    .map(|category| {
                        let key = GroupKey(vec![category.clone(), name.clone()]);
                        stats.get(&key).map(|s| s.mean)
                    })
                    .collect();
                Ok(BarSeries {
                    label: name.to_string(),
                    color: series_color(self.colors.get(idx).map(String::as_str), idx)?,
                    values,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(
            BarData::new(categories.iter().map(|c| c.to_string()).collect(), series)
                .with_layout(self.layout)
                .with_precision(self.precision),
        )
    }

    /// Programs on x, one series per drive
    fn single_panel(&self, records: &[BenchmarkRecord]) -> Result<Vec<Panel>> {
        let stats = aggregate_by_columns(
            records,
            &[&self.program_column, &self.drive_column],
            |r| r.float(&self.value_column),
        );
        let programs = distinct_parts(&stats, 0);
        let drives = distinct_parts(&stats, 1);
        let data = self.bars(&stats, &programs, &drives)?;
        let x_label = self.x_label.as_deref().unwrap_or(&self.program_column);
        Ok(vec![Panel::new(x_label, &self.y_label, PanelData::Bars(data))])
    }

    /// One panel per value of `panel_by`, `x_column` on x, one series per program
    fn panels(&self, records: &[BenchmarkRecord], panel_by: &str) -> Result<Vec<Panel>> {
        let x_column = self
            .x_column
            .as_deref()
            .context("x_column is required with panel_by")?;
        let x_label = self.x_label.as_deref().unwrap_or(x_column);

        let groups = records
            .iter()
            .filter_map(|r| r.get(panel_by))
            .unique()
            .map(|x| x.to_owned())
            .collect::<Vec<_>>();
        debug!("Drawing {} panels by {panel_by}", groups.len());

        groups
            .iter()
            .map(|group| -> Result<Panel> {
                let subset = records
                    .iter()
                    .filter(|r| r.get(panel_by) == Some(group.as_str()))
                    .cloned()
                    .collect::<Vec<_>>();
                let stats = aggregate_by_columns(
                    &subset,
                    &[x_column, self.program_column.as_str()],
                    |r| r.float(&self.value_column),
                );
                let categories = distinct_parts(&stats, 0)
                    .into_iter()
                    .sorted()
                    .collect::<Vec<_>>();
                let programs = distinct_parts(&stats, 1);
                let data = self.bars(&stats, &categories, &programs)?;
                Ok(Panel::new(x_label, &self.y_label, PanelData::Bars(data)).with_title(group))
            })
            .collect()
    }
}

#[typetag::serde]
impl Report for ProgramBars {
    fn required_columns(&self) -> Vec<String> {
        let mut columns = vec![
            self.program_column.clone(),
            self.drive_column.clone(),
            self.value_column.clone(),
        ];
        columns.extend(self.panel_by.iter().cloned());
        columns.extend(self.x_column.iter().cloned());
        columns.into_iter().unique().collect()
    }

    fn generate(&self, name: &str, vars: &Vars, settings: &Settings) -> Result<Vec<ChartArtifact>> {
        let path = settings.input_path(&self.input, vars)?;
        let table = load(&path, &self.required_columns())?;
        debug!("{name}: {} rows", table.len());

        let panels = match &self.panel_by {
            Some(panel_by) => self.panels(table.records(), panel_by)?,
            None => self.single_panel(table.records())?,
        };

        let mut spec = ChartSpec::new(
            &fill_template(&self.title, vars)?,
            settings.output_target(&self.output, vars)?,
        )
        .with_size(settings.size());
        for panel in panels {
            spec = spec.with_panel(panel);
        }
        Ok(vec![render(&spec)?])
    }
}
