use common::{
    chart::{BarData, BarLayout, BarSeries, ChartArtifact, ChartSpec, Panel, PanelData, render, series_color},
    config::Settings,
    duration::TimeUnit,
    record::{BenchmarkRecord, load},
    report::Report,
    stats::{GroupedStats, KeyOrder, aggregate},
    util::{Vars, fill_template, with_var},
};
use eyre::{Context, ContextCompat, Result, bail};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Mean duration of each benchmark phase, grouped by thread count
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct PhaseBars {
    /// Single file with a thread column, or a per-thread template using `{threads}`
    #[serde(default)]
    pub input: String,
    /// Inline x labels. When set, every phase carries its own `values` and no file is read.
    #[serde(default)]
    pub categories: Option<Vec<String>>,
    /// Thread counts to load, one file each. Without it `input` is one file.
    #[serde(default)]
    pub threads: Option<Vec<i64>>,
    #[serde(default = "default_thread_column")]
    pub thread_column: String,
    pub phases: Vec<Phase>,
    #[serde(default)]
    pub unit: TimeUnit,
    pub output: String,
    pub title: String,
    #[serde(default = "default_x_label")]
    pub x_label: String,
    #[serde(default)]
    pub y_label: Option<String>,
    #[serde(default)]
    pub layout: BarLayout,
    #[serde(default = "default_precision")]
    pub precision: usize,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Phase {
    /// Column name, or several joined with `+` to plot their sum
    #[serde(default)]
    pub column: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    /// One value per inline category
    #[serde(default)]
    pub values: Option<Vec<f64>>,
}

impl Phase {
    fn columns(&self) -> Vec<String> {
        self.column.split('+').map(|x| x.trim().to_owned()).collect()
    }

    fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.column)
    }
}

fn default_thread_column() -> String {
    "threads".to_owned()
}

fn default_x_label() -> String {
    "Number of threads".to_owned()
}

fn default_precision() -> usize {
    2
}

impl PhaseBars {
    fn load_records(&self, vars: &Vars, settings: &Settings) -> Result<Vec<BenchmarkRecord>> {
        let required = self.required_columns();
        match &self.threads {
            Some(threads) => {
                let mut records = Vec::new();
                for threads in threads {
                    let path = settings.input_path(&self.input, &with_var(vars, "threads", *threads))?;
                    let phase_columns = &required[..required.len() - 1];
                    let table = load(&path, phase_columns)?
                        .tag(&self.thread_column, &threads.to_string());
                    debug!("{} rows for {threads} threads", table.len());
                    records.extend(table.into_records());
                }
                Ok(records)
            }
            None => {
                let path = settings.input_path(&self.input, vars)?;
                Ok(load(&path, &required)?.into_records())
            }
        }
    }

    fn inline_series(&self, categories: &[String]) -> Result<Vec<BarSeries>> {
        self.phases
            .iter()
            .enumerate()
            .map(|(idx, phase)| -> Result<BarSeries> {
                let values = phase
                    .values
                    .as_ref()
                    .with_context(|| format!("Phase {} has no inline values", phase.label()))?;
                if values.len() != categories.len() {
                    bail!(
                        "Phase {} has {} values for {} categories",
                        phase.label(),
                        values.len(),
                        categories.len()
                    );
                }
                Ok(BarSeries {
                    label: phase.label().to_owned(),
                    color: series_color(phase.color.as_deref(), idx)?,
                    values: values.iter().map(|v| Some(*v)).collect(),
                })
            })
            .collect()
    }

    fn loaded_series(
        &self,
        name: &str,
        vars: &Vars,
        settings: &Settings,
    ) -> Result<(Vec<String>, Vec<BarSeries>)> {
        let records = self
            .load_records(vars, settings)
            .wrap_err_with(|| format!("Load inputs of {name}"))?;

        let stats: Vec<GroupedStats<i64>> = self
            .phases
            .iter()
            .map(|phase| {
                let columns = phase.columns();
                aggregate(
                    &records,
                    |r| r.int(&self.thread_column),
                    |r| r.duration_sum(&columns, self.unit),
                    KeyOrder::Ascending,
                )
            })
            .collect();
        let threads = stats
            .iter()
            .flat_map(|s| s.keys().copied())
            .sorted()
            .dedup()
            .collect::<Vec<_>>();

        let series = self
            .phases
            .iter()
            .zip(&stats)
            .enumerate()
            .map(|(idx, (phase, stats))| -> Result<BarSeries> {
                Ok(BarSeries {
                    label: phase.label().to_owned(),
                    color: series_color(phase.color.as_deref(), idx)?,
                    values: threads
                        .iter()
                        .map(|t| stats.get(t).map(|s| s.mean))
                        .collect(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok((threads.iter().map(|t| t.to_string()).collect(), series))
    }

    fn y_label(&self) -> String {
        self.y_label.clone().unwrap_or_else(|| match self.unit {
            TimeUnit::Seconds => "Time (seconds)".to_owned(),
            TimeUnit::Milliseconds => "Time (milliseconds)".to_owned(),
        })
    }
}

#[typetag::serde]
impl Report for PhaseBars {
    fn required_columns(&self) -> Vec<String> {
        self.phases
            .iter()
            .flat_map(|phase| phase.columns())
            .unique()
            .chain([self.thread_column.clone()])
            .collect()
    }

    fn generate(&self, name: &str, vars: &Vars, settings: &Settings) -> Result<Vec<ChartArtifact>> {
        let (categories, series) = match &self.categories {
            Some(categories) => (categories.clone(), self.inline_series(categories)?),
            None => self.loaded_series(name, vars, settings)?,
        };

        let data = BarData::new(categories, series)
            .with_layout(self.layout)
            .with_precision(self.precision);
        let spec = ChartSpec::new(
            &fill_template(&self.title, vars)?,
            settings.output_target(&self.output, vars)?,
        )
        .with_size(settings.size())
        .with_panel(Panel::new(&self.x_label, &self.y_label(), PanelData::Bars(data)));

        Ok(vec![render(&spec)?])
    }
}
