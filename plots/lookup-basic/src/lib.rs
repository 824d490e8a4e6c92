use std::{fmt::Display, path::Path};

use common::{
    chart::{ChartArtifact, ChartSpec, Panel, PanelData, PointSeries, ReferenceLine, ScatterData, parse_color, render},
    config::Settings,
    duration::TimeUnit,
    error::ReportError,
    record::{BenchmarkRecord, Schema, load},
    report::Report,
    stats::{AggregateStat, KeyOrder, aggregate},
    util::{Vars, fill_template, with_var},
};
use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const LOOKUP_TIME: &str = "LookupTime(ms)";
const IS_EXIST: &str = "IsExist";

fn lookup_time(record: &BenchmarkRecord) -> Result<f64, ReportError> {
    record.duration(LOOKUP_TIME, TimeUnit::Milliseconds)
}

fn is_exist(record: &BenchmarkRecord) -> Result<bool, ReportError> {
    record.flag(IS_EXIST)
}

/// Lookup time statistics of one file, split by whether the key existed
#[derive(Debug, Clone, PartialEq)]
pub struct LookupStats {
    pub found: Option<AggregateStat>,
    pub not_found: Option<AggregateStat>,
    /// Rows without a usable time or flag
    pub dropped: usize,
}

/// Reads a lookup CSV and computes min/mean/max per class, in milliseconds
pub fn summarize_lookup(path: &Path) -> Result<LookupStats, ReportError> {
    let table = load(path, Schema::Lookup.required_columns())?;
    let stats = aggregate(table.records(), is_exist, lookup_time, KeyOrder::Ascending);
    Ok(LookupStats {
        found: stats.get(&true).copied(),
        not_found: stats.get(&false).copied(),
        dropped: stats.dropped,
    })
}

fn write_class(
    f: &mut std::fmt::Formatter<'_>,
    name: &str,
    stat: &Option<AggregateStat>,
) -> std::fmt::Result {
    match stat {
        Some(stat) => write!(
            f,
            "{name}: min={:.2}ms, average={:.2}ms, max={:.2}ms",
            stat.min, stat.mean, stat.max
        ),
        None => write!(f, "{name}: no records"),
    }
}

impl Display for LookupStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write_class(f, "Found", &self.found)?;
        writeln!(f)?;
        write_class(f, "Not Found", &self.not_found)
    }
}

fn default_ks() -> Vec<i64> {
    vec![25, 30]
}

fn default_hash_lens() -> Vec<i64> {
    vec![4, 8, 12]
}

fn default_title() -> String {
    "Lookup Times in 2^{k} records w/ a prefix length of {hash_len}".to_owned()
}

fn default_x_label() -> String {
    "Lookup #".to_owned()
}

fn default_y_label() -> String {
    "Lookup Time (ms)".to_owned()
}

fn default_found_color() -> String {
    "green".to_owned()
}

fn default_not_found_color() -> String {
    "red".to_owned()
}

fn default_mean_color() -> String {
    "blue".to_owned()
}

fn default_point_size() -> u32 {
    2
}

/// Lookup times against row number for every `k` and prefix length
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupScatter {
    /// Template using `{k}` and `{hash_len}`
    pub input: String,
    pub output: String,
    #[serde(default = "default_ks")]
    pub ks: Vec<i64>,
    #[serde(default = "default_hash_lens")]
    pub hash_lens: Vec<i64>,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_x_label")]
    pub x_label: String,
    #[serde(default = "default_y_label")]
    pub y_label: String,
    #[serde(default = "default_found_color")]
    pub found_color: String,
    #[serde(default = "default_not_found_color")]
    pub not_found_color: String,
    #[serde(default = "default_mean_color")]
    pub mean_color: String,
    #[serde(default = "default_point_size")]
    pub point_size: u32,
}

impl Default for LookupScatter {
    fn default() -> Self {
        Self {
            input: "lookup_csv/lookup_{k}_{hash_len}.csv".to_owned(),
            output: "lookup_plot/lookup_{k}_{hash_len}_plot.svg".to_owned(),
            ks: default_ks(),
            hash_lens: default_hash_lens(),
            title: default_title(),
            x_label: default_x_label(),
            y_label: default_y_label(),
            found_color: default_found_color(),
            not_found_color: default_not_found_color(),
            mean_color: default_mean_color(),
            point_size: default_point_size(),
        }
    }
}

impl LookupScatter {
    fn scatter(&self, records: &[BenchmarkRecord]) -> Result<ScatterData> {
        let mut found = Vec::new();
        let mut not_found = Vec::new();
        let mut dropped = 0;
        for record in records {
            match (is_exist(record), lookup_time(record)) {
                (Ok(true), Ok(time)) => found.push((record.index as f64, time)),
                (Ok(false), Ok(time)) => not_found.push((record.index as f64, time)),
                (Err(err), _) | (_, Err(err)) => {
                    debug!("Dropping row {}: {err}", record.index);
                    dropped += 1;
                }
            }
        }
        if dropped > 0 {
            warn!("Dropped {dropped} of {} lookups", records.len());
        }

        // the mean covers every timed lookup, flagged or not
        let times = records
            .iter()
            .filter_map(|record| lookup_time(record).ok())
            .collect::<Vec<_>>();
        let reference = AggregateStat::from_values(&times)
            .map(|stat| -> Result<ReferenceLine> {
                Ok(ReferenceLine {
                    label: "Average".to_owned(),
                    value: stat.mean,
                    color: parse_color(&self.mean_color)?,
                    text: Some(format!("{:.2} ms", stat.mean)),
                })
            })
            .transpose()?;

        Ok(ScatterData {
            series: vec![
                PointSeries {
                    label: "Found".to_owned(),
                    color: parse_color(&self.found_color)?,
                    points: found,
                    size: self.point_size,
                },
                PointSeries {
                    label: "Not Found".to_owned(),
                    color: parse_color(&self.not_found_color)?,
                    points: not_found,
                    size: self.point_size,
                },
            ],
            reference,
        })
    }
}

#[typetag::serde]
impl Report for LookupScatter {
    fn required_columns(&self) -> Vec<String> {
        Schema::Lookup
            .required_columns()
            .iter()
            .map(|x| x.to_string())
            .collect()
    }

    fn generate(&self, name: &str, vars: &Vars, settings: &Settings) -> Result<Vec<ChartArtifact>> {
        let mut artifacts = Vec::new();
        for k in &self.ks {
            for hash_len in &self.hash_lens {
                let vars = with_var(&with_var(vars, "k", *k), "hash_len", *hash_len);
                let path = settings.input_path(&self.input, &vars)?;
                let table = load(&path, &self.required_columns())
                    .wrap_err_with(|| format!("{name}: k={k}, hash_len={hash_len}"))?;

                let data = self.scatter(table.records())?;
                let spec = ChartSpec::new(
                    &fill_template(&self.title, &vars)?,
                    settings.output_target(&self.output, &vars)?,
                )
                .with_size(settings.size())
                .with_panel(Panel::new(&self.x_label, &self.y_label, PanelData::Scatter(data)));
                artifacts.push(render(&spec)?);
            }
        }
        Ok(artifacts)
    }
}

/// Prints the found / not found summary of every `k` and prefix length
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupSummary {
    pub input: String,
    #[serde(default = "default_ks")]
    pub ks: Vec<i64>,
    #[serde(default = "default_hash_lens")]
    pub hash_lens: Vec<i64>,
}

impl Default for LookupSummary {
    fn default() -> Self {
        Self {
            input: "lookup_csv/lookup_{k}_{hash_len}.csv".to_owned(),
            ks: default_ks(),
            hash_lens: default_hash_lens(),
        }
    }
}

#[typetag::serde]
impl Report for LookupSummary {
    fn required_columns(&self) -> Vec<String> {
        Schema::Lookup
            .required_columns()
            .iter()
            .map(|x| x.to_string())
            .collect()
    }

    fn generate(&self, name: &str, vars: &Vars, settings: &Settings) -> Result<Vec<ChartArtifact>> {
        for k in &self.ks {
            for hash_len in &self.hash_lens {
                let vars = with_var(&with_var(vars, "k", *k), "hash_len", *hash_len);
                let path = settings.input_path(&self.input, &vars)?;
                let stats = summarize_lookup(&path)
                    .wrap_err_with(|| format!("{name}: k={k}, hash_len={hash_len}"))?;
                println!("{}\n{stats}", path.display());
            }
        }
        Ok(vec![])
    }
}
