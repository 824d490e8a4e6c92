use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use csv::{ReaderBuilder, StringRecord, Trim};
use itertools::Itertools;
use tracing::debug;

use crate::{
    duration::{TimeUnit, normalize_duration},
    error::ReportError,
};

/// Column schemas written by the benchmark program
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schema {
    ThreadThroughput,
    PhaseTiming,
    ProgramDrive,
    Lookup,
}

impl Schema {
    pub fn required_columns(&self) -> &'static [&'static str] {
        match self {
            Schema::ThreadThroughput => &["threads", "memory", "hash_time", "sort_time"],
            // Phase files carry a varying subset, reports ask for what they plot
            Schema::PhaseTiming => &[],
            Schema::ProgramDrive => &["Program", "Drive", "Throughput"],
            Schema::Lookup => &["LookupTime(ms)", "IsExist"],
        }
    }
}

#[derive(Debug, Default, Clone)]
struct ColumnIndex {
    names: Vec<String>,
    positions: HashMap<String, usize>,
}

impl ColumnIndex {
    fn new(header: &StringRecord) -> Self {
        let names = header.iter().map(|x| x.to_owned()).collect::<Vec<_>>();
        let positions = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        Self { names, positions }
    }
}

/// One row of a benchmark table
#[derive(Debug, Clone)]
pub struct BenchmarkRecord {
    /// 0-based row number within its file
    pub index: usize,
    columns: Arc<ColumnIndex>,
    row: StringRecord,
}

impl BenchmarkRecord {
    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns
            .positions
            .get(column)
            .and_then(|i| self.row.get(*i))
    }

    pub fn text(&self, column: &str) -> Result<&str, ReportError> {
        self.get(column)
            .ok_or_else(|| ReportError::Parse(format!("Missing column {column}")))
    }

    pub fn int(&self, column: &str) -> Result<i64, ReportError> {
        let raw = self.text(column)?;
        raw.parse::<i64>()
            .map_err(|_| ReportError::Value(format!("{column}: {raw:?} is not an integer")))
    }

    pub fn float(&self, column: &str) -> Result<f64, ReportError> {
        let raw = self.text(column)?;
        match raw.parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(value),
            _ => Err(ReportError::Value(format!("{column}: {raw:?} is not a number"))),
        }
    }

    pub fn flag(&self, column: &str) -> Result<bool, ReportError> {
        let raw = self.text(column)?;
        match raw.to_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => Err(ReportError::Value(format!("{column}: {raw:?} is not a boolean"))),
        }
    }

    pub fn duration(&self, column: &str, unit: TimeUnit) -> Result<f64, ReportError> {
        normalize_duration(self.text(column)?, unit).map_err(|e| match e {
            ReportError::Value(msg) => ReportError::Value(format!("{column}: {msg}")),
            other => other,
        })
    }

    /// Sum of several duration columns, e.g. `hash_time + sort_time`
    pub fn duration_sum(&self, columns: &[String], unit: TimeUnit) -> Result<f64, ReportError> {
        columns
            .iter()
            .map(|column| self.duration(column, unit))
            .sum()
    }
}

/// A loaded CSV file
#[derive(Debug, Clone)]
pub struct BenchmarkTable {
    pub path: PathBuf,
    columns: Arc<ColumnIndex>,
    records: Vec<BenchmarkRecord>,
}

impl BenchmarkTable {
    pub fn columns(&self) -> &[String] {
        &self.columns.names
    }

    pub fn records(&self) -> &[BenchmarkRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<BenchmarkRecord> {
        self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Adds `column` with the same `value` to every row. Used when a value such
    /// as the thread count lives in the file name rather than in the file.
    pub fn tag(mut self, column: &str, value: &str) -> Self {
        let mut columns = (*self.columns).clone();
        let position = match columns.positions.get(column) {
            Some(position) => *position,
            None => {
                columns.names.push(column.to_owned());
                columns.positions.insert(column.to_owned(), columns.names.len() - 1);
                columns.names.len() - 1
            }
        };
        let columns = Arc::new(columns);

        for record in &mut self.records {
            let mut row = record
                .row
                .iter()
                .map(|x| x.to_owned())
                .collect::<Vec<_>>();
            if position < row.len() {
                row[position] = value.to_owned();
            } else {
                row.push(value.to_owned());
            }
            record.row = StringRecord::from(row);
            record.columns = columns.clone();
        }
        self.columns = columns;
        self
    }
}

/// Loads a CSV file with a header row.
///
/// Fails with [`ReportError::FileNotFound`] when `path` does not exist and with
/// [`ReportError::Parse`] when the header is empty or lacks one of
/// `required_columns`. Field values are not interpreted here.
pub fn load<S: AsRef<str>>(
    path: &Path,
    required_columns: &[S],
) -> Result<BenchmarkTable, ReportError> {
    if !path.exists() {
        return Err(ReportError::FileNotFound(path.to_path_buf()));
    }

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_path(path)?;

    let header = reader.headers()?.clone();
    if header.is_empty() || header.iter().all(|x| x.is_empty()) {
        return Err(ReportError::Parse(format!(
            "{} has no header row",
            path.display()
        )));
    }

    let columns = Arc::new(ColumnIndex::new(&header));
    let missing = required_columns
        .iter()
        .map(|x| x.as_ref())
        .filter(|x| !columns.positions.contains_key(*x))
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        return Err(ReportError::Parse(format!(
            "{} is missing columns: {}",
            path.display(),
            missing.iter().join(", ")
        )));
    }

    let records = reader
        .records()
        .enumerate()
        .map(|(index, row)| -> Result<BenchmarkRecord, ReportError> {
            Ok(BenchmarkRecord {
                index,
                columns: columns.clone(),
                row: row?,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    debug!("Loaded {} rows from {}", records.len(), path.display());
    Ok(BenchmarkTable {
        path: path.to_path_buf(),
        columns,
        records,
    })
}
