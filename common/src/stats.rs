use std::{collections::HashMap, fmt::Display, hash::Hash};

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{error::ReportError, record::BenchmarkRecord};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregateStat {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

impl AggregateStat {
    /// `None` for an empty slice, a group without values has no statistics
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let (min, max) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), &x| {
                (min.min(x), max.max(x))
            });
        Some(Self {
            mean: values.iter().sum::<f64>() / values.len() as f64,
            min,
            max,
            count: values.len(),
        })
    }
}

/// Order in which groups are reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOrder {
    /// Numeric keys such as thread count or `k`
    Ascending,
    /// Categorical keys such as program or drive names
    FirstSeen,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyPart {
    Int(i64),
    Text(String),
}

impl KeyPart {
    fn parse(raw: &str) -> Self {
        match raw.parse::<i64>() {
            Ok(x) => KeyPart::Int(x),
            Err(_) => KeyPart::Text(raw.to_owned()),
        }
    }
}

impl Display for KeyPart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyPart::Int(x) => write!(f, "{x}"),
            KeyPart::Text(x) => f.write_str(x),
        }
    }
}

/// Grouping key read from one or more columns of a record
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey(pub Vec<KeyPart>);

impl GroupKey {
    pub fn from_columns<S: AsRef<str>>(
        record: &BenchmarkRecord,
        columns: &[S],
    ) -> Result<Self, ReportError> {
        columns
            .iter()
            .map(|column| record.text(column.as_ref()).map(KeyPart::parse))
            .collect::<Result<Vec<_>, _>>()
            .map(GroupKey)
    }

    pub fn is_numeric(&self) -> bool {
        self.0.iter().all(|x| matches!(x, KeyPart::Int(_)))
    }

    pub fn part(&self, idx: usize) -> Option<&KeyPart> {
        self.0.get(idx)
    }
}

impl Display for GroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.iter().join("/"))
    }
}

/// Per-group statistics in reporting order
#[derive(Debug, Clone)]
pub struct GroupedStats<K> {
    groups: Vec<(K, AggregateStat)>,
    /// Rows whose key or value could not be parsed
    pub dropped: usize,
}

impl<K: PartialEq> GroupedStats<K> {
    pub fn get(&self, key: &K) -> Option<&AggregateStat> {
        self.groups.iter().find(|(k, _)| k == key).map(|(_, stat)| stat)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(K, AggregateStat)> {
        self.groups.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.groups.iter().map(|(k, _)| k)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Groups `records` by `key_fn` and computes mean/min/max of `value_fn` per
/// group. Rows where either function fails are dropped and counted, they never
/// contribute a value. Groups that end up without values are omitted.
pub fn aggregate<K, KeyFn, ValueFn>(
    records: &[BenchmarkRecord],
    key_fn: KeyFn,
    value_fn: ValueFn,
    order: KeyOrder,
) -> GroupedStats<K>
where
    K: Clone + Eq + Hash + Ord,
    KeyFn: Fn(&BenchmarkRecord) -> Result<K, ReportError>,
    ValueFn: Fn(&BenchmarkRecord) -> Result<f64, ReportError>,
{
    let mut seen: Vec<K> = Vec::new();
    let mut values: HashMap<K, Vec<f64>> = HashMap::new();
    let mut dropped = 0;

    for record in records {
        let item = key_fn(record).and_then(|key| Ok((key, value_fn(record)?)));
        match item {
            Ok((key, value)) => {
                if !values.contains_key(&key) {
                    seen.push(key.clone());
                }
                values.entry(key).or_default().push(value);
            }
            Err(err) => {
                debug!("Dropping row {}: {err}", record.index);
                dropped += 1;
            }
        }
    }
    if dropped > 0 {
        warn!("Dropped {dropped} of {} rows with unusable values", records.len());
    }

    if order == KeyOrder::Ascending {
        seen.sort();
    }
    let groups = seen
        .into_iter()
        .filter_map(|key| {
            let stat = AggregateStat::from_values(values.get(&key)?)?;
            Some((key, stat))
        })
        .collect();

    GroupedStats { groups, dropped }
}

/// [`aggregate`] keyed on `columns`. Keys that are all integers are reported in
/// ascending order, anything else in the order first seen.
pub fn aggregate_by_columns<S, ValueFn>(
    records: &[BenchmarkRecord],
    columns: &[S],
    value_fn: ValueFn,
) -> GroupedStats<GroupKey>
where
    S: AsRef<str>,
    ValueFn: Fn(&BenchmarkRecord) -> Result<f64, ReportError>,
{
    let numeric = records
        .iter()
        .filter_map(|record| GroupKey::from_columns(record, columns).ok())
        .all(|key| key.is_numeric());
    let order = if numeric {
        KeyOrder::Ascending
    } else {
        KeyOrder::FirstSeen
    };
    aggregate(
        records,
        |record| GroupKey::from_columns(record, columns),
        value_fn,
        order,
    )
}
