use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::error::ReportError;

/// Unit that normalized durations are expressed in
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeUnit {
    #[default]
    #[serde(rename = "s", alias = "seconds")]
    Seconds,
    #[serde(rename = "ms", alias = "milliseconds")]
    Milliseconds,
}

impl TimeUnit {
    fn seconds(&self) -> f64 {
        match self {
            TimeUnit::Seconds => 1.0,
            TimeUnit::Milliseconds => 1e-3,
        }
    }

    pub fn suffix(&self) -> &'static str {
        match self {
            TimeUnit::Seconds => "s",
            TimeUnit::Milliseconds => "ms",
        }
    }
}

impl Display for TimeUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Recognised suffixes and their length in seconds. Every multi-character
/// suffix ends in `s`, so bare `s` has to stay last.
const SUFFIXES: &[(&str, f64)] = &[
    ("ms", 1e-3),
    ("\u{b5}s", 1e-6),
    ("\u{3bc}s", 1e-6),
    ("us", 1e-6),
    ("ns", 1e-9),
    ("s", 1.0),
];

/// Converts a raw duration field into `unit`.
///
/// A plain number is taken to already be in `unit`. Otherwise the value must
/// carry one of the suffixes the benchmark program writes (`12.3ms`, `450µs`,
/// `3.2s`, `800ns`). Anything else is a [`ReportError::Value`]; callers drop
/// the row instead of substituting a default.
pub fn normalize_duration(raw: &str, unit: TimeUnit) -> Result<f64, ReportError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ReportError::Value("empty duration".to_owned()));
    }

    if let Ok(value) = raw.parse::<f64>() {
        return finite(value, raw);
    }

    let (number, scale) = SUFFIXES
        .iter()
        .find_map(|(suffix, scale)| raw.strip_suffix(suffix).map(|n| (n, *scale)))
        .ok_or_else(|| ReportError::Value(format!("unrecognised duration unit in {raw:?}")))?;

    let value = number
        .trim()
        .parse::<f64>()
        .map_err(|_| ReportError::Value(format!("invalid duration {raw:?}")))?;
    finite(value * scale / unit.seconds(), raw)
}

fn finite(value: f64, raw: &str) -> Result<f64, ReportError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ReportError::Value(format!("non-finite duration {raw:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn millisecond_suffix() {
        assert!(close(normalize_duration("5ms", TimeUnit::Milliseconds).unwrap(), 5.0));
        assert!(close(normalize_duration("5ms", TimeUnit::Seconds).unwrap(), 0.005));
    }

    #[test]
    fn microsecond_suffixes() {
        assert!(close(normalize_duration("250µs", TimeUnit::Milliseconds).unwrap(), 0.25));
        assert!(close(normalize_duration("250μs", TimeUnit::Milliseconds).unwrap(), 0.25));
        assert!(close(normalize_duration("250us", TimeUnit::Milliseconds).unwrap(), 0.25));
    }

    #[test]
    fn seconds_and_nanoseconds() {
        assert!(close(normalize_duration("3.2s", TimeUnit::Milliseconds).unwrap(), 3200.0));
        assert!(close(normalize_duration("3.2s", TimeUnit::Seconds).unwrap(), 3.2));
        assert!(close(normalize_duration("800ns", TimeUnit::Milliseconds).unwrap(), 0.0008));
    }

    #[test]
    fn plain_numbers_keep_their_unit() {
        assert!(close(normalize_duration(" 0.57 ", TimeUnit::Seconds).unwrap(), 0.57));
        assert!(close(normalize_duration("12", TimeUnit::Milliseconds).unwrap(), 12.0));
    }

    #[test]
    fn ms_is_not_read_as_seconds() {
        // "1.5ms" also ends in "s"; stripping only "s" would leave "1.5m"
        let value = normalize_duration("1.5ms", TimeUnit::Seconds).unwrap();
        assert!(close(value, 0.0015));
    }

    #[test]
    fn malformed_values_fail() {
        for raw in ["", "   ", "abc", "12h", "ms", "1.2.3ms", "NaN", "infs", "12 m s"] {
            let result = normalize_duration(raw, TimeUnit::Milliseconds);
            assert!(
                matches!(result, Err(ReportError::Value(_))),
                "{raw:?} should not normalize, got {result:?}"
            );
        }
    }
}
