use core::fmt::Debug;

use downcast_rs::{Downcast, impl_downcast};
use dyn_clone::{DynClone, clone_trait_object};
use eyre::{Context, Result};
use regex::Regex;
use tracing::{debug, info};

use crate::{
    chart::ChartArtifact,
    config::{Config, Settings},
    util::Vars,
};

#[typetag::serde(tag = "type")]
pub trait Report: Debug + DynClone + Downcast + Send + Sync {
    /// Columns every input file of this report must carry
    fn required_columns(&self) -> Vec<String>;
    /// Loads the inputs and renders the charts
    ///
    /// Arguments:
    /// * `name` - The report name from the config
    /// * `vars` - Template variables of the report
    /// * `settings` - The settings from the config
    fn generate(&self, name: &str, vars: &Vars, settings: &Settings)
    -> Result<Vec<ChartArtifact>>;
}
clone_trait_object!(Report);
impl_downcast!(Report);

/// Runs every report of `config`, or those whose name matches `filter`.
/// Stops at the first failing report.
pub fn run_reports(config: &Config, filter: Option<&Regex>) -> Result<Vec<ChartArtifact>> {
    let mut artifacts = Vec::new();
    for report in &config.reports {
        if let Some(filter) = filter
            && !filter.is_match(&report.name)
        {
            debug!("Skipping report {}", report.name);
            continue;
        }

        info!("Generating report {}", report.name);
        let produced = report
            .report
            .generate(&report.name, &report.vars, &config.settings)
            .wrap_err_with(|| format!("Report {}", report.name))?;
        debug!("Report {} produced {} charts", report.name, produced.len());
        artifacts.extend(produced);
    }
    Ok(artifacts)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::{
        chart::{ChartKind, OutputTarget},
        error::ReportError,
    };

    static CALLS: AtomicUsize = AtomicUsize::new(0);

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Counting {
        fail: bool,
    }

    #[typetag::serde]
    impl Report for Counting {
        fn required_columns(&self) -> Vec<String> {
            vec![]
        }

        fn generate(&self, name: &str, _: &Vars, _: &Settings) -> Result<Vec<ChartArtifact>> {
            CALLS.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ReportError::Render(format!("{name} failed")).into());
            }
            Ok(vec![ChartArtifact {
                kind: ChartKind::Bar,
                target: OutputTarget::Stdout,
                bytes: 1,
            }])
        }
    }

    #[test]
    fn filters_and_stops_on_failure() {
        let config = Config::from_yaml(
            r#"
name: runs
reports:
  - name: first
    report: { type: Counting, fail: false }
  - name: second
    report: { type: Counting, fail: true }
  - name: third
    report: { type: Counting, fail: false }
"#,
        )
        .unwrap();

        let filter = Regex::new("^(first|third)$").unwrap();
        let artifacts = run_reports(&config, Some(&filter)).unwrap();
        assert_eq!(artifacts.len(), 2);

        let before = CALLS.load(Ordering::SeqCst);
        let err = run_reports(&config, None).unwrap_err();
        assert_eq!(CALLS.load(Ordering::SeqCst) - before, 2);
        assert!(format!("{err:#}").contains("Report second"));
        assert!(matches!(
            err.downcast_ref::<ReportError>(),
            Some(ReportError::Render(_))
        ));
    }
}
