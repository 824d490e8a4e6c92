use common::report::Report;
use line_basic::GrowthLine;
use lookup_basic::{LookupScatter, LookupSummary};
use phase_basic::PhaseBars;
use surface_basic::ThreadMemorySurface;
use throughput_basic::ProgramBars;

/// Crates whose log level follows `RUST_LOG`
pub const PLUGIN_CRATES: &[&str] = &[
    "common",
    "phase_basic",
    "throughput_basic",
    "lookup_basic",
    "surface_basic",
    "line_basic",
];

pub fn default_reports() -> Vec<Box<dyn Report>> {
    vec![
        Box::new(PhaseBars::default()),
        Box::new(ProgramBars::default()),
        Box::new(LookupScatter::default()),
        Box::new(LookupSummary::default()),
        Box::new(ThreadMemorySurface::default()),
        Box::new(GrowthLine::default()),
    ]
}

/// Links every report crate so their types can be named in a config
pub fn init_plots() -> Result<(), serde_json::Error> {
    for report in default_reports() {
        serde_json::to_string(&report)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use common::config::Config;

    use super::*;

    #[test]
    fn sample_config_parses() {
        let config = Config::from_yaml(include_str!("../../../reports.yaml")).unwrap();
        let types = config
            .reports
            .iter()
            .map(|r| r.report.typetag_name())
            .collect::<Vec<_>>();
        assert_eq!(
            types,
            [
                "PhaseBars",
                "PhaseBars",
                "PhaseBars",
                "PhaseBars",
                "ProgramBars",
                "ProgramBars",
                "LookupScatter",
                "LookupSummary",
                "ThreadMemorySurface",
                "GrowthLine"
            ]
        );
        let threads = config.reports[0]
            .report
            .downcast_ref::<PhaseBars>()
            .unwrap();
        assert_eq!(threads.threads, Some(vec![1, 2, 4, 8, 16]));

        let mystic = config.reports[2]
            .report
            .downcast_ref::<PhaseBars>()
            .unwrap();
        assert_eq!(mystic.categories.as_ref().map(Vec::len), Some(5));
        assert!(mystic.phases.iter().all(|p| p.values.is_some()));
    }

    #[test]
    fn reports_round_trip_by_type_name() {
        init_plots().unwrap();
        for report in default_reports() {
            let json = serde_json::to_value(&report).unwrap();
            assert_eq!(json["type"], report.typetag_name());
            let parsed: Box<dyn Report> = serde_json::from_value(json).unwrap();
            assert_eq!(parsed.typetag_name(), report.typetag_name());
            assert_eq!(parsed.required_columns(), report.required_columns());
        }
    }
}
