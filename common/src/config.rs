use std::{
    fs,
    path::{Path, PathBuf},
};

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    chart::OutputTarget,
    report::Report,
    util::{Vars, fill_template},
};

/// Output path that streams the chart to stdout
pub const STDOUT_TARGET: &str = "-";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub name: String,
    #[serde(default)]
    pub settings: Settings,
    pub reports: Vec<InnerReport>,
}

impl Config {
    pub fn from_yaml(contents: &str) -> Result<Self> {
        Ok(serde_yml::from_str(contents)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            fs::read_to_string(path).wrap_err_with(|| format!("Read config {}", path.display()))?;
        Self::from_yaml(&contents).wrap_err_with(|| format!("Parse config {}", path.display()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Base directory of input templates
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Base directory of output templates
    #[serde(default = "default_plot_dir")]
    pub plot_dir: PathBuf,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_plot_dir() -> PathBuf {
    PathBuf::from("plots")
}

fn default_width() -> u32 {
    1200
}

fn default_height() -> u32 {
    600
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            plot_dir: default_plot_dir(),
            width: default_width(),
            height: default_height(),
        }
    }
}

impl Settings {
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn input_path(&self, template: &str, vars: &Vars) -> Result<PathBuf> {
        Ok(self.data_dir.join(fill_template(template, vars)?))
    }

    /// `-` selects stdout, anything else a file below `plot_dir`
    pub fn output_target(&self, template: &str, vars: &Vars) -> Result<OutputTarget> {
        let filled = fill_template(template, vars)?;
        if filled == STDOUT_TARGET {
            Ok(OutputTarget::Stdout)
        } else {
            Ok(OutputTarget::File(self.plot_dir.join(filled)))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InnerReport {
    pub name: String,
    #[serde(default)]
    pub vars: Vars,
    pub report: Box<dyn Report>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{chart::ChartArtifact, util::TemplateValue};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Noop {
        input: String,
    }

    #[typetag::serde]
    impl Report for Noop {
        fn required_columns(&self) -> Vec<String> {
            vec!["Sort".to_owned()]
        }

        fn generate(&self, _: &str, _: &Vars, _: &Settings) -> Result<Vec<ChartArtifact>> {
            Ok(vec![])
        }
    }

    const CONFIG: &str = r#"
name: vault
settings:
  data_dir: /data
reports:
  - name: torus-k32
    vars: { machine: torus }
    report:
      type: Noop
      input: vault76_{machine}_32.csv
"#;

    #[test]
    fn parses_typed_reports() {
        let config = Config::from_yaml(CONFIG).unwrap();
        assert_eq!(config.name, "vault");
        assert_eq!(config.settings.data_dir, PathBuf::from("/data"));
        assert_eq!(config.settings.plot_dir, PathBuf::from("plots"));
        assert_eq!(config.settings.size(), (1200, 600));

        let report = &config.reports[0];
        assert_eq!(report.vars["machine"], TemplateValue::Text("torus".to_owned()));
        let noop = report.report.downcast_ref::<Noop>().unwrap();
        assert_eq!(noop.input, "vault76_{machine}_32.csv");
        assert_eq!(report.report.typetag_name(), "Noop");
    }

    #[test]
    fn resolves_paths() {
        let config = Config::from_yaml(CONFIG).unwrap();
        let report = &config.reports[0];
        let input = config
            .settings
            .input_path("vault76_{machine}_32.csv", &report.vars)
            .unwrap();
        assert_eq!(input, PathBuf::from("/data/vault76_torus_32.csv"));
        assert_eq!(
            config.settings.output_target("{machine}.svg", &report.vars).unwrap(),
            OutputTarget::File(PathBuf::from("plots/torus.svg"))
        );
        assert_eq!(
            config.settings.output_target("-", &report.vars).unwrap(),
            OutputTarget::Stdout
        );
    }

    #[test]
    fn unknown_report_types_are_rejected() {
        let yaml = CONFIG.replace("type: Noop", "type: Pie");
        assert!(Config::from_yaml(&yaml).is_err());
    }
}
