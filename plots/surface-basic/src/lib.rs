use common::{
    chart::{ChartArtifact, ChartSpec, Panel, PanelData, SurfaceData, render},
    config::Settings,
    duration::TimeUnit,
    record::load,
    report::Report,
    stats::{KeyOrder, aggregate},
    util::{Vars, fill_template},
};
use eyre::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Summed phase time over thread count and memory limit, as a 3-D surface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadMemorySurface {
    pub input: String,
    pub output: String,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_x_column")]
    pub x_column: String,
    #[serde(default = "default_y_column")]
    pub y_column: String,
    /// Summed into the height of the surface
    #[serde(default = "default_z_columns")]
    pub z_columns: Vec<String>,
    #[serde(default)]
    pub unit: TimeUnit,
    #[serde(default = "default_resolution")]
    pub resolution: usize,
    #[serde(default = "default_x_label")]
    pub x_label: String,
    #[serde(default = "default_y_label")]
    pub y_label: String,
    #[serde(default = "default_z_label")]
    pub z_label: String,
}

fn default_title() -> String {
    "Total Time Surface Plot".to_owned()
}

fn default_x_column() -> String {
    "threads".to_owned()
}

fn default_y_column() -> String {
    "memory".to_owned()
}

fn default_z_columns() -> Vec<String> {
    vec!["hash_time".to_owned(), "sort_time".to_owned()]
}

fn default_resolution() -> usize {
    100
}

fn default_x_label() -> String {
    "Threads".to_owned()
}

fn default_y_label() -> String {
    "Memory (MB)".to_owned()
}

fn default_z_label() -> String {
    "Total Time (s)".to_owned()
}

impl Default for ThreadMemorySurface {
    fn default() -> Self {
        Self {
            input: "vault_csv/vault_k25.csv".to_owned(),
            output: "vault_plot/vault_k25.svg".to_owned(),
            title: default_title(),
            x_column: default_x_column(),
            y_column: default_y_column(),
            z_columns: default_z_columns(),
            unit: TimeUnit::default(),
            resolution: default_resolution(),
            x_label: default_x_label(),
            y_label: default_y_label(),
            z_label: default_z_label(),
        }
    }
}

impl ThreadMemorySurface {
    /// Mean height per `(x, y)` pair. Coordinates are compared as numbers, so
    /// `1` and `1.0` land in the same group.
    fn points(&self, path: &std::path::Path) -> Result<Vec<(f64, f64, f64)>> {
        let table = load(path, &self.required_columns())?;
        let stats = aggregate(
            table.records(),
            |r| {
                // `+ 0.0` folds -0.0 into 0.0
                let x = r.float(&self.x_column)? + 0.0;
                let y = r.float(&self.y_column)? + 0.0;
                Ok((x.to_bits(), y.to_bits()))
            },
            |r| r.duration_sum(&self.z_columns, self.unit),
            KeyOrder::FirstSeen,
        );
        debug!(
            "{} surface points from {} rows",
            stats.len(),
            table.len()
        );

        Ok(stats
            .iter()
            .map(|((x, y), stat)| (f64::from_bits(*x), f64::from_bits(*y), stat.mean))
            .collect())
    }
}

#[typetag::serde]
impl Report for ThreadMemorySurface {
    fn required_columns(&self) -> Vec<String> {
        let mut columns = vec![self.x_column.clone(), self.y_column.clone()];
        columns.extend(self.z_columns.iter().cloned());
        columns
    }

    fn generate(&self, name: &str, vars: &Vars, settings: &Settings) -> Result<Vec<ChartArtifact>> {
        let path = settings.input_path(&self.input, vars)?;
        let points = self.points(&path)?;
        debug!("{name}: resampling {} points", points.len());

        let data = SurfaceData {
            points,
            resolution: self.resolution,
        };
        let spec = ChartSpec::new(
            &fill_template(&self.title, vars)?,
            settings.output_target(&self.output, vars)?,
        )
        .with_size(settings.size())
        .with_panel(
            Panel::new(&self.x_label, &self.y_label, PanelData::Surface(data))
                .with_z_label(&self.z_label),
        );
        Ok(vec![render(&spec)?])
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use common::{chart::ChartKind, error::ReportError};

    use super::*;

    fn settings(dir: &tempfile::TempDir) -> Settings {
        Settings {
            data_dir: dir.path().to_path_buf(),
            plot_dir: dir.path().to_path_buf(),
            ..Default::default()
        }
    }

    #[test]
    fn renders_a_surface() {
        let dir = tempfile::tempdir().unwrap();
        let mut csv = "threads,memory,hash_time,sort_time\n".to_owned();
        for threads in [1, 2, 4, 8] {
            for memory in [256, 1024, 4096] {
                csv.push_str(&format!("{threads},{memory},{},{}\n", 8.0 / threads as f64, memory as f64 / 1024.0));
            }
        }
        // dropped: not numeric
        csv.push_str("16,4096,n/a,1.0\n");
        fs::write(dir.path().join("vault_k25.csv"), csv).unwrap();

        let report = ThreadMemorySurface {
            input: "vault_k25.csv".to_owned(),
            output: "vault_k25.svg".to_owned(),
            resolution: 20,
            ..Default::default()
        };
        let points = report.points(&dir.path().join("vault_k25.csv")).unwrap();
        assert_eq!(points.len(), 12);
        assert!(points.contains(&(2.0, 1024.0, 5.0)));

        let artifacts = report.generate("surface", &Vars::new(), &settings(&dir)).unwrap();
        assert_eq!(artifacts[0].kind, ChartKind::Surface);
        assert!(fs::metadata(dir.path().join("vault_k25.svg")).unwrap().len() > 0);
    }

    #[test]
    fn too_few_points() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("small.csv"),
            "threads,memory,hash_time,sort_time\n1,256,1,1\n2,256,1,1\n1,512,1,1\n",
        )
        .unwrap();
        let report = ThreadMemorySurface {
            input: "small.csv".to_owned(),
            output: "small.svg".to_owned(),
            ..Default::default()
        };
        let err = report.generate("small", &Vars::new(), &settings(&dir)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ReportError>(),
            Some(ReportError::Render(_))
        ));
        assert!(!dir.path().join("small.svg").exists());
    }

    #[test]
    fn integer_and_float_coordinates_share_a_point() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mixed.csv");
        fs::write(
            &path,
            "threads,memory,hash_time,sort_time\n1,256,1,1\n1.0,256,2,2\n1.0,256.0,3,3\n2,256,5,5\n",
        )
        .unwrap();
        let report = ThreadMemorySurface {
            input: "mixed.csv".to_owned(),
            ..Default::default()
        };
        let points = report.points(&path).unwrap();
        assert_eq!(points, [(1.0, 256.0, 4.0), (2.0, 256.0, 10.0)]);
    }
}
