use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use common::{config::Config, logging::init_logging, report::run_reports};
use default_plots::PLUGIN_CRATES;
use eyre::Result;
use regex::Regex;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(about = "Render benchmark CSV results as charts")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Extra log directives, e.g. `common=debug`
    #[arg(short, long)]
    log: Vec<String>,
    /// Also write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured reports
    Ls {
        #[arg(short, long, default_value = "reports.yaml")]
        config_file: PathBuf,
    },
    /// Render configured reports
    Plot {
        #[arg(short, long, default_value = "reports.yaml")]
        config_file: PathBuf,
        /// Only reports whose name matches this regex
        #[arg(long)]
        filter: Option<String>,
    },
}

fn main() -> Result<()> {
    let args = Cli::parse();
    let _guard = init_logging(&args.log, PLUGIN_CRATES, args.log_file.as_deref())?;
    default_plots::init_plots()?;

    match args.command {
        Commands::Ls { config_file } => list_reports(&config_file)?,
        Commands::Plot {
            config_file,
            filter,
        } => {
            if let Err(err) = plot(&config_file, filter.as_deref()) {
                error!("{err:#}");
                return Err(err);
            }
        }
    };

    Ok(())
}

fn list_reports(config_file: &Path) -> Result<()> {
    let config = Config::load(config_file)?;
    println!("{}", config.name);
    for report in &config.reports {
        println!("{} -> {}", report.name, report.report.typetag_name());
    }
    Ok(())
}

fn plot(config_file: &Path, filter: Option<&str>) -> Result<()> {
    let config = Config::load(config_file)?;
    let filter = filter.map(Regex::new).transpose()?;

    let artifacts = run_reports(&config, filter.as_ref())?;
    if artifacts.is_empty() {
        warn!("No charts produced for {}", config.name);
    }
    for artifact in &artifacts {
        info!(
            "{} chart: {} ({} bytes)",
            artifact.kind, artifact.target, artifact.bytes
        );
    }
    Ok(())
}
