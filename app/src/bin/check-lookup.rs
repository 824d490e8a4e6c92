use std::path::PathBuf;

use clap::{CommandFactory, Parser};
use common::logging::init_logging;
use eyre::Result;
use lookup_basic::summarize_lookup;

/// Prints min / average / max lookup times of found and missing keys
#[derive(Parser)]
#[command(name = "check-lookup")]
struct Cli {
    /// Lookup CSV with `LookupTime(ms)` and `IsExist` columns
    filename: Option<PathBuf>,
    #[arg(short, long)]
    log: Vec<String>,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    let Some(filename) = args.filename else {
        eprintln!("{}", Cli::command().render_usage());
        std::process::exit(1);
    };
    let _guard = init_logging(&args.log, &["common", "lookup_basic", "check_lookup"], None)?;

    let stats = summarize_lookup(&filename)?;
    println!("{stats}");
    Ok(())
}
