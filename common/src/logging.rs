use std::path::Path;

use eyre::{ContextCompat, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter,
    fmt::{layer, time::ChronoLocal},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Builds the filter: `RUST_LOG` (default `warn`) for `crates`, plus the extra
/// `directives`, which win for any crate they name.
pub fn env_filter(directives: &[String], crates: &[&str]) -> Result<EnvFilter> {
    let log_level = std::env::var("RUST_LOG").unwrap_or("warn".to_owned());
    let mut env_filter = EnvFilter::new(format!("bench_plot={log_level}"));

    for directive in directives {
        env_filter = env_filter.add_directive(directive.parse()?);
    }

    for module in crates {
        if !directives.iter().any(|x| x.starts_with(module)) {
            env_filter = env_filter.add_directive(format!("{module}={log_level}").parse()?);
        }
    }
    Ok(env_filter)
}

/// Installs the global subscriber: compact lines on stderr and, with
/// `log_file`, a plain copy in that file. Keep the guard alive until exit so
/// the file writer flushes.
pub fn init_logging(
    directives: &[String],
    crates: &[&str],
    log_file: Option<&Path>,
) -> Result<Option<WorkerGuard>> {
    let env_filter = env_filter(directives, crates)?;

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let file_name = path
                .file_name()
                .context(format!("Invalid log file {}", path.display()))?;
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            let file_appender = tracing_appender::rolling::never(dir, file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            (
                Some(layer().with_writer(non_blocking).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            layer()
                .with_writer(std::io::stderr)
                .with_timer(ChronoLocal::new("%v %k:%M:%S %z".to_owned()))
                .compact(),
        )
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}
