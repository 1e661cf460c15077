use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter};
use std::path::PathBuf;
use std::time::Duration;

use allocdiff::config::DEFAULT_PREFIX;
use allocdiff::{run, TrackerConfig};
use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Report outstanding-allocation diffs from a malloc-instrumented program's
/// combined stdout/stderr.
///
/// Typical use:
/// `LD_PRELOAD=./malloc_instrument.so ./prog 2>&1 | allocdiff`
#[derive(Parser, Debug)]
#[command(name = "allocdiff", version, about)]
struct Cli {
    /// Trace file to read (`-` or omitted reads stdin).
    input: Option<PathBuf>,
    /// Sentinel prefix marking trace lines.
    #[arg(long, default_value = DEFAULT_PREFIX)]
    prefix: String,
    /// Flush after this many milliseconds without input.
    #[arg(long, default_value_t = 1000)]
    poll_interval_ms: u64,
    /// Print the full per-caller table on every flush.
    #[arg(long)]
    module_table: bool,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = TrackerConfig::default()
        .with_prefix(cli.prefix)
        .with_poll_interval(Duration::from_millis(cli.poll_interval_ms))
        .with_module_table(cli.module_table);

    let reader = open_input(cli.input.as_ref())?;
    let stdout = io::stdout();
    let stats = run(reader, BufWriter::new(stdout.lock()), &config)
        .context("allocation tracking failed")?;

    info!(
        lines = stats.lines,
        events = stats.events,
        unrecognized = stats.unrecognized,
        passthrough = stats.passthrough,
        flushes = stats.flushes,
        "run complete"
    );
    Ok(())
}

/// Logs go to stderr; stdout carries only the report.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn open_input(path: Option<&PathBuf>) -> Result<Box<dyn BufRead + Send>> {
    match path {
        Some(path) if path.as_os_str() != "-" => {
            let file = File::open(path)
                .with_context(|| format!("failed to open trace file {}", path.display()))?;
            Ok(Box::new(BufReader::new(file)))
        }
        _ => Ok(Box::new(BufReader::new(io::stdin()))),
    }
}
