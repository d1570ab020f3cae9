use std::fs::File;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use pacer::config::{LogFormat, LoggingConfig, PacerConfig};
use pacer::transfer::{paced_copy, CopyStats};
use pacer::{PacedReader, Rate};

/// How long a stopped copy may take to wind down before the process exits anyway.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Exit status for a copy cut short by Ctrl+C or SIGTERM (128 + SIGINT).
const INTERRUPTED_EXIT_CODE: u8 = 130;

/// Copy a file or stdin to stdout at a capped bandwidth.
#[derive(Debug, Parser)]
#[command(name = "pacer", version, about)]
struct Cli {
    /// File to read; stdin when absent or "-"
    input: Option<PathBuf>,

    /// Target rate in kilobits per second (e.g. 64 or 64kbps)
    #[arg(short, long)]
    rate: Option<Rate>,

    /// Write here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log filter directive (e.g. info, pacer=trace)
    #[arg(long)]
    log_level: Option<String>,

    /// Log line format
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,
}

impl Cli {
    /// Apply command-line overrides on top of the loaded configuration.
    fn apply(&self, config: &mut PacerConfig) {
        if let Some(rate) = self.rate {
            config.throttle.rate_kbps = rate.kbps();
        }
        if let Some(ref level) = self.log_level {
            config.logging.level = level.clone();
        }
        if let Some(format) = self.log_format {
            config.logging.format = format;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = PacerConfig::load(cli.config.as_deref())
        .context("Failed to load configuration")?;
    cli.apply(&mut config);

    init_tracing(&config.logging)?;

    let rate = config.rate()?;
    info!(version = env!("CARGO_PKG_VERSION"), rate = %rate, "Starting pacer");

    let input = open_input(cli.input.as_deref())?;
    let output = open_output(cli.output.as_deref())?;

    let stop = Arc::new(AtomicBool::new(false));
    let watcher = tokio::spawn(stop_on_shutdown(Arc::clone(&stop)));

    let copy_stop = Arc::clone(&stop);
    let stats = tokio::task::spawn_blocking(move || -> io::Result<CopyStats> {
        let mut reader = PacedReader::with_rate(input, rate);
        let mut output = output;
        paced_copy(&mut reader, &mut output, &copy_stop)
    })
    .await?
    .context("Copy failed")?;

    watcher.abort();

    if stats.interrupted {
        warn!(bytes = stats.bytes, "Copy stopped before end of input");
    }
    info!("Pacer stopped");
    Ok(ExitCode::from(exit_status(&stats)))
}

/// Process exit status for a finished copy; nonzero when it was stopped early.
fn exit_status(stats: &CopyStats) -> u8 {
    if stats.interrupted {
        INTERRUPTED_EXIT_CODE
    } else {
        0
    }
}

/// Install the tracing subscriber. Logs go to stderr so stdout carries only data.
fn init_tracing(logging: &LoggingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(&logging.level)
        .with_context(|| format!("Invalid log level '{}'", logging.level))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .with_thread_ids(true);

    match logging.format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
    Ok(())
}

fn open_input(path: Option<&std::path::Path>) -> anyhow::Result<Box<dyn Read + Send>> {
    match path {
        Some(path) if path.as_os_str() != "-" => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open input {}", path.display()))?;
            info!(path = %path.display(), "Reading from file");
            Ok(Box::new(file))
        }
        _ => {
            info!("Reading from stdin");
            Ok(Box::new(io::stdin()))
        }
    }
}

fn open_output(path: Option<&std::path::Path>) -> anyhow::Result<Box<dyn Write + Send>> {
    match path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output {}", path.display()))?;
            Ok(Box::new(file))
        }
        None => Ok(Box::new(io::stdout())),
    }
}

/// Raise `stop` on the first shutdown signal, then exit if the copy does not
/// wind down within [`SHUTDOWN_GRACE`].
async fn stop_on_shutdown(stop: Arc<AtomicBool>) {
    shutdown_signal().await;
    stop.store(true, Ordering::SeqCst);

    tokio::time::sleep(SHUTDOWN_GRACE).await;
    warn!(grace = ?SHUTDOWN_GRACE, "Copy did not stop in time, exiting");
    std::process::exit(i32::from(INTERRUPTED_EXIT_CODE));
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, stopping copy");
        }
        _ = terminate => {
            info!("Received SIGTERM, stopping copy");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(interrupted: bool) -> CopyStats {
        CopyStats {
            bytes: 250,
            elapsed: Duration::from_millis(20),
            interrupted,
        }
    }

    #[test]
    fn test_exit_status_for_completed_copy() {
        assert_eq!(exit_status(&stats(false)), 0);
    }

    #[test]
    fn test_exit_status_for_stopped_copy() {
        assert_eq!(exit_status(&stats(true)), INTERRUPTED_EXIT_CODE);
        assert_ne!(exit_status(&stats(true)), 0);
    }

    #[test]
    fn test_cli_overrides_config() {
        let cli = Cli::parse_from(["pacer", "--rate", "32kbps", "--log-format", "json", "in.bin"]);
        let mut config = PacerConfig::default();
        cli.apply(&mut config);

        assert_eq!(config.throttle.rate_kbps, 32.0);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, "info");
        assert_eq!(cli.input, Some(PathBuf::from("in.bin")));
    }
}
