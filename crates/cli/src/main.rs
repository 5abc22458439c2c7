//! fsw - polling file watcher driven over stdin/stdout

use anyhow::{Context, Result};
use clap::Parser;
use cli_lib::daemon::{Daemon, Exit};
use cli_lib::ipc::{self, RequestReader};
use cli_lib::protocol::Message;
use std::fs::OpenOptions;
use std::path::PathBuf;
use tokio::io::BufReader;
use tracing::error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Watches paths by polling and reports changes as JSON lines on stdout
#[derive(Parser)]
#[command(name = "fsw")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Start watching right away from a JSON or TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Append logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // stdout carries the channel; logs must never go there
    let guard = init_tracing(&cli)?;

    let (outbox, writer) = ipc::spawn_writer(tokio::io::stdout());

    let exit = match cli.config.as_deref().map(cli_lib::config::load).transpose() {
        Ok(initial) => {
            let requests = RequestReader::new(BufReader::new(tokio::io::stdin()));
            Daemon::new(outbox).run(requests, initial).await
        }
        Err(err) => {
            // The caller only learns why through the channel
            error!("{:#}", err);
            outbox.send(Message::Error {
                message: format!("{:#}", err),
            });
            drop(outbox);
            Exit::Failure
        }
    };

    // Every outbox handle is gone by now; wait for queued lines to drain
    match writer.await {
        Ok(Err(e)) => tracing::warn!("Failed to flush command channel: {}", e),
        Err(e) => tracing::warn!("Writer task failed: {}", e),
        Ok(Ok(())) => {}
    }

    drop(guard);
    // A blocking stdin read cannot be cancelled, so leave without waiting for
    // the runtime to shut down
    std::process::exit(exit.code());
}

fn init_tracing(cli: &Cli) -> Result<WorkerGuard> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&cli.log_level)
            .with_context(|| format!("Invalid log level: {}", cli.log_level))?,
    };

    let (writer, guard) = match &cli.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_appender::non_blocking(file)
        }
        None => tracing_appender::non_blocking(std::io::stderr()),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();

    Ok(guard)
}
