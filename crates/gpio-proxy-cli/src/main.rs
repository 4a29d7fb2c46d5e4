//! `gpio-proxy`: drive pins on a remote GPIO Proxy daemon, or run a
//! simulated one.

mod cli;
mod commands;
mod error;
mod output;

use std::error::Error as _;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use gpio_proxy_client::PinManager;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, ConnectionArgs};
use crate::error::CliResult;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            let mut source = e.source();
            while let Some(cause) = source {
                eprintln!("  caused by: {cause}");
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> CliResult<()> {
    #[cfg(feature = "prometheus")]
    if let Some(addr) = cli.metrics_addr {
        gpio_proxy_metrics::install_prometheus(addr)
            .map_err(|e| crate::error::CliError::Metrics(e.to_string()))?;
        info!(%addr, "serving metrics");
    }

    let connection = &cli.connection;
    let report = match cli.command {
        Command::Get { pin, input } => commands::get(&connect(connection)?, pin, input)?,
        Command::Set { pin, value } => commands::set(&connect(connection)?, pin, value)?,
        Command::Probe { first, last } => commands::probe(&connect(connection)?, first, last)?,
        Command::Blink {
            pin,
            cycles,
            interval_ms,
        } => {
            let pins = connect(connection)?;
            let stop = stop_on_ctrlc()?;
            commands::blink(&pins, pin, cycles, Duration::from_millis(interval_ms), &stop)?
        }
        Command::Lcd { text, pins: layout } => {
            commands::lcd(&connect(connection)?, &text, layout.as_deref())?
        }
        Command::Sim { bind, pins } => {
            let stop = stop_on_ctrlc()?;
            commands::sim(bind, pins, &stop)?
        }
    };

    println!("{}", report.render(cli.json)?);
    Ok(())
}

fn connect(connection: &ConnectionArgs) -> CliResult<PinManager> {
    let config = connection.resolve()?;
    debug!(?config, "resolved connection");
    commands::connect(&config)
}

/// Install a Ctrl-C handler that sets the returned flag.
fn stop_on_ctrlc() -> CliResult<Arc<AtomicBool>> {
    let stop = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        info!("interrupted, stopping");
        flag.store(true, Ordering::Relaxed);
    })?;
    Ok(stop)
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
