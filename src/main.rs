mod app;
mod bars;
mod chart;
mod config;
mod constants;
mod error;
mod export;
mod feed;
mod report;
mod server;
mod ui;
mod util;

#[cfg(test)]
mod testutil;

use std::{
    error::Error,
    fs::OpenOptions,
    path::Path,
    sync::Mutex,
};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::config::{Cli, Command, Config};
use crate::error::{DashboardError, Result};

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

// The dashboard owns the terminal, so its logs go to a file
fn init_file_logging(path: &Path) -> Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init()
        .map_err(|e| DashboardError::Config(e.to_string()))
}

fn init_stderr_logging() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| DashboardError::Config(e.to_string()))
}

fn main() -> std::result::Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    match cli.command {
        Some(Command::Serve(args)) => {
            init_stderr_logging()?;
            server::run(&args)?;
        }
        None => {
            let config = Config::from_args(&cli.dashboard)?;
            init_file_logging(&cli.dashboard.log_file)?;
            ui::run(&config)?;
        }
    }
    Ok(())
}
