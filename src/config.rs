//! Command line / environment configuration.

use std::{net::SocketAddr, path::PathBuf, time::Duration};

use clap::{Args, Parser, Subcommand};

use crate::error::{DashboardError, Result};

#[derive(Parser, Debug)]
#[command(name = "profit_dashboard")]
#[command(about = "Terminal profit dashboard: bar panel, profit chart and CSV export")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub dashboard: DashboardArgs,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the demo profit backend
    Serve(ServeArgs),
}

#[derive(Args, Debug, Clone)]
pub struct DashboardArgs {
    /// Endpoint polled by the bar panel and the profit chart
    #[arg(long, env = "DASHBOARD_PROFIT_URL", default_value = "http://localhost:8080/api/profit")]
    pub profit_url: String,

    /// CSV export endpoint
    #[arg(
        long,
        env = "DASHBOARD_EXPORT_URL",
        default_value = "https://localhost:7269/v1/transactions/csvExport"
    )]
    pub export_url: String,

    /// Where CSV files and the PDF report are written
    #[arg(long, env = "DASHBOARD_DOWNLOAD_DIR", default_value = ".")]
    pub download_dir: PathBuf,

    #[arg(long, env = "DASHBOARD_BAR_INTERVAL_MS", default_value_t = 1000)]
    pub bar_interval_ms: u64,

    #[arg(long, env = "DASHBOARD_CHART_INTERVAL_MS", default_value_t = 10)]
    pub chart_interval_ms: u64,

    /// Accept self-signed TLS certificates
    #[arg(long, env = "DASHBOARD_INSECURE")]
    pub insecure: bool,

    #[arg(long, env = "DASHBOARD_LOG_FILE", default_value = "profit-dashboard.log")]
    pub log_file: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    #[arg(long, env = "DASHBOARD_SERVE_ADDR", default_value = "127.0.0.1:8080")]
    pub addr: SocketAddr,

    /// Generator tick in milliseconds
    #[arg(long, env = "DASHBOARD_TICK_MS", default_value_t = 30)]
    pub tick_ms: u64,
}

/// Validated dashboard settings
#[derive(Debug, Clone)]
pub struct Config {
    pub profit_url: reqwest::Url,
    pub export_url: reqwest::Url,
    pub download_dir: PathBuf,
    pub bar_interval: Duration,
    pub chart_interval: Duration,
    pub insecure: bool,
}

impl Config {
    pub fn from_args(args: &DashboardArgs) -> Result<Self> {
        Ok(Self {
            profit_url: parse_url("profit-url", &args.profit_url)?,
            export_url: parse_url("export-url", &args.export_url)?,
            download_dir: args.download_dir.clone(),
            bar_interval: non_zero_interval("bar-interval-ms", args.bar_interval_ms)?,
            chart_interval: non_zero_interval("chart-interval-ms", args.chart_interval_ms)?,
            insecure: args.insecure,
        })
    }

    /// Blocking HTTP client shared by pollers and downloads
    pub fn http_client(&self) -> Result<reqwest::blocking::Client> {
        let client = reqwest::blocking::Client::builder()
            .danger_accept_invalid_certs(self.insecure)
            .build()?;
        Ok(client)
    }
}

fn parse_url(name: &str, raw: &str) -> Result<reqwest::Url> {
    reqwest::Url::parse(raw).map_err(|e| DashboardError::Config(format!("{name}: {e}")))
}

fn non_zero_interval(name: &str, ms: u64) -> Result<Duration> {
    if ms == 0 {
        return Err(DashboardError::Config(format!("{name} must be greater than zero")));
    }
    Ok(Duration::from_millis(ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> DashboardArgs {
        Cli::parse_from(["profit_dashboard"]).dashboard
    }

    #[test]
    fn defaults_are_valid() {
        let config = Config::from_args(&args()).unwrap();
        assert_eq!(config.profit_url.path(), "/api/profit");
        assert_eq!(config.bar_interval, Duration::from_secs(1));
        assert_eq!(config.chart_interval, Duration::from_millis(10));
        assert!(!config.insecure);
    }

    #[test]
    fn zero_interval_is_rejected() {
        let mut a = args();
        a.chart_interval_ms = 0;
        assert!(matches!(Config::from_args(&a), Err(DashboardError::Config(_))));
    }

    #[test]
    fn bad_url_is_rejected() {
        let mut a = args();
        a.export_url = "not a url".to_string();
        let err = Config::from_args(&a).unwrap_err();
        assert!(err.to_string().contains("export-url"));
    }

    #[test]
    fn serve_subcommand_parses() {
        let cli = Cli::parse_from(["profit_dashboard", "serve", "--addr", "0.0.0.0:9000"]);
        match cli.command {
            Some(Command::Serve(s)) => {
                assert_eq!(s.addr.port(), 9000);
                assert_eq!(s.tick_ms, 30);
            }
            None => panic!("expected serve"),
        }
    }
}
