use std::future::Future;
use std::io;
use std::time::Duration;

use tcp_sweep::config::{parse_targets, ScanConfig};
use tcp_sweep::{output, scanner};

use anyhow::{Context, Result};
use clap::Parser;
use time::format_description::well_known::Rfc3339;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::{fmt::time::UtcTime, EnvFilter};

/// tcp-sweep — concurrent TCP connect scanner with optional banner grabbing.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "tcp-sweep",
    version,
    about = "Concurrent TCP connect scanner with optional banner grabbing and JSON output.",
    long_about = None
)]
struct Cli {
    /// Target hostname or IP to scan.
    #[arg(long, default_value = "scanme.nmap.org")]
    target: String,

    /// Comma-separated target list (overrides --target).
    #[arg(long)]
    targets: Option<String>,

    /// First port in range.
    #[arg(long = "start-port", default_value_t = 1, allow_negative_numbers = true)]
    start_port: i64,

    /// Last port in range.
    #[arg(long = "end-port", default_value_t = 1024, allow_negative_numbers = true)]
    end_port: i64,

    /// Comma-separated port list (overrides the range; invalid entries are skipped).
    #[arg(long)]
    ports: Option<String>,

    /// Number of concurrent scanners.
    #[arg(long, default_value_t = 100)]
    workers: usize,

    /// Connection timeout in seconds.
    #[arg(long, default_value_t = 5)]
    timeout: u64,

    /// Attempt to grab service banners.
    #[arg(long, default_value_t = false)]
    banner: bool,

    /// Banner read deadline in milliseconds.
    #[arg(long = "banner-timeout-ms", default_value_t = 2000)]
    banner_timeout_ms: u64,

    /// Output results in JSON format.
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Do not draw the progress indicator.
    #[arg(long = "no-progress", default_value_t = false)]
    no_progress: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    /// The bar and log lines share stderr, so it is only drawn when logging
    /// stays at the default level.
    fn progress_visible(&self, rust_log_set: bool) -> bool {
        !self.json && !self.no_progress && self.verbose == 0 && !rust_log_set
    }

    fn to_config(&self, rust_log_set: bool) -> ScanConfig {
        ScanConfig {
            targets: parse_targets(&self.target, self.targets.as_deref()),
            start_port: self.start_port,
            end_port: self.end_port,
            ports: self.ports.clone(),
            workers: self.workers,
            timeout: Duration::from_secs(self.timeout),
            banner_timeout: Duration::from_millis(self.banner_timeout_ms),
            grab_banner: self.banner,
            show_progress: self.progress_visible(rust_log_set),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let cfg = cli.to_config(std::env::var_os("RUST_LOG").is_some());
    cfg.validate().context("invalid configuration")?;

    let ports = cfg.port_set();
    let opts = cfg.scan_options();

    // Ctrl-C cancels the scan in progress.
    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_signal(tokio::signal::ctrl_c(), cancel.clone()));

    for host in &cfg.targets {
        let summary = scanner::scan_host_with_cancel(host, &ports, &opts, cancel.clone())
            .await
            .with_context(|| format!("scan of {host} failed"))?;

        if cli.json {
            println!("{}", output::render_json(&summary)?);
        } else {
            println!();
            print!("{}", output::render_text(&summary));
        }
    }

    Ok(())
}

/// Cancel `cancel` once `signal` fires. A handler that fails to install is
/// logged and leaves the scan running.
async fn cancel_on_signal<F>(signal: F, cancel: CancellationToken)
where
    F: Future<Output = io::Result<()>>,
{
    match signal.await {
        Ok(()) => cancel.cancel(),
        Err(e) => warn!(error = %e, "cannot listen for Ctrl-C; scans will not be interruptible"),
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_timer(UtcTime::new(Rfc3339))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("tcp-sweep").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn progress_drawn_only_at_default_verbosity() {
        assert!(cli(&[]).progress_visible(false));
        assert!(!cli(&["-v"]).progress_visible(false));
        assert!(!cli(&["-vv"]).progress_visible(false));
        assert!(!cli(&[]).progress_visible(true));
        assert!(!cli(&["--json"]).progress_visible(false));
        assert!(!cli(&["--no-progress"]).progress_visible(false));
        assert!(!cli(&["-v"]).to_config(false).show_progress);
    }

    #[test]
    fn negative_range_parses_and_fails_validation() {
        let cfg = cli(&["--start-port", "-1"]).to_config(false);
        assert!(cfg.validate().is_err());
    }

    #[tokio::test]
    async fn failed_signal_handler_does_not_cancel() {
        let cancel = CancellationToken::new();
        let failing = async { Err::<(), _>(io::Error::new(io::ErrorKind::Other, "no handler")) };
        cancel_on_signal(failing, cancel.clone()).await;
        assert!(!cancel.is_cancelled());
    }

    #[tokio::test]
    async fn delivered_signal_cancels() {
        let cancel = CancellationToken::new();
        cancel_on_signal(async { Ok::<(), io::Error>(()) }, cancel.clone()).await;
        assert!(cancel.is_cancelled());
    }
}
