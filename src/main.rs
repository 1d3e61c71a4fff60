mod api;
mod app;
mod config;
mod dashboard;
mod error;
mod format;
mod models;
mod refresh;
mod report;
mod state;
mod tui;
mod ui;
mod views;

#[cfg(test)]
mod test_support;

use anyhow::{Context, Result};
use api::ApiClient;
use app::App;
use clap::Parser;
use config::DashboardConfig;
use dashboard::ViewStateReconciler;
use std::fs::{self, OpenOptions};
use std::sync::Mutex;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "tradedesk_tui=info";

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "TradeDesk-TUI: terminal dashboard for the multi-agent trading bot API",
    after_help = "EXAMPLES:
    # Launch the dashboard against a local bot
    cargo run --release

    # Point at another host and refresh every 10s
    cargo run --release -- --api-url http://10.0.0.5:5000 --refresh-secs 10

    # One-shot analysis
    cargo run --release -- --analyze AAPL

    # Paper trade from the shell
    cargo run --release -- --trade --symbol AAPL --action buy --quantity 10 --price 182.5

    # Follow the portfolio headless
    cargo run --release -- --watch"
)]
struct Args {
    /// Trading bot API base url (overrides TRADEDESK_API_URL)
    #[arg(long)]
    api_url: Option<String>,

    /// Portfolio auto-refresh period in seconds (overrides TRADEDESK_REFRESH_SECS)
    #[arg(long)]
    refresh_secs: Option<u64>,

    /// Print technical analysis and agent decision for a symbol, then exit
    #[arg(long, value_name = "SYMBOL")]
    analyze: Option<String>,

    /// Print the portfolio, then exit
    #[arg(long)]
    portfolio: bool,

    /// Submit a trade built from --symbol/--action/--quantity/--price
    #[arg(long)]
    trade: bool,

    /// Trade symbol. Ignored if --trade is not set.
    #[arg(long)]
    symbol: Option<String>,

    /// Trade side: buy or sell. Ignored if --trade is not set.
    #[arg(long)]
    action: Option<String>,

    /// Trade quantity. Ignored if --trade is not set.
    #[arg(long)]
    quantity: Option<f64>,

    /// Trade price. Ignored if --trade is not set.
    #[arg(long)]
    price: Option<f64>,

    /// Print the bot's system logs, then exit
    #[arg(long)]
    logs: bool,

    /// Print the bot's health status, then exit
    #[arg(long)]
    health: bool,

    /// Reprint the portfolio on every refresh until Ctrl-C
    #[arg(long)]
    watch: bool,
}

impl Args {
    fn is_headless(&self) -> bool {
        self.analyze.is_some() || self.portfolio || self.trade || self.logs || self.health || self.watch
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// The alternate screen owns stdout/stderr while the dashboard runs, so logs go to a file.
fn init_file_logging() -> Result<()> {
    let path = config::log_file_path();
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("opening {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    if args.is_headless() {
        init_stderr_logging();
    } else {
        init_file_logging()?;
    }

    let config = DashboardConfig::from_env()?.with_overrides(args.api_url.as_deref(), args.refresh_secs)?;
    config.log_summary();
    let api = ApiClient::new(config)?;

    if let Some(symbol) = args.analyze.as_deref() {
        return report::run_analyze(api, symbol).await;
    }

    if args.trade {
        return report::run_trade(
            api,
            args.symbol.as_deref(),
            args.action.as_deref(),
            args.quantity,
            args.price,
        )
        .await;
    }

    if args.portfolio {
        return report::run_portfolio(api).await;
    }

    if args.logs {
        return report::run_logs(api).await;
    }

    if args.health {
        return report::run_health(api).await;
    }

    if args.watch {
        return report::run_watch(api).await;
    }

    let mut terminal = tui::init()?;
    let mut app = App::new(ViewStateReconciler::new(api));
    let res = app.run(&mut terminal).await;

    tui::restore()?;

    if let Err(e) = res {
        error!("Error: {:?}", e);
        return Err(e.into());
    }

    info!("Dashboard closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trade_flags_parse() {
        let args = Args::parse_from([
            "tradedesk-tui",
            "--trade",
            "--symbol",
            "AAPL",
            "--action",
            "sell",
            "--quantity",
            "2",
            "--price",
            "181.5",
        ]);
        assert!(args.trade);
        assert!(args.is_headless());
        assert_eq!(args.symbol.as_deref(), Some("AAPL"));
        assert_eq!(args.price, Some(181.5));
    }

    #[test]
    fn no_mode_flag_launches_dashboard() {
        let args = Args::parse_from(["tradedesk-tui", "--api-url", "http://localhost:5000"]);
        assert!(!args.is_headless());
        assert_eq!(args.api_url.as_deref(), Some("http://localhost:5000"));
    }
}
