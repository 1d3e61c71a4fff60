use crate::api::ApiClient;
use crate::dashboard::{LoadOrigin, ViewStateReconciler, validate_trade};
use crate::error::DashboardError;
use crate::format::format_instant;
use crate::models::TradeAction;
use crate::refresh::spawn_refresh_timer;
use crate::state::{ApplyOutcome, SymbolAnalysis};
use crate::views::{
    ConfidenceView, HealthView, LogsView, NO_HOLDINGS_MESSAGE, NO_LOGS_MESSAGE, NO_RECENT_TRADES_MESSAGE,
    PortfolioView,
};
use anyhow::{Result, anyhow};
use std::fmt::Write;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{debug, info, warn};

fn confidence_line(label: &str, confidence: &ConfidenceView) -> String {
    format!("{:<12}{} ({})", label, confidence.percent, confidence.tier.as_str())
}

/// Plain-text analysis report; the `run_*` runners print what the `render_*` functions build.
pub fn render_analysis(result: &SymbolAnalysis) -> String {
    let a = &result.analysis;
    let d = &result.decision;
    let mut out = String::new();

    let _ = writeln!(out, "=== {} technical analysis ===", a.symbol);
    let _ = writeln!(out, "{:<12}{}", "Signal", a.recommendation);
    let _ = writeln!(out, "{}", confidence_line("Strength", &a.confidence));
    for row in &a.indicators {
        let _ = writeln!(out, "  {:<18}{}", row.label, row.value);
    }
    for signal in &a.signals {
        let _ = writeln!(out, "  - {}", signal);
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "=== agent decision ===");
    let _ = writeln!(out, "{:<12}{}", "Consensus", d.recommendation);
    let _ = writeln!(out, "{}", confidence_line("Confidence", &d.confidence));
    for reason in &d.reasoning {
        let _ = writeln!(out, "  - {}", reason);
    }
    for agent in &d.agents {
        let _ = writeln!(
            out,
            "  {:<24}{:<12}{} ({})",
            agent.agent,
            agent.recommendation,
            agent.confidence.percent,
            agent.confidence.tier.as_str()
        );
    }
    out
}

pub fn render_portfolio(view: &PortfolioView) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Cash:       {}", view.cash);
    let _ = writeln!(out, "P/L:        {}", view.profit_loss);
    let _ = writeln!(out, "Positions:  {}", view.total_positions);

    let _ = writeln!(out, "\nHoldings");
    if view.holdings.is_empty() {
        let _ = writeln!(out, "  {}", NO_HOLDINGS_MESSAGE);
    }
    for h in &view.holdings {
        let _ = writeln!(out, "  {:<10}{:>14}", h.symbol, h.quantity_display);
    }

    let _ = writeln!(out, "\nRecent trades");
    if view.recent_trades.is_empty() {
        let _ = writeln!(out, "  {}", NO_RECENT_TRADES_MESSAGE);
    }
    for t in &view.recent_trades {
        let _ = writeln!(
            out,
            "  {:<5}{:<10}{:>10} @ {:<12}{}",
            t.action, t.symbol, t.quantity, t.price, t.timestamp
        );
    }
    out
}

pub fn render_logs(view: &LogsView) -> String {
    match view {
        LogsView::Empty => format!("{}\n", NO_LOGS_MESSAGE),
        LogsView::Entries(rows) => {
            let mut out = String::new();
            for row in rows {
                let _ = writeln!(out, "{}  {:<8} {:<16} {}", row.timestamp, row.level, row.module, row.message);
            }
            out
        }
    }
}

pub fn render_health(view: &HealthView) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Status: {}", view.status);
    if let Some(at) = &view.checked_at {
        let _ = writeln!(out, "Checked: {}", at);
    }
    for (name, up) in &view.components {
        let _ = writeln!(out, "  {:<20}{}", name, if *up { "up" } else { "down" });
    }
    out
}

/// CLI failures read the same way the dashboard's notifications do.
fn cli_error(context: &str, err: DashboardError) -> anyhow::Error {
    match err {
        DashboardError::Transport(_) => anyhow!("{}: {}", context, err.message()),
        _ => anyhow!(err.message().to_string()),
    }
}

pub async fn run_analyze(api: ApiClient, symbol: &str) -> Result<()> {
    let mut reconciler = ViewStateReconciler::new(api);
    let result = reconciler
        .fetch_analysis(symbol)
        .await
        .map_err(|e| cli_error("Failed to analyze", e))?;
    print!("{}", render_analysis(&result));
    Ok(())
}

pub async fn run_portfolio(api: ApiClient) -> Result<()> {
    let mut reconciler = ViewStateReconciler::new(api);
    reconciler
        .load_portfolio(LoadOrigin::User)
        .await
        .map_err(|e| cli_error("Failed to load portfolio", e))?;
    if let Some(view) = reconciler.state().portfolio.snapshot() {
        print!("{}", render_portfolio(view));
    }
    Ok(())
}

pub async fn run_trade(
    api: ApiClient,
    symbol: Option<&str>,
    action: Option<&str>,
    quantity: Option<f64>,
    price: Option<f64>,
) -> Result<()> {
    let request = validate_trade(
        symbol.unwrap_or_default(),
        action.and_then(TradeAction::parse),
        quantity.unwrap_or(f64::NAN),
        price.unwrap_or(f64::NAN),
    );

    let mut reconciler = ViewStateReconciler::new(api);
    let message = reconciler
        .submit_trade(request)
        .await
        .map_err(|e| cli_error("Failed to execute trade", e))?;
    println!("{}", message);

    if let Some(view) = reconciler.state().portfolio.snapshot() {
        println!();
        print!("{}", render_portfolio(view));
    }
    Ok(())
}

pub async fn run_logs(api: ApiClient) -> Result<()> {
    let mut reconciler = ViewStateReconciler::new(api);
    let view = reconciler
        .fetch_logs()
        .await
        .map_err(|e| cli_error("Failed to load logs", e))?;
    print!("{}", render_logs(&view));
    Ok(())
}

pub async fn run_health(api: ApiClient) -> Result<()> {
    let mut reconciler = ViewStateReconciler::new(api);
    let view = reconciler
        .check_health()
        .await
        .map_err(|e| cli_error("Health check failed", e))?;
    print!("{}", render_health(&view));
    Ok(())
}

/// Prints the portfolio, then reprints it on every refresh tick until Ctrl-C.
/// Refresh failures are logged and the previous snapshot stays on screen.
pub async fn run_watch(api: ApiClient) -> Result<()> {
    let period = api.config().refresh_interval;
    let mut reconciler = ViewStateReconciler::new(api);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let timer = spawn_refresh_timer(period, tx, ());

    info!("Watching portfolio every {}s; Ctrl-C to stop", period.as_secs());
    let mut origin = LoadOrigin::User;

    loop {
        match reconciler.load_portfolio(origin).await {
            Ok(ApplyOutcome::Applied) => {
                if let Some(view) = reconciler.state().portfolio.snapshot() {
                    let at = format_instant(&chrono::Local::now(), reconciler.display_tz());
                    println!("--- {} ---", at);
                    print!("{}", render_portfolio(view));
                }
            }
            Ok(_) => {}
            Err(err) if origin == LoadOrigin::User => {
                timer.abort();
                return Err(cli_error("Failed to load portfolio", err));
            }
            Err(err) => warn!("Portfolio refresh failed, keeping last snapshot: {}", err),
        }
        origin = LoadOrigin::Background;

        let skipped = drain_pending_ticks(&mut rx);
        if skipped > 0 {
            debug!("Load outlasted {} refresh tick(s); coalescing", skipped);
        }

        tokio::select! {
            tick = rx.recv() => {
                if tick.is_none() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Stopping watch");
                break;
            }
        }
    }

    timer.abort();
    Ok(())
}

/// Discards ticks that queued up while a load was in flight, so one slow
/// request is followed by one reload rather than a burst.
fn drain_pending_ticks(rx: &mut UnboundedReceiver<()>) -> usize {
    let mut skipped = 0;
    while rx.try_recv().is_ok() {
        skipped += 1;
    }
    skipped
}
