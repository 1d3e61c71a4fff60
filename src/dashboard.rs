use crate::api::ApiClient;
use crate::error::{DashboardError, DashboardResult};
use crate::models::{TradeAction, TradeRequest};
use crate::state::{ApplyOutcome, Notification, RequestSeq, SymbolAnalysis, TradeForm, ViewState};
use crate::views::{AgentDecisionView, AnalysisView, HealthView, LogsView, PortfolioView};
use chrono_tz::Tz;
use tracing::{info, warn};

pub const MISSING_SYMBOL_MESSAGE: &str = "Please enter a symbol";
pub const MISSING_TRADE_FIELDS_MESSAGE: &str = "Please fill in all fields";

/// Who asked for a portfolio load; background failures never raise a notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadOrigin {
    User,
    Background,
}

// ── Stateless operations (safe to run on spawned tasks) ─────────────────────

pub fn normalize_symbol(raw: &str) -> DashboardResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DashboardError::validation(MISSING_SYMBOL_MESSAGE));
    }
    Ok(trimmed.to_string())
}

/// Analysis first, then agent decision; the second request is never issued if the first fails.
pub async fn run_analysis(api: &ApiClient, symbol: &str) -> DashboardResult<SymbolAnalysis> {
    let analysis = api.get_analysis(symbol).await?;
    let analysis = AnalysisView::build(symbol, &analysis);

    let decision = api.get_agent_decision(symbol).await?;
    let decision = AgentDecisionView::build(symbol, &decision);

    Ok(SymbolAnalysis { analysis, decision })
}

pub async fn run_portfolio_load(api: &ApiClient, tz: Option<Tz>) -> DashboardResult<PortfolioView> {
    let response = api.get_portfolio().await?;
    Ok(PortfolioView::build(&response, tz))
}

pub async fn run_logs_load(api: &ApiClient, tz: Option<Tz>) -> DashboardResult<LogsView> {
    let entries = api.get_logs().await?;
    Ok(LogsView::build(&entries, tz))
}

pub async fn run_health_check(api: &ApiClient, tz: Option<Tz>) -> DashboardResult<HealthView> {
    let health = api.get_health().await?;
    Ok(HealthView::build(&health, tz))
}

/// Sends an already-validated trade; `Ok` carries the server's success message.
pub async fn run_trade(api: &ApiClient, request: &TradeRequest) -> DashboardResult<String> {
    let outcome = api.execute_trade(request).await?;
    if outcome.success {
        Ok(outcome
            .message
            .unwrap_or_else(|| format!("{} {} {} submitted", request.action, request.quantity, request.symbol)))
    } else {
        Err(DashboardError::Server(
            outcome.error.unwrap_or_else(|| "Trade was rejected".to_string()),
        ))
    }
}

/// All four fields present, finite and positive, checked before any request is built.
pub fn validate_trade(symbol: &str, action: Option<TradeAction>, quantity: f64, price: f64) -> DashboardResult<TradeRequest> {
    let symbol = symbol.trim();
    let valid_number = |v: f64| v.is_finite() && v > 0.0;

    match action {
        Some(action) if !symbol.is_empty() && valid_number(quantity) && valid_number(price) => Ok(TradeRequest {
            symbol: symbol.to_string(),
            action,
            quantity,
            price,
        }),
        _ => Err(DashboardError::validation(MISSING_TRADE_FIELDS_MESSAGE)),
    }
}

pub fn trade_request_from_form(form: &TradeForm) -> DashboardResult<TradeRequest> {
    let parse = |raw: &str| raw.trim().parse::<f64>().unwrap_or(f64::NAN);
    validate_trade(&form.symbol, Some(form.action), parse(&form.quantity), parse(&form.price))
}

/// Server rejections are shown verbatim; transport failures get the operation prefix.
pub fn trade_failure_notification(err: &DashboardError) -> Notification {
    match err {
        DashboardError::Server(message) => Notification::error(message.clone()),
        other => Notification::from_error(Some("Failed to execute trade"), other),
    }
}

pub fn portfolio_failure_notification(err: &DashboardError) -> Notification {
    Notification::from_error(Some("Failed to load portfolio"), err)
}

// ── Stateful reconciler ─────────────────────────────────────────────────────

/// Owns the view state and applies every fetch result to it.
pub struct ViewStateReconciler {
    api: ApiClient,
    state: ViewState,
}

impl ViewStateReconciler {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            state: ViewState::default(),
        }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut ViewState {
        &mut self.state
    }

    pub fn display_tz(&self) -> Option<Tz> {
        self.api.config().display_tz
    }

    pub fn notify(&mut self, notification: Notification) {
        self.state.notification = Some(notification);
    }

    pub fn take_notification(&mut self) -> Option<Notification> {
        self.state.notification.take()
    }

    pub async fn fetch_analysis(&mut self, raw_symbol: &str) -> DashboardResult<SymbolAnalysis> {
        let (seq, symbol) = self.begin_analysis(raw_symbol)?;
        let result = run_analysis(&self.api, &symbol).await;
        self.finish_analysis(seq, &symbol, result.clone());
        result
    }

    /// Validates the symbol and marks the analysis panel as loading.
    pub fn begin_analysis(&mut self, raw_symbol: &str) -> DashboardResult<(RequestSeq, String)> {
        let symbol = match normalize_symbol(raw_symbol) {
            Ok(symbol) => symbol,
            Err(err) => {
                self.notify(Notification::from_error(None, &err));
                return Err(err);
            }
        };
        self.state.current_symbol = Some(symbol.clone());
        Ok((self.state.analysis.begin(), symbol))
    }

    pub fn finish_analysis(&mut self, seq: RequestSeq, symbol: &str, result: DashboardResult<SymbolAnalysis>) -> ApplyOutcome {
        if let Err(err) = &result {
            warn!("Analysis for {} failed ({}): {}", symbol, err.kind(), err);
        }
        self.state.analysis.complete(seq, result)
    }

    pub async fn load_portfolio(&mut self, origin: LoadOrigin) -> DashboardResult<ApplyOutcome> {
        let seq = self.begin_portfolio();
        let result = run_portfolio_load(&self.api, self.display_tz()).await;
        self.apply_portfolio(seq, origin, result)
    }

    pub fn begin_portfolio(&mut self) -> RequestSeq {
        self.state.portfolio.begin()
    }

    /// Applies a portfolio result issued under `seq`; also the entry point for spawned loads.
    pub fn apply_portfolio(
        &mut self,
        seq: RequestSeq,
        origin: LoadOrigin,
        result: DashboardResult<PortfolioView>,
    ) -> DashboardResult<ApplyOutcome> {
        let error = result.as_ref().err().cloned();
        let outcome = self.state.portfolio.complete(seq, result);

        match (outcome, error) {
            (ApplyOutcome::Failed, Some(err)) => {
                match origin {
                    LoadOrigin::User => {
                        warn!("Error loading portfolio: {}", err);
                        self.notify(portfolio_failure_notification(&err));
                    }
                    LoadOrigin::Background => warn!("Background portfolio refresh failed: {}", err),
                }
                Err(err)
            }
            (outcome, _) => Ok(outcome),
        }
    }

    /// Validates, posts once, and on success reloads the portfolio exactly once.
    pub async fn submit_trade(&mut self, request: DashboardResult<TradeRequest>) -> DashboardResult<String> {
        let request = self.begin_trade(request)?;
        let result = run_trade(&self.api, &request).await;
        if self.finish_trade(&request, result.clone()) {
            if let Err(err) = self.load_portfolio(LoadOrigin::User).await {
                warn!("Portfolio reload after trade failed: {}", err);
            }
        }
        result
    }

    /// Passes a valid request through; a validation failure is notified and returned.
    pub fn begin_trade(&mut self, request: DashboardResult<TradeRequest>) -> DashboardResult<TradeRequest> {
        request.inspect_err(|err| self.notify(Notification::from_error(None, err)))
    }

    /// Records the trade result; returns `true` when a portfolio reload must follow.
    pub fn finish_trade(&mut self, request: &TradeRequest, result: DashboardResult<String>) -> bool {
        match result {
            Ok(message) => {
                info!(
                    "Trade accepted: {} {} {} @ {}",
                    request.action, request.quantity, request.symbol, request.price
                );
                self.notify(Notification::success(message));
                self.state.trade_form.reset();
                true
            }
            Err(err) => {
                warn!("Trade rejected: {}", err);
                self.notify(trade_failure_notification(&err));
                false
            }
        }
    }

    pub async fn fetch_logs(&mut self) -> DashboardResult<LogsView> {
        let seq = self.state.logs.begin();
        let result = run_logs_load(&self.api, self.display_tz()).await;
        self.state.logs.complete(seq, result.clone());
        result
    }

    pub async fn check_health(&mut self) -> DashboardResult<HealthView> {
        let seq = self.state.health.begin();
        let result = run_health_check(&self.api, self.display_tz()).await;
        self.state.health.complete(seq, result.clone());
        result
    }

    /// Loads the trade form with a full SELL of `symbol` from the current snapshot.
    pub fn quick_sell(&mut self, symbol: &str) -> Option<&TradeForm> {
        let quantity = self.state.portfolio.snapshot()?.holding(symbol)?.quantity;
        self.state.trade_form = TradeForm::quick_sell(symbol, quantity);
        Some(&self.state.trade_form)
    }
}
