use crate::config::DashboardConfig;
use crate::error::{DashboardError, DashboardResult};
use crate::models::{
    AgentDecision, AnalysisResult, HealthStatus, LogEntry, PortfolioResponse, TradeOutcome, TradeRequest,
};
use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

pub const ANALYSIS_PATH: &str = "/api/analysis";
pub const AGENT_DECISION_PATH: &str = "/api/agents/decision";
pub const PORTFOLIO_PATH: &str = "/api/portfolio";
pub const EXECUTE_TRADE_PATH: &str = "/api/execute-trade";
pub const LOGS_PATH: &str = "/api/logs";
pub const HEALTH_PATH: &str = "/api/health";

/// Thin HTTP client for the trading bot's REST API.
///
/// Every endpoint may answer `{ "error": "..." }` (often with a 500); that
/// envelope is checked before the body is decoded into its typed shape.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    config: DashboardConfig,
}

impl ApiClient {
    pub fn new(config: DashboardConfig) -> DashboardResult<Self> {
        let client = Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| DashboardError::transport(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> DashboardResult<T> {
        let url = self.config.endpoint(path);
        debug!("GET {}", url);
        let res = self.client.get(url).send().await?;
        decode_body(path, res).await
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(&self, path: &str, payload: &B) -> DashboardResult<T> {
        let url = self.config.endpoint(path);
        debug!("POST {}", url);
        let res = self.client.post(url).json(payload).send().await?;
        decode_body(path, res).await
    }

    pub async fn get_analysis(&self, symbol: &str) -> DashboardResult<AnalysisResult> {
        self.get_json(&symbol_path(ANALYSIS_PATH, symbol)).await
    }

    pub async fn get_agent_decision(&self, symbol: &str) -> DashboardResult<AgentDecision> {
        self.get_json(&symbol_path(AGENT_DECISION_PATH, symbol)).await
    }

    pub async fn get_portfolio(&self) -> DashboardResult<PortfolioResponse> {
        self.get_json(PORTFOLIO_PATH).await
    }

    pub async fn execute_trade(&self, request: &TradeRequest) -> DashboardResult<TradeOutcome> {
        self.post_json(EXECUTE_TRADE_PATH, request).await
    }

    pub async fn get_logs(&self) -> DashboardResult<Vec<LogEntry>> {
        self.get_json(LOGS_PATH).await
    }

    pub async fn get_health(&self) -> DashboardResult<HealthStatus> {
        self.get_json(HEALTH_PATH).await
    }
}

fn symbol_path(prefix: &str, symbol: &str) -> String {
    format!("{}/{}", prefix, urlencoding::encode(symbol))
}

async fn decode_body<T: DeserializeOwned>(path: &str, res: Response) -> DashboardResult<T> {
    let status = res.status();
    let bytes = res.bytes().await?;
    let value: Value = serde_json::from_slice(&bytes).map_err(|_| {
        DashboardError::transport(format!("{} returned a non-JSON body (HTTP {})", path, status))
    })?;
    decode_value(path, status, value)
}

/// Error envelope first, then HTTP status, then the typed shape.
pub(crate) fn decode_value<T: DeserializeOwned>(path: &str, status: StatusCode, value: Value) -> DashboardResult<T> {
    if let Some(message) = error_field(&value) {
        return Err(DashboardError::Server(message));
    }
    if !status.is_success() {
        return Err(DashboardError::transport(format!("{} failed: HTTP {}", path, status)));
    }
    Ok(serde_json::from_value(value)?)
}

/// Only a truthy `error` counts; `null`, `false`, `""` and `0` are ignored.
fn error_field(value: &Value) -> Option<String> {
    match value.get("error")? {
        Value::Null | Value::Bool(false) => None,
        Value::String(message) if message.is_empty() => None,
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        Value::String(message) => Some(message.clone()),
        other => Some(other.to_string()),
    }
}
