use crate::api::ApiClient;
use crate::config::DashboardConfig;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
pub struct Hits {
    analysis: AtomicUsize,
    decision: AtomicUsize,
    portfolio: AtomicUsize,
    trade: AtomicUsize,
    logs: AtomicUsize,
    health: AtomicUsize,
}

impl Hits {
    pub fn analysis(&self) -> usize {
        self.analysis.load(Ordering::SeqCst)
    }
    pub fn decision(&self) -> usize {
        self.decision.load(Ordering::SeqCst)
    }
    pub fn portfolio(&self) -> usize {
        self.portfolio.load(Ordering::SeqCst)
    }
    pub fn trade(&self) -> usize {
        self.trade.load(Ordering::SeqCst)
    }
    pub fn logs(&self) -> usize {
        self.logs.load(Ordering::SeqCst)
    }
    pub fn health(&self) -> usize {
        self.health.load(Ordering::SeqCst)
    }
}

/// Misbehaviour applied to every route.
#[derive(Clone, Copy, Debug)]
pub enum Fault {
    /// A gateway error page instead of JSON.
    HtmlBadGateway,
    /// Answers normally, but only after this long.
    Stall(Duration),
}

struct MockState {
    hits: Hits,
    fault: Option<Fault>,
    analysis: Value,
    decision: Value,
    /// Served in order; the last one repeats.
    portfolio: Mutex<VecDeque<Value>>,
    trade: Value,
    last_trade_body: Mutex<Option<Value>>,
    logs: Value,
    health: Value,
}

/// In-process stand-in for the trading bot API, bound to an ephemeral port.
pub struct MockApi {
    base_url: String,
    state: Arc<MockState>,
}

pub struct MockApiBuilder {
    fault: Option<Fault>,
    analysis: Value,
    decision: Value,
    portfolio: Vec<Value>,
    trade: Value,
    logs: Value,
    health: Value,
}

impl MockApi {
    pub fn builder() -> MockApiBuilder {
        MockApiBuilder {
            fault: None,
            analysis: json!({
                "symbol": "AAPL",
                "technical_indicators": { "rsi": 55.5, "sma_20": 181.2, "macd": null },
                "signals": {
                    "signals": ["Price above SMA20"],
                    "recommendation": "BUY",
                    "strength": 0.72
                }
            }),
            decision: json!({
                "symbol": "AAPL",
                "individual_agents": [
                    { "agent": "Technical Agent", "recommendation": "BUY", "confidence": 0.8 },
                    { "agent": "Risk Agent", "recommendation": "HOLD", "confidence": 0.5 }
                ],
                "final_decision": {
                    "agent": "Consensus Agent",
                    "final_recommendation": "BUY",
                    "confidence": 0.65,
                    "reasoning": ["2 of 2 agents lean bullish"]
                },
                "summary": { "recommendation": "BUY", "confidence": 0.65 }
            }),
            portfolio: vec![json!({
                "portfolio": {
                    "cash": 100000.0,
                    "initial_cash": 100000.0,
                    "holdings": {},
                    "total_positions": 0,
                    "profit_loss": 0.0
                },
                "recent_positions": [],
                "timestamp": "2024-03-01T09:00:00"
            })],
            trade: json!({ "success": true, "message": "ok" }),
            logs: json!([
                { "timestamp": "2024-03-01T09:00:00", "level": "INFO", "module": "system", "message": "Trading bot system started" }
            ]),
            health: json!({
                "status": "running",
                "timestamp": "2024-03-01T09:00:00",
                "components": { "market_data": true, "database": false }
            }),
        }
    }

    pub fn client(&self) -> ApiClient {
        self.client_with_timeout(Duration::from_secs(5))
    }

    pub fn client_with_timeout(&self, http_timeout: Duration) -> ApiClient {
        let config = DashboardConfig {
            base_url: self.base_url.clone(),
            http_timeout,
            ..DashboardConfig::default()
        };
        ApiClient::new(config).expect("client builds")
    }

    /// A client pointed at a port nothing listens on.
    pub async fn unreachable_client() -> ApiClient {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);
        let config = DashboardConfig {
            base_url: format!("http://{}", addr),
            http_timeout: Duration::from_secs(2),
            ..DashboardConfig::default()
        };
        ApiClient::new(config).expect("client builds")
    }

    pub fn hits(&self) -> &Hits {
        &self.state.hits
    }

    pub fn last_trade_body(&self) -> Option<Value> {
        self.state.last_trade_body.lock().expect("lock").clone()
    }
}

impl MockApiBuilder {
    pub fn fault(mut self, fault: Fault) -> Self {
        self.fault = Some(fault);
        self
    }

    pub fn analysis(mut self, body: Value) -> Self {
        self.analysis = body;
        self
    }

    pub fn decision(mut self, body: Value) -> Self {
        self.decision = body;
        self
    }

    pub fn portfolio(mut self, bodies: Vec<Value>) -> Self {
        self.portfolio = bodies;
        self
    }

    pub fn trade(mut self, body: Value) -> Self {
        self.trade = body;
        self
    }

    pub fn logs(mut self, body: Value) -> Self {
        self.logs = body;
        self
    }

    pub async fn start(self) -> MockApi {
        let state = Arc::new(MockState {
            hits: Hits::default(),
            fault: self.fault,
            analysis: self.analysis,
            decision: self.decision,
            portfolio: Mutex::new(self.portfolio.into()),
            trade: self.trade,
            last_trade_body: Mutex::new(None),
            logs: self.logs,
            health: self.health,
        });

        let app = Router::new()
            .route("/api/analysis/:symbol", get(analysis))
            .route("/api/agents/decision/:symbol", get(decision))
            .route("/api/portfolio", get(portfolio))
            .route("/api/execute-trade", post(execute_trade))
            .route("/api/logs", get(logs))
            .route("/api/health", get(health))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        MockApi {
            base_url: format!("http://{}", addr),
            state,
        }
    }
}

/// Flask answers its error envelope with a 500; mirror that.
async fn reply(state: &MockState, body: Value) -> Response {
    match state.fault {
        Some(Fault::HtmlBadGateway) => {
            return (
                StatusCode::BAD_GATEWAY,
                [(header::CONTENT_TYPE, "text/html")],
                "<html><body><h1>502 Bad Gateway</h1></body></html>",
            )
                .into_response();
        }
        Some(Fault::Stall(delay)) => tokio::time::sleep(delay).await,
        None => {}
    }

    let status = if body.get("error").is_some_and(|e| !e.is_null()) {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    };
    (status, Json(body)).into_response()
}

async fn analysis(State(state): State<Arc<MockState>>, Path(_symbol): Path<String>) -> Response {
    state.hits.analysis.fetch_add(1, Ordering::SeqCst);
    reply(&state, state.analysis.clone()).await
}

async fn decision(State(state): State<Arc<MockState>>, Path(_symbol): Path<String>) -> Response {
    state.hits.decision.fetch_add(1, Ordering::SeqCst);
    reply(&state, state.decision.clone()).await
}

async fn portfolio(State(state): State<Arc<MockState>>) -> Response {
    state.hits.portfolio.fetch_add(1, Ordering::SeqCst);
    let body = {
        let mut queue = state.portfolio.lock().expect("lock");
        if queue.len() > 1 {
            queue.pop_front().unwrap_or(Value::Null)
        } else {
            queue.front().cloned().unwrap_or(Value::Null)
        }
    };
    reply(&state, body).await
}

async fn execute_trade(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    state.hits.trade.fetch_add(1, Ordering::SeqCst);
    *state.last_trade_body.lock().expect("lock") = Some(body);
    reply(&state, state.trade.clone()).await
}

async fn logs(State(state): State<Arc<MockState>>) -> Response {
    state.hits.logs.fetch_add(1, Ordering::SeqCst);
    reply(&state, state.logs.clone()).await
}

async fn health(State(state): State<Arc<MockState>>) -> Response {
    state.hits.health.fetch_add(1, Ordering::SeqCst);
    reply(&state, state.health.clone()).await
}
