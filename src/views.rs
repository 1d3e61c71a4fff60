use crate::format::{
    clamp_unit, format_currency, format_number, format_percent, format_timestamp, indicator_label,
    DEFAULT_DECIMALS,
};
use crate::models::{
    AgentDecision, AnalysisResult, HealthStatus, LogEntry, LogLevel, PortfolioResponse, Recommendation,
    TradeAction,
};
use chrono_tz::Tz;

pub const CONFIDENCE_MEDIUM_THRESHOLD: f64 = 0.4;
pub const CONFIDENCE_HIGH_THRESHOLD: f64 = 0.7;

pub const NO_LOGS_MESSAGE: &str = "No logs available";
pub const NO_HOLDINGS_MESSAGE: &str = "No current holdings";
pub const NO_RECENT_TRADES_MESSAGE: &str = "No recent trades";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfidenceTier {
    Low,
    Medium,
    High,
}

impl ConfidenceTier {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// Tier for a confidence/strength value after clamping to [0,1].
pub fn classify_confidence(value: f64) -> ConfidenceTier {
    let v = clamp_unit(value);
    if v >= CONFIDENCE_HIGH_THRESHOLD {
        ConfidenceTier::High
    } else if v >= CONFIDENCE_MEDIUM_THRESHOLD {
        ConfidenceTier::Medium
    } else {
        ConfidenceTier::Low
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ConfidenceView {
    /// Clamped to [0,1]; drives gauge width.
    pub ratio: f64,
    pub percent: String,
    pub tier: ConfidenceTier,
}

impl ConfidenceView {
    pub fn from_raw(raw: Option<f64>) -> Self {
        let ratio = clamp_unit(raw.unwrap_or(0.0));
        Self {
            ratio,
            percent: format_percent(ratio),
            tier: classify_confidence(ratio),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct IndicatorRow {
    pub label: String,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AnalysisView {
    pub symbol: String,
    pub recommendation: Recommendation,
    pub confidence: ConfidenceView,
    pub signals: Vec<String>,
    pub indicators: Vec<IndicatorRow>,
}

impl AnalysisView {
    pub fn build(symbol: &str, result: &AnalysisResult) -> Self {
        let indicators = result
            .technical_indicators
            .iter()
            .filter_map(|(key, value)| {
                value.filter(|v| v.is_finite()).map(|v| IndicatorRow {
                    label: indicator_label(key),
                    value: format_number(v, DEFAULT_DECIMALS),
                })
            })
            .collect();

        Self {
            symbol: symbol.to_string(),
            recommendation: result.signals.recommendation.unwrap_or_default(),
            confidence: ConfidenceView::from_raw(result.signals.strength),
            signals: result.signals.signals.clone(),
            indicators,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct AgentOpinionRow {
    pub agent: String,
    pub recommendation: Recommendation,
    pub confidence: ConfidenceView,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AgentDecisionView {
    pub symbol: String,
    pub recommendation: Recommendation,
    pub confidence: ConfidenceView,
    pub reasoning: Vec<String>,
    pub agents: Vec<AgentOpinionRow>,
}

impl AgentDecisionView {
    pub fn build(symbol: &str, decision: &AgentDecision) -> Self {
        let final_decision = &decision.final_decision;
        Self {
            symbol: symbol.to_string(),
            recommendation: final_decision.final_recommendation.unwrap_or_default(),
            confidence: ConfidenceView::from_raw(final_decision.confidence),
            reasoning: final_decision.reasoning.clone(),
            agents: decision
                .individual_agents
                .iter()
                .map(|opinion| AgentOpinionRow {
                    agent: opinion.agent.clone(),
                    recommendation: opinion.recommendation.unwrap_or_default(),
                    confidence: ConfidenceView::from_raw(opinion.confidence),
                })
                .collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct HoldingRow {
    pub symbol: String,
    pub quantity: f64,
    pub quantity_display: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TradeRow {
    pub symbol: String,
    pub action: TradeAction,
    pub quantity: String,
    pub price: String,
    pub timestamp: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PortfolioView {
    pub cash: String,
    pub profit_loss: String,
    pub profit_loss_raw: f64,
    pub total_positions: u64,
    /// Ascending by symbol.
    pub holdings: Vec<HoldingRow>,
    /// Most recent first.
    pub recent_trades: Vec<TradeRow>,
}

impl PortfolioView {
    pub fn build(response: &PortfolioResponse, tz: Option<Tz>) -> Self {
        let snapshot = &response.portfolio;

        let holdings = snapshot
            .holdings
            .iter()
            .map(|(symbol, quantity)| HoldingRow {
                symbol: symbol.clone(),
                quantity: *quantity,
                quantity_display: format_number(*quantity, 4),
            })
            .collect();

        let recent_trades = response
            .recent_positions
            .iter()
            .rev()
            .map(|position| TradeRow {
                symbol: position.symbol.clone(),
                action: position.action,
                quantity: format_number(position.quantity, DEFAULT_DECIMALS),
                price: format_currency(position.price),
                timestamp: format_timestamp(&position.timestamp, tz),
            })
            .collect();

        Self {
            cash: format_currency(snapshot.cash),
            profit_loss: format_currency(snapshot.profit_loss),
            profit_loss_raw: snapshot.profit_loss,
            total_positions: snapshot.total_positions,
            holdings,
            recent_trades,
        }
    }

    pub fn holding(&self, symbol: &str) -> Option<&HoldingRow> {
        self.holdings.iter().find(|row| row.symbol == symbol)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogTone {
    Danger,
    Warning,
    Info,
    Plain,
}

impl LogTone {
    pub fn for_level(level: &LogLevel) -> Self {
        match level {
            LogLevel::Error | LogLevel::Critical => Self::Danger,
            LogLevel::Warning => Self::Warning,
            LogLevel::Info => Self::Info,
            LogLevel::Debug | LogLevel::Other(_) => Self::Plain,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LogRow {
    pub timestamp: String,
    pub level: String,
    pub tone: LogTone,
    pub module: String,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum LogsView {
    Empty,
    Entries(Vec<LogRow>),
}

impl LogsView {
    pub fn build(entries: &[LogEntry], tz: Option<Tz>) -> Self {
        if entries.is_empty() {
            return Self::Empty;
        }
        Self::Entries(
            entries
                .iter()
                .map(|entry| LogRow {
                    timestamp: format_timestamp(&entry.timestamp, tz),
                    level: entry.level.as_str().to_string(),
                    tone: LogTone::for_level(&entry.level),
                    module: entry.module.clone(),
                    message: entry.message.clone(),
                })
                .collect(),
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct HealthView {
    pub status: String,
    pub checked_at: Option<String>,
    pub components: Vec<(String, bool)>,
}

impl HealthView {
    pub fn build(health: &HealthStatus, tz: Option<Tz>) -> Self {
        Self {
            status: if health.status.is_empty() {
                "unknown".to_string()
            } else {
                health.status.clone()
            },
            checked_at: health.timestamp.as_deref().map(|ts| format_timestamp(ts, tz)),
            components: health
                .components
                .iter()
                .map(|(name, up)| (name.clone(), *up))
                .collect(),
        }
    }

    pub fn all_up(&self) -> bool {
        self.components.iter().all(|(_, up)| *up)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AgentOpinion, AnalysisSignals, FinalDecision, PortfolioSnapshot, PositionRecord,
    };
    use std::collections::BTreeMap;

    fn position(symbol: &str, action: TradeAction, ts: &str) -> PositionRecord {
        PositionRecord {
            symbol: symbol.to_string(),
            action,
            quantity: 1.0,
            price: 100.0,
            timestamp: ts.to_string(),
        }
    }

    #[test]
    fn classify_boundaries() {
        assert_eq!(classify_confidence(0.0), ConfidenceTier::Low);
        assert_eq!(classify_confidence(0.3999), ConfidenceTier::Low);
        assert_eq!(classify_confidence(0.4), ConfidenceTier::Medium);
        assert_eq!(classify_confidence(0.6999), ConfidenceTier::Medium);
        assert_eq!(classify_confidence(0.7), ConfidenceTier::High);
        assert_eq!(classify_confidence(1.0), ConfidenceTier::High);
    }

    #[test]
    fn classify_clamps_out_of_range_values() {
        assert_eq!(classify_confidence(-3.0), ConfidenceTier::Low);
        assert_eq!(classify_confidence(7.5), ConfidenceTier::High);
        assert_eq!(classify_confidence(f64::NAN), ConfidenceTier::Low);
    }

    #[test]
    fn classify_sweep_agrees_with_thresholds() {
        for step in 0..=1000 {
            let v = step as f64 / 1000.0;
            let expected = if v < 0.4 {
                ConfidenceTier::Low
            } else if v < 0.7 {
                ConfidenceTier::Medium
            } else {
                ConfidenceTier::High
            };
            assert_eq!(classify_confidence(v), expected, "v={}", v);
        }
    }

    #[test]
    fn analysis_view_skips_null_indicators_and_defaults_to_hold() {
        let mut indicators = BTreeMap::new();
        indicators.insert("rsi".to_string(), Some(61.234));
        indicators.insert("sma_50".to_string(), None);
        let result = AnalysisResult {
            signals: AnalysisSignals {
                recommendation: None,
                strength: Some(1.4),
                signals: vec!["Volume spike".to_string()],
            },
            technical_indicators: indicators,
        };

        let view = AnalysisView::build("AAPL", &result);
        assert_eq!(view.recommendation, Recommendation::Hold);
        assert_eq!(view.confidence.ratio, 1.0);
        assert_eq!(view.confidence.percent, "100%");
        assert_eq!(
            view.indicators,
            vec![IndicatorRow { label: "RSI".to_string(), value: "61.23".to_string() }]
        );
    }

    #[test]
    fn agent_view_keeps_agent_order() {
        let decision = AgentDecision {
            final_decision: FinalDecision {
                final_recommendation: Some(Recommendation::Sell),
                confidence: Some(0.55),
                reasoning: vec!["Momentum fading".to_string()],
            },
            individual_agents: vec![
                AgentOpinion {
                    agent: "Technical Agent".to_string(),
                    recommendation: Some(Recommendation::Sell),
                    confidence: Some(0.8),
                },
                AgentOpinion {
                    agent: "Sentiment Agent".to_string(),
                    recommendation: None,
                    confidence: None,
                },
            ],
        };

        let view = AgentDecisionView::build("TSLA", &decision);
        assert_eq!(view.confidence.tier, ConfidenceTier::Medium);
        assert_eq!(view.agents[0].agent, "Technical Agent");
        assert_eq!(view.agents[0].confidence.percent, "80%");
        assert_eq!(view.agents[1].recommendation, Recommendation::Hold);
        assert_eq!(view.agents[1].confidence.percent, "0%");
    }

    #[test]
    fn recent_trades_are_reversed() {
        let response = PortfolioResponse {
            portfolio: PortfolioSnapshot::default(),
            recent_positions: vec![
                position("AAPL", TradeAction::Buy, "2024-03-01T10:00:00"),
                position("MSFT", TradeAction::Buy, "2024-03-01T11:00:00"),
                position("AAPL", TradeAction::Sell, "2024-03-01T12:00:00"),
            ],
            timestamp: None,
        };

        let view = PortfolioView::build(&response, None);
        let order: Vec<(&str, TradeAction)> = view
            .recent_trades
            .iter()
            .map(|row| (row.symbol.as_str(), row.action))
            .collect();
        assert_eq!(
            order,
            vec![
                ("AAPL", TradeAction::Sell),
                ("MSFT", TradeAction::Buy),
                ("AAPL", TradeAction::Buy),
            ]
        );
        assert_eq!(view.recent_trades[0].timestamp, "3/1/2024, 12:00:00 PM");
        assert_eq!(view.recent_trades[0].price, "$100.00");
    }

    #[test]
    fn portfolio_summary_is_formatted() {
        let mut holdings = BTreeMap::new();
        holdings.insert("NVDA".to_string(), 2.5);
        holdings.insert("AAPL".to_string(), 10.0);
        let response = PortfolioResponse {
            portfolio: PortfolioSnapshot {
                cash: 98200.0,
                initial_cash: Some(100000.0),
                profit_loss: -1800.0,
                total_positions: 2,
                holdings,
            },
            recent_positions: Vec::new(),
            timestamp: None,
        };

        let view = PortfolioView::build(&response, None);
        assert_eq!(view.cash, "$98,200.00");
        assert_eq!(view.profit_loss, "-$1,800.00");
        assert_eq!(view.holdings[0].symbol, "AAPL");
        assert_eq!(view.holdings[1].quantity_display, "2.5000");
        assert_eq!(view.holding("NVDA").map(|h| h.quantity), Some(2.5));
    }

    #[test]
    fn empty_logs_are_a_distinct_state() {
        assert_eq!(LogsView::build(&[], None), LogsView::Empty);
    }

    #[test]
    fn log_tone_follows_level() {
        assert_eq!(LogTone::for_level(&LogLevel::Error), LogTone::Danger);
        assert_eq!(LogTone::for_level(&LogLevel::Warning), LogTone::Warning);
        assert_eq!(LogTone::for_level(&LogLevel::Info), LogTone::Info);
        assert_eq!(LogTone::for_level(&LogLevel::Other("TRACE".to_string())), LogTone::Plain);
    }
}
