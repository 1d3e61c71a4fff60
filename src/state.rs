use crate::error::DashboardError;
use crate::models::TradeAction;
use crate::views::{AgentDecisionView, AnalysisView, HealthView, LogsView, PortfolioView};
use tracing::debug;

/// Lifecycle of a single fetch-and-render panel.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum FetchState<T> {
    #[default]
    Idle,
    Loading,
    Success(T),
    Failed(String),
}

impl<T> FetchState<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    pub fn success(&self) -> Option<&T> {
        match self {
            Self::Success(value) => Some(value),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&str> {
        match self {
            Self::Failed(message) => Some(message.as_str()),
            _ => None,
        }
    }
}

/// Monotonic ticket handed out when a request is issued.
pub type RequestSeq = u64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// A newer response is already on display; this one was dropped.
    Stale,
    /// Request failed; whatever was on display is untouched.
    Failed,
}

/// Hands out request sequence numbers and remembers the newest one applied.
#[derive(Clone, Debug, Default)]
pub struct RequestSequencer {
    issued: RequestSeq,
    applied: RequestSeq,
}

impl RequestSequencer {
    pub fn issue(&mut self) -> RequestSeq {
        self.issued += 1;
        self.issued
    }

    pub fn latest_applied(&self) -> RequestSeq {
        self.applied
    }

    pub fn is_stale(&self, seq: RequestSeq) -> bool {
        seq < self.applied
    }

    /// Is `seq` still the most recently issued request?
    pub fn is_current(&self, seq: RequestSeq) -> bool {
        seq == self.issued
    }

    fn mark_applied(&mut self, seq: RequestSeq) {
        self.applied = self.applied.max(seq);
    }
}

/// The one shared snapshot: last-writer-wins full replacement, guarded by sequence.
#[derive(Clone, Debug, Default)]
pub struct PortfolioStore {
    sequencer: RequestSequencer,
    snapshot: Option<PortfolioView>,
    loading: bool,
    last_error: Option<String>,
}

impl PortfolioStore {
    pub fn begin(&mut self) -> RequestSeq {
        self.loading = true;
        self.sequencer.issue()
    }

    pub fn complete(
        &mut self,
        seq: RequestSeq,
        result: Result<PortfolioView, DashboardError>,
    ) -> ApplyOutcome {
        if self.sequencer.is_current(seq) {
            self.loading = false;
        }

        if self.sequencer.is_stale(seq) {
            debug!(
                "Discarding portfolio response #{} (already showing #{})",
                seq,
                self.sequencer.latest_applied()
            );
            return ApplyOutcome::Stale;
        }

        match result {
            Ok(view) => {
                self.snapshot = Some(view);
                self.last_error = None;
                self.sequencer.mark_applied(seq);
                ApplyOutcome::Applied
            }
            Err(err) => {
                self.last_error = Some(err.to_string());
                ApplyOutcome::Failed
            }
        }
    }

    pub fn snapshot(&self) -> Option<&PortfolioView> {
        self.snapshot.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

/// A fetch panel whose responses are ordered by issue sequence.
#[derive(Clone, Debug)]
pub struct SequencedPanel<T> {
    sequencer: RequestSequencer,
    state: FetchState<T>,
}

impl<T> Default for SequencedPanel<T> {
    fn default() -> Self {
        Self {
            sequencer: RequestSequencer::default(),
            state: FetchState::Idle,
        }
    }
}

impl<T> SequencedPanel<T> {
    pub fn begin(&mut self) -> RequestSeq {
        self.state = FetchState::Loading;
        self.sequencer.issue()
    }

    /// Only the most recently issued request may replace the panel.
    pub fn complete(&mut self, seq: RequestSeq, result: Result<T, DashboardError>) -> ApplyOutcome {
        if !self.sequencer.is_current(seq) {
            return ApplyOutcome::Stale;
        }
        self.sequencer.mark_applied(seq);
        match result {
            Ok(value) => {
                self.state = FetchState::Success(value);
                ApplyOutcome::Applied
            }
            Err(err) => {
                self.state = FetchState::Failed(err.to_string());
                ApplyOutcome::Failed
            }
        }
    }

    pub fn state(&self) -> &FetchState<T> {
        &self.state
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Error,
}

/// Uniform user-facing message: a title plus a body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Success,
            title: "Success".to_string(),
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Error,
            title: "Error".to_string(),
            message: message.into(),
        }
    }

    /// Wraps a failure with the operation it came from, e.g. "Failed to load portfolio".
    pub fn from_error(context: Option<&str>, err: &DashboardError) -> Self {
        match (context, err) {
            (_, DashboardError::Validation(message)) => Self::error(message.clone()),
            (Some(context), other) => Self::error(format!("{}: {}", context, other)),
            (None, other) => Self::error(other.to_string()),
        }
    }
}

/// The analysis pair shown side by side; both sides fail together.
#[derive(Clone, Debug, PartialEq)]
pub struct SymbolAnalysis {
    pub analysis: AnalysisView,
    pub decision: AgentDecisionView,
}

/// Editable trade form. Numeric fields are raw text until submitted.
#[derive(Clone, Debug, PartialEq)]
pub struct TradeForm {
    pub symbol: String,
    pub action: TradeAction,
    pub quantity: String,
    pub price: String,
}

impl Default for TradeForm {
    fn default() -> Self {
        Self {
            symbol: String::new(),
            action: TradeAction::Buy,
            quantity: String::new(),
            price: String::new(),
        }
    }
}

impl TradeForm {
    /// Pre-fills a SELL of the whole holding; price is left for the user.
    pub fn quick_sell(symbol: &str, quantity: f64) -> Self {
        Self {
            symbol: symbol.to_string(),
            action: TradeAction::Sell,
            quantity: quantity.to_string(),
            price: String::new(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// All client-side state, owned by whoever drives the reconciler.
#[derive(Clone, Debug, Default)]
pub struct ViewState {
    pub current_symbol: Option<String>,
    pub analysis: SequencedPanel<SymbolAnalysis>,
    pub portfolio: PortfolioStore,
    pub logs: SequencedPanel<LogsView>,
    pub health: SequencedPanel<HealthView>,
    pub trade_form: TradeForm,
    pub notification: Option<Notification>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(cash: &str) -> PortfolioView {
        PortfolioView {
            cash: cash.to_string(),
            profit_loss: "$0.00".to_string(),
            profit_loss_raw: 0.0,
            total_positions: 0,
            holdings: Vec::new(),
            recent_trades: Vec::new(),
        }
    }

    #[test]
    fn failed_load_keeps_previous_snapshot() {
        let mut store = PortfolioStore::default();
        let first = store.begin();
        assert_eq!(store.complete(first, Ok(view("$10.00"))), ApplyOutcome::Applied);

        let second = store.begin();
        let outcome = store.complete(second, Err(DashboardError::server("x")));
        assert_eq!(outcome, ApplyOutcome::Failed);
        assert_eq!(store.snapshot().map(|v| v.cash.as_str()), Some("$10.00"));
        assert_eq!(store.last_error(), Some("x"));
        assert!(!store.is_loading());
    }

    #[test]
    fn slow_older_response_cannot_overwrite_newer_one() {
        let mut store = PortfolioStore::default();
        let slow = store.begin();
        let fast = store.begin();

        assert_eq!(store.complete(fast, Ok(view("$2.00"))), ApplyOutcome::Applied);
        assert_eq!(store.complete(slow, Ok(view("$1.00"))), ApplyOutcome::Stale);
        assert_eq!(store.snapshot().map(|v| v.cash.as_str()), Some("$2.00"));
    }

    #[test]
    fn older_response_still_applies_when_nothing_newer_landed() {
        let mut store = PortfolioStore::default();
        let first = store.begin();
        let _second = store.begin();

        assert_eq!(store.complete(first, Ok(view("$1.00"))), ApplyOutcome::Applied);
        assert!(store.is_loading());
    }

    #[test]
    fn panel_only_accepts_latest_request() {
        let mut panel: SequencedPanel<u32> = SequencedPanel::default();
        let old = panel.begin();
        let new = panel.begin();
        assert_eq!(panel.complete(old, Ok(1)), ApplyOutcome::Stale);
        assert!(panel.state().is_loading());
        assert_eq!(panel.complete(new, Err(DashboardError::transport("timeout"))), ApplyOutcome::Failed);
        assert_eq!(panel.state().failure(), Some("timeout"));
    }

    #[test]
    fn notifications_prefix_context_except_for_validation() {
        let n = Notification::from_error(Some("Failed to load portfolio"), &DashboardError::server("x"));
        assert_eq!(n.title, "Error");
        assert_eq!(n.message, "Failed to load portfolio: x");

        let v = Notification::from_error(Some("Failed to execute trade"), &DashboardError::validation("Please fill in all fields"));
        assert_eq!(v.message, "Please fill in all fields");
    }

    #[test]
    fn quick_sell_prefills_sell_without_price() {
        let form = TradeForm::quick_sell("AAPL", 10.0);
        assert_eq!(form.action, TradeAction::Sell);
        assert_eq!(form.quantity, "10");
        assert!(form.price.is_empty());
    }
}
