use crate::dashboard::{
    self, LoadOrigin, ViewStateReconciler, run_analysis, run_health_check, run_logs_load, run_portfolio_load,
    run_trade,
};
use crate::error::DashboardResult;
use crate::format::format_instant;
use crate::models::TradeRequest;
use crate::refresh::spawn_refresh_timer;
use crate::state::{ApplyOutcome, RequestSeq, SymbolAnalysis, TradeForm, ViewState};
use crate::views::{HealthView, LogsView, PortfolioView};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::io;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Section {
    Dashboard,
    Portfolio,
    Trade,
    Logs,
}

impl Section {
    pub const ALL: [Section; 4] = [Section::Dashboard, Section::Portfolio, Section::Trade, Section::Logs];

    pub fn title(self) -> &'static str {
        match self {
            Self::Dashboard => "Dashboard",
            Self::Portfolio => "Portfolio",
            Self::Trade => "Trade",
            Self::Logs => "Logs",
        }
    }

    pub fn index(self) -> usize {
        Self::ALL.iter().position(|s| *s == self).unwrap_or(0)
    }

    fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    fn previous(self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TradeField {
    Symbol,
    Action,
    Quantity,
    Price,
}

impl TradeField {
    pub const ALL: [TradeField; 4] = [TradeField::Symbol, TradeField::Action, TradeField::Quantity, TradeField::Price];

    fn next(self) -> Self {
        match self {
            Self::Symbol => Self::Action,
            Self::Action => Self::Quantity,
            Self::Quantity => Self::Price,
            Self::Price => Self::Symbol,
        }
    }

    fn previous(self) -> Self {
        match self {
            Self::Symbol => Self::Price,
            Self::Action => Self::Symbol,
            Self::Quantity => Self::Action,
            Self::Price => Self::Quantity,
        }
    }
}

/// Results from spawned requests and timer ticks, drained once per frame.
#[derive(Clone, Debug)]
pub enum DashboardEvent {
    RefreshTick,
    Analysis {
        seq: RequestSeq,
        symbol: String,
        result: DashboardResult<SymbolAnalysis>,
    },
    Portfolio {
        seq: RequestSeq,
        origin: LoadOrigin,
        result: DashboardResult<PortfolioView>,
    },
    Trade {
        request: TradeRequest,
        result: DashboardResult<String>,
    },
    Logs {
        seq: RequestSeq,
        result: DashboardResult<LogsView>,
    },
    Health {
        seq: RequestSeq,
        result: DashboardResult<HealthView>,
    },
}

pub struct App {
    pub should_quit: bool,
    pub section: Section,
    pub symbol_input: String,
    pub trade_field: TradeField,
    pub selected_holding: usize,
    pub trade_in_flight: bool,
    pub last_refresh: Option<String>,
    pub status_line: Option<String>,
    refresh_interval: Duration,
    reconciler: ViewStateReconciler,
    event_tx: UnboundedSender<DashboardEvent>,
    event_rx: UnboundedReceiver<DashboardEvent>,
}

impl App {
    pub fn new(reconciler: ViewStateReconciler) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let refresh_interval = reconciler.api().config().refresh_interval;
        Self {
            should_quit: false,
            section: Section::Dashboard,
            symbol_input: String::new(),
            trade_field: TradeField::Symbol,
            selected_holding: 0,
            trade_in_flight: false,
            last_refresh: None,
            status_line: None,
            refresh_interval,
            reconciler,
            event_tx,
            event_rx,
        }
    }

    pub fn view(&self) -> &ViewState {
        self.reconciler.state()
    }

    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    pub async fn run(&mut self, terminal: &mut crate::tui::Tui) -> io::Result<()> {
        let timer = self.start();

        while !self.should_quit {
            self.drain_events();
            terminal.draw(|f| crate::ui::render(f, self))?;

            if event::poll(Duration::from_millis(16))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key(key);
                    }
                }
            }
        }

        timer.abort();
        Ok(())
    }

    /// Initial loads plus the periodic portfolio timer.
    fn start(&mut self) -> JoinHandle<()> {
        info!("Dashboard started; portfolio refresh every {}s", self.refresh_interval.as_secs());
        self.spawn_portfolio_load(LoadOrigin::User);
        self.spawn_health_check();
        spawn_refresh_timer(self.refresh_interval, self.event_tx.clone(), DashboardEvent::RefreshTick)
    }

    pub fn drain_events(&mut self) {
        while let Ok(event) = self.event_rx.try_recv() {
            self.apply_event(event);
        }
    }

    pub fn apply_event(&mut self, event: DashboardEvent) {
        match event {
            DashboardEvent::RefreshTick => self.spawn_portfolio_load(LoadOrigin::Background),
            DashboardEvent::Analysis { seq, symbol, result } => {
                self.reconciler.finish_analysis(seq, &symbol, result);
            }
            DashboardEvent::Portfolio { seq, origin, result } => {
                match self.reconciler.apply_portfolio(seq, origin, result) {
                    Ok(ApplyOutcome::Applied) => {
                        self.last_refresh = Some(format_instant(&chrono::Local::now(), self.reconciler.display_tz()));
                        self.status_line = None;
                        self.clamp_holding_selection();
                    }
                    Ok(_) => {}
                    Err(err) if origin == LoadOrigin::Background => {
                        self.status_line = Some(format!("Auto-refresh failed: {}", err));
                    }
                    Err(_) => {}
                }
            }
            DashboardEvent::Trade { request, result } => {
                self.trade_in_flight = false;
                if self.reconciler.finish_trade(&request, result) {
                    self.trade_field = TradeField::Symbol;
                    self.spawn_portfolio_load(LoadOrigin::User);
                }
            }
            DashboardEvent::Logs { seq, result } => {
                if let Err(err) = &result {
                    warn!("Error loading logs: {}", err);
                }
                self.reconciler.state_mut().logs.complete(seq, result);
            }
            DashboardEvent::Health { seq, result } => {
                self.reconciler.state_mut().health.complete(seq, result);
            }
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }

        if self.view().notification.is_some() {
            if matches!(key.code, KeyCode::Esc | KeyCode::Enter | KeyCode::Char(' ')) {
                self.reconciler.take_notification();
            }
            return;
        }

        match key.code {
            KeyCode::Esc if self.section == Section::Trade => {
                self.section = Section::Dashboard;
                return;
            }
            KeyCode::Esc => {
                self.should_quit = true;
                return;
            }
            KeyCode::Tab => {
                self.show_section(self.section.next());
                return;
            }
            KeyCode::BackTab => {
                self.show_section(self.section.previous());
                return;
            }
            _ => {}
        }

        match self.section {
            Section::Dashboard => self.handle_dashboard_key(key.code),
            Section::Portfolio => self.handle_portfolio_key(key.code),
            Section::Trade => self.handle_trade_key(key.code),
            Section::Logs => self.handle_logs_key(key.code),
        }
    }

    /// Switching to portfolio or logs reloads that section.
    pub fn show_section(&mut self, section: Section) {
        self.section = section;
        match section {
            Section::Portfolio => self.spawn_portfolio_load(LoadOrigin::User),
            Section::Logs => self.spawn_logs_load(),
            Section::Dashboard | Section::Trade => {}
        }
    }

    fn handle_dashboard_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char(c) => self.symbol_input.push(c),
            KeyCode::Backspace => {
                self.symbol_input.pop();
            }
            KeyCode::Enter => self.spawn_analysis(),
            _ => {}
        }
    }

    fn handle_portfolio_key(&mut self, code: KeyCode) {
        let holdings = self
            .view()
            .portfolio
            .snapshot()
            .map(|p| p.holdings.len())
            .unwrap_or(0);

        match code {
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected_holding = self.selected_holding.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.selected_holding + 1 < holdings {
                    self.selected_holding += 1;
                }
            }
            KeyCode::Char('r') => self.spawn_portfolio_load(LoadOrigin::User),
            KeyCode::Char('s') => self.quick_sell_selected(),
            KeyCode::Char('q') => self.should_quit = true,
            _ => {}
        }
    }

    fn handle_trade_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Up => self.trade_field = self.trade_field.previous(),
            KeyCode::Down => self.trade_field = self.trade_field.next(),
            KeyCode::Enter => self.submit_trade(),
            KeyCode::Left | KeyCode::Right | KeyCode::Char(' ') if self.trade_field == TradeField::Action => {
                let form = &mut self.reconciler.state_mut().trade_form;
                form.action = form.action.toggled();
            }
            KeyCode::Char(c) => {
                if let Some(field) = self.active_trade_text() {
                    field.push(c);
                }
            }
            KeyCode::Backspace => {
                if let Some(field) = self.active_trade_text() {
                    field.pop();
                }
            }
            _ => {}
        }
    }

    fn handle_logs_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('r') => self.spawn_logs_load(),
            KeyCode::Char('h') => self.spawn_health_check(),
            KeyCode::Char('q') => self.should_quit = true,
            _ => {}
        }
    }

    fn active_trade_text(&mut self) -> Option<&mut String> {
        let form: &mut TradeForm = &mut self.reconciler.state_mut().trade_form;
        match self.trade_field {
            TradeField::Symbol => Some(&mut form.symbol),
            TradeField::Quantity => Some(&mut form.quantity),
            TradeField::Price => Some(&mut form.price),
            TradeField::Action => None,
        }
    }

    fn quick_sell_selected(&mut self) {
        let symbol = self
            .view()
            .portfolio
            .snapshot()
            .and_then(|p| p.holdings.get(self.selected_holding))
            .map(|h| h.symbol.clone());

        if let Some(symbol) = symbol {
            if self.reconciler.quick_sell(&symbol).is_some() {
                self.section = Section::Trade;
                self.trade_field = TradeField::Price;
            }
        }
    }

    fn clamp_holding_selection(&mut self) {
        let len = self.view().portfolio.snapshot().map(|p| p.holdings.len()).unwrap_or(0);
        if self.selected_holding >= len {
            self.selected_holding = len.saturating_sub(1);
        }
    }

    fn spawn_analysis(&mut self) {
        let Ok((seq, symbol)) = self.reconciler.begin_analysis(&self.symbol_input) else {
            return;
        };
        let api = self.reconciler.api().clone();
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            let result = run_analysis(&api, &symbol).await;
            let _ = tx.send(DashboardEvent::Analysis { seq, symbol, result });
        });
    }

    fn spawn_portfolio_load(&mut self, origin: LoadOrigin) {
        let seq = self.reconciler.begin_portfolio();
        let api = self.reconciler.api().clone();
        let tz = self.reconciler.display_tz();
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            let result = run_portfolio_load(&api, tz).await;
            let _ = tx.send(DashboardEvent::Portfolio { seq, origin, result });
        });
    }

    fn spawn_logs_load(&mut self) {
        let seq = self.reconciler.state_mut().logs.begin();
        let api = self.reconciler.api().clone();
        let tz = self.reconciler.display_tz();
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            let result = run_logs_load(&api, tz).await;
            let _ = tx.send(DashboardEvent::Logs { seq, result });
        });
    }

    fn spawn_health_check(&mut self) {
        let seq = self.reconciler.state_mut().health.begin();
        let api = self.reconciler.api().clone();
        let tz = self.reconciler.display_tz();
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            let result = run_health_check(&api, tz).await;
            let _ = tx.send(DashboardEvent::Health { seq, result });
        });
    }

    fn submit_trade(&mut self) {
        if self.trade_in_flight {
            return;
        }
        let request = dashboard::trade_request_from_form(&self.view().trade_form);
        let Ok(request) = self.reconciler.begin_trade(request) else {
            return;
        };

        self.trade_in_flight = true;
        let api = self.reconciler.api().clone();
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            let result = run_trade(&api, &request).await;
            let _ = tx.send(DashboardEvent::Trade { request, result });
        });
    }
}
