use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Gauge, List, ListItem, Paragraph, Row, Table, Tabs, Wrap},
    Frame,
};
use crate::app::{App, Section, TradeField};
use crate::models::{Recommendation, TradeAction};
use crate::state::{FetchState, NotificationKind};
use crate::views::{
    AgentDecisionView, AnalysisView, ConfidenceTier, ConfidenceView, LogTone, LogsView, NO_HOLDINGS_MESSAGE,
    NO_LOGS_MESSAGE, NO_RECENT_TRADES_MESSAGE,
};

pub fn render(f: &mut Frame, app: &App) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(f.area());

    render_header(f, app, layout[0]);

    match app.section {
        Section::Dashboard => render_dashboard(f, app, layout[1]),
        Section::Portfolio => render_portfolio(f, app, layout[1]),
        Section::Trade => render_trade(f, app, layout[1]),
        Section::Logs => render_logs(f, app, layout[1]),
    }

    render_footer(f, app, layout[2]);
    render_notification(f, app);
}

fn render_header(f: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(40), Constraint::Length(34)])
        .split(area);

    let titles: Vec<Line> = Section::ALL.iter().map(|s| Line::from(s.title())).collect();
    let tabs = Tabs::new(titles)
        .select(app.section.index())
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(Span::styled(" TradeDesk ", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))),
        )
        .highlight_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD));
    f.render_widget(tabs, chunks[0]);

    let health = match app.view().health.state() {
        FetchState::Success(h) if h.all_up() => Span::styled(format!("API {}", h.status), Style::default().fg(Color::Green)),
        FetchState::Success(h) => Span::styled(format!("API {} (degraded)", h.status), Style::default().fg(Color::Yellow)),
        FetchState::Failed(_) => Span::styled("API unreachable", Style::default().fg(Color::Red)),
        FetchState::Loading => Span::styled("API ...", Style::default().fg(Color::Gray)),
        FetchState::Idle => Span::styled("API ?", Style::default().fg(Color::Gray)),
    };
    let mut spans = vec![health];
    if let Some(symbol) = &app.view().current_symbol {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(symbol.clone(), Style::default().fg(Color::White).add_modifier(Modifier::BOLD)));
    }

    let status = Paragraph::new(Line::from(spans))
        .alignment(Alignment::Right)
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(status, chunks[1]);
}

fn render_footer(f: &mut Frame, app: &App, area: Rect) {
    let hint = match app.section {
        Section::Dashboard => "type symbol | Enter: analyze | Tab: next | Esc: quit",
        Section::Portfolio => "Up/Down: select | s: quick sell | r: reload | Tab: next | q/Esc: quit",
        Section::Trade => "Up/Down: field | Left/Right: action | Enter: submit | Tab: next | Esc: back",
        Section::Logs => "r: reload | h: health | Tab: next | q/Esc: quit",
    };

    let mut spans = vec![
        Span::styled(" Controls: ", Style::default().fg(Color::Gray)),
        Span::styled(hint, Style::default().fg(Color::White)),
    ];

    if let Some(status) = &app.status_line {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(status.clone(), Style::default().fg(Color::Yellow)));
    } else if let Some(at) = &app.last_refresh {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(
            format!("refreshed {} (every {}s)", at, app.refresh_interval().as_secs()),
            Style::default().fg(Color::DarkGray),
        ));
    }

    let footer = Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL));
    f.render_widget(footer, area);
}

fn recommendation_color(rec: Recommendation) -> Color {
    if rec.is_bullish() {
        Color::Green
    } else if rec.is_bearish() {
        Color::Red
    } else {
        Color::Yellow
    }
}

fn tier_color(tier: ConfidenceTier) -> Color {
    match tier {
        ConfidenceTier::High => Color::Green,
        ConfidenceTier::Medium => Color::Yellow,
        ConfidenceTier::Low => Color::Red,
    }
}

fn confidence_gauge<'a>(title: &'a str, confidence: &ConfidenceView) -> Gauge<'a> {
    Gauge::default()
        .block(Block::default().title(title).borders(Borders::ALL))
        .gauge_style(Style::default().fg(tier_color(confidence.tier)))
        .ratio(confidence.ratio)
        .label(format!("{} ({})", confidence.percent, confidence.tier.as_str()))
}

fn placeholder(f: &mut Frame, area: Rect, title: &str, text: &str, color: Color) {
    let p = Paragraph::new(Line::from(Span::styled(text.to_string(), Style::default().fg(color))))
        .alignment(Alignment::Center)
        .block(Block::default().title(title.to_string()).borders(Borders::ALL));
    f.render_widget(p, area);
}

fn render_dashboard(f: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(area);

    let input = Paragraph::new(Line::from(vec![
        Span::styled(app.symbol_input.clone(), Style::default().fg(Color::Yellow)),
        Span::styled("_", Style::default().fg(Color::Gray).add_modifier(Modifier::SLOW_BLINK)),
    ]))
    .block(Block::default().title(" Symbol ").borders(Borders::ALL));
    f.render_widget(input, chunks[0]);

    let panel = app.view().analysis.state();
    if let Some(result) = panel.success() {
        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(chunks[1]);
        render_analysis(f, &result.analysis, cols[0]);
        render_agents(f, &result.decision, cols[1]);
    } else if let Some(message) = panel.failure() {
        placeholder(f, chunks[1], " Analysis ", &format!("Error: {}", message), Color::Red);
    } else if panel.is_loading() {
        placeholder(f, chunks[1], " Analysis ", "Loading analysis...", Color::Gray);
    } else {
        placeholder(f, chunks[1], " Analysis ", "Enter a symbol and press Enter", Color::Gray);
    }
}

fn render_analysis(f: &mut Frame, view: &AnalysisView, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Length(3), Constraint::Min(0)])
        .split(area);

    let rec = Paragraph::new(Line::from(vec![
        Span::styled(format!("{} ", view.symbol), Style::default().add_modifier(Modifier::BOLD)),
        Span::styled(
            view.recommendation.as_str(),
            Style::default().fg(recommendation_color(view.recommendation)).add_modifier(Modifier::BOLD),
        ),
    ]))
    .block(Block::default().title(" Technical Analysis ").borders(Borders::ALL));
    f.render_widget(rec, chunks[0]);

    f.render_widget(confidence_gauge(" Strength ", &view.confidence), chunks[1]);

    let mut lines: Vec<Line> = view
        .indicators
        .iter()
        .map(|row| {
            Line::from(vec![
                Span::styled(format!("{}: ", row.label), Style::default().fg(Color::Gray)),
                Span::styled(row.value.clone(), Style::default().fg(Color::White)),
            ])
        })
        .collect();
    if !view.signals.is_empty() {
        lines.push(Line::from(""));
        lines.extend(view.signals.iter().map(|s| Line::from(format!("- {}", s))));
    }

    let details = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(Block::default().title(" Indicators & Signals ").borders(Borders::ALL));
    f.render_widget(details, chunks[2]);
}

fn render_agents(f: &mut Frame, view: &AgentDecisionView, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Length(3), Constraint::Min(0)])
        .split(area);

    let rec = Paragraph::new(Line::from(vec![
        Span::styled("Consensus ", Style::default().fg(Color::Gray)),
        Span::styled(
            view.recommendation.as_str(),
            Style::default().fg(recommendation_color(view.recommendation)).add_modifier(Modifier::BOLD),
        ),
    ]))
    .block(Block::default().title(" Agent Decision ").borders(Borders::ALL));
    f.render_widget(rec, chunks[0]);

    f.render_widget(confidence_gauge(" Confidence ", &view.confidence), chunks[1]);

    let rows = view.agents.iter().map(|agent| {
        Row::new(vec![
            Cell::from(agent.agent.clone()),
            Cell::from(agent.recommendation.as_str())
                .style(Style::default().fg(recommendation_color(agent.recommendation))),
            Cell::from(agent.confidence.percent.clone()).style(Style::default().fg(tier_color(agent.confidence.tier))),
        ])
    });
    let table = Table::new(rows, [Constraint::Percentage(50), Constraint::Percentage(25), Constraint::Percentage(25)])
        .header(Row::new(vec!["Agent", "Call", "Conf."]).style(Style::default().fg(Color::Gray)))
        .block(Block::default().title(" Agents ").borders(Borders::ALL));
    f.render_widget(table, chunks[2]);
}

fn render_portfolio(f: &mut Frame, app: &App, area: Rect) {
    let store = &app.view().portfolio;
    let Some(view) = store.snapshot() else {
        let (text, color) = match store.last_error() {
            Some(err) => (format!("Error: {}", err), Color::Red),
            None => ("Loading portfolio...".to_string(), Color::Gray),
        };
        placeholder(f, area, " Portfolio ", &text, color);
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(area);

    let pnl_color = if view.profit_loss_raw >= 0.0 { Color::Green } else { Color::Red };
    let mut summary = vec![
        Span::styled("Cash ", Style::default().fg(Color::Gray)),
        Span::styled(view.cash.clone(), Style::default().fg(Color::White).add_modifier(Modifier::BOLD)),
        Span::raw(" | "),
        Span::styled("P/L ", Style::default().fg(Color::Gray)),
        Span::styled(view.profit_loss.clone(), Style::default().fg(pnl_color)),
        Span::raw(" | "),
        Span::styled(format!("Positions {}", view.total_positions), Style::default().fg(Color::Gray)),
    ];
    if store.is_loading() {
        summary.push(Span::styled(" (refreshing)", Style::default().fg(Color::DarkGray)));
    }
    let summary = Paragraph::new(Line::from(summary)).block(Block::default().title(" Summary ").borders(Borders::ALL));
    f.render_widget(summary, chunks[0]);

    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(chunks[1]);

    if view.holdings.is_empty() {
        placeholder(f, cols[0], " Holdings ", NO_HOLDINGS_MESSAGE, Color::Gray);
    } else {
        let rows = view.holdings.iter().enumerate().map(|(i, h)| {
            let style = if i == app.selected_holding {
                Style::default().fg(Color::Black).bg(Color::Cyan)
            } else {
                Style::default()
            };
            Row::new(vec![h.symbol.clone(), h.quantity_display.clone()]).style(style)
        });
        let table = Table::new(rows, [Constraint::Percentage(50), Constraint::Percentage(50)])
            .header(Row::new(vec!["Symbol", "Quantity"]).style(Style::default().fg(Color::Gray)))
            .block(Block::default().title(" Holdings ").borders(Borders::ALL));
        f.render_widget(table, cols[0]);
    }

    if view.recent_trades.is_empty() {
        placeholder(f, cols[1], " Recent Trades ", NO_RECENT_TRADES_MESSAGE, Color::Gray);
    } else {
        let items: Vec<ListItem> = view
            .recent_trades
            .iter()
            .map(|t| {
                let color = match t.action {
                    TradeAction::Buy => Color::Green,
                    TradeAction::Sell => Color::Red,
                };
                ListItem::new(Line::from(vec![
                    Span::styled(format!("{:<4} ", t.action.as_str()), Style::default().fg(color)),
                    Span::raw(format!("{} {} @ {} ", t.symbol, t.quantity, t.price)),
                    Span::styled(t.timestamp.clone(), Style::default().fg(Color::DarkGray)),
                ]))
            })
            .collect();
        let list = List::new(items).block(Block::default().title(" Recent Trades ").borders(Borders::ALL));
        f.render_widget(list, cols[1]);
    }
}

fn render_trade(f: &mut Frame, app: &App, area: Rect) {
    let form = &app.view().trade_form;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(0),
        ])
        .split(area);

    for (i, field) in TradeField::ALL.iter().enumerate() {
        let (title, value) = match field {
            TradeField::Symbol => (" Symbol ", form.symbol.clone()),
            TradeField::Action => (" Action ", format!("< {} >", form.action)),
            TradeField::Quantity => (" Quantity ", form.quantity.clone()),
            TradeField::Price => (" Price ", form.price.clone()),
        };
        let border = if *field == app.trade_field {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default().fg(Color::Gray)
        };
        let value_style = match (field, form.action) {
            (TradeField::Action, TradeAction::Buy) => Style::default().fg(Color::Green),
            (TradeField::Action, TradeAction::Sell) => Style::default().fg(Color::Red),
            _ => Style::default().fg(Color::White),
        };
        let p = Paragraph::new(Span::styled(value, value_style))
            .block(Block::default().title(title).borders(Borders::ALL).border_style(border));
        f.render_widget(p, chunks[i]);
    }

    let status = if app.trade_in_flight {
        Span::styled("Submitting trade...", Style::default().fg(Color::Yellow))
    } else {
        Span::styled("Press Enter to submit", Style::default().fg(Color::Gray))
    };
    f.render_widget(Paragraph::new(Line::from(status)).alignment(Alignment::Center), chunks[4]);
}

fn render_logs(f: &mut Frame, app: &App, area: Rect) {
    match app.view().logs.state() {
        FetchState::Idle | FetchState::Loading => placeholder(f, area, " Logs ", "Loading logs...", Color::Gray),
        FetchState::Failed(message) => placeholder(f, area, " Logs ", &format!("Error: {}", message), Color::Red),
        FetchState::Success(LogsView::Empty) => placeholder(f, area, " Logs ", NO_LOGS_MESSAGE, Color::Gray),
        FetchState::Success(LogsView::Entries(rows)) => {
            let rows = rows.iter().map(|row| {
                let color = match row.tone {
                    LogTone::Danger => Color::Red,
                    LogTone::Warning => Color::Yellow,
                    LogTone::Info => Color::Cyan,
                    LogTone::Plain => Color::White,
                };
                Row::new(vec![
                    Cell::from(row.timestamp.clone()).style(Style::default().fg(Color::DarkGray)),
                    Cell::from(row.level.clone()).style(Style::default().fg(color)),
                    Cell::from(row.module.clone()).style(Style::default().fg(Color::Gray)),
                    Cell::from(row.message.clone()),
                ])
            });
            let table = Table::new(
                rows,
                [Constraint::Length(24), Constraint::Length(9), Constraint::Length(16), Constraint::Min(20)],
            )
            .header(Row::new(vec!["Time", "Level", "Module", "Message"]).style(Style::default().fg(Color::Gray)))
            .block(Block::default().title(" System Logs ").borders(Borders::ALL));
            f.render_widget(table, area);
        }
    }
}

fn render_notification(f: &mut Frame, app: &App) {
    let Some(notification) = &app.view().notification else {
        return;
    };

    let color = match notification.kind {
        NotificationKind::Success => Color::Green,
        NotificationKind::Error => Color::Red,
    };

    let area = centered_rect(60, 7, f.area());
    let popup = Paragraph::new(vec![
        Line::from(Span::styled(notification.message.clone(), Style::default().fg(Color::White))),
        Line::from(""),
        Line::from(Span::styled("Enter/Esc to dismiss", Style::default().fg(Color::DarkGray))),
    ])
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: true })
    .block(
        Block::default()
            .title(format!(" {} ", notification.title))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(color)),
    );

    f.render_widget(Clear, area);
    f.render_widget(popup, area);
}

fn centered_rect(percent_x: u16, height: u16, r: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(height),
            Constraint::Min(0),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn popup_is_centered_inside_the_frame() {
        let frame = Rect::new(0, 0, 100, 40);
        let popup = centered_rect(60, 7, frame);
        assert_eq!(popup.height, 7);
        assert_eq!(popup.width, 60);
        assert_eq!(popup.x, 20);
    }

    #[test]
    fn colors_follow_direction_and_tier() {
        assert_eq!(recommendation_color(Recommendation::StrongBuy), Color::Green);
        assert_eq!(recommendation_color(Recommendation::Sell), Color::Red);
        assert_eq!(recommendation_color(Recommendation::Hold), Color::Yellow);
        assert_eq!(tier_color(ConfidenceTier::Medium), Color::Yellow);
    }
}
