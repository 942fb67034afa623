/// Render sinks: stateless projections of the dashboard state
///
/// Every function here reads an immutable [`DashboardState`] snapshot and
/// draws widgets; none of them mutates anything or talks to the network.

use botdesk_client::format::{
    format_currency, format_currency_opt, format_datetime, format_pct_points,
    format_pct_points_opt, format_ratio_pct, format_time_label, format_volume,
};
use botdesk_client::reconcile::{LookupPanel, MarketSession, PriceSeriesBuffer, TableBody};
use botdesk_client::{ConnectionState, DashboardState, SentimentReport, TechnicalReport};
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, List, ListItem, Paragraph, Row, Sparkline, Table, Wrap},
};

/// What the footer input line is currently collecting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Normal,
    /// Symbol for the technical/sentiment lookup
    Symbol,
    /// KEY=VALUE pairs for a settings update
    Settings,
}

/// Footer input and alert state, local to the page
#[derive(Debug, Default)]
pub struct PageInput {
    pub mode: InputMode,
    pub buffer: String,
    pub alert: Option<String>,
}

pub fn render(f: &mut Frame, state: &DashboardState, input: &PageInput) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(f.area());

    render_status_bar(f, chunks[0], state);

    let main = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(chunks[1]);

    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(9),
            Constraint::Percentage(50),
            Constraint::Min(0),
        ])
        .split(main[0]);

    render_portfolio_summary(f, left[0], state);
    render_positions(f, left[1], state);
    render_trades(f, left[2], state);

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(34),
            Constraint::Length(6),
            Constraint::Percentage(28),
            Constraint::Min(0),
        ])
        .split(main[1]);

    render_market(f, right[0], state);
    render_price_chart(f, right[1], state);
    render_technical(f, right[2], state);
    render_sentiment(f, right[3], state);

    render_footer(f, chunks[2], input);
}

fn pl_color(value: f64) -> Color {
    if value >= 0.0 { Color::Green } else { Color::Red }
}

fn render_status_bar(f: &mut Frame, area: Rect, state: &DashboardState) {
    let (symbol, color) = match state.connection {
        ConnectionState::Connected => ("●", Color::Green),
        ConnectionState::Connecting => ("◌", Color::Yellow),
        ConnectionState::Disconnected => ("○", Color::Red),
    };

    let mut spans = vec![
        Span::styled(
            format!(" {} {} ", symbol, state.connection.label()),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            " BOTDESK TRADING DASHBOARD ",
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ),
    ];
    if let Some(at) = state.last_update {
        spans.push(Span::styled(
            format!(" last event {} ", format_time_label(at)),
            Style::default().fg(Color::Cyan),
        ));
    }
    spans.push(Span::styled(
        " [Q]uit [S]tart [X]stop [/]symbol [:]settings ",
        Style::default().fg(Color::DarkGray),
    ));

    let paragraph = Paragraph::new(Line::from(spans))
        .block(Block::default().borders(Borders::ALL))
        .alignment(Alignment::Center);
    f.render_widget(paragraph, area);
}

fn render_portfolio_summary(f: &mut Frame, area: Rect, state: &DashboardState) {
    let block = Block::default()
        .title(" PORTFOLIO ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::White));

    let mut lines = Vec::new();

    // The banner replaces itself, never the numbers beneath it.
    if let Some(banner) = &state.portfolio.banner {
        lines.push(Line::from(Span::styled(
            format!(" Update Failed: {} ", banner),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )));
    } else if let Some(at) = state.portfolio.last_updated {
        lines.push(Line::from(Span::styled(
            format!(" Last updated: {} ", format_datetime(at)),
            Style::default().fg(Color::DarkGray),
        )));
    }

    match &state.portfolio.current {
        Some(summary) => {
            lines.push(Line::from(vec![
                Span::styled(" Portfolio Value: ", Style::default().fg(Color::Gray)),
                Span::styled(
                    format_currency(summary.portfolio_value),
                    Style::default()
                        .fg(Color::White)
                        .add_modifier(Modifier::BOLD),
                ),
            ]));
            lines.push(Line::from(vec![
                Span::styled(" Cash: ", Style::default().fg(Color::Gray)),
                Span::raw(format_currency(summary.cash)),
                Span::styled("   Buying Power: ", Style::default().fg(Color::Gray)),
                Span::raw(format_currency(summary.buying_power)),
            ]));
            lines.push(Line::from(vec![
                Span::styled(" Total P/L: ", Style::default().fg(Color::Gray)),
                Span::styled(
                    format_currency(summary.total_pl),
                    Style::default().fg(pl_color(summary.total_pl)),
                ),
            ]));
            lines.push(Line::from(vec![
                Span::styled(" Daily P/L: ", Style::default().fg(Color::Gray)),
                Span::styled(
                    format!(
                        "{} ({})",
                        format_currency(summary.daily_pl),
                        format_pct_points(summary.daily_pl_pct_points)
                    ),
                    Style::default().fg(pl_color(summary.daily_pl)),
                ),
            ]));
        }
        None => {
            if state.portfolio.banner.is_none() {
                lines.push(Line::from(Span::styled(
                    " Waiting for portfolio data...",
                    Style::default()
                        .fg(Color::DarkGray)
                        .add_modifier(Modifier::ITALIC),
                )));
            }
        }
    }

    let paragraph = Paragraph::new(lines).block(block);
    f.render_widget(paragraph, area);
}

fn render_positions(f: &mut Frame, area: Rect, state: &DashboardState) {
    let block = Block::default()
        .title(format!(" POSITIONS ({}) ", state.positions_count))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let widths = [
        Constraint::Length(8),
        Constraint::Length(9),
        Constraint::Length(11),
        Constraint::Length(11),
        Constraint::Length(13),
        Constraint::Min(18),
    ];
    let header = Row::new(["Symbol", "Qty", "Entry", "Price", "Value", "Unrealized P/L"]).style(
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    );

    let rows: Vec<Row> = match &state.positions {
        TableBody::Pending => vec![placeholder_row("Waiting for positions...", 6)],
        TableBody::Error(message) => vec![error_row(message, 6)],
        TableBody::Rows(positions) if positions.is_empty() => {
            vec![placeholder_row("No positions found", 6)]
        }
        TableBody::Rows(positions) => positions
            .iter()
            .map(|p| {
                Row::new(vec![
                    Cell::from(p.symbol.clone()),
                    Cell::from(format!("{}", p.quantity)),
                    Cell::from(format_currency(p.avg_entry_price)),
                    Cell::from(format_currency(p.current_price)),
                    Cell::from(format_currency(p.market_value)),
                    Cell::from(format!(
                        "{} ({})",
                        format_currency(p.unrealized_pl),
                        format_ratio_pct(p.unrealized_pl_ratio)
                    ))
                    .style(Style::default().fg(pl_color(p.unrealized_pl))),
                ])
            })
            .collect(),
    };

    let table = Table::new(rows, widths).header(header).block(block);
    f.render_widget(table, area);
}

fn render_trades(f: &mut Frame, area: Rect, state: &DashboardState) {
    let block = Block::default()
        .title(" RECENT TRADES ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::White));

    let widths = [
        Constraint::Length(20),
        Constraint::Length(8),
        Constraint::Length(5),
        Constraint::Length(9),
        Constraint::Length(11),
        Constraint::Length(13),
        Constraint::Min(10),
    ];
    let header = Row::new(["Time", "Symbol", "Side", "Qty", "Price", "Value", "P/L"]).style(
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    );

    let rows: Vec<Row> = match &state.trades {
        TableBody::Pending => vec![placeholder_row("Waiting for trades...", 7)],
        TableBody::Error(message) => vec![error_row(message, 7)],
        TableBody::Rows(trades) if trades.is_empty() => {
            vec![placeholder_row("No recent trades", 7)]
        }
        TableBody::Rows(trades) => trades
            .iter()
            .map(|t| {
                let side_color = if t.side.is_buy() {
                    Color::Green
                } else {
                    Color::Red
                };
                Row::new(vec![
                    Cell::from(format_datetime(t.timestamp)),
                    Cell::from(t.symbol.clone()),
                    Cell::from(t.side.as_str()).style(Style::default().fg(side_color)),
                    Cell::from(format!("{}", t.quantity)),
                    Cell::from(format_currency(t.price)),
                    Cell::from(format_currency(t.notional())),
                    Cell::from(format!(
                        "{} ({})",
                        format_currency_opt(t.pl),
                        format_pct_points_opt(t.pl_pct_points)
                    )),
                ])
            })
            .collect(),
    };

    let table = Table::new(rows, widths).header(header).block(block);
    f.render_widget(table, area);
}

fn render_market(f: &mut Frame, area: Rect, state: &DashboardState) {
    let block = Block::default()
        .title(" MARKET ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::White));

    let (session_color, session_label) = match state.market.session {
        MarketSession::Open => (Color::Green, "Market Open"),
        MarketSession::Closed => (Color::Red, "Market Closed"),
        MarketSession::Unknown => (Color::DarkGray, "Checking market status..."),
    };

    let mut lines = vec![Line::from(Span::styled(
        format!(" {} ", session_label),
        Style::default()
            .fg(session_color)
            .add_modifier(Modifier::BOLD),
    ))];

    let mut symbols: Vec<&String> = state.market.overview.keys().collect();
    symbols.sort();
    for symbol in symbols {
        let entry = &state.market.overview[symbol];
        let up = entry.change_pct_points >= 0.0;
        let arrow = if up { "▲" } else { "▼" };
        lines.push(Line::from(vec![
            Span::styled(
                format!(" {:<6}", symbol),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::raw(format!(" {:>10}", format_currency(entry.price))),
            Span::styled(
                format!(
                    " {} {}",
                    arrow,
                    format_pct_points(entry.change_pct_points.abs())
                ),
                Style::default().fg(if up { Color::Green } else { Color::Red }),
            ),
            Span::styled(
                format!("  vol {}", format_volume(entry.volume)),
                Style::default().fg(Color::Gray),
            ),
            Span::styled(
                format!("  {}", format_time_label(entry.as_of)),
                Style::default().fg(Color::DarkGray),
            ),
        ]));
    }

    if let Some(breadth) = &state.market.breadth {
        lines.push(Line::from(vec![
            Span::styled(" Advancing: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{}", breadth.advancing),
                Style::default().fg(Color::Green),
            ),
            Span::styled("  Declining: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{}", breadth.declining),
                Style::default().fg(Color::Red),
            ),
        ]));
        for (label, movers, color) in [
            ("Gainers", &breadth.top_gainers, Color::Green),
            ("Losers", &breadth.top_losers, Color::Red),
        ] {
            if movers.is_empty() {
                continue;
            }
            let listing = movers
                .iter()
                .take(3)
                .map(|m| format!("{} {:+.2}%", m.symbol, m.change_pct_points))
                .collect::<Vec<_>>()
                .join("  ");
            lines.push(Line::from(vec![
                Span::styled(format!(" {}: ", label), Style::default().fg(Color::Gray)),
                Span::styled(listing, Style::default().fg(color)),
            ]));
        }
    }

    let paragraph = Paragraph::new(lines).block(block).wrap(Wrap { trim: false });
    f.render_widget(paragraph, area);
}

/// Normalize the series into sparkline magnitudes
fn sparkline_data(series: &PriceSeriesBuffer) -> Vec<u64> {
    let values = series.values();
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let span = (max - min).max(f64::EPSILON);
    values
        .iter()
        .map(|v| (((v - min) / span) * 100.0) as u64 + 1)
        .collect()
}

fn render_price_chart(f: &mut Frame, area: Rect, state: &DashboardState) {
    let title = match (&state.price_symbol, state.price_series.back()) {
        (Some(symbol), Some(last)) => {
            format!(" PRICE {} ({}) ", symbol, format_currency(last.value))
        }
        _ => " PRICE ".to_string(),
    };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    if state.price_series.is_empty() {
        let waiting = Paragraph::new(Span::styled(
            "Waiting for price data...",
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
        ))
        .block(block)
        .alignment(Alignment::Center);
        f.render_widget(waiting, area);
        return;
    }

    let data = sparkline_data(&state.price_series);
    let sparkline = Sparkline::default()
        .data(&data)
        .style(Style::default().fg(Color::Cyan))
        .max(data.iter().max().copied().unwrap_or(100))
        .block(block);
    f.render_widget(sparkline, area);
}

fn render_technical(f: &mut Frame, area: Rect, state: &DashboardState) {
    let block = Block::default()
        .title(" TECHNICAL ANALYSIS ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::White));

    let lines = match &state.technical {
        LookupPanel::Idle => vec![hint_line("Press / and enter a symbol")],
        LookupPanel::Loading => vec![hint_line("Loading...")],
        LookupPanel::Failed(message) => vec![Line::from(Span::styled(
            format!(" Error: {} ", message),
            Style::default().fg(Color::Red),
        ))],
        LookupPanel::Ready(report) => technical_lines(report),
    };

    let paragraph = Paragraph::new(lines).block(block).wrap(Wrap { trim: false });
    f.render_widget(paragraph, area);
}

fn technical_lines(report: &TechnicalReport) -> Vec<Line<'static>> {
    let trend_color = if report.current_price >= report.sma_20 {
        Color::Green
    } else {
        Color::Red
    };
    vec![
        Line::from(Span::styled(
            format!(" {} ", report.symbol),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(vec![
            Span::styled(" Current Price: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format_currency(report.current_price),
                Style::default().fg(trend_color),
            ),
        ]),
        Line::from(vec![
            Span::styled(" SMA(5): ", Style::default().fg(Color::Gray)),
            Span::raw(format_currency(report.sma_5)),
            Span::styled("   SMA(20): ", Style::default().fg(Color::Gray)),
            Span::raw(format_currency(report.sma_20)),
        ]),
        Line::from(vec![
            Span::styled(" RSI: ", Style::default().fg(Color::Gray)),
            Span::raw(format!("{:.2}", report.rsi)),
            Span::styled("   VWAP: ", Style::default().fg(Color::Gray)),
            Span::raw(format_currency(report.vwap)),
        ]),
        Line::from(vec![
            Span::styled(" Volume: ", Style::default().fg(Color::Gray)),
            Span::raw(format_volume(report.volume)),
        ]),
    ]
}

fn render_sentiment(f: &mut Frame, area: Rect, state: &DashboardState) {
    let block = Block::default()
        .title(" SENTIMENT ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::White));

    match &state.sentiment {
        LookupPanel::Idle => {
            let paragraph =
                Paragraph::new(vec![hint_line("Press / and enter a symbol")]).block(block);
            f.render_widget(paragraph, area);
        }
        LookupPanel::Loading => {
            let paragraph = Paragraph::new(vec![hint_line("Loading...")]).block(block);
            f.render_widget(paragraph, area);
        }
        LookupPanel::Failed(message) => {
            let paragraph = Paragraph::new(Line::from(Span::styled(
                format!(" Error: {} ", message),
                Style::default().fg(Color::Red),
            )))
            .block(block);
            f.render_widget(paragraph, area);
        }
        LookupPanel::Ready(report) => render_sentiment_report(f, area, block, report),
    }
}

fn render_sentiment_report(f: &mut Frame, area: Rect, block: Block, report: &SentimentReport) {
    let score_color = if report.sentiment_score > 0.2 {
        Color::Green
    } else if report.sentiment_score < -0.2 {
        Color::Red
    } else {
        Color::Yellow
    };

    let mut items = vec![
        ListItem::new(Line::from(vec![
            Span::styled(
                format!(" {} ", report.symbol),
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!("score {:+.2}", report.sentiment_score),
                Style::default()
                    .fg(score_color)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!("  ({} tweets)", report.tweet_count),
                Style::default().fg(Color::Gray),
            ),
        ])),
    ];

    let visible = area.height.saturating_sub(3) as usize;
    let width = area.width.saturating_sub(4) as usize;
    for tweet in report.tweets.iter().take(visible) {
        // Truncate by characters, not bytes; tweets are rarely ASCII-only.
        let mut text: String = tweet.chars().take(width).collect();
        if text.len() < tweet.len() {
            text.push('…');
        }
        items.push(ListItem::new(Line::from(Span::styled(
            format!("  {}", text),
            Style::default().fg(Color::Gray),
        ))));
    }

    let list = List::new(items).block(block);
    f.render_widget(list, area);
}

fn render_footer(f: &mut Frame, area: Rect, input: &PageInput) {
    let line = match input.mode {
        InputMode::Symbol => Line::from(vec![
            Span::styled(" symbol> ", Style::default().fg(Color::Cyan)),
            Span::raw(input.buffer.clone()),
            Span::styled("█", Style::default().fg(Color::Cyan)),
        ]),
        InputMode::Settings => Line::from(vec![
            Span::styled(" settings> ", Style::default().fg(Color::Yellow)),
            Span::raw(input.buffer.clone()),
            Span::styled("█", Style::default().fg(Color::Yellow)),
        ]),
        InputMode::Normal => match &input.alert {
            Some(alert) => {
                let color = if alert.starts_with("Error") || alert.starts_with("invalid") {
                    Color::Red
                } else {
                    Color::Green
                };
                Line::from(Span::styled(format!(" {} ", alert), Style::default().fg(color)))
            }
            None => Line::from(Span::styled(
                " / symbol lookup   : KEY=VALUE settings   s/x bot control ",
                Style::default().fg(Color::DarkGray),
            )),
        },
    };

    let paragraph = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
    f.render_widget(paragraph, area);
}

fn placeholder_row(text: &str, columns: usize) -> Row<'static> {
    let mut cells = vec![
        Cell::from(text.to_string()).style(
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
        ),
    ];
    cells.resize(columns, Cell::from(""));
    Row::new(cells)
}

fn error_row(message: &str, columns: usize) -> Row<'static> {
    let mut cells = vec![
        Cell::from(format!("Error: {}", message)).style(Style::default().fg(Color::Red)),
    ];
    cells.resize(columns, Cell::from(""));
    Row::new(cells)
}

fn hint_line(text: &str) -> Line<'static> {
    Line::from(Span::styled(
        format!(" {} ", text),
        Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::ITALIC),
    ))
}
