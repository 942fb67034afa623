/// View reconciliation: the single owner of everything the dashboard shows
///
/// Push events and poll results arrive in arbitrary interleaved order. Every
/// apply call is an independently-ordered, idempotent overwrite of its slice
/// of state, guarded by freshness and shape checks, so a stale or malformed
/// payload can never clobber a good render. Render sinks read an immutable
/// [`DashboardState`] snapshot each draw tick and never mutate anything.

use crate::format;
use crate::types::{
    ConnectionState, MarketBreadth, MarketOverview, PortfolioSnapshot, PositionRecord, PricePoint,
    PushEnvelope, SentimentReport, TechnicalReport, TradeRecord,
};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use tracing::{debug, warn};

/// Fixed capacity of the price series fed to the chart sink
pub const PRICE_SERIES_CAPACITY: usize = 50;

/// One labelled point of the chart series
#[derive(Debug, Clone, PartialEq)]
pub struct PricePointEntry {
    pub label: String,
    pub value: f64,
}

/// Bounded (label, value) series; the oldest entry is evicted on overflow
#[derive(Debug, Clone, Default)]
pub struct PriceSeriesBuffer {
    points: VecDeque<PricePointEntry>,
}

impl PriceSeriesBuffer {
    pub fn push(&mut self, label: String, value: f64) {
        if self.points.len() >= PRICE_SERIES_CAPACITY {
            self.points.pop_front();
        }
        self.points.push_back(PricePointEntry { label, value });
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PricePointEntry> {
        self.points.iter()
    }

    pub fn front(&self) -> Option<&PricePointEntry> {
        self.points.front()
    }

    pub fn back(&self) -> Option<&PricePointEntry> {
        self.points.back()
    }

    /// Values only, oldest first, for the chart sink
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }
}

/// Body of a rendered table
///
/// Tables replace their body wholesale: valid rows, a not-yet-loaded
/// placeholder, or a full-row error. There is no partial merge.
#[derive(Debug, Clone, PartialEq)]
pub enum TableBody<T> {
    /// Nothing received yet
    Pending,
    /// Most recent valid payload (empty renders the "No ..." placeholder)
    Rows(Vec<T>),
    /// Replaced wholesale by an error row
    Error(String),
}

impl<T> TableBody<T> {
    pub fn rows(&self) -> Option<&[T]> {
        match self {
            TableBody::Rows(rows) => Some(rows.as_slice()),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            TableBody::Error(message) => Some(message.as_str()),
            _ => None,
        }
    }
}

impl<T> Default for TableBody<T> {
    fn default() -> Self {
        TableBody::Pending
    }
}

/// Ad-hoc lookup panel (technical analysis, sentiment test)
#[derive(Debug, Clone, PartialEq)]
pub enum LookupPanel<T> {
    Idle,
    Loading,
    Ready(T),
    /// One-shot failure surfaced inline
    Failed(String),
}

impl<T> Default for LookupPanel<T> {
    fn default() -> Self {
        LookupPanel::Idle
    }
}

/// Portfolio summary panel: last-good numbers plus an optional banner
///
/// A failed refresh replaces the banner, never the numbers.
#[derive(Debug, Clone, Default)]
pub struct PortfolioPanel {
    /// Most recent snapshot that carried `update_succeeded == true`
    pub current: Option<PortfolioSnapshot>,
    /// Error banner shown above the (still visible) last-good values
    pub banner: Option<String>,
    /// Timestamp of the last successful update, shown as the summary notice
    pub last_updated: Option<DateTime<Utc>>,
}

/// Market open/closed badge state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MarketSession {
    #[default]
    Unknown,
    Open,
    Closed,
}

impl MarketSession {
    pub fn label(&self) -> &'static str {
        match self {
            MarketSession::Unknown => "…",
            MarketSession::Open => "Market Open",
            MarketSession::Closed => "Market Closed",
        }
    }
}

/// Market overview panel
#[derive(Debug, Clone, Default)]
pub struct MarketPanel {
    pub session: MarketSession,
    /// Rebuilt wholesale each cycle; stale symbols drop out
    pub overview: MarketOverview,
    pub breadth: Option<MarketBreadth>,
}

/// Everything the render sinks project
#[derive(Debug, Clone, Default)]
pub struct DashboardState {
    pub connection: ConnectionState,
    pub portfolio: PortfolioPanel,
    pub positions: TableBody<PositionRecord>,
    /// Count badge next to the positions table
    pub positions_count: u32,
    pub trades: TableBody<TradeRecord>,
    pub market: MarketPanel,
    pub price_series: PriceSeriesBuffer,
    /// Symbol the price series currently tracks
    pub price_symbol: Option<String>,
    pub technical: LookupPanel<TechnicalReport>,
    pub sentiment: LookupPanel<SentimentReport>,
    pub last_update: Option<DateTime<Utc>>,
}

/// The reconciliation core
#[derive(Debug, Default)]
pub struct Reconciler {
    state: DashboardState,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Immutable copy for the render sinks
    pub fn snapshot(&self) -> DashboardState {
        self.state.clone()
    }

    /// Route one push envelope to its apply method
    ///
    /// Unknown events are ignored; a malformed payload surfaces as the typed
    /// error state of the affected view and never escapes.
    pub fn process_push(&mut self, envelope: PushEnvelope) {
        match envelope.event.as_str() {
            "portfolio_update" => {
                match serde_json::from_value::<PortfolioSnapshot>(envelope.data) {
                    Ok(snapshot) => self.apply_portfolio(snapshot),
                    Err(e) => {
                        warn!("malformed portfolio payload: {}", e);
                        self.state.portfolio.banner = Some(format!("Update failed: {}", e));
                    }
                }
            }
            "positions_update" => {
                match serde_json::from_value::<Vec<PositionRecord>>(envelope.data) {
                    Ok(positions) => self.apply_positions(positions),
                    Err(e) => {
                        warn!("malformed positions payload: {}", e);
                        self.state.positions = TableBody::Error(format!("Error updating positions: {}", e));
                    }
                }
            }
            "trades_update" => match serde_json::from_value::<Vec<TradeRecord>>(envelope.data) {
                Ok(trades) => self.apply_trades(trades),
                Err(e) => {
                    warn!("malformed trades payload: {}", e);
                    self.state.trades = TableBody::Error(format!("Error updating trades: {}", e));
                }
            },
            "price_update" => match serde_json::from_value::<PricePoint>(envelope.data) {
                Ok(point) => self.apply_price_point(&point.symbol, point.price, point.timestamp),
                Err(e) => debug!("malformed price point: {}", e),
            },
            "sentiment_update" => {
                match serde_json::from_value::<SentimentReport>(envelope.data) {
                    Ok(report) => self.apply_sentiment(report),
                    Err(e) => {
                        warn!("malformed sentiment payload: {}", e);
                        self.state.sentiment = LookupPanel::Failed(e.to_string());
                    }
                }
            }
            other => debug!("ignoring unknown push event: {}", other),
        }
        self.state.last_update = Some(Utc::now());
    }

    pub fn apply_connection_state(&mut self, connection: ConnectionState) {
        self.state.connection = connection;
    }

    /// Apply a portfolio summary snapshot
    ///
    /// Freshness: a snapshot older than the current one is discarded (equal
    /// timestamps supersede). `update_succeeded == false` never touches the
    /// numeric fields; it only replaces the banner.
    pub fn apply_portfolio(&mut self, snapshot: PortfolioSnapshot) {
        if !snapshot.update_succeeded {
            let reason = snapshot
                .error_message
                .unwrap_or_else(|| "portfolio update failed".to_string());
            warn!("portfolio update failed: {}", reason);
            self.state.portfolio.banner = Some(reason);
            return;
        }

        if let Some(current) = &self.state.portfolio.current {
            if snapshot.timestamp < current.timestamp {
                debug!(
                    "discarding stale portfolio snapshot ({} < {})",
                    snapshot.timestamp, current.timestamp
                );
                return;
            }
        }

        self.state.positions_count = snapshot.positions_count;
        self.state.portfolio.last_updated = Some(snapshot.timestamp);
        self.state.portfolio.banner = None;
        self.state.portfolio.current = Some(snapshot);
    }

    /// Full-replace of the positions table, largest market value first
    pub fn apply_positions(&mut self, mut positions: Vec<PositionRecord>) {
        positions.sort_by(|a, b| {
            b.market_value
                .partial_cmp(&a.market_value)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        self.state.positions_count = positions.len() as u32;
        self.state.positions = TableBody::Rows(positions);
    }

    /// Full-replace of the trades table, server (newest-first) order kept
    pub fn apply_trades(&mut self, trades: Vec<TradeRecord>) {
        self.state.trades = TableBody::Rows(trades);
    }

    pub fn apply_market_session(&mut self, is_open: bool) {
        self.state.market.session = if is_open {
            MarketSession::Open
        } else {
            MarketSession::Closed
        };
    }

    /// Wholesale rebuild of the overview mapping; symbols no longer present
    /// are dropped by the replacement
    pub fn apply_market_overview(&mut self, overview: MarketOverview) {
        self.state.market.overview = overview;
    }

    pub fn apply_breadth(&mut self, breadth: MarketBreadth) {
        self.state.market.breadth = Some(breadth);
    }

    /// Append one point to the bounded chart series
    ///
    /// No validity check beyond numeric coercion; a change of tracked symbol
    /// starts a fresh series.
    pub fn apply_price_point(&mut self, symbol: &str, value: f64, timestamp: DateTime<Utc>) {
        if !value.is_finite() {
            debug!("ignoring non-finite price point for {}", symbol);
            return;
        }
        if self.state.price_symbol.as_deref() != Some(symbol) {
            self.state.price_series = PriceSeriesBuffer::default();
            self.state.price_symbol = Some(symbol.to_string());
        }
        self.state
            .price_series
            .push(format::format_time_label(timestamp), value);
    }

    pub fn apply_sentiment(&mut self, report: SentimentReport) {
        self.state.sentiment = LookupPanel::Ready(report);
    }

    pub fn apply_technical(&mut self, report: TechnicalReport) {
        self.state.technical = LookupPanel::Ready(report);
    }

    /// Mark both lookup panels as loading for a new symbol
    pub fn begin_lookup(&mut self) {
        self.state.technical = LookupPanel::Loading;
        self.state.sentiment = LookupPanel::Loading;
    }

    /// Inline surfacing of a failed one-shot technical lookup
    pub fn fail_technical(&mut self, message: impl Into<String>) {
        self.state.technical = LookupPanel::Failed(message.into());
    }

    /// Inline surfacing of a failed one-shot sentiment lookup
    pub fn fail_sentiment(&mut self, message: impl Into<String>) {
        self.state.sentiment = LookupPanel::Failed(message.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MarketSnapshotEntry;
    use chrono::TimeZone;
    use serde_json::json;

    fn snapshot_at(value: f64, hour: u32) -> PortfolioSnapshot {
        PortfolioSnapshot {
            portfolio_value: value,
            cash: 2500.0,
            buying_power: 5000.0,
            total_pl: 120.0,
            daily_pl: 45.0,
            daily_pl_pct_points: 0.45,
            positions_count: 3,
            timestamp: Utc.with_ymd_and_hms(2024, 6, 3, hour, 0, 0).unwrap(),
            update_succeeded: true,
            error_message: None,
        }
    }

    fn position(symbol: &str, market_value: f64) -> PositionRecord {
        PositionRecord {
            symbol: symbol.to_string(),
            quantity: 10.0,
            avg_entry_price: 10.0,
            current_price: market_value / 10.0,
            market_value,
            unrealized_pl: 5.0,
            unrealized_pl_ratio: 0.05,
        }
    }

    #[test]
    fn test_positions_full_replace_sorted_by_market_value() {
        let mut reconciler = Reconciler::new();

        reconciler.apply_positions(vec![position("AAPL", 100.0), position("MSFT", 900.0)]);
        reconciler.apply_positions(vec![
            position("GOOG", 50.0),
            position("TSLA", 500.0),
            position("NVDA", 200.0),
        ]);

        let state = reconciler.snapshot();
        let symbols: Vec<&str> = state
            .positions
            .rows()
            .unwrap()
            .iter()
            .map(|p| p.symbol.as_str())
            .collect();
        // Only the most recent call's data, descending by market value.
        assert_eq!(symbols, vec!["TSLA", "NVDA", "GOOG"]);
        assert_eq!(state.positions_count, 3);
    }

    #[test]
    fn test_empty_positions_render_placeholder_and_zero_badge() {
        let mut reconciler = Reconciler::new();
        reconciler.apply_positions(vec![position("AAPL", 100.0)]);
        reconciler.apply_positions(Vec::new());

        let state = reconciler.snapshot();
        assert_eq!(state.positions.rows(), Some(&[] as &[PositionRecord]));
        assert_eq!(state.positions_count, 0);
    }

    #[test]
    fn test_failed_portfolio_update_preserves_numbers() {
        let mut reconciler = Reconciler::new();
        reconciler.apply_portfolio(snapshot_at(10000.0, 14));

        reconciler.apply_portfolio(PortfolioSnapshot {
            update_succeeded: false,
            error_message: Some("timeout".to_string()),
            ..snapshot_at(0.0, 15)
        });

        let state = reconciler.snapshot();
        let current = state.portfolio.current.as_ref().unwrap();
        assert_eq!(
            crate::format::format_currency(current.portfolio_value),
            "$10,000.00"
        );
        assert_eq!(state.portfolio.banner.as_deref(), Some("timeout"));
    }

    #[test]
    fn test_successful_update_clears_banner() {
        let mut reconciler = Reconciler::new();
        reconciler.apply_portfolio(PortfolioSnapshot {
            update_succeeded: false,
            error_message: Some("timeout".to_string()),
            ..snapshot_at(0.0, 14)
        });
        assert!(reconciler.snapshot().portfolio.banner.is_some());

        reconciler.apply_portfolio(snapshot_at(10500.0, 15));
        let state = reconciler.snapshot();
        assert!(state.portfolio.banner.is_none());
        assert_eq!(state.portfolio.current.unwrap().portfolio_value, 10500.0);
    }

    #[test]
    fn test_stale_portfolio_snapshot_discarded_equal_supersedes() {
        let mut reconciler = Reconciler::new();
        reconciler.apply_portfolio(snapshot_at(10000.0, 15));

        // Older timestamp: discarded.
        reconciler.apply_portfolio(snapshot_at(1.0, 14));
        assert_eq!(
            reconciler.snapshot().portfolio.current.as_ref().unwrap().portfolio_value,
            10000.0
        );

        // Equal timestamp: supersedes.
        reconciler.apply_portfolio(snapshot_at(10250.0, 15));
        assert_eq!(
            reconciler.snapshot().portfolio.current.as_ref().unwrap().portfolio_value,
            10250.0
        );
    }

    #[test]
    fn test_price_series_never_grows_beyond_capacity() {
        let mut reconciler = Reconciler::new();
        let base = Utc.with_ymd_and_hms(2024, 6, 3, 14, 0, 0).unwrap();

        for i in 0..51 {
            let at = base + chrono::Duration::seconds(i);
            reconciler.apply_price_point("AAPL", 100.0 + i as f64, at);
        }

        let state = reconciler.snapshot();
        assert_eq!(state.price_series.len(), PRICE_SERIES_CAPACITY);
        // The oldest entry has been evicted.
        assert_eq!(state.price_series.front().unwrap().value, 101.0);
        assert_eq!(state.price_series.back().unwrap().value, 150.0);
    }

    #[test]
    fn test_price_series_resets_on_symbol_change() {
        let mut reconciler = Reconciler::new();
        let at = Utc.with_ymd_and_hms(2024, 6, 3, 14, 0, 0).unwrap();

        reconciler.apply_price_point("AAPL", 100.0, at);
        reconciler.apply_price_point("AAPL", 101.0, at);
        reconciler.apply_price_point("MSFT", 400.0, at);

        let state = reconciler.snapshot();
        assert_eq!(state.price_symbol.as_deref(), Some("MSFT"));
        assert_eq!(state.price_series.values(), vec![400.0]);
    }

    #[test]
    fn test_non_finite_price_point_ignored() {
        let mut reconciler = Reconciler::new();
        let at = Utc.with_ymd_and_hms(2024, 6, 3, 14, 0, 0).unwrap();
        reconciler.apply_price_point("AAPL", f64::NAN, at);
        assert!(reconciler.snapshot().price_series.is_empty());
    }

    #[test]
    fn test_market_overview_rebuilt_wholesale() {
        let mut reconciler = Reconciler::new();
        let entry = MarketSnapshotEntry {
            price: 512.3,
            change_pct_points: 0.42,
            volume: 1_000_000,
            as_of: Utc.with_ymd_and_hms(2024, 6, 3, 19, 55, 0).unwrap(),
        };

        let mut first = MarketOverview::new();
        first.insert("SPY".to_string(), entry.clone());
        first.insert("QQQ".to_string(), entry.clone());
        reconciler.apply_market_overview(first);

        let mut second = MarketOverview::new();
        second.insert("DIA".to_string(), entry);
        reconciler.apply_market_overview(second);

        let state = reconciler.snapshot();
        // Stale symbols are gone.
        assert_eq!(state.market.overview.len(), 1);
        assert!(state.market.overview.contains_key("DIA"));
    }

    #[test]
    fn test_push_routing_and_malformed_payloads() {
        let mut reconciler = Reconciler::new();

        reconciler.process_push(PushEnvelope {
            event: "positions_update".to_string(),
            data: json!([{
                "symbol": "AAPL",
                "qty": 10.0,
                "avg_entry_price": 150.0,
                "current_price": 155.0,
                "market_value": 1550.0,
                "unrealized_pl": 50.0,
                "unrealized_plpc": 0.0333
            }]),
        });
        assert_eq!(reconciler.snapshot().positions.rows().unwrap().len(), 1);

        // Malformed payload: the table body becomes an error row; nothing
        // else is disturbed.
        reconciler.process_push(PushEnvelope {
            event: "positions_update".to_string(),
            data: json!({"not": "an array"}),
        });
        let state = reconciler.snapshot();
        assert!(state.positions.error().is_some());
        assert_eq!(state.trades, TableBody::Pending);

        // Unknown events are ignored.
        reconciler.process_push(PushEnvelope {
            event: "mystery_event".to_string(),
            data: json!(null),
        });
        assert!(reconciler.snapshot().positions.error().is_some());
    }

    #[test]
    fn test_malformed_portfolio_keeps_last_good_beneath_banner() {
        let mut reconciler = Reconciler::new();
        reconciler.apply_portfolio(snapshot_at(10000.0, 14));

        reconciler.process_push(PushEnvelope {
            event: "portfolio_update".to_string(),
            data: json!({"timestamp": "not a time"}),
        });

        let state = reconciler.snapshot();
        assert!(state.portfolio.banner.is_some());
        assert_eq!(state.portfolio.current.unwrap().portfolio_value, 10000.0);
    }

    #[test]
    fn test_trades_keep_server_order() {
        let mut reconciler = Reconciler::new();
        reconciler.process_push(PushEnvelope {
            event: "trades_update".to_string(),
            data: json!([
                {"timestamp": "2024-06-03T15:00:00Z", "symbol": "MSFT", "side": "SELL",
                 "qty": 5.0, "price": 420.5},
                {"timestamp": "2024-06-03T14:00:00Z", "symbol": "AAPL", "side": "buy",
                 "qty": 10.0, "price": 150.0}
            ]),
        });

        let state = reconciler.snapshot();
        let rows = state.trades.rows().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].symbol, "MSFT");
        assert_eq!(rows[1].symbol, "AAPL");
    }

    #[test]
    fn test_price_update_via_push_envelope() {
        let mut reconciler = Reconciler::new();
        reconciler.process_push(PushEnvelope {
            event: "price_update".to_string(),
            data: json!({"symbol": "AAPL", "price": 187.3, "timestamp": "2024-06-03T14:30:00Z"}),
        });

        let state = reconciler.snapshot();
        assert_eq!(state.price_series.values(), vec![187.3]);
        assert_eq!(state.price_series.front().unwrap().label, "14:30:00");
    }
}
