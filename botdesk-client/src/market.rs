/// Poll-cycle and one-shot lookup flows over the REST surface
///
/// Periodic flows are fault-contained: any failed fetch leaves the previous
/// successful render undisturbed and logs the error. One-shot lookups
/// propagate failures to the caller for inline surfacing.

use crate::error::{DashError, Result};
use crate::poll::PollGate;
use crate::reconcile::Reconciler;
use crate::rest::BotApi;
use crate::types::{SentimentReport, TechnicalReport};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Validate and normalize a user-entered symbol
///
/// Rejected synchronously, before any request is made.
pub fn normalize_symbol(input: &str) -> Result<String> {
    let symbol = input.trim().to_uppercase();
    if symbol.is_empty()
        || symbol.len() > 10
        || !symbol.chars().all(|c| c.is_ascii_alphanumeric() || c == '.')
    {
        return Err(DashError::UserInput("please enter a valid symbol".into()));
    }
    Ok(symbol)
}

/// One market refresh cycle
///
/// The status gate comes first: a closed market sets the badge and issues no
/// snapshot or breadth calls for the cycle. Snapshot and breadth are fetched
/// independently so one failing leaves the other's previous render alone.
pub async fn refresh_market(
    api: Arc<dyn BotApi>,
    reconciler: Arc<Mutex<Reconciler>>,
    symbols: Vec<String>,
    gate: PollGate,
) {
    let status = match api.market_status().await {
        Ok(status) => status,
        Err(e) => {
            warn!("market status fetch failed: {}", e);
            return;
        }
    };
    if !gate.is_active() {
        debug!("discarding market status fetched after stop");
        return;
    }

    reconciler.lock().await.apply_market_session(status.is_open);
    if !status.is_open {
        debug!("market closed, skipping snapshot and breadth for this cycle");
        return;
    }

    match api.market_snapshot(&symbols).await {
        Ok(overview) => {
            if gate.is_active() {
                reconciler.lock().await.apply_market_overview(overview);
            }
        }
        Err(e) => warn!("market snapshot fetch failed: {}", e),
    }

    match api.market_breadth().await {
        Ok(breadth) => {
            if gate.is_active() {
                reconciler.lock().await.apply_breadth(breadth);
            }
        }
        Err(e) => warn!("market breadth fetch failed: {}", e),
    }
}

/// One recent-trades refresh cycle
pub async fn refresh_trades(api: Arc<dyn BotApi>, reconciler: Arc<Mutex<Reconciler>>, gate: PollGate) {
    match api.recent_trades().await {
        Ok(trades) => {
            if gate.is_active() {
                reconciler.lock().await.apply_trades(trades);
            }
        }
        Err(e) => warn!("trades fetch failed: {}", e),
    }
}

/// Initial REST hydration: summary, positions and trades fetched once at
/// startup so the page is populated before the first push event arrives.
/// Each fetch is independently fault-contained.
pub async fn hydrate(api: Arc<dyn BotApi>, reconciler: Arc<Mutex<Reconciler>>) {
    match api.portfolio_summary().await {
        Ok(snapshot) => reconciler.lock().await.apply_portfolio(snapshot),
        Err(e) => warn!("initial portfolio fetch failed: {}", e),
    }
    match api.positions().await {
        Ok(positions) => reconciler.lock().await.apply_positions(positions),
        Err(e) => warn!("initial positions fetch failed: {}", e),
    }
    match api.recent_trades().await {
        Ok(trades) => reconciler.lock().await.apply_trades(trades),
        Err(e) => warn!("initial trades fetch failed: {}", e),
    }
}

/// Technical lookup: indicator block and VWAP fetched concurrently, merged
/// into one report
pub async fn lookup_technical(api: &dyn BotApi, symbol: &str) -> Result<TechnicalReport> {
    let symbol = normalize_symbol(symbol)?;
    let (indicators, vwap) = tokio::join!(api.technical(&symbol), api.vwap(&symbol));
    Ok(TechnicalReport::merge(symbol, indicators?, vwap?))
}

/// Sentiment lookup for a user-entered symbol
pub async fn lookup_sentiment(api: &dyn BotApi, symbol: &str) -> Result<SentimentReport> {
    let symbol = normalize_symbol(symbol)?;
    api.test_sentiment(&symbol).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::MarketSession;
    use crate::types::{
        MarketBreadth, MarketOverview, MarketSnapshotEntry, MarketStatus, PortfolioSnapshot,
        PositionRecord, SettingsResponse, TechnicalIndicators, TradeRecord, VwapResponse,
    };
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;

    /// Stub transport recording which endpoints were hit
    struct StubApi {
        calls: StdMutex<Vec<&'static str>>,
        market_open: bool,
        fail_status: bool,
    }

    impl StubApi {
        fn new(market_open: bool) -> Self {
            Self {
                calls: StdMutex::new(Vec::new()),
                market_open,
                fail_status: false,
            }
        }

        fn failing_status() -> Self {
            Self {
                calls: StdMutex::new(Vec::new()),
                market_open: true,
                fail_status: true,
            }
        }

        fn record(&self, endpoint: &'static str) {
            self.calls.lock().unwrap().push(endpoint);
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }

        fn entry() -> MarketSnapshotEntry {
            MarketSnapshotEntry {
                price: 512.3,
                change_pct_points: 0.42,
                volume: 1_000_000,
                as_of: Utc.with_ymd_and_hms(2024, 6, 3, 19, 55, 0).unwrap(),
            }
        }
    }

    #[async_trait]
    impl BotApi for StubApi {
        async fn portfolio_summary(&self) -> Result<PortfolioSnapshot> {
            self.record("summary");
            Err(DashError::Validation("not stubbed".into()))
        }

        async fn positions(&self) -> Result<Vec<PositionRecord>> {
            self.record("positions");
            Ok(Vec::new())
        }

        async fn recent_trades(&self) -> Result<Vec<TradeRecord>> {
            self.record("trades");
            Ok(Vec::new())
        }

        async fn market_status(&self) -> Result<MarketStatus> {
            self.record("status");
            if self.fail_status {
                return Err(DashError::Validation("status unavailable".into()));
            }
            Ok(MarketStatus {
                is_open: self.market_open,
            })
        }

        async fn market_snapshot(&self, _symbols: &[String]) -> Result<MarketOverview> {
            self.record("snapshot");
            let mut overview = MarketOverview::new();
            overview.insert("SPY".to_string(), Self::entry());
            Ok(overview)
        }

        async fn market_breadth(&self) -> Result<MarketBreadth> {
            self.record("breadth");
            Ok(MarketBreadth {
                advancing: 300,
                declining: 200,
                top_gainers: Vec::new(),
                top_losers: Vec::new(),
            })
        }

        async fn technical(&self, _symbol: &str) -> Result<TechnicalIndicators> {
            self.record("technical");
            Ok(TechnicalIndicators {
                current_price: 100.0,
                sma_5: 99.5,
                sma_20: 97.0,
                rsi: 55.0,
                volume: 123_456,
            })
        }

        async fn vwap(&self, _symbol: &str) -> Result<VwapResponse> {
            self.record("vwap");
            Ok(VwapResponse { vwap: 99.8 })
        }

        async fn test_sentiment(&self, symbol: &str) -> Result<SentimentReport> {
            self.record("sentiment");
            Ok(SentimentReport {
                symbol: symbol.to_string(),
                sentiment_score: 0.4,
                tweet_count: 12,
                tweets: vec!["to the moon".to_string()],
            })
        }

        async fn update_settings(
            &self,
            _fields: &HashMap<String, String>,
        ) -> Result<SettingsResponse> {
            self.record("settings");
            Ok(SettingsResponse {
                status: "success".to_string(),
                config: None,
                message: None,
            })
        }
    }

    #[test]
    fn test_normalize_symbol() {
        assert_eq!(normalize_symbol(" aapl ").unwrap(), "AAPL");
        assert_eq!(normalize_symbol("brk.b").unwrap(), "BRK.B");
        assert!(normalize_symbol("").is_err());
        assert!(normalize_symbol("   ").is_err());
        assert!(normalize_symbol("AAPL; DROP").is_err());
        assert!(normalize_symbol("WAYTOOLONGSYMBOL").is_err());
    }

    #[tokio::test]
    async fn test_closed_market_issues_no_further_calls() {
        let api = Arc::new(StubApi::new(false));
        let reconciler = Arc::new(Mutex::new(Reconciler::new()));

        refresh_market(
            Arc::clone(&api) as Arc<dyn BotApi>,
            Arc::clone(&reconciler),
            vec!["SPY".to_string()],
            PollGate::always_active(),
        )
        .await;

        assert_eq!(api.calls(), vec!["status"]);
        let state = reconciler.lock().await.snapshot();
        assert_eq!(state.market.session, MarketSession::Closed);
        assert!(state.market.overview.is_empty());
    }

    #[tokio::test]
    async fn test_open_market_fetches_snapshot_and_breadth() {
        let api = Arc::new(StubApi::new(true));
        let reconciler = Arc::new(Mutex::new(Reconciler::new()));

        refresh_market(
            Arc::clone(&api) as Arc<dyn BotApi>,
            Arc::clone(&reconciler),
            vec!["SPY".to_string()],
            PollGate::always_active(),
        )
        .await;

        assert_eq!(api.calls(), vec!["status", "snapshot", "breadth"]);
        let state = reconciler.lock().await.snapshot();
        assert_eq!(state.market.session, MarketSession::Open);
        assert!(state.market.overview.contains_key("SPY"));
        assert_eq!(state.market.breadth.as_ref().unwrap().advancing, 300);
    }

    #[tokio::test]
    async fn test_status_failure_leaves_previous_render_undisturbed() {
        let reconciler = Arc::new(Mutex::new(Reconciler::new()));
        {
            let mut overview = MarketOverview::new();
            overview.insert("QQQ".to_string(), StubApi::entry());
            let mut guard = reconciler.lock().await;
            guard.apply_market_session(true);
            guard.apply_market_overview(overview);
        }

        let api = Arc::new(StubApi::failing_status());
        refresh_market(
            Arc::clone(&api) as Arc<dyn BotApi>,
            Arc::clone(&reconciler),
            vec!["QQQ".to_string()],
            PollGate::always_active(),
        )
        .await;

        assert_eq!(api.calls(), vec!["status"]);
        let state = reconciler.lock().await.snapshot();
        assert_eq!(state.market.session, MarketSession::Open);
        assert!(state.market.overview.contains_key("QQQ"));
    }

    #[tokio::test]
    async fn test_technical_lookup_merges_vwap() {
        let api = StubApi::new(true);
        let report = lookup_technical(&api, "aapl").await.unwrap();
        assert_eq!(report.symbol, "AAPL");
        assert_eq!(report.vwap, 99.8);
        assert_eq!(report.current_price, 100.0);
        assert_eq!(report.volume, 123_456);
    }

    #[tokio::test]
    async fn test_lookup_rejects_invalid_symbol_before_any_request() {
        let api = StubApi::new(true);
        assert!(matches!(
            lookup_sentiment(&api, "  ").await,
            Err(DashError::UserInput(_))
        ));
        assert!(matches!(
            lookup_technical(&api, "").await,
            Err(DashError::UserInput(_))
        ));
        // No endpoint was hit.
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_hydrate_is_fault_contained() {
        // Summary is stubbed to fail; positions and trades still land.
        let api = Arc::new(StubApi::new(true));
        let reconciler = Arc::new(Mutex::new(Reconciler::new()));
        hydrate(Arc::clone(&api) as Arc<dyn BotApi>, Arc::clone(&reconciler)).await;

        assert_eq!(api.calls(), vec!["summary", "positions", "trades"]);
        let state = reconciler.lock().await.snapshot();
        assert!(state.portfolio.current.is_none());
        assert_eq!(state.positions.rows(), Some(&[] as &[PositionRecord]));
    }
}
