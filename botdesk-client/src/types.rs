/// Canonical snapshot schema for the dashboard.
///
/// Both payload sources (push channel and REST polling) are normalized into
/// these types at the edge. Field-name differences between producers
/// (`qty` vs `quantity`, `side` vs `action`) are absorbed here with serde
/// aliases so nothing downstream guesses a convention.
///
/// Percentage fields carry their unit in the name: `*_ratio` is on the
/// 0.0-1.0 scale, `*_pct_points` on the 0-100 scale. Each family has its own
/// formatter in [`crate::format`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Lifecycle state of the push channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    /// Display string for the status badge
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected => "Connected",
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

/// Envelope wrapping every push-channel message
///
/// This is the top-level structure for both directions: events received from
/// the server (`portfolio_update`, `positions_update`, ...) and commands
/// emitted by the client (`start_bot`, `stop_bot`, `request_initial_data`).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PushEnvelope {
    /// Event name, e.g. "portfolio_update"
    pub event: String,
    /// Event-specific payload (deserialize based on `event`)
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Commands the dashboard emits over the push channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCommand {
    StartBot,
    StopBot,
    RequestInitialData,
}

impl ClientCommand {
    pub fn event_name(&self) -> &'static str {
        match self {
            ClientCommand::StartBot => "start_bot",
            ClientCommand::StopBot => "stop_bot",
            ClientCommand::RequestInitialData => "request_initial_data",
        }
    }

    /// Wrap into the wire envelope
    pub fn envelope(&self) -> PushEnvelope {
        PushEnvelope {
            event: self.event_name().to_string(),
            data: serde_json::Value::Null,
        }
    }
}

/// Order side (Buy or Sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Convert to display string
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }

    /// Check if this is a buy order
    pub fn is_buy(&self) -> bool {
        matches!(self, Side::Buy)
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// Producers disagree on casing ("buy" vs "BUY"), so parsing is
// case-insensitive.
impl<'de> Deserialize<'de> for Side {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        match raw.to_ascii_lowercase().as_str() {
            "buy" => Ok(Side::Buy),
            "sell" => Ok(Side::Sell),
            other => Err(serde::de::Error::unknown_variant(other, &["buy", "sell"])),
        }
    }
}

/// Complete portfolio summary at a point in time
///
/// Immutable once constructed; the reconciler holds at most one current
/// instance. A snapshot with `update_succeeded == false` never replaces the
/// numeric fields of a previously successful one, it only surfaces an error
/// banner.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PortfolioSnapshot {
    #[serde(default)]
    pub portfolio_value: f64,
    #[serde(default)]
    pub cash: f64,
    #[serde(default)]
    pub buying_power: f64,
    #[serde(default)]
    pub total_pl: f64,
    #[serde(default)]
    pub daily_pl: f64,
    /// Daily P/L as percent points (0-100 scale)
    #[serde(default, alias = "daily_pl_percent")]
    pub daily_pl_pct_points: f64,
    #[serde(default)]
    pub positions_count: u32,
    pub timestamp: DateTime<Utc>,
    /// Whether the server-side refresh behind this snapshot succeeded
    #[serde(default = "default_true", alias = "last_update_successful")]
    pub update_succeeded: bool,
    #[serde(default, alias = "error")]
    pub error_message: Option<String>,
}

fn default_true() -> bool {
    true
}

/// One open position
///
/// Element of a full-replace sequence: every update replaces the whole
/// displayed table, re-sorted descending by market value.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PositionRecord {
    pub symbol: String,
    #[serde(alias = "qty")]
    pub quantity: f64,
    pub avg_entry_price: f64,
    pub current_price: f64,
    pub market_value: f64,
    pub unrealized_pl: f64,
    /// Unrealized P/L relative to cost basis (0.0-1.0 scale)
    #[serde(alias = "unrealized_plpc")]
    pub unrealized_pl_ratio: f64,
}

/// One executed trade, in server-provided (newest-first) order
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TradeRecord {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    #[serde(alias = "action")]
    pub side: Side,
    #[serde(alias = "qty")]
    pub quantity: f64,
    pub price: f64,
    /// Realized P/L, when the server has computed it
    #[serde(default)]
    pub pl: Option<f64>,
    /// Realized P/L as percent points (0-100 scale)
    #[serde(default, alias = "pl_percent")]
    pub pl_pct_points: Option<f64>,
    /// Sentiment score attached to the trade decision, if any
    #[serde(default)]
    pub sentiment_score: Option<f64>,
}

impl TradeRecord {
    /// Notional value of the fill
    pub fn notional(&self) -> f64 {
        self.quantity * self.price
    }
}

/// Point appended to the live price series
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PricePoint {
    pub symbol: String,
    #[serde(alias = "value")]
    pub price: f64,
    pub timestamp: DateTime<Utc>,
}

/// Market open/closed gate for the market refresh cycle
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct MarketStatus {
    pub is_open: bool,
}

/// Per-symbol market snapshot entry
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MarketSnapshotEntry {
    pub price: f64,
    /// Change on the day as percent points (0-100 scale)
    #[serde(alias = "change")]
    pub change_pct_points: f64,
    pub volume: u64,
    #[serde(alias = "time")]
    pub as_of: DateTime<Utc>,
}

/// Symbol-keyed mapping rebuilt wholesale each poll cycle; symbols no longer
/// returned are dropped by the replacement.
pub type MarketOverview = HashMap<String, MarketSnapshotEntry>;

/// One mover row in the breadth panel
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MarketMover {
    pub symbol: String,
    /// Change on the day as percent points (0-100 scale)
    #[serde(alias = "change")]
    pub change_pct_points: f64,
}

/// Advancing/declining counts plus top movers
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MarketBreadth {
    pub advancing: u32,
    pub declining: u32,
    #[serde(default)]
    pub top_gainers: Vec<MarketMover>,
    #[serde(default)]
    pub top_losers: Vec<MarketMover>,
}

/// Indicator block from `/api/market/technical/{symbol}`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TechnicalIndicators {
    pub current_price: f64,
    pub sma_5: f64,
    pub sma_20: f64,
    pub rsi: f64,
    pub volume: u64,
}

/// Response from `/api/market/vwap/{symbol}`
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct VwapResponse {
    pub vwap: f64,
}

/// Merged technical lookup result shown in the analysis panel
///
/// The indicator block and the VWAP come from separate endpoints fetched
/// concurrently; this is the joined view.
#[derive(Debug, Clone, PartialEq)]
pub struct TechnicalReport {
    pub symbol: String,
    pub current_price: f64,
    pub sma_5: f64,
    pub sma_20: f64,
    pub rsi: f64,
    pub vwap: f64,
    pub volume: u64,
}

impl TechnicalReport {
    pub fn merge(
        symbol: impl Into<String>,
        indicators: TechnicalIndicators,
        vwap: VwapResponse,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            current_price: indicators.current_price,
            sma_5: indicators.sma_5,
            sma_20: indicators.sma_20,
            rsi: indicators.rsi,
            vwap: vwap.vwap,
            volume: indicators.volume,
        }
    }
}

/// Ad-hoc sentiment lookup result
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SentimentReport {
    pub symbol: String,
    /// Aggregate sentiment on the -1.0 to 1.0 scale
    pub sentiment_score: f64,
    pub tweet_count: u32,
    #[serde(default)]
    pub tweets: Vec<String>,
}

/// Response from `POST /api/settings`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SettingsResponse {
    pub status: String,
    #[serde(default)]
    pub config: Option<HashMap<String, String>>,
    #[serde(default)]
    pub message: Option<String>,
}

impl SettingsResponse {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}
