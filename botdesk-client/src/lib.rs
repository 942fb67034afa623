/// Botdesk Client - Shared Library
///
/// Reconciliation core for the trading-bot dashboard TUI. The dashboard is
/// fed from two independent producers - a server-push WebSocket channel and
/// periodic REST polling - and this library merges both into one consistent
/// view:
///
/// - Canonical snapshot schema with payload-source normalization
/// - Push-channel client with bounded reconnection
/// - Poll scheduler with per-purpose deduplication and cooperative stop
/// - View reconciler with freshness checks and bounded chart buffers
/// - REST client behind a trait seam for testability
pub mod config;
pub mod error;
pub mod format;
pub mod market;
pub mod poll;
pub mod reconcile;
pub mod rest;
pub mod socket;
pub mod types;

// Re-export commonly used types for convenience
pub use config::{DashConfig, SocketConfig};
pub use error::{DashError, Result};
pub use poll::{PollGate, PollHandle, PollPurpose, PollScheduler, run_once};
pub use reconcile::{
    DashboardState, LookupPanel, MarketPanel, MarketSession, PortfolioPanel, PriceSeriesBuffer,
    Reconciler, TableBody, PRICE_SERIES_CAPACITY,
};
pub use rest::{ApiClient, BotApi};
pub use socket::{SocketClient, SocketHandle};
pub use types::{
    ClientCommand, ConnectionState, MarketBreadth, MarketOverview, MarketSnapshotEntry,
    MarketStatus, PortfolioSnapshot, PositionRecord, PricePoint, PushEnvelope, SentimentReport,
    SettingsResponse, Side, TechnicalIndicators, TechnicalReport, TradeRecord, VwapResponse,
};
