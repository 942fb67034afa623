/// Dashboard configuration
///
/// Assembled once at startup and handed to the components; nothing reads the
/// environment after construction.

use std::time::Duration;

/// Push-channel configuration
#[derive(Debug, Clone)]
pub struct SocketConfig {
    /// WebSocket server URL
    pub url: String,
    /// Ping interval to keep the connection alive
    pub ping_interval: Duration,
    /// First retry delay after an unexpected drop
    pub reconnect_floor: Duration,
    /// Retry delay never exceeds this
    pub reconnect_ceiling: Duration,
    /// Consecutive failed attempts tolerated before the channel is left
    /// Disconnected for good
    pub max_reconnect_attempts: u32,
    /// Channel buffer size for inbound events
    pub channel_buffer_size: usize,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:5000/ws".to_string(),
            ping_interval: Duration::from_secs(30),
            reconnect_floor: Duration::from_secs(1),
            reconnect_ceiling: Duration::from_secs(5),
            max_reconnect_attempts: 5,
            channel_buffer_size: 1000,
        }
    }
}

impl SocketConfig {
    /// Create a new configuration with custom URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    pub fn with_reconnect_floor(mut self, floor: Duration) -> Self {
        self.reconnect_floor = floor;
        self
    }

    pub fn with_reconnect_ceiling(mut self, ceiling: Duration) -> Self {
        self.reconnect_ceiling = ceiling;
        self
    }

    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    pub fn with_channel_buffer_size(mut self, size: usize) -> Self {
        self.channel_buffer_size = size;
        self
    }
}

/// Top-level dashboard configuration
#[derive(Debug, Clone)]
pub struct DashConfig {
    pub socket: SocketConfig,
    /// Base URL of the bot's REST API
    pub rest_base_url: String,
    /// Symbols shown in the market overview
    pub market_symbols: Vec<String>,
    /// Market overview refresh period
    pub market_refresh_interval: Duration,
    /// Recent-trades refresh period
    pub trades_refresh_interval: Duration,
}

impl Default for DashConfig {
    fn default() -> Self {
        Self {
            socket: SocketConfig::default(),
            rest_base_url: "http://127.0.0.1:5000".to_string(),
            market_symbols: parse_symbols("SPY,QQQ,DIA,AAPL,MSFT,GOOGL"),
            market_refresh_interval: Duration::from_secs(30),
            trades_refresh_interval: Duration::from_secs(60),
        }
    }
}

impl DashConfig {
    /// Build a configuration from the environment:
    /// `BOTDESK_WS_URL`, `BOTDESK_API_URL`, `BOTDESK_SYMBOLS` (comma list).
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("BOTDESK_WS_URL") {
            config.socket.url = url;
        }
        if let Ok(url) = std::env::var("BOTDESK_API_URL") {
            config.rest_base_url = url;
        }
        if let Ok(raw) = std::env::var("BOTDESK_SYMBOLS") {
            let symbols = parse_symbols(&raw);
            if !symbols.is_empty() {
                config.market_symbols = symbols;
            }
        }
        config
    }
}

/// Parse a comma-separated symbol list, trimming and uppercasing entries
pub fn parse_symbols(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}
