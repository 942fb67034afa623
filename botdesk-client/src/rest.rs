/// REST client for the bot's HTTP API
///
/// [`BotApi`] is the seam the poll flows and lookups are written against, so
/// they can be exercised with a stub transport; [`ApiClient`] is the reqwest
/// implementation used by the dashboard binary.

use crate::error::{DashError, Result};
use crate::types::{
    MarketBreadth, MarketOverview, MarketStatus, PortfolioSnapshot, PositionRecord,
    SentimentReport, SettingsResponse, TechnicalIndicators, TradeRecord, VwapResponse,
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use tracing::debug;

/// REST surface consumed by the dashboard
#[async_trait]
pub trait BotApi: Send + Sync {
    async fn portfolio_summary(&self) -> Result<PortfolioSnapshot>;
    async fn positions(&self) -> Result<Vec<PositionRecord>>;
    async fn recent_trades(&self) -> Result<Vec<TradeRecord>>;
    async fn market_status(&self) -> Result<MarketStatus>;
    async fn market_snapshot(&self, symbols: &[String]) -> Result<MarketOverview>;
    async fn market_breadth(&self) -> Result<MarketBreadth>;
    async fn technical(&self, symbol: &str) -> Result<TechnicalIndicators>;
    async fn vwap(&self, symbol: &str) -> Result<VwapResponse>;
    async fn test_sentiment(&self, symbol: &str) -> Result<SentimentReport>;
    async fn update_settings(&self, fields: &HashMap<String, String>) -> Result<SettingsResponse>;
}

/// Reqwest-backed [`BotApi`] implementation
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http: reqwest::Client::new(),
            base_url,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        debug!("GET {}", url);
        let response = self.http.get(&url).send().await?.error_for_status()?;
        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| DashError::Validation(format!("{}: {}", path, e)))
    }
}

/// Keep only fields with non-empty trimmed values, the way the settings form
/// filters its inputs before submitting.
pub fn non_empty_fields(fields: &HashMap<String, String>) -> HashMap<String, String> {
    fields
        .iter()
        .filter_map(|(key, value)| {
            let trimmed = value.trim();
            if key.trim().is_empty() || trimmed.is_empty() {
                None
            } else {
                Some((key.trim().to_string(), trimmed.to_string()))
            }
        })
        .collect()
}

#[async_trait]
impl BotApi for ApiClient {
    async fn portfolio_summary(&self) -> Result<PortfolioSnapshot> {
        self.get_json("/api/portfolio/summary").await
    }

    async fn positions(&self) -> Result<Vec<PositionRecord>> {
        self.get_json("/api/portfolio/positions").await
    }

    async fn recent_trades(&self) -> Result<Vec<TradeRecord>> {
        self.get_json("/api/trades/recent").await
    }

    async fn market_status(&self) -> Result<MarketStatus> {
        self.get_json("/api/market/status").await
    }

    async fn market_snapshot(&self, symbols: &[String]) -> Result<MarketOverview> {
        let path = format!("/api/market/snapshot?symbols={}", symbols.join(","));
        self.get_json(&path).await
    }

    async fn market_breadth(&self) -> Result<MarketBreadth> {
        self.get_json("/api/market/breadth").await
    }

    async fn technical(&self, symbol: &str) -> Result<TechnicalIndicators> {
        self.get_json(&format!("/api/market/technical/{}", symbol)).await
    }

    async fn vwap(&self, symbol: &str) -> Result<VwapResponse> {
        self.get_json(&format!("/api/market/vwap/{}", symbol)).await
    }

    async fn test_sentiment(&self, symbol: &str) -> Result<SentimentReport> {
        self.get_json(&format!("/api/test_sentiment?symbol={}", symbol)).await
    }

    async fn update_settings(&self, fields: &HashMap<String, String>) -> Result<SettingsResponse> {
        let body = non_empty_fields(fields);
        if body.is_empty() {
            // Rejected before any request is made.
            return Err(DashError::UserInput("no settings provided".into()));
        }

        let url = self.url("/api/settings");
        debug!("POST {}", url);
        let response = self.http.post(&url).json(&body).send().await?;
        // The endpoint reports failure in the JSON body (status/message), so
        // parse it regardless of the HTTP status code.
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| DashError::Validation(format!("/api/settings: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[test]
    fn test_non_empty_fields_filters_blanks() {
        let mut fields = HashMap::new();
        fields.insert("api_key".to_string(), "  abc123  ".to_string());
        fields.insert("api_secret".to_string(), "   ".to_string());
        fields.insert("base_url".to_string(), "".to_string());

        let filtered = non_empty_fields(&fields);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered.get("api_key").map(String::as_str), Some("abc123"));
    }

    #[test]
    fn test_url_joining_trims_trailing_slash() {
        let client = ApiClient::new("http://127.0.0.1:5000/");
        assert_eq!(
            client.url("/api/portfolio/summary"),
            "http://127.0.0.1:5000/api/portfolio/summary"
        );
    }

    #[tokio::test]
    async fn test_empty_settings_rejected_before_any_request() {
        // Unroutable base URL: a request would fail loudly, proving the
        // rejection happened first.
        let client = ApiClient::new("http://127.0.0.1:1");
        let result = client.update_settings(&HashMap::new()).await;
        assert!(matches!(result, Err(DashError::UserInput(_))));
    }

    /// Minimal one-request HTTP server for exercising the real client.
    async fn serve_once(status_line: &'static str, body: &'static str) -> std::net::SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = stream.read(&mut buf).await;
            let response = format!(
                "{}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            let _ = stream.write_all(response.as_bytes()).await;
        });
        addr
    }

    #[tokio::test]
    async fn test_get_json_round_trip() {
        let addr = serve_once(
            "HTTP/1.1 200 OK",
            r#"{"portfolio_value": 10000.0, "cash": 2500.0, "buying_power": 5000.0,
               "total_pl": 120.5, "daily_pl": -30.25, "daily_pl_percent": -0.3,
               "positions_count": 4, "timestamp": "2024-06-03T14:30:00Z",
               "last_update_successful": true}"#,
        )
        .await;

        let client = ApiClient::new(format!("http://{}", addr));
        let snapshot = client.portfolio_summary().await.unwrap();
        assert_eq!(snapshot.portfolio_value, 10000.0);
        assert_eq!(snapshot.positions_count, 4);
        assert!(snapshot.update_succeeded);
    }

    #[tokio::test]
    async fn test_http_error_maps_to_fetch() {
        let addr = serve_once("HTTP/1.1 500 Internal Server Error", "{}").await;
        let client = ApiClient::new(format!("http://{}", addr));
        let result = client.market_breadth().await;
        assert!(matches!(result, Err(DashError::Fetch(_))));
    }

    #[tokio::test]
    async fn test_malformed_body_maps_to_validation() {
        let addr = serve_once("HTTP/1.1 200 OK", r#"{"is_open": "not a bool"}"#).await;
        let client = ApiClient::new(format!("http://{}", addr));
        let result = client.market_status().await;
        assert!(matches!(result, Err(DashError::Validation(_))));
    }
}
