//! Recent-trades client for the data API
//!
//! Extracts the latest observed price per outcome by scanning recent trade
//! records in feed order until both sides have a value.

use super::{Quote, Side};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;

/// Data API base URL
pub const DATA_API_URL: &str = "https://data-api.polymarket.com";

/// Configuration for the trades client
#[derive(Debug, Clone)]
pub struct TradesConfig {
    /// Base URL for the data API
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Number of recent trade records to scan
    pub scan_limit: u32,
}

impl Default for TradesConfig {
    fn default() -> Self {
        Self {
            base_url: DATA_API_URL.to_string(),
            timeout: Duration::from_secs(10),
            scan_limit: 50,
        }
    }
}

/// Client for the recent-trades feed
pub struct TradesClient {
    config: TradesConfig,
    client: Client,
}

impl TradesClient {
    pub fn new() -> Self {
        Self::with_config(TradesConfig::default())
    }

    pub fn with_config(config: TradesConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }

    /// Fetch the latest observed price per outcome
    ///
    /// Returns `Ok(None)` when either side is never observed within the
    /// scanned window.
    pub async fn fetch_recent(&self) -> anyhow::Result<Option<Quote>> {
        let url = format!("{}/trades", self.config.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("limit", self.config.scan_limit.to_string())])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Data API error: {} - {}", status, body);
        }

        let records: Vec<TradeRecord> = response.json().await?;
        Ok(scan_for_quote(&records))
    }
}

impl Default for TradesClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Raw trade record from the data API
#[derive(Debug, Deserialize)]
struct TradeRecord {
    /// Outcome tag ("Yes" / "No")
    outcome: Option<String>,
    /// Trade price; the feed serves both string and numeric forms
    price: Option<serde_json::Value>,
}

/// Scan records in feed order; the first occurrence per side wins
fn scan_for_quote(records: &[TradeRecord]) -> Option<Quote> {
    let mut yes = None;
    let mut no = None;

    for record in records {
        let side = record.outcome.as_deref().and_then(Side::parse);
        let price = record.price.as_ref().and_then(parse_price);

        match (side, price) {
            (Some(Side::Yes), Some(p)) if yes.is_none() => yes = Some(p),
            (Some(Side::No), Some(p)) if no.is_none() => no = Some(p),
            _ => {}
        }

        if let (Some(yes), Some(no)) = (yes, no) {
            return Some(Quote { yes, no });
        }
    }

    None
}

/// Parse a price that may be a JSON string or number
fn parse_price(value: &serde_json::Value) -> Option<Decimal> {
    match value {
        serde_json::Value::String(s) => Decimal::from_str(s).ok(),
        serde_json::Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        _ => None,
    }
}
