//! Gamma API client for market discovery
//!
//! Fetches active recurring BTC up/down markets from Polymarket's Gamma API.
//! Each instance is a short binary window that resolves at its end date and
//! is replaced by the next one.

use super::MarketInstance;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

/// Gamma API base URL
pub const GAMMA_API_URL: &str = "https://gamma-api.polymarket.com";

/// Configuration for the Gamma client
#[derive(Debug, Clone)]
pub struct GammaConfig {
    /// Base URL for the Gamma API
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Topic keyword the market question must contain (e.g. "btc")
    pub topic_keyword: String,
    /// Duration keyword the market question must contain (e.g. "15")
    pub duration_keyword: String,
    /// Maximum number of catalog entries to request
    pub page_limit: u32,
}

impl Default for GammaConfig {
    fn default() -> Self {
        Self {
            base_url: GAMMA_API_URL.to_string(),
            timeout: Duration::from_secs(10),
            topic_keyword: "btc".to_string(),
            duration_keyword: "15".to_string(),
            page_limit: 200,
        }
    }
}

/// Client for Polymarket's Gamma API
pub struct GammaClient {
    config: GammaConfig,
    client: Client,
}

impl GammaClient {
    /// Create a new Gamma API client with default configuration
    pub fn new() -> Self {
        Self::with_config(GammaConfig::default())
    }

    /// Create a new client with custom configuration
    pub fn with_config(config: GammaConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }

    /// Fetch active, non-closed instances of the recurring market
    ///
    /// Malformed catalog entries (missing condition id, unparseable end
    /// date) are rejected here rather than propagated inward.
    pub async fn fetch_markets(&self) -> anyhow::Result<Vec<MarketInstance>> {
        let url = format!("{}/markets", self.config.base_url);

        tracing::debug!(url = %url, "Fetching market catalog from Gamma API");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("active", "true".to_string()),
                ("closed", "false".to_string()),
                ("limit", self.config.page_limit.to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Gamma API error: {} - {}", status, body);
        }

        let gamma_markets: Vec<GammaMarket> = response.json().await?;

        let instances: Vec<MarketInstance> = gamma_markets
            .into_iter()
            .filter(|m| m.active && !m.closed)
            .filter(|m| self.matches_recurring(&m.question))
            .filter_map(|m| match convert_to_instance(m) {
                Some(instance) => Some(instance),
                None => {
                    tracing::debug!("Rejecting malformed catalog entry");
                    None
                }
            })
            .collect();

        tracing::debug!(
            instance_count = instances.len(),
            "Found matching market instances"
        );

        Ok(instances)
    }

    /// Check whether a market question matches the recurring-market rule
    fn matches_recurring(&self, question: &str) -> bool {
        let question_lower = question.to_lowercase();
        question_lower.contains(&self.config.topic_keyword)
            && question_lower.contains(&self.config.duration_keyword)
    }
}

impl Default for GammaClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Raw market response from Gamma API
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GammaMarket {
    /// Condition ID for the market
    condition_id: Option<String>,
    /// Market question
    #[serde(default)]
    question: String,
    /// Market end date (RFC 3339, possibly suffixed Z)
    end_date: Option<String>,
    /// Whether market is active
    #[serde(default)]
    active: bool,
    /// Whether market is closed
    #[serde(default)]
    closed: bool,
}

/// Convert a raw catalog entry, rejecting entries without the fields the
/// core relies on
fn convert_to_instance(gamma: GammaMarket) -> Option<MarketInstance> {
    let condition_id = gamma.condition_id.filter(|id| !id.is_empty())?;
    let end_time = parse_end_date(gamma.end_date.as_deref()?)?;

    Some(MarketInstance {
        condition_id,
        question: gamma.question,
        end_time,
    })
}

/// Parse an RFC 3339 end date (UTC, possibly suffixed `Z`)
fn parse_end_date(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(question: &str, end_date: Option<&str>) -> GammaMarket {
        GammaMarket {
            condition_id: Some("0x123".to_string()),
            question: question.to_string(),
            end_date: end_date.map(|s| s.to_string()),
            active: true,
            closed: false,
        }
    }

    #[test]
    fn test_gamma_client_creation() {
        let client = GammaClient::new();
        assert_eq!(client.config.base_url, GAMMA_API_URL);
    }

    #[test]
    fn test_gamma_config_default() {
        let config = GammaConfig::default();
        assert_eq!(config.base_url, GAMMA_API_URL);
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.topic_keyword, "btc");
        assert_eq!(config.duration_keyword, "15");
    }

    #[test]
    fn test_matches_recurring() {
        let client = GammaClient::new();

        assert!(client.matches_recurring("Will BTC be up in the next 15 minutes?"));
        assert!(client.matches_recurring("BTC up or down - 15m window"));
        assert!(!client.matches_recurring("Will ETH be up in 15 minutes?"));
        assert!(!client.matches_recurring("Will BTC close higher this week?"));
    }

    #[test]
    fn test_parse_end_date() {
        let parsed = parse_end_date("2024-01-15T10:15:00Z").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2024-01-15T10:15:00+00:00");

        let offset = parse_end_date("2024-01-15T10:15:00+00:00").unwrap();
        assert_eq!(parsed, offset);

        assert!(parse_end_date("not a date").is_none());
    }

    #[test]
    fn test_convert_to_instance() {
        let market = raw("BTC 15m up/down", Some("2024-01-15T10:15:00Z"));
        let instance = convert_to_instance(market).unwrap();
        assert_eq!(instance.condition_id, "0x123");
        assert_eq!(instance.question, "BTC 15m up/down");
    }

    #[test]
    fn test_convert_rejects_missing_end_date() {
        let market = raw("BTC 15m up/down", None);
        assert!(convert_to_instance(market).is_none());
    }

    #[test]
    fn test_convert_rejects_bad_end_date() {
        let market = raw("BTC 15m up/down", Some("soon"));
        assert!(convert_to_instance(market).is_none());
    }

    #[test]
    fn test_convert_rejects_missing_condition_id() {
        let mut market = raw("BTC 15m up/down", Some("2024-01-15T10:15:00Z"));
        market.condition_id = None;
        assert!(convert_to_instance(market).is_none());

        let mut market = raw("BTC 15m up/down", Some("2024-01-15T10:15:00Z"));
        market.condition_id = Some(String::new());
        assert!(convert_to_instance(market).is_none());
    }
}
