//! Composite market feed with cadence-based catalog caching

use super::{GammaClient, GammaConfig, MarketFeed, MarketInstance, Quote, TradesClient, TradesConfig};
use crate::config::MarketConfig;
use async_trait::async_trait;
use chrono::Utc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Market feed backed by the Gamma catalog and the recent-trades API
///
/// The catalog is refreshed on its own cadence, which is slower than the
/// price poll; between refreshes the current instance is selected from the
/// cached list.
pub struct PolymarketFeed {
    gamma: GammaClient,
    trades: TradesClient,
    refresh_interval: Duration,
    catalog: Mutex<CatalogCache>,
}

#[derive(Default)]
struct CatalogCache {
    markets: Vec<MarketInstance>,
    refreshed_at: Option<Instant>,
}

impl PolymarketFeed {
    pub fn new(gamma: GammaClient, trades: TradesClient, refresh_interval: Duration) -> Self {
        Self {
            gamma,
            trades,
            refresh_interval,
            catalog: Mutex::new(CatalogCache::default()),
        }
    }

    /// Build a feed from the market section of the configuration
    pub fn from_config(config: &MarketConfig) -> Self {
        let timeout = Duration::from_secs(config.request_timeout_secs);

        let gamma = GammaClient::with_config(GammaConfig {
            base_url: config
                .gamma_url
                .clone()
                .unwrap_or_else(|| super::GAMMA_API_URL.to_string()),
            timeout,
            topic_keyword: config.topic_keyword.to_lowercase(),
            duration_keyword: config.duration_keyword.to_lowercase(),
            ..GammaConfig::default()
        });

        let trades = TradesClient::with_config(TradesConfig {
            base_url: config
                .data_url
                .clone()
                .unwrap_or_else(|| super::DATA_API_URL.to_string()),
            timeout,
            ..TradesConfig::default()
        });

        Self::new(
            gamma,
            trades,
            Duration::from_secs(config.refresh_interval_secs),
        )
    }

    async fn refresh_catalog_if_stale(&self) {
        let mut catalog = self.catalog.lock().await;
        let stale = catalog
            .refreshed_at
            .map(|at| at.elapsed() >= self.refresh_interval)
            .unwrap_or(true);

        if !stale {
            return;
        }

        match self.gamma.fetch_markets().await {
            Ok(markets) => {
                catalog.markets = markets;
                catalog.refreshed_at = Some(Instant::now());
            }
            Err(e) => {
                // Keep the stale list; the refresh retries next poll
                tracing::warn!(error = %e, "Market catalog refresh failed");
            }
        }
    }
}

#[async_trait]
impl MarketFeed for PolymarketFeed {
    async fn find_current_market(&self) -> Option<MarketInstance> {
        self.refresh_catalog_if_stale().await;

        let now = Utc::now();
        let catalog = self.catalog.lock().await;
        catalog
            .markets
            .iter()
            .filter(|m| m.end_time > now)
            .min_by_key(|m| m.end_time)
            .cloned()
    }

    async fn fetch_prices(&self) -> Option<Quote> {
        match self.trades.fetch_recent().await {
            Ok(quote) => quote,
            Err(e) => {
                tracing::warn!(error = %e, "Price fetch failed");
                None
            }
        }
    }
}
