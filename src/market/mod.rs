//! Market feed adapter
//!
//! Finds the current recurring BTC up/down market via the Gamma catalog and
//! reads the latest traded price per outcome from the data API.

mod feed;
mod gamma;
mod trades;

pub use feed::PolymarketFeed;
pub use gamma::{GammaClient, GammaConfig, GAMMA_API_URL};
pub use trades::{TradesClient, TradesConfig, DATA_API_URL};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One instance of the recurring binary market, valid until its expiry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketInstance {
    /// Unique condition identifier
    pub condition_id: String,
    /// Market question
    pub question: String,
    /// Market close/resolution time
    pub end_time: DateTime<Utc>,
}

/// Outcome side of the binary market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Yes,
    No,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Yes => "yes",
            Side::No => "no",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "yes" => Some(Side::Yes),
            "no" => Some(Side::No),
            _ => None,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Latest observed price per outcome, fetched each poll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub yes: Decimal,
    pub no: Decimal,
}

/// Trait for market feed implementations
///
/// Transient fetch failures are swallowed at this layer and surfaced as
/// `None`; the scheduler treats "no market" and "fetch failed" identically
/// and skips the cycle.
#[async_trait]
pub trait MarketFeed: Send + Sync {
    /// Find the active, non-closed instance of the recurring market
    async fn find_current_market(&self) -> Option<MarketInstance>;
    /// Fetch the latest observed price for both outcomes
    async fn fetch_prices(&self) -> Option<Quote>;
}
