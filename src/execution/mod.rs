//! Order execution
//!
//! The scheduler places orders through the [`OrderExecutor`] seam; the only
//! shipped implementation simulates immediate fills for paper trading.

mod paper;
mod types;

pub use paper::PaperExecutor;
pub use types::{Executed, Order, OrderId};

use async_trait::async_trait;

/// Trait for order execution implementations
#[async_trait]
pub trait OrderExecutor: Send + Sync {
    /// Place a buy order for one outcome
    async fn place_order(&self, order: Order) -> anyhow::Result<Executed>;
}
