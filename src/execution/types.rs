//! Execution types

use crate::market::Side;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Order identifier
pub type OrderId = Uuid;

/// A buy order for one outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Outcome to buy
    pub side: Side,
    /// Limit price
    pub price: Decimal,
    /// Number of shares
    pub quantity: i64,
}

/// An executed order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Executed {
    pub order_id: OrderId,
    pub side: Side,
    /// Price actually paid per share
    pub price: Decimal,
    pub quantity: i64,
    pub ts: DateTime<Utc>,
}
