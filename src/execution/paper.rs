//! Paper trading executor

use super::{Executed, Order, OrderExecutor, OrderId};
use async_trait::async_trait;
use chrono::Utc;

/// Simulated executor that fills every order immediately at its price
#[derive(Debug, Default)]
pub struct PaperExecutor;

impl PaperExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl OrderExecutor for PaperExecutor {
    async fn place_order(&self, order: Order) -> anyhow::Result<Executed> {
        let executed = Executed {
            order_id: OrderId::new_v4(),
            side: order.side,
            price: order.price,
            quantity: order.quantity,
            ts: Utc::now(),
        };

        tracing::info!(
            order_id = %executed.order_id,
            side = %executed.side,
            price = %executed.price,
            quantity = executed.quantity,
            "Paper order filled"
        );
        Ok(executed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::Side;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_paper_executor_fills_at_order_price() {
        let executor = PaperExecutor::new();

        let executed = executor
            .place_order(Order {
                side: Side::Yes,
                price: dec!(0.55),
                quantity: 20,
            })
            .await
            .unwrap();

        assert_eq!(executed.side, Side::Yes);
        assert_eq!(executed.price, dec!(0.55));
        assert_eq!(executed.quantity, 20);
    }

    #[tokio::test]
    async fn test_paper_executor_distinct_order_ids() {
        let executor = PaperExecutor::new();
        let order = Order {
            side: Side::No,
            price: dec!(0.45),
            quantity: 5,
        };

        let a = executor.place_order(order.clone()).await.unwrap();
        let b = executor.place_order(order).await.unwrap();
        assert_ne!(a.order_id, b.order_id);
    }
}
