//! Hedged-pair settlement math
//!
//! A session may end holding shares on both outcomes. Each matched pair
//! (one share of each side) pays out exactly 1 unit at resolution, whichever
//! outcome occurs; unmatched excess shares on one side are not hedged and
//! are excluded from the payoff.

use crate::market::Side;
use crate::store::Fill;
use rust_decimal::Decimal;

/// Result of settling a session from its fills
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub filled_yes: i64,
    pub filled_no: i64,
    pub cost_yes: Decimal,
    pub cost_no: Decimal,
    /// Matched pairs × 1 unit
    pub payoff: Decimal,
    pub pnl: Decimal,
}

impl Settlement {
    /// Number of fully hedged share pairs
    pub fn matched_pairs(&self) -> i64 {
        self.filled_yes.min(self.filled_no)
    }

    /// Shares left without a matching opposite share
    pub fn unmatched_shares(&self) -> i64 {
        (self.filled_yes - self.filled_no).abs()
    }
}

/// Settle a session deterministically from its recorded fills
pub fn settle(fills: &[Fill]) -> Settlement {
    let mut filled_yes = 0i64;
    let mut filled_no = 0i64;
    let mut cost_yes = Decimal::ZERO;
    let mut cost_no = Decimal::ZERO;

    for fill in fills {
        let cost = fill.price * Decimal::from(fill.quantity);
        match fill.side {
            Side::Yes => {
                filled_yes += fill.quantity;
                cost_yes += cost;
            }
            Side::No => {
                filled_no += fill.quantity;
                cost_no += cost;
            }
        }
    }

    let payoff = Decimal::from(filled_yes.min(filled_no));
    let pnl = payoff - (cost_yes + cost_no);

    Settlement {
        filled_yes,
        filled_no,
        cost_yes,
        cost_no,
        payoff,
        pnl,
    }
}
