//! Session scheduler
//!
//! One logical loop that polls the market feed on a fixed cadence, detects
//! market rollover, opens and closes sessions, applies the entry rule, and
//! triggers settlement. The scheduler is generic over the feed, store, and
//! executor seams so the cycle can be driven directly in tests.

mod settlement;

pub use settlement::{settle, Settlement};

use crate::control::{ControlHandle, ControlSnapshot};
use crate::execution::{Order, OrderExecutor};
use crate::market::{MarketFeed, MarketInstance, Side};
use crate::store::{NewSession, SessionId, SessionStore};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::time::Duration;

/// Question recorded on a session before a market is known
const PENDING_QUESTION: &str = "pending market";

/// Scheduler lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Not running
    Idle,
    /// Running, no current market resolved yet
    AwaitingMarket,
    /// An open session exists and is within its validity window
    InSession,
    /// Market expired, computing P&L
    Settling,
}

/// Poll cadence configuration
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Interval between polls while running
    pub poll_interval: Duration,
    /// Re-check interval for the run flag while stopped
    pub idle_interval: Duration,
}

impl SchedulerConfig {
    pub fn new(poll_interval_secs: u64) -> Self {
        Self {
            poll_interval: Duration::from_secs(poll_interval_secs),
            idle_interval: Duration::from_secs(1),
        }
    }
}

/// In-memory view of the open session
///
/// Counters here mirror the store and advance only after a fill write
/// succeeds; entry parameters are the ones captured on the row at creation.
#[derive(Debug, Clone)]
struct ActiveSession {
    id: SessionId,
    condition_id: Option<String>,
    expiry: Option<DateTime<Utc>>,
    target_shares: i64,
    price_ceiling: Decimal,
    filled_yes: i64,
    filled_no: i64,
}

impl ActiveSession {
    fn filled(&self, side: Side) -> i64 {
        match side {
            Side::Yes => self.filled_yes,
            Side::No => self.filled_no,
        }
    }

    fn advance(&mut self, side: Side, quantity: i64) {
        match side {
            Side::Yes => self.filled_yes += quantity,
            Side::No => self.filled_no += quantity,
        }
    }
}

/// Quantity the entry rule buys for one outcome, if any
///
/// A side fills to completion in a single shot the first time its price is
/// at or below the ceiling; once at target it never fills again.
fn entry_quantity(price: Decimal, ceiling: Decimal, filled: i64, target: i64) -> Option<i64> {
    if price <= ceiling && filled < target {
        Some(target - filled)
    } else {
        None
    }
}

/// The trading loop state machine
pub struct Scheduler<F, S, E> {
    feed: F,
    store: S,
    executor: E,
    control: ControlHandle,
    config: SchedulerConfig,
    state: SchedulerState,
    current: Option<ActiveSession>,
}

impl<F, S, E> Scheduler<F, S, E>
where
    F: MarketFeed,
    S: SessionStore,
    E: OrderExecutor,
{
    pub fn new(feed: F, store: S, executor: E, control: ControlHandle, config: SchedulerConfig) -> Self {
        Self {
            feed,
            store,
            executor,
            control,
            config,
            state: SchedulerState::Idle,
            current: None,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn current_session_id(&self) -> Option<SessionId> {
        self.current.as_ref().map(|s| s.id)
    }

    /// Drive the poll cycle until the task is dropped
    ///
    /// While stopped the loop sleeps briefly and re-checks the run flag, so
    /// shutdown latency is bounded by one idle interval.
    pub async fn run(&mut self) {
        loop {
            self.tick().await;

            let interval = if self.control.is_running().await {
                self.config.poll_interval
            } else {
                self.config.idle_interval
            };
            tokio::time::sleep(interval).await;
        }
    }

    /// One poll cycle: rollover detection, entry rule, settlement
    ///
    /// Every failure mode here is non-fatal; a failed cycle leaves state
    /// unchanged and the next tick retries.
    pub async fn tick(&mut self) {
        let snapshot = self.control.snapshot().await;

        if !snapshot.running {
            if self.state != SchedulerState::Idle {
                tracing::info!("Scheduler idle");
                self.state = SchedulerState::Idle;
            }
            return;
        }

        if self.state == SchedulerState::Idle {
            self.state = SchedulerState::AwaitingMarket;
        }

        // A session row exists whenever the scheduler is not idle, even
        // before any market is known
        if self.current.is_none() && !self.open_session(&snapshot).await {
            return;
        }

        let unassociated = self
            .current
            .as_ref()
            .is_some_and(|s| s.condition_id.is_none());

        if unassociated {
            match self.feed.find_current_market().await {
                Some(market) => {
                    if !self.associate_market(&market).await {
                        return;
                    }
                }
                None => {
                    self.state = SchedulerState::AwaitingMarket;
                    self.control.set_status("awaiting market").await;
                    return;
                }
            }
        }

        let Some(expiry) = self.current.as_ref().and_then(|s| s.expiry) else {
            return;
        };

        if Utc::now() >= expiry {
            self.settle_current().await;
            return;
        }

        self.state = SchedulerState::InSession;

        let Some(quote) = self.feed.fetch_prices().await else {
            self.control.set_status("awaiting price data").await;
            return;
        };

        tracing::debug!(yes = %quote.yes, no = %quote.no, "Observed prices");

        // Both outcomes are evaluated every poll, independently
        self.try_fill(Side::Yes, quote.yes).await;
        self.try_fill(Side::No, quote.no).await;
    }

    /// Create the session row for this lifecycle; entry parameters are
    /// captured from the control snapshot at this point
    async fn open_session(&mut self, snapshot: &ControlSnapshot) -> bool {
        let new = NewSession {
            condition_id: None,
            question: PENDING_QUESTION.to_string(),
            start_ts: Utc::now(),
            mode: snapshot.mode,
            target_shares: snapshot.target_shares,
            price_ceiling: snapshot.price_ceiling,
        };

        match self.store.create_session(new).await {
            Ok(id) => {
                tracing::info!(session_id = %id, "Session opened");
                self.current = Some(ActiveSession {
                    id,
                    condition_id: None,
                    expiry: None,
                    target_shares: snapshot.target_shares,
                    price_ceiling: snapshot.price_ceiling,
                    filled_yes: 0,
                    filled_no: 0,
                });
                self.state = SchedulerState::AwaitingMarket;
                self.control.set_status("session opened").await;
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Session creation failed");
                self.control
                    .set_status(format!("store write failed: {e}"))
                    .await;
                false
            }
        }
    }

    /// Attach the discovered market to the open session and capture its
    /// expiry; identity is set exactly once
    async fn associate_market(&mut self, market: &MarketInstance) -> bool {
        let Some(session) = self.current.as_mut() else {
            return false;
        };

        match self
            .store
            .attach_market(session.id, &market.condition_id, &market.question)
            .await
        {
            Ok(()) => {
                session.condition_id = Some(market.condition_id.clone());
                session.expiry = Some(market.end_time);
                self.state = SchedulerState::InSession;
                tracing::info!(
                    session_id = %session.id,
                    condition_id = %market.condition_id,
                    end_time = %market.end_time,
                    "Market attached"
                );
                self.control
                    .set_status(format!("market attached: {}", market.question))
                    .await;
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Market association failed");
                self.control
                    .set_status(format!("store write failed: {e}"))
                    .await;
                false
            }
        }
    }

    /// Apply the entry rule for one outcome and record the fill
    ///
    /// The fill row and counter move as one atomic store step; the
    /// in-memory counter advances only after that step succeeds, so a
    /// persistence failure leaves no partial state and the rule simply
    /// re-evaluates next poll.
    async fn try_fill(&mut self, side: Side, price: Decimal) {
        let Some(session) = self.current.as_ref() else {
            return;
        };

        let Some(quantity) = entry_quantity(
            price,
            session.price_ceiling,
            session.filled(side),
            session.target_shares,
        ) else {
            return;
        };

        let id = session.id;

        let executed = match self
            .executor
            .place_order(Order {
                side,
                price,
                quantity,
            })
            .await
        {
            Ok(executed) => executed,
            Err(e) => {
                tracing::warn!(error = %e, side = %side, "Order placement failed");
                self.control.set_status(format!("order failed: {e}")).await;
                return;
            }
        };

        match self
            .store
            .record_fill(id, side, executed.price, executed.quantity, executed.ts)
            .await
        {
            Ok(()) => {
                if let Some(session) = self.current.as_mut() {
                    session.advance(side, executed.quantity);
                }
                tracing::info!(
                    session_id = %id,
                    side = %side,
                    price = %executed.price,
                    quantity = executed.quantity,
                    "Fill recorded"
                );
                self.control
                    .set_status(format!(
                        "bought {} {} @ {}",
                        executed.quantity, side, executed.price
                    ))
                    .await;
            }
            Err(e) => {
                tracing::warn!(error = %e, side = %side, "Fill write failed");
                self.control
                    .set_status(format!("store write failed: {e}"))
                    .await;
            }
        }
    }

    /// Close the expired session: P&L from recorded fills, closure counter,
    /// stop on session limit
    ///
    /// On a store failure the session stays current and settlement retries
    /// next tick; closing always precedes the successor's open.
    async fn settle_current(&mut self) {
        self.state = SchedulerState::Settling;

        let Some(session) = self.current.as_ref() else {
            return;
        };
        let id = session.id;

        let fills = match self.store.fills_for_session(id).await {
            Ok(fills) => fills,
            Err(e) => {
                tracing::warn!(error = %e, "Fill read failed during settlement");
                self.control
                    .set_status(format!("store read failed: {e}"))
                    .await;
                return;
            }
        };

        let settlement = settle(&fills);

        match self.store.close_session(id, Utc::now(), settlement.pnl).await {
            Ok(()) => {
                tracing::info!(
                    session_id = %id,
                    pnl = %settlement.pnl,
                    matched_pairs = settlement.matched_pairs(),
                    unmatched_shares = settlement.unmatched_shares(),
                    "Session settled"
                );
                self.current = None;

                if self.control.session_closed().await {
                    self.state = SchedulerState::Idle;
                    tracing::info!("Session limit reached, stopping");
                } else {
                    self.state = SchedulerState::AwaitingMarket;
                    self.control
                        .set_status(format!("session settled: pnl {}", settlement.pnl))
                        .await;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Session close failed");
                self.control
                    .set_status(format!("store write failed: {e}"))
                    .await;
            }
        }
    }
}
