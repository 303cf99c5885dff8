//! Durable session store
//!
//! Sessions record one full trading lifecycle against one market instance;
//! fills are the append-only trade records owned by their session. The
//! per-side filled counters on a session are a derived aggregate that must
//! always equal the sum of that session's fills by side.

mod sqlite;

pub use sqlite::SqliteStore;

use crate::config::TradingMode;
use crate::market::Side;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// Session identifier assigned by the store on creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SessionId(pub i64);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// One full trading lifecycle against one market instance
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: SessionId,
    /// Market identity; null until the session is associated
    pub condition_id: Option<String>,
    pub question: String,
    pub start_ts: DateTime<Utc>,
    /// Null while the session is open
    pub end_ts: Option<DateTime<Utc>>,
    pub mode: TradingMode,
    /// Share target per outcome
    pub target_shares: i64,
    pub filled_yes: i64,
    pub filled_no: i64,
    /// Entry price ceiling captured at creation
    pub price_ceiling: Decimal,
    /// Realized profit/loss; null until settled
    pub pnl: Option<Decimal>,
}

impl Session {
    pub fn is_open(&self) -> bool {
        self.end_ts.is_none()
    }
}

/// Fields required to create a session row
#[derive(Debug, Clone)]
pub struct NewSession {
    pub condition_id: Option<String>,
    pub question: String,
    pub start_ts: DateTime<Utc>,
    pub mode: TradingMode,
    pub target_shares: i64,
    pub price_ceiling: Decimal,
}

/// One executed purchase of an outcome, owned by its session
#[derive(Debug, Clone, Serialize)]
pub struct Fill {
    pub id: i64,
    pub session_id: SessionId,
    pub ts: DateTime<Utc>,
    pub side: Side,
    pub price: Decimal,
    pub quantity: i64,
}

/// Trait for session store implementations
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create a session row and return its id
    async fn create_session(&self, new: NewSession) -> anyhow::Result<SessionId>;

    /// Associate a market identity with a not-yet-associated session
    ///
    /// Fails if the session is already associated; identity is set once.
    async fn attach_market(
        &self,
        id: SessionId,
        condition_id: &str,
        question: &str,
    ) -> anyhow::Result<()>;

    /// Insert a fill and advance the session's own-side counter as one
    /// atomic step
    ///
    /// Fails without applying either half if the counter would exceed the
    /// session's target.
    async fn record_fill(
        &self,
        id: SessionId,
        side: Side,
        price: Decimal,
        quantity: i64,
        ts: DateTime<Utc>,
    ) -> anyhow::Result<()>;

    /// Close a session exactly once with its final P&L
    async fn close_session(
        &self,
        id: SessionId,
        end_ts: DateTime<Utc>,
        pnl: Decimal,
    ) -> anyhow::Result<()>;

    /// Load a session by id
    async fn load_session(&self, id: SessionId) -> anyhow::Result<Option<Session>>;

    /// All fills belonging to a session, oldest first
    async fn fills_for_session(&self, id: SessionId) -> anyhow::Result<Vec<Fill>>;

    /// Most recent sessions, newest first (reporting)
    async fn recent_sessions(&self, limit: i64) -> anyhow::Result<Vec<Session>>;

    /// Most recent fills across sessions, newest first (reporting)
    async fn recent_fills(&self, limit: i64) -> anyhow::Result<Vec<Fill>>;

    /// Sum of realized P&L over settled sessions (reporting)
    async fn total_pnl(&self) -> anyhow::Result<Decimal>;
}

#[async_trait]
impl<T: SessionStore + ?Sized> SessionStore for std::sync::Arc<T> {
    async fn create_session(&self, new: NewSession) -> anyhow::Result<SessionId> {
        (**self).create_session(new).await
    }

    async fn attach_market(
        &self,
        id: SessionId,
        condition_id: &str,
        question: &str,
    ) -> anyhow::Result<()> {
        (**self).attach_market(id, condition_id, question).await
    }

    async fn record_fill(
        &self,
        id: SessionId,
        side: Side,
        price: Decimal,
        quantity: i64,
        ts: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        (**self).record_fill(id, side, price, quantity, ts).await
    }

    async fn close_session(
        &self,
        id: SessionId,
        end_ts: DateTime<Utc>,
        pnl: Decimal,
    ) -> anyhow::Result<()> {
        (**self).close_session(id, end_ts, pnl).await
    }

    async fn load_session(&self, id: SessionId) -> anyhow::Result<Option<Session>> {
        (**self).load_session(id).await
    }

    async fn fills_for_session(&self, id: SessionId) -> anyhow::Result<Vec<Fill>> {
        (**self).fills_for_session(id).await
    }

    async fn recent_sessions(&self, limit: i64) -> anyhow::Result<Vec<Session>> {
        (**self).recent_sessions(limit).await
    }

    async fn recent_fills(&self, limit: i64) -> anyhow::Result<Vec<Fill>> {
        (**self).recent_fills(limit).await
    }

    async fn total_pnl(&self) -> anyhow::Result<Decimal> {
        (**self).total_pnl().await
    }
}
