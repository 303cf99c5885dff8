//! SQLite-backed session store

use super::{Fill, NewSession, Session, SessionId, SessionStore};
use crate::config::TradingMode;
use crate::market::Side;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS sessions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    condition_id TEXT,
    question TEXT NOT NULL,
    start_ts TEXT NOT NULL,
    end_ts TEXT,
    mode TEXT NOT NULL,
    target_shares INTEGER NOT NULL,
    filled_yes INTEGER NOT NULL DEFAULT 0,
    filled_no INTEGER NOT NULL DEFAULT 0,
    price_ceiling TEXT NOT NULL,
    pnl TEXT
);

CREATE TABLE IF NOT EXISTS fills (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id INTEGER NOT NULL REFERENCES sessions(id),
    ts TEXT NOT NULL,
    side TEXT NOT NULL,
    price TEXT NOT NULL,
    quantity INTEGER NOT NULL
);
";

/// Session store backed by SQLite via sqlx
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect to the database at `url` and run migrations
    ///
    /// Accepts `sqlite://path.db` and `sqlite::memory:` URLs. A single
    /// connection is used: in-memory databases exist per connection, and
    /// store access is serial in any case.
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        sqlx::raw_sql(SCHEMA).execute(&pool).await?;

        Ok(Self { pool })
    }

    /// In-memory store for tests
    pub async fn in_memory() -> anyhow::Result<Self> {
        Self::connect("sqlite::memory:").await
    }
}

#[async_trait]
impl SessionStore for SqliteStore {
    async fn create_session(&self, new: NewSession) -> anyhow::Result<SessionId> {
        let result = sqlx::query(
            "INSERT INTO sessions (condition_id, question, start_ts, mode, target_shares, price_ceiling)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(new.condition_id)
        .bind(new.question)
        .bind(new.start_ts)
        .bind(new.mode.as_str())
        .bind(new.target_shares)
        .bind(new.price_ceiling.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to insert session: {e}"))?;

        Ok(SessionId(result.last_insert_rowid()))
    }

    async fn attach_market(
        &self,
        id: SessionId,
        condition_id: &str,
        question: &str,
    ) -> anyhow::Result<()> {
        let result = sqlx::query(
            "UPDATE sessions SET condition_id = ?1, question = ?2
             WHERE id = ?3 AND condition_id IS NULL AND end_ts IS NULL",
        )
        .bind(condition_id)
        .bind(question)
        .bind(id.0)
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to attach market: {e}"))?;

        if result.rows_affected() == 0 {
            anyhow::bail!("Session {id} is closed or already associated");
        }
        Ok(())
    }

    async fn record_fill(
        &self,
        id: SessionId,
        side: Side,
        price: Decimal,
        quantity: i64,
        ts: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        if quantity <= 0 {
            anyhow::bail!("Fill quantity must be positive: {quantity}");
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to begin fill transaction: {e}"))?;

        sqlx::query(
            "INSERT INTO fills (session_id, ts, side, price, quantity)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(id.0)
        .bind(ts)
        .bind(side.as_str())
        .bind(price.to_string())
        .bind(quantity)
        .execute(&mut *tx)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to insert fill: {e}"))?;

        let counter = match side {
            Side::Yes => "filled_yes",
            Side::No => "filled_no",
        };

        // Guarded so the counter can never pass the target; zero rows
        // affected rolls back the fill insert with it
        let update = format!(
            "UPDATE sessions SET {counter} = {counter} + ?1
             WHERE id = ?2 AND end_ts IS NULL AND {counter} + ?1 <= target_shares"
        );

        let result = sqlx::query(&update)
            .bind(quantity)
            .bind(id.0)
            .execute(&mut *tx)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to update fill counter: {e}"))?;

        if result.rows_affected() == 0 {
            anyhow::bail!("Fill of {quantity} {side} rejected for session {id}");
        }

        tx.commit()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to commit fill: {e}"))?;
        Ok(())
    }

    async fn close_session(
        &self,
        id: SessionId,
        end_ts: DateTime<Utc>,
        pnl: Decimal,
    ) -> anyhow::Result<()> {
        let result = sqlx::query(
            "UPDATE sessions SET end_ts = ?1, pnl = ?2 WHERE id = ?3 AND end_ts IS NULL",
        )
        .bind(end_ts)
        .bind(pnl.to_string())
        .bind(id.0)
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to close session: {e}"))?;

        if result.rows_affected() == 0 {
            anyhow::bail!("Session {id} is already closed");
        }
        Ok(())
    }

    async fn load_session(&self, id: SessionId) -> anyhow::Result<Option<Session>> {
        sqlx::query_as::<_, SessionRow>("SELECT * FROM sessions WHERE id = ?1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to load session: {e}"))?
            .map(SessionRow::into_session)
            .transpose()
    }

    async fn fills_for_session(&self, id: SessionId) -> anyhow::Result<Vec<Fill>> {
        let rows = sqlx::query_as::<_, FillRow>(
            "SELECT * FROM fills WHERE session_id = ?1 ORDER BY id ASC",
        )
        .bind(id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to load fills: {e}"))?;

        rows.into_iter().map(FillRow::into_fill).collect()
    }

    async fn recent_sessions(&self, limit: i64) -> anyhow::Result<Vec<Session>> {
        let rows =
            sqlx::query_as::<_, SessionRow>("SELECT * FROM sessions ORDER BY id DESC LIMIT ?1")
                .bind(limit)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to load sessions: {e}"))?;

        rows.into_iter().map(SessionRow::into_session).collect()
    }

    async fn recent_fills(&self, limit: i64) -> anyhow::Result<Vec<Fill>> {
        let rows = sqlx::query_as::<_, FillRow>("SELECT * FROM fills ORDER BY id DESC LIMIT ?1")
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to load fills: {e}"))?;

        rows.into_iter().map(FillRow::into_fill).collect()
    }

    async fn total_pnl(&self) -> anyhow::Result<Decimal> {
        // Decimals are stored as TEXT, so the sum happens here rather than
        // in SQL
        let values: Vec<(String,)> =
            sqlx::query_as("SELECT pnl FROM sessions WHERE pnl IS NOT NULL")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to load realized pnl: {e}"))?;

        let mut total = Decimal::ZERO;
        for (value,) in values {
            total += parse_decimal(&value, "pnl")?;
        }
        Ok(total)
    }
}

/// Raw session row; decimals live as TEXT until converted
#[derive(Debug, sqlx::FromRow)]
struct SessionRow {
    id: i64,
    condition_id: Option<String>,
    question: String,
    start_ts: DateTime<Utc>,
    end_ts: Option<DateTime<Utc>>,
    mode: String,
    target_shares: i64,
    filled_yes: i64,
    filled_no: i64,
    price_ceiling: String,
    pnl: Option<String>,
}

impl SessionRow {
    fn into_session(self) -> anyhow::Result<Session> {
        let mode = TradingMode::parse(&self.mode)
            .ok_or_else(|| anyhow::anyhow!("Unknown trading mode in store: {}", self.mode))?;
        let price_ceiling = parse_decimal(&self.price_ceiling, "price_ceiling")?;
        let pnl = self
            .pnl
            .as_deref()
            .map(|v| parse_decimal(v, "pnl"))
            .transpose()?;

        Ok(Session {
            id: SessionId(self.id),
            condition_id: self.condition_id,
            question: self.question,
            start_ts: self.start_ts,
            end_ts: self.end_ts,
            mode,
            target_shares: self.target_shares,
            filled_yes: self.filled_yes,
            filled_no: self.filled_no,
            price_ceiling,
            pnl,
        })
    }
}

/// Raw fill row
#[derive(Debug, sqlx::FromRow)]
struct FillRow {
    id: i64,
    session_id: i64,
    ts: DateTime<Utc>,
    side: String,
    price: String,
    quantity: i64,
}

impl FillRow {
    fn into_fill(self) -> anyhow::Result<Fill> {
        let side = Side::parse(&self.side)
            .ok_or_else(|| anyhow::anyhow!("Unknown side in store: {}", self.side))?;
        let price = parse_decimal(&self.price, "price")?;

        Ok(Fill {
            id: self.id,
            session_id: SessionId(self.session_id),
            ts: self.ts,
            side,
            price,
            quantity: self.quantity,
        })
    }
}

fn parse_decimal(value: &str, column: &str) -> anyhow::Result<Decimal> {
    Decimal::from_str(value)
        .map_err(|e| anyhow::anyhow!("Invalid decimal in column {column}: {value} ({e})"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn new_session() -> NewSession {
        NewSession {
            condition_id: None,
            question: "pending market".to_string(),
            start_ts: Utc::now(),
            mode: TradingMode::Paper,
            target_shares: 20,
            price_ceiling: dec!(0.35),
        }
    }

    #[tokio::test]
    async fn test_create_and_load_session() {
        let store = SqliteStore::in_memory().await.unwrap();
        let id = store.create_session(new_session()).await.unwrap();

        let session = store.load_session(id).await.unwrap().unwrap();
        assert_eq!(session.id, id);
        assert!(session.condition_id.is_none());
        assert!(session.is_open());
        assert_eq!(session.filled_yes, 0);
        assert_eq!(session.filled_no, 0);
        assert_eq!(session.price_ceiling, dec!(0.35));
        assert!(session.pnl.is_none());
    }

    #[tokio::test]
    async fn test_load_missing_session() {
        let store = SqliteStore::in_memory().await.unwrap();
        assert!(store.load_session(SessionId(42)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_attach_market_sets_identity_once() {
        let store = SqliteStore::in_memory().await.unwrap();
        let id = store.create_session(new_session()).await.unwrap();

        store
            .attach_market(id, "0xabc", "BTC up in 15 minutes?")
            .await
            .unwrap();

        let session = store.load_session(id).await.unwrap().unwrap();
        assert_eq!(session.condition_id.as_deref(), Some("0xabc"));
        assert_eq!(session.question, "BTC up in 15 minutes?");

        // Identity never changes after the first association
        let again = store.attach_market(id, "0xdef", "other").await;
        assert!(again.is_err());
        let session = store.load_session(id).await.unwrap().unwrap();
        assert_eq!(session.condition_id.as_deref(), Some("0xabc"));
    }

    #[tokio::test]
    async fn test_record_fill_updates_counter_atomically() {
        let store = SqliteStore::in_memory().await.unwrap();
        let id = store.create_session(new_session()).await.unwrap();

        store
            .record_fill(id, Side::Yes, dec!(0.30), 20, Utc::now())
            .await
            .unwrap();

        let session = store.load_session(id).await.unwrap().unwrap();
        assert_eq!(session.filled_yes, 20);
        assert_eq!(session.filled_no, 0);

        let fills = store.fills_for_session(id).await.unwrap();
        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].side, Side::Yes);
        assert_eq!(fills[0].price, dec!(0.30));
        assert_eq!(fills[0].quantity, 20);

        // Counters always equal the sum of own-side fills
        let sum: i64 = fills
            .iter()
            .filter(|f| f.side == Side::Yes)
            .map(|f| f.quantity)
            .sum();
        assert_eq!(session.filled_yes, sum);
    }

    #[tokio::test]
    async fn test_record_fill_rejects_exceeding_target() {
        let store = SqliteStore::in_memory().await.unwrap();
        let id = store.create_session(new_session()).await.unwrap();

        store
            .record_fill(id, Side::No, dec!(0.30), 15, Utc::now())
            .await
            .unwrap();

        // 15 + 10 > 20: both halves must be rolled back
        let result = store
            .record_fill(id, Side::No, dec!(0.25), 10, Utc::now())
            .await;
        assert!(result.is_err());

        let session = store.load_session(id).await.unwrap().unwrap();
        assert_eq!(session.filled_no, 15);
        let fills = store.fills_for_session(id).await.unwrap();
        assert_eq!(fills.len(), 1);
    }

    #[tokio::test]
    async fn test_record_fill_rejects_nonpositive_quantity() {
        let store = SqliteStore::in_memory().await.unwrap();
        let id = store.create_session(new_session()).await.unwrap();

        assert!(store
            .record_fill(id, Side::Yes, dec!(0.30), 0, Utc::now())
            .await
            .is_err());
        assert!(store
            .record_fill(id, Side::Yes, dec!(0.30), -5, Utc::now())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_close_session_exactly_once() {
        let store = SqliteStore::in_memory().await.unwrap();
        let id = store.create_session(new_session()).await.unwrap();

        store
            .close_session(id, Utc::now(), dec!(-2.60))
            .await
            .unwrap();

        let session = store.load_session(id).await.unwrap().unwrap();
        assert!(!session.is_open());
        assert_eq!(session.pnl, Some(dec!(-2.60)));

        let again = store.close_session(id, Utc::now(), dec!(0)).await;
        assert!(again.is_err());
    }

    #[tokio::test]
    async fn test_closed_session_rejects_fills() {
        let store = SqliteStore::in_memory().await.unwrap();
        let id = store.create_session(new_session()).await.unwrap();
        store.close_session(id, Utc::now(), dec!(0)).await.unwrap();

        let result = store
            .record_fill(id, Side::Yes, dec!(0.30), 5, Utc::now())
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_total_pnl_sums_settled_sessions() {
        let store = SqliteStore::in_memory().await.unwrap();

        let a = store.create_session(new_session()).await.unwrap();
        let b = store.create_session(new_session()).await.unwrap();
        // A third session stays open and must not count
        store.create_session(new_session()).await.unwrap();

        store.close_session(a, Utc::now(), dec!(1.25)).await.unwrap();
        store
            .close_session(b, Utc::now(), dec!(-2.60))
            .await
            .unwrap();

        assert_eq!(store.total_pnl().await.unwrap(), dec!(-1.35));
    }

    #[tokio::test]
    async fn test_recent_sessions_newest_first() {
        let store = SqliteStore::in_memory().await.unwrap();
        let first = store.create_session(new_session()).await.unwrap();
        let second = store.create_session(new_session()).await.unwrap();

        let sessions = store.recent_sessions(10).await.unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].id, second);
        assert_eq!(sessions[1].id, first);

        let limited = store.recent_sessions(1).await.unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].id, second);
    }

    #[tokio::test]
    async fn test_recent_fills_newest_first() {
        let store = SqliteStore::in_memory().await.unwrap();
        let id = store.create_session(new_session()).await.unwrap();

        store
            .record_fill(id, Side::Yes, dec!(0.30), 5, Utc::now())
            .await
            .unwrap();
        store
            .record_fill(id, Side::No, dec!(0.40), 5, Utc::now())
            .await
            .unwrap();

        let fills = store.recent_fills(10).await.unwrap();
        assert_eq!(fills.len(), 2);
        assert_eq!(fills[0].side, Side::No);
        assert_eq!(fills[1].side, Side::Yes);
    }

    #[tokio::test]
    async fn test_file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("poly-pair.db");
        let url = format!("sqlite://{}", path.display());

        let id = {
            let store = SqliteStore::connect(&url).await.unwrap();
            store.create_session(new_session()).await.unwrap()
        };

        let store = SqliteStore::connect(&url).await.unwrap();
        let session = store.load_session(id).await.unwrap().unwrap();
        assert!(session.is_open());
    }
}
