//! Mutable control state shared between the scheduler and control handlers
//!
//! All reads and writes go through [`ControlHandle`], which guards the state
//! with a single lock. The scheduler reads a snapshot once per poll; control
//! changes take effect on the next poll.

use crate::config::{TradingConfig, TradingMode};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

/// Control input validation errors
#[derive(Debug, Error)]
pub enum ControlError {
    /// Share target must be positive
    #[error("target shares must be positive, got {0}")]
    InvalidTargetShares(i64),
    /// Price ceiling must lie strictly between 0 and 1
    #[error("price ceiling must be between 0 and 1 exclusive, got {0}")]
    InvalidPriceCeiling(Decimal),
}

pub fn validate_target_shares(target: i64) -> Result<(), ControlError> {
    if target <= 0 {
        return Err(ControlError::InvalidTargetShares(target));
    }
    Ok(())
}

pub fn validate_price_ceiling(ceiling: Decimal) -> Result<(), ControlError> {
    if ceiling <= Decimal::ZERO || ceiling >= Decimal::ONE {
        return Err(ControlError::InvalidPriceCeiling(ceiling));
    }
    Ok(())
}

/// The mutable bot state behind the control surface
#[derive(Debug, Clone)]
struct ControlState {
    running: bool,
    mode: TradingMode,
    target_shares: i64,
    price_ceiling: Decimal,
    /// None = unbounded
    max_sessions: Option<u32>,
    sessions_closed: u32,
    status: String,
    started_at: Option<DateTime<Utc>>,
}

/// Partial configuration update; unspecified fields stay unchanged
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ControlUpdate {
    pub mode: Option<TradingMode>,
    pub target_shares: Option<i64>,
    pub price_ceiling: Option<Decimal>,
    /// Some(0) normalizes to unbounded
    pub max_sessions: Option<u32>,
}

/// Read-only snapshot of the control state plus derived uptime
#[derive(Debug, Clone, Serialize)]
pub struct ControlSnapshot {
    pub running: bool,
    pub mode: TradingMode,
    pub target_shares: i64,
    pub price_ceiling: Decimal,
    pub max_sessions: Option<u32>,
    pub sessions_closed: u32,
    pub status: String,
    pub uptime_secs: Option<i64>,
}

/// Shared handle over the control state
#[derive(Clone)]
pub struct ControlHandle {
    inner: Arc<Mutex<ControlState>>,
}

impl ControlHandle {
    /// Seed the control state from the trading configuration
    pub fn from_config(config: &TradingConfig) -> Self {
        let max_sessions = match config.max_sessions {
            0 => None,
            n => Some(n),
        };

        Self {
            inner: Arc::new(Mutex::new(ControlState {
                running: false,
                mode: config.mode,
                target_shares: config.target_shares,
                price_ceiling: config.price_ceiling,
                max_sessions,
                sessions_closed: 0,
                status: "idle".to_string(),
                started_at: None,
            })),
        }
    }

    /// Set the run flag and reset the session counter
    pub async fn start(&self) {
        let mut state = self.inner.lock().await;
        state.running = true;
        state.sessions_closed = 0;
        state.started_at = Some(Utc::now());
        state.status = "bot started".to_string();
    }

    /// Clear the run flag; takes effect at the start of the next poll
    pub async fn stop(&self) {
        let mut state = self.inner.lock().await;
        state.running = false;
        state.status = "bot stopped".to_string();
    }

    /// Apply a partial configuration update
    ///
    /// Validation happens before any field is written, so a rejected update
    /// leaves the state untouched.
    pub async fn configure(&self, update: ControlUpdate) -> Result<(), ControlError> {
        if let Some(target) = update.target_shares {
            validate_target_shares(target)?;
        }
        if let Some(ceiling) = update.price_ceiling {
            validate_price_ceiling(ceiling)?;
        }

        let mut state = self.inner.lock().await;
        if let Some(mode) = update.mode {
            state.mode = mode;
        }
        if let Some(target) = update.target_shares {
            state.target_shares = target;
        }
        if let Some(ceiling) = update.price_ceiling {
            state.price_ceiling = ceiling;
        }
        if let Some(max) = update.max_sessions {
            state.max_sessions = if max == 0 { None } else { Some(max) };
        }
        state.status = "settings saved".to_string();
        Ok(())
    }

    /// Snapshot the current state
    pub async fn snapshot(&self) -> ControlSnapshot {
        let state = self.inner.lock().await;
        ControlSnapshot {
            running: state.running,
            mode: state.mode,
            target_shares: state.target_shares,
            price_ceiling: state.price_ceiling,
            max_sessions: state.max_sessions,
            sessions_closed: state.sessions_closed,
            status: state.status.clone(),
            uptime_secs: state
                .started_at
                .map(|at| (Utc::now() - at).num_seconds()),
        }
    }

    pub async fn is_running(&self) -> bool {
        self.inner.lock().await.running
    }

    pub async fn set_status(&self, status: impl Into<String>) {
        self.inner.lock().await.status = status.into();
    }

    /// Record a settled session; stops the bot when the configured limit is
    /// reached and returns whether it did
    pub async fn session_closed(&self) -> bool {
        let mut state = self.inner.lock().await;
        state.sessions_closed += 1;

        match state.max_sessions {
            Some(max) if state.sessions_closed >= max => {
                state.running = false;
                state.status = "session limit reached".to_string();
                true
            }
            _ => false,
        }
    }
}
