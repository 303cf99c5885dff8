//! Run command implementation

use crate::config::{Config, TradingMode};
use crate::control::ControlHandle;
use crate::execution::PaperExecutor;
use crate::market::PolymarketFeed;
use crate::scheduler::{Scheduler, SchedulerConfig};
use crate::store::{SessionStore, SqliteStore};
use std::sync::Arc;
use std::time::Duration;

/// Wire up the scheduler and drive it until ctrl-c or the session limit
pub async fn execute(config: &Config) -> anyhow::Result<()> {
    if config.trading.mode == TradingMode::Live {
        tracing::warn!("Live mode configured; order execution is still simulated");
    }

    let store = Arc::new(SqliteStore::connect(&config.store.database_url).await?);
    let feed = PolymarketFeed::from_config(&config.market);
    let executor = PaperExecutor::new();
    let control = ControlHandle::from_config(&config.trading);
    let scheduler_config = SchedulerConfig::new(config.trading.poll_interval_secs);

    let mut scheduler = Scheduler::new(
        feed,
        Arc::clone(&store),
        executor,
        control.clone(),
        scheduler_config,
    );

    control.start().await;
    tracing::info!(
        mode = %config.trading.mode,
        target_shares = config.trading.target_shares,
        price_ceiling = %config.trading.price_ceiling,
        "Trading loop started"
    );

    let task = tokio::spawn(async move { scheduler.run().await });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupt received, stopping");
            control.stop().await;
        }
        _ = wait_until_stopped(&control) => {
            tracing::info!("Run flag cleared, shutting down");
        }
    }

    // Give the loop one interval to observe the cleared flag
    tokio::time::sleep(Duration::from_secs(2)).await;
    task.abort();

    let snapshot = control.snapshot().await;
    println!("Sessions closed: {}", snapshot.sessions_closed);
    if let Some(secs) = snapshot.uptime_secs {
        println!("Elapsed: {secs}s");
    }
    println!("Status: {}", snapshot.status);
    println!("Total realized P&L: {}", store.total_pnl().await?);

    Ok(())
}

async fn wait_until_stopped(control: &ControlHandle) {
    loop {
        if !control.is_running().await {
            return;
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}
