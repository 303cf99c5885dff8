//! Sessions report command

use crate::config::Config;
use crate::store::{SessionStore, SqliteStore};
use clap::Args;

#[derive(Args, Debug)]
pub struct SessionsArgs {
    /// Number of sessions to display
    #[arg(short, long, default_value_t = 10)]
    pub limit: i64,

    /// Also list recent fills
    #[arg(short, long)]
    pub fills: bool,
}

impl SessionsArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let store = SqliteStore::connect(&config.store.database_url).await?;

        let sessions = store.recent_sessions(self.limit).await?;
        println!(
            "{:>5}  {:<20} {:>4} {:>4}  {:>10}  {}",
            "id", "market", "yes", "no", "pnl", "question"
        );
        for session in &sessions {
            println!(
                "{:>5}  {:<20} {:>4} {:>4}  {:>10}  {}",
                session.id,
                session.condition_id.as_deref().unwrap_or("-"),
                session.filled_yes,
                session.filled_no,
                session
                    .pnl
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "open".to_string()),
                session.question,
            );
        }

        if self.fills {
            println!();
            println!(
                "{:>5}  {:>8} {:>4} {:>8}  {}",
                "id", "session", "side", "price", "time"
            );
            for fill in store.recent_fills(20).await? {
                println!(
                    "{:>5}  {:>8} {:>4} {:>8}  {}",
                    fill.id,
                    fill.session_id,
                    fill.side,
                    fill.price,
                    fill.ts.to_rfc3339(),
                );
            }
        }

        println!();
        println!("Total realized P&L: {}", store.total_pnl().await?);
        Ok(())
    }
}
