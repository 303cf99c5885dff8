use clap::Parser;
use poly_pair::cli::{Cli, Commands};
use poly_pair::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config).unwrap_or_else(|e| {
        eprintln!("Warning: Could not load config from {}: {}", cli.config, e);
        eprintln!("Using default configuration");
        toml::from_str(include_str!("../config.toml.example")).expect("Invalid default config")
    });

    // Initialize telemetry
    poly_pair::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Run => {
            tracing::info!("Starting trading loop");
            poly_pair::cli::run::execute(&config).await?;
        }
        Commands::Sessions(args) => {
            args.execute(&config).await?;
        }
        Commands::Config => {
            println!("Current configuration:");
            println!(
                "  Market: {} / {}m windows",
                config.market.topic_keyword, config.market.duration_keyword
            );
            println!("  Mode: {}", config.trading.mode);
            println!(
                "  Entry: up to {} shares/side at <= {}",
                config.trading.target_shares, config.trading.price_ceiling
            );
            println!(
                "  Session limit: {}",
                match config.trading.max_sessions {
                    0 => "unbounded".to_string(),
                    n => n.to_string(),
                }
            );
            println!("  Store: {}", config.store.database_url);
        }
    }

    Ok(())
}
