use clap::{Parser, Subcommand};
use std::sync::Arc;

use crate::adapters::PostgresTransactionRepository;
use crate::config::{mask_password, Config};
use crate::services::DashboardAggregator;

#[derive(Parser)]
#[command(name = "laundry-ledger")]
#[command(about = "Laundry order ledger - status workflow and audit trail", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Database management commands
    #[command(subcommand)]
    Db(DbCommands),

    /// Configuration validation
    Config,

    /// Print dashboard statistics
    Stats,
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Run database migrations
    Migrate,
}

pub async fn handle_db_migrate(config: &Config) -> anyhow::Result<()> {
    let pool = crate::db::create_pool(config).await?;

    tracing::info!("Running database migrations...");
    crate::db::run_migrations(&pool).await?;

    println!("✓ Database migrations completed");
    Ok(())
}

pub fn handle_config_validate(config: &Config) -> anyhow::Result<()> {
    tracing::info!("Validating configuration...");

    println!("Configuration:");
    println!("  Server Port: {}", config.server_port);
    println!("  Database URL: {}", mask_password(&config.database_url));
    println!("  Max DB Connections: {}", config.database_max_connections);
    println!("  Log Format: {:?}", config.log_format);

    config.validate()?;

    tracing::info!("Configuration is valid");
    println!("✓ Configuration is valid");
    Ok(())
}

pub async fn handle_stats(config: &Config) -> anyhow::Result<()> {
    let pool = crate::db::create_pool(config).await?;
    let aggregator = DashboardAggregator::new(Arc::new(PostgresTransactionRepository::new(pool)));

    let stats = aggregator
        .stats()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to compute stats: {}", e))?;

    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
