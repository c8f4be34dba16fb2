//! Teller Worker - queue consumer for ledger commands
//!
//! Run one or more of these alongside the gateway to drain the command
//! stream: each instance gets its own durable consumer, so instances share
//! the backlog without coordination.
//!
//! Usage:
//!   teller-worker --nats-url nats://localhost:4222 --ledger-db-path teller.db

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use teller::config::NatsArgs;
use teller::secrets::{EnvProvider, SecretProvider};
use teller::worker::{Worker, WorkerConfig};

#[derive(Parser, Debug)]
#[command(name = "teller-worker")]
#[command(about = "Backend worker for Teller command processing")]
#[command(version)]
struct Args {
    /// NATS configuration
    #[command(flatten)]
    nats: NatsArgs,

    /// Unique worker ID (auto-generated if not provided)
    #[arg(long, env = "WORKER_ID")]
    worker_id: Option<String>,

    /// Path to the SQLite ledger database
    #[arg(long, env = "LEDGER_DB_PATH", default_value = "teller.db")]
    ledger_db_path: String,

    /// Platform REST API base URL
    #[arg(long, env = "PLATFORM_API_BASE", default_value = "https://discord.com/api/v10")]
    platform_api_base: String,

    /// Game API base URL (register command key validation)
    #[arg(long, env = "GAME_API_BASE", default_value = "https://api.torn.com")]
    game_api_base: String,

    /// Platform application id (webhook URL component)
    #[arg(long, env = "PLATFORM_APPLICATION_ID")]
    platform_application_id: Option<String>,

    /// Maximum concurrent commands
    #[arg(long, env = "MAX_CONCURRENT", default_value = "10")]
    max_concurrent: usize,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,teller=debug")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let application_id = match args
        .platform_application_id
        .or_else(|| EnvProvider.get("PLATFORM_APPLICATION_ID"))
    {
        Some(id) => id,
        None => {
            error!("PLATFORM_APPLICATION_ID is required for follow-up delivery");
            std::process::exit(1);
        }
    };
    let config = WorkerConfig {
        worker_id: args
            .worker_id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        nats: args.nats,
        ledger_db_path: args.ledger_db_path,
        platform_api_base: args.platform_api_base,
        game_api_base: args.game_api_base,
        application_id,
        max_concurrent: args.max_concurrent,
    };

    info!(
        "Starting Teller worker {} (NATS: {}, ledger: {})",
        config.worker_id, config.nats.nats_url, config.ledger_db_path
    );

    match Worker::new(config).await {
        Ok(worker) => {
            let worker = std::sync::Arc::new(worker);
            let runner = std::sync::Arc::clone(&worker);
            let worker_handle = tokio::spawn(async move {
                if let Err(e) = runner.run().await {
                    error!("Worker error: {}", e);
                }
            });

            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal");
                    worker.stop().await;
                }
                result = worker_handle => {
                    if let Err(e) = result {
                        error!("Worker task error: {}", e);
                    }
                }
            }
        }
        Err(e) => {
            error!("Failed to start worker: {}", e);
            std::process::exit(1);
        }
    }
}
