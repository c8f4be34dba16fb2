//! Teller - slash-command gateway for the company ledger bot

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use teller::{
    auth::PolicyTable,
    config::Args,
    interaction::SignatureVerifier,
    queue::CommandQueue,
    secrets::{EnvProvider, Secrets},
    server::{self, AppState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("teller={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Teller - Command Gateway");
    info!("======================================");
    info!("Node ID: {}", args.node_id);
    info!("Listen: {}", args.listen);
    info!(
        "Mode: {}",
        if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" }
    );
    info!("Platform API: {}", args.platform_api_base);
    info!("NATS: {}", args.nats.nats_url);
    info!("======================================");

    // Secrets are read once; validate() already guarantees them outside dev
    // mode, so a miss here only happens in development.
    let verifier = match Secrets::load(&args, &EnvProvider) {
        Ok(secrets) => Some(SignatureVerifier::from_hex(&secrets.platform_public_key)?),
        Err(e) => {
            if args.dev_mode {
                warn!("Secrets unavailable (dev mode, continuing unsigned): {}", e);
                None
            } else {
                error!("Failed to load secrets: {}", e);
                std::process::exit(1);
            }
        }
    };

    // Connect to NATS (optional in dev mode)
    let queue = match CommandQueue::connect(&args.nats, &format!("teller-{}", args.node_id)).await {
        Ok(queue) => {
            info!("NATS connected successfully");
            Some(queue)
        }
        Err(e) => {
            if args.dev_mode {
                warn!("NATS connection failed (dev mode, continuing without): {}", e);
                None
            } else {
                error!("NATS connection failed: {}", e);
                std::process::exit(1);
            }
        }
    };

    let state = Arc::new(AppState {
        args,
        verifier,
        policies: Arc::new(PolicyTable::standard()),
        queue,
    });

    server::run(state).await?;
    Ok(())
}
