//! Configuration for Teller
//!
//! CLI arguments and environment variable handling using clap. Both binaries
//! flatten [`NatsArgs`]; the gateway adds the listen address and the worker
//! adds consumer tuning.

use clap::Parser;
use std::net::SocketAddr;
use uuid::Uuid;

/// Teller - chat-platform command gateway
#[derive(Parser, Debug, Clone)]
#[command(name = "teller")]
#[command(about = "Slash-command gateway for the company ledger bot")]
pub struct Args {
    /// Unique node identifier for this gateway instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Platform Ed25519 public key, hex-encoded
    #[arg(long, env = "PLATFORM_PUBLIC_KEY")]
    pub platform_public_key: Option<String>,

    /// Platform application id (webhook URL component)
    #[arg(long, env = "PLATFORM_APPLICATION_ID")]
    pub platform_application_id: Option<String>,

    /// Platform bot token (command registration, not used on the hot path)
    #[arg(long, env = "PLATFORM_BOT_TOKEN")]
    pub platform_bot_token: Option<String>,

    /// Platform REST API base URL
    #[arg(long, env = "PLATFORM_API_BASE", default_value = "https://discord.com/api/v10")]
    pub platform_api_base: String,

    /// Game API base URL (register command key validation)
    #[arg(long, env = "GAME_API_BASE", default_value = "https://api.torn.com")]
    pub game_api_base: String,

    /// Path to the SQLite ledger database
    #[arg(long, env = "LEDGER_DB_PATH", default_value = "teller.db")]
    pub ledger_db_path: String,

    /// NATS configuration
    #[command(flatten)]
    pub nats: NatsArgs,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Enable development mode (accepts unsigned requests, for local testing only)
    #[arg(long, env = "DEV_MODE", default_value = "false", action = clap::ArgAction::Set)]
    pub dev_mode: bool,
}

/// NATS connection configuration
#[derive(Parser, Debug, Clone)]
pub struct NatsArgs {
    /// NATS server URL
    #[arg(long, env = "NATS_URL", default_value = "nats://127.0.0.1:4222")]
    pub nats_url: String,

    /// NATS username (optional)
    #[arg(long, env = "NATS_USER")]
    pub nats_user: Option<String>,

    /// NATS password (optional)
    #[arg(long, env = "NATS_PASSWORD")]
    pub nats_password: Option<String>,
}

impl Args {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode {
            if self.platform_public_key.is_none() {
                return Err("PLATFORM_PUBLIC_KEY is required in production mode".to_string());
            }
            if self.platform_application_id.is_none() {
                return Err("PLATFORM_APPLICATION_ID is required in production mode".to_string());
            }
        }

        if let Some(ref key) = self.platform_public_key {
            if hex::decode(key).map(|k| k.len() != 32).unwrap_or(true) {
                return Err("PLATFORM_PUBLIC_KEY must be 32 bytes of hex".to_string());
            }
        }

        Ok(())
    }
}
