//! JetStream command queue client
//!
//! The gateway publishes one message per authorized command; workers consume
//! through durable pull consumers (see `worker::processor`). The stream is the
//! only coordination point between the two tiers.

use async_nats::jetstream::{self, stream::Stream};
use std::time::Duration;
use tracing::info;

use super::messages::{QueueMessage, CMD_SUBJECT_PREFIX};
use crate::config::NatsArgs;
use crate::types::{Result, TellerError};

/// Durable stream holding pending command messages
pub const STREAM_NAME: &str = "COMMANDS";

/// Keep-alive ping interval
const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(120);

/// Command queue handle, safe to clone across request handlers.
#[derive(Clone)]
pub struct CommandQueue {
    client: async_nats::Client,
    jetstream: jetstream::Context,
}

impl CommandQueue {
    /// Connect to NATS and make sure the command stream exists.
    pub async fn connect(args: &NatsArgs, name: &str) -> Result<Self> {
        info!("Connecting to NATS at {}", args.nats_url);

        let mut options = async_nats::ConnectOptions::new()
            .name(name)
            .ping_interval(DEFAULT_PING_INTERVAL)
            .connection_timeout(Duration::from_secs(5));

        if let (Some(user), Some(pass)) = (&args.nats_user, &args.nats_password) {
            options = options.user_and_password(user.clone(), pass.clone());
        }

        let client = options
            .connect(&args.nats_url)
            .await
            .map_err(|e| TellerError::Queue(format!("Failed to connect to NATS: {e}")))?;

        let jetstream = jetstream::new(client.clone());
        let queue = Self { client, jetstream };
        queue.ensure_stream().await?;

        info!("Connected to NATS at {}", args.nats_url);
        Ok(queue)
    }

    /// Create or look up the command stream.
    pub async fn ensure_stream(&self) -> Result<Stream> {
        let stream = self
            .jetstream
            .get_or_create_stream(jetstream::stream::Config {
                name: STREAM_NAME.to_string(),
                subjects: vec![format!("{CMD_SUBJECT_PREFIX}.>")],
                // Messages older than the webhook token window are undeliverable anyway
                max_age: Duration::from_secs(15 * 60),
                ..Default::default()
            })
            .await
            .map_err(|e| TellerError::Queue(format!("Failed to create stream: {e}")))?;

        Ok(stream)
    }

    /// Publish one command message and wait for the broker ack.
    pub async fn publish(&self, msg: &QueueMessage) -> Result<()> {
        let payload = msg
            .to_bytes()
            .map_err(|e| TellerError::Queue(format!("Failed to serialize message: {e}")))?;

        self.jetstream
            .publish(msg.subject(), payload)
            .await
            .map_err(|e| TellerError::Queue(format!("Publish failed: {e}")))?
            .await
            .map_err(|e| TellerError::Queue(format!("Publish not acked: {e}")))?;

        Ok(())
    }

    /// Underlying NATS client, for consumers.
    pub fn inner(&self) -> &async_nats::Client {
        &self.client
    }

    /// JetStream context, for consumers.
    pub fn jetstream(&self) -> &jetstream::Context {
        &self.jetstream
    }
}
