//! Worker processor, a JetStream consumer for queued commands
//!
//! Pulls command messages from the durable stream, dispatches each through the
//! handler table, and acks. Delivery is at-least-once: a crash between
//! dispatch and ack means redelivery, which the ledger's interaction-id
//! uniqueness absorbs.

use async_nats::jetstream::{self, consumer::PullConsumer};
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use super::dispatch;
use crate::auth::PolicyTable;
use crate::config::NatsArgs;
use crate::followup::PlatformFollowup;
use crate::handlers::HandlerContext;
use crate::ledger::LedgerService;
use crate::queue::{CommandQueue, QueueMessage, CMD_SUBJECT_PREFIX};
use crate::store::SqliteStore;
use crate::types::{Result, TellerError};

pub const CONSUMER_NAME_PREFIX: &str = "cmd_worker";

/// Worker configuration
pub struct WorkerConfig {
    /// Unique worker ID, used in the durable consumer name
    pub worker_id: String,
    pub nats: NatsArgs,
    /// Path to the ledger database file
    pub ledger_db_path: String,
    /// Platform API base for follow-up webhooks
    pub platform_api_base: String,
    /// Game API base for register-key validation
    pub game_api_base: String,
    /// Platform application id, part of the webhook URL
    pub application_id: String,
    /// Maximum unacked messages in flight
    pub max_concurrent: usize,
}

/// Backend worker that drains the command queue.
pub struct Worker {
    config: WorkerConfig,
    queue: CommandQueue,
    ctx: HandlerContext,
    running: Arc<RwLock<bool>>,
}

impl Worker {
    /// Connect to NATS, open the ledger database, and assemble the handler
    /// context. Does not start consuming until [`run`](Self::run).
    pub async fn new(config: WorkerConfig) -> Result<Self> {
        info!(
            "Starting worker {} connecting to {}",
            config.worker_id, config.nats.nats_url
        );

        let queue =
            CommandQueue::connect(&config.nats, &format!("teller-worker-{}", config.worker_id))
                .await?;

        let store = Arc::new(SqliteStore::open(&config.ledger_db_path)?);
        let ctx = HandlerContext {
            ledger: LedgerService::new(store),
            followup: Arc::new(PlatformFollowup::new(
                &config.platform_api_base,
                &config.application_id,
            )),
            policies: Arc::new(PolicyTable::standard()),
            game_api_base: config.game_api_base.clone(),
            http: reqwest::Client::new(),
        };

        info!("Worker {} connected", config.worker_id);

        Ok(Self {
            config,
            queue,
            ctx,
            running: Arc::new(RwLock::new(false)),
        })
    }

    /// Run the consume loop until [`stop`](Self::stop) is called.
    pub async fn run(&self) -> Result<()> {
        *self.running.write().await = true;

        let stream = self.queue.ensure_stream().await?;
        let consumer = self.ensure_consumer(&stream).await?;

        info!("Worker {} entering processing loop", self.config.worker_id);

        while *self.running.read().await {
            match self.process_batch(&consumer).await {
                Ok(count) => {
                    if count > 0 {
                        debug!("Processed {} commands", count);
                    }
                }
                Err(e) => {
                    error!("Error processing batch: {}", e);
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }

        info!("Worker {} stopped", self.config.worker_id);
        Ok(())
    }

    /// Stop the worker after the current batch.
    pub async fn stop(&self) {
        *self.running.write().await = false;
    }

    async fn ensure_consumer(
        &self,
        stream: &jetstream::stream::Stream,
    ) -> Result<PullConsumer> {
        let consumer_name = format!("{}_{}", CONSUMER_NAME_PREFIX, self.config.worker_id);

        let consumer = stream
            .get_or_create_consumer(
                &consumer_name,
                jetstream::consumer::pull::Config {
                    durable_name: Some(consumer_name.clone()),
                    ack_policy: jetstream::consumer::AckPolicy::Explicit,
                    filter_subject: format!("{CMD_SUBJECT_PREFIX}.>"),
                    max_ack_pending: self.config.max_concurrent as i64,
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| TellerError::Queue(format!("Failed to create consumer: {e}")))?;

        info!("Using consumer {}", consumer_name);
        Ok(consumer)
    }

    async fn process_batch(&self, consumer: &PullConsumer) -> Result<usize> {
        let mut messages = consumer
            .fetch()
            .max_messages(self.config.max_concurrent)
            .expires(Duration::from_secs(5))
            .messages()
            .await
            .map_err(|e| TellerError::Queue(format!("Failed to fetch messages: {e}")))?;

        let mut count = 0;

        while let Some(msg_result) = messages.next().await {
            match msg_result {
                Ok(msg) => {
                    count += 1;
                    self.process_message(msg).await;
                }
                Err(e) => {
                    warn!("Error receiving message: {}", e);
                }
            }
        }

        Ok(count)
    }

    async fn process_message(&self, msg: jetstream::Message) {
        let queue_msg = match QueueMessage::from_bytes(&msg.payload) {
            Ok(m) => m,
            Err(e) => {
                // Malformed messages can never succeed; ack so they stop
                // redelivering.
                error!("Failed to parse queue message: {}", e);
                if let Err(e) = msg.ack().await {
                    warn!("Failed to ack malformed message: {}", e);
                }
                return;
            }
        };

        debug!(
            command = %queue_msg.command_name,
            initiator = %queue_msg.initiator_id,
            "processing command"
        );

        // Dispatch never returns Err; handler failures become user-visible
        // follow-ups inside. Ack unconditionally afterwards.
        dispatch::dispatch(&self.ctx, &queue_msg).await;

        if let Err(e) = msg.ack().await {
            warn!("Failed to ack message: {}", e);
        }
    }
}
