//! Deferred follow-up delivery
//!
//! After the gateway returns the deferred ack, the interaction's webhook token
//! stays valid for a bounded window. The worker delivers the real result
//! through that token: PATCH the original deferred message to correct it, or
//! POST a new follow-up for the primary result (the default).
//!
//! Delivery failures are logged and not retried, and never roll back a ledger
//! write that already committed.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::sync::Mutex;
use tracing::warn;

use crate::types::{Result, TellerError};

/// How long the platform keeps an interaction's webhook token usable.
pub const TOKEN_VALIDITY_MINUTES: i64 = 15;

/// How a follow-up reaches the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// PATCH the original deferred message
    EditOriginal,
    /// POST a fresh follow-up message (default for handler results)
    NewMessage,
}

/// Has the interaction's token aged out of its validity window?
pub fn token_expired(received_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now - received_at >= Duration::minutes(TOKEN_VALIDITY_MINUTES)
}

/// Delivery seam so handlers can run against a recording double in tests.
#[async_trait]
pub trait FollowupSender: Send + Sync {
    /// Deliver `content`. Returns the platform message id when available.
    async fn send(
        &self,
        token: &str,
        received_at: DateTime<Utc>,
        content: &str,
        mode: DeliveryMode,
    ) -> Result<Option<String>>;
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    id: Option<String>,
}

/// Real sender against the platform webhook API.
pub struct PlatformFollowup {
    http: reqwest::Client,
    api_base: String,
    application_id: String,
}

impl PlatformFollowup {
    pub fn new(api_base: &str, application_id: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            application_id: application_id.to_string(),
        }
    }
}

#[async_trait]
impl FollowupSender for PlatformFollowup {
    async fn send(
        &self,
        token: &str,
        received_at: DateTime<Utc>,
        content: &str,
        mode: DeliveryMode,
    ) -> Result<Option<String>> {
        // The token is a time-boxed capability. Delivery after expiry cannot
        // succeed, so it is terminal rather than retried.
        if token_expired(received_at, Utc::now()) {
            return Err(TellerError::Transport(
                "interaction token expired before follow-up delivery".to_string(),
            ));
        }

        let base = format!("{}/webhooks/{}/{token}", self.api_base, self.application_id);
        let request = match mode {
            DeliveryMode::EditOriginal => self.http.patch(format!("{base}/messages/@original")),
            DeliveryMode::NewMessage => self.http.post(base),
        };

        let response = request
            .json(&serde_json::json!({ "content": content }))
            .send()
            .await
            .map_err(|e| TellerError::Transport(format!("follow-up request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, body, "platform follow-up rejected");
            return Err(TellerError::Transport(format!(
                "follow-up rejected with status {status}"
            )));
        }

        let message: MessageResponse = response
            .json()
            .await
            .map_err(|e| TellerError::Transport(format!("follow-up response unreadable: {e}")))?;
        Ok(message.id)
    }
}

/// Recording double for handler and pipeline tests.
#[derive(Default)]
pub struct RecordingFollowup {
    sent: Mutex<Vec<(DeliveryMode, String)>>,
    /// Message id handed back for each send
    pub message_id: Option<String>,
}

impl RecordingFollowup {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            message_id: Some("msg-1".to_string()),
        }
    }

    pub fn sent(&self) -> Vec<(DeliveryMode, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl FollowupSender for RecordingFollowup {
    async fn send(
        &self,
        _token: &str,
        received_at: DateTime<Utc>,
        content: &str,
        mode: DeliveryMode,
    ) -> Result<Option<String>> {
        if token_expired(received_at, Utc::now()) {
            return Err(TellerError::Transport(
                "interaction token expired before follow-up delivery".to_string(),
            ));
        }
        self.sent.lock().unwrap().push((mode, content.to_string()));
        Ok(self.message_id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_valid_inside_window() {
        let received = Utc::now();
        assert!(!token_expired(received, received + Duration::minutes(14)));
    }

    #[test]
    fn token_expired_at_window_edge() {
        let received = Utc::now();
        assert!(token_expired(received, received + Duration::minutes(15)));
        assert!(token_expired(received, received + Duration::hours(2)));
    }

    #[tokio::test]
    async fn recording_followup_rejects_expired_token() {
        let followup = RecordingFollowup::new();
        let stale = Utc::now() - Duration::minutes(20);
        let err = followup
            .send("tok", stale, "hello", DeliveryMode::NewMessage)
            .await
            .unwrap_err();
        assert!(matches!(err, TellerError::Transport(_)));
        assert!(followup.sent().is_empty());
    }
}
