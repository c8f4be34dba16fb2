//! Queue message types for the gateway → worker hand-off
//!
//! One [`QueueMessage`] per authorized command interaction. The queue is
//! at-least-once and unordered: the same message may arrive twice and messages
//! from one member may arrive in either order. Consumers dedup on the
//! interaction id inside the payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::interaction::Interaction;

/// Subject prefix for command dispatch messages
pub const CMD_SUBJECT_PREFIX: &str = "cmd.dispatch";

/// Command hand-off message published by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueMessage {
    /// Normalized command identifier (dispatch key)
    pub command_name: String,

    /// Full interaction envelope as received from the platform
    pub payload: Interaction,

    /// Invoking principal id (platform user id, for audit logs)
    pub initiator_id: String,

    /// Gateway receipt instant; bounds the webhook token's validity window
    pub received_at: DateTime<Utc>,
}

impl QueueMessage {
    pub fn new(command_name: String, payload: Interaction, initiator_id: String) -> Self {
        Self {
            command_name,
            payload,
            initiator_id,
            received_at: Utc::now(),
        }
    }

    /// NATS subject this message is published to.
    pub fn subject(&self) -> String {
        format!("{CMD_SUBJECT_PREFIX}.{}", self.command_name)
    }

    /// Serialize to JSON bytes
    pub fn to_bytes(&self) -> Result<bytes::Bytes, serde_json::Error> {
        serde_json::to_vec(self).map(Into::into)
    }

    /// Deserialize from JSON bytes
    pub fn from_bytes(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interaction() -> Interaction {
        serde_json::from_str(
            r#"{"id":"901","type":2,"token":"tok","data":{"name":"company",
                "options":[{"name":"donate","type":1,"options":[]}]}}"#,
        )
        .unwrap()
    }

    #[test]
    fn subject_includes_command_name() {
        let msg = QueueMessage::new("company_donate".to_string(), interaction(), "123".to_string());
        assert_eq!(msg.subject(), "cmd.dispatch.company_donate");
    }

    #[test]
    fn wire_format_carries_envelope_and_initiator() {
        let msg = QueueMessage::new("company_donate".to_string(), interaction(), "123".to_string());
        let decoded = QueueMessage::from_bytes(&msg.to_bytes().unwrap()).unwrap();

        assert_eq!(decoded.command_name, "company_donate");
        assert_eq!(decoded.initiator_id, "123");
        assert_eq!(decoded.payload.id, "901");
        assert_eq!(decoded.payload.token, "tok");
        assert_eq!(decoded.received_at, msg.received_at);
    }
}
