//! Command dispatch table
//!
//! Normalized identifiers map to a closed [`CommandKind`] enum; anything
//! outside it is rejected at the boundary instead of looked up dynamically.
//! The dispatcher owns the reply path: it runs the handler, converts errors
//! into user-visible text, delivers the follow-up, and writes the platform
//! message id back onto recorded transactions.

use tracing::{error, warn};

use crate::followup::DeliveryMode;
use crate::handlers::{self, HandlerContext, HandlerReply};
use crate::queue::QueueMessage;
use crate::store::LedgerVariant;
use crate::types::Result;

/// The supported command surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Register,
    Link,
    CompanyDonate,
    CompanyRepay,
    CompanyInvest,
    CompanyReturn,
    CompanyInfo,
}

impl CommandKind {
    /// Map a normalized identifier to a handler. `None` means no handler
    /// claims the identifier and the message cannot be completed.
    pub fn from_identifier(identifier: &str) -> Option<Self> {
        match identifier {
            "register" => Some(Self::Register),
            "link" => Some(Self::Link),
            "company_donate" => Some(Self::CompanyDonate),
            "company_repay" => Some(Self::CompanyRepay),
            "company_invest" => Some(Self::CompanyInvest),
            "company_return" => Some(Self::CompanyReturn),
            "company_info" => Some(Self::CompanyInfo),
            _ => None,
        }
    }

    async fn run(self, ctx: &HandlerContext, msg: &QueueMessage) -> Result<HandlerReply> {
        match self {
            Self::Register => handlers::register::handle_register(ctx, msg).await,
            Self::Link => handlers::link::handle_link(ctx, msg).await,
            Self::CompanyDonate => {
                handlers::company::handle_forward(ctx, LedgerVariant::Donation, msg).await
            }
            Self::CompanyRepay => {
                handlers::company::handle_reverse(ctx, LedgerVariant::Donation, msg).await
            }
            Self::CompanyInvest => {
                handlers::company::handle_forward(ctx, LedgerVariant::Investment, msg).await
            }
            Self::CompanyReturn => {
                handlers::company::handle_reverse(ctx, LedgerVariant::Investment, msg).await
            }
            Self::CompanyInfo => handlers::company::handle_info(ctx, msg).await,
        }
    }
}

/// Process one queue message end to end.
///
/// Handler failures are converted to a user-visible follow-up here; the
/// ledger write and the notification are deliberately not transactional, so a
/// failed follow-up never rolls anything back.
pub async fn dispatch(ctx: &HandlerContext, msg: &QueueMessage) {
    let Some(kind) = CommandKind::from_identifier(&msg.command_name) else {
        warn!(command = %msg.command_name, "unhandled command, dropping message");
        return;
    };

    let reply = match kind.run(ctx, msg).await {
        Ok(reply) => reply,
        Err(e) => {
            warn!(command = %msg.command_name, error = %e, "handler failed");
            HandlerReply::message(e.user_message())
        }
    };

    let message_id = match ctx
        .followup
        .send(
            &msg.payload.token,
            msg.received_at,
            &reply.content,
            DeliveryMode::NewMessage,
        )
        .await
    {
        Ok(id) => id,
        Err(e) => {
            // Committed ledger state stays committed; the user just never
            // sees the confirmation. Re-running the command is safe.
            error!(command = %msg.command_name, error = %e, "follow-up delivery failed");
            None
        }
    };

    if let (Some((variant, transaction_id)), Some(message_id)) = (reply.recorded, message_id) {
        if let Err(e) = ctx
            .ledger
            .store()
            .set_transaction_message_id(variant, transaction_id, &message_id)
            .await
        {
            warn!(transaction_id, error = %e, "failed to attach message id");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::permissions::ROLE_JONIN;
    use crate::auth::PolicyTable;
    use crate::followup::RecordingFollowup;
    use crate::interaction::Interaction;
    use crate::ledger::LedgerService;
    use crate::store::{LedgerStore, MemoryStore};
    use std::sync::Arc;

    fn context(store: Arc<MemoryStore>, followup: Arc<RecordingFollowup>) -> HandlerContext {
        HandlerContext {
            ledger: LedgerService::new(store),
            followup,
            policies: Arc::new(PolicyTable::standard()),
            game_api_base: "http://localhost:0".to_string(),
            http: reqwest::Client::new(),
        }
    }

    fn donate_msg(interaction_id: &str) -> QueueMessage {
        let payload: Interaction = serde_json::from_value(serde_json::json!({
            "id": interaction_id,
            "type": 2,
            "token": "tok",
            "member": {
                "nick": "pzero [3694180]",
                "user": {"id": "u-1", "username": "pzero"},
                "roles": [ROLE_JONIN.to_string()]
            },
            "channel": {"id": "900", "name": "ledger"},
            "data": {
                "name": "company",
                "options": [{"name": "donate", "type": 1, "options": [
                    {"name": "acronym", "type": 3, "value": "ABC"},
                    {"name": "amount", "type": 4, "value": 100},
                    {"name": "note", "type": 3, "value": "Initial Funding"}
                ]}]
            }
        }))
        .unwrap();
        QueueMessage::new("company_donate".to_string(), payload, "u-1".to_string())
    }

    #[test]
    fn identifier_mapping_is_closed() {
        assert_eq!(
            CommandKind::from_identifier("company_donate"),
            Some(CommandKind::CompanyDonate)
        );
        assert_eq!(CommandKind::from_identifier("company_audit"), None);
        assert_eq!(CommandKind::from_identifier(""), None);
    }

    #[tokio::test]
    async fn dispatch_records_and_notifies() {
        let store = Arc::new(MemoryStore::new());
        store.upsert_company("ABC", "Acme Bomb Co").await.unwrap();
        let followup = Arc::new(RecordingFollowup::new());
        let ctx = context(store.clone(), followup.clone());

        dispatch(&ctx, &donate_msg("ix-1")).await;

        let sent = followup.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.contains("$100"));

        let txns = store.transactions(LedgerVariant::Donation);
        assert_eq!(txns.len(), 1);
        assert_eq!(txns[0].message_id.as_deref(), Some("msg-1"));
    }

    #[tokio::test]
    async fn dispatch_redelivery_notifies_without_second_row() {
        let store = Arc::new(MemoryStore::new());
        store.upsert_company("ABC", "Acme Bomb Co").await.unwrap();
        let followup = Arc::new(RecordingFollowup::new());
        let ctx = context(store.clone(), followup.clone());

        dispatch(&ctx, &donate_msg("ix-1")).await;
        dispatch(&ctx, &donate_msg("ix-1")).await;

        assert_eq!(store.transactions(LedgerVariant::Donation).len(), 1);
        assert_eq!(followup.sent().len(), 2);
        assert!(followup.sent()[1].1.contains("already recorded"));
    }

    #[tokio::test]
    async fn dispatch_unknown_company_sends_rejection() {
        let store = Arc::new(MemoryStore::new());
        let followup = Arc::new(RecordingFollowup::new());
        let ctx = context(store.clone(), followup.clone());

        dispatch(&ctx, &donate_msg("ix-1")).await;

        assert!(store.transactions(LedgerVariant::Donation).is_empty());
        let sent = followup.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.contains("not found"));
    }

    #[tokio::test]
    async fn dispatch_drops_unrecognized_identifier() {
        let store = Arc::new(MemoryStore::new());
        let followup = Arc::new(RecordingFollowup::new());
        let ctx = context(store, followup.clone());

        let mut msg = donate_msg("ix-1");
        msg.command_name = "company_audit".to_string();
        dispatch(&ctx, &msg).await;

        assert!(followup.sent().is_empty());
    }
}
