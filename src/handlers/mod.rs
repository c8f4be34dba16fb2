//! Command handlers
//!
//! One module per command family. Handlers receive the queue message, do the
//! slow work (store writes, external API calls), and hand a reply back to the
//! dispatcher, which delivers it through the follow-up webhook.

pub mod company;
pub mod link;
pub mod register;

use std::sync::Arc;

use crate::auth::PolicyTable;
use crate::followup::FollowupSender;
use crate::ledger::LedgerService;
use crate::store::LedgerVariant;

/// Everything a handler may touch. Built once per worker process.
pub struct HandlerContext {
    pub ledger: LedgerService,
    pub followup: Arc<dyn FollowupSender>,
    pub policies: Arc<PolicyTable>,
    /// Game API base URL for register-key validation
    pub game_api_base: String,
    pub http: reqwest::Client,
}

/// A handler's reply: the user-visible content plus, for ledger commands, the
/// recorded transaction so the dispatcher can write the message id back.
#[derive(Debug)]
pub struct HandlerReply {
    pub content: String,
    pub recorded: Option<(LedgerVariant, i64)>,
}

impl HandlerReply {
    pub fn message(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            recorded: None,
        }
    }

    pub fn recorded(
        content: impl Into<String>,
        variant: LedgerVariant,
        transaction_id: i64,
    ) -> Self {
        Self {
            content: content.into(),
            recorded: Some((variant, transaction_id)),
        }
    }
}
