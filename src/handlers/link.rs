//! `/link` — company ↔ channel mapping
//!
//! Records which channel a company reports into. Insert-only: relinking the
//! same pair is reported back, not overwritten.

use super::{HandlerContext, HandlerReply};
use crate::interaction::normalize;
use crate::queue::QueueMessage;
use crate::store::LinkOutcome;
use crate::types::{Result, TellerError};

pub async fn handle_link(ctx: &HandlerContext, msg: &QueueMessage) -> Result<HandlerReply> {
    let payload = &msg.payload;
    let data = payload
        .data
        .as_ref()
        .ok_or_else(|| TellerError::Validation("interaction has no command data".to_string()))?;
    let cmd = normalize(data);

    let company_code = cmd
        .str_option("acronym")
        .ok_or_else(|| TellerError::Validation("Missing company acronym.".to_string()))?;
    let company = ctx
        .ledger
        .store()
        .find_company_by_code(&company_code.to_uppercase())
        .await?
        .ok_or_else(|| {
            TellerError::Validation(format!("`{company_code}` is invalid / company not found"))
        })?;

    let channel = payload
        .channel
        .as_ref()
        .ok_or_else(|| TellerError::Validation("No originating channel on this command.".to_string()))?;

    let outcome = ctx
        .ledger
        .store()
        .link_channel(company.id, &channel.id, channel.name.as_deref())
        .await?;

    let content = match outcome {
        LinkOutcome::Linked => format!(
            "✅ Linked company `{}` to channel <#{}>.",
            company.code, channel.id
        ),
        LinkOutcome::AlreadyLinked => format!(
            "⚠️ Company `{}` is already linked to channel <#{}>.",
            company.code, channel.id
        ),
    };
    Ok(HandlerReply::message(content))
}
