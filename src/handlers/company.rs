//! Company ledger commands
//!
//! `/company donate|repay` drive the donation ledger, `/company
//! invest|return` the investment ledger, `/company info` the read-only
//! projection. Donate/invest are the forward direction; repay/return are the
//! reverse direction and require an existing ledger line.

use chrono::Utc;
use tracing::info;

use super::{HandlerContext, HandlerReply};
use crate::interaction::{normalize, parse_counterparty, Interaction, NormalizedCommand};
use crate::ledger::{RecordOutcome, RecordRequest};
use crate::queue::QueueMessage;
use crate::store::LedgerVariant;
use crate::types::{Result, TellerError};

/// Forward-direction handler (donate / invest).
pub async fn handle_forward(
    ctx: &HandlerContext,
    variant: LedgerVariant,
    msg: &QueueMessage,
) -> Result<HandlerReply> {
    let (cmd, req) = build_request(ctx, msg)?;
    let outcome = ctx.ledger.record_forward(variant, req).await?;
    Ok(reply_for(variant, &cmd, outcome))
}

/// Reverse-direction handler (repay / return).
pub async fn handle_reverse(
    ctx: &HandlerContext,
    variant: LedgerVariant,
    msg: &QueueMessage,
) -> Result<HandlerReply> {
    let (cmd, req) = build_request(ctx, msg)?;
    let outcome = ctx.ledger.record_reverse(variant, req).await?;
    Ok(reply_for(variant, &cmd, outcome))
}

/// `/company info`: fixed-width company table.
pub async fn handle_info(ctx: &HandlerContext, _msg: &QueueMessage) -> Result<HandlerReply> {
    let companies = ctx.ledger.companies().await?;
    if companies.is_empty() {
        return Ok(HandlerReply::message("⚠️ No companies found."));
    }

    let header = format!("{:<8}{:<28}{:<20}", "Code", "Name", "Last Updated");
    let mut lines = vec![header.clone(), "-".repeat(header.len())];
    for company in &companies {
        let updated = company
            .last_updated
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        lines.push(format!("{:<8}{:<28}{:<20}", company.code, company.name, updated));
    }

    let content = format!(
        "**Company Info** ({})\n\n```\n{}\n```",
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
        lines.join("\n")
    );
    Ok(HandlerReply::message(content))
}

fn build_request(
    ctx: &HandlerContext,
    msg: &QueueMessage,
) -> Result<(NormalizedCommand, RecordRequest)> {
    let payload = &msg.payload;
    let data = payload
        .data
        .as_ref()
        .ok_or_else(|| TellerError::Validation("interaction has no command data".to_string()))?;
    let cmd = normalize(data);

    let company_code = cmd
        .str_option("acronym")
        .ok_or_else(|| TellerError::Validation("Missing company acronym.".to_string()))?
        .to_string();
    let amount = cmd
        .raw_option("amount")
        .ok_or_else(|| TellerError::Validation("Missing amount.".to_string()))?;
    let note = cmd.str_option("note").map(String::from);

    let (counterparty_name, counterparty_id) = resolve_counterparty(payload, &cmd, ctx)?;

    info!(
        counterparty = %counterparty_name,
        company = %company_code,
        %amount,
        "processing ledger command"
    );

    let initiator_id = payload
        .member
        .as_ref()
        .and_then(|m| m.user.as_ref())
        .map(|u| u.id.clone())
        .unwrap_or_else(|| msg.initiator_id.clone());

    Ok((
        cmd,
        RecordRequest {
            company_code,
            counterparty_id,
            counterparty_name,
            amount,
            note,
            initiator_id,
            interaction_id: payload.id.clone(),
        },
    ))
}

/// Who the transaction is for: the issuer, or a delegate if one was named.
///
/// Delegation is gated on the *issuer's* roles: only members holding a
/// delegator role may record on someone else's behalf.
fn resolve_counterparty(
    payload: &Interaction,
    cmd: &NormalizedCommand,
    ctx: &HandlerContext,
) -> Result<(String, i64)> {
    if let Some(delegate_id) = cmd.str_option("delegate") {
        if !ctx.policies.may_delegate(&payload.role_set()) {
            return Err(TellerError::Authorization(
                "You are not allowed to record on behalf of another member.".to_string(),
            ));
        }

        let delegate = payload
            .data
            .as_ref()
            .and_then(|d| d.resolved.as_ref())
            .and_then(|r| r.members.get(delegate_id))
            .ok_or_else(|| {
                TellerError::Validation(format!("Could not resolve delegate <@{delegate_id}>"))
            })?;

        let nick = delegate.display_name().ok_or_else(|| {
            TellerError::Validation(format!("Could not resolve delegate <@{delegate_id}>"))
        })?;
        let (_, id) = parse_counterparty(nick).ok_or_else(|| {
            TellerError::Validation(format!("Could not extract game ID from delegate {nick}"))
        })?;
        return Ok((nick.to_string(), id as i64));
    }

    let nick = payload
        .member
        .as_ref()
        .and_then(|m| m.display_name())
        .ok_or_else(|| TellerError::Validation("Could not determine your member name.".to_string()))?;
    let (_, id) = parse_counterparty(nick).ok_or_else(|| {
        TellerError::Validation(format!("Could not extract game ID from `{nick}`"))
    })?;
    Ok((nick.to_string(), id as i64))
}

fn reply_for(
    variant: LedgerVariant,
    cmd: &NormalizedCommand,
    outcome: RecordOutcome,
) -> HandlerReply {
    match outcome {
        RecordOutcome::Recorded {
            transaction_id,
            company,
            amount,
        } => {
            let note = cmd.str_option("note").unwrap_or("-");
            let content = format!(
                "✅ {} of **${amount}** recorded for **{} ({})** under note *{note}*.",
                verb(variant, cmd),
                company.code,
                company.name
            );
            HandlerReply::recorded(content, variant, transaction_id)
        }
        RecordOutcome::AlreadyRecorded { company } => HandlerReply::message(format!(
            "ℹ️ This command was already recorded for **{} ({})**.",
            company.code, company.name
        )),
    }
}

fn verb(variant: LedgerVariant, cmd: &NormalizedCommand) -> &'static str {
    let reverse = cmd.identifier.ends_with("repay") || cmd.identifier.ends_with("return");
    match (variant, reverse) {
        (LedgerVariant::Donation, false) => "Donation",
        (LedgerVariant::Donation, true) => "Repayment",
        (LedgerVariant::Investment, false) => "Investment",
        (LedgerVariant::Investment, true) => "Return",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::permissions::{ROLE_ANBU, ROLE_JONIN};
    use crate::auth::PolicyTable;
    use crate::followup::RecordingFollowup;
    use crate::ledger::LedgerService;
    use crate::store::{LedgerStore, MemoryStore};
    use std::sync::Arc;

    fn context(store: Arc<MemoryStore>) -> HandlerContext {
        HandlerContext {
            ledger: LedgerService::new(store),
            followup: Arc::new(RecordingFollowup::new()),
            policies: Arc::new(PolicyTable::standard()),
            game_api_base: "http://localhost:0".to_string(),
            http: reqwest::Client::new(),
        }
    }

    fn donate_msg(roles: &[u64], delegate: Option<&str>) -> QueueMessage {
        let mut options = vec![
            serde_json::json!({"name":"acronym","type":3,"value":"ABC"}),
            serde_json::json!({"name":"amount","type":4,"value":100}),
            serde_json::json!({"name":"note","type":3,"value":"Initial Funding"}),
        ];
        let mut resolved = serde_json::json!(null);
        if let Some(id) = delegate {
            options.push(serde_json::json!({"name":"delegate","type":6,"value":id}));
            resolved = serde_json::json!({"members":{id:{"nick":"delegated [777]","roles":[]}}});
        }
        let payload: Interaction = serde_json::from_value(serde_json::json!({
            "id": "ix-50",
            "type": 2,
            "token": "tok",
            "member": {
                "nick": "pzero [3694180]",
                "user": {"id": "u-1", "username": "pzero"},
                "roles": roles.iter().map(|r| r.to_string()).collect::<Vec<_>>()
            },
            "channel": {"id": "900", "name": "ledger"},
            "data": {
                "name": "company",
                "options": [{"name": "donate", "type": 1, "options": options}],
                "resolved": resolved
            }
        }))
        .unwrap();
        QueueMessage::new("company_donate".to_string(), payload, "u-1".to_string())
    }

    #[tokio::test]
    async fn donate_records_against_issuer_nick() {
        let store = Arc::new(MemoryStore::new());
        store.upsert_company("ABC", "Acme Bomb Co").await.unwrap();
        let ctx = context(store.clone());

        let reply = handle_forward(&ctx, LedgerVariant::Donation, &donate_msg(&[ROLE_JONIN], None))
            .await
            .unwrap();

        assert!(reply.content.contains("$100"));
        assert!(reply.content.contains("Acme Bomb Co"));
        let txns = store.transactions(LedgerVariant::Donation);
        assert_eq!(txns.len(), 1);
        assert_eq!(txns[0].amount, 100);
    }

    #[tokio::test]
    async fn delegate_requires_delegator_role() {
        let store = Arc::new(MemoryStore::new());
        store.upsert_company("ABC", "Acme Bomb Co").await.unwrap();
        let ctx = context(store.clone());

        let err = handle_forward(
            &ctx,
            LedgerVariant::Donation,
            &donate_msg(&[ROLE_JONIN], Some("888")),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, TellerError::Authorization(_)));
        assert!(store.transactions(LedgerVariant::Donation).is_empty());

        let reply = handle_forward(
            &ctx,
            LedgerVariant::Donation,
            &donate_msg(&[ROLE_ANBU], Some("888")),
        )
        .await
        .unwrap();
        assert!(reply.recorded.is_some());

        // Ledger line belongs to the delegate, not the issuer
        assert_eq!(
            store.master_count(LedgerVariant::Donation),
            1,
        );
        let master = store
            .find_master(LedgerVariant::Donation, 1, 777)
            .await
            .unwrap();
        assert!(master.is_some());
    }

    #[tokio::test]
    async fn info_renders_company_table() {
        let store = Arc::new(MemoryStore::new());
        store.upsert_company("ABC", "Acme Bomb Co").await.unwrap();
        store.upsert_company("ZED", "Zed Industries").await.unwrap();
        let ctx = context(store);

        let reply = handle_info(&ctx, &donate_msg(&[], None)).await.unwrap();
        assert!(reply.content.contains("Company Info"));
        assert!(reply.content.contains("ABC"));
        assert!(reply.content.contains("Zed Industries"));
    }

    #[tokio::test]
    async fn nick_without_game_id_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        store.upsert_company("ABC", "Acme Bomb Co").await.unwrap();
        let ctx = context(store.clone());

        let mut msg = donate_msg(&[ROLE_JONIN], None);
        msg.payload.member.as_mut().unwrap().nick = Some("no id".to_string());

        let err = handle_forward(&ctx, LedgerVariant::Donation, &msg)
            .await
            .unwrap_err();
        assert!(matches!(err, TellerError::Validation(_)));
        assert!(store.transactions(LedgerVariant::Donation).is_empty());
    }
}
