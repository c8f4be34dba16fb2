//! `/register` — director API key validation
//!
//! The member submits a game API key; the handler fetches the company profile
//! with it and confirms the submitting member is that company's director. Key
//! storage itself belongs to the secret-store collaborator and is not handled
//! here; the reply only reports the validation outcome.

use tracing::info;

use super::{HandlerContext, HandlerReply};
use crate::interaction::{normalize, parse_counterparty};
use crate::queue::QueueMessage;
use crate::types::{Result, TellerError};

pub async fn handle_register(ctx: &HandlerContext, msg: &QueueMessage) -> Result<HandlerReply> {
    let payload = &msg.payload;
    let data = payload
        .data
        .as_ref()
        .ok_or_else(|| TellerError::Validation("interaction has no command data".to_string()))?;
    let cmd = normalize(data);

    let api_key = cmd
        .str_option("api_key")
        .ok_or_else(|| TellerError::Validation("Missing API key.".to_string()))?;

    let nick = payload
        .member
        .as_ref()
        .and_then(|m| m.display_name())
        .ok_or_else(|| TellerError::Validation("Could not determine your member name.".to_string()))?;
    let (_, requester_id) = parse_counterparty(nick).ok_or_else(|| {
        TellerError::Validation(format!("Could not extract game ID from `{nick}`"))
    })?;

    info!(requester = requester_id, "validating director API key");

    let url = format!(
        "{}/company/?selections=profile&key={api_key}",
        ctx.game_api_base.trim_end_matches('/')
    );
    let profile: serde_json::Value = ctx
        .http
        .get(url)
        .send()
        .await
        .map_err(|e| TellerError::Transport(format!("game API request failed: {e}")))?
        .json()
        .await
        .map_err(|e| TellerError::Transport(format!("game API response unreadable: {e}")))?;

    Ok(HandlerReply::message(evaluate_profile(&profile, requester_id)))
}

/// Decide the registration outcome from the game's profile response.
fn evaluate_profile(profile: &serde_json::Value, requester_id: u64) -> String {
    if profile.get("error").is_some() {
        return "Invalid API key provided. Please check and retry.".to_string();
    }

    let director = profile
        .get("company")
        .and_then(|c| c.get("director"))
        .and_then(|d| d.as_u64());

    match director {
        Some(id) if id == requester_id => {
            format!("✅ Registered as director of your company (id {requester_id}).")
        }
        _ => "🚫 You are not a company director.".to_string(),
    }
}
