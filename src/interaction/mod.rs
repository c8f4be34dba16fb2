//! Interaction envelope and classification
//!
//! An [`Interaction`] is one verified inbound request from the chat platform.
//! It is transient: parsed from the webhook body, carried through the queue as
//! the original JSON, and never persisted.

pub mod normalize;
pub mod verify;

pub use normalize::{normalize, NormalizedCommand};
pub use verify::SignatureVerifier;

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Option type tag: subcommand
pub const OPTION_SUBCOMMAND: u8 = 1;
/// Option type tag: subcommand group
pub const OPTION_SUBCOMMAND_GROUP: u8 = 2;

/// What an inbound interaction is, after signature verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionKind {
    /// Platform liveness probe; echoed inline, never queued.
    Ping,
    /// User-invoked slash command.
    Command,
    /// Any other type; acknowledged generically, never queued.
    Unknown,
}

/// Verified request envelope from the platform webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    /// Platform-assigned interaction id (also the ledger dedup key)
    pub id: String,

    /// Raw interaction type tag (1 = ping, 2 = command)
    #[serde(rename = "type")]
    pub kind: u8,

    /// One-time webhook token, valid ~15 minutes from receipt
    pub token: String,

    /// Invoking guild member
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member: Option<Member>,

    /// Originating channel
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<Channel>,

    /// Command payload, present for command interactions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<CommandData>,
}

impl Interaction {
    pub fn classify(&self) -> InteractionKind {
        match self.kind {
            1 => InteractionKind::Ping,
            2 => InteractionKind::Command,
            _ => InteractionKind::Unknown,
        }
    }

    /// Role-id set of the invoking member.
    pub fn role_set(&self) -> HashSet<u64> {
        self.member
            .as_ref()
            .map(|m| m.roles.iter().filter_map(|r| r.parse().ok()).collect())
            .unwrap_or_default()
    }

    /// Originating channel id, if the platform sent one.
    pub fn channel_id(&self) -> Option<u64> {
        self.channel.as_ref().and_then(|c| c.id.parse().ok())
    }
}

/// Invoking guild member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nick: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl Member {
    /// Server nick if set, else the account username.
    pub fn display_name(&self) -> Option<&str> {
        self.nick
            .as_deref()
            .or_else(|| self.user.as_ref().map(|u| u.username.as_str()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Raw command tree rooted at the command name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandData {
    pub name: String,
    #[serde(default)]
    pub options: Vec<CommandOption>,
    /// Entities referenced by option values (delegate members)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved: Option<Resolved>,
}

/// One node of the command option tree. Type tags 1 and 2 mark nesting;
/// anything else is a leaf parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandOption {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    #[serde(default)]
    pub options: Vec<CommandOption>,
}

/// Resolved entities keyed by id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Resolved {
    #[serde(default)]
    pub members: HashMap<String, Member>,
}

/// Extract `(name, game id)` from a nick formatted `Name [1234567]`.
///
/// The bracketed game id is the ledger counterparty key; a nick without one
/// cannot transact.
pub fn parse_counterparty(nick: &str) -> Option<(String, u64)> {
    let trimmed = nick.trim_end();
    let close = trimmed.rfind(']')?;
    if close != trimmed.len() - 1 {
        return None;
    }
    let open = trimmed[..close].rfind('[')?;
    let id: u64 = trimmed[open + 1..close].parse().ok()?;
    let name = trimmed[..open].trim_end().to_string();
    Some((name, id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> Interaction {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn classifies_ping_command_unknown() {
        let ping = parse(r#"{"id":"1","type":1,"token":"t"}"#);
        assert_eq!(ping.classify(), InteractionKind::Ping);

        let cmd = parse(r#"{"id":"2","type":2,"token":"t","data":{"name":"ping"}}"#);
        assert_eq!(cmd.classify(), InteractionKind::Command);

        let other = parse(r#"{"id":"3","type":3,"token":"t"}"#);
        assert_eq!(other.classify(), InteractionKind::Unknown);
    }

    #[test]
    fn role_set_parses_string_ids() {
        let i = parse(
            r#"{"id":"1","type":2,"token":"t","member":{"roles":["10","20","bogus"]}}"#,
        );
        assert_eq!(i.role_set(), HashSet::from([10, 20]));
    }

    #[test]
    fn counterparty_from_bracketed_nick() {
        assert_eq!(
            parse_counterparty("pzero [3694180]"),
            Some(("pzero".to_string(), 3694180))
        );
        assert_eq!(parse_counterparty("no id here"), None);
        assert_eq!(parse_counterparty("trailing [123] text"), None);
    }

    #[test]
    fn display_name_prefers_nick() {
        let m = Member {
            nick: Some("nick [1]".to_string()),
            user: Some(User {
                id: "u".to_string(),
                username: "acct".to_string(),
            }),
            roles: vec![],
        };
        assert_eq!(m.display_name(), Some("nick [1]"));

        let m = Member {
            nick: None,
            user: Some(User {
                id: "u".to_string(),
                username: "acct".to_string(),
            }),
            roles: vec![],
        };
        assert_eq!(m.display_name(), Some("acct"));
    }
}
