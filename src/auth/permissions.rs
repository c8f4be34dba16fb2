//! Per-command role and channel allow-lists
//!
//! Each normalized command identifier maps to one [`Policy`]: the role set
//! allowed to invoke it and the channel set it may be invoked from. A member
//! is authorized iff their role set intersects the allowed roles AND the
//! origin channel is allowed. Roles are checked first, channel second, and the
//! rejection names which predicate failed. Unknown identifiers are denied.

use std::collections::{HashMap, HashSet};

// Guild role ids. The everyone role shares the guild id.
pub const ROLE_EVERYONE: u64 = 1419520053971517633;
pub const ROLE_JONIN: u64 = 1419589117938761839;
pub const ROLE_ANBU: u64 = 1423550306243055627;
pub const ROLE_HOKAGE: u64 = 1423558170621640764;
pub const ROLE_SERVER_ADMIN: u64 = 1419804995532099624;

// Channel ids commands are allowed from.
pub const CHANNEL_LEDGER: u64 = 1419601178803240961;
pub const CHANNEL_REGISTRATION: u64 = 1419601223311985702;
pub const CHANNEL_ADMIN: u64 = 1419805210335838209;

/// Why the gate refused a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    /// No intersection between member roles and the command's allowed roles.
    Role,
    /// Roles matched but the origin channel is not allowed.
    Channel,
    /// No policy exists for the identifier.
    UnknownCommand,
}

impl DenyReason {
    /// User-visible rejection line.
    pub fn message(&self, identifier: &str) -> String {
        match self {
            DenyReason::Role => {
                format!("🚫 You do not have a role that can run `/{identifier}`.")
            }
            DenyReason::Channel => {
                format!("🚫 `/{identifier}` cannot be used in this channel.")
            }
            DenyReason::UnknownCommand => {
                format!("🚫 Unknown command `/{identifier}`.")
            }
        }
    }
}

/// Allow-lists for one command.
#[derive(Debug, Clone)]
pub struct Policy {
    pub allowed_roles: HashSet<u64>,
    pub allowed_channels: HashSet<u64>,
}

impl Policy {
    pub fn new(
        roles: impl IntoIterator<Item = u64>,
        channels: impl IntoIterator<Item = u64>,
    ) -> Self {
        Self {
            allowed_roles: roles.into_iter().collect(),
            allowed_channels: channels.into_iter().collect(),
        }
    }
}

/// Immutable per-command authorization table, loaded once at startup.
#[derive(Debug, Clone)]
pub struct PolicyTable {
    policies: HashMap<String, Policy>,
    /// Roles allowed to act on behalf of another counterparty.
    delegator_roles: HashSet<u64>,
}

impl PolicyTable {
    pub fn new(
        policies: HashMap<String, Policy>,
        delegator_roles: impl IntoIterator<Item = u64>,
    ) -> Self {
        Self {
            policies,
            delegator_roles: delegator_roles.into_iter().collect(),
        }
    }

    /// The deployed command surface.
    pub fn standard() -> Self {
        let staff = [ROLE_JONIN, ROLE_ANBU, ROLE_HOKAGE];
        let investors = [ROLE_ANBU, ROLE_HOKAGE];

        let mut policies = HashMap::new();
        policies.insert(
            "register".to_string(),
            Policy::new([ROLE_EVERYONE], [CHANNEL_REGISTRATION]),
        );
        policies.insert(
            "link".to_string(),
            Policy::new([ROLE_SERVER_ADMIN, ROLE_HOKAGE], [CHANNEL_ADMIN]),
        );
        policies.insert(
            "company_donate".to_string(),
            Policy::new(staff, [CHANNEL_LEDGER]),
        );
        policies.insert(
            "company_repay".to_string(),
            Policy::new(staff, [CHANNEL_LEDGER]),
        );
        policies.insert(
            "company_invest".to_string(),
            Policy::new(investors, [CHANNEL_LEDGER]),
        );
        policies.insert(
            "company_return".to_string(),
            Policy::new(investors, [CHANNEL_LEDGER]),
        );
        policies.insert(
            "company_info".to_string(),
            Policy::new([ROLE_EVERYONE], [CHANNEL_LEDGER, CHANNEL_ADMIN]),
        );

        Self::new(policies, investors)
    }

    /// Authorize a normalized command. Role predicate first, then channel.
    pub fn authorize(
        &self,
        identifier: &str,
        member_roles: &HashSet<u64>,
        channel_id: Option<u64>,
    ) -> Result<(), DenyReason> {
        let policy = self
            .policies
            .get(identifier)
            .ok_or(DenyReason::UnknownCommand)?;

        if policy.allowed_roles.is_disjoint(member_roles) {
            return Err(DenyReason::Role);
        }

        match channel_id {
            Some(id) if policy.allowed_channels.contains(&id) => Ok(()),
            _ => Err(DenyReason::Channel),
        }
    }

    /// May this role set act on behalf of another counterparty?
    pub fn may_delegate(&self, roles: &HashSet<u64>) -> bool {
        !self.delegator_roles.is_disjoint(roles)
    }
}
