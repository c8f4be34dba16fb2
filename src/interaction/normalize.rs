//! Command normalization
//!
//! Collapses a command's subcommand / subcommand-group nesting into one flat
//! underscore-joined identifier plus the leaf option list. `/company donate
//! acronym:ABC` becomes identifier `company_donate` with options
//! `[acronym, ...]`. Normalization is total and deterministic: the same tree
//! always yields the same identifier and option order.

use super::{CommandData, CommandOption, OPTION_SUBCOMMAND, OPTION_SUBCOMMAND_GROUP};

/// Flattened command: identifier plus leaf parameters.
#[derive(Debug, Clone)]
pub struct NormalizedCommand {
    /// Underscore-joined path through the command tree
    pub identifier: String,
    /// Leaf-level options in the order the platform sent them
    pub options: Vec<CommandOption>,
}

impl NormalizedCommand {
    /// Look up a string option by name.
    pub fn str_option(&self, name: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|o| o.name == name)
            .and_then(|o| o.value.as_ref())
            .and_then(|v| v.as_str())
    }

    /// Look up an option by name and render its value as a string, whatever
    /// JSON type the platform used. Amounts arrive as either form.
    pub fn raw_option(&self, name: &str) -> Option<String> {
        self.options
            .iter()
            .find(|o| o.name == name)
            .and_then(|o| o.value.as_ref())
            .map(|v| match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
    }
}

/// Flatten a raw command tree.
///
/// Only the first child is inspected at each level: command interaction
/// semantics guarantee exactly one selected branch, so siblings at nesting
/// levels are discarded. The walk stops at the first leaf-typed child.
pub fn normalize(data: &CommandData) -> NormalizedCommand {
    let mut identifier = data.name.clone();
    let mut options: &[CommandOption] = &data.options;

    while let Some(first) = options.first() {
        if first.kind != OPTION_SUBCOMMAND && first.kind != OPTION_SUBCOMMAND_GROUP {
            break;
        }
        identifier.push('_');
        identifier.push_str(&first.name);
        options = &first.options;
    }

    NormalizedCommand {
        identifier,
        options: options.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::CommandData;

    fn data(json: &str) -> CommandData {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn flat_command_normalizes_to_itself() {
        let d = data(r#"{"name":"register","options":[{"name":"api_key","type":3,"value":"k"}]}"#);
        let n = normalize(&d);
        assert_eq!(n.identifier, "register");
        assert_eq!(n.str_option("api_key"), Some("k"));
    }

    #[test]
    fn subcommand_joins_with_underscore() {
        let d = data(
            r#"{"name":"company","options":[{"name":"donate","type":1,"options":[
                {"name":"acronym","type":3,"value":"ABC"},
                {"name":"amount","type":4,"value":100},
                {"name":"note","type":3,"value":"Initial Funding"}
            ]}]}"#,
        );
        let n = normalize(&d);
        assert_eq!(n.identifier, "company_donate");
        assert_eq!(
            n.options.iter().map(|o| o.name.as_str()).collect::<Vec<_>>(),
            vec!["acronym", "amount", "note"]
        );
    }

    #[test]
    fn option_lookup_is_order_independent() {
        let d = data(
            r#"{"name":"company","options":[{"name":"donate","type":1,"options":[
                {"name":"note","type":3,"value":"n"},
                {"name":"acronym","type":3,"value":"ABC"},
                {"name":"amount","type":4,"value":100}
            ]}]}"#,
        );
        let n = normalize(&d);
        assert_eq!(n.identifier, "company_donate");
        assert_eq!(n.str_option("acronym"), Some("ABC"));
        assert_eq!(n.raw_option("amount").as_deref(), Some("100"));
    }

    #[test]
    fn group_then_subcommand_collapses_fully() {
        let d = data(
            r#"{"name":"admin","options":[{"name":"ledger","type":2,"options":[
                {"name":"audit","type":1,"options":[{"name":"code","type":3,"value":"ABC"}]}
            ]}]}"#,
        );
        let n = normalize(&d);
        assert_eq!(n.identifier, "admin_ledger_audit");
        assert_eq!(n.str_option("code"), Some("ABC"));
    }

    #[test]
    fn normalization_is_deterministic() {
        let raw = r#"{"name":"company","options":[{"name":"repay","type":1,"options":[
            {"name":"acronym","type":3,"value":"ABC"}]}]}"#;
        let a = normalize(&data(raw));
        let b = normalize(&data(raw));
        assert_eq!(a.identifier, b.identifier);
        assert_eq!(a.options.len(), b.options.len());
    }
}
