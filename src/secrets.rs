//! Read-once secret provider
//!
//! Secrets are fetched by name once at startup and frozen into a [`Secrets`]
//! value that both binaries share. There is no runtime refresh; rotating a
//! secret means restarting the process.

use crate::config::Args;
use crate::types::{Result, TellerError};

/// Named-string secret source.
///
/// Production wires this to the deployment's secret store; tests and local
/// runs use [`EnvProvider`] or a map.
pub trait SecretProvider {
    fn get(&self, name: &str) -> Option<String>;
}

/// Provider backed by process environment variables.
pub struct EnvProvider;

impl SecretProvider for EnvProvider {
    fn get(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// Provider backed by a static map, for tests.
pub struct MapProvider(pub std::collections::HashMap<String, String>);

impl SecretProvider for MapProvider {
    fn get(&self, name: &str) -> Option<String> {
        self.0.get(name).cloned()
    }
}

/// Immutable secret bundle, populated before the first request.
#[derive(Debug, Clone)]
pub struct Secrets {
    /// Platform Ed25519 public key, hex-encoded (32 bytes)
    pub platform_public_key: String,
    /// Platform application id, used in webhook URLs
    pub application_id: String,
    /// Bot token for command registration
    pub bot_token: Option<String>,
}

impl Secrets {
    /// Build from CLI/env config, falling back to the provider for anything
    /// the config leaves unset.
    pub fn load(args: &Args, provider: &dyn SecretProvider) -> Result<Self> {
        let platform_public_key = args
            .platform_public_key
            .clone()
            .or_else(|| provider.get("PLATFORM_PUBLIC_KEY"))
            .ok_or_else(|| TellerError::Config("PLATFORM_PUBLIC_KEY is not set".to_string()))?;

        let application_id = args
            .platform_application_id
            .clone()
            .or_else(|| provider.get("PLATFORM_APPLICATION_ID"))
            .ok_or_else(|| TellerError::Config("PLATFORM_APPLICATION_ID is not set".to_string()))?;

        let bot_token = args
            .platform_bot_token
            .clone()
            .or_else(|| provider.get("PLATFORM_BOT_TOKEN"));

        Ok(Self {
            platform_public_key,
            application_id,
            bot_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::collections::HashMap;

    #[test]
    fn load_prefers_args_over_provider() {
        let args = Args::parse_from([
            "teller",
            "--platform-public-key",
            &"ab".repeat(32),
            "--platform-application-id",
            "app-from-args",
        ]);
        let provider = MapProvider(HashMap::from([(
            "PLATFORM_APPLICATION_ID".to_string(),
            "app-from-provider".to_string(),
        )]));

        let secrets = Secrets::load(&args, &provider).unwrap();
        assert_eq!(secrets.application_id, "app-from-args");
    }

    #[test]
    fn load_fails_without_public_key() {
        let args = Args::parse_from(["teller", "--platform-application-id", "1234"]);
        let provider = MapProvider(HashMap::new());
        assert!(Secrets::load(&args, &provider).is_err());
    }
}
