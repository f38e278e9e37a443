//! `ctrust keys`: signing key maintenance.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::SecondsFormat;
use clap::{Args, Subcommand};

use cluster_trust_core::SystemClock;
use cluster_trust_portal::{KeyManager, PortalConfig};
use cluster_trust_store::FsKeyStore;

/// Where the Portal's keys live.
#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    /// Directory holding the signing key records.
    #[arg(long, env = "CTRUST_KEY_DIR", default_value = "storage/cluster/keys")]
    pub key_dir: PathBuf,

    /// Lifetime of newly generated keys in seconds (0 = never expire).
    #[arg(long, env = "CTRUST_KEY_LIFETIME_SECONDS", default_value_t = 0)]
    pub key_lifetime: u64,
}

impl StoreArgs {
    fn portal_config(&self) -> PortalConfig {
        PortalConfig {
            key_dir: self.key_dir.clone(),
            key_lifetime_seconds: self.key_lifetime,
            ..PortalConfig::default()
        }
    }

    /// Open the key directory and load every key.
    pub fn open_manager(&self) -> anyhow::Result<Arc<KeyManager>> {
        let config = self.portal_config();
        let store = FsKeyStore::open(&config.key_dir)
            .with_context(|| format!("failed to open key directory {}", config.key_dir.display()))?;
        let manager = KeyManager::open(store, &config, Arc::new(SystemClock))
            .context("failed to load signing keys")?;
        Ok(Arc::new(manager))
    }
}

/// Key maintenance actions.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeysAction {
    /// Print the active key, generating one if none is active.
    Ensure,
    /// Generate a new key; older keys keep verifying until they expire.
    Rotate,
    /// List every key, newest last.
    List,
    /// Print the published JWKS document.
    Jwks,
}

/// Run `action` and return what should be printed.
pub fn run(action: KeysAction, manager: &KeyManager) -> anyhow::Result<String> {
    match action {
        KeysAction::Ensure => {
            let key = manager.ensure_active_key()?;
            Ok(key.kid().to_string())
        }
        KeysAction::Rotate => {
            let key = manager.rotate()?;
            tracing::info!(kid = %key.kid(), "Rotated signing key");
            Ok(key.kid().to_string())
        }
        KeysAction::List => Ok(list(manager)),
        KeysAction::Jwks => Ok(serde_json::to_string_pretty(&manager.jwks())?),
    }
}

fn list(manager: &KeyManager) -> String {
    let keys = manager.all_keys();
    if keys.is_empty() {
        return "no keys".to_string();
    }

    let now = manager.clock().now();
    let active = manager.active_key().ok();
    keys.iter()
        .map(|key| {
            let marker = if active.as_ref().is_some_and(|a| a.kid() == key.kid()) {
                '*'
            } else {
                ' '
            };
            let expiry = match key.not_after() {
                None => "no expiry".to_string(),
                Some(at) if key.is_active_at(now) => {
                    format!("expires {}", at.to_rfc3339_opts(SecondsFormat::Secs, true))
                }
                Some(at) => format!("expired {}", at.to_rfc3339_opts(SecondsFormat::Secs, true)),
            };
            format!(
                "{marker} {}  created {}  {expiry}",
                key.kid(),
                key.created_at().to_rfc3339_opts(SecondsFormat::Secs, true)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
