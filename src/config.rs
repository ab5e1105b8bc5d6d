//! Configuration loaded from `.env` and process environment
//!
//! Every setting has a default so a bare checkout works against a local
//! kubeconfig. Relative paths resolve against the config directory.

use crate::services::credentials::RetryPolicy;
use crate::services::steps::{ReadinessPolicy, ReadinessSettings};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_NAMESPACE: &str = "argocd";
pub const DEFAULT_ROLE: &str = "role:readonly";
pub const DEFAULT_GATE_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone)]
pub struct Config {
    /// Namespace the control plane lives in (hub and spoke)
    pub namespace: String,
    /// Context used when a command does not pass `--context`
    pub default_context: Option<String>,
    /// Root holding the `hub/` and `spoke/` resource sets
    pub manifests_dir: PathBuf,
    pub backup_dir: PathBuf,
    pub token_dir: PathBuf,
    /// Write issued token material to `token_dir` (operator opt-in)
    pub persist_tokens: bool,
    /// Explicit externally reachable hub address, skips discovery
    pub hub_address: Option<String>,
    pub readiness: ReadinessSettings,
    pub credential_retry: RetryPolicy,
    /// Role bound to newly created accounts in policy.csv
    pub default_role: String,
    pub log_file: PathBuf,
    /// Pass --insecure to the argocd CLI (self-signed hub certificates)
    pub insecure_tls: bool,
}

impl Config {
    /// Load `.env` from the config directory, then read the environment
    pub fn load() -> Result<Self> {
        let dir = find_config_dir()?;
        let env_file = dir.join(".env");
        if env_file.exists() {
            dotenv::from_path(&env_file)
                .with_context(|| format!("Failed to load {}", env_file.display()))?;
        }
        Self::from_lookup(&dir, |key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup (environment, map in tests)
    pub fn from_lookup<F>(base_dir: &Path, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let path = |key: &str, default: &str| {
            let raw = get(key).unwrap_or_else(|| default.to_string());
            let p = PathBuf::from(raw);
            if p.is_absolute() { p } else { base_dir.join(p) }
        };

        let policy = match get("HUBSPOKE_READINESS").as_deref() {
            None => ReadinessPolicy::BestEffort,
            Some(value) => value.parse()?,
        };
        let gate_timeout = match get("HUBSPOKE_GATE_TIMEOUT_SECS") {
            Some(v) => v
                .trim()
                .parse::<u64>()
                .with_context(|| format!("Invalid HUBSPOKE_GATE_TIMEOUT_SECS: {}", v))?,
            None => DEFAULT_GATE_TIMEOUT_SECS,
        };

        Ok(Self {
            namespace: get("HUBSPOKE_NAMESPACE").unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
            default_context: get("HUBSPOKE_CONTEXT"),
            manifests_dir: path("HUBSPOKE_MANIFESTS_DIR", "manifests"),
            backup_dir: path("HUBSPOKE_BACKUP_DIR", "backups"),
            token_dir: path("HUBSPOKE_TOKEN_DIR", "tokens"),
            persist_tokens: get("HUBSPOKE_PERSIST_TOKENS")
                .map(|v| parse_flag(&v))
                .unwrap_or(false),
            hub_address: get("HUBSPOKE_HUB_ADDRESS"),
            readiness: ReadinessSettings {
                policy,
                gate_timeout: Duration::from_secs(gate_timeout),
                poll_interval: Duration::from_secs(5),
            },
            credential_retry: RetryPolicy::default(),
            default_role: get("HUBSPOKE_DEFAULT_ROLE").unwrap_or_else(|| DEFAULT_ROLE.to_string()),
            log_file: path("HUBSPOKE_LOG_FILE", "hubspoke.log"),
            insecure_tls: get("HUBSPOKE_INSECURE_TLS")
                .map(|v| parse_flag(&v))
                .unwrap_or(true),
        })
    }
}

/// Directory holding `.env`, backups and tokens
///
/// `HUBSPOKE_CONFIG_DIR` wins, otherwise the current working directory.
pub fn find_config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("HUBSPOKE_CONFIG_DIR") {
        if !dir.trim().is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    std::env::current_dir().context("Failed to determine current directory")
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(Path::new("/srv/hubspoke"), |k| map.get(k).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.namespace, "argocd");
        assert_eq!(config.backup_dir, PathBuf::from("/srv/hubspoke/backups"));
        assert_eq!(config.readiness.policy, ReadinessPolicy::BestEffort);
        assert_eq!(config.readiness.gate_timeout, Duration::from_secs(300));
        assert_eq!(config.credential_retry.attempts, 5);
        assert!(!config.persist_tokens);
        assert!(config.hub_address.is_none());
        assert_eq!(config.default_role, "role:readonly");
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("HUBSPOKE_NAMESPACE", "gitops"),
            ("HUBSPOKE_BACKUP_DIR", "/var/backups/argo"),
            ("HUBSPOKE_READINESS", "strict"),
            ("HUBSPOKE_GATE_TIMEOUT_SECS", "60"),
            ("HUBSPOKE_PERSIST_TOKENS", "yes"),
            ("HUBSPOKE_HUB_ADDRESS", "argocd.example.com"),
        ])
        .unwrap();
        assert_eq!(config.namespace, "gitops");
        assert_eq!(config.backup_dir, PathBuf::from("/var/backups/argo"));
        assert_eq!(config.readiness.policy, ReadinessPolicy::Strict);
        assert_eq!(config.readiness.gate_timeout, Duration::from_secs(60));
        assert!(config.persist_tokens);
        assert_eq!(config.hub_address.as_deref(), Some("argocd.example.com"));
    }

    #[test]
    fn test_blank_values_fall_back_to_defaults() {
        let config = config_from(&[("HUBSPOKE_NAMESPACE", "  ")]).unwrap();
        assert_eq!(config.namespace, "argocd");
    }

    #[test]
    fn test_invalid_readiness_policy_is_rejected() {
        assert!(config_from(&[("HUBSPOKE_READINESS", "sometimes")]).is_err());
    }
}
