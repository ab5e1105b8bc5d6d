//! Control-plane API adapter
//!
//! [`ControlPlane`] is the only way the orchestrator talks to Argo CD. The
//! production implementation drives the `argocd` CLI, whose login command only
//! reports success in human-readable text. That heuristic is confined to
//! [`classify_login`] so the rest of the crate sees a structured
//! [`LoginOutcome`].

mod cli;

pub use cli::ArgoCli;

use crate::error::OrchestratorError;
use crate::kube::DeploymentContext;
use anyhow::Result;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

/// Secret the control plane generates with the initial admin password
pub const BOOTSTRAP_SECRET: &str = "argocd-initial-admin-secret";
pub const ADMIN_USER: &str = "admin";
pub const SERVER_DEPLOYMENT: &str = "argocd-server";
pub const SERVER_SELECTOR: &str = "app.kubernetes.io/name=argocd-server";
pub const APPLICATION_CRD: &str = "applications.argoproj.io";
/// Config map holding account capability declarations
pub const SETTINGS_CONFIG_MAP: &str = "argocd-cm";
/// Config map holding the `policy.csv` authorization document
pub const RBAC_CONFIG_MAP: &str = "argocd-rbac-cm";
pub const POLICY_KEY: &str = "policy.csv";

/// Result of a login round-trip
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Success,
    Failure(String),
}

/// Authenticated handle for one invocation. Never persisted by this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub server: String,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccountInfo {
    pub name: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    pub id: String,
    /// Unix seconds
    pub issued_at: Option<i64>,
    /// Unix seconds, `None` for non-expiring tokens
    pub expires_at: Option<i64>,
}

impl TokenInfo {
    /// Parse one entry of `argocd account get -o json`'s `tokens` array.
    /// Timestamps arrive as numbers or as decimal strings.
    pub fn from_json(value: &Value) -> Option<Self> {
        let id = value.get("id")?.as_str()?.to_string();
        let seconds = |key: &str| {
            value.get(key).and_then(|v| match v {
                Value::Number(n) => n.as_i64(),
                Value::String(s) => s.parse().ok(),
                _ => None,
            })
        };
        Some(Self {
            id,
            issued_at: seconds("issuedAt"),
            expires_at: seconds("expiresAt").filter(|&t| t > 0),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClusterInfo {
    pub server: String,
    #[serde(default)]
    pub name: String,
}

pub trait ControlPlane {
    fn login(&self, server: &str, username: &str, password: &str) -> Result<LoginOutcome>;

    fn list_accounts(&self, session: &Session) -> Result<Vec<AccountInfo>>;

    /// Change `account`'s password; `current_password` authorizes the change
    fn update_password(
        &self,
        session: &Session,
        account: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<()>;

    /// Issue a token with the given id, expiring after `expires_in_secs` if set
    fn generate_token(
        &self,
        session: &Session,
        account: &str,
        token_id: &str,
        expires_in_secs: Option<u64>,
    ) -> Result<String>;

    fn list_tokens(&self, session: &Session, account: &str) -> Result<Vec<TokenInfo>>;

    fn revoke_token(&self, session: &Session, account: &str, token_id: &str) -> Result<()>;

    /// Export the full control-plane configuration state as YAML
    fn export_state(&self, ctx: &DeploymentContext) -> Result<String>;

    /// Import a previously exported state file
    fn import_state(&self, ctx: &DeploymentContext, artifact: &Path) -> Result<()>;

    fn list_clusters(&self, session: &Session) -> Result<Vec<ClusterInfo>>;

    /// Register the cluster behind `kube_context` under `name`
    fn add_cluster(&self, session: &Session, kube_context: &str, name: &str) -> Result<()>;
}

const LOGIN_SUCCESS_SIGNAL: &str = "logged in successfully";

const LOGIN_FAILURE_SIGNALS: &[&str] = &[
    "invalid username or password",
    "unauthenticated",
    "permission denied",
    "account is disabled",
    "connection refused",
    "no such host",
    "context deadline exceeded",
    "rpc error",
    "fata",
];

/// Classify `argocd login` output into a [`LoginOutcome`].
///
/// Success needs both a zero exit code and the confirmation text. Known
/// failure text or a non-zero exit is a failure. Anything else cannot be
/// classified and is reported as `AmbiguousResponseParsing`.
pub fn classify_login(exit_ok: bool, stdout: &str, stderr: &str) -> Result<LoginOutcome> {
    let combined = format!("{}\n{}", stdout, stderr);
    let lower = combined.to_lowercase();
    let has_success = lower.contains(LOGIN_SUCCESS_SIGNAL);
    let has_failure = LOGIN_FAILURE_SIGNALS.iter().any(|s| lower.contains(s));

    match (exit_ok, has_success, has_failure) {
        (true, true, false) => Ok(LoginOutcome::Success),
        (_, false, true) | (false, false, false) => {
            Ok(LoginOutcome::Failure(first_line(stderr, stdout)))
        }
        _ => Err(OrchestratorError::AmbiguousResponseParsing {
            operation: "argocd login".to_string(),
            output: combined.trim().to_string(),
        }
        .into()),
    }
}

fn first_line(preferred: &str, fallback: &str) -> String {
    preferred
        .lines()
        .chain(fallback.lines())
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("login rejected without a message")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::is_kind;
    use serde_json::json;

    #[test]
    fn test_classify_success() {
        let outcome = classify_login(
            true,
            "'admin:login' logged in successfully\nContext 'argocd.example.com' updated",
            "",
        )
        .unwrap();
        assert_eq!(outcome, LoginOutcome::Success);
    }

    #[test]
    fn test_classify_bad_password() {
        let outcome = classify_login(
            false,
            "",
            "FATA[0000] rpc error: code = Unauthenticated desc = Invalid username or password",
        )
        .unwrap();
        match outcome {
            LoginOutcome::Failure(reason) => assert!(reason.contains("Invalid username")),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_nonzero_exit_without_text() {
        let outcome = classify_login(false, "", "").unwrap();
        assert_eq!(
            outcome,
            LoginOutcome::Failure("login rejected without a message".into())
        );
    }

    #[test]
    fn test_classify_silent_success_is_ambiguous() {
        let err = classify_login(true, "Context updated", "").unwrap_err();
        assert!(is_kind(
            &err,
            &OrchestratorError::AmbiguousResponseParsing {
                operation: String::new(),
                output: String::new()
            }
        ));
    }

    #[test]
    fn test_classify_contradicting_signals_is_ambiguous() {
        let result = classify_login(
            true,
            "logged in successfully",
            "rpc error: code = Unavailable",
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_token_info_accepts_string_and_number_timestamps() {
        let token = TokenInfo::from_json(&json!({
            "id": "a1b2", "issuedAt": "1700000000", "expiresAt": 1700003600
        }))
        .unwrap();
        assert_eq!(token.issued_at, Some(1_700_000_000));
        assert_eq!(token.expires_at, Some(1_700_003_600));

        let forever = TokenInfo::from_json(&json!({ "id": "c3", "issuedAt": 1, "expiresAt": 0 }))
            .unwrap();
        assert_eq!(forever.expires_at, None);
        assert!(TokenInfo::from_json(&json!({ "issuedAt": 1 })).is_none());
    }
}
