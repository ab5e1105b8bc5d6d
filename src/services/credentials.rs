//! Credential resolution and control-plane login
//!
//! The bootstrap secret is created asynchronously by the control plane after
//! install, so reads are retried a fixed number of times. Sessions are never
//! cached: each operation that needs one logs in again.

use crate::argocd::{
    ADMIN_USER, BOOTSTRAP_SECRET, ControlPlane, LoginOutcome, SERVER_DEPLOYMENT, Session,
};
use crate::config::Config;
use crate::error::OrchestratorError;
use crate::kube::{ClusterApi, DeploymentContext};
use crate::output;
use anyhow::Result;
use base64::{Engine as _, engine::general_purpose};
use std::time::Duration;

/// Address used when no override is set and no ingress host is found
pub const LOOPBACK_ADDRESS: &str = "localhost:8080";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            delay: Duration::from_secs(2),
        }
    }
}

/// Admin session plus the password it was opened with. Administrative
/// password changes use that password as the authorizing credential.
#[derive(Debug, Clone)]
pub struct AdminSession {
    pub session: Session,
    pub password: String,
}

/// Read and decode the initial admin password from the bootstrap secret
pub fn get_bootstrap_password<K: ClusterApi>(
    cluster: &K,
    ctx: &DeploymentContext,
    retry: &RetryPolicy,
) -> Result<String> {
    let mut reason = format!("secret {} not found", BOOTSTRAP_SECRET);

    for attempt in 1..=retry.attempts {
        match cluster.get_field(
            ctx,
            "secret",
            BOOTSTRAP_SECRET,
            Some(&ctx.namespace),
            "{.data.password}",
        ) {
            Ok(Some(encoded)) => match decode_secret(&encoded) {
                Ok(password) => return Ok(password),
                Err(e) => reason = e,
            },
            Ok(None) => reason = format!("secret {} not found", BOOTSTRAP_SECRET),
            Err(e) => reason = format!("{:#}", e),
        }

        if attempt < retry.attempts {
            output::info(&format!(
                "  Bootstrap secret not ready yet, waiting... (attempt {}/{})",
                attempt, retry.attempts
            ));
            std::thread::sleep(retry.delay);
        }
    }

    Err(OrchestratorError::CredentialUnavailable {
        attempts: retry.attempts,
        reason,
    }
    .into())
}

fn decode_secret(encoded: &str) -> std::result::Result<String, String> {
    let bytes = general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| format!("secret value is not valid base64: {}", e))?;
    let password =
        String::from_utf8(bytes).map_err(|_| "secret value is not valid UTF-8".to_string())?;
    let password = password.trim().to_string();
    if password.is_empty() {
        return Err("secret value is empty".to_string());
    }
    Ok(password)
}

/// One login round-trip
pub fn login<C: ControlPlane>(
    control_plane: &C,
    server: &str,
    username: &str,
    password: &str,
) -> Result<Session> {
    match control_plane.login(server, username, password)? {
        LoginOutcome::Success => {
            tracing::info!(server, username, "login succeeded");
            Ok(Session {
                server: server.to_string(),
                username: username.to_string(),
            })
        }
        LoginOutcome::Failure(reason) => Err(OrchestratorError::AuthenticationFailed {
            server: server.to_string(),
            username: username.to_string(),
            reason,
        }
        .into()),
    }
}

/// Externally reachable control-plane address.
///
/// Explicit override first, then the host of the server ingress, then the
/// loopback fallback.
pub fn resolve_server_address<K: ClusterApi>(
    cluster: &K,
    config: &Config,
    ctx: &DeploymentContext,
) -> String {
    if let Some(address) = &config.hub_address {
        return address.clone();
    }

    match cluster.get_field(
        ctx,
        "ingress",
        SERVER_DEPLOYMENT,
        Some(&ctx.namespace),
        "{.spec.rules[0].host}",
    ) {
        Ok(Some(host)) => host,
        Ok(None) => LOOPBACK_ADDRESS.to_string(),
        Err(e) => {
            tracing::debug!(error = %e, "ingress lookup failed, using loopback address");
            LOOPBACK_ADDRESS.to_string()
        }
    }
}

/// Bootstrap password plus admin login against `server`
pub fn admin_session<K: ClusterApi, C: ControlPlane>(
    cluster: &K,
    control_plane: &C,
    config: &Config,
    ctx: &DeploymentContext,
    server: &str,
) -> Result<AdminSession> {
    let password = get_bootstrap_password(cluster, ctx, &config.credential_retry)?;
    let session = login(control_plane, server, ADMIN_USER, &password)?;
    Ok(AdminSession { session, password })
}
