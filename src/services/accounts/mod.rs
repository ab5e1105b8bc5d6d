//! Local accounts and API tokens on the control plane
//!
//! Accounts are declared in `argocd-cm` and bound to a role in the
//! `policy.csv` document of `argocd-rbac-cm`. Every operation opens its own
//! admin session from the bootstrap secret.

pub mod policy;

use crate::argocd::{
    ControlPlane, POLICY_KEY, RBAC_CONFIG_MAP, SERVER_DEPLOYMENT, SETTINGS_CONFIG_MAP, TokenInfo,
};
use crate::config::Config;
use crate::error::OrchestratorError;
use crate::kube::{self, ClusterApi, DeploymentContext};
use crate::output;
use crate::services::credentials::{AdminSession, admin_session, resolve_server_address};
use crate::services::steps::await_rollout;
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Capabilities granted to every account created here
pub const ACCOUNT_CAPABILITIES: &str = "apiKey, login";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedAccount {
    pub name: String,
    pub role: String,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub id: String,
    /// `"{h}h {m}m"` or `"valid until revocation"`
    pub validity: String,
    pub saved_to: Option<PathBuf>,
}

fn open_admin_session<K: ClusterApi, C: ControlPlane>(
    cluster: &K,
    control_plane: &C,
    config: &Config,
    ctx: &DeploymentContext,
) -> Result<AdminSession> {
    kube::validate_context(cluster, &ctx.context)?;
    let server = resolve_server_address(cluster, config, ctx);
    admin_session(cluster, control_plane, config, ctx, &server)
}

fn require_account<C: ControlPlane>(
    control_plane: &C,
    admin: &AdminSession,
    name: &str,
) -> Result<()> {
    let accounts = control_plane.list_accounts(&admin.session)?;
    if accounts.iter().any(|a| a.name == name) {
        Ok(())
    } else {
        Err(OrchestratorError::AccountNotFound(name.to_string()).into())
    }
}

fn validate_account_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.');
    if !valid {
        anyhow::bail!(
            "Invalid account name '{}': use letters, digits, '-', '_' or '.'",
            name
        );
    }
    Ok(())
}

/// Declare a new account, bind it to the configured default role and set its
/// initial password
pub fn create_account<K: ClusterApi, C: ControlPlane>(
    cluster: &K,
    control_plane: &C,
    config: &Config,
    ctx: &DeploymentContext,
    name: &str,
    initial_password: &str,
) -> Result<CreatedAccount> {
    output::section(&format!("Creating account {}", name));
    validate_account_name(name)?;
    let admin = open_admin_session(cluster, control_plane, config, ctx)?;

    let rbac = cluster
        .get_config_map(ctx, &ctx.namespace, RBAC_CONFIG_MAP)
        .context("Failed to read the authorization policy")?;
    let current_policy = rbac.get(POLICY_KEY).map(String::as_str).unwrap_or("");
    if policy::has_binding(current_policy, name) {
        return Err(OrchestratorError::AccountAlreadyExists(name.to_string()).into());
    }

    let account_key = format!("accounts.{}", name);
    let previous_capabilities = cluster
        .get_config_map(ctx, &ctx.namespace, SETTINGS_CONFIG_MAP)
        .context("Failed to read the account settings")?
        .remove(&account_key);
    let settings = BTreeMap::from([(account_key.clone(), ACCOUNT_CAPABILITIES.to_string())]);
    cluster
        .patch_config_map(ctx, &ctx.namespace, SETTINGS_CONFIG_MAP, &settings)
        .context("Failed to declare the account")?;

    let updated_policy = policy::append_binding(current_policy, name, &config.default_role);
    let rbac_patch = BTreeMap::from([(POLICY_KEY.to_string(), updated_policy)]);
    if let Err(e) = cluster.patch_config_map(ctx, &ctx.namespace, RBAC_CONFIG_MAP, &rbac_patch) {
        undeclare_account(cluster, ctx, &account_key, previous_capabilities);
        return Err(e.context("Failed to update the authorization policy"));
    }
    tracing::info!(account = name, role = %config.default_role, "account declared");
    output::success(&format!("Account {} bound to {}", name, config.default_role));

    output::info(&format!("Restarting {} to load the account...", SERVER_DEPLOYMENT));
    cluster.rollout_restart(ctx, &ctx.namespace, SERVER_DEPLOYMENT)?;
    let warnings: Vec<String> = await_rollout(cluster, ctx, SERVER_DEPLOYMENT, &config.readiness)?
        .into_iter()
        .collect();

    control_plane
        .update_password(&admin.session, name, &admin.password, initial_password)
        .with_context(|| format!("Failed to set the initial password of {}", name))?;
    output::success(&format!("Account {} created", name));

    Ok(CreatedAccount {
        name: name.to_string(),
        role: config.default_role.clone(),
        warnings,
    })
}

/// Put the account settings back the way they were before a failed create
fn undeclare_account<K: ClusterApi>(
    cluster: &K,
    ctx: &DeploymentContext,
    account_key: &str,
    previous: Option<String>,
) {
    let rolled_back = match previous {
        Some(value) => {
            let restore = BTreeMap::from([(account_key.to_string(), value)]);
            cluster.patch_config_map(ctx, &ctx.namespace, SETTINGS_CONFIG_MAP, &restore)
        }
        None => cluster.remove_config_map_keys(
            ctx,
            &ctx.namespace,
            SETTINGS_CONFIG_MAP,
            &[account_key],
        ),
    };
    match rolled_back {
        Ok(()) => tracing::info!(key = account_key, "account declaration rolled back"),
        Err(e) => {
            tracing::error!(key = account_key, error = %format!("{:#}", e), "rollback failed");
            output::error(&format!(
                "Could not roll back {} in {}: {:#}",
                account_key, SETTINGS_CONFIG_MAP, e
            ));
        }
    }
}

/// Set a new password, authorized by the admin password
pub fn rotate_password<K: ClusterApi, C: ControlPlane>(
    cluster: &K,
    control_plane: &C,
    config: &Config,
    ctx: &DeploymentContext,
    name: &str,
    new_password: &str,
) -> Result<()> {
    let admin = open_admin_session(cluster, control_plane, config, ctx)?;
    require_account(control_plane, &admin, name)?;
    control_plane
        .update_password(&admin.session, name, &admin.password, new_password)
        .with_context(|| format!("Failed to update the password of {}", name))?;
    tracing::info!(account = name, "password rotated");
    output::success(&format!("Password updated for {}", name));
    Ok(())
}

pub fn format_validity(ttl_secs: Option<u64>) -> String {
    match ttl_secs.filter(|&s| s > 0) {
        Some(secs) => format!("{}h {}m", secs / 3600, (secs % 3600) / 60),
        None => "valid until revocation".to_string(),
    }
}

/// Issue an API token for `name`. A zero or absent TTL issues a token that
/// never expires.
pub fn issue_token<K: ClusterApi, C: ControlPlane>(
    cluster: &K,
    control_plane: &C,
    config: &Config,
    ctx: &DeploymentContext,
    name: &str,
    ttl_secs: Option<u64>,
) -> Result<IssuedToken> {
    let admin = open_admin_session(cluster, control_plane, config, ctx)?;
    require_account(control_plane, &admin, name)?;

    let ttl = ttl_secs.filter(|&s| s > 0);
    let id = Uuid::new_v4().to_string();
    let token = control_plane
        .generate_token(&admin.session, name, &id, ttl)
        .with_context(|| format!("Failed to issue a token for {}", name))?;
    tracing::info!(account = name, token_id = %id, expires_in = ?ttl, "token issued");

    let saved_to = if config.persist_tokens {
        let path = config.token_dir.join(format!("{}-{}.token", name, id));
        write_token_file(&path, &token)?;
        Some(path)
    } else {
        None
    };

    Ok(IssuedToken {
        token,
        id,
        validity: format_validity(ttl),
        saved_to,
    })
}

fn write_token_file(path: &Path, token: &str) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options
        .open(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    writeln!(file, "{}", token).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

pub fn list_tokens<K: ClusterApi, C: ControlPlane>(
    cluster: &K,
    control_plane: &C,
    config: &Config,
    ctx: &DeploymentContext,
    name: &str,
) -> Result<Vec<TokenInfo>> {
    let admin = open_admin_session(cluster, control_plane, config, ctx)?;
    require_account(control_plane, &admin, name)?;
    control_plane.list_tokens(&admin.session, name)
}

pub fn revoke_token<K: ClusterApi, C: ControlPlane>(
    cluster: &K,
    control_plane: &C,
    config: &Config,
    ctx: &DeploymentContext,
    name: &str,
    token_id: &str,
) -> Result<()> {
    let admin = open_admin_session(cluster, control_plane, config, ctx)?;
    require_account(control_plane, &admin, name)?;
    control_plane
        .revoke_token(&admin.session, name, token_id)
        .with_context(|| format!("Failed to revoke token {} of {}", token_id, name))?;
    tracing::info!(account = name, token_id, "token revoked");
    output::success(&format!("Token {} revoked", token_id));
    Ok(())
}
