use crate::argocd::ArgoCli;
use crate::config::Config;
use crate::kube::{ClusterApi, DeploymentContext, Kubectl};
use crate::utils::LocalExecutor;
use anyhow::{Context, Result};
use std::io::{self, Write};

/// Production adapters over the local `kubectl` and `argocd` binaries
pub fn adapters(config: &Config) -> (Kubectl<LocalExecutor>, ArgoCli<LocalExecutor>) {
    (
        Kubectl::new(LocalExecutor),
        ArgoCli::new(LocalExecutor, config.insecure_tls),
    )
}

/// Target context: `--context` flag, then `HUBSPOKE_CONTEXT`, then the
/// kubeconfig current context
pub fn resolve_context<K: ClusterApi>(
    cluster: &K,
    config: &Config,
    flag: Option<&str>,
) -> Result<DeploymentContext> {
    let context = match flag.or(config.default_context.as_deref()) {
        Some(context) => context.to_string(),
        None => cluster
            .current_context()
            .context("No --context given and no current kube context is set")?,
    };
    Ok(DeploymentContext::new(context, config.namespace.clone()))
}

/// Read a secret value from stdin
pub fn prompt_secret(label: &str) -> Result<String> {
    eprint!("{}: ", label);
    io::stderr().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let value = input.trim().to_string();
    if value.is_empty() {
        anyhow::bail!("{} must not be empty", label);
    }
    Ok(value)
}
