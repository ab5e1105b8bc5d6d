//! Spoke registration
//!
//! Registration is the one place the kubeconfig current context changes. The
//! switch goes through [`ContextGuard`], which puts the previous context back
//! explicitly and again on drop if the explicit restore never ran.

use crate::argocd::ControlPlane;
use crate::config::Config;
use crate::error::OrchestratorError;
use crate::kube::{self, ClusterApi, DeploymentContext};
use crate::output;
use crate::services::credentials::{admin_session, resolve_server_address};
use anyhow::{Context, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationReport {
    pub cluster_name: String,
    pub hub_address: String,
    /// The hub lists the cluster after registration
    pub visible: bool,
    pub warnings: Vec<String>,
}

struct ContextGuard<'a, K: ClusterApi> {
    cluster: &'a K,
    previous: String,
    restored: bool,
}

impl<'a, K: ClusterApi> ContextGuard<'a, K> {
    fn switch(cluster: &'a K, target: &str) -> Result<Self> {
        let previous = cluster.current_context()?;
        cluster
            .use_context(target)
            .with_context(|| format!("Failed to switch to context {}", target))?;
        tracing::info!(from = %previous, to = %target, "context switched");
        Ok(Self {
            cluster,
            previous,
            restored: false,
        })
    }

    fn restore(mut self) -> Result<()> {
        self.restored = true;
        self.cluster
            .use_context(&self.previous)
            .with_context(|| format!("Failed to restore context {}", self.previous))?;
        tracing::info!(to = %self.previous, "context restored");
        Ok(())
    }
}

impl<K: ClusterApi> Drop for ContextGuard<'_, K> {
    fn drop(&mut self) {
        if self.restored {
            return;
        }
        if let Err(e) = self.cluster.use_context(&self.previous) {
            tracing::error!(
                context = %self.previous,
                error = %format!("{:#}", e),
                "context restore on drop failed"
            );
            output::error(&format!(
                "Could not restore kube context {}: {:#}",
                self.previous, e
            ));
        }
    }
}

/// Register the cluster behind `spoke_context` with the hub's control plane
pub fn register_spoke<K: ClusterApi, C: ControlPlane>(
    cluster: &K,
    control_plane: &C,
    config: &Config,
    hub: &DeploymentContext,
    spoke_context: &str,
    cluster_name: &str,
) -> Result<RegistrationReport> {
    output::section(&format!(
        "Registering {} ({}) with {}",
        cluster_name, spoke_context, hub.context
    ));

    kube::validate_context(cluster, &hub.context)?;
    kube::validate_context(cluster, spoke_context)?;

    let hub_address = resolve_server_address(cluster, config, hub);
    output::info(&format!("Hub control plane at {}", hub_address));

    let admin = admin_session(cluster, control_plane, config, hub, &hub_address)
        .map_err(|e| OrchestratorError::HubAuthFailed(format!("{:#}", e)))?;
    output::success(&format!("Authenticated on {}", hub_address));

    let guard = ContextGuard::switch(cluster, spoke_context)?;
    output::info(&format!("Adding cluster {} as {}...", spoke_context, cluster_name));
    let added = control_plane.add_cluster(&admin.session, spoke_context, cluster_name);
    // The registration outcome wins over a failed restore; the restore error rides along
    let restore_error = guard.restore().err().map(|e| format!("{:#}", e));
    if let Some(error) = &restore_error {
        tracing::error!(context = spoke_context, %error, "kube context left switched");
    }

    if let Err(e) = added {
        let mut reason = format!("{:#}", e);
        if let Some(error) = &restore_error {
            reason.push_str(&format!("; {}", error));
        }
        tracing::error!(cluster = cluster_name, %reason, "registration failed");
        return Err(OrchestratorError::RegistrationFailed {
            name: cluster_name.to_string(),
            reason,
        }
        .into());
    }
    output::success(&format!("Cluster {} registered", cluster_name));

    let mut warnings = Vec::new();
    if let Some(error) = restore_error {
        warnings.push(format!(
            "Kube context is still {}; switch back manually ({})",
            spoke_context, error
        ));
    }
    let visible = match control_plane.list_clusters(&admin.session) {
        Ok(clusters) => {
            let listed = clusters.iter().any(|c| c.name == cluster_name);
            if listed {
                output::success(&format!("{} is visible from the hub", cluster_name));
            } else {
                warnings.push(format!(
                    "{} is not listed by the hub yet; check again with `argocd cluster list`",
                    cluster_name
                ));
            }
            listed
        }
        Err(e) => {
            warnings.push(format!("Could not list clusters on the hub: {:#}", e));
            false
        }
    };
    for warning in &warnings {
        output::warning(warning);
    }

    Ok(RegistrationReport {
        cluster_name: cluster_name.to_string(),
        hub_address,
        visible,
        warnings,
    })
}
