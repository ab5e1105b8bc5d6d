//! Install and uninstall of the control plane (hub) or managed-target
//! resources (spoke)

use crate::argocd::ControlPlane;
use crate::config::Config;
use crate::kube::{self, ClusterApi, DeploymentContext};
use crate::output;
use crate::services::backup::BackupManager;
use crate::services::steps::{
    Direction, Role, StepReport, install_steps, run_steps, uninstall_steps, validate_steps,
};
use anyhow::Result;

pub fn install<K: ClusterApi>(
    cluster: &K,
    config: &Config,
    role: Role,
    ctx: &DeploymentContext,
) -> Result<StepReport> {
    output::section(&format!("Installing {} on {}", role, ctx));

    let steps = install_steps(role, &ctx.namespace, config.readiness.gate_timeout);
    kube::validate_context(cluster, &ctx.context)?;
    validate_steps(&config.manifests_dir, &steps)?;

    cluster.ensure_namespace(ctx, &ctx.namespace)?;
    output::success(&format!("Namespace {} present", ctx.namespace));

    let report = run_steps(cluster, config, ctx, &steps, Direction::Apply)?.into_result()?;
    output::success(&format!("{} install complete on {}", role, ctx.context));
    Ok(report)
}

/// Remove the role's resources in reverse install order.
///
/// Control-plane state is exported first. A failed export is reported and
/// the removal continues; `skip_backup` skips the export.
pub fn uninstall<K: ClusterApi, C: ControlPlane>(
    cluster: &K,
    control_plane: &C,
    config: &Config,
    role: Role,
    ctx: &DeploymentContext,
    skip_backup: bool,
) -> Result<StepReport> {
    output::section(&format!("Uninstalling {} from {}", role, ctx));

    let steps = uninstall_steps(role, &ctx.namespace);
    kube::validate_context(cluster, &ctx.context)?;
    validate_steps(&config.manifests_dir, &steps)?;

    let mut warnings = Vec::new();
    if skip_backup {
        output::warning("Skipping pre-uninstall backup (--skip-backup)");
        tracing::warn!(context = %ctx.context, "pre-uninstall backup skipped by operator");
    } else {
        let mut backups = BackupManager::new(&config.backup_dir);
        if let Err(e) = backups.snapshot(control_plane, ctx, "pre-uninstall") {
            let warning = format!("Pre-uninstall backup failed, continuing: {:#}", e);
            output::warning(&warning);
            warnings.push(warning);
        }
    }

    let mut report = run_steps(cluster, config, ctx, &steps, Direction::Remove)?.into_result()?;
    warnings.append(&mut report.warnings);
    report.warnings = warnings;
    output::success(&format!("{} uninstall complete on {}", role, ctx.context));
    Ok(report)
}
