use super::utils::{adapters, resolve_context};
use crate::config::Config;
use crate::services::lifecycle;
use crate::services::steps::Role;
use anyhow::Result;

/// Handle install command
pub fn handle_install(config: &Config, context: Option<&str>, role: Role) -> Result<()> {
    let (cluster, _) = adapters(config);
    let ctx = resolve_context(&cluster, config, context)?;
    let report = lifecycle::install(&cluster, config, role, &ctx)?;
    eprintln!();
    eprintln!("✓ {} step(s) applied", report.completed.len());
    Ok(())
}

/// Handle uninstall command
pub fn handle_uninstall(
    config: &Config,
    context: Option<&str>,
    role: Role,
    skip_backup: bool,
) -> Result<()> {
    let (cluster, control_plane) = adapters(config);
    let ctx = resolve_context(&cluster, config, context)?;
    let report = lifecycle::uninstall(&cluster, &control_plane, config, role, &ctx, skip_backup)?;
    eprintln!();
    eprintln!("✓ {} step(s) removed", report.completed.len());
    Ok(())
}
