use super::utils::{adapters, resolve_context};
use crate::config::Config;
use crate::services::register;
use anyhow::Result;

/// Handle register command; `context` selects the hub
pub fn handle_register(
    config: &Config,
    context: Option<&str>,
    spoke_context: &str,
    name: Option<&str>,
) -> Result<()> {
    let (cluster, control_plane) = adapters(config);
    let hub = resolve_context(&cluster, config, context)?;
    let cluster_name = name.unwrap_or(spoke_context);

    let report = register::register_spoke(
        &cluster,
        &control_plane,
        config,
        &hub,
        spoke_context,
        cluster_name,
    )?;

    eprintln!();
    eprintln!(
        "✓ {} registered with {} ({})",
        report.cluster_name, hub.context, report.hub_address
    );
    Ok(())
}
