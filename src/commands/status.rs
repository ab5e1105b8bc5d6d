use super::utils::{adapters, resolve_context};
use crate::config::Config;
use crate::output;
use crate::services::{credentials, status};
use crate::utils::LocalExecutor;
use anyhow::Result;

/// Handle status command
pub fn handle_status(config: &Config, context: Option<&str>) -> Result<()> {
    let (cluster, _) = adapters(config);
    let ctx = resolve_context(&cluster, config, context)?;

    output::section(&format!("hubspoke status: {}", ctx));
    let report = status::collect_status(&LocalExecutor, &cluster, config, &ctx);
    status::print_status(&report);

    if report.is_healthy() {
        output::success("All checks passed");
    } else {
        output::warning("Some checks failed");
    }
    Ok(())
}

/// Handle password command
pub fn handle_password(config: &Config, context: Option<&str>) -> Result<()> {
    let (cluster, _) = adapters(config);
    let ctx = resolve_context(&cluster, config, context)?;
    let password = credentials::get_bootstrap_password(&cluster, &ctx, &config.credential_retry)?;
    println!("{}", password);
    Ok(())
}
