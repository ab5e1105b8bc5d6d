//! Diagnostic checks for a hub or spoke context

use crate::argocd::{APPLICATION_CRD, SERVER_SELECTOR};
use crate::config::Config;
use crate::kube::{self, ClusterApi, DeploymentContext};
use crate::services::backup::BackupManager;
use crate::services::credentials::resolve_server_address;
use crate::utils::CommandExecutor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Check {
    pub name: String,
    pub ok: bool,
    pub detail: String,
}

impl Check {
    fn new(name: &str, ok: bool, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            ok,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StatusReport {
    pub checks: Vec<Check>,
}

impl StatusReport {
    pub fn is_healthy(&self) -> bool {
        self.checks.iter().all(|c| c.ok)
    }

    pub fn check(&self, name: &str) -> Option<&Check> {
        self.checks.iter().find(|c| c.name == name)
    }
}

/// Collect checks without failing; every problem becomes a failed check
pub fn collect_status<E: CommandExecutor, K: ClusterApi>(
    exec: &E,
    cluster: &K,
    config: &Config,
    ctx: &DeploymentContext,
) -> StatusReport {
    let mut report = StatusReport::default();

    for tool in ["kubectl", "argocd"] {
        let found = exec.check_command_exists(tool);
        let detail = if found { "found on PATH" } else { "not found on PATH" };
        report.checks.push(Check::new(tool, found, detail));
    }

    if let Err(e) = kube::validate_context(cluster, &ctx.context) {
        report
            .checks
            .push(Check::new("context", false, format!("{:#}", e)));
        return report;
    }
    report
        .checks
        .push(Check::new("context", true, ctx.context.clone()));

    let namespace = cluster.get_field(ctx, "namespace", &ctx.namespace, None, "{.metadata.name}");
    report.checks.push(match namespace {
        Ok(Some(_)) => Check::new("namespace", true, ctx.namespace.clone()),
        Ok(None) => Check::new("namespace", false, format!("{} does not exist", ctx.namespace)),
        Err(e) => Check::new("namespace", false, format!("{:#}", e)),
    });

    report.checks.push(match cluster.crd_established(ctx, APPLICATION_CRD) {
        Ok(true) => Check::new("crds", true, format!("{} established", APPLICATION_CRD)),
        Ok(false) => Check::new("crds", false, format!("{} not established", APPLICATION_CRD)),
        Err(e) => Check::new("crds", false, format!("{:#}", e)),
    });

    report.checks.push(match cluster.pods_ready(ctx, &ctx.namespace, SERVER_SELECTOR) {
        Ok(true) => Check::new("server", true, "pods ready"),
        Ok(false) => Check::new("server", false, "pods not ready"),
        Err(e) => Check::new("server", false, format!("{:#}", e)),
    });

    report.checks.push(Check::new(
        "address",
        true,
        resolve_server_address(cluster, config, ctx),
    ));

    report.checks.push(match BackupManager::new(&config.backup_dir).list() {
        Ok(backups) => {
            let detail = match backups.first() {
                Some(newest) => format!(
                    "{} artifact(s), newest {}",
                    backups.len(),
                    newest.path.display()
                ),
                None => format!("none in {}", config.backup_dir.display()),
            };
            Check::new("backups", true, detail)
        }
        Err(e) => Check::new("backups", false, format!("{:#}", e)),
    });

    report
}

pub fn print_status(report: &StatusReport) {
    for check in &report.checks {
        let marker = if check.ok { "✓" } else { "✗" };
        println!("  {} {:<10} {}", marker, check.name, check.detail);
    }
    println!();
}
