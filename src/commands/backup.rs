use super::utils::{adapters, resolve_context};
use crate::BackupCommands;
use crate::config::Config;
use crate::output;
use crate::services::backup::BackupManager;
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// Handle backup subcommands
pub fn handle_backup(
    config: &Config,
    context: Option<&str>,
    command: BackupCommands,
) -> Result<()> {
    let mut manager = BackupManager::new(&config.backup_dir);

    match command {
        BackupCommands::Create { reason } => {
            let (cluster, control_plane) = adapters(config);
            let ctx = resolve_context(&cluster, config, context)?;
            output::section(&format!("Backup of {}", ctx));
            manager.create(&cluster, &control_plane, &ctx, &reason)?;
        }
        BackupCommands::List => {
            let artifacts = manager.list()?;
            if artifacts.is_empty() {
                println!("No backups in {}", manager.dir().display());
            }
            for artifact in artifacts {
                let modified: DateTime<Utc> = artifact.modified.into();
                println!(
                    "  {}  {}",
                    modified.format("%Y-%m-%d %H:%M:%S"),
                    artifact.path.display()
                );
            }
        }
        BackupCommands::Restore { artifact } => {
            let (cluster, control_plane) = adapters(config);
            let ctx = resolve_context(&cluster, config, context)?;
            let artifact = locate_artifact(manager.dir(), &artifact);
            output::section(&format!("Restore of {}", ctx));
            let report =
                manager.restore(&cluster, &control_plane, &config.readiness, &artifact, &ctx)?;
            eprintln!();
            eprintln!(
                "✓ Previous state saved to {}",
                report.safety_snapshot.display()
            );
        }
        BackupCommands::Prune { max_age_days } => {
            let removed = manager.prune(max_age_days)?;
            output::success(&format!(
                "Removed {} backup(s) older than {} day(s)",
                removed, max_age_days
            ));
        }
    }
    Ok(())
}

/// A bare file name that does not exist locally refers to the backup directory
fn locate_artifact(backup_dir: &Path, artifact: &Path) -> PathBuf {
    if artifact.exists() || artifact.components().count() > 1 {
        artifact.to_path_buf()
    } else {
        backup_dir.join(artifact)
    }
}
