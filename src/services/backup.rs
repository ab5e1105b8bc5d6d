//! Control-plane backup, restore and retention
//!
//! Artifacts are `argocd admin export` dumps named `<reason>-<UTC timestamp>.yaml`.
//! A second snapshot with the same reason in the same second gets a `-N`
//! suffix instead of overwriting the first.

use crate::argocd::{ControlPlane, SERVER_DEPLOYMENT};
use crate::error::OrchestratorError;
use crate::kube::{self, ClusterApi, DeploymentContext};
use crate::output;
use crate::services::steps::{ReadinessSettings, await_rollout};
use anyhow::{Context, Result};
use chrono::Utc;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

const SECONDS_PER_DAY: u64 = 86_400;
const ARTIFACT_EXTENSION: &str = "yaml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupArtifact {
    pub path: PathBuf,
    pub modified: SystemTime,
}

#[derive(Debug)]
pub struct RestoreReport {
    pub safety_snapshot: PathBuf,
    pub warnings: Vec<String>,
}

/// Owns the backup directory for one invocation and remembers what it wrote
pub struct BackupManager {
    dir: PathBuf,
    created: Vec<PathBuf>,
}

impl BackupManager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            created: Vec::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Export control-plane state to a new timestamped artifact
    pub fn snapshot<C: ControlPlane>(
        &mut self,
        control_plane: &C,
        ctx: &DeploymentContext,
        reason: &str,
    ) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            backup_failed(format!("cannot create {}: {}", self.dir.display(), e))
        })?;

        output::info(&format!("Exporting control-plane state from {}...", ctx));
        let exported = control_plane
            .export_state(ctx)
            .map_err(|e| backup_failed(format!("{:#}", e)))?;

        let tag = sanitize_reason(reason);
        let timestamp = Utc::now().format("%Y%m%d-%H%M%S").to_string();

        let mut disambiguator = 0u32;
        let (path, file) = loop {
            let name = if disambiguator == 0 {
                format!("{}-{}.{}", tag, timestamp, ARTIFACT_EXTENSION)
            } else {
                format!("{}-{}-{}.{}", tag, timestamp, disambiguator, ARTIFACT_EXTENSION)
            };
            let path = self.dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => break (path, file),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => disambiguator += 1,
                Err(e) => {
                    return Err(backup_failed(format!(
                        "cannot create {}: {}",
                        path.display(),
                        e
                    )));
                }
            }
        };

        write_artifact(&path, file, exported.as_bytes())?;

        tracing::info!(
            artifact = %path.display(),
            reason = %tag,
            context = %ctx.context,
            "snapshot written"
        );
        output::success(&format!("Backup written to {}", path.display()));
        self.created.push(path.clone());
        Ok(path)
    }

    /// Snapshot on demand, after checking the context exists
    pub fn create<K: ClusterApi, C: ControlPlane>(
        &mut self,
        cluster: &K,
        control_plane: &C,
        ctx: &DeploymentContext,
        reason: &str,
    ) -> Result<PathBuf> {
        kube::validate_context(cluster, &ctx.context)?;
        self.snapshot(control_plane, ctx, reason)
    }

    /// Restore `artifact` into the control plane.
    ///
    /// A `pre-restore` snapshot of the current state is always taken first;
    /// if it cannot be written the restore does not start.
    pub fn restore<K: ClusterApi, C: ControlPlane>(
        &mut self,
        cluster: &K,
        control_plane: &C,
        settings: &ReadinessSettings,
        artifact: &Path,
        ctx: &DeploymentContext,
    ) -> Result<RestoreReport> {
        let restore_failed = |reason: String| {
            anyhow::Error::new(OrchestratorError::RestoreFailed {
                artifact: artifact.to_path_buf(),
                reason,
            })
        };

        kube::validate_context(cluster, &ctx.context)?;
        if !artifact.is_file() {
            return Err(restore_failed("artifact not found".to_string()));
        }

        let safety_snapshot = self
            .snapshot(control_plane, ctx, "pre-restore")
            .context("Pre-restore safety snapshot failed; restore not started")?;

        output::info(&format!("Importing {}...", artifact.display()));
        control_plane.import_state(ctx, artifact).map_err(|e| {
            restore_failed(format!(
                "{:#} (safety snapshot kept at {})",
                e,
                safety_snapshot.display()
            ))
        })?;
        tracing::info!(artifact = %artifact.display(), context = %ctx.context, "state imported");

        output::info(&format!("Restarting {}...", SERVER_DEPLOYMENT));
        cluster
            .rollout_restart(ctx, &ctx.namespace, SERVER_DEPLOYMENT)
            .map_err(|e| restore_failed(format!("{:#}", e)))?;

        let warnings = await_rollout(cluster, ctx, SERVER_DEPLOYMENT, settings)?
            .into_iter()
            .collect();

        output::success(&format!("Restored from {}", artifact.display()));
        Ok(RestoreReport {
            safety_snapshot,
            warnings,
        })
    }

    /// Artifacts in the backup directory, newest first
    pub fn list(&self) -> Result<Vec<BackupArtifact>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }

        let pattern = format!(
            "{}/*.{}",
            glob::Pattern::escape(&self.dir.to_string_lossy()),
            ARTIFACT_EXTENSION
        );
        let mut artifacts = Vec::new();
        for entry in glob::glob(&pattern).context("Invalid backup directory pattern")? {
            let path = entry.context("Failed to read backup directory entry")?;
            let modified = std::fs::metadata(&path)
                .and_then(|m| m.modified())
                .with_context(|| format!("Failed to stat {}", path.display()))?;
            artifacts.push(BackupArtifact { path, modified });
        }
        artifacts.sort_by(|a, b| b.modified.cmp(&a.modified));
        Ok(artifacts)
    }

    /// Delete artifacts older than `max_age_days` whole days
    pub fn prune(&self, max_age_days: u64) -> Result<usize> {
        self.prune_at(max_age_days, SystemTime::now())
    }

    fn prune_at(&self, max_age_days: u64, now: SystemTime) -> Result<usize> {
        let mut removed = 0;
        for artifact in self.list()? {
            if self.created.contains(&artifact.path) {
                continue;
            }
            let age = now
                .duration_since(artifact.modified)
                .unwrap_or(Duration::ZERO);
            if age.as_secs() / SECONDS_PER_DAY > max_age_days {
                std::fs::remove_file(&artifact.path)
                    .with_context(|| format!("Failed to delete {}", artifact.path.display()))?;
                tracing::info!(artifact = %artifact.path.display(), "pruned");
                output::info(&format!("  Removed {}", artifact.path.display()));
                removed += 1;
            }
        }
        Ok(removed)
    }
}

fn backup_failed(detail: String) -> anyhow::Error {
    anyhow::Error::new(OrchestratorError::BackupFailed(detail))
}

/// Write and sync a freshly created artifact; a partial file is removed
fn write_artifact<W: Write + SyncTarget>(path: &Path, mut file: W, bytes: &[u8]) -> Result<()> {
    let written = file.write_all(bytes).and_then(|_| file.sync());
    if let Err(e) = written {
        drop(file);
        if let Err(cleanup) = std::fs::remove_file(path) {
            tracing::warn!(
                artifact = %path.display(),
                error = %cleanup,
                "partial artifact left behind"
            );
        }
        return Err(backup_failed(format!("cannot write {}: {}", path.display(), e)));
    }
    Ok(())
}

/// Durability hook so artifact writes can be exercised without a real disk error
trait SyncTarget {
    fn sync(&mut self) -> std::io::Result<()>;
}

impl SyncTarget for std::fs::File {
    fn sync(&mut self) -> std::io::Result<()> {
        self.sync_all()
    }
}

fn sanitize_reason(reason: &str) -> String {
    let cleaned: String = reason
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "manual".to_string()
    } else {
        cleaned
    }
}
