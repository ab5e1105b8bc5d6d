//! Step executor
//!
//! Applies or removes an ordered list of resource sets against one cluster
//! context. Everything that can be checked without touching the cluster
//! (context exists, every resource set is readable) is checked before the
//! first step runs.

mod gate;
pub mod plan;

pub use gate::{
    GateKind, ReadinessGate, ReadinessPolicy, ReadinessSettings, await_gate, await_rollout,
};
pub use plan::{Role, install_steps, uninstall_steps};

use crate::config::Config;
use crate::error::OrchestratorError;
use crate::kube::{self, ClusterApi, DeploymentContext};
use crate::output;
use anyhow::Result;
use std::path::{Path, PathBuf};

/// One ordered unit of work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Resource set, relative to the manifests directory
    pub resource: PathBuf,
    pub namespace: Option<String>,
    pub label: String,
    /// Checked after the step is applied; ignored on removal
    pub gate: Option<ReadinessGate>,
}

impl Step {
    pub fn new(resource: impl Into<PathBuf>, label: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            namespace: None,
            label: label.into(),
            gate: None,
        }
    }

    pub fn in_namespace(mut self, namespace: &str) -> Self {
        self.namespace = Some(namespace.to_string());
        self
    }

    pub fn with_gate(mut self, gate: ReadinessGate) -> Self {
        self.gate = Some(gate);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Apply,
    Remove,
}

impl Direction {
    fn verb(self) -> &'static str {
        match self {
            Direction::Apply => "Applying",
            Direction::Remove => "Removing",
        }
    }
}

#[derive(Debug)]
pub struct StepFailure {
    pub label: String,
    pub error: anyhow::Error,
}

/// Outcome of a run: the steps that finished, swallowed readiness warnings,
/// and the step that stopped the run if any
#[derive(Debug, Default)]
pub struct StepReport {
    pub completed: Vec<String>,
    pub warnings: Vec<String>,
    pub failed: Option<StepFailure>,
}

impl StepReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_none()
    }

    /// Turn a partial failure into an error for callers that need one
    pub fn into_result(self) -> Result<Self> {
        match self.failed {
            None => Ok(self),
            Some(failure) => Err(failure.error.context(format!(
                "Step '{}' failed after {} completed step(s)",
                failure.label,
                self.completed.len()
            ))),
        }
    }
}

/// Resolve every step's resource set and confirm it can be read
pub fn validate_steps(manifests_dir: &Path, steps: &[Step]) -> Result<Vec<PathBuf>> {
    steps
        .iter()
        .map(|step| {
            let path = manifests_dir.join(&step.resource);
            if is_readable(&path) {
                Ok(path)
            } else {
                Err(OrchestratorError::MissingResourceSet(path).into())
            }
        })
        .collect()
}

fn is_readable(path: &Path) -> bool {
    if path.is_dir() {
        std::fs::read_dir(path).is_ok()
    } else {
        std::fs::File::open(path).is_ok()
    }
}

/// Run `steps` in declared order against `ctx`
pub fn run_steps<K: ClusterApi>(
    cluster: &K,
    config: &Config,
    ctx: &DeploymentContext,
    steps: &[Step],
    direction: Direction,
) -> Result<StepReport> {
    kube::validate_context(cluster, &ctx.context)?;
    let resources = validate_steps(&config.manifests_dir, steps)?;

    let mut report = StepReport::default();
    let total = steps.len();

    for (index, (step, resource)) in steps.iter().zip(&resources).enumerate() {
        output::info(&format!(
            "[{}/{}] {} {}...",
            index + 1,
            total,
            direction.verb(),
            step.label
        ));
        tracing::info!(
            step = %step.label,
            context = %ctx.context,
            direction = ?direction,
            resource = %resource.display(),
            "step started"
        );

        let namespace = step.namespace.as_deref();
        let mut result = match direction {
            Direction::Apply => cluster.apply(ctx, resource, namespace),
            Direction::Remove => cluster.delete(ctx, resource, namespace),
        };

        if result.is_ok() && direction == Direction::Apply {
            if let Some(gate) = &step.gate {
                result = await_gate(cluster, ctx, gate, &config.readiness).map(|warning| {
                    report.warnings.extend(warning);
                });
            }
        }

        if let Err(error) = result {
            tracing::error!(
                step = %step.label,
                context = %ctx.context,
                error = %format!("{:#}", error),
                "step failed"
            );
            output::error(&format!("{} failed: {:#}", step.label, error));
            report.failed = Some(StepFailure {
                label: step.label.clone(),
                error,
            });
            return Ok(report);
        }

        tracing::info!(step = %step.label, context = %ctx.context, "step succeeded");
        output::success(&step.label);
        report.completed.push(step.label.clone());
    }

    Ok(report)
}
