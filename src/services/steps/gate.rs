//! Readiness gates and the timeout policy applied to them

use crate::error::OrchestratorError;
use crate::kube::{ClusterApi, DeploymentContext};
use crate::output;
use crate::utils::poll::wait_until;
use anyhow::Result;
use std::str::FromStr;
use std::time::Duration;

/// What happens when a readiness wait runs out of time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessPolicy {
    /// Warn and continue; the control plane converges on its own
    BestEffort,
    /// Treat the timeout as a failure of the step
    Strict,
}

impl FromStr for ReadinessPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "best-effort" | "best_effort" | "besteffort" => Ok(Self::BestEffort),
            "strict" => Ok(Self::Strict),
            other => anyhow::bail!(
                "Unknown readiness policy '{}' (expected 'best-effort' or 'strict')",
                other
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReadinessSettings {
    pub policy: ReadinessPolicy,
    /// Default timeout for gates and rollout waits
    pub gate_timeout: Duration,
    pub poll_interval: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateKind {
    /// CRD reports the `Established` condition
    CrdEstablished { crd: String },
    /// Every pod matching the selector is Ready
    PodsReady { namespace: String, selector: String },
}

impl GateKind {
    pub fn describe(&self) -> String {
        match self {
            GateKind::CrdEstablished { crd } => format!("CRD {} established", crd),
            GateKind::PodsReady {
                namespace,
                selector,
            } => format!("pods {} ready in {}", selector, namespace),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadinessGate {
    pub kind: GateKind,
    pub timeout: Duration,
}

impl ReadinessGate {
    pub fn crd_established(crd: &str, timeout: Duration) -> Self {
        Self {
            kind: GateKind::CrdEstablished {
                crd: crd.to_string(),
            },
            timeout,
        }
    }

    pub fn pods_ready(namespace: &str, selector: &str, timeout: Duration) -> Self {
        Self {
            kind: GateKind::PodsReady {
                namespace: namespace.to_string(),
                selector: selector.to_string(),
            },
            timeout,
        }
    }
}

/// Block until `gate` holds or its timeout elapses.
///
/// Returns `Some(warning)` when a best-effort timeout was swallowed, and a
/// `ReadinessTimeout` error when the policy is strict.
pub fn await_gate<K: ClusterApi>(
    cluster: &K,
    ctx: &DeploymentContext,
    gate: &ReadinessGate,
    settings: &ReadinessSettings,
) -> Result<Option<String>> {
    let target = gate.kind.describe();
    output::info(&format!(
        "  Waiting up to {}s for {}...",
        gate.timeout.as_secs(),
        target
    ));

    let ready = wait_until(gate.timeout, settings.poll_interval, || match &gate.kind {
        GateKind::CrdEstablished { crd } => cluster.crd_established(ctx, crd),
        GateKind::PodsReady {
            namespace,
            selector,
        } => cluster.pods_ready(ctx, namespace, selector),
    })?;

    if ready {
        output::success(&format!("  {}", target));
        return Ok(None);
    }
    on_timeout(settings.policy, &target, gate.timeout)
}

/// Block until the deployment's rollout finishes, under the same policy
pub fn await_rollout<K: ClusterApi>(
    cluster: &K,
    ctx: &DeploymentContext,
    deployment: &str,
    settings: &ReadinessSettings,
) -> Result<Option<String>> {
    let target = format!("deployment/{} rollout in {}", deployment, ctx.namespace);
    output::info(&format!(
        "  Waiting up to {}s for {}...",
        settings.gate_timeout.as_secs(),
        target
    ));

    let ready = wait_until(settings.gate_timeout, settings.poll_interval, || {
        cluster.rollout_complete(ctx, &ctx.namespace, deployment)
    })?;

    if ready {
        output::success(&format!("  {} complete", target));
        return Ok(None);
    }
    on_timeout(settings.policy, &target, settings.gate_timeout)
}

fn on_timeout(policy: ReadinessPolicy, target: &str, timeout: Duration) -> Result<Option<String>> {
    match policy {
        ReadinessPolicy::BestEffort => {
            let warning = format!(
                "Timed out after {}s waiting for {}; continuing",
                timeout.as_secs(),
                target
            );
            output::warning(&warning);
            Ok(Some(warning))
        }
        ReadinessPolicy::Strict => Err(OrchestratorError::ReadinessTimeout {
            target: target.to_string(),
            seconds: timeout.as_secs(),
        }
        .into()),
    }
}
