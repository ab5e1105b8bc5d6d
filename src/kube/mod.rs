//! Cluster API adapter
//!
//! Everything the orchestrator needs from a Kubernetes cluster goes through
//! [`ClusterApi`]. The production implementation shells out to `kubectl`;
//! tests substitute an in-memory fake.

mod kubectl;

pub use kubectl::Kubectl;

use anyhow::Result;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// A target cluster context plus the control-plane namespace inside it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentContext {
    pub context: String,
    pub namespace: String,
}

impl DeploymentContext {
    pub fn new(context: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            namespace: namespace.into(),
        }
    }
}

impl fmt::Display for DeploymentContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (namespace {})", self.context, self.namespace)
    }
}

pub trait ClusterApi {
    /// All context names in the local kubeconfig
    fn list_contexts(&self) -> Result<Vec<String>>;

    /// The kubeconfig's active context
    fn current_context(&self) -> Result<String>;

    /// Make `context` the kubeconfig's active context
    fn use_context(&self, context: &str) -> Result<()>;

    /// Declaratively apply a resource set (file or kustomize directory)
    fn apply(&self, ctx: &DeploymentContext, resource: &Path, namespace: Option<&str>)
    -> Result<()>;

    /// Delete a resource set, ignoring resources that are already gone
    fn delete(
        &self,
        ctx: &DeploymentContext,
        resource: &Path,
        namespace: Option<&str>,
    ) -> Result<()>;

    /// Create the namespace unless it already exists
    fn ensure_namespace(&self, ctx: &DeploymentContext, namespace: &str) -> Result<()>;

    /// Project one field of a resource with a jsonpath expression.
    /// Returns `None` when the resource does not exist or the field is empty.
    fn get_field(
        &self,
        ctx: &DeploymentContext,
        kind: &str,
        name: &str,
        namespace: Option<&str>,
        jsonpath: &str,
    ) -> Result<Option<String>>;

    /// True once the CRD reports the `Established` condition
    fn crd_established(&self, ctx: &DeploymentContext, crd: &str) -> Result<bool>;

    /// True when at least one pod matches `selector` and all matches are Ready
    fn pods_ready(&self, ctx: &DeploymentContext, namespace: &str, selector: &str)
    -> Result<bool>;

    fn rollout_restart(&self, ctx: &DeploymentContext, namespace: &str, deployment: &str)
    -> Result<()>;

    /// True once the latest rollout of `deployment` has finished
    fn rollout_complete(
        &self,
        ctx: &DeploymentContext,
        namespace: &str,
        deployment: &str,
    ) -> Result<bool>;

    /// The `data` section of a config map
    fn get_config_map(
        &self,
        ctx: &DeploymentContext,
        namespace: &str,
        name: &str,
    ) -> Result<BTreeMap<String, String>>;

    /// Merge `data` into a config map's `data` section
    fn patch_config_map(
        &self,
        ctx: &DeploymentContext,
        namespace: &str,
        name: &str,
        data: &BTreeMap<String, String>,
    ) -> Result<()>;

    /// Drop `keys` from a config map's `data` section; absent keys are ignored
    fn remove_config_map_keys(
        &self,
        ctx: &DeploymentContext,
        namespace: &str,
        name: &str,
        keys: &[&str],
    ) -> Result<()>;
}

/// Fail with `UnknownContext` unless `context` is in the kubeconfig
pub fn validate_context<K: ClusterApi>(cluster: &K, context: &str) -> Result<()> {
    let contexts = cluster.list_contexts()?;
    if !contexts.iter().any(|c| c == context) {
        return Err(crate::error::OrchestratorError::UnknownContext(context.to_string()).into());
    }
    Ok(())
}
