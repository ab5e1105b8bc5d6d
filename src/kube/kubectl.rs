use super::{ClusterApi, DeploymentContext};
use crate::utils::exec::{CommandExecutor, ensure_success, stderr_string, stdout_string};
use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::process::Output;

/// [`ClusterApi`] backed by the `kubectl` binary
pub struct Kubectl<E: CommandExecutor> {
    exec: E,
}

impl<E: CommandExecutor> Kubectl<E> {
    pub fn new(exec: E) -> Self {
        Self { exec }
    }

    fn run(&self, ctx: Option<&DeploymentContext>, args: &[&str]) -> Result<Output> {
        let mut full: Vec<&str> = Vec::with_capacity(args.len() + 2);
        if let Some(ctx) = ctx {
            full.push("--context");
            full.push(ctx.context.as_str());
        }
        full.extend_from_slice(args);
        self.exec.execute_simple("kubectl", &full)
    }

    fn run_checked(&self, ctx: Option<&DeploymentContext>, args: &[&str]) -> Result<String> {
        let output = self.run(ctx, args)?;
        ensure_success(&output, &format!("kubectl {}", args.join(" ")))?;
        Ok(stdout_string(&output))
    }
}

/// `-k` for kustomize directories, `-f` for plain files and directories
fn resource_flag(resource: &Path) -> &'static str {
    if resource.is_dir() && resource.join("kustomization.yaml").exists() {
        "-k"
    } else {
        "-f"
    }
}

fn is_not_found(output: &Output) -> bool {
    let stderr = stderr_string(output);
    stderr.contains("NotFound") || stderr.contains("not found")
}

impl<E: CommandExecutor> ClusterApi for Kubectl<E> {
    fn list_contexts(&self) -> Result<Vec<String>> {
        let stdout = self.run_checked(None, &["config", "get-contexts", "-o", "name"])?;
        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn current_context(&self) -> Result<String> {
        self.run_checked(None, &["config", "current-context"])
    }

    fn use_context(&self, context: &str) -> Result<()> {
        self.run_checked(None, &["config", "use-context", context])
            .with_context(|| format!("Failed to switch to context '{}'", context))?;
        Ok(())
    }

    fn apply(
        &self,
        ctx: &DeploymentContext,
        resource: &Path,
        namespace: Option<&str>,
    ) -> Result<()> {
        let path = resource.to_string_lossy().into_owned();
        let mut args = vec!["apply", resource_flag(resource), path.as_str()];
        if let Some(ns) = namespace {
            args.extend(["-n", ns]);
        }
        self.run_checked(Some(ctx), &args)
            .with_context(|| format!("Failed to apply {}", resource.display()))?;
        Ok(())
    }

    fn delete(
        &self,
        ctx: &DeploymentContext,
        resource: &Path,
        namespace: Option<&str>,
    ) -> Result<()> {
        let path = resource.to_string_lossy().into_owned();
        let mut args = vec![
            "delete",
            resource_flag(resource),
            path.as_str(),
            "--ignore-not-found=true",
        ];
        if let Some(ns) = namespace {
            args.extend(["-n", ns]);
        }
        self.run_checked(Some(ctx), &args)
            .with_context(|| format!("Failed to delete {}", resource.display()))?;
        Ok(())
    }

    fn ensure_namespace(&self, ctx: &DeploymentContext, namespace: &str) -> Result<()> {
        // Render then apply so an existing namespace is left untouched
        let manifest = self.run_checked(
            Some(ctx),
            &[
                "create",
                "namespace",
                namespace,
                "--dry-run=client",
                "-o",
                "yaml",
            ],
        )?;
        let output = self.exec.execute_with_stdin(
            "kubectl",
            &["--context", ctx.context.as_str(), "apply", "-f", "-"],
            manifest.as_bytes(),
        )?;
        ensure_success(&output, &format!("kubectl apply namespace {}", namespace))
    }

    fn get_field(
        &self,
        ctx: &DeploymentContext,
        kind: &str,
        name: &str,
        namespace: Option<&str>,
        jsonpath: &str,
    ) -> Result<Option<String>> {
        let projection = format!("jsonpath={}", jsonpath);
        let mut args = vec!["get", kind, name];
        if let Some(ns) = namespace {
            args.extend(["-n", ns]);
        }
        args.extend(["-o", projection.as_str()]);

        let output = self.run(Some(ctx), &args)?;
        if !output.status.success() && is_not_found(&output) {
            return Ok(None);
        }
        ensure_success(&output, &format!("kubectl get {} {}", kind, name))?;

        let value = stdout_string(&output);
        Ok(if value.is_empty() { None } else { Some(value) })
    }

    fn crd_established(&self, ctx: &DeploymentContext, crd: &str) -> Result<bool> {
        let status = self.get_field(
            ctx,
            "crd",
            crd,
            None,
            r#"{.status.conditions[?(@.type=="Established")].status}"#,
        )?;
        Ok(status.as_deref() == Some("True"))
    }

    fn pods_ready(
        &self,
        ctx: &DeploymentContext,
        namespace: &str,
        selector: &str,
    ) -> Result<bool> {
        let stdout = self.run_checked(
            Some(ctx),
            &["get", "pods", "-n", namespace, "-l", selector, "-o", "json"],
        )?;
        let pods: Value = serde_json::from_str(&stdout).context("Failed to parse pod list")?;
        Ok(all_pods_ready(&pods))
    }

    fn rollout_restart(
        &self,
        ctx: &DeploymentContext,
        namespace: &str,
        deployment: &str,
    ) -> Result<()> {
        let target = format!("deployment/{}", deployment);
        self.run_checked(Some(ctx), &["rollout", "restart", target.as_str(), "-n", namespace])
            .with_context(|| format!("Failed to restart {}", target))?;
        Ok(())
    }

    fn rollout_complete(
        &self,
        ctx: &DeploymentContext,
        namespace: &str,
        deployment: &str,
    ) -> Result<bool> {
        let target = format!("deployment/{}", deployment);
        let stdout = self.run_checked(
            Some(ctx),
            &["rollout", "status", target.as_str(), "-n", namespace, "--watch=false"],
        )?;
        Ok(stdout.contains("successfully rolled out"))
    }

    fn get_config_map(
        &self,
        ctx: &DeploymentContext,
        namespace: &str,
        name: &str,
    ) -> Result<BTreeMap<String, String>> {
        let stdout = self.run_checked(
            Some(ctx),
            &["get", "configmap", name, "-n", namespace, "-o", "json"],
        )?;
        let cm: Value = serde_json::from_str(&stdout)
            .with_context(|| format!("Failed to parse config map {}", name))?;
        Ok(cm
            .get("data")
            .and_then(Value::as_object)
            .map(|data| {
                data.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn patch_config_map(
        &self,
        ctx: &DeploymentContext,
        namespace: &str,
        name: &str,
        data: &BTreeMap<String, String>,
    ) -> Result<()> {
        let patch = serde_json::json!({ "data": data }).to_string();
        self.run_checked(
            Some(ctx),
            &[
                "patch",
                "configmap",
                name,
                "-n",
                namespace,
                "--type",
                "merge",
                "-p",
                patch.as_str(),
            ],
        )
        .with_context(|| format!("Failed to patch config map {}", name))?;
        Ok(())
    }

    fn remove_config_map_keys(
        &self,
        ctx: &DeploymentContext,
        namespace: &str,
        name: &str,
        keys: &[&str],
    ) -> Result<()> {
        // Null in a merge patch deletes the key; absent keys are a no-op
        let removed: serde_json::Map<String, Value> =
            keys.iter().map(|k| (k.to_string(), Value::Null)).collect();
        let patch = serde_json::json!({ "data": removed }).to_string();
        self.run_checked(
            Some(ctx),
            &[
                "patch",
                "configmap",
                name,
                "-n",
                namespace,
                "--type",
                "merge",
                "-p",
                patch.as_str(),
            ],
        )
        .with_context(|| format!("Failed to remove keys from config map {}", name))?;
        Ok(())
    }
}

fn all_pods_ready(pods: &Value) -> bool {
    let Some(items) = pods.get("items").and_then(Value::as_array) else {
        return false;
    };
    !items.is_empty()
        && items.iter().all(|pod| {
            pod.pointer("/status/conditions")
                .and_then(Value::as_array)
                .is_some_and(|conditions| {
                    conditions.iter().any(|c| {
                        c.get("type").and_then(Value::as_str) == Some("Ready")
                            && c.get("status").and_then(Value::as_str) == Some("True")
                    })
                })
        })
}
