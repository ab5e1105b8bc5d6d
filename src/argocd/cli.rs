use super::{
    AccountInfo, ClusterInfo, ControlPlane, LoginOutcome, Session, TokenInfo, classify_login,
};
use crate::kube::DeploymentContext;
use crate::utils::exec::{CommandExecutor, ensure_success, stderr_string, stdout_string};
use anyhow::{Context, Result};
use serde_json::Value;
use std::path::Path;
use std::process::Output;

/// [`ControlPlane`] backed by the `argocd` binary.
///
/// `argocd login` stores its auth token in the CLI's own config keyed by
/// server, so every authenticated call only needs `--server`.
pub struct ArgoCli<E: CommandExecutor> {
    exec: E,
    insecure: bool,
}

impl<E: CommandExecutor> ArgoCli<E> {
    pub fn new(exec: E, insecure: bool) -> Self {
        Self { exec, insecure }
    }

    fn server_flags(&self, server: &str) -> Vec<String> {
        let mut flags = vec![
            "--server".to_string(),
            server.to_string(),
            "--grpc-web".to_string(),
        ];
        if self.insecure {
            flags.push("--insecure".to_string());
        }
        flags
    }

    fn run(&self, args: &[String]) -> Result<Output> {
        let refs: Vec<&str> = args.iter().map(String::as_str).collect();
        self.exec.execute_simple("argocd", &refs)
    }

    fn run_session(&self, session: &Session, args: &[&str]) -> Result<String> {
        let mut full: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        full.extend(self.server_flags(&session.server));
        let output = self.run(&full)?;
        // Subcommand only; the remaining arguments may carry passwords
        let what: Vec<&str> = args.iter().take(2).copied().collect();
        ensure_success(&output, &format!("argocd {}", what.join(" ")))?;
        Ok(stdout_string(&output))
    }
}

impl<E: CommandExecutor> ControlPlane for ArgoCli<E> {
    fn login(&self, server: &str, username: &str, password: &str) -> Result<LoginOutcome> {
        let mut args = vec![
            "login".to_string(),
            server.to_string(),
            "--username".to_string(),
            username.to_string(),
            "--password".to_string(),
            password.to_string(),
            "--grpc-web".to_string(),
        ];
        if self.insecure {
            args.push("--insecure".to_string());
        }
        let output = self.run(&args).context("Failed to run argocd login")?;
        classify_login(
            output.status.success(),
            &stdout_string(&output),
            &stderr_string(&output),
        )
    }

    fn list_accounts(&self, session: &Session) -> Result<Vec<AccountInfo>> {
        let stdout = self.run_session(session, &["account", "list", "-o", "json"])?;
        serde_json::from_str(&stdout).context("Failed to parse account list")
    }

    fn update_password(
        &self,
        session: &Session,
        account: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<()> {
        self.run_session(
            session,
            &[
                "account",
                "update-password",
                "--account",
                account,
                "--current-password",
                current_password,
                "--new-password",
                new_password,
            ],
        )
        .with_context(|| format!("Failed to update password for '{}'", account))?;
        Ok(())
    }

    fn generate_token(
        &self,
        session: &Session,
        account: &str,
        token_id: &str,
        expires_in_secs: Option<u64>,
    ) -> Result<String> {
        let expires = expires_in_secs.map(|s| format!("{}s", s));
        let mut args = vec![
            "account",
            "generate-token",
            "--account",
            account,
            "--id",
            token_id,
        ];
        if let Some(expires) = expires.as_deref() {
            args.extend(["--expires-in", expires]);
        }
        let token = self
            .run_session(session, &args)
            .with_context(|| format!("Failed to generate token for '{}'", account))?;
        if token.is_empty() {
            anyhow::bail!("argocd returned an empty token for '{}'", account);
        }
        Ok(token)
    }

    fn list_tokens(&self, session: &Session, account: &str) -> Result<Vec<TokenInfo>> {
        let stdout = self.run_session(
            session,
            &["account", "get", "--account", account, "-o", "json"],
        )?;
        let details: Value = serde_json::from_str(&stdout)
            .with_context(|| format!("Failed to parse account details for '{}'", account))?;
        Ok(details
            .get("tokens")
            .and_then(Value::as_array)
            .map(|tokens| tokens.iter().filter_map(TokenInfo::from_json).collect())
            .unwrap_or_default())
    }

    fn revoke_token(&self, session: &Session, account: &str, token_id: &str) -> Result<()> {
        self.run_session(
            session,
            &["account", "delete-token", "--account", account, token_id],
        )
        .with_context(|| format!("Failed to revoke token {} for '{}'", token_id, account))?;
        Ok(())
    }

    fn export_state(&self, ctx: &DeploymentContext) -> Result<String> {
        let args: Vec<String> = [
            "admin",
            "export",
            "-n",
            ctx.namespace.as_str(),
            "--kube-context",
            ctx.context.as_str(),
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let output = self.run(&args)?;
        ensure_success(&output, "argocd admin export")?;
        let exported = String::from_utf8(output.stdout).context("Export is not valid UTF-8")?;
        if exported.trim().is_empty() {
            anyhow::bail!("argocd admin export produced no output");
        }
        Ok(exported)
    }

    fn import_state(&self, ctx: &DeploymentContext, artifact: &Path) -> Result<()> {
        let content = std::fs::read(artifact)
            .with_context(|| format!("Failed to read {}", artifact.display()))?;
        let output = self.exec.execute_with_stdin(
            "argocd",
            &[
                "admin",
                "import",
                "-n",
                ctx.namespace.as_str(),
                "--kube-context",
                ctx.context.as_str(),
                "-",
            ],
            &content,
        )?;
        ensure_success(&output, "argocd admin import")
    }

    fn list_clusters(&self, session: &Session) -> Result<Vec<ClusterInfo>> {
        let stdout = self.run_session(session, &["cluster", "list", "-o", "json"])?;
        serde_json::from_str(&stdout).context("Failed to parse cluster list")
    }

    fn add_cluster(&self, session: &Session, kube_context: &str, name: &str) -> Result<()> {
        self.run_session(
            session,
            &["cluster", "add", kube_context, "--name", name, "--yes"],
        )?;
        Ok(())
    }
}
