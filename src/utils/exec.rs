use anyhow::{Context, Result};
use std::io::Write;
use std::process::{Command, Output, Stdio};

/// Trait for executing external tools (kubectl, argocd)
pub trait CommandExecutor {
    /// Execute a program with arguments, capturing stdout and stderr
    fn execute_simple(&self, program: &str, args: &[&str]) -> Result<Output>;

    /// Execute a program and feed `input` to its stdin
    fn execute_with_stdin(&self, program: &str, args: &[&str], input: &[u8]) -> Result<Output>;

    /// Check if a command is available on PATH
    fn check_command_exists(&self, command: &str) -> bool;
}

/// Executes commands on the local machine
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalExecutor;

impl CommandExecutor for LocalExecutor {
    fn execute_simple(&self, program: &str, args: &[&str]) -> Result<Output> {
        Command::new(program)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("Failed to execute command: {}", program))
    }

    fn execute_with_stdin(&self, program: &str, args: &[&str], input: &[u8]) -> Result<Output> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to spawn command: {}", program))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(input)?;
            stdin.flush()?;
        }

        child
            .wait_with_output()
            .with_context(|| format!("Failed to wait for command: {}", program))
    }

    fn check_command_exists(&self, command: &str) -> bool {
        which::which(command).is_ok()
    }
}

/// Trimmed stdout of a finished command
pub fn stdout_string(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Trimmed stderr of a finished command
pub fn stderr_string(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

/// Fail with the command's stderr if it exited non-zero
pub fn ensure_success(output: &Output, what: &str) -> Result<()> {
    if !output.status.success() {
        let stderr = stderr_string(output);
        let detail = if stderr.is_empty() {
            stdout_string(output)
        } else {
            stderr
        };
        anyhow::bail!(
            "{} failed with exit code {}: {}",
            what,
            output.status.code().unwrap_or(1),
            detail
        );
    }
    Ok(())
}
