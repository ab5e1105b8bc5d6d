//! Error taxonomy for orchestration operations
//!
//! Core operations return `anyhow::Result` and raise these variants, so
//! callers can recover the kind with `err.downcast_ref::<OrchestratorError>()`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Unknown cluster context '{0}' (not found in kubeconfig)")]
    UnknownContext(String),

    #[error("Resource set missing or unreadable: {}", .0.display())]
    MissingResourceSet(PathBuf),

    #[error("Bootstrap credential unavailable after {attempts} attempts: {reason}")]
    CredentialUnavailable { attempts: u32, reason: String },

    #[error("Authentication failed for '{username}' at {server}: {reason}")]
    AuthenticationFailed {
        server: String,
        username: String,
        reason: String,
    },

    #[error("Could not classify response from {operation}: {output}")]
    AmbiguousResponseParsing { operation: String, output: String },

    #[error("Account '{0}' already exists")]
    AccountAlreadyExists(String),

    #[error("Account '{0}' not found")]
    AccountNotFound(String),

    #[error("Hub authentication failed: {0}")]
    HubAuthFailed(String),

    #[error("Cluster registration of '{name}' failed: {reason}")]
    RegistrationFailed { name: String, reason: String },

    #[error("Timed out after {seconds}s waiting for {target}")]
    ReadinessTimeout { target: String, seconds: u64 },

    #[error("Backup failed: {0}")]
    BackupFailed(String),

    #[error("Restore from {} failed: {reason}", .artifact.display())]
    RestoreFailed { artifact: PathBuf, reason: String },
}

/// True if `err` carries the given taxonomy variant (compared by discriminant)
pub fn is_kind(err: &anyhow::Error, expected: &OrchestratorError) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<OrchestratorError>())
        .any(|kind| std::mem::discriminant(kind) == std::mem::discriminant(expected))
}
