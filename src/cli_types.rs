// CLI types for hubspoke (used by both library and binary)

use crate::services::steps::Role;
use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Install the control plane (hub) or managed-target resources (spoke)
    Install {
        /// Cluster role to install
        #[arg(value_enum)]
        role: Role,
    },
    /// Remove hub or spoke resources in reverse install order
    Uninstall {
        /// Cluster role to remove
        #[arg(value_enum)]
        role: Role,
        /// Do not export control-plane state before removing the hub
        #[arg(long)]
        skip_backup: bool,
    },
    /// Register a spoke cluster with the hub control plane
    Register {
        /// Kube context of the spoke cluster
        spoke_context: String,
        /// Name the cluster is registered under (defaults to the spoke context)
        #[arg(long)]
        name: Option<String>,
    },
    /// Check tools, context and control-plane health
    Status,
    /// Print the initial admin password from the bootstrap secret
    Password,
    /// Manage local control-plane accounts
    Account {
        #[command(subcommand)]
        command: AccountCommands,
    },
    /// Issue, list and revoke API tokens
    Token {
        #[command(subcommand)]
        command: TokenCommands,
    },
    /// Snapshot, list, restore and prune control-plane backups
    Backup {
        #[command(subcommand)]
        command: BackupCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum AccountCommands {
    /// Create an account bound to the default role
    Create {
        name: String,
        /// Initial password (prompted for if omitted)
        #[arg(long, env = "HUBSPOKE_ACCOUNT_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Set a new password for an account
    Passwd {
        name: String,
        /// New password (prompted for if omitted)
        #[arg(long, env = "HUBSPOKE_ACCOUNT_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum TokenCommands {
    /// Issue a token for an account
    Issue {
        account: String,
        /// Lifetime in seconds; omit for a token valid until revocation
        #[arg(long)]
        ttl: Option<u64>,
    },
    /// List an account's tokens
    List { account: String },
    /// Revoke a token by id
    Revoke { account: String, id: String },
}

#[derive(Subcommand, Debug)]
pub enum BackupCommands {
    /// Export control-plane state now
    Create {
        /// Reason recorded in the artifact name
        #[arg(long, default_value = "manual")]
        reason: String,
    },
    /// List backup artifacts, newest first
    List,
    /// Restore control-plane state from an artifact
    Restore {
        /// Artifact path, or a file name inside the backup directory
        artifact: PathBuf,
    },
    /// Delete artifacts older than the given number of days
    Prune {
        #[arg(long, default_value_t = 30)]
        max_age_days: u64,
    },
}
