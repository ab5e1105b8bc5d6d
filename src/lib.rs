// hubspoke library
// Core orchestration lives in `services`; `kube` and `argocd` are the only
// modules that talk to external tools.

pub mod argocd;
mod cli_types;
pub mod commands;
pub mod config;
pub mod error;
pub mod kube;
pub mod output;
pub mod services;
pub mod utils;

#[cfg(test)]
pub mod testing;

pub use cli_types::{AccountCommands, BackupCommands, Commands, TokenCommands};
pub use commands::handle_command;
