// Command module routing
//
// To add a new command:
// 1. Create a new file in this directory (e.g., `mycommand.rs`)
// 2. Add `pub mod mycommand;` below
// 3. Add the variant to `Commands` in cli_types.rs and the match arm in `handle_command`

pub mod account;
pub mod backup;
pub mod install;
pub mod register;
pub mod status;
pub mod token;
pub mod utils;

use crate::Commands;
use crate::Commands::*;
use crate::config::Config;
use anyhow::Result;

/// Dispatch command to appropriate handler
///
/// `context` is the `--context` flag; handlers fall back to the configured
/// default and then the kubeconfig current context.
pub fn handle_command(config: &Config, context: Option<&str>, command: Commands) -> Result<()> {
    match command {
        Install { role } => {
            install::handle_install(config, context, role)?;
        }
        Uninstall { role, skip_backup } => {
            install::handle_uninstall(config, context, role, skip_backup)?;
        }
        Register {
            spoke_context,
            name,
        } => {
            register::handle_register(config, context, &spoke_context, name.as_deref())?;
        }
        Status => {
            status::handle_status(config, context)?;
        }
        Password => {
            status::handle_password(config, context)?;
        }
        Account { command } => {
            account::handle_account(config, context, command)?;
        }
        Token { command } => {
            token::handle_token(config, context, command)?;
        }
        Backup { command } => {
            backup::handle_backup(config, context, command)?;
        }
    }
    Ok(())
}
