use super::utils::{adapters, prompt_secret, resolve_context};
use crate::AccountCommands;
use crate::config::Config;
use crate::services::accounts;
use anyhow::Result;

/// Handle account subcommands
pub fn handle_account(
    config: &Config,
    context: Option<&str>,
    command: AccountCommands,
) -> Result<()> {
    let (cluster, control_plane) = adapters(config);
    let ctx = resolve_context(&cluster, config, context)?;

    match command {
        AccountCommands::Create { name, password } => {
            let password = match password {
                Some(p) => p,
                None => prompt_secret(&format!("Initial password for {}", name))?,
            };
            let created =
                accounts::create_account(&cluster, &control_plane, config, &ctx, &name, &password)?;
            eprintln!();
            eprintln!("✓ Account {} created with {}", created.name, created.role);
        }
        AccountCommands::Passwd { name, password } => {
            let password = match password {
                Some(p) => p,
                None => prompt_secret(&format!("New password for {}", name))?,
            };
            accounts::rotate_password(&cluster, &control_plane, config, &ctx, &name, &password)?;
        }
    }
    Ok(())
}
