use super::utils::{adapters, resolve_context};
use crate::TokenCommands;
use crate::config::Config;
use crate::services::accounts;
use anyhow::Result;
use chrono::DateTime;

/// Handle token subcommands
pub fn handle_token(
    config: &Config,
    context: Option<&str>,
    command: TokenCommands,
) -> Result<()> {
    let (cluster, control_plane) = adapters(config);
    let ctx = resolve_context(&cluster, config, context)?;

    match command {
        TokenCommands::Issue { account, ttl } => {
            let issued =
                accounts::issue_token(&cluster, &control_plane, config, &ctx, &account, ttl)?;
            println!("{}", issued.token);
            eprintln!();
            eprintln!("✓ Token {} issued ({})", issued.id, issued.validity);
            if let Some(path) = &issued.saved_to {
                eprintln!("  Saved to {}", path.display());
            }
        }
        TokenCommands::List { account } => {
            let tokens = accounts::list_tokens(&cluster, &control_plane, config, &ctx, &account)?;
            if tokens.is_empty() {
                println!("No tokens for {}", account);
            }
            for token in tokens {
                println!(
                    "  {}  issued {}  expires {}",
                    token.id,
                    format_time(token.issued_at),
                    token
                        .expires_at
                        .map(|t| format_time(Some(t)))
                        .unwrap_or_else(|| "never".to_string())
                );
            }
        }
        TokenCommands::Revoke { account, id } => {
            accounts::revoke_token(&cluster, &control_plane, config, &ctx, &account, &id)?;
        }
    }
    Ok(())
}

fn format_time(unix: Option<i64>) -> String {
    unix.and_then(|t| DateTime::from_timestamp(t, 0))
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
