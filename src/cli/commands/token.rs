use anyhow::{Context, Result};
use clap::Args;
use colored::*;

use crate::api::{ArcgisClient, TokenState};

#[derive(Args)]
pub struct TokenArgs {
    /// Issue a one-off token instead of reporting the session token
    #[arg(long)]
    pub issue: bool,

    /// Lifetime in minutes of an issued token
    #[arg(long, default_value_t = 60)]
    pub expiration: u32,

    /// Print the token value instead of masking it
    #[arg(long)]
    pub show: bool,
}

pub async fn token_command(client: &ArcgisClient, args: TokenArgs) -> Result<()> {
    if args.issue {
        let issued = client
            .get_portal_token(args.expiration)
            .await
            .context("Failed to generate portal token")?;
        let value = issued.get("token").and_then(|t| t.as_str()).unwrap_or("");

        println!("🔑 Token issued for {}", client.credentials().username().bright_green());
        println!("   Token:      {}", if args.show { value.to_string() } else { mask(value) });
        println!("   Expires at: {}", issued["expires_at"].as_str().unwrap_or("unknown"));
        return Ok(());
    }

    client
        .token_manager()
        .ensure_valid()
        .await
        .context("Failed to obtain portal token")?;

    let status = client.token_status();
    let state = match status.state {
        TokenState::Valid => "valid".bright_green(),
        TokenState::NearExpiry => "near expiry".yellow(),
        TokenState::Unissued => "unissued".dimmed(),
        TokenState::Expired | TokenState::Failed => format!("{:?}", status.state).to_lowercase().red(),
    };

    println!("🔑 Portal: {}", client.credentials().portal_url().cyan());
    println!("   State:         {}", state);
    if let Some(expires_at) = status.token_expires_at {
        println!("   Expires at:    {}", expires_at.to_rfc3339());
    }
    if let Some(minutes) = status.minutes_until_expiry {
        println!("   Minutes left:  {}", minutes);
    }
    if let Some(error) = &status.last_error {
        println!("   Last error:    {}", error.red());
    }
    Ok(())
}

fn mask(token: &str) -> String {
    let visible: String = token.chars().take(6).collect();
    format!("{}…", visible)
}
