//! Auth command - session management against the auth service.

use anyhow::{Result, anyhow};
use clap::{Args, Subcommand};
use console::{Style, style};
use portico_auth::{Clock, CredentialStore, TokenKind, inspect_jwt, system_clock};
use serde::Serialize;

use super::Context;

/// Arguments for the auth command.
#[derive(Args, Debug)]
pub struct AuthArgs {
    #[command(subcommand)]
    pub command: AuthCommand,
}

#[derive(Subcommand, Debug)]
pub enum AuthCommand {
    /// Log in and store the issued tokens
    Login {
        /// Account name
        username: String,

        /// Password (prompted for when omitted)
        #[arg(long, env = "PORTICO_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Obtain a new access token with the stored refresh token
    Refresh,

    /// Clear stored tokens
    Logout,

    /// Show authentication status
    Status,
}

/// Run the auth command.
pub async fn run(args: AuthArgs, ctx: &Context) -> Result<()> {
    match args.command {
        AuthCommand::Login { username, password } => cmd_login(&username, password, ctx).await,
        AuthCommand::Refresh => cmd_refresh(ctx).await,
        AuthCommand::Logout => cmd_logout(ctx),
        AuthCommand::Status => cmd_status(ctx),
    }
}

async fn cmd_login(username: &str, password: Option<String>, ctx: &Context) -> Result<()> {
    let password = match password {
        Some(p) => p,
        None => rpassword::prompt_password(format!("Password for {}: ", username))?,
    };

    let auth = ctx.clients()?.auth()?;
    let tokens = auth
        .login(username, &password)
        .await
        .map_err(|e| anyhow!("Login failed: {}", e))?;

    if ctx.json_output {
        println!(
            "{}",
            serde_json::json!({
                "logged_in": true,
                "refresh_token": tokens.refresh_token.is_some(),
            })
        );
    } else {
        println!("Logged in as {}.", username);
        if tokens.refresh_token.is_none() {
            println!("No refresh token was issued; 'portico auth refresh' will not work.");
        }
    }
    Ok(())
}

async fn cmd_refresh(ctx: &Context) -> Result<()> {
    let auth = ctx.clients()?.auth()?;
    let tokens = auth
        .refresh()
        .await
        .map_err(|e| anyhow!("Refresh failed: {}", e))?;

    if ctx.json_output {
        println!(
            "{}",
            serde_json::json!({
                "refreshed": true,
                "rotated": tokens.refresh_token.is_some(),
            })
        );
    } else {
        println!("Access token renewed.");
    }
    Ok(())
}

fn cmd_logout(ctx: &Context) -> Result<()> {
    let store = ctx.credentials()?;
    let had_tokens = !store.is_empty();
    store.clear_all()?;

    if ctx.json_output {
        println!("{}", serde_json::json!({ "logged_out": had_tokens }));
    } else if had_tokens {
        println!("Stored tokens removed.");
    } else {
        println!("No stored tokens found.");
    }
    Ok(())
}

/// Status for JSON output.
#[derive(Debug, Serialize)]
struct StatusOutput {
    access_token: bool,
    access_valid: bool,
    reason: Option<String>,
    expires_at: Option<String>,
    refresh_token: bool,
}

fn cmd_status(ctx: &Context) -> Result<()> {
    let store = ctx.credentials()?;
    let now = system_clock().now_unix();

    let access = store.get(TokenKind::Access);
    let checked = access.as_deref().map(|t| inspect_jwt(t, now));

    let output = StatusOutput {
        access_token: access.is_some(),
        access_valid: matches!(checked, Some(Ok(_))),
        reason: match &checked {
            Some(Err(e)) => Some(e.to_string()),
            _ => None,
        },
        expires_at: match &checked {
            Some(Ok(claims)) => chrono::DateTime::from_timestamp(claims.exp, 0)
                .map(|t| t.to_rfc3339()),
            _ => None,
        },
        refresh_token: store.get(TokenKind::Refresh).is_some(),
    };

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let green = Style::new().green();
    let red = Style::new().red();
    let dim = Style::new().dim();

    println!();
    println!("{}", style("Authentication Status").bold());
    println!("{}", dim.apply_to("─".repeat(40)));
    println!();

    match (&checked, &output.expires_at) {
        (None, _) => println!(
            "  {} {}",
            dim.apply_to("Access: "),
            red.apply_to("● not logged in")
        ),
        (Some(Ok(_)), expires) => println!(
            "  {} {} {}",
            dim.apply_to("Access: "),
            green.apply_to("● valid"),
            dim.apply_to(format!("(expires {})", expires.as_deref().unwrap_or("?")))
        ),
        (Some(Err(e)), _) => println!(
            "  {} {} {}",
            dim.apply_to("Access: "),
            red.apply_to("● rejected"),
            dim.apply_to(format!("({})", e))
        ),
    }
    println!(
        "  {} {}",
        dim.apply_to("Refresh:"),
        if output.refresh_token { "stored" } else { "none" }
    );

    if !output.access_valid {
        println!();
        println!("  {}", dim.apply_to("Log in with: portico auth login <username>"));
    }
    println!();

    Ok(())
}
