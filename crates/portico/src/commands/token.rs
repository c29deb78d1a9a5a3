//! Token command - runs the bearer token check locally.

use anyhow::Result;
use clap::{Args, Subcommand};
use console::Style;
use portico_auth::{Clock, inspect_jwt, system_clock};

use super::Context;

/// Arguments for the token command.
#[derive(Args, Debug)]
pub struct TokenArgs {
    #[command(subcommand)]
    pub command: TokenCommand,
}

#[derive(Subcommand, Debug)]
pub enum TokenCommand {
    /// Check a JWT's shape and expiry (the signature is not verified)
    Check {
        /// The token to check
        token: String,
    },
}

/// Run the token command.
pub async fn run(args: TokenArgs, ctx: &Context) -> Result<()> {
    match args.command {
        TokenCommand::Check { token } => cmd_check(&token, ctx),
    }
}

fn cmd_check(token: &str, ctx: &Context) -> Result<()> {
    let now = system_clock().now_unix();
    let result = inspect_jwt(token.trim(), now);

    if ctx.json_output {
        let body = match &result {
            Ok(claims) => serde_json::json!({
                "valid": true,
                "exp": claims.exp,
                "expires_in": claims.expires_in(now),
                "sub": claims.subject(),
            }),
            Err(e) => serde_json::json!({ "valid": false, "reason": e.to_string() }),
        };
        println!("{}", body);
    } else {
        match &result {
            Ok(claims) => {
                println!(
                    "{} expires in {}s",
                    Style::new().green().apply_to("valid:"),
                    claims.expires_in(now)
                );
                if let Some(sub) = claims.subject() {
                    println!("  sub: {}", sub);
                }
            }
            Err(e) => println!("{} {}", Style::new().red().apply_to("invalid:"), e),
        }
    }

    if let Err(e) = result {
        anyhow::bail!("token rejected: {}", e);
    }
    Ok(())
}
