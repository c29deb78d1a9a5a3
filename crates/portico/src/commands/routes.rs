//! Routes command - prints the resolved service route table.

use anyhow::Result;
use clap::Args;
use console::{Style, style};
use portico_config::{Deployment, Environment};
use serde::Serialize;

use super::Context;

/// Arguments for the routes command.
#[derive(Args, Debug)]
pub struct RoutesArgs {
    /// Only show this service
    pub service: Option<String>,

    /// Show every deployment, not just the active one
    #[arg(long)]
    pub all: bool,
}

#[derive(Debug, Serialize)]
struct RouteRow {
    service: String,
    deployment: Deployment,
    browser: String,
    server: String,
}

/// Run the routes command.
pub async fn run(args: RoutesArgs, ctx: &Context) -> Result<()> {
    let router = ctx.router()?;

    if let Some(service) = &args.service
        && router.route(service).is_none()
    {
        anyhow::bail!(
            "Unknown service '{}'. Known services: {}",
            service,
            router.names().collect::<Vec<_>>().join(", ")
        );
    }

    let deployments: Vec<Deployment> = if args.all {
        Deployment::ALL.to_vec()
    } else {
        vec![ctx.deployment]
    };

    let rows: Vec<RouteRow> = router
        .routes()
        .filter(|r| args.service.as_deref().is_none_or(|s| s == r.name()))
        .flat_map(|route| {
            deployments.iter().map(move |&deployment| RouteRow {
                service: route.name().to_string(),
                deployment,
                browser: route.resolve(Environment::browser(deployment)),
                server: route.resolve(Environment::server(deployment)),
            })
        })
        .collect();

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    let dim = Style::new().dim();
    let cyan = Style::new().cyan();

    println!();
    println!("{}", style("Service Routes").bold());
    println!("{}", dim.apply_to("─".repeat(60)));
    for row in &rows {
        println!();
        println!(
            "  {} {}",
            cyan.apply_to(&row.service),
            dim.apply_to(format!("({})", row.deployment))
        );
        println!("    {} {}", dim.apply_to("browser:"), row.browser);
        println!("    {} {}", dim.apply_to("server: "), row.server);
    }
    println!();

    Ok(())
}
