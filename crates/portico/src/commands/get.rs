//! Get command - issues a GET through a service's gateway client.

use anyhow::{Result, anyhow};
use clap::Args;
use serde_json::{Map, Value};

use super::Context;

/// Arguments for the get command.
#[derive(Args, Debug)]
pub struct GetArgs {
    /// Logical service name (see `portico routes`)
    pub service: String,

    /// Path under the service prefix
    pub path: String,

    /// Query parameter as key=value; repeat a key to send it several times
    #[arg(short = 'q', long = "query", value_parser = parse_query_pair)]
    pub query: Vec<(String, String)>,
}

/// Run the get command.
pub async fn run(args: GetArgs, ctx: &Context) -> Result<()> {
    let clients = ctx.clients()?;
    let client = clients.get(&args.service)?;

    let query = group_query(args.query);
    let body: Value = client
        .get_with_query(&args.path, &query)
        .await
        .map_err(|e| match e.status() {
            Some(401) => anyhow!("{} (stored access token cleared; log in again)", e),
            _ => anyhow!(e),
        })?;

    if ctx.json_output {
        println!("{}", body);
    } else {
        println!("{}", serde_json::to_string_pretty(&body)?);
    }
    Ok(())
}

fn parse_query_pair(raw: &str) -> std::result::Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))
}

/// Repeated keys become arrays so they serialize as repeated query keys.
fn group_query(pairs: Vec<(String, String)>) -> Value {
    let mut map = Map::new();
    for (key, value) in pairs {
        match map.get_mut(&key) {
            Some(Value::Array(items)) => items.push(Value::String(value)),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, Value::String(value)]);
            }
            None => {
                map.insert(key, Value::String(value));
            }
        }
    }
    Value::Object(map)
}
