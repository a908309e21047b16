//! CLI entry point: send one pipeline of requests to a Zerograph service.
//!
//! Requests are given as arguments, or one per line on stdin when no
//! arguments are given:
//!
//! ```text
//! zerograph 'CREATE Node {"labels":["Person"],"properties":{"name":"Alice"}}' \
//!           'GET Node {"id*":0}'
//! ```

use std::io::{IsTerminal, Read};

use clap::Parser;
use serde_json::{json, Value as JsonValue};
use tracing_subscriber::{fmt, EnvFilter};

use zerograph_core::{ClientConfig, Request};
use zerograph_graph::{Graph, Reply, Response};

#[derive(Parser)]
#[command(name = "zerograph")]
#[command(about = "Send a pipeline of requests to a Zerograph service")]
struct Cli {
    /// Request lines, e.g. `GET Node {"id":1}`. Read from stdin if omitted.
    requests: Vec<String>,

    /// Override the configured host.
    #[arg(long)]
    host: Option<String>,

    /// Override the configured port.
    #[arg(short, long)]
    port: Option<u16>,

    /// Print results as JSON, one value per line.
    #[arg(long)]
    json: bool,

    /// Config file prefix (default: zerograph).
    #[arg(short, long, default_value = "zerograph")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .json()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let lines = request_lines(&cli)?;
    if lines.is_empty() {
        anyhow::bail!("No requests given");
    }

    let requests = lines
        .iter()
        .map(|line| Request::parse(line))
        .collect::<Result<Vec<_>, _>>()?;

    let graph = Graph::connect(&config).await?;
    let mut batch = graph.batch();
    for request in requests {
        batch.append(request)?;
    }
    tracing::info!(requests = batch.len(), "Submitting pipeline");

    let mut failures = 0;
    for (index, result) in batch.submit().await?.enumerate() {
        match result {
            Ok(reply) if cli.json => println!("{}", reply_json(reply)),
            Ok(reply) => print_reply(reply),
            Err(e) => {
                failures += 1;
                if cli.json {
                    println!("{}", json!({"error": e.to_string()}));
                } else {
                    eprintln!("[{index}] {e}");
                }
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{failures} of {} requests failed", lines.len());
    }
    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<ClientConfig> {
    let mut config = ClientConfig::load(&cli.config)?;
    if let Some(host) = &cli.host {
        config.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    Ok(config)
}

fn request_lines(cli: &Cli) -> anyhow::Result<Vec<String>> {
    if !cli.requests.is_empty() {
        return Ok(cli.requests.clone());
    }
    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        return Ok(Vec::new());
    }
    let mut input = String::new();
    stdin.lock().read_to_string(&mut input)?;
    Ok(input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect())
}

fn print_reply(reply: Reply) {
    let Reply::Response(response) = reply else {
        println!("(no reply)");
        return;
    };
    if response.columns().is_some() {
        print!("{}", response.into_table());
        return;
    }
    let Response { body, foot, .. } = response;
    for value in &body {
        println!("{value}");
    }
    if let Some(foot) = foot {
        println!("{foot}");
    }
}

fn reply_json(reply: Reply) -> JsonValue {
    match reply {
        Reply::Absent => JsonValue::Null,
        Reply::Response(response) => json!({
            "head": response.head.as_ref().map(|v| v.to_json()),
            "body": response.body.iter().map(|v| v.to_json()).collect::<Vec<_>>(),
            "foot": response.foot.as_ref().map(|v| v.to_json()),
        }),
    }
}
