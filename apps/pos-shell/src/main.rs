//! # Agro POS Shell
//!
//! Terminal front end for the POS engine: one counter, several open tabs,
//! commands typed on stdin.
//!
//! ## Startup Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. Initialize tracing       RUST_LOG or --log-filter, default info     │
//! │  2. Load pos.toml            file → AGRO_* env overrides → validate     │
//! │  3. Build HttpGateway        base URL, token, timeout                   │
//! │  4. Build PosServices        engine, catalog, checkout, history         │
//! │  5. bootstrap()              region / channel, outstanding drafts       │
//! │  6. Command loop             until `quit` or end of input               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod commands;
mod console;

use std::path::PathBuf;
use std::sync::Arc;

use agro_gateway::HttpGateway;
use agro_pos::{PosConfig, PosServices};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::commands::{Command, Shell};
use crate::console::ConsoleEmitter;

#[derive(Debug, Parser)]
#[command(name = "pos-shell", version, about = "Agro POS counter in a terminal")]
struct Args {
    /// Path to pos.toml (defaults to the platform config directory)
    #[arg(short, long, env = "AGRO_CONFIG")]
    config: Option<PathBuf>,

    /// Tracing filter, e.g. "info,agro_pos=debug"
    #[arg(long)]
    log_filter: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_tracing(args.log_filter.as_deref());

    info!("Starting Agro POS shell");

    let config = PosConfig::load(args.config)?;
    info!(
        gateway = %config.gateway.url,
        terminal = %config.terminal.name,
        currency = %config.currency(),
        "Configuration loaded"
    );

    let gateway = Arc::new(HttpGateway::new(&config.http_gateway())?);
    let services = PosServices::new(&config, gateway, Arc::new(ConsoleEmitter))?;

    match services.engine.bootstrap().await {
        Ok(tabs) => info!(tabs = tabs.len(), "Engine ready"),
        Err(e) => warn!(error = %e, "Bootstrap failed, use `refresh` to retry"),
    }

    let mut shell = Shell::new(services);
    shell.print_tabs().await;
    println!("Type `help` for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match Command::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(usage) => {
                println!("? {}", usage);
                continue;
            }
        };
        if command == Command::Quit {
            break;
        }
        shell.run(command).await;
    }

    info!("Shell closed");
    Ok(())
}

/// Initializes the tracing subscriber.
///
/// `--log-filter` wins over `RUST_LOG`; default is INFO.
fn init_tracing(filter: Option<&str>) {
    let filter = filter
        .map(EnvFilter::new)
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("info,reqwest=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
