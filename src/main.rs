//! Edge API gateway.
//!
//! ```text
//!   Client ──▶ rate limit ──▶ auth ──▶ dispatch ──▶ users / rides / locations / notifications
//!                  │            │
//!                  └──── shared store (counters, sessions) ────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use edge_gateway::config::load_config;
use edge_gateway::lifecycle;

#[derive(Parser)]
#[command(name = "edge-gateway")]
#[command(about = "Edge API gateway: rate limiting, session auth and prefix routing", long_about = None)]
struct Args {
    /// TOML configuration file. Environment variables override it.
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,

    /// Override the listener address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }

    lifecycle::run(config).await?;
    Ok(())
}
