use std::time::Duration;

use clap::{Parser, Subcommand};

use edge_gateway::config::load_config;
use edge_gateway::security::{Identity, SessionIssuer};
use edge_gateway::store::RedisStore;

#[derive(Parser)]
#[command(name = "gateway-session")]
#[command(about = "Issue or revoke gateway sessions in the shared store", long_about = None)]
struct Cli {
    /// TOML configuration file (same one the gateway reads).
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign a token and make it the subject's only live session
    Login {
        #[arg(long)]
        id: String,
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "rider")]
        role: String,
    },
    /// Revoke the subject's session
    Logout {
        #[arg(long)]
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    let store = RedisStore::connect(&config.store.url, Duration::from_millis(config.store.op_timeout_ms)).await?;
    let issuer = SessionIssuer::new(std::sync::Arc::new(store), &config.auth);

    match cli.command {
        Commands::Login { id, email, role } => {
            let session = issuer.login(&Identity { id, email, role }).await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "token": session.token,
                    "expiresAt": session.expires_at,
                }))?
            );
        }
        Commands::Logout { id } => {
            let removed = issuer.logout(&id).await?;
            if removed {
                println!("Session for {id} revoked");
            } else {
                println!("No live session for {id}");
            }
        }
    }

    Ok(())
}
