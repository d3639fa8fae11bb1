mod server;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use liveroom_core::auth::TokenVerifier;
use liveroom_core::{logging, Config, PresenceCoordinator};

#[derive(Debug, Parser)]
#[command(name = "liveroom", about = "Live room coordinator server")]
struct Args {
    /// Path to the configuration file (TOML/YAML/JSON); environment
    /// variables with the LIVEROOM_ prefix override it.
    #[arg(short, long, env = "LIVEROOM_CONFIG")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 1. Load configuration
    let config = Config::load(args.config.as_deref())
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {e}"))?;

    // 2. Initialize logging
    logging::init_logging(&config.logging)?;
    info!("Live room coordinator starting...");
    info!("HTTP address: {}", config.http_address());

    if config.auth.jwt_secret.is_empty() {
        warn!("auth.jwt_secret is empty; all bearer tokens will be rejected");
    }

    // 3. Wire services
    let coordinator = PresenceCoordinator::new(&config);
    let verifier = TokenVerifier::new(config.auth.jwt_secret.as_bytes());

    // 4. Serve until shutdown
    server::run(&config, coordinator, verifier).await
}
