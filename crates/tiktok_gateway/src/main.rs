// TikTok Gateway Server
//
// Standalone TikTok Login Kit service: OAuth sign-in, session cookies,
// profile pages and JSON endpoints. Configured through the environment
// (a `.env` file is loaded when present).

use anyhow::Context;
use tiktok_gateway::{start_server, GatewayConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Ok(path) = dotenv {
        info!(path = %path.display(), "[OK] Loaded environment file");
    }

    let config = GatewayConfig::from_env().context("Invalid configuration")?;
    info!(
        client_key = %config.oauth.client_key,
        redirect_uri = %config.oauth.redirect_uri,
        environment = ?config.environment,
        "[OK] TikTok Login Kit configured"
    );

    start_server(config).await
}
