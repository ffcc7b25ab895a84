use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use datashare_api::app::{app, AppState};
use datashare_api::config::config;

#[derive(Parser)]
#[command(name = "datashare-api")]
#[command(about = "Shared-data API server: table browsing, search, import/export and file sharing")]
#[command(version)]
struct Args {
    #[arg(long, help = "Bind address (overrides HOST)")]
    host: Option<String>,

    #[arg(long, help = "Bind port (overrides PORT)")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so DATABASE_URL, JWT_SECRET_KEY, etc. are picked up
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut config = config().clone();
    if let Some(host) = args.host {
        config.api.host = host;
    }
    if let Some(port) = args.port {
        config.api.port = port;
    }
    if config.security.jwt_secret.is_empty() {
        anyhow::bail!("JWT_SECRET_KEY must be set in {:?} mode", config.environment);
    }

    info!("Starting datashare API in {:?} mode", config.environment);
    let bind_addr = format!("{}:{}", config.api.host, config.api.port);

    let state = AppState::initialize(config).await?;
    let db = state.db.clone();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Listening on http://{}", bind_addr);

    axum::serve(listener, app(state)).await?;
    db.close().await;
    Ok(())
}
