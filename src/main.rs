use std::net::SocketAddr;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use wey::auth::mailer;
use wey::config::{Cli, Config};
use wey::db;
use wey::routes;
use wey::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli);
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;
    if config.auth.jwt_secret == wey::config::AuthConfig::default().jwt_secret {
        tracing::warn!("Using the default JWT secret; set auth.jwt_secret in config.toml");
    }

    // Ensure media directory exists
    std::fs::create_dir_all(config.media_path())?;

    // Initialize database
    let pool = db::create_pool(&config.db_path())?;
    db::run_migrations(&pool)?;

    let mailer = mailer::from_config(&config.mail)?;
    let state = AppState::new(pool, config.clone(), mailer);
    let app = routes::router(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
