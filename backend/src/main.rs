//! Main entry point for the Slidecraft backend.
//!
//! Initializes logging, loads the configuration, opens the database, seeds
//! the whitelist and serves the router built by [`backend::app`].

use backend::config::Config;
use backend::database::Database;
use backend::AppState;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::from_env();

    // RUST_LOG wins over LOG_LEVEL when both are set.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},tower_http=info", config.log_level)));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("Server stopped: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    tokio::fs::create_dir_all(&config.upload_folder).await?;
    let db = Database::open(&config.database_path)?;
    info!("Database ready at {}", config.database_path.display());

    let addr = config.bind_addr();
    let seed = config.allowed_emails.clone();
    if !config.auth_enabled() {
        info!("Authentication disabled; all data is unscoped");
    }

    let state = AppState::from_config(config, db);
    state.auth.seed_whitelist(seed).await?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on {addr}");
    axum::serve(listener, backend::app(state)).await?;
    Ok(())
}
