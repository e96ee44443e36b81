use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use docstore_rest::config::{StoreBackend, CONFIG};
use docstore_rest::database::open_store;
use docstore_rest::state::AppState;

/// Generic REST API over schema-less document collections
#[derive(Debug, Parser)]
#[command(name = "docstore-rest", version, about)]
struct Args {
    /// Port to listen on (overrides PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Store backend: memory or postgres (overrides STORE)
    #[arg(long)]
    store: Option<String>,

    /// Database connection URL (overrides DATABASE_URL)
    #[arg(long)]
    database_url: Option<String>,

    /// Mount only the read routes (overrides READ_ONLY)
    #[arg(long)]
    read_only: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_KEY, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut config = CONFIG.clone();
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(store) = args.store {
        config.database.backend = store.parse::<StoreBackend>().map_err(anyhow::Error::msg)?;
    }
    if let Some(url) = args.database_url {
        config.database.url = Some(url);
    }
    if args.read_only {
        config.server.read_only = true;
    }
    tracing::info!("Starting docstore-rest in {:?} mode", config.environment);

    let store = open_store(&config.database).await.context("failed to open the document store")?;
    tracing::info!("Using the {} store", store.kind());

    let port = config.server.port;
    let state = AppState::from_config(config, store.clone())?;
    let app = docstore_rest::app(state);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    tracing::info!("docstore-rest listening on http://{}", bind_addr);

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    store.close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
