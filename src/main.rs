//! Circulation Server - library loan and stock service

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use circulation_server::{
    api,
    config::{AppConfig, StorageBackend},
    repository::{CirculationStore, MemoryStore, PgStore},
    services::{auth::JwtGate, loans::LoanPolicy, Services},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;

    init_tracing(&config);

    tracing::info!("Starting Circulation Server v{}", env!("CARGO_PKG_VERSION"));

    let store: Arc<dyn CirculationStore> = match config.storage.backend {
        StorageBackend::Postgres => {
            let store = PgStore::connect(&config.database)
                .await
                .context("Failed to connect to database")?;
            tracing::info!("Connected to database");

            store.migrate().await.context("Failed to run database migrations")?;
            tracing::info!("Database migrations completed");
            Arc::new(store)
        }
        StorageBackend::Memory => {
            let store = MemoryStore::seeded(&config.storage)
                .await
                .context("Failed to seed in-memory store")?;
            tracing::warn!(
                books = config.storage.books.len(),
                users = config.storage.users.len(),
                "Using in-memory storage; all data is lost on shutdown"
            );
            Arc::new(store)
        }
    };

    let server_host = config.server.host.clone();
    let server_port = config.server.port;

    let policy = LoanPolicy::from(&config.loans);
    tracing::info!(period_days = config.loans.period_days, "Loan policy loaded");

    let gate = Arc::new(JwtGate::new(&config.auth.jwt_secret));
    let services = Services::new(store.clone(), gate, policy);

    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(services),
    };

    let app = api::router(state);

    let addr = SocketAddr::new(server_host.parse().context("Invalid host address")?, server_port);

    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    store.close().await;
    tracing::info!("Server stopped");

    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("circulation_server={},tower_http=debug", config.logging.level).into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
