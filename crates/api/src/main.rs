use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use quicknotes_api::config::ServerConfig;
use quicknotes_api::router::build_app_router;
use quicknotes_api::state::AppState;
use quicknotes_cardano::blockfrost::BlockfrostApi;
use quicknotes_cardano::ChainIndexer;
use quicknotes_db::{NoteStore, PgNoteStore};
use quicknotes_pipeline::ConfirmationPoller;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "quicknotes_api=debug,quicknotes_pipeline=debug,quicknotes_cardano=debug,tower_http=debug"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        indexer = %config.blockfrost.api_url,
        "Loaded server configuration"
    );

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = quicknotes_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    quicknotes_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    quicknotes_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Collaborators ---
    let store: Arc<dyn NoteStore> = Arc::new(PgNoteStore::new(pool));
    let indexer: Arc<dyn ChainIndexer> = Arc::new(BlockfrostApi::new(
        config.blockfrost.api_url.clone(),
        config.blockfrost.project_id.clone(),
    ));

    // --- Confirmation poller ---
    let poller_cancel = CancellationToken::new();
    let poller = ConfirmationPoller::new(Arc::clone(&store), Arc::clone(&indexer))
        .with_interval(Duration::from_secs(config.confirmation_poll_secs));
    let poller_handle = {
        let cancel = poller_cancel.clone();
        tokio::spawn(async move { poller.run(cancel).await })
    };

    // --- App state and router ---
    let state = AppState::new(store, indexer, config.clone());
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    poller_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), poller_handle).await;
    tracing::info!("Confirmation poller stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
