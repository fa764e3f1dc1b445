use std::net::SocketAddr;
use std::sync::Arc;

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use auth_service::config::Config;
use auth_service::ratelimit::{connect_window_store, WindowStoreConfig};
use auth_service::routes;
use auth_service::state::AppState;
use auth_service::tokens::{PostgresTokenRepository, TokenReloader, TokenStore};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {e}");
        std::process::exit(1);
    });

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("auth_service={},tower_http=info", config.logger.level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        listen_addr = %config.listen_addr,
        "Starting auth service"
    );

    // Token snapshot + repository
    let tokens = Arc::new(TokenStore::new());
    let repo = PostgresTokenRepository::connect_lazy(&config.postgres_dsn).unwrap_or_else(|e| {
        eprintln!("Invalid postgres_dsn: {e}");
        std::process::exit(1);
    });
    let reloader = TokenReloader::new(Arc::new(repo), tokens.clone(), config.token_reload_interval);

    // Initial load may fail if the database is not up yet; the store simply
    // stays not-ready until a periodic reload succeeds.
    match reloader.load_once().await {
        Ok(()) => tracing::info!("Token store ready"),
        Err(e) => tracing::error!(error = %e, "Initial token load failed"),
    }

    let cancel = CancellationToken::new();
    reloader.start(cancel.clone());

    let window_store = connect_window_store(&WindowStoreConfig {
        addr: config.redis_addr.clone(),
        password: config.redis_password.clone(),
        db: config.redis_rate_db,
    })
    .await;

    let state = AppState::new(config.clone(), tokens, window_store);
    let app = routes::router(state.clone());

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .unwrap_or_else(|e| {
            eprintln!("Cannot bind {}: {e}", config.listen_addr);
            std::process::exit(1);
        });

    tracing::info!("auth-service listening on {}", config.listen_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("server error");

    cancel.cancel();
    if let Err(e) = state.window_store().close().await {
        tracing::warn!(error = %e, "Window store close failed");
    }
    tracing::info!("Server shutdown complete");
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
