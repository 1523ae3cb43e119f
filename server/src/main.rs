use axum::routing::get;
use axum::Router;
use presence_server::config::ServerConfig;
use presence_server::registry::RoomRegistry;
use presence_server::ws::{ws_handler, AppState};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid environment: {}", e);
            std::process::exit(1);
        }
    };

    // Validate configuration before starting
    if let Err(e) = config.validate() {
        tracing::error!("Invalid server configuration: {}", e);
        std::process::exit(1);
    }

    let registry = Arc::new(RoomRegistry::new(config.room_loop()));

    let app_state = AppState {
        registry: Arc::clone(&registry),
        world: config.world,
        connection_semaphore: Arc::new(Semaphore::new(config.max_connections)),
    };
    let app = Router::new()
        .route("/ws", get(ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    let listener = match tokio::net::TcpListener::bind(&config.listen_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", config.listen_addr, e);
            std::process::exit(1);
        }
    };

    tracing::info!(
        addr = %config.listen_addr,
        gravity = config.world.gravity,
        tick_rate_hz = config.world.tick_rate_hz,
        "Presence server listening"
    );

    let shutdown_registry = Arc::clone(&registry);
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
            shutdown_registry.stop_all().await;
        })
        .await;

    if let Err(e) = served {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
