pub mod api;
pub mod auth;
pub mod cli;
pub mod clock;
pub mod db;
pub mod jwt;

use api::create_api_router;
use auth::{Guard, JwtService};
use axum::Router;
use clock::Clock;
use db::Database;
use jwt::JwtConfig;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Path prefix for every API route.
pub const API_PATH: &str = "/api/v1";

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// Decoded JWT signing secret
    pub jwt_secret: Vec<u8>,
    /// Application URL, used as the token issuer
    pub app_url: String,
    /// Token lifetime in minutes
    pub ttl_minutes: NonZeroU32,
    /// Time source for issuing and expiring tokens
    pub clock: Arc<dyn Clock>,
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let jwt = JwtConfig::new(&config.jwt_secret);

    let service = JwtService::new(
        config.db.clone(),
        jwt,
        config.clock.clone(),
        config.app_url.clone(),
        config.ttl_minutes,
    );
    let guard = Guard::new(service, config.db.clone());

    Router::new().nest(API_PATH, create_api_router(config.db.clone(), guard))
}

/// Run the server on the given listener. This function blocks until the server exits.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}

/// Start the server on the given port in a background task. Use port 0 to let the OS choose a random port.
/// Returns the actual address the server is listening on.
pub async fn start_server(
    config: ServerConfig,
    port: u16,
) -> Result<(tokio::task::JoinHandle<()>, SocketAddr), std::io::Error> {
    let listener = TcpListener::bind(("127.0.0.1", port)).await?;
    let local_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = run_server(config, listener).await {
            tracing::error!(error = %e, "Server error");
        }
    });

    Ok((handle, local_addr))
}
