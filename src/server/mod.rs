//! HTTP server for the research session API

pub mod error;
pub mod routes;
pub mod state;

pub use state::AppState;

use axum::http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use axum::http::HeaderValue;
use axum::routing::{delete, get, post};
use axum::Router;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

/// Build the API router. Exposed separately so tests can drive it without
/// binding a socket.
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/api/research/initiate", post(routes::initiate))
        .route("/api/research/status/:chat_id", get(routes::status))
        .route("/api/research/session/:chat_id", get(routes::session))
        .route("/api/research/sessions", get(routes::sessions))
        .route(
            "/api/research/:chat_id/retry-phase",
            post(routes::retry_phase),
        )
        .route("/api/research/:chat_id/stop-phase", post(routes::stop_phase))
        .route("/api/research/:chat_id", delete(routes::delete_session))
        .route("/api/research/:chat_id/report", get(routes::report))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Run the HTTP server until ctrl-c
pub async fn run_server(
    port: u16,
    bind: &str,
    state: AppState,
    cors_origins: Option<Vec<String>>,
) -> Result<(), String> {
    // CORS must be the outermost layer so preflight OPTIONS requests are
    // answered before anything else
    let cors = match &cors_origins {
        Some(origins) if !origins.is_empty() => {
            let allowed_origins: Vec<HeaderValue> =
                origins.iter().filter_map(|o| o.parse().ok()).collect();
            CorsLayer::new()
                .allow_origin(allowed_origins)
                .allow_methods(Any)
                .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT])
        }
        _ => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]),
    };

    let app = api_router(state).layer(cors);

    let addr: SocketAddr = format!("{}:{}", bind, port)
        .parse()
        .map_err(|e| format!("Invalid address: {}", e))?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| format!("Failed to bind to {}: {}", addr, e))?;

    log::info!("Research server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| format!("Server error: {}", e))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to install ctrl-c handler: {}", e);
    } else {
        log::info!("Shutdown signal received, stopping server...");
    }
}

/// Health check endpoint
async fn health_handler() -> &'static str {
    "OK"
}
