//! Gateway server setup
//!
//! Routes, middleware, and the listener lifecycle.

mod auth;
mod dispatch;
mod handler;
mod state;

pub use auth::{AuthRejection, OwnerId};
pub use handler::connect_handler;
pub use state::{App, AppBuilder};

use crate::hooks::HookType;
use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use socket_common::{AppError, CorsConfig};
use std::future::Future;
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the gateway router
pub fn create_router() -> Router<App> {
    Router::new()
        .route("/ws/connect", get(connect_handler))
        .route("/health", get(health_check))
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Build the complete application
pub fn create_app(app: App) -> Router {
    let cors = create_cors_layer(&app.config().cors);
    create_router()
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app)
}

/// CORS from configured origins; an empty list allows any origin
fn create_cors_layer(config: &CorsConfig) -> CorsLayer {
    let base_layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if config.allowed_origins.is_empty() {
        return base_layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| {
            origin.parse::<HeaderValue>().ok().or_else(|| {
                tracing::warn!("Invalid CORS origin: {}", origin);
                None
            })
        })
        .collect();

    tracing::info!("CORS: Allowing {} configured origins", origins.len());
    base_layer.allow_origin(AllowOrigin::list(origins))
}

/// Serve on a bound listener until the shutdown future resolves
///
/// Emits `SERVER_STARTED` before accepting connections.
pub async fn serve_with_shutdown<F>(
    app: App,
    listener: TcpListener,
    shutdown: F,
) -> Result<(), AppError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr().map_err(AppError::Server)?;

    tracing::info!("Gateway listening on ws://{}/ws/connect", addr);
    app.hooks()
        .emit(HookType::ServerStarted, format!("listening on {addr}"));

    axum::serve(listener, create_app(app))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(AppError::Server)
}

/// Serve on a bound listener until ctrl-c or SIGTERM
pub async fn serve(app: App, listener: TcpListener) -> Result<(), AppError> {
    serve_with_shutdown(app, listener, shutdown_signal()).await
}

/// Bind the configured address and run the gateway
pub async fn run(app: App) -> Result<(), AppError> {
    let addr = app.config().server.address();
    tracing::info!("Starting Gateway server on {}", addr);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| AppError::Bind { addr, source })?;

    serve(app, listener).await
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
