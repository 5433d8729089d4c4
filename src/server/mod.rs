//! HTTP server.
//!
//! Builds the axum router over a shared [`Repository`] and runs it until
//! Ctrl+C or SIGTERM.

pub mod error;
pub mod handlers;

use anyhow::{Context, Result};
use axum::{
    http::{header, Method},
    routing::{get, post},
    Router,
};
use std::{sync::Arc, time::Duration};
use tokio::{net::TcpListener, signal};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::config::ServerConfig;
use crate::store::Repository;

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repository>,
}

impl AppState {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }
}

/// CORS policy for the browser front-end. Also answers OPTIONS preflights.
pub fn cors_layer(max_age_seconds: u64) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::POST,
            Method::GET,
            Method::OPTIONS,
            Method::PUT,
            Method::DELETE,
        ])
        .allow_headers([
            header::ACCEPT,
            header::CONTENT_TYPE,
            header::CONTENT_LENGTH,
            header::ACCEPT_ENCODING,
            header::HeaderName::from_static("x-csrf-token"),
            header::AUTHORIZATION,
        ])
        .max_age(Duration::from_secs(max_age_seconds))
}

/// Build the application router.
pub fn router(state: AppState, config: &ServerConfig) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        .route("/signup", post(handlers::signup))
        .route("/login", post(handlers::login))
        .route("/votes", post(handlers::cast_vote))
        .route("/users", get(handlers::list_users))
        .route("/users/:id", axum::routing::delete(handlers::delete_user))
        .route("/users/:id/votes", get(handlers::user_votes))
        .route(
            "/problems",
            get(handlers::list_problems).post(handlers::create_problem),
        )
        .route(
            "/problems/:id",
            get(handlers::get_problem).delete(handlers::delete_problem),
        )
        .route("/problems/:id/result", get(handlers::problem_result_by_path))
        .route("/results", get(handlers::results))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(config.cors_max_age_seconds))
        .with_state(state)
}

/// Bind and serve until a shutdown signal arrives.
pub async fn serve(state: AppState, config: &ServerConfig) -> Result<()> {
    let app = router(state, config);

    let address = config.address();
    info!("Binding to {}", address);

    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind to {}", address))?;
    info!("Server running on http://{}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
