//! HTTP adapter exposing [`EventFinder`] as `GET /events`.

pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::extract::Request;
use axum::routing::get;
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, info_span};
use uuid::Uuid;

use eventfinder_core::EventFinder;
use eventfinder_shared::ServerConfig;

/// Build the application router around a shared workflow.
pub fn router(finder: Arc<EventFinder>) -> Router {
    let trace = TraceLayer::new_for_http().make_span_with(|request: &Request| {
        let request_id = Uuid::now_v7();
        info_span!(
            "http_request",
            method = %request.method(),
            uri = %request.uri(),
            %request_id,
        )
    });

    Router::new()
        .route("/events", get(routes::find_events))
        .route("/health", get(routes::health))
        .with_state(finder)
        .layer(CatchPanicLayer::custom(routes::handle_panic))
        .layer(trace)
}

/// Bind `host:port` and serve until Ctrl-C.
pub async fn serve(config: &ServerConfig, finder: Arc<EventFinder>) -> std::io::Result<()> {
    let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
    info!(addr = %listener.local_addr()?, "eventfinder server listening");

    axum::serve(listener, router(finder))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown signal received");
    }
}
