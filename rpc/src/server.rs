//! Axum-based RPC server.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use overlay_engine::Engine;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::error::RpcError;
use crate::handlers;

/// Every route the node exposes, with permissive CORS and a JSON 404.
/// Request bodies may be as large as the biggest container the codec reads.
pub fn router(engine: Arc<Engine>) -> Router {
    Router::new()
        .route("/submit", post(handlers::submit))
        .route("/lookup", post(handlers::lookup))
        .route("/listTopicManagers", get(handlers::list_topic_managers))
        .route(
            "/listLookupServiceProviders",
            get(handlers::list_lookup_service_providers),
        )
        .route(
            "/getDocumentationForTopicManager",
            get(handlers::documentation_for_topic_manager),
        )
        .route(
            "/getDocumentationForLookupServiceProvider",
            get(handlers::documentation_for_lookup_service),
        )
        .route("/arc-ingest", post(handlers::arc_ingest))
        .route("/syncAdvertisements", post(handlers::sync_advertisements))
        .route("/metrics", get(handlers::metrics))
        .fallback(handlers::not_found)
        .layer(DefaultBodyLimit::max(overlay_codec::MAX_CONTAINER_SIZE))
        .layer(CorsLayer::permissive())
        .with_state(engine)
}

pub struct RpcServer {
    pub port: u16,
    engine: Arc<Engine>,
}

impl RpcServer {
    pub fn new(port: u16, engine: Arc<Engine>) -> Self {
        Self { port, engine }
    }

    /// Serve until `shutdown` resolves, then drain in-flight requests.
    pub async fn start<F>(&self, shutdown: F) -> Result<(), RpcError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| RpcError::Server(format!("bind {addr}: {e}")))?;
        info!(%addr, "RPC server listening");
        axum::serve(listener, router(self.engine.clone()))
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| RpcError::Server(e.to_string()))
    }
}
