//! # HTTP Server
//!
//! Serves every registered store plus `/health`, with CORS and request
//! tracing layers.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::core::StoreRegistry;
use crate::rest_api::RestServer;

use super::config::HttpServerConfig;
use super::health::health_routes;

/// HTTP server for a store registry
pub struct HttpServer {
    config: HttpServerConfig,
    registry: Arc<StoreRegistry>,
    router: Router,
}

impl HttpServer {
    /// Create a server with default configuration
    pub fn new(registry: Arc<StoreRegistry>) -> Self {
        Self::with_config(HttpServerConfig::default(), registry)
    }

    /// Create a server with custom configuration
    pub fn with_config(config: HttpServerConfig, registry: Arc<StoreRegistry>) -> Self {
        let router = Self::build_router(&config, Arc::clone(&registry));
        Self {
            config,
            registry,
            router,
        }
    }

    fn build_router(config: &HttpServerConfig, registry: Arc<StoreRegistry>) -> Router {
        let cors = if config.cors_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<_> = config
                .cors_origins
                .iter()
                .filter_map(|s| s.parse().ok())
                .collect();

            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        };

        Router::new()
            .merge(health_routes(Arc::clone(&registry)))
            .merge(RestServer::router(registry))
            .layer(TraceLayer::new_for_http())
            .layer(cors)
    }

    /// Get the socket address
    pub fn socket_addr(&self) -> String {
        self.config.socket_addr()
    }

    /// Get the router (for testing)
    pub fn router(self) -> Router {
        self.router
    }

    /// Start the HTTP server (async)
    pub async fn start(self) -> Result<(), std::io::Error> {
        let addr: SocketAddr = self.config.socket_addr().parse().map_err(|e| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("invalid socket address '{}': {}", self.config.socket_addr(), e),
            )
        })?;

        for store in self.registry.iter() {
            let descriptor = store.descriptor();
            info!(
                store = %descriptor.name,
                collection = %descriptor.collection_pattern(),
                item = ?descriptor.item_pattern(),
                "serving store"
            );
        }

        let listener = TcpListener::bind(addr).await?;
        info!(%addr, stores = self.registry.len(), "HTTP server listening");
        axum::serve(listener, self.router).await?;

        Ok(())
    }
}
