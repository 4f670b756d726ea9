//! Web layer
//!
//! Thin axum handlers over the owned core components. The router exposes
//! the proxy endpoints (`/proxy/manifest`, `/proxy/filter`), the addon
//! surface (`/manifest.json`, `/stream/{type}/{id}`), and `/health`.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::{Router, routing::get};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

use crate::cache::{LinkCache, ManifestCache};
use crate::metadata::MetadataProvider;
use crate::pool::SessionPool;
use crate::resolver::UpstreamApi;

pub mod handlers;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub manifests: Arc<ManifestCache>,
    pub links: Arc<LinkCache>,
    pub pool: Arc<SessionPool>,
    pub api: Arc<UpstreamApi>,
    pub metadata: Arc<dyn MetadataProvider>,
    /// Public base URL every self-referential proxy URL is built from.
    pub proxy_base: String,
    pub start_time: chrono::DateTime<chrono::Utc>,
}

/// Web server configuration and setup.
pub struct WebServer {
    app: Router,
    addr: SocketAddr,
}

impl WebServer {
    pub fn new(state: AppState, host: &str, port: u16) -> Result<Self> {
        let addr: SocketAddr = format!("{host}:{port}").parse()?;
        Ok(Self {
            app: Self::create_router(state),
            addr,
        })
    }

    /// Create the router with all routes and middleware.
    fn create_router(state: AppState) -> Router {
        Router::new()
            .route("/health", get(handlers::health))
            .route("/manifest.json", get(handlers::addon_manifest))
            // GET routes answer HEAD as well; the manifest endpoint needs both.
            .route("/proxy/manifest", get(handlers::proxy_manifest))
            .route("/proxy/filter", get(handlers::proxy_filter))
            .route("/stream/{stream_type}/{stream_id}", get(handlers::stream))
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    /// Serve until the cancellation token fires, then shut down gracefully.
    pub async fn serve_with_cancellation(self, token: CancellationToken) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(&self.addr).await?;
        tracing::info!(addr = %self.addr, "web server listening");

        axum::serve(listener, self.app)
            .with_graceful_shutdown(async move {
                token.cancelled().await;
                tracing::info!("web server received cancellation signal, shutting down gracefully");
            })
            .await?;
        Ok(())
    }
}
