//! Ingestion gateway server.

use anyhow::Result;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use super::api::{self, AppState};
use crate::orchestrator::Reconciler;
use crate::store::RunStore;

pub const API_KEY_ENV: &str = "QA_NEXUS_API_KEY";
pub const DEFAULT_API_KEY: &str = "dev-api-key";

/// Ingestion server configuration
pub struct IngestConfig {
    pub port: u16,
    pub api_key: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            port: 9500,
            api_key: api_key_from_env(),
        }
    }
}

/// Resolve the expected API key, falling back to the development default.
pub fn api_key_from_env() -> String {
    std::env::var(API_KEY_ENV).unwrap_or_else(|_| DEFAULT_API_KEY.to_string())
}

/// HTTP gateway accepting externally-executed results
pub struct IngestServer {
    config: IngestConfig,
    state: Arc<AppState>,
}

impl IngestServer {
    pub fn new(store: Arc<dyn RunStore>, config: IngestConfig) -> Self {
        let state = Arc::new(AppState {
            reconciler: Arc::new(Reconciler::new(store.clone())),
            store,
            api_key: config.api_key.clone(),
        });
        Self { config, state }
    }

    /// Router with state attached; used directly by tests.
    pub fn router(&self) -> Router {
        Router::new()
            .merge(api::api_router())
            .layer(CorsLayer::permissive())
            .with_state(self.state.clone())
    }

    /// Bind and serve until the process is stopped.
    pub async fn start(&self) -> Result<()> {
        let app = self.router();
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port));

        println!("\n📥 Ingestion gateway started!");
        println!("   Listening: http://localhost:{}", self.config.port);
        println!("\n   Press Ctrl+C to stop.\n");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app.into_make_service()).await?;
        Ok(())
    }
}
