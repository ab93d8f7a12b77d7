//! The mock service: a small REST surface plus two HTML pages, with seeded
//! latency injection on the API routes and an append-only JSONL request log.
//!
//! The service is the server side of the bench. It is consumed as a black
//! box by the trial runner over HTTP; there is no shared memory between the
//! two sides.

pub mod handlers;
pub mod log;
pub mod middleware;
pub mod routes;
pub mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

pub use log::RequestLogRecord;
pub use state::{AppState, Item};

use crate::error::Result;
use crate::settings::Settings;

/// Configuration for the mock service process.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to bind the server to.
    pub bind_address: SocketAddr,
    /// Directory holding the request log.
    pub artifacts_dir: PathBuf,
    /// Injection and logging knobs.
    pub settings: Settings,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8004".parse().expect("static address"),
            artifacts_dir: PathBuf::from("artifacts"),
            settings: Settings::default(),
        }
    }
}

/// The mock service.
pub struct MockService {
    config: ServiceConfig,
    state: Arc<AppState>,
}

impl MockService {
    /// Builds the service, validating the delay configuration up front.
    pub fn new(config: ServiceConfig) -> Result<Self> {
        let state = Arc::new(AppState::new(&config.settings, &config.artifacts_dir)?);
        Ok(Self { config, state })
    }

    /// Shared state, for tests that drive the router in-process.
    pub fn state(&self) -> Arc<AppState> {
        self.state.clone()
    }

    /// Builds the router with all routes and layers.
    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        routes::routes(self.state.clone())
            .layer(cors)
            .layer(TraceLayer::new_for_http())
    }

    /// Runs the service until the process exits.
    pub async fn run(self) -> Result<()> {
        let addr = self.config.bind_address;
        let router = self.router();

        info!(%addr, "starting mock service");
        let listener = TcpListener::bind(addr).await?;
        axum::serve(listener, router).await?;
        Ok(())
    }

    /// Runs the service with graceful shutdown support.
    pub async fn run_with_shutdown(
        self,
        shutdown: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> Result<()> {
        let addr = self.config.bind_address;
        let router = self.router();

        info!(%addr, "starting mock service");
        let listener = TcpListener::bind(addr).await?;
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }
}
