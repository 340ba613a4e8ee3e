//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the faucet handlers
//! - Wire up middleware (tracing, request timeout, CORS)
//! - Bind server to listener and drain on shutdown

use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::clearnode::ClearnodeClient;
use crate::config::FaucetConfig;
use crate::http::faucet;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub client: ClearnodeClient,
    /// Run the operational check before every transfer.
    pub check_before_transfer: bool,
}

/// HTTP front end of the faucet.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: &FaucetConfig, client: ClearnodeClient) -> Self {
        let state = AppState {
            client,
            check_before_transfer: config.faucet.check_before_transfer,
        };
        let router = Self::build_router(
            Duration::from_secs(config.server.request_timeout_secs),
            state,
        );
        Self { router }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(request_timeout: Duration, state: AppState) -> Router {
        Router::new()
            .route("/requestTokens", post(faucet::request_tokens))
            .route("/info", get(faucet::info))
            .with_state(state)
            .layer(TimeoutLayer::new(request_timeout))
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
    }

    /// The configured router, for embedding or in-process tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` resolves, then drain in-flight requests.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
