//! HTTP API server for the Hearth gateway

pub mod devices;
pub mod health;
pub mod process;
pub mod rate_limit;

use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::Result;
use crate::assistant::Assistant;
use crate::config::ServerConfig;

/// Shared state for API handlers
pub struct ApiState {
    pub assistant: Arc<Assistant>,
    pub rate_limiter: Option<rate_limit::SharedLimiter>,
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    port: u16,
}

impl ApiServer {
    /// Create a server around an assistant
    #[must_use]
    pub fn new(assistant: Arc<Assistant>, config: &ServerConfig) -> Self {
        let rate_limiter = rate_limit::create_limiter(config.requests_per_minute);
        if rate_limiter.is_none() {
            tracing::info!("API rate limiting disabled");
        }

        Self {
            state: Arc::new(ApiState {
                assistant,
                rate_limiter,
            }),
            port: config.port,
        }
    }

    /// Build the router with all routes
    #[must_use]
    pub fn router(&self) -> Router {
        let router = Router::new()
            .merge(process::router(self.state.clone()))
            .nest("/api", devices::router(self.state.clone()))
            .merge(health::router());

        let router = router.layer(axum::middleware::from_fn_with_state(
            self.state.clone(),
            rate_limit::rate_limit_middleware,
        ));

        // CORS layer for cross-origin requests from browser clients
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        router.layer(cors).layer(TraceLayer::new_for_http())
    }

    /// Run the API server
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind API server: {e}")))?;

        tracing::info!(port = self.port, "API server listening");

        axum::serve(listener, self.router())
            .await
            .map_err(|e| crate::Error::Config(format!("API server error: {e}")))?;

        Ok(())
    }

    /// Run the API server in a background task
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}
