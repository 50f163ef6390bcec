//! Network module with deferred startup lifecycle.
//!
//! `new()` allocates shared state, `start()` binds the TCP listener and
//! `serve()` accepts connections until shutdown. The split lets the binary
//! report the bound port and attach the dispatcher before traffic arrives.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context as _;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::config::NetworkConfig;
use super::gateway::ProductGateway;
use super::handlers::{
    health_handler, liveness_handler, product_routes, readiness_handler, AppState,
};
use super::middleware::build_http_layers;
use super::shutdown::ShutdownController;

/// Mount point of the product sub-router.
pub const API_PREFIX: &str = "/api/v1";

/// How long `serve` waits for in-flight product requests after shutdown.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Assembles the axum router with all routes and middleware.
///
/// Routes:
/// - `GET /health`, `GET /health/live`, `GET /health/ready`
/// - `GET|POST /api/v1/products`
/// - `GET|PUT|DELETE /api/v1/products/{id}`
pub fn build_router(state: AppState) -> Router {
    let layers = build_http_layers(&state.config);

    Router::new()
        .route("/health", get(health_handler))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler))
        .nest(API_PREFIX, product_routes(state.clone()))
        .layer(layers)
        .with_state(state)
}

/// Manages the HTTP server lifecycle.
pub struct NetworkModule {
    config: NetworkConfig,
    listener: Option<TcpListener>,
    gateway: Arc<ProductGateway>,
    shutdown: Arc<ShutdownController>,
}

impl NetworkModule {
    /// Creates a new network module without binding any port.
    #[must_use]
    pub fn new(config: NetworkConfig, gateway: Arc<ProductGateway>) -> Self {
        Self {
            config,
            listener: None,
            gateway,
            shutdown: Arc::new(ShutdownController::new()),
        }
    }

    /// Returns a shared reference to the shutdown controller.
    #[must_use]
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.shutdown)
    }

    fn state(&self) -> AppState {
        AppState {
            gateway: Arc::clone(&self.gateway),
            shutdown: Arc::clone(&self.shutdown),
            config: Arc::new(self.config.clone()),
            start_time: Instant::now(),
        }
    }

    /// Router over this module's shared state.
    pub fn router(&self) -> Router {
        build_router(self.state())
    }

    /// Binds the TCP listener to the configured host and port.
    ///
    /// Returns the bound port, which differs from the configured one when
    /// port 0 is used.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        let port = listener.local_addr()?.port();

        info!(host = %self.config.host, port, "TCP listener bound");

        self.listener = Some(listener);
        Ok(port)
    }

    /// Serves requests until `shutdown` resolves, then drains.
    ///
    /// After the signal the health state moves to `Draining`, the server
    /// waits up to 30 seconds for in-flight product requests, and the state
    /// becomes `Stopped` if they all finished.
    ///
    /// # Errors
    ///
    /// Returns an error if `start()` was not called first or the server hits
    /// a fatal I/O error.
    pub async fn serve(
        mut self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let Some(listener) = self.listener.take() else {
            anyhow::bail!("start() must be called before serve()");
        };
        let router = self.router();
        let shutdown_ctrl = self.shutdown;

        shutdown_ctrl.set_ready();
        info!("serving HTTP");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;

        drain(&shutdown_ctrl).await;
        Ok(())
    }
}

async fn drain(shutdown_ctrl: &ShutdownController) {
    shutdown_ctrl.trigger_shutdown();

    let in_flight = shutdown_ctrl.in_flight_count();
    if in_flight > 0 {
        info!(in_flight, "draining in-flight requests");
    }

    if shutdown_ctrl.wait_for_drain(DRAIN_TIMEOUT).await {
        info!("all requests drained");
    } else {
        warn!("drain timeout expired with in-flight requests remaining");
    }
}
