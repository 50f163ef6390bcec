//! HTTP handler definitions for the catalog server.
//!
//! Defines `AppState`, the shared state carried through axum extractors,
//! and re-exports the handler functions used to build the router.

pub mod health;
pub mod products;

pub use health::{health_handler, liveness_handler, readiness_handler};
pub use products::{
    create_product, delete_product, get_product, list_products, product_routes, update_product,
};

use std::sync::Arc;
use std::time::Instant;

use super::gateway::ProductGateway;
use super::{NetworkConfig, ShutdownController};

/// Shared application state passed to all axum handlers via `State` extraction.
///
/// Holds `Arc` references so cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    /// Bus-facing side of the product routes.
    pub gateway: Arc<ProductGateway>,
    /// Graceful shutdown controller with health state and in-flight tracking.
    pub shutdown: Arc<ShutdownController>,
    /// Network configuration (bind address, passphrase, CORS).
    pub config: Arc<NetworkConfig>,
    /// Server process start time, used for uptime calculation.
    pub start_time: Instant,
}
