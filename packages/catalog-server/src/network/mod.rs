//! HTTP side of the catalog: configuration, the request gateway, product
//! and health handlers, middleware, and the server lifecycle.

pub mod config;
pub mod gateway;
pub mod handlers;
pub mod middleware;
pub mod module;
pub mod shutdown;

pub use config::NetworkConfig;
pub use gateway::{GatewayConfig, GatewayResponse, ProductGateway};
pub use handlers::AppState;
pub use module::{build_router, NetworkModule};
pub use shutdown::{HealthState, InFlightGuard, ShutdownController};
