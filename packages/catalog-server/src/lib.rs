//! Catalog server: product HTTP routes in front of an in-process message
//! bus, with a command dispatcher on the far side that talks to a document
//! store.
//!
//! Request flow: HTTP handler → [`network::ProductGateway`] →
//! [`bus::MessageBus`] → [`dispatch::Dispatcher`] → product handler →
//! [`store::DocumentStore`], and the reply travels back on the same
//! correlation id.

pub mod bus;
pub mod config;
pub mod dispatch;
pub mod network;
pub mod store;
pub mod telemetry;

pub use bus::{BusConfig, BusError, MessageBus};
pub use config::{Cli, ServerConfig};
pub use dispatch::{build_dispatch_pipeline, product_router, Dispatcher};
pub use network::{NetworkModule, ProductGateway};
pub use store::{DocumentStore, InMemoryDocumentStore};
