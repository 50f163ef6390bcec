//! `catalog-server` binary: parses configuration, wires the store, bus,
//! dispatcher and HTTP server together, and runs until Ctrl-C.

use std::sync::Arc;

use anyhow::Context as _;
use catalog_server::config::Cli;
use catalog_server::{
    build_dispatch_pipeline, product_router, telemetry, Dispatcher, MessageBus, NetworkModule,
    ProductGateway,
};
use clap::Parser;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Cli::parse().into_config();
    telemetry::init(&config.telemetry)?;

    let store = config.store.open().context("failed to open document store")?;
    info!(kind = ?config.store.kind, collection = %config.store.collection, "document store ready");

    let bus = Arc::new(MessageBus::new(config.bus.clone()));
    let pipeline = build_dispatch_pipeline(product_router(
        Arc::clone(&store),
        &config.store.collection,
    ));
    let mut dispatcher = Dispatcher::start(bus.consumer(&config.bus.address), pipeline);

    let gateway = Arc::new(ProductGateway::new(Arc::clone(&bus), config.gateway.clone()));
    let mut network = NetworkModule::new(config.network.clone(), gateway);
    let port = network.start().await?;
    info!(port, "catalog server listening");

    network
        .serve(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl-C");
            }
            info!("shutdown signal received");
        })
        .await?;

    dispatcher.stop().await;
    if let Err(e) = store.close().await {
        warn!(error = %e, "document store did not close cleanly");
    }
    info!("catalog server stopped");
    Ok(())
}
