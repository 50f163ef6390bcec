//! Command-line and environment configuration.
//!
//! [`Cli`] is the `clap` surface; every flag also reads a `CATALOG_*`
//! environment variable. [`Cli::into_config`] splits it into the per-module
//! configs the binary wires together.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use catalog_core::CommandKind;
use clap::{Parser, ValueEnum};

use crate::bus::{BusConfig, DEFAULT_ADDRESS};
use crate::network::{GatewayConfig, NetworkConfig};
use crate::store::{DocumentStore, InMemoryDocumentStore};
use crate::telemetry::{LogFormat, TelemetryConfig};

/// How much longer an HTTP request may run than the bus wait it contains,
/// so a missing reply is reported by the gateway rather than the HTTP timeout.
pub const REPLY_HEADROOM: Duration = Duration::from_secs(5);

/// Which [`DocumentStore`] backs the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreKind {
    /// Process-local, lost on exit.
    Memory,
    /// Embedded redb file at `--store-path`.
    Redb,
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub kind: StoreKind,
    pub path: PathBuf,
    /// Collection holding product documents.
    pub collection: String,
}

impl StoreConfig {
    /// Opens the configured store.
    ///
    /// # Errors
    ///
    /// Fails if the redb file cannot be opened, or if `redb` was requested
    /// from a build without the `redb` feature.
    pub fn open(&self) -> anyhow::Result<Arc<dyn DocumentStore>> {
        match self.kind {
            StoreKind::Memory => Ok(Arc::new(InMemoryDocumentStore::new())),
            #[cfg(feature = "redb")]
            StoreKind::Redb => Ok(Arc::new(crate::store::RedbDocumentStore::open(&self.path)?)),
            #[cfg(not(feature = "redb"))]
            StoreKind::Redb => anyhow::bail!("this build does not include the redb store"),
        }
    }
}

/// Everything the server needs, grouped by module.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub network: NetworkConfig,
    pub bus: BusConfig,
    pub store: StoreConfig,
    pub gateway: GatewayConfig,
    pub telemetry: TelemetryConfig,
}

/// Product catalog server: HTTP routes backed by a bus-attached dispatcher.
#[derive(Debug, Parser)]
#[command(name = "catalog-server", version)]
pub struct Cli {
    /// Address to bind the HTTP listener to.
    #[arg(long, env = "CATALOG_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// HTTP port; 0 picks a free one.
    #[arg(long, env = "CATALOG_HTTP_PORT", default_value_t = 8080)]
    pub http_port: u16,

    /// Required `AuthToken` header value for `/api` routes.
    #[arg(long, env = "CATALOG_PASSPHRASE")]
    pub passphrase: Option<String>,

    /// Allowed CORS origins, comma separated. `*` allows any.
    #[arg(long, env = "CATALOG_CORS_ORIGINS", value_delimiter = ',', default_value = "*")]
    pub cors_origins: Vec<String>,

    /// Per-request HTTP timeout. Raised to the bus timeout plus
    /// [`REPLY_HEADROOM`] when set lower.
    #[arg(long, env = "CATALOG_REQUEST_TIMEOUT_MS", default_value_t = 35_000)]
    pub request_timeout_ms: u64,

    /// Bus address shared by the gateway and the dispatcher.
    #[arg(long, env = "CATALOG_BUS_ADDRESS", default_value = DEFAULT_ADDRESS)]
    pub bus_address: String,

    /// How long the gateway waits for a dispatcher reply.
    #[arg(long, env = "CATALOG_BUS_TIMEOUT_MS", default_value_t = 30_000)]
    pub bus_timeout_ms: u64,

    #[arg(long, env = "CATALOG_STORE", value_enum, default_value_t = StoreKind::Memory)]
    pub store: StoreKind,

    #[arg(long, env = "CATALOG_STORE_PATH", default_value = "catalog.redb")]
    pub store_path: PathBuf,

    #[arg(long, env = "CATALOG_COLLECTION", default_value = "products")]
    pub collection: String,

    /// Commands answered "Not yet implemented", e.g. `create_product,delete_product`.
    #[arg(long, env = "CATALOG_UNIMPLEMENTED", value_delimiter = ',')]
    pub unimplemented: Vec<CommandKind>,

    #[arg(long, env = "CATALOG_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Serve Prometheus metrics on this address.
    #[arg(long, env = "CATALOG_METRICS_ADDR")]
    pub metrics_addr: Option<SocketAddr>,
}

impl Cli {
    #[must_use]
    pub fn into_config(self) -> ServerConfig {
        let bus_timeout = Duration::from_millis(self.bus_timeout_ms);
        let request_timeout = Duration::from_millis(self.request_timeout_ms)
            .max(bus_timeout.saturating_add(REPLY_HEADROOM));
        ServerConfig {
            network: NetworkConfig {
                host: self.host,
                port: self.http_port,
                cors_origins: self.cors_origins,
                request_timeout,
                passphrase: self.passphrase.filter(|p| !p.is_empty()),
            },
            bus: BusConfig {
                address: self.bus_address.clone(),
                request_timeout: bus_timeout,
                ..BusConfig::default()
            },
            store: StoreConfig {
                kind: self.store,
                path: self.store_path,
                collection: self.collection,
            },
            gateway: GatewayConfig {
                address: self.bus_address,
                request_timeout: bus_timeout,
                unimplemented: self.unimplemented.into_iter().collect::<HashSet<_>>(),
            },
            telemetry: TelemetryConfig {
                log_format: self.log_format,
                metrics_addr: self.metrics_addr,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> ServerConfig {
        let mut argv = vec!["catalog-server"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap().into_config()
    }

    #[test]
    fn defaults() {
        let config = parse(&[]);
        assert_eq!(config.network.port, 8080);
        assert_eq!(config.network.cors_origins, vec!["*"]);
        assert!(config.network.passphrase.is_none());
        assert_eq!(config.bus.address, DEFAULT_ADDRESS);
        assert_eq!(config.gateway.address, DEFAULT_ADDRESS);
        assert_eq!(config.gateway.request_timeout, Duration::from_secs(30));
        assert_eq!(config.network.request_timeout, Duration::from_secs(35));
        assert_eq!(config.store.kind, StoreKind::Memory);
        assert_eq!(config.store.collection, "products");
        assert!(config.gateway.unimplemented.is_empty());
        assert_eq!(config.telemetry.log_format, LogFormat::Pretty);
    }

    #[test]
    fn unimplemented_list_parses_wire_tokens() {
        let config = parse(&["--unimplemented", "create_product,delete_product"]);
        let expected: HashSet<_> = [CommandKind::CreateProduct, CommandKind::DeleteProduct]
            .into_iter()
            .collect();
        assert_eq!(config.gateway.unimplemented, expected);
    }

    #[test]
    fn unknown_command_token_is_rejected() {
        let result = Cli::try_parse_from(["catalog-server", "--unimplemented", "drop_tables"]);
        assert!(result.is_err());
    }

    #[test]
    fn bus_settings_reach_gateway_and_bus() {
        let config = parse(&["--bus-address", "mongo.service", "--bus-timeout-ms", "250"]);
        assert_eq!(config.bus.address, "mongo.service");
        assert_eq!(config.gateway.address, "mongo.service");
        assert_eq!(config.bus.request_timeout, Duration::from_millis(250));
        assert_eq!(config.gateway.request_timeout, Duration::from_millis(250));
    }

    #[test]
    fn http_timeout_always_outlasts_the_bus_wait() {
        let equal = parse(&["--request-timeout-ms", "10000", "--bus-timeout-ms", "10000"]);
        assert_eq!(equal.network.request_timeout, Duration::from_secs(15));

        let shorter = parse(&["--request-timeout-ms", "1000", "--bus-timeout-ms", "20000"]);
        assert_eq!(shorter.network.request_timeout, Duration::from_secs(25));
        assert_eq!(shorter.gateway.request_timeout, Duration::from_secs(20));

        let longer = parse(&["--request-timeout-ms", "60000", "--bus-timeout-ms", "2000"]);
        assert_eq!(longer.network.request_timeout, Duration::from_secs(60));
    }

    #[test]
    fn empty_passphrase_disables_the_check() {
        assert!(parse(&["--passphrase", ""]).network.passphrase.is_none());
        assert_eq!(
            parse(&["--passphrase", "s3cret"]).network.passphrase.as_deref(),
            Some("s3cret")
        );
    }

    #[test]
    fn memory_store_opens() {
        let config = parse(&["--store", "memory"]);
        assert!(config.store.open().is_ok());
    }

    #[cfg(feature = "redb")]
    #[test]
    fn redb_store_opens_at_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.redb");
        let config = parse(&["--store", "redb", "--store-path", path.to_str().unwrap()]);
        assert!(config.store.open().is_ok());
        assert!(path.exists());
    }
}
