//! In-process request/reply message bus.
//!
//! Consumers register under a string address. A request is delivered to
//! exactly one consumer of its address (round-robin when there are several)
//! and the requester awaits a single correlated reply. Every outstanding
//! request owns a slot in the pending-reply table keyed by [`CorrelationId`];
//! the slot is removed when the reply arrives, the timeout fires, the
//! delivery is dropped unanswered, or the requesting future is cancelled.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// Default address of the product store consumer.
pub const DEFAULT_ADDRESS: &str = "catalog.product-store";

/// Identifies one outstanding request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CorrelationId(pub u64);

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tunables for [`MessageBus`].
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Address the product store dispatcher consumes from.
    pub address: String,
    /// How long a requester waits for its reply.
    pub request_timeout: Duration,
    /// Per-consumer delivery queue depth.
    pub consumer_capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            request_timeout: Duration::from_secs(30),
            consumer_capacity: 1024,
        }
    }
}

/// Transport-level failure of a bus request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BusError {
    #[error("no handlers registered for address {address}")]
    NoHandlers { address: String },
    #[error("timed out after {timeout_ms} ms waiting for a reply")]
    Timeout { timeout_ms: u64 },
    #[error("consumer dropped the request without replying")]
    ReplyDropped,
}

type PendingReplies = DashMap<CorrelationId, oneshot::Sender<Bytes>>;

/// A request handed to a consumer.
///
/// Answer it with [`Delivery::reply`]. Dropping it unanswered fails the
/// requester with [`BusError::ReplyDropped`].
#[derive(Debug)]
pub struct Delivery {
    pub correlation_id: CorrelationId,
    pub body: Bytes,
    pending: Arc<PendingReplies>,
}

impl Delivery {
    /// Completes the requester waiting on this delivery's correlation id.
    ///
    /// Returns `false` if that requester has already given up.
    pub fn reply(self, body: impl Into<Bytes>) -> bool {
        match self.pending.remove(&self.correlation_id) {
            Some((_, tx)) => tx.send(body.into()).is_ok(),
            None => {
                debug!(correlation_id = %self.correlation_id, "reply to a discarded request ignored");
                false
            }
        }
    }
}

impl Drop for Delivery {
    fn drop(&mut self) {
        self.pending.remove(&self.correlation_id);
    }
}

/// Receiving end of one registration on an address.
///
/// Dropping it unregisters the consumer.
#[derive(Debug)]
pub struct Consumer {
    address: String,
    rx: mpsc::Receiver<Delivery>,
}

impl Consumer {
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Waits for the next delivery. Returns `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<Delivery> {
        self.rx.recv().await
    }
}

#[derive(Default)]
struct Endpoint {
    consumers: Vec<mpsc::Sender<Delivery>>,
    cursor: usize,
}

/// Removes a pending slot when the requesting future finishes or is dropped.
struct PendingGuard<'a> {
    pending: &'a PendingReplies,
    id: CorrelationId,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.remove(&self.id);
    }
}

/// Address-based request/reply bus.
pub struct MessageBus {
    endpoints: DashMap<String, Endpoint>,
    pending: Arc<PendingReplies>,
    next_id: AtomicU64,
    config: BusConfig,
}

impl MessageBus {
    #[must_use]
    pub fn new(config: BusConfig) -> Self {
        Self {
            endpoints: DashMap::new(),
            pending: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(1),
            config,
        }
    }

    /// Registers a new consumer on `address`.
    pub fn consumer(&self, address: &str) -> Consumer {
        let (tx, rx) = mpsc::channel(self.config.consumer_capacity.max(1));
        self.endpoints
            .entry(address.to_string())
            .or_default()
            .consumers
            .push(tx);
        Consumer {
            address: address.to_string(),
            rx,
        }
    }

    /// Whether at least one live consumer is registered on `address`.
    #[must_use]
    pub fn has_consumers(&self, address: &str) -> bool {
        self.endpoints
            .get(address)
            .is_some_and(|ep| ep.consumers.iter().any(|tx| !tx.is_closed()))
    }

    /// Number of requests still awaiting a reply.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Sends `body` to one consumer of `address` and waits for its reply,
    /// using the configured request timeout.
    ///
    /// # Errors
    ///
    /// See [`MessageBus::request_with_timeout`].
    pub async fn request(&self, address: &str, body: impl Into<Bytes>) -> Result<Bytes, BusError> {
        self.request_with_timeout(address, body, self.config.request_timeout)
            .await
    }

    /// Sends `body` to one consumer of `address` and waits up to `timeout`
    /// for the correlated reply.
    ///
    /// # Errors
    ///
    /// - [`BusError::NoHandlers`] if no live consumer is registered
    /// - [`BusError::Timeout`] if no reply arrives in time
    /// - [`BusError::ReplyDropped`] if the consumer dropped the delivery
    pub async fn request_with_timeout(
        &self,
        address: &str,
        body: impl Into<Bytes>,
        timeout: Duration,
    ) -> Result<Bytes, BusError> {
        let no_handlers = || BusError::NoHandlers {
            address: address.to_string(),
        };
        let target = self.pick(address).ok_or_else(no_handlers)?;

        let id = CorrelationId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, tx);
        let _guard = PendingGuard {
            pending: &self.pending,
            id,
        };

        let delivery = Delivery {
            correlation_id: id,
            body: body.into(),
            pending: Arc::clone(&self.pending),
        };

        let exchange = async {
            target.send(delivery).await.map_err(|_| no_handlers())?;
            rx.await.map_err(|_| BusError::ReplyDropped)
        };

        match tokio::time::timeout(timeout, exchange).await {
            Ok(result) => result,
            Err(_) => {
                debug!(correlation_id = %id, address, "request timed out");
                Err(BusError::Timeout {
                    timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                })
            }
        }
    }

    /// Picks the next live consumer of `address`, pruning closed ones.
    ///
    /// An address left with no consumers is dropped from the endpoint map.
    fn pick(&self, address: &str) -> Option<mpsc::Sender<Delivery>> {
        {
            let mut endpoint = self.endpoints.get_mut(address)?;
            endpoint.consumers.retain(|tx| !tx.is_closed());
            if !endpoint.consumers.is_empty() {
                let index = endpoint.cursor % endpoint.consumers.len();
                endpoint.cursor = endpoint.cursor.wrapping_add(1);
                return Some(endpoint.consumers[index].clone());
            }
        }
        // A consumer may have registered since the guard was released.
        self.endpoints.remove_if(address, |_, endpoint| {
            endpoint.consumers.iter().all(mpsc::Sender::is_closed)
        });
        None
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new(BusConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
