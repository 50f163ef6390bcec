//! The dispatcher: consumes product commands from the bus and replies.
//!
//! One task runs the consume loop; every delivery is handled on its own
//! task so a slow store call never holds up other requests.

use bytes::Bytes;
use catalog_core::{CommandEnvelope, DecodeError, ReplyEnvelope};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower::{Service, ServiceExt};
use tracing::{debug, error, info, warn};

use super::reply::{encode_reply, UNRECOGNIZED_COMMAND};
use super::router::{DispatchError, Outcome};
use crate::bus::{Consumer, Delivery};

/// Decodes `body`, runs it through `service` and encodes the reply.
///
/// Never fails: decode errors and unknown commands become error replies.
pub async fn dispatch<S>(service: S, body: &[u8]) -> ReplyEnvelope
where
    S: Service<CommandEnvelope, Response = Outcome, Error = DispatchError>,
{
    let envelope = match CommandEnvelope::decode(body) {
        Ok(envelope) => envelope,
        Err(DecodeError::UnknownCommand { token }) => {
            debug!(%token, "unrecognized command token");
            return ReplyEnvelope::error(UNRECOGNIZED_COMMAND);
        }
        Err(err @ DecodeError::Malformed(_)) => {
            debug!(error = %err, "rejecting malformed envelope");
            return ReplyEnvelope::error(err.to_string());
        }
    };

    let kind = envelope.kind;
    match service.oneshot(envelope).await {
        Ok(outcome) => encode_reply(kind, outcome),
        Err(DispatchError::Unrecognized { .. }) => {
            ReplyEnvelope::error(UNRECOGNIZED_COMMAND)
        }
    }
}

fn reply_bytes(reply: &ReplyEnvelope) -> Bytes {
    match reply.encode() {
        Ok(bytes) => Bytes::from(bytes),
        Err(err) => {
            error!(error = %err, "failed to encode reply");
            Bytes::from_static(br#"{"error":"Unable to encode reply"}"#)
        }
    }
}

async fn serve_delivery<S>(service: S, delivery: Delivery)
where
    S: Service<CommandEnvelope, Response = Outcome, Error = DispatchError>,
{
    let reply = dispatch(service, &delivery.body).await;
    let correlation_id = delivery.correlation_id;
    if !delivery.reply(reply_bytes(&reply)) {
        warn!(%correlation_id, "requester went away before the reply");
    }
}

/// Handle to a running consume loop.
pub struct Dispatcher {
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Dispatcher {
    /// Spawns the consume loop for `consumer`, serving each delivery with a
    /// clone of `service`.
    pub fn start<S>(mut consumer: Consumer, service: S) -> Self
    where
        S: Service<CommandEnvelope, Response = Outcome, Error = DispatchError>
            + Clone
            + Send
            + 'static,
        S::Future: Send + 'static,
    {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            info!(address = consumer.address(), "dispatcher started");
            loop {
                tokio::select! {
                    delivery = consumer.recv() => {
                        match delivery {
                            Some(delivery) => {
                                tokio::spawn(serve_delivery(service.clone(), delivery));
                            }
                            None => break,
                        }
                    }
                    _ = &mut shutdown_rx => {
                        break;
                    }
                }
            }
            info!(address = consumer.address(), "dispatcher stopped");
        });

        Self {
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    /// Stops the consume loop and waits for it to exit.
    ///
    /// Deliveries already handed to their own task still complete.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
