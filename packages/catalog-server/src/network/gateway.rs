//! Request gateway: turns one HTTP request into one correlated bus exchange.
//!
//! The gateway owns the status mapping:
//!
//! | Bus result | HTTP |
//! |---|---|
//! | `Ok(value)` | 201 for create, 200 otherwise, `value` as body |
//! | `Err(message)` | 500 `{"error": message, "cause"?: detail}` |
//! | undecodable reply | 500 `{"error": ...}` |
//! | no reply (no consumer, timeout, dropped) | 401, empty body |
//! | operation switched off | 500 `{"error": "Not yet implemented"}` |
//!
//! The 401 for an unreachable backend is inherited behaviour kept for
//! existing clients; no other failure uses it.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use catalog_core::{CommandEnvelope, CommandKind, ReplyEnvelope, ReplyError, ReplyValue};
use serde_json::json;
use tracing::{debug, warn};

use crate::bus::{MessageBus, DEFAULT_ADDRESS};

pub const NOT_YET_IMPLEMENTED: &str = "Not yet implemented";

/// Where and how the gateway sends its commands.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Bus address of the product dispatcher.
    pub address: String,
    /// How long to wait for a reply before answering 401.
    pub request_timeout: Duration,
    /// Operations answered with the "not yet implemented" sentinel.
    pub unimplemented: HashSet<CommandKind>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            request_timeout: Duration::from_secs(30),
            unimplemented: HashSet::new(),
        }
    }
}

/// HTTP-facing result of one gateway call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayResponse {
    Reply { status: StatusCode, value: ReplyValue },
    /// The dispatcher answered with an error reply, or an unreadable one.
    BackendError(ReplyError),
    /// The request body could not be parsed; the bus was not contacted.
    BadRequest(String),
    /// No reply came back.
    Unreachable,
    NotImplemented,
}

impl IntoResponse for GatewayResponse {
    fn into_response(self) -> Response {
        match self {
            GatewayResponse::Reply { status, value } => (status, Json(value)).into_response(),
            GatewayResponse::BackendError(error) => {
                (StatusCode::INTERNAL_SERVER_ERROR, Json(error)).into_response()
            }
            GatewayResponse::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, message).into_response()
            }
            GatewayResponse::Unreachable => StatusCode::UNAUTHORIZED.into_response(),
            GatewayResponse::NotImplemented => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": NOT_YET_IMPLEMENTED })),
            )
                .into_response(),
        }
    }
}

/// Sends product commands over the bus on behalf of HTTP handlers.
pub struct ProductGateway {
    bus: Arc<MessageBus>,
    config: GatewayConfig,
}

impl ProductGateway {
    #[must_use]
    pub fn new(bus: Arc<MessageBus>, config: GatewayConfig) -> Self {
        Self { bus, config }
    }

    #[must_use]
    pub fn bus(&self) -> &Arc<MessageBus> {
        &self.bus
    }

    /// Whether a dispatcher is consuming from the gateway's address.
    #[must_use]
    pub fn has_dispatcher(&self) -> bool {
        self.bus.has_consumers(&self.config.address)
    }

    /// Whether `kind` is wired to the dispatcher in this deployment.
    #[must_use]
    pub fn is_connected(&self, kind: CommandKind) -> bool {
        !self.config.unimplemented.contains(&kind)
    }

    /// Sends `envelope` and maps the correlated reply.
    pub async fn send(&self, envelope: CommandEnvelope) -> GatewayResponse {
        let kind = envelope.kind;
        if !self.is_connected(kind) {
            return GatewayResponse::NotImplemented;
        }

        let raw = match self
            .bus
            .request_with_timeout(
                &self.config.address,
                envelope.encode(),
                self.config.request_timeout,
            )
            .await
        {
            Ok(raw) => raw,
            Err(err) => {
                warn!(%kind, error = %err, "no reply from product dispatcher");
                return GatewayResponse::Unreachable;
            }
        };

        match ReplyEnvelope::decode(&raw) {
            Ok(ReplyEnvelope::Ok(value)) => {
                let status = if kind == CommandKind::CreateProduct {
                    StatusCode::CREATED
                } else {
                    StatusCode::OK
                };
                GatewayResponse::Reply { status, value }
            }
            Ok(ReplyEnvelope::Err(error)) => {
                debug!(%kind, message = %error.message, "dispatcher reported an error");
                GatewayResponse::BackendError(error)
            }
            Err(err) => {
                warn!(%kind, error = %err, "undecodable reply from product dispatcher");
                GatewayResponse::BackendError(ReplyError::new(format!(
                    "Unreadable reply from backend: {err}"
                )))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
