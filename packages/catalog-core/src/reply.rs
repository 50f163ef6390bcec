//! Reply envelope: the response half of a bus exchange.
//!
//! Wire form is `{"ok": <value>}` or `{"error": "<message>", "cause"?: "<detail>"}`,
//! never both.

use serde::{Deserialize, Serialize};

use crate::product::{Product, MAX_PRODUCTS_PER_PAGE};

/// Outcome of one command as seen by the requester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireReply", into = "WireReply")]
pub enum ReplyEnvelope {
    Ok(ReplyValue),
    Err(ReplyError),
}

/// Error half of a reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyError {
    /// Human-readable cause; never empty when produced by the dispatcher.
    #[serde(rename = "error")]
    pub message: String,
    /// Extra detail about the failure, when there is any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl ReplyError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cause: None,
        }
    }

    #[must_use]
    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }
}

#[derive(Serialize, Deserialize)]
struct WireReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ok: Option<ReplyValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cause: Option<String>,
}

impl TryFrom<WireReply> for ReplyEnvelope {
    type Error = String;

    fn try_from(wire: WireReply) -> Result<Self, Self::Error> {
        match (wire.ok, wire.error, wire.cause) {
            (Some(value), None, None) => Ok(ReplyEnvelope::Ok(value)),
            (None, Some(message), cause) => Ok(ReplyEnvelope::Err(ReplyError { message, cause })),
            (Some(_), _, _) => Err("reply carries both `ok` and `error` fields".to_string()),
            (None, None, _) => Err("reply carries neither `ok` nor `error`".to_string()),
        }
    }
}

impl From<ReplyEnvelope> for WireReply {
    fn from(reply: ReplyEnvelope) -> Self {
        match reply {
            ReplyEnvelope::Ok(value) => WireReply {
                ok: Some(value),
                error: None,
                cause: None,
            },
            ReplyEnvelope::Err(ReplyError { message, cause }) => WireReply {
                ok: None,
                error: Some(message),
                cause,
            },
        }
    }
}

impl ReplyEnvelope {
    /// An error reply without extra detail.
    pub fn error(message: impl Into<String>) -> Self {
        ReplyEnvelope::Err(ReplyError::new(message))
    }

    /// Encodes the reply into its wire bytes.
    ///
    /// # Errors
    ///
    /// Propagates `serde_json` serialization errors.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Decodes wire bytes into a reply.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if the bytes are not a reply envelope.
    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// Payload of a successful reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReplyValue {
    Products(ProductList),
    Removed(DeletionAck),
    Product(Product),
}

/// A page of products, capped at [`MAX_PRODUCTS_PER_PAGE`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "UncheckedProductList")]
pub struct ProductList {
    products: Vec<Product>,
}

#[derive(Deserialize)]
struct UncheckedProductList {
    products: Vec<Product>,
}

impl From<UncheckedProductList> for ProductList {
    fn from(list: UncheckedProductList) -> Self {
        Self::new(list.products)
    }
}

impl ProductList {
    /// Builds a page, dropping anything past the page limit.
    #[must_use]
    pub fn new(mut products: Vec<Product>) -> Self {
        products.truncate(MAX_PRODUCTS_PER_PAGE);
        Self { products }
    }

    #[must_use]
    pub fn products(&self) -> &[Product] {
        &self.products
    }
}

/// Acknowledgement that a product was deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionAck {
    pub status: DeletionStatus,
    pub id: String,
}

impl DeletionAck {
    #[must_use]
    pub fn removed(id: impl Into<String>) -> Self {
        Self {
            status: DeletionStatus::Removed,
            id: id.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeletionStatus {
    Removed,
}
