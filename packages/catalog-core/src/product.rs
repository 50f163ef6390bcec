//! Product model shared by the gateway and the dispatcher.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Upper bound on the number of products a single listing may carry.
pub const MAX_PRODUCTS_PER_PAGE: usize = 30;

/// A catalog product as it leaves the dispatcher.
///
/// `id` is assigned by the document store when the product is created and is
/// never empty in a reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub number: String,
    pub description: String,
}

impl Product {
    /// Builds a product from a stored id and the client-supplied fields.
    ///
    /// Absent draft fields become empty strings.
    #[must_use]
    pub fn from_draft(id: impl Into<String>, draft: ProductDraft) -> Self {
        Self {
            id: id.into(),
            number: draft.number.unwrap_or_default(),
            description: draft.description.unwrap_or_default(),
        }
    }
}

/// Partial product accepted by create and update requests.
///
/// Unknown fields (including a client-supplied `id`) are ignored. A field of
/// the wrong JSON type fails deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProductDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ProductDraft {
    #[must_use]
    pub fn new(number: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            number: Some(number.into()),
            description: Some(description.into()),
        }
    }

    /// Renders the present fields as a JSON object for a command payload.
    #[must_use]
    pub fn to_payload(&self) -> Map<String, Value> {
        let mut payload = Map::new();
        if let Some(number) = &self.number {
            payload.insert("number".to_owned(), Value::String(number.clone()));
        }
        if let Some(description) = &self.description {
            payload.insert("description".to_owned(), Value::String(description.clone()));
        }
        payload
    }

    /// Parses a command payload back into a draft.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error when a field has the wrong type.
    pub fn from_payload(payload: Map<String, Value>) -> Result<Self, serde_json::Error> {
        serde_json::from_value(Value::Object(payload))
    }
}
