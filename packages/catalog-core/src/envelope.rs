//! Command envelope: the request half of a bus exchange.
//!
//! Wire form is a flat JSON object:
//!
//! ```json
//! {"cmd": "update_product", "id": "42", "value": {"number": "7"}}
//! ```
//!
//! `id` and `value` are omitted when absent.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::command::CommandKind;
use crate::product::ProductDraft;

/// Errors from decoding a command envelope.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed command envelope: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unknown command: {token}")]
    UnknownCommand { token: String },
}

/// A decoded command: what to do, on which product, with which fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandEnvelope {
    pub kind: CommandKind,
    pub id: Option<String>,
    pub payload: Option<Map<String, Value>>,
}

/// Raw wire shape; `cmd` stays a string so unknown tokens get their own error.
#[derive(Deserialize)]
struct WireEnvelope {
    cmd: String,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    value: Option<Map<String, Value>>,
}

impl CommandEnvelope {
    #[must_use]
    pub fn new(kind: CommandKind) -> Self {
        Self {
            kind,
            id: None,
            payload: None,
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_payload(mut self, payload: Map<String, Value>) -> Self {
        self.payload = Some(payload);
        self
    }

    #[must_use]
    pub fn get_all_products() -> Self {
        Self::new(CommandKind::GetAllProducts)
    }

    #[must_use]
    pub fn get_product(id: impl Into<String>) -> Self {
        Self::new(CommandKind::GetProduct).with_id(id)
    }

    #[must_use]
    pub fn create_product(draft: &ProductDraft) -> Self {
        Self::new(CommandKind::CreateProduct).with_payload(draft.to_payload())
    }

    #[must_use]
    pub fn update_product(id: impl Into<String>, draft: &ProductDraft) -> Self {
        Self::new(CommandKind::UpdateProduct)
            .with_id(id)
            .with_payload(draft.to_payload())
    }

    #[must_use]
    pub fn delete_product(id: impl Into<String>) -> Self {
        Self::new(CommandKind::DeleteProduct).with_id(id)
    }

    /// Encodes the envelope into its wire bytes.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut wire = Map::new();
        wire.insert("cmd".to_owned(), Value::String(self.kind.as_str().to_owned()));
        if let Some(id) = &self.id {
            wire.insert("id".to_owned(), Value::String(id.clone()));
        }
        if let Some(payload) = &self.payload {
            wire.insert("value".to_owned(), Value::Object(payload.clone()));
        }
        Value::Object(wire).to_string().into_bytes()
    }

    /// Decodes wire bytes into an envelope.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Malformed`] if the bytes are not a JSON object of
    /// the expected shape, and [`DecodeError::UnknownCommand`] if `cmd` names
    /// no known command.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let wire: WireEnvelope = serde_json::from_slice(bytes)?;
        let kind = wire
            .cmd
            .parse::<CommandKind>()
            .map_err(|err| DecodeError::UnknownCommand { token: err.0 })?;
        Ok(Self {
            kind,
            id: wire.id,
            payload: wire.value,
        })
    }
}
