//! Persistence adapters for product documents.
//!
//! [`DocumentStore`] is the contract the dispatcher's handlers call: one
//! physical operation per call, returning either a result or a
//! [`StoreError`]. Two implementations ship with the server:
//!
//! - [`InMemoryDocumentStore`]: `DashMap`-backed, for tests and local runs
//! - `RedbDocumentStore` (feature `redb`): embedded on-disk store

pub mod memory;
#[cfg(feature = "redb")]
pub mod redb_store;

#[cfg(test)]
pub(crate) mod testing;

use std::fmt;

use async_trait::async_trait;
use serde_json::{Map, Value};

pub use memory::InMemoryDocumentStore;
#[cfg(feature = "redb")]
pub use redb_store::RedbDocumentStore;

/// A stored document: a JSON object keyed by [`ID_FIELD`].
pub type Document = Map<String, Value>;

/// Field holding a document's store-assigned key.
pub const ID_FIELD: &str = "_id";

pub type StoreResult<T> = Result<T, StoreError>;

/// Selects the documents an operation applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Every document in the collection.
    All,
    /// The single document with this key.
    Id(String),
}

impl Filter {
    #[must_use]
    pub fn matches(&self, id: &str) -> bool {
        match self {
            Filter::All => true,
            Filter::Id(wanted) => wanted == id,
        }
    }
}

/// A fault reported by a document store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("{0}")]
    Backend(String),
    /// The store failed without saying why.
    #[error("document store fault")]
    Unexplained,
}

impl StoreError {
    /// Wraps any displayable backend error.
    pub fn backend(err: impl fmt::Display) -> Self {
        StoreError::Backend(err.to_string())
    }

    /// The fault's message, if it carries a non-empty one.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match self {
            StoreError::Backend(message) if !message.trim().is_empty() => Some(message),
            _ => None,
        }
    }
}

/// Reads a document's key, if it has a non-empty string one.
#[must_use]
pub fn document_id(document: &Document) -> Option<&str> {
    document
        .get(ID_FIELD)
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
}

/// Physical document operations against a named collection.
///
/// Implementations must be safe to call concurrently; no ordering is
/// guaranteed between concurrent calls.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Returns up to `limit` documents matching `filter`.
    async fn find_many(
        &self,
        collection: &str,
        filter: &Filter,
        limit: usize,
    ) -> StoreResult<Vec<Document>>;

    /// Returns one document matching `filter`, if any.
    async fn find_one(&self, collection: &str, filter: &Filter) -> StoreResult<Option<Document>>;

    /// Stores a new document and returns its key.
    ///
    /// A document that already carries a non-empty `_id` keeps it.
    async fn insert(&self, collection: &str, document: Document) -> StoreResult<String>;

    /// Replaces the document matching an id filter. Returns the matched count.
    async fn replace(
        &self,
        collection: &str,
        filter: &Filter,
        document: Document,
    ) -> StoreResult<u64>;

    /// Deletes matching documents. Returns the removed count.
    async fn delete(&self, collection: &str, filter: &Filter) -> StoreResult<u64>;

    /// Releases resources. Default is a no-op.
    async fn close(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn filter_matching() {
        assert!(Filter::All.matches("anything"));
        assert!(Filter::Id("a".to_string()).matches("a"));
        assert!(!Filter::Id("a".to_string()).matches("b"));
    }

    #[test]
    fn error_message_is_none_when_blank() {
        assert_eq!(StoreError::Backend("boom".into()).message(), Some("boom"));
        assert_eq!(StoreError::Backend("  ".into()).message(), None);
        assert_eq!(StoreError::Unexplained.message(), None);
    }

    #[test]
    fn document_id_requires_non_empty_string() {
        let Value::Object(with_id) = json!({"_id": "x1"}) else { unreachable!() };
        let Value::Object(empty_id) = json!({"_id": ""}) else { unreachable!() };
        let Value::Object(numeric_id) = json!({"_id": 4}) else { unreachable!() };
        assert_eq!(document_id(&with_id), Some("x1"));
        assert_eq!(document_id(&empty_id), None);
        assert_eq!(document_id(&numeric_id), None);
    }
}
