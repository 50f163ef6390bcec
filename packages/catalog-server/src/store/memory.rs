//! In-memory [`DocumentStore`] backed by [`DashMap`].
//!
//! Each collection is its own `DashMap`, so reads and writes on different
//! documents proceed without external locking. Contents are lost on exit.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use uuid::Uuid;

use super::{document_id, Document, DocumentStore, Filter, StoreError, StoreResult, ID_FIELD};

type Collection = DashMap<String, Document>;

/// Process-local document store. Iteration order is unspecified.
#[derive(Default)]
pub struct InMemoryDocumentStore {
    collections: DashMap<String, Arc<Collection>>,
}

impl InMemoryDocumentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the named collection, creating it on first use.
    fn collection(&self, name: &str) -> Arc<Collection> {
        if let Some(existing) = self.collections.get(name) {
            return Arc::clone(existing.value());
        }
        Arc::clone(self.collections.entry(name.to_owned()).or_default().value())
    }

    /// Number of documents in a collection.
    #[must_use]
    pub fn len(&self, collection: &str) -> usize {
        self.collections.get(collection).map_or(0, |c| c.len())
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn find_many(
        &self,
        collection: &str,
        filter: &Filter,
        limit: usize,
    ) -> StoreResult<Vec<Document>> {
        let docs = self.collection(collection);
        Ok(docs
            .iter()
            .filter(|entry| filter.matches(entry.key()))
            .take(limit)
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn find_one(&self, collection: &str, filter: &Filter) -> StoreResult<Option<Document>> {
        let docs = self.collection(collection);
        let found = match filter {
            Filter::Id(id) => docs.get(id).map(|entry| entry.value().clone()),
            Filter::All => docs.iter().next().map(|entry| entry.value().clone()),
        };
        Ok(found)
    }

    async fn insert(&self, collection: &str, mut document: Document) -> StoreResult<String> {
        let id = document_id(&document)
            .map_or_else(|| Uuid::new_v4().simple().to_string(), str::to_owned);
        document.insert(ID_FIELD.to_owned(), Value::String(id.clone()));
        self.collection(collection).insert(id.clone(), document);
        Ok(id)
    }

    async fn replace(
        &self,
        collection: &str,
        filter: &Filter,
        mut document: Document,
    ) -> StoreResult<u64> {
        let Filter::Id(id) = filter else {
            return Err(StoreError::Backend(
                "replace requires an id filter".to_owned(),
            ));
        };
        let docs = self.collection(collection);
        let Some(mut existing) = docs.get_mut(id) else {
            return Ok(0);
        };
        document.insert(ID_FIELD.to_owned(), Value::String(id.clone()));
        *existing = document;
        Ok(1)
    }

    async fn delete(&self, collection: &str, filter: &Filter) -> StoreResult<u64> {
        let docs = self.collection(collection);
        match filter {
            Filter::Id(id) => Ok(u64::from(docs.remove(id).is_some())),
            Filter::All => {
                let removed = docs.len() as u64;
                docs.clear();
                Ok(removed)
            }
        }
    }
}
