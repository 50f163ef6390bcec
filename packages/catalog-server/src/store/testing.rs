//! Scripted [`DocumentStore`] fake that records every call.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{Document, DocumentStore, Filter, StoreError, StoreResult};

/// A call observed by [`RecordingStore`].
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum StoreCall {
    FindMany { filter: Filter, limit: usize },
    FindOne { filter: Filter },
    Insert { document: Document },
    Replace { filter: Filter, document: Document },
    Delete { filter: Filter },
}

/// Returns queued results in order; unscripted calls fail with
/// [`StoreError::Unexplained`].
#[derive(Default)]
pub(crate) struct RecordingStore {
    calls: Mutex<Vec<StoreCall>>,
    many: Mutex<VecDeque<StoreResult<Vec<Document>>>>,
    one: Mutex<VecDeque<StoreResult<Option<Document>>>>,
    inserted: Mutex<VecDeque<StoreResult<String>>>,
    counts: Mutex<VecDeque<StoreResult<u64>>>,
}

impl RecordingStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_many(self, result: StoreResult<Vec<Document>>) -> Self {
        self.many.lock().push_back(result);
        self
    }

    pub(crate) fn with_one(self, result: StoreResult<Option<Document>>) -> Self {
        self.one.lock().push_back(result);
        self
    }

    pub(crate) fn with_insert(self, result: StoreResult<String>) -> Self {
        self.inserted.lock().push_back(result);
        self
    }

    /// Queues a result for the next `replace` or `delete`.
    pub(crate) fn with_count(self, result: StoreResult<u64>) -> Self {
        self.counts.lock().push_back(result);
        self
    }

    pub(crate) fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().clone()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    fn record(&self, call: StoreCall) {
        self.calls.lock().push(call);
    }
}

fn next<T>(queue: &Mutex<VecDeque<StoreResult<T>>>) -> StoreResult<T> {
    queue.lock().pop_front().unwrap_or(Err(StoreError::Unexplained))
}

#[async_trait]
impl DocumentStore for RecordingStore {
    async fn find_many(
        &self,
        _collection: &str,
        filter: &Filter,
        limit: usize,
    ) -> StoreResult<Vec<Document>> {
        self.record(StoreCall::FindMany {
            filter: filter.clone(),
            limit,
        });
        next(&self.many)
    }

    async fn find_one(&self, _collection: &str, filter: &Filter) -> StoreResult<Option<Document>> {
        self.record(StoreCall::FindOne {
            filter: filter.clone(),
        });
        next(&self.one)
    }

    async fn insert(&self, _collection: &str, document: Document) -> StoreResult<String> {
        self.record(StoreCall::Insert { document });
        next(&self.inserted)
    }

    async fn replace(
        &self,
        _collection: &str,
        filter: &Filter,
        document: Document,
    ) -> StoreResult<u64> {
        self.record(StoreCall::Replace {
            filter: filter.clone(),
            document,
        });
        next(&self.counts)
    }

    async fn delete(&self, _collection: &str, filter: &Filter) -> StoreResult<u64> {
        self.record(StoreCall::Delete {
            filter: filter.clone(),
        });
        next(&self.counts)
    }
}
