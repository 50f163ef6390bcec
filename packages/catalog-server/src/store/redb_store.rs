//! Embedded on-disk [`DocumentStore`] backed by `redb`.
//!
//! Each collection maps to one redb table keyed by document id, with the
//! document stored as JSON text. All redb calls run on the blocking pool.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use redb::{Database, ReadableTable, TableDefinition, TableError};
use serde_json::Value;
use uuid::Uuid;

use super::{document_id, Document, DocumentStore, Filter, StoreError, StoreResult, ID_FIELD};

fn table_def(name: &str) -> TableDefinition<'_, &'static str, &'static str> {
    TableDefinition::new(name)
}

fn decode(raw: &str) -> Result<Document, redb::Error> {
    serde_json::from_str(raw).map_err(|e| redb::Error::Corrupted(e.to_string()))
}

/// Durable document store in a single redb file.
#[derive(Clone)]
pub struct RedbDocumentStore {
    db: Arc<Database>,
}

impl RedbDocumentStore {
    /// Opens the database at `path`, creating it if absent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the file cannot be opened or created.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let db = Database::create(path.as_ref()).map_err(StoreError::backend)?;
        Ok(Self { db: Arc::new(db) })
    }

    async fn blocking<T, F>(&self, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> Result<T, redb::Error> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || f(db.as_ref()))
            .await
            .map_err(StoreError::backend)?
            .map_err(StoreError::backend)
    }
}

#[async_trait]
impl DocumentStore for RedbDocumentStore {
    async fn find_many(
        &self,
        collection: &str,
        filter: &Filter,
        limit: usize,
    ) -> StoreResult<Vec<Document>> {
        let collection = collection.to_owned();
        let filter = filter.clone();
        self.blocking(move |db| {
            let read = db.begin_read()?;
            let table = match read.open_table(table_def(&collection)) {
                Ok(table) => table,
                Err(TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
                Err(e) => return Err(e.into()),
            };
            let mut found = Vec::new();
            for entry in table.iter()? {
                if found.len() >= limit {
                    break;
                }
                let (key, value) = entry?;
                if filter.matches(key.value()) {
                    found.push(decode(value.value())?);
                }
            }
            Ok(found)
        })
        .await
    }

    async fn find_one(&self, collection: &str, filter: &Filter) -> StoreResult<Option<Document>> {
        if let Filter::Id(id) = filter {
            let collection = collection.to_owned();
            let id = id.clone();
            return self
                .blocking(move |db| {
                    let read = db.begin_read()?;
                    let table = match read.open_table(table_def(&collection)) {
                        Ok(table) => table,
                        Err(TableError::TableDoesNotExist(_)) => return Ok(None),
                        Err(e) => return Err(e.into()),
                    };
                    let raw = table.get(id.as_str())?;
                    raw.map(|guard| decode(guard.value())).transpose()
                })
                .await;
        }
        Ok(self.find_many(collection, filter, 1).await?.into_iter().next())
    }

    async fn insert(&self, collection: &str, mut document: Document) -> StoreResult<String> {
        let id = document_id(&document)
            .map_or_else(|| Uuid::new_v4().simple().to_string(), str::to_owned);
        document.insert(ID_FIELD.to_owned(), Value::String(id.clone()));
        let body = Value::Object(document).to_string();
        let collection = collection.to_owned();
        let key = id.clone();
        self.blocking(move |db| {
            let write = db.begin_write()?;
            {
                let mut table = write.open_table(table_def(&collection))?;
                table.insert(key.as_str(), body.as_str())?;
            }
            write.commit()?;
            Ok(())
        })
        .await?;
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
        document.insert(ID_FIELD.to_owned(), Value::String(id.clone()));
        let body = Value::Object(document).to_string();
        let collection = collection.to_owned();
        let id = id.clone();
        self.blocking(move |db| {
            let write = db.begin_write()?;
            let matched = {
                let mut table = write.open_table(table_def(&collection))?;
                let exists = table.get(id.as_str())?.is_some();
                if exists {
                    table.insert(id.as_str(), body.as_str())?;
                }
                u64::from(exists)
            };
            write.commit()?;
            Ok(matched)
        })
        .await
    }

    async fn delete(&self, collection: &str, filter: &Filter) -> StoreResult<u64> {
        let collection = collection.to_owned();
        let filter = filter.clone();
        self.blocking(move |db| {
            let write = db.begin_write()?;
            let removed = {
                let mut table = write.open_table(table_def(&collection))?;
                match &filter {
                    Filter::Id(id) => u64::from(table.remove(id.as_str())?.is_some()),
                    Filter::All => {
                        let keys = table
                            .iter()?
                            .map(|entry| entry.map(|(key, _)| key.value().to_owned()))
                            .collect::<Result<Vec<_>, _>>()?;
                        for key in &keys {
                            table.remove(key.as_str())?;
                        }
                        keys.len() as u64
                    }
                }
            };
            write.commit()?;
            Ok(removed)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    fn open_temp() -> (tempfile::TempDir, RedbDocumentStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = RedbDocumentStore::open(dir.path().join("catalog.redb")).unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn missing_collection_reads_as_empty() {
        let (_dir, store) = open_temp();
        assert!(store
            .find_many("products", &Filter::All, 30)
            .await
            .unwrap()
            .is_empty());
        assert!(store
            .find_one("products", &Filter::Id("x".into()))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn insert_then_find_by_id() {
        let (_dir, store) = open_temp();
        let id = store
            .insert("products", doc(json!({"number": "7", "description": "seven"})))
            .await
            .unwrap();
        let found = store
            .find_one("products", &Filter::Id(id.clone()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found, doc(json!({"_id": id, "number": "7", "description": "seven"})));
    }

    #[tokio::test]
    async fn replace_and_delete_report_counts() {
        let (_dir, store) = open_temp();
        let id = store
            .insert("products", doc(json!({"number": "1"})))
            .await
            .unwrap();

        let missing = Filter::Id("other".into());
        assert_eq!(store.replace("products", &missing, Document::new()).await.unwrap(), 0);
        let by_id = Filter::Id(id.clone());
        assert_eq!(
            store
                .replace("products", &by_id, doc(json!({"number": "2"})))
                .await
                .unwrap(),
            1
        );
        let found = store.find_one("products", &by_id).await.unwrap().unwrap();
        assert_eq!(found["number"], json!("2"));

        assert_eq!(store.delete("products", &by_id).await.unwrap(), 1);
        assert_eq!(store.delete("products", &by_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn find_many_respects_limit_and_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.redb");
        {
            let store = RedbDocumentStore::open(&path).unwrap();
            for i in 0..5 {
                store
                    .insert("products", doc(json!({"number": i.to_string()})))
                    .await
                    .unwrap();
            }
        }
        let store = RedbDocumentStore::open(&path).unwrap();
        assert_eq!(store.find_many("products", &Filter::All, 3).await.unwrap().len(), 3);
        assert_eq!(store.delete("products", &Filter::All).await.unwrap(), 5);
        assert!(store
            .find_many("products", &Filter::All, 30)
            .await
            .unwrap()
            .is_empty());
    }
}
