//! Product command handlers.
//!
//! Each handler makes at most one [`DocumentStore`] call and maps its raw
//! result into an [`Outcome`]. Input problems (missing id, missing or
//! malformed payload) fail before the store is touched.

use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;

use catalog_core::{
    CommandEnvelope, CommandKind, DeletionAck, Product, ProductDraft, ProductList, ReplyValue,
    MAX_PRODUCTS_PER_PAGE,
};
use serde_json::{Map, Value};
use tracing::debug;

use super::reply::{
    CREATE_FAILED, DELETE_MISSING, DELETE_MISSING_DETAIL, MISSING_ID, MISSING_PAYLOAD,
    NO_RESULTS_FOUND, UPDATE_MISSING, UPDATE_MISSING_DETAIL,
};
use super::router::{CommandRouter, Outcome};
use crate::store::{document_id, Document, DocumentStore, Filter};

/// The product handlers bound to one store collection.
#[derive(Clone)]
pub struct ProductHandlers {
    store: Arc<dyn DocumentStore>,
    collection: Arc<str>,
}

impl ProductHandlers {
    pub fn new(store: Arc<dyn DocumentStore>, collection: impl Into<Arc<str>>) -> Self {
        Self {
            store,
            collection: collection.into(),
        }
    }

    pub async fn get_all(self, _envelope: CommandEnvelope) -> Outcome {
        match self
            .store
            .find_many(&self.collection, &Filter::All, MAX_PRODUCTS_PER_PAGE)
            .await
        {
            Ok(documents) => {
                let products = documents.iter().filter_map(product_from_document).collect();
                Outcome::Success(ReplyValue::Products(ProductList::new(products)))
            }
            Err(err) => Outcome::fault(&err),
        }
    }

    pub async fn get_one(self, envelope: CommandEnvelope) -> Outcome {
        let Some(id) = required_id(&envelope) else {
            return Outcome::failure(MISSING_ID);
        };
        match self.store.find_one(&self.collection, &Filter::Id(id)).await {
            Ok(found) => found
                .as_ref()
                .and_then(product_from_document)
                .map_or_else(
                    || Outcome::failure(NO_RESULTS_FOUND),
                    |product| Outcome::Success(ReplyValue::Product(product)),
                ),
            Err(err) => Outcome::fault(&err),
        }
    }

    pub async fn create(self, envelope: CommandEnvelope) -> Outcome {
        let draft = match required_draft(envelope.payload) {
            Ok(draft) => draft,
            Err(outcome) => return outcome,
        };
        match self.store.insert(&self.collection, draft.to_payload()).await {
            Ok(id) if id.is_empty() => Outcome::failure(CREATE_FAILED),
            Ok(id) => {
                debug!(%id, "product created");
                Outcome::Success(ReplyValue::Product(Product::from_draft(id, draft)))
            }
            Err(err) => Outcome::fault(&err),
        }
    }

    pub async fn update(self, envelope: CommandEnvelope) -> Outcome {
        let Some(id) = required_id(&envelope) else {
            return Outcome::failure(MISSING_ID);
        };
        let draft = match required_draft(envelope.payload) {
            Ok(draft) => draft,
            Err(outcome) => return outcome,
        };
        let filter = Filter::Id(id.clone());
        match self
            .store
            .replace(&self.collection, &filter, draft.to_payload())
            .await
        {
            Ok(0) => Outcome::Missing {
                error: UPDATE_MISSING,
                detail: UPDATE_MISSING_DETAIL,
            },
            Ok(_) => Outcome::Success(ReplyValue::Product(Product::from_draft(id, draft))),
            Err(err) => Outcome::fault(&err),
        }
    }

    pub async fn delete(self, envelope: CommandEnvelope) -> Outcome {
        let Some(id) = required_id(&envelope) else {
            return Outcome::failure(MISSING_ID);
        };
        let filter = Filter::Id(id.clone());
        match self.store.delete(&self.collection, &filter).await {
            Ok(0) => Outcome::Missing {
                error: DELETE_MISSING,
                detail: DELETE_MISSING_DETAIL,
            },
            Ok(_) => Outcome::Success(ReplyValue::Removed(DeletionAck::removed(id))),
            Err(err) => Outcome::fault(&err),
        }
    }
}

fn required_id(envelope: &CommandEnvelope) -> Option<String> {
    envelope.id.clone().filter(|id| !id.is_empty())
}

fn required_draft(payload: Option<Map<String, Value>>) -> Result<ProductDraft, Outcome> {
    let payload = payload.ok_or_else(|| Outcome::failure(MISSING_PAYLOAD))?;
    ProductDraft::from_payload(payload).map_err(|err| Outcome::failure(err.to_string()))
}

/// Converts a stored document into a product; documents without a key are skipped.
fn product_from_document(document: &Document) -> Option<Product> {
    let id = document_id(document)?;
    let field = |name: &str| {
        document
            .get(name)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned()
    };
    Some(Product {
        id: id.to_owned(),
        number: field("number"),
        description: field("description"),
    })
}

/// Registers one handler method under `kind`.
fn bind<F, Fut>(router: &mut CommandRouter, kind: CommandKind, handlers: &ProductHandlers, method: F)
where
    F: Fn(ProductHandlers, CommandEnvelope) -> Fut + Clone + Send + 'static,
    Fut: Future<Output = Outcome> + Send + 'static,
{
    let handlers = handlers.clone();
    let service = tower::service_fn(move |envelope: CommandEnvelope| {
        let outcome = method(handlers.clone(), envelope);
        async move { Ok::<_, Infallible>(outcome.await) }
    });
    router.register(kind, service);
}

/// Builds a router with all five product commands bound to `store`.
pub fn product_router(store: Arc<dyn DocumentStore>, collection: &str) -> CommandRouter {
    let handlers = ProductHandlers::new(store, collection);
    let mut router = CommandRouter::new();
    bind(&mut router, CommandKind::GetAllProducts, &handlers, ProductHandlers::get_all);
    bind(&mut router, CommandKind::GetProduct, &handlers, ProductHandlers::get_one);
    bind(&mut router, CommandKind::CreateProduct, &handlers, ProductHandlers::create);
    bind(&mut router, CommandKind::UpdateProduct, &handlers, ProductHandlers::update);
    bind(&mut router, CommandKind::DeleteProduct, &handlers, ProductHandlers::delete);
    router
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::json;
    use tower::ServiceExt;

    use super::*;
    use crate::dispatch::router::DispatchError;
    use crate::store::testing::{RecordingStore, StoreCall};
    use crate::store::{InMemoryDocumentStore, StoreError};

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    fn stored(id: &str, number: &str) -> Document {
        doc(json!({"_id": id, "number": number, "description": format!("item {number}")}))
    }

    async fn run(store: Arc<RecordingStore>, envelope: CommandEnvelope) -> Outcome {
        product_router(store, "products")
            .oneshot(envelope)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn create_returns_product_with_store_id() {
        let store = Arc::new(RecordingStore::new().with_insert(Ok("1".to_string())));
        let draft = ProductDraft::new("123", "Some description");

        let outcome = run(store.clone(), CommandEnvelope::create_product(&draft)).await;

        assert_eq!(
            outcome,
            Outcome::Success(ReplyValue::Product(Product {
                id: "1".to_string(),
                number: "123".to_string(),
                description: "Some description".to_string(),
            }))
        );
        assert_eq!(
            store.calls(),
            vec![StoreCall::Insert {
                document: draft.to_payload()
            }]
        );
    }

    #[tokio::test]
    async fn create_with_empty_id_is_a_failure() {
        let store = Arc::new(RecordingStore::new().with_insert(Ok(String::new())));
        let outcome = run(store, CommandEnvelope::create_product(&ProductDraft::default())).await;
        assert_eq!(outcome, Outcome::failure(CREATE_FAILED));
    }

    #[tokio::test]
    async fn malformed_create_payload_never_reaches_the_store() {
        let store = Arc::new(RecordingStore::new());
        let envelope = CommandEnvelope::new(CommandKind::CreateProduct)
            .with_payload(doc(json!({"number": 123})));

        let outcome = run(store.clone(), envelope).await;

        let Outcome::Failure(Some(cause)) = outcome else {
            panic!("expected a failure with a cause, got {outcome:?}");
        };
        assert!(cause.contains("invalid type"), "{cause}");
        assert_eq!(store.call_count(), 0);
    }

    #[tokio::test]
    async fn missing_payload_or_id_never_reaches_the_store() {
        let store = Arc::new(RecordingStore::new());
        for envelope in [
            CommandEnvelope::new(CommandKind::CreateProduct),
            CommandEnvelope::new(CommandKind::UpdateProduct).with_id("1"),
            CommandEnvelope::new(CommandKind::UpdateProduct).with_payload(Map::new()),
            CommandEnvelope::new(CommandKind::GetProduct),
            CommandEnvelope::new(CommandKind::DeleteProduct).with_id(""),
        ] {
            let outcome = run(store.clone(), envelope).await;
            assert!(matches!(outcome, Outcome::Failure(Some(_))), "{outcome:?}");
        }
        assert_eq!(store.call_count(), 0);
    }

    #[tokio::test]
    async fn get_one_missing_is_no_results_found() {
        let store = Arc::new(RecordingStore::new().with_one(Ok(None)));
        let outcome = run(store.clone(), CommandEnvelope::get_product("99")).await;
        assert_eq!(outcome, Outcome::failure(NO_RESULTS_FOUND));
        assert_eq!(
            store.calls(),
            vec![StoreCall::FindOne {
                filter: Filter::Id("99".to_string())
            }]
        );
    }

    #[tokio::test]
    async fn get_one_found_maps_document_fields() {
        let store = Arc::new(RecordingStore::new().with_one(Ok(Some(stored("7", "0007")))));
        let outcome = run(store, CommandEnvelope::get_product("7")).await;
        assert_eq!(
            outcome,
            Outcome::Success(ReplyValue::Product(Product {
                id: "7".to_string(),
                number: "0007".to_string(),
                description: "item 0007".to_string(),
            }))
        );
    }

    #[tokio::test]
    async fn get_all_asks_for_one_page() {
        let store = Arc::new(RecordingStore::new().with_many(Ok(Vec::new())));
        let outcome = run(store.clone(), CommandEnvelope::get_all_products()).await;
        assert_eq!(
            outcome,
            Outcome::Success(ReplyValue::Products(ProductList::new(Vec::new())))
        );
        assert_eq!(
            store.calls(),
            vec![StoreCall::FindMany {
                filter: Filter::All,
                limit: MAX_PRODUCTS_PER_PAGE
            }]
        );
    }

    #[tokio::test]
    async fn update_and_delete_of_missing_records_fail() {
        let store = Arc::new(RecordingStore::new().with_count(Ok(0)).with_count(Ok(0)));
        let draft = ProductDraft::new("1", "one");

        let updated = run(store.clone(), CommandEnvelope::update_product("5", &draft)).await;
        let deleted = run(store.clone(), CommandEnvelope::delete_product("5")).await;

        assert_eq!(
            updated,
            Outcome::Missing {
                error: UPDATE_MISSING,
                detail: UPDATE_MISSING_DETAIL
            }
        );
        assert_eq!(
            deleted,
            Outcome::Missing {
                error: DELETE_MISSING,
                detail: DELETE_MISSING_DETAIL
            }
        );
        assert_eq!(store.call_count(), 2);
    }

    #[tokio::test]
    async fn update_returns_merged_product_and_delete_acks() {
        let store = Arc::new(RecordingStore::new().with_count(Ok(1)).with_count(Ok(1)));
        let draft = ProductDraft::new("2", "two");

        let updated = run(store.clone(), CommandEnvelope::update_product("5", &draft)).await;
        let deleted = run(store.clone(), CommandEnvelope::delete_product("5")).await;

        assert_eq!(
            updated,
            Outcome::Success(ReplyValue::Product(Product::from_draft("5", draft.clone())))
        );
        assert_eq!(
            deleted,
            Outcome::Success(ReplyValue::Removed(DeletionAck::removed("5")))
        );
        assert_eq!(
            store.calls()[0],
            StoreCall::Replace {
                filter: Filter::Id("5".to_string()),
                document: draft.to_payload()
            }
        );
    }

    #[tokio::test]
    async fn store_faults_are_reported_once() {
        let store = Arc::new(
            RecordingStore::new()
                .with_many(Err(StoreError::Backend("connection reset".into())))
                .with_one(Err(StoreError::Unexplained)),
        );

        let listed = run(store.clone(), CommandEnvelope::get_all_products()).await;
        let fetched = run(store.clone(), CommandEnvelope::get_product("1")).await;

        assert_eq!(listed, Outcome::failure("connection reset"));
        assert_eq!(fetched, Outcome::Failure(None));
        assert_eq!(store.call_count(), 2);
    }

    #[tokio::test]
    async fn full_lifecycle_against_memory_store() {
        let store: Arc<dyn DocumentStore> = Arc::new(InMemoryDocumentStore::new());
        let router = product_router(store, "products");

        let created = router
            .clone()
            .oneshot(CommandEnvelope::create_product(&ProductDraft::new("1", "a")))
            .await
            .unwrap();
        let Outcome::Success(ReplyValue::Product(product)) = created else {
            panic!("create failed: {created:?}");
        };
        assert!(!product.id.is_empty());

        let fetched = router
            .clone()
            .oneshot(CommandEnvelope::get_product(product.id.clone()))
            .await
            .unwrap();
        assert_eq!(fetched, Outcome::Success(ReplyValue::Product(product.clone())));

        let deleted = router
            .clone()
            .oneshot(CommandEnvelope::delete_product(product.id.clone()))
            .await
            .unwrap();
        assert!(deleted.is_success());

        let gone = router
            .oneshot(CommandEnvelope::get_product(product.id))
            .await
            .unwrap();
        assert_eq!(gone, Outcome::failure(NO_RESULTS_FOUND));
    }

    #[tokio::test]
    async fn router_without_handler_reports_unrecognized() {
        let err = CommandRouter::new()
            .oneshot(CommandEnvelope::get_all_products())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            DispatchError::Unrecognized {
                kind: CommandKind::GetAllProducts
            }
        );
    }

    proptest! {
        #[test]
        fn get_all_never_exceeds_one_page(count in 0usize..120) {
            let documents: Vec<Document> = (0..count)
                .map(|i| stored(&i.to_string(), &i.to_string()))
                .collect();
            let store = Arc::new(RecordingStore::new().with_many(Ok(documents)));
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();

            let outcome = runtime.block_on(run(store, CommandEnvelope::get_all_products()));

            let Outcome::Success(ReplyValue::Products(list)) = outcome else {
                panic!("expected a product list");
            };
            prop_assert_eq!(list.products().len(), count.min(MAX_PRODUCTS_PER_PAGE));
            prop_assert!(list.products().iter().all(|p| !p.id.is_empty()));
        }
    }
}
