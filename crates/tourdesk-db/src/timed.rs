//! Timeout decorator for any [`DocumentStore`].

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tourdesk_core::document::{Document, DocumentId};
use tourdesk_core::query::{Predicate, QueryDescriptor};
use tourdesk_core::schema::ResourceSchema;
use tourdesk_core::store::{Aggregate, DocumentStore, StoreError, StoreResult};
use tracing::warn;

/// Bounds every storage call by a fixed timeout. Expired calls fail with
/// [`StoreError::Timeout`] and are never retried.
pub struct TimedStore {
    inner: Arc<dyn DocumentStore>,
    timeout: Duration,
}

impl TimedStore {
    pub fn new(inner: Arc<dyn DocumentStore>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = StoreResult<T>> + Send,
    ) -> StoreResult<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(operation, timeout_ms = self.timeout.as_millis() as u64, "storage call timed out");
                Err(StoreError::Timeout(self.timeout))
            }
        }
    }
}

#[async_trait]
impl DocumentStore for TimedStore {
    async fn register(&self, schema: &ResourceSchema) -> StoreResult<()> {
        self.bounded("register", self.inner.register(schema)).await
    }

    async fn create(&self, collection: &str, fields: Map<String, Value>) -> StoreResult<Document> {
        self.bounded("create", self.inner.create(collection, fields)).await
    }

    async fn find(&self, collection: &str, query: &QueryDescriptor) -> StoreResult<Vec<Document>> {
        self.bounded("find", self.inner.find(collection, query)).await
    }

    async fn find_by_id(&self, collection: &str, id: DocumentId) -> StoreResult<Option<Document>> {
        self.bounded("find_by_id", self.inner.find_by_id(collection, id)).await
    }

    async fn update_by_id(
        &self,
        collection: &str,
        id: DocumentId,
        patch: Map<String, Value>,
    ) -> StoreResult<Option<Document>> {
        self.bounded("update_by_id", self.inner.update_by_id(collection, id, patch))
            .await
    }

    async fn delete_by_id(&self, collection: &str, id: DocumentId) -> StoreResult<Option<Document>> {
        self.bounded("delete_by_id", self.inner.delete_by_id(collection, id))
            .await
    }

    async fn delete_all(&self, collection: &str) -> StoreResult<u64> {
        self.bounded("delete_all", self.inner.delete_all(collection)).await
    }

    async fn aggregate(
        &self,
        collection: &str,
        filter: &[Predicate],
        field: &str,
    ) -> StoreResult<Aggregate> {
        self.bounded("aggregate", self.inner.aggregate(collection, filter, field))
            .await
    }
}
