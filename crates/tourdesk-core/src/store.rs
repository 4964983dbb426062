//! Storage collaborator interface.
//!
//! Every resource lives in a named collection of [`Document`]s. Stores enforce
//! single-field and compound uniqueness declared by the registered
//! [`ResourceSchema`], execute [`QueryDescriptor`]s and compute simple
//! aggregates. Implementations live in `tourdesk-db`.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;

use crate::document::{Document, DocumentId};
use crate::query::{Predicate, QueryDescriptor};
use crate::schema::ResourceSchema;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Duplicate field value: {} ({value}). Please use another value", .fields.join(", "))]
    Duplicate { fields: Vec<String>, value: String },

    #[error("storage operation timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl StoreError {
    /// Builds a uniqueness violation naming the offending fields and the
    /// conflicting value(s) of `fields` in `document`.
    pub fn duplicate(fields: &[&str], document: &Map<String, Value>) -> Self {
        let value = fields
            .iter()
            .map(|f| match document.get(*f) {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => "null".to_string(),
            })
            .collect::<Vec<_>>()
            .join(", ");

        StoreError::Duplicate {
            fields: fields.iter().map(|f| f.to_string()).collect(),
            value,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Count and arithmetic mean of a numeric field over a filtered set.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Aggregate {
    pub count: u64,
    /// `None` when no matching document carries a numeric value.
    pub mean: Option<f64>,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Declares a collection and its uniqueness constraints. Idempotent.
    async fn register(&self, schema: &ResourceSchema) -> StoreResult<()>;

    /// Persists a new document with a fresh id and `__v = 0`.
    async fn create(&self, collection: &str, fields: Map<String, Value>) -> StoreResult<Document>;

    /// Applies filter, sort (insertion order otherwise) and skip/limit.
    async fn find(&self, collection: &str, query: &QueryDescriptor) -> StoreResult<Vec<Document>>;

    async fn find_by_id(&self, collection: &str, id: DocumentId)
    -> StoreResult<Option<Document>>;

    /// Merges `patch` into the stored fields and bumps the version marker.
    /// Returns the post-update document, or `None` when absent.
    async fn update_by_id(
        &self,
        collection: &str,
        id: DocumentId,
        patch: Map<String, Value>,
    ) -> StoreResult<Option<Document>>;

    /// Removes a document and returns its pre-image, or `None` when absent.
    async fn delete_by_id(&self, collection: &str, id: DocumentId)
    -> StoreResult<Option<Document>>;

    /// Removes every document of a collection, returning how many were removed.
    async fn delete_all(&self, collection: &str) -> StoreResult<u64>;

    async fn aggregate(
        &self,
        collection: &str,
        filter: &[Predicate],
        field: &str,
    ) -> StoreResult<Aggregate>;
}
