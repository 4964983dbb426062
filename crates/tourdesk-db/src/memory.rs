//! In-process document store.
//!
//! Collections are insertion-ordered vectors behind one `RwLock`; every
//! operation takes the lock once, so each write is atomic with respect to the
//! uniqueness checks that guard it.

use anyhow::anyhow;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tourdesk_core::document::{Document, DocumentId};
use tourdesk_core::query::{Predicate, QueryDescriptor, matches_all, sort_documents};
use tourdesk_core::schema::ResourceSchema;
use tourdesk_core::store::{Aggregate, DocumentStore, StoreError, StoreResult};

#[derive(Default)]
struct Collection {
    documents: Vec<Document>,
    unique: Vec<Vec<String>>,
}

impl Collection {
    /// Finds a constraint that `fields` would violate against any document
    /// other than `exclude`. Constraints with a missing or null member are
    /// not enforced.
    fn violated(&self, fields: &Map<String, Value>, exclude: Option<DocumentId>) -> Option<&[String]> {
        self.unique
            .iter()
            .find(|constraint| {
                let Some(candidate) = constraint
                    .iter()
                    .map(|f| fields.get(f).filter(|v| !v.is_null()))
                    .collect::<Option<Vec<_>>>()
                else {
                    return false;
                };

                self.documents.iter().any(|doc| {
                    Some(doc.id) != exclude
                        && constraint
                            .iter()
                            .zip(&candidate)
                            .all(|(f, v)| doc.fields.get(f) == Some(*v))
                })
            })
            .map(Vec::as_slice)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, HashMap<String, Collection>>> {
        self.collections
            .read()
            .map_err(|_| StoreError::Backend(anyhow!("memory store lock poisoned")))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, HashMap<String, Collection>>> {
        self.collections
            .write()
            .map_err(|_| StoreError::Backend(anyhow!("memory store lock poisoned")))
    }
}

fn duplicate(constraint: &[String], fields: &Map<String, Value>) -> StoreError {
    let names: Vec<&str> = constraint.iter().map(String::as_str).collect();
    StoreError::duplicate(&names, fields)
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn register(&self, schema: &ResourceSchema) -> StoreResult<()> {
        let mut collections = self.write()?;
        let collection = collections.entry(schema.name.to_string()).or_default();
        collection.unique = schema
            .unique_constraints()
            .into_iter()
            .map(|c| c.into_iter().map(str::to_string).collect())
            .collect();
        Ok(())
    }

    async fn create(&self, collection: &str, fields: Map<String, Value>) -> StoreResult<Document> {
        let mut collections = self.write()?;
        let collection = collections.entry(collection.to_string()).or_default();

        if let Some(constraint) = collection.violated(&fields, None) {
            return Err(duplicate(constraint, &fields));
        }

        let document = Document::new(fields);
        collection.documents.push(document.clone());
        Ok(document)
    }

    async fn find(&self, collection: &str, query: &QueryDescriptor) -> StoreResult<Vec<Document>> {
        let collections = self.read()?;
        let Some(collection) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut matched: Vec<Document> = collection
            .documents
            .iter()
            .filter(|doc| matches_all(doc, &query.filter))
            .cloned()
            .collect();
        sort_documents(&mut matched, &query.sort);

        let skip = usize::try_from(query.skip).unwrap_or(usize::MAX);
        let limit = query
            .limit
            .map(|l| usize::try_from(l).unwrap_or(usize::MAX))
            .unwrap_or(usize::MAX);

        Ok(matched.into_iter().skip(skip).take(limit).collect())
    }

    async fn find_by_id(&self, collection: &str, id: DocumentId) -> StoreResult<Option<Document>> {
        let collections = self.read()?;
        Ok(collections
            .get(collection)
            .and_then(|c| c.documents.iter().find(|d| d.id == id))
            .cloned())
    }

    async fn update_by_id(
        &self,
        collection: &str,
        id: DocumentId,
        patch: Map<String, Value>,
    ) -> StoreResult<Option<Document>> {
        let mut collections = self.write()?;
        let Some(collection) = collections.get_mut(collection) else {
            return Ok(None);
        };
        let Some(index) = collection.documents.iter().position(|d| d.id == id) else {
            return Ok(None);
        };

        let mut merged = collection.documents[index].fields.clone();
        for (key, value) in patch {
            merged.insert(key, value);
        }
        if let Some(constraint) = collection.violated(&merged, Some(id)) {
            return Err(duplicate(constraint, &merged));
        }

        let document = &mut collection.documents[index];
        document.fields = merged;
        document.version += 1;
        Ok(Some(document.clone()))
    }

    async fn delete_by_id(&self, collection: &str, id: DocumentId) -> StoreResult<Option<Document>> {
        let mut collections = self.write()?;
        let Some(collection) = collections.get_mut(collection) else {
            return Ok(None);
        };
        Ok(collection
            .documents
            .iter()
            .position(|d| d.id == id)
            .map(|index| collection.documents.remove(index)))
    }

    async fn delete_all(&self, collection: &str) -> StoreResult<u64> {
        let mut collections = self.write()?;
        Ok(collections
            .get_mut(collection)
            .map(|c| std::mem::take(&mut c.documents).len() as u64)
            .unwrap_or(0))
    }

    async fn aggregate(
        &self,
        collection: &str,
        filter: &[Predicate],
        field: &str,
    ) -> StoreResult<Aggregate> {
        let collections = self.read()?;
        let Some(collection) = collections.get(collection) else {
            return Ok(Aggregate::default());
        };

        let mut count = 0u64;
        let (mut sum, mut numeric) = (0.0f64, 0u64);
        for doc in collection.documents.iter().filter(|d| matches_all(d, filter)) {
            count += 1;
            if let Some(n) = doc.fields.get(field).and_then(Value::as_f64) {
                sum += n;
                numeric += 1;
            }
        }

        Ok(Aggregate {
            count,
            mean: (numeric > 0).then(|| sum / numeric as f64),
        })
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sizes: HashMap<String, usize> = self
            .collections
            .read()
            .map(|c| c.iter().map(|(k, v)| (k.clone(), v.documents.len())).collect())
            .unwrap_or_default();
        f.debug_struct("MemoryStore")
            .field("collections", &sizes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tourdesk_core::query::{FilterOp, SortKey};
    use tourdesk_core::schema::{FieldSpec, FieldType};

    fn fields(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn review_schema() -> ResourceSchema {
        ResourceSchema::new("reviews")
            .field(FieldSpec::new("rating", FieldType::Integer))
            .field(FieldSpec::new("tour", FieldType::Reference("tours")))
            .field(FieldSpec::new("user", FieldType::Reference("users")))
            .unique_together(&["tour", "user"])
    }

    #[tokio::test]
    async fn test_create_and_find_by_id() {
        let store = MemoryStore::new();
        let created = store
            .create("tours", fields(json!({ "name": "The Sea Explorer" })))
            .await
            .unwrap();
        assert_eq!(created.version, 0);

        let found = store.find_by_id("tours", created.id).await.unwrap().unwrap();
        assert_eq!(found, created);
        assert!(store.find_by_id("tours", DocumentId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_compound_uniqueness() {
        let store = MemoryStore::new();
        store.register(&review_schema()).await.unwrap();

        let review = json!({ "rating": 5, "tour": "t1", "user": "u1" });
        store.create("reviews", fields(review.clone())).await.unwrap();

        let err = store.create("reviews", fields(review)).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { ref fields, .. } if fields == &["tour", "user"]));

        store
            .create("reviews", fields(json!({ "rating": 4, "tour": "t1", "user": "u2" })))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_update_merges_and_bumps_version() {
        let store = MemoryStore::new();
        store.register(&review_schema()).await.unwrap();
        let a = store
            .create("reviews", fields(json!({ "rating": 5, "tour": "t1", "user": "u1" })))
            .await
            .unwrap();
        store
            .create("reviews", fields(json!({ "rating": 2, "tour": "t1", "user": "u2" })))
            .await
            .unwrap();

        let updated = store
            .update_by_id("reviews", a.id, fields(json!({ "rating": 3 })))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.fields["rating"], json!(3));
        assert_eq!(updated.fields["user"], json!("u1"));
        assert_eq!(updated.version, 1);

        let clash = store
            .update_by_id("reviews", a.id, fields(json!({ "user": "u2" })))
            .await
            .unwrap_err();
        assert!(matches!(clash, StoreError::Duplicate { .. }));

        let missing = store
            .update_by_id("reviews", DocumentId::new(), Map::new())
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_find_filters_sorts_and_pages() {
        let store = MemoryStore::new();
        for (name, price) in [("a", 300), ("b", 100), ("c", 200), ("d", 100)] {
            store
                .create("tours", fields(json!({ "name": name, "price": price })))
                .await
                .unwrap();
        }

        let query = QueryDescriptor {
            filter: vec![Predicate::new("price", FilterOp::Lte, json!(200))],
            sort: vec![SortKey::asc("price")],
            skip: 1,
            limit: Some(2),
            ..QueryDescriptor::unbounded(Vec::new())
        };
        let names: Vec<Value> = store
            .find("tours", &query)
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.fields["name"].clone())
            .collect();
        assert_eq!(names, vec![json!("d"), json!("c")]);
    }

    #[tokio::test]
    async fn test_delete_returns_pre_image_once() {
        let store = MemoryStore::new();
        let doc = store.create("tours", fields(json!({ "name": "x" }))).await.unwrap();

        let removed = store.delete_by_id("tours", doc.id).await.unwrap();
        assert_eq!(removed.map(|d| d.id), Some(doc.id));
        assert!(store.delete_by_id("tours", doc.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_aggregate_count_and_mean() {
        let store = MemoryStore::new();
        for (rating, tour) in [(5, "t1"), (3, "t1"), (1, "t2")] {
            store
                .create("reviews", fields(json!({ "rating": rating, "tour": tour })))
                .await
                .unwrap();
        }

        let t1 = store
            .aggregate("reviews", &[Predicate::eq("tour", json!("t1"))], "rating")
            .await
            .unwrap();
        assert_eq!(t1, Aggregate { count: 2, mean: Some(4.0) });

        let none = store
            .aggregate("reviews", &[Predicate::eq("tour", json!("t9"))], "rating")
            .await
            .unwrap();
        assert_eq!(none, Aggregate { count: 0, mean: None });
    }

    #[tokio::test]
    async fn test_delete_all() {
        let store = MemoryStore::new();
        store.create("tours", fields(json!({ "name": "x" }))).await.unwrap();
        store.create("tours", fields(json!({ "name": "y" }))).await.unwrap();
        assert_eq!(store.delete_all("tours").await.unwrap(), 2);
        assert_eq!(store.delete_all("tours").await.unwrap(), 0);
    }
}
