use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tourdesk_auth::Principal;
use tourdesk_core::query::{PaginationPolicy, Predicate, Projection, QueryDescriptor};
use tourdesk_core::{AppError, Document, DocumentId, DocumentStore, QueryFeatures, RawQuery};
use tracing::{Instrument, instrument};

use super::model::{
    FORBIDDEN_UPDATE_FIELDS, JoinSpec, MutationEvent, ReferenceJoin, ResourceDescriptor,
};

pub const NOT_FOUND_MESSAGE: &str = "No document found with this id";

fn not_found() -> AppError {
    AppError::not_found(NOT_FOUND_MESSAGE)
}

/// Runs a write and its observer delivery on a task of its own. A client
/// disconnect drops the request future, not this task, so a committed write
/// always reaches its observers.
async fn run_to_completion<F, T>(work: F) -> Result<T, AppError>
where
    F: Future<Output = Result<T, AppError>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(work.in_current_span())
        .await
        .map_err(|err| AppError::internal(anyhow::Error::new(err).context("mutation task failed")))?
}

/// Fails with `ForbiddenFieldUpdate` when the payload carries a credential field.
pub fn reject_forbidden_fields(payload: &Map<String, Value>) -> Result<(), AppError> {
    if FORBIDDEN_UPDATE_FIELDS
        .iter()
        .any(|field| payload.contains_key(*field))
    {
        return Err(AppError::forbidden_field_update());
    }
    Ok(())
}

/// Fills the parent reference and the author field of a nested create when
/// the payload leaves them out.
pub fn apply_create_defaults(
    resource: &ResourceDescriptor,
    payload: &mut Map<String, Value>,
    parent_id: Option<DocumentId>,
    principal: Option<&Principal>,
) {
    let defaults = [
        resource.parent.map(|p| p.field).zip(parent_id),
        resource
            .author_field
            .zip(principal.map(|p| DocumentId::from_uuid(p.id))),
    ];

    for (field, id) in defaults.into_iter().flatten() {
        if payload.get(field).is_none_or(Value::is_null) {
            payload.insert(field.to_string(), id.to_value());
        }
    }
}

/// Resolves joins for rendered documents, caching referenced documents for
/// the lifetime of one request.
struct Joiner<'a> {
    store: &'a dyn DocumentStore,
    cache: HashMap<(&'static str, DocumentId), Option<Document>>,
}

impl<'a> Joiner<'a> {
    fn new(store: &'a dyn DocumentStore) -> Self {
        Self {
            store,
            cache: HashMap::new(),
        }
    }

    async fn lookup(
        &mut self,
        collection: &'static str,
        id: DocumentId,
    ) -> Result<Option<Document>, AppError> {
        if let Some(hit) = self.cache.get(&(collection, id)) {
            return Ok(hit.clone());
        }
        let found = self.store.find_by_id(collection, id).await?;
        self.cache.insert((collection, id), found.clone());
        Ok(found)
    }

    /// A dangling reference renders as `null`.
    async fn reference(&mut self, join: &ReferenceJoin, value: &Value) -> Result<Value, AppError> {
        let Some(id) = value
            .as_str()
            .and_then(|raw| DocumentId::parse(join.field, raw).ok())
        else {
            return Ok(value.clone());
        };

        let select = Projection::Include(join.select.iter().map(|f| f.to_string()).collect());
        Ok(self
            .lookup(join.collection, id)
            .await?
            .map(|doc| doc.project(&select))
            .unwrap_or(Value::Null))
    }

    async fn references(
        &mut self,
        fields: &mut Map<String, Value>,
        joins: &[ReferenceJoin],
    ) -> Result<(), AppError> {
        for join in joins {
            if let Some(value) = fields.get(join.field).cloned() {
                let joined = self.reference(join, &value).await?;
                fields.insert(join.field.to_string(), joined);
            }
        }
        Ok(())
    }

    async fn apply(
        &mut self,
        document: &Document,
        rendered: Value,
        joins: &[JoinSpec],
    ) -> Result<Value, AppError> {
        let mut fields = match rendered {
            Value::Object(fields) => fields,
            other => return Ok(other),
        };

        for join in joins {
            match join {
                JoinSpec::Reference(reference) => {
                    self.references(&mut fields, std::slice::from_ref(reference))
                        .await?;
                }
                JoinSpec::Virtual {
                    as_field,
                    collection,
                    foreign_field,
                    references,
                } => {
                    let query = QueryDescriptor::unbounded(vec![Predicate::eq(
                        *foreign_field,
                        document.id.to_value(),
                    )]);
                    let children = self.store.find(collection, &query).await?;

                    let mut rendered = Vec::with_capacity(children.len());
                    for child in &children {
                        let mut child_fields = match child.project(&Projection::default()) {
                            Value::Object(m) => m,
                            _ => Map::new(),
                        };
                        self.references(&mut child_fields, references).await?;
                        rendered.push(Value::Object(child_fields));
                    }
                    fields.insert(as_field.to_string(), Value::Array(rendered));
                }
            }
        }

        Ok(Value::Object(fields))
    }
}

pub struct ResourceService;

impl ResourceService {
    #[instrument(skip(store, resource, raw), fields(collection = resource.collection()))]
    pub async fn get_all(
        store: &dyn DocumentStore,
        resource: &ResourceDescriptor,
        policy: PaginationPolicy,
        scope: Vec<Predicate>,
        raw: &RawQuery,
    ) -> Result<Vec<Value>, AppError> {
        let query = QueryFeatures::new(raw, &resource.schema)
            .with_policy(policy)
            .scoped(scope)
            .filter()
            .sort()
            .limit_fields()
            .paginate()
            .build();

        let documents = store.find(resource.collection(), &query).await?;

        let mut joiner = Joiner::new(store);
        let mut rendered = Vec::with_capacity(documents.len());
        for document in &documents {
            let projected = document.project(&query.projection);
            rendered.push(
                joiner
                    .apply(document, projected, resource.list_joins)
                    .await?,
            );
        }

        Ok(rendered)
    }

    #[instrument(skip(store, resource), fields(collection = resource.collection()))]
    pub async fn get_one(
        store: &dyn DocumentStore,
        resource: &ResourceDescriptor,
        id: DocumentId,
    ) -> Result<Value, AppError> {
        let document = store
            .find_by_id(resource.collection(), id)
            .await?
            .ok_or_else(not_found)?;

        let projected = document.project(&resource.default_projection());
        Joiner::new(store)
            .apply(&document, projected, resource.detail_joins)
            .await
    }

    #[instrument(skip(store, resource, payload), fields(collection = resource.collection()))]
    pub async fn create_one(
        store: Arc<dyn DocumentStore>,
        resource: Arc<ResourceDescriptor>,
        payload: Map<String, Value>,
    ) -> Result<Value, AppError> {
        let fields = resource.schema.validate_create(&payload)?;

        run_to_completion(async move {
            let created = store.create(resource.collection(), fields).await?;
            let rendered = created.project(&resource.default_projection());

            Self::emit(&resource, MutationEvent::Created { after: created }).await?;
            Ok(rendered)
        })
        .await
    }

    #[instrument(skip(store, resource, payload), fields(collection = resource.collection()))]
    pub async fn update_one(
        store: Arc<dyn DocumentStore>,
        resource: Arc<ResourceDescriptor>,
        id: DocumentId,
        payload: Map<String, Value>,
    ) -> Result<Value, AppError> {
        reject_forbidden_fields(&payload)?;
        let patch = resource.schema.validate_patch(&payload)?;

        run_to_completion(async move {
            let before = if resource.observers.is_empty() {
                None
            } else {
                Some(
                    store
                        .find_by_id(resource.collection(), id)
                        .await?
                        .ok_or_else(not_found)?,
                )
            };

            let after = store
                .update_by_id(resource.collection(), id, patch)
                .await?
                .ok_or_else(not_found)?;
            let rendered = after.project(&resource.default_projection());

            if let Some(before) = before {
                Self::emit(&resource, MutationEvent::Updated { before, after }).await?;
            }
            Ok(rendered)
        })
        .await
    }

    #[instrument(skip(store, resource), fields(collection = resource.collection()))]
    pub async fn delete_one(
        store: Arc<dyn DocumentStore>,
        resource: Arc<ResourceDescriptor>,
        id: DocumentId,
    ) -> Result<(), AppError> {
        run_to_completion(async move {
            let before = store
                .delete_by_id(resource.collection(), id)
                .await?
                .ok_or_else(not_found)?;

            Self::emit(&resource, MutationEvent::Deleted { before }).await
        })
        .await
    }

    async fn emit(resource: &ResourceDescriptor, event: MutationEvent) -> Result<(), AppError> {
        for observer in &resource.observers {
            observer.on_mutation(&event).await?;
        }
        tracing::debug!(
            collection = resource.collection(),
            event = event.kind(),
            observers = resource.observers.len(),
            "mutation delivered"
        );
        Ok(())
    }
}
