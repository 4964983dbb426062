use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;

use tourdesk_core::query::Predicate;
use tourdesk_core::{AppError, DocumentId, RawQuery};

use crate::middleware::auth::{AuthUser, authorize};
use crate::modules::resources::model::ResourceDescriptor;
use crate::modules::resources::service::{
    ResourceService, apply_create_defaults, reject_forbidden_fields,
};
use crate::payload::JsonPayload;
use crate::state::AppState;

pub type PathParams = Option<Path<HashMap<String, String>>>;

/// `{status: "success", data: {data}}`
pub fn success(data: Value) -> Json<Value> {
    Json(json!({ "status": "success", "data": { "data": data } }))
}

pub fn success_list(documents: Vec<Value>) -> Json<Value> {
    let total = documents.len();
    Json(json!({
        "status": "success",
        "data": { "data": documents, "total": total },
    }))
}

/// Parent id from the path of a nested route, if this resource is nested
/// and the route carries one.
fn parent_id(
    resource: &ResourceDescriptor,
    params: &PathParams,
) -> Result<Option<DocumentId>, AppError> {
    let (Some(scope), Some(Path(params))) = (resource.parent, params) else {
        return Ok(None);
    };

    params
        .get(scope.param)
        .map(|raw| DocumentId::parse(scope.field, raw))
        .transpose()
        .map_err(AppError::from)
}

pub async fn list_documents(
    state: &AppState,
    resource: &ResourceDescriptor,
    params: &PathParams,
    raw: &RawQuery,
) -> Result<Vec<Value>, AppError> {
    let scope = match (resource.parent, parent_id(resource, params)?) {
        (Some(parent), Some(id)) => vec![Predicate::eq(parent.field, id.to_value())],
        _ => Vec::new(),
    };

    ResourceService::get_all(
        state.store.as_ref(),
        resource,
        state.pagination_policy(),
        scope,
        raw,
    )
    .await
}

#[instrument(skip(state, resource), fields(collection = resource.collection()))]
pub async fn get_all(
    State(state): State<AppState>,
    Extension(resource): Extension<Arc<ResourceDescriptor>>,
    user: Option<AuthUser>,
    params: PathParams,
    Query(query): Query<Vec<(String, String)>>,
) -> Result<Json<Value>, AppError> {
    authorize(resource.access.read, user.as_ref())?;

    let raw = RawQuery::from_pairs(query);
    let documents = list_documents(&state, &resource, &params, &raw).await?;

    Ok(success_list(documents))
}

#[instrument(skip(state, resource), fields(collection = resource.collection()))]
pub async fn get_one(
    State(state): State<AppState>,
    Extension(resource): Extension<Arc<ResourceDescriptor>>,
    user: Option<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    authorize(resource.access.read, user.as_ref())?;

    let id = DocumentId::parse("id", &id)?;
    let document = ResourceService::get_one(state.store.as_ref(), &resource, id).await?;

    Ok(success(document))
}

#[instrument(skip(state, resource, payload), fields(collection = resource.collection()))]
pub async fn create_one(
    State(state): State<AppState>,
    Extension(resource): Extension<Arc<ResourceDescriptor>>,
    user: Option<AuthUser>,
    params: PathParams,
    JsonPayload(mut payload): JsonPayload,
) -> Result<(StatusCode, Json<Value>), AppError> {
    authorize(resource.access.create, user.as_ref())?;

    let parent = parent_id(&resource, &params)?;
    apply_create_defaults(&resource, &mut payload, parent, user.as_ref().map(|u| &u.0));

    let document = ResourceService::create_one(state.store.clone(), resource, payload).await?;

    Ok((StatusCode::CREATED, success(document)))
}

#[instrument(skip(state, resource, payload), fields(collection = resource.collection()))]
pub async fn update_one(
    State(state): State<AppState>,
    Extension(resource): Extension<Arc<ResourceDescriptor>>,
    user: Option<AuthUser>,
    Path(id): Path<String>,
    JsonPayload(payload): JsonPayload,
) -> Result<Json<Value>, AppError> {
    authorize(resource.access.update, user.as_ref())?;
    reject_forbidden_fields(&payload)?;

    let id = DocumentId::parse("id", &id)?;
    let document = ResourceService::update_one(state.store.clone(), resource, id, payload).await?;

    Ok(success(document))
}

#[instrument(skip(state, resource), fields(collection = resource.collection()))]
pub async fn delete_one(
    State(state): State<AppState>,
    Extension(resource): Extension<Arc<ResourceDescriptor>>,
    user: Option<AuthUser>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    authorize(resource.access.delete, user.as_ref())?;

    let id = DocumentId::parse("id", &id)?;
    ResourceService::delete_one(state.store.clone(), resource, id).await?;

    Ok(StatusCode::NO_CONTENT)
}
