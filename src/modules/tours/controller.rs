use axum::{
    Extension, Json,
    extract::{Query, State},
};
use serde_json::Value;
use std::sync::Arc;
use tracing::instrument;

use tourdesk_core::{AppError, RawQuery};

use crate::middleware::auth::{AuthUser, authorize};
use crate::modules::resources::ResourceDescriptor;
use crate::modules::resources::controller::{list_documents, success_list};
use crate::modules::tours::model::TOP_FIVE_CHEAP;
use crate::state::AppState;

/// The five best-rated cheapest tours, as a prefilled list query.
#[instrument(skip(state, resource))]
pub async fn top_five_cheap(
    State(state): State<AppState>,
    Extension(resource): Extension<Arc<ResourceDescriptor>>,
    user: Option<AuthUser>,
    Query(query): Query<Vec<(String, String)>>,
) -> Result<Json<Value>, AppError> {
    authorize(resource.access.read, user.as_ref())?;

    let mut raw = RawQuery::from_pairs(query);
    for (key, value) in TOP_FIVE_CHEAP {
        raw.set_default(key, value);
    }

    let documents = list_documents(&state, &resource, &None, &raw).await?;
    Ok(success_list(documents))
}
