use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
};
use serde_json::{Map, Value};
use tourdesk_core::AppError;

fn rejection_message(rejection: &JsonRejection) -> String {
    match rejection {
        JsonRejection::MissingJsonContentType(_) => {
            "Missing 'Content-Type: application/json' header".to_string()
        }
        JsonRejection::JsonSyntaxError(_) => "Malformed JSON in request body".to_string(),
        JsonRejection::JsonDataError(_) => "Invalid field type in request".to_string(),
        _ => "Invalid request body".to_string(),
    }
}

/// A request body that must be a JSON object.
///
/// Field-level validation happens later against the resource schema; this
/// extractor only guarantees the shape.
#[derive(Debug, Clone, Default)]
pub struct JsonPayload(pub Map<String, Value>);

impl<S> FromRequest<S> for JsonPayload
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<Value>::from_request(req, state)
            .await
            .map_err(|rejection| {
                tracing::debug!(error = %rejection.body_text(), "rejected request body");
                AppError::bad_request(rejection_message(&rejection))
            })?;

        match value {
            Value::Object(fields) => Ok(JsonPayload(fields)),
            _ => Err(AppError::bad_request("Request body must be a JSON object")),
        }
    }
}
