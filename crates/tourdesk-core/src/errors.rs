//! Application errors and their wire representation.
//!
//! Any failure that reaches a handler boundary is an [`AppError`]. Handlers
//! use `?` on storage, validation and identifier errors; the blanket
//! [`From`] impl runs them through [`classify`], which maps the known leaf
//! errors onto client-facing kinds and everything else onto an internal,
//! non-operational error.
//!
//! Responses are rendered in [`DisclosureMode::Restricted`] by default. The
//! rendered response carries an [`ErrorReport`] extension so that a
//! middleware can re-render the body in [`DisclosureMode::Diagnostic`].

use anyhow::Error;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use std::sync::Arc;
use validator::ValidationErrors;

use crate::document::InvalidIdentifier;
use crate::store::StoreError;

pub const GENERIC_MESSAGE: &str = "Something went wrong";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidIdentifier,
    DuplicateField,
    ValidationFailed,
    ForbiddenFieldUpdate,
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidIdentifier => "InvalidIdentifier",
            ErrorKind::DuplicateField => "DuplicateField",
            ErrorKind::ValidationFailed => "ValidationFailed",
            ErrorKind::ForbiddenFieldUpdate => "ForbiddenFieldUpdate",
            ErrorKind::BadRequest => "BadRequest",
            ErrorKind::Unauthorized => "Unauthorized",
            ErrorKind::Forbidden => "Forbidden",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::Internal => "InternalError",
        }
    }
}

/// How much of an error the response body may reveal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisclosureMode {
    Diagnostic,
    #[default]
    Restricted,
}

#[derive(Debug)]
pub struct AppError {
    pub kind: ErrorKind,
    pub status: StatusCode,
    pub message: String,
    /// Operational errors are expected failures whose message is safe to show.
    pub operational: bool,
    pub source: Option<Error>,
}

impl AppError {
    pub fn new(kind: ErrorKind, status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            kind,
            status,
            message: message.into(),
            operational: true,
            source: None,
        }
    }

    pub fn with_source<E>(mut self, err: E) -> Self
    where
        E: Into<Error>,
    {
        self.source = Some(err.into());
        self
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, StatusCode::FORBIDDEN, message)
    }

    pub fn forbidden_field_update() -> Self {
        Self::new(
            ErrorKind::ForbiddenFieldUpdate,
            StatusCode::BAD_REQUEST,
            "This route is not for password update. Please use the update-password route",
        )
    }

    /// Unexpected failure; its detail never reaches clients in restricted mode.
    pub fn internal<E>(err: E) -> Self
    where
        E: Into<Error>,
    {
        let err = err.into();
        Self {
            kind: ErrorKind::Internal,
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
            operational: false,
            source: Some(err),
        }
    }

    /// An internal error whose message is deliberate and safe to show.
    pub fn internal_operational(message: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::Internal,
            StatusCode::INTERNAL_SERVER_ERROR,
            message,
        )
    }

    /// `"fail"` for client errors, `"error"` otherwise.
    pub fn status_label(&self) -> &'static str {
        if self.status.is_client_error() {
            "fail"
        } else {
            "error"
        }
    }

    pub fn to_body(&self, mode: DisclosureMode) -> (StatusCode, Value) {
        match mode {
            DisclosureMode::Restricted if !self.operational => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "status": "error", "message": GENERIC_MESSAGE }),
            ),
            DisclosureMode::Restricted => (
                self.status,
                json!({ "status": self.status_label(), "message": self.message }),
            ),
            DisclosureMode::Diagnostic => {
                let chain: Vec<String> = self
                    .source
                    .as_ref()
                    .map(|e| e.chain().map(|c| c.to_string()).collect())
                    .unwrap_or_default();
                let stack = self
                    .source
                    .as_ref()
                    .map(|e| format!("{e:?}"))
                    .unwrap_or_else(|| format!("{}: {}", self.kind.as_str(), self.message));

                (
                    self.status,
                    json!({
                        "status": self.status_label(),
                        "message": self.message,
                        "error": {
                            "kind": self.kind.as_str(),
                            "statusCode": self.status.as_u16(),
                            "isOperational": self.operational,
                            "chain": chain,
                        },
                        "stack": stack,
                    }),
                )
            }
        }
    }
}

/// Shared handle to the error behind a rendered response.
#[derive(Debug, Clone)]
pub struct ErrorReport(pub Arc<AppError>);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if !self.operational {
            tracing::error!(
                kind = self.kind.as_str(),
                error = ?self.source,
                "unhandled error: {}",
                self.message
            );
        }

        let (status, body) = self.to_body(DisclosureMode::Restricted);
        let mut response = (status, Json(body)).into_response();
        response.extensions_mut().insert(ErrorReport(Arc::new(self)));
        response
    }
}

impl<E> From<E> for AppError
where
    E: Into<Error>,
{
    fn from(err: E) -> Self {
        classify(err.into())
    }
}

/// Maps a failure onto the client-facing taxonomy.
///
/// Priority: malformed identifier, uniqueness violation, schema validation,
/// then internal. Operational [`AppError`]s never pass through here; they
/// travel unchanged.
pub fn classify(err: Error) -> AppError {
    let err = match err.downcast::<InvalidIdentifier>() {
        Ok(e) => {
            return AppError::new(
                ErrorKind::InvalidIdentifier,
                StatusCode::BAD_REQUEST,
                e.to_string(),
            );
        }
        Err(err) => err,
    };

    if let Some(duplicate) = err
        .downcast_ref::<StoreError>()
        .filter(|e| matches!(e, StoreError::Duplicate { .. }))
    {
        return AppError::new(
            ErrorKind::DuplicateField,
            StatusCode::BAD_REQUEST,
            duplicate.to_string(),
        );
    }

    if let Some(errors) = err.downcast_ref::<ValidationErrors>() {
        return AppError::new(
            ErrorKind::ValidationFailed,
            StatusCode::BAD_REQUEST,
            validation_message(errors),
        );
    }

    AppError::internal(err)
}

/// `"Invalid input data: "` followed by every violation, ordered by field.
pub fn validation_message(errors: &ValidationErrors) -> String {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));

    let messages: Vec<String> = fields
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter()
                .map(|e| match &e.message {
                    Some(message) => message.to_string(),
                    None => format!("{field} is invalid"),
                })
                .collect::<Vec<_>>()
        })
        .collect();

    format!("Invalid input data: {}", messages.join(". "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentId;
    use serde_json::Map;
    use std::borrow::Cow;
    use std::time::Duration;
    use validator::ValidationError;

    fn lookup(raw: &str) -> Result<DocumentId, AppError> {
        Ok(DocumentId::parse("id", raw)?)
    }

    #[test]
    fn test_invalid_identifier_classification() {
        let err = lookup("abc").unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidIdentifier);
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Invalid id: abc.");
        assert!(err.operational);
    }

    #[test]
    fn test_duplicate_classification() {
        let mut doc = Map::new();
        doc.insert("email".into(), json!("a@b.io"));
        let err: AppError = StoreError::duplicate(&["email"], &doc).into();
        assert_eq!(err.kind, ErrorKind::DuplicateField);
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.message.contains("email"));
        assert!(err.message.contains("a@b.io"));
    }

    #[test]
    fn test_validation_classification_joins_every_violation() {
        let mut errors = ValidationErrors::new();
        errors.add(
            "rating",
            ValidationError::new("range").with_message(Cow::from("rating must be between 1 and 5")),
        );
        errors.add(
            "review",
            ValidationError::new("required").with_message(Cow::from("Review cannot be empty")),
        );

        let err: AppError = errors.into();
        assert_eq!(err.kind, ErrorKind::ValidationFailed);
        assert_eq!(
            err.message,
            "Invalid input data: rating must be between 1 and 5. Review cannot be empty"
        );
    }

    #[test]
    fn test_unknown_errors_are_internal() {
        let err: AppError = anyhow::anyhow!("connection reset").into();
        assert_eq!(err.kind, ErrorKind::Internal);
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.operational);

        let timeout: AppError = StoreError::Timeout(Duration::from_millis(5)).into();
        assert_eq!(timeout.kind, ErrorKind::Internal);
    }

    #[test]
    fn test_status_label() {
        assert_eq!(AppError::not_found("x").status_label(), "fail");
        assert_eq!(AppError::internal_operational("x").status_label(), "error");
    }

    #[test]
    fn test_restricted_body_hides_internal_detail() {
        let err = AppError::internal(anyhow::anyhow!("secret db password in here"));
        let (status, body) = err.to_body(DisclosureMode::Restricted);
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "status": "error", "message": GENERIC_MESSAGE }));
    }

    #[test]
    fn test_restricted_body_keeps_operational_message() {
        let err = AppError::not_found("No document found with this id");
        let (status, body) = err.to_body(DisclosureMode::Restricted);
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], "fail");
        assert_eq!(body["message"], "No document found with this id");
        assert!(body.get("stack").is_none());
    }

    #[test]
    fn test_diagnostic_body_exposes_chain() {
        let inner = anyhow::anyhow!("root cause").context("while loading tour");
        let err = AppError::internal(inner);
        let (status, body) = err.to_body(DisclosureMode::Diagnostic);
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "while loading tour");
        assert_eq!(body["error"]["kind"], "InternalError");
        assert_eq!(body["error"]["chain"], json!(["while loading tour", "root cause"]));
        assert!(body["stack"].is_string());
    }

    #[test]
    fn test_into_response_attaches_report() {
        let response = AppError::forbidden("nope").into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let report = response.extensions().get::<ErrorReport>().unwrap();
        assert_eq!(report.0.kind, ErrorKind::Forbidden);
    }
}
