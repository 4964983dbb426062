//! Error disclosure.
//!
//! [`AppError`](tourdesk_core::AppError) always renders the restricted body
//! and leaves an [`ErrorReport`] on the response. In diagnostic mode this
//! middleware swaps that body for the full diagnostic one.

use axum::{
    Json,
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tourdesk_core::{DisclosureMode, errors::ErrorReport};

use crate::state::AppState;

pub async fn error_disclosure(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let response = next.run(req).await;

    if state.disclosure != DisclosureMode::Diagnostic {
        return response;
    }

    match response.extensions().get::<ErrorReport>().cloned() {
        Some(report) => {
            let (status, body) = report.0.to_body(DisclosureMode::Diagnostic);
            let mut diagnostic = (status, Json(body)).into_response();
            diagnostic.extensions_mut().insert(report);
            diagnostic
        }
        None => response,
    }
}
