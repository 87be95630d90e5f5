//! Request handlers and the error-to-response mapping.

use std::any::Any;
use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use eventfinder_core::{EventFinder, SilentProgress};
use eventfinder_shared::{EventFinderError, EventTypeFilter, EventsResponse};

/// Query string of `GET /events`.
#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub name: Option<String>,
    pub event_type: Option<String>,
}

/// `GET /events?name=...&event_type=in_person|online`
pub async fn find_events(
    State(finder): State<Arc<EventFinder>>,
    query: Result<Query<EventsQuery>, QueryRejection>,
) -> Result<Json<EventsResponse>, ApiError> {
    let Query(params) = query?;
    let name = params
        .name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| EventFinderError::validation("Parameter 'name' is required"))?;

    // Unlike the library entry point, the HTTP surface rejects unknown values.
    let filter = params
        .event_type
        .as_deref()
        .map(str::trim)
        .filter(|raw| !raw.is_empty())
        .map(str::parse::<EventTypeFilter>)
        .transpose()?;

    let report = finder.run_with_report(name, filter, &SilentProgress).await?;
    info!(
        speaker = name,
        count = report.response.count(),
        "events request served"
    );
    Ok(Json(report.response))
}

/// `GET /health`
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Maps [`EventFinderError`] onto `{"detail": message}` with 400 or 500.
#[derive(Debug)]
pub struct ApiError(pub EventFinderError);

impl From<EventFinderError> for ApiError {
    fn from(err: EventFinderError) -> Self {
        Self(err)
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self(EventFinderError::validation(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            error!(error = %self.0, "request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        };
        detail_response(status, self.0.to_string())
    }
}

/// Last-resort handler: a panic becomes a 500 carrying only its message.
pub(crate) fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(message) = err.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = err.downcast_ref::<&str>() {
        (*message).to_string()
    } else {
        "internal server error".to_string()
    };
    error!(%detail, "request handler panicked");
    detail_response(StatusCode::INTERNAL_SERVER_ERROR, detail)
}

fn detail_response(status: StatusCode, detail: String) -> Response {
    (status, Json(json!({ "detail": detail }))).into_response()
}
