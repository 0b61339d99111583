//! The orchestration trigger.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use orbit_workflow::ProcessRequest;

use crate::error::{Result, ServerError};
use crate::state::AppState;

/// Header a caller may use instead of `correlationId` in the body.
pub const CORRELATION_HEADER: &str = "x-correlation-id";

/// `POST /api/v1/orders/process`
///
/// Responds with the run report: 200 when the run succeeded, 500 when it
/// did not, 400 when the body cannot be read.
pub async fn process_order_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: std::result::Result<Json<ProcessRequest>, JsonRejection>,
) -> Result<Response> {
    let Json(mut request) = body.map_err(|e| ServerError::BadRequest(e.body_text()))?;
    if request.order_id.trim().is_empty() {
        return Err(ServerError::BadRequest("orderId must not be empty".to_string()));
    }
    if request.correlation_id.is_none()
        && let Some(id) = headers
            .get(CORRELATION_HEADER)
            .and_then(|v| v.to_str().ok())
    {
        request.correlation_id = Some(id.to_string());
    }

    let report = state.orchestrator.run(request).await;
    let status = if report.success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    Ok((status, Json(report)).into_response())
}
