//! Binds the JSON-RPC dispatch core to axum.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method},
    response::{IntoResponse, Response},
};
use orbit_rpc::InboundRequest;

use crate::state::AppState;

/// `/rpc`, any method. Method checks, CORS, and auth are the RPC
/// server's own.
pub async fn rpc_handler(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let outbound = state
        .rpc
        .handle_request(InboundRequest {
            method,
            headers,
            body,
        })
        .await;

    let mut response = match outbound.body {
        Some(body) => (outbound.status, Json(body)).into_response(),
        None => outbound.status.into_response(),
    };
    response.headers_mut().extend(outbound.headers);
    response
}
