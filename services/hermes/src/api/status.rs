//! Service-level health and operational metrics.
use super::error::{api_store_failure, ApiError};
use super::types::{HealthResponse, PushServerInfo};
use super::{caller, json_ok};
use crate::app::AppState;
use crate::auth;
use crate::store::StoreError;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use std::collections::HashMap;

/// Operational metrics of the service node itself.
#[utoipa::path(
    get,
    path = "/v1/metrics",
    tag = "status",
    responses(
        (status = 200, description = "Node cpu/memory usage", body = crate::metrics::MetricList)
    )
)]
pub(crate) async fn op_metrics(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let user = caller(&state, &query, &headers).await?;
    auth::require_service_admin(&user)?;
    Ok(json_ok(&crate::metrics::node_metrics()))
}

/// Health summary. With push enabled the status degrades to "warning" when
/// the push-worker identity cannot be resolved or a push server does not
/// answer; with push disabled the body says so and the service reports "ok".
#[utoipa::path(
    get,
    path = "/v1/status",
    tag = "status",
    responses(
        (status = 200, description = "Service health", body = HealthResponse)
    )
)]
pub(crate) async fn health(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let user = caller(&state, &query, &headers).await?;
    auth::require_service_admin(&user)?;

    if !state.config.push_enabled {
        return Ok(json_ok(&HealthResponse {
            status: "ok".to_string(),
            push_servers: None,
            push_functionality: Some("disabled".to_string()),
        }));
    }

    let worker_resolved = match state
        .store
        .user_by_token(&state.config.push_worker_token)
        .await
    {
        Ok(_) => true,
        Err(StoreError::NotFound(_)) => false,
        Err(err) => return Err(api_store_failure("push worker lookup", &err)),
    };

    let endpoint = state.config.push_server_endpoint();
    let (server_status, reachable) = match state.push_client.status(&endpoint).await {
        Ok(reply) => (format!("Success: {reply}"), true),
        Err(err) => (err.to_string(), false),
    };

    let status = if worker_resolved && reachable {
        "ok"
    } else {
        "warning"
    };
    Ok(json_ok(&HealthResponse {
        status: status.to_string(),
        push_servers: Some(vec![PushServerInfo {
            endpoint,
            status: server_status,
        }]),
        push_functionality: None,
    }))
}
