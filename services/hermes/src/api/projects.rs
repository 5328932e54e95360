//! Project management handlers.
//!
//! # Purpose
//! Project CRUD and project-scoped metrics. Project CRUD is service-level;
//! the metrics view is open to project admins.
use super::error::{
    api_already_exists, api_not_found, api_store_failure, ApiError,
};
use super::types::{
    render_project, ProjectCreateRequest, ProjectListResponse, ProjectUpdateRequest,
};
use super::{
    caller, empty_ok, ensure_project_name, json_ok, lookup_project, parse_body, split_verb,
};
use crate::app::AppState;
use crate::auth;
use crate::metrics as metric_builders;
use crate::model::Project;
use crate::store::StoreError;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use chrono::Utc;
use std::collections::HashMap;

#[utoipa::path(
    get,
    path = "/v1/projects",
    tag = "projects",
    responses(
        (status = 200, description = "All projects", body = ProjectListResponse)
    )
)]
pub(crate) async fn list_projects(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let user = caller(&state, &query, &headers).await?;
    auth::require_service_admin(&user)?;
    let projects = state
        .store
        .list_projects()
        .await
        .map_err(|err| api_store_failure("list projects", &err))?;
    let mut rendered = Vec::with_capacity(projects.len());
    for project in &projects {
        rendered.push(
            render_project(state.store.as_ref(), project)
                .await
                .map_err(|err| api_store_failure("render project", &err))?,
        );
    }
    Ok(json_ok(&ProjectListResponse { projects: rendered }))
}

/// GET dispatch: `/projects/{name}` fetches, `/projects/{name}:metrics`
/// aggregates.
pub(crate) async fn get_project_or_verb(
    State(state): State<AppState>,
    Path(raw): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    match split_verb(&raw) {
        (name, Some("metrics")) => project_metrics(state, name, query, headers).await,
        _ => get_project(state, &raw, query, headers).await,
    }
}

#[utoipa::path(
    get,
    path = "/v1/projects/{project}",
    tag = "projects",
    params(("project" = String, Path, description = "Project name")),
    responses(
        (status = 200, description = "One project", body = super::types::ProjectInfo),
        (status = 404, description = "Unknown project", body = super::error::ErrorResponse)
    )
)]
async fn get_project(
    state: AppState,
    raw_name: &str,
    query: HashMap<String, String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    ensure_project_name(raw_name)?;
    let user = caller(&state, &query, &headers).await?;
    auth::require_service_admin(&user)?;
    let project = lookup_project(&state, raw_name).await?;
    let rendered = render_project(state.store.as_ref(), &project)
        .await
        .map_err(|err| api_store_failure("render project", &err))?;
    Ok(json_ok(&rendered))
}

#[utoipa::path(
    get,
    path = "/v1/projects/{project}:metrics",
    tag = "projects",
    params(("project" = String, Path, description = "Project name")),
    responses(
        (status = 200, description = "Project metrics", body = crate::metrics::MetricList),
        (status = 404, description = "Unknown project", body = super::error::ErrorResponse)
    )
)]
async fn project_metrics(
    state: AppState,
    name: &str,
    query: HashMap<String, String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    ensure_project_name(name)?;
    let user = caller(&state, &query, &headers).await?;
    let project = lookup_project(&state, name).await?;
    auth::require_project_admin(&user, &project.uuid)?;
    let metrics = metric_builders::project_metrics(state.store.as_ref(), &project).await?;
    Ok(json_ok(&metrics))
}

#[utoipa::path(
    post,
    path = "/v1/projects/{project}",
    tag = "projects",
    request_body = ProjectCreateRequest,
    params(("project" = String, Path, description = "Project name")),
    responses(
        (status = 200, description = "Project created", body = super::types::ProjectInfo),
        (status = 409, description = "Name taken", body = super::error::ErrorResponse)
    )
)]
pub(crate) async fn create_project(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    ensure_project_name(&name)?;
    let user = caller(&state, &query, &headers).await?;
    auth::require_service_admin(&user)?;
    let request: ProjectCreateRequest = parse_body(&body, "Invalid Project Arguments")?;

    let now = Utc::now();
    let record = Project {
        uuid: uuid::Uuid::new_v4().to_string(),
        name: name.clone(),
        description: request.description,
        created_on: now,
        modified_on: now,
        created_by: Some(user.uuid.clone()),
    };
    let created = match state.store.insert_project(record).await {
        Ok(created) => created,
        Err(StoreError::Conflict(_)) => {
            return Err(api_already_exists("Project already exists"))
        }
        Err(err) => return Err(api_store_failure("create project", &err)),
    };
    metrics::counter!("hermes_projects_created_total").increment(1);
    let rendered = render_project(state.store.as_ref(), &created)
        .await
        .map_err(|err| api_store_failure("render project", &err))?;
    Ok(json_ok(&rendered))
}

#[utoipa::path(
    put,
    path = "/v1/projects/{project}",
    tag = "projects",
    request_body = ProjectUpdateRequest,
    params(("project" = String, Path, description = "Project name")),
    responses(
        (status = 200, description = "Updated project", body = super::types::ProjectInfo),
        (status = 404, description = "Unknown project", body = super::error::ErrorResponse)
    )
)]
pub(crate) async fn update_project(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    ensure_project_name(&name)?;
    let user = caller(&state, &query, &headers).await?;
    auth::require_service_admin(&user)?;
    let request: ProjectUpdateRequest = parse_body(&body, "Invalid Project Arguments")?;

    let project = lookup_project(&state, &name).await?;
    let new_name = request.name.unwrap_or_else(|| project.name.clone());
    ensure_project_name(&new_name)?;
    let description = request.description.unwrap_or_else(|| project.description.clone());

    let updated = match state
        .store
        .update_project(&project.uuid, new_name, description, Utc::now())
        .await
    {
        Ok(updated) => updated,
        Err(StoreError::Conflict(_)) => {
            return Err(api_already_exists("Project already exists"))
        }
        Err(StoreError::NotFound(_)) => return Err(api_not_found("Project doesn't exist")),
        Err(err) => return Err(api_store_failure("update project", &err)),
    };
    let rendered = render_project(state.store.as_ref(), &updated)
        .await
        .map_err(|err| api_store_failure("render project", &err))?;
    Ok(json_ok(&rendered))
}

#[utoipa::path(
    delete,
    path = "/v1/projects/{project}",
    tag = "projects",
    params(("project" = String, Path, description = "Project name")),
    responses(
        (status = 200, description = "Project deleted"),
        (status = 404, description = "Unknown project", body = super::error::ErrorResponse)
    )
)]
pub(crate) async fn delete_project(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    ensure_project_name(&name)?;
    let user = caller(&state, &query, &headers).await?;
    auth::require_service_admin(&user)?;
    let project = lookup_project(&state, &name).await?;

    // Stop push workers for this project's subscriptions before the rows go.
    let subs = state
        .store
        .list_subs(&project.uuid)
        .await
        .map_err(|err| api_store_failure("list subscriptions", &err))?;
    for sub in subs.iter().filter(|sub| sub.is_push_active()) {
        state.push_manager.remove(sub.key()).await;
    }

    match state.store.remove_project(&project.uuid).await {
        Ok(()) => Ok(empty_ok()),
        Err(StoreError::NotFound(_)) => Err(api_not_found("Project doesn't exist")),
        Err(err) => Err(api_store_failure("delete project", &err)),
    }
}
