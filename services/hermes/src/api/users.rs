//! User management handlers.
//!
//! # Purpose
//! User CRUD, token-based self inspection (`/users/profile`), lookups by
//! token and uuid, and token regeneration. All of it is service-level API
//! surface: apart from the profile endpoint, callers need `service_admin`.
use super::error::{
    api_already_exists, api_internal, api_invalid_argument, api_not_found, api_store_failure,
    ApiError,
};
use super::types::{
    render_user, UserCreateRequest, UserInfo, UserListResponse, UserUpdateRequest,
};
use super::{
    caller, empty_ok, ensure_user_name, json_ok, lookup_user, pagination, parse_required_body,
    split_verb,
};
use crate::app::AppState;
use crate::auth;
use crate::model::{ProjectMembership, User};
use crate::store::StoreError;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use rand::RngCore;
use std::collections::HashMap;

fn generate_token() -> String {
    let mut bytes = [0u8; 24];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Identity of the token holder.
#[utoipa::path(
    get,
    path = "/v1/users/profile",
    tag = "users",
    responses(
        (status = 200, description = "Profile of the token holder", body = UserInfo),
        (status = 401, description = "Unknown token", body = super::error::ErrorResponse)
    )
)]
pub(crate) async fn profile(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let user = caller(&state, &query, &headers).await?;
    let rendered = render_user(state.store.as_ref(), &user)
        .await
        .map_err(|err| api_store_failure("render profile", &err))?;
    Ok(json_ok(&rendered))
}

#[utoipa::path(
    get,
    path = "/v1/users",
    tag = "users",
    params(
        ("pageSize" = Option<u64>, Query, description = "Page size"),
        ("pageToken" = Option<String>, Query, description = "Listing cursor")
    ),
    responses(
        (status = 200, description = "Users, newest first", body = UserListResponse)
    )
)]
pub(crate) async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let user = caller(&state, &query, &headers).await?;
    auth::require_service_admin(&user)?;

    let params = pagination::parse_params(&query)?;
    let users = state
        .store
        .list_users()
        .await
        .map_err(|err| api_store_failure("list users", &err))?;
    let page = pagination::paginate(&users, params)?;

    let mut rendered = Vec::with_capacity(page.items.len());
    for item in &page.items {
        rendered.push(
            render_user(state.store.as_ref(), item)
                .await
                .map_err(|err| api_store_failure("render user", &err))?,
        );
    }
    Ok(json_ok(&UserListResponse {
        users: rendered,
        next_page_token: page.next_page_token,
        total_size: page.total_size,
    }))
}

#[utoipa::path(
    get,
    path = "/v1/users/{user}",
    tag = "users",
    params(("user" = String, Path, description = "User name")),
    responses(
        (status = 200, description = "One user", body = UserInfo),
        (status = 404, description = "Unknown user", body = super::error::ErrorResponse)
    )
)]
pub(crate) async fn get_user(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let user = caller(&state, &query, &headers).await?;
    auth::require_service_admin(&user)?;
    let target = lookup_user(&state, &name).await?;
    let rendered = render_user(state.store.as_ref(), &target)
        .await
        .map_err(|err| api_store_failure("render user", &err))?;
    Ok(json_ok(&rendered))
}

#[utoipa::path(
    get,
    path = "/v1/users:byToken/{token}",
    tag = "users",
    params(("token" = String, Path, description = "User token")),
    responses(
        (status = 200, description = "User owning the token", body = UserInfo),
        (status = 404, description = "Unknown token", body = super::error::ErrorResponse)
    )
)]
pub(crate) async fn get_user_by_token(
    state: AppState,
    token: String,
    query: HashMap<String, String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let user = caller(&state, &query, &headers).await?;
    auth::require_service_admin(&user)?;
    let target = match state.store.user_by_token(&token).await {
        Ok(target) => target,
        Err(StoreError::NotFound(_)) => return Err(api_not_found("User doesn't exist")),
        Err(err) => return Err(api_store_failure("user by token", &err)),
    };
    let rendered = render_user(state.store.as_ref(), &target)
        .await
        .map_err(|err| api_store_failure("render user", &err))?;
    Ok(json_ok(&rendered))
}

/// Uuids are not unique keys; more than one match is reported as an
/// internal error instead of picking one arbitrarily.
#[utoipa::path(
    get,
    path = "/v1/users:byUUID/{uuid}",
    tag = "users",
    params(("uuid" = String, Path, description = "User uuid")),
    responses(
        (status = 200, description = "User owning the uuid", body = UserInfo),
        (status = 404, description = "Unknown uuid", body = super::error::ErrorResponse),
        (status = 500, description = "Duplicate uuid", body = super::error::ErrorResponse)
    )
)]
pub(crate) async fn get_user_by_uuid(
    state: AppState,
    uuid: String,
    query: HashMap<String, String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let user = caller(&state, &query, &headers).await?;
    auth::require_service_admin(&user)?;
    let matches = state
        .store
        .users_by_uuid(&uuid)
        .await
        .map_err(|err| api_store_failure("user by uuid", &err))?;
    let target = match matches.len() {
        0 => return Err(api_not_found("User doesn't exist")),
        1 => matches.into_iter().next().expect("single match"),
        _ => return Err(api_internal("Multiple users found with the same uuid")),
    };
    let rendered = render_user(state.store.as_ref(), &target)
        .await
        .map_err(|err| api_store_failure("render user", &err))?;
    Ok(json_ok(&rendered))
}

/// POST dispatch: `/users/{name}` creates, `/users/{name}:refreshToken`
/// rotates the token.
pub(crate) async fn post_user(
    State(state): State<AppState>,
    Path(raw): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    match split_verb(&raw) {
        (name, None) => create_user(state, name, query, headers, body).await,
        (name, Some("refreshToken")) => refresh_token(state, name, query, headers).await,
        _ => Err(api_not_found("Not Found")),
    }
}

#[utoipa::path(
    post,
    path = "/v1/users/{user}",
    tag = "users",
    request_body = UserCreateRequest,
    params(("user" = String, Path, description = "User name")),
    responses(
        (status = 200, description = "User created", body = UserInfo),
        (status = 409, description = "Name taken", body = super::error::ErrorResponse)
    )
)]
async fn create_user(
    state: AppState,
    name: &str,
    query: HashMap<String, String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    ensure_user_name(name)?;
    let user = caller(&state, &query, &headers).await?;
    auth::require_service_admin(&user)?;
    let request: UserCreateRequest = parse_required_body(&body, "Invalid User Arguments")?;

    let mut memberships = Vec::with_capacity(request.projects.len());
    for entry in request.projects {
        if state
            .store
            .project_by_uuid(&entry.project_uuid)
            .await
            .is_err()
        {
            return Err(api_invalid_argument(&format!(
                "Invalid project uuid: {}",
                entry.project_uuid
            )));
        }
        memberships.push(ProjectMembership {
            project_uuid: entry.project_uuid,
            roles: entry.roles,
        });
    }

    let now = Utc::now();
    let record = User {
        uuid: uuid::Uuid::new_v4().to_string(),
        name: name.to_string(),
        token: generate_token(),
        email: request.email,
        service_roles: request.service_roles,
        projects: memberships,
        created_on: now,
        modified_on: now,
        created_by: Some(user.uuid.clone()),
    };
    let created = match state.store.insert_user(record).await {
        Ok(created) => created,
        Err(StoreError::Conflict(_)) => return Err(api_already_exists("User already exists")),
        Err(err) => return Err(api_store_failure("create user", &err)),
    };
    let rendered = render_user(state.store.as_ref(), &created)
        .await
        .map_err(|err| api_store_failure("render user", &err))?;
    Ok(json_ok(&rendered))
}

#[utoipa::path(
    post,
    path = "/v1/users/{user}:refreshToken",
    tag = "users",
    params(("user" = String, Path, description = "User name")),
    responses(
        (status = 200, description = "User with a fresh token", body = UserInfo),
        (status = 404, description = "Unknown user", body = super::error::ErrorResponse)
    )
)]
async fn refresh_token(
    state: AppState,
    name: &str,
    query: HashMap<String, String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let user = caller(&state, &query, &headers).await?;
    auth::require_service_admin(&user)?;
    let mut target = lookup_user(&state, name).await?;
    target.token = generate_token();
    target.modified_on = Utc::now();
    let updated = match state.store.update_user(name, target).await {
        Ok(updated) => updated,
        Err(StoreError::NotFound(_)) => return Err(api_not_found("User doesn't exist")),
        Err(err) => return Err(api_store_failure("refresh token", &err)),
    };
    let rendered = render_user(state.store.as_ref(), &updated)
        .await
        .map_err(|err| api_store_failure("render user", &err))?;
    Ok(json_ok(&rendered))
}

#[utoipa::path(
    put,
    path = "/v1/users/{user}",
    tag = "users",
    request_body = UserUpdateRequest,
    params(("user" = String, Path, description = "User name")),
    responses(
        (status = 200, description = "Updated user", body = UserInfo),
        (status = 404, description = "Unknown user", body = super::error::ErrorResponse)
    )
)]
pub(crate) async fn update_user(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let user = caller(&state, &query, &headers).await?;
    auth::require_service_admin(&user)?;
    let request: UserUpdateRequest = parse_required_body(&body, "Invalid User Arguments")?;

    let mut target = lookup_user(&state, &name).await?;
    if let Some(new_name) = request.name {
        ensure_user_name(&new_name)?;
        target.name = new_name;
    }
    if let Some(email) = request.email {
        target.email = email;
    }
    if let Some(service_roles) = request.service_roles {
        target.service_roles = service_roles;
    }
    if let Some(projects) = request.projects {
        let mut memberships = Vec::with_capacity(projects.len());
        for entry in projects {
            if state
                .store
                .project_by_uuid(&entry.project_uuid)
                .await
                .is_err()
            {
                return Err(api_invalid_argument(&format!(
                    "Invalid project uuid: {}",
                    entry.project_uuid
                )));
            }
            memberships.push(ProjectMembership {
                project_uuid: entry.project_uuid,
                roles: entry.roles,
            });
        }
        target.projects = memberships;
    }
    target.modified_on = Utc::now();

    let updated = match state.store.update_user(&name, target).await {
        Ok(updated) => updated,
        Err(StoreError::Conflict(_)) => return Err(api_already_exists("User already exists")),
        Err(StoreError::NotFound(_)) => return Err(api_not_found("User doesn't exist")),
        Err(err) => return Err(api_store_failure("update user", &err)),
    };
    let rendered = render_user(state.store.as_ref(), &updated)
        .await
        .map_err(|err| api_store_failure("render user", &err))?;
    Ok(json_ok(&rendered))
}

#[utoipa::path(
    delete,
    path = "/v1/users/{user}",
    tag = "users",
    params(("user" = String, Path, description = "User name")),
    responses(
        (status = 200, description = "User deleted"),
        (status = 404, description = "Unknown user", body = super::error::ErrorResponse)
    )
)]
pub(crate) async fn delete_user(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let user = caller(&state, &query, &headers).await?;
    auth::require_service_admin(&user)?;
    match state.store.remove_user(&name).await {
        Ok(()) => Ok(empty_ok()),
        Err(StoreError::NotFound(_)) => Err(api_not_found("User doesn't exist")),
        Err(err) => Err(api_store_failure("delete user", &err)),
    }
}
