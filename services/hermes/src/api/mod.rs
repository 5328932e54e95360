//! HTTP API facade.
//!
//! # Purpose
//! Request decode, pagination, response shaping. Handlers are grouped per
//! resource; shared plumbing (indented JSON rendering, `name:verb` path
//! dispatch, name and ackId validation) lives here.
use crate::app::AppState;
use crate::auth;
use crate::model::{Project, SubKey, Subscription, Topic, TopicKey, User};
use crate::store::StoreError;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::collections::HashMap;

pub mod error;
pub mod pagination;
pub mod projects;
pub mod status;
pub mod subscriptions;
pub mod topics;
pub mod types;
pub mod users;

use error::{
    api_invalid_argument, api_not_found, api_store_failure, ApiError,
};

/// Render a body with 3-space indentation; success and error envelopes share
/// this so snapshots are deterministic.
pub(crate) fn json_response<T: Serialize>(code: StatusCode, value: &T) -> Response {
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"   ");
    let mut buf = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    if let Err(err) = value.serialize(&mut serializer) {
        tracing::error!(error = %err, "response serialization failed");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    (
        code,
        [(header::CONTENT_TYPE, "application/json")],
        buf,
    )
        .into_response()
}

/// 200 with an indented JSON body.
pub(crate) fn json_ok<T: Serialize>(value: &T) -> Response {
    json_response(StatusCode::OK, value)
}

/// 200 with an empty body, used by mutations that return nothing.
pub(crate) fn empty_ok() -> Response {
    StatusCode::OK.into_response()
}

/// Split a `name:verb` path segment. The original API addresses operations
/// as `/topics/{topic}:publish`; the colon is not a path separator, so the
/// router hands us the combined segment.
pub(crate) fn split_verb(raw: &str) -> (&str, Option<&str>) {
    match raw.split_once(':') {
        Some((name, verb)) => (name, Some(verb)),
        None => (raw, None),
    }
}

/// Resource names allow ASCII letters, digits, underscore and dash. No dot,
/// comma, colon, slash or whitespace.
pub(crate) fn valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-')
}

/// Validate the project path segment. Projects are validated before the
/// nested topic/subscription segment so an invalid project is reported
/// first.
pub(crate) fn ensure_project_name(name: &str) -> Result<(), ApiError> {
    if valid_name(name) {
        Ok(())
    } else {
        Err(api_invalid_argument("Invalid project name"))
    }
}

pub(crate) fn ensure_topic_name(name: &str) -> Result<(), ApiError> {
    if valid_name(name) {
        Ok(())
    } else {
        Err(api_invalid_argument("Invalid topic name"))
    }
}

pub(crate) fn ensure_sub_name(name: &str) -> Result<(), ApiError> {
    if valid_name(name) {
        Ok(())
    } else {
        Err(api_invalid_argument("Invalid subscription name"))
    }
}

pub(crate) fn ensure_user_name(name: &str) -> Result<(), ApiError> {
    if valid_name(name) {
        Ok(())
    } else {
        Err(api_invalid_argument("Invalid user name"))
    }
}

/// Parse an ackId of the form `projects/{p}/subscriptions/{s}:{offset}`,
/// returning the offset when project and subscription match the request.
pub(crate) fn parse_ack_id(project: &str, sub: &str, ack_id: &str) -> Option<u64> {
    let expected = format!("projects/{project}/subscriptions/{sub}:");
    let offset = ack_id.strip_prefix(expected.as_str())?;
    offset.parse().ok()
}

/// Fully qualified resource paths used in wire bodies.
pub(crate) fn topic_path(project: &str, topic: &str) -> String {
    format!("/projects/{project}/topics/{topic}")
}

pub(crate) fn sub_path(project: &str, sub: &str) -> String {
    format!("/projects/{project}/subscriptions/{sub}")
}

/// Parse a request body, tolerating an empty payload when `T: Default`.
/// Malformed JSON maps to the handler-supplied argument error so every
/// operation keeps its own "Invalid ... Arguments" wording.
pub(crate) fn parse_body<T>(body: &[u8], error_message: &str) -> Result<T, ApiError>
where
    T: serde::de::DeserializeOwned + Default,
{
    let trimmed = body.iter().all(|byte| byte.is_ascii_whitespace());
    if trimmed {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|_| api_invalid_argument(error_message))
}

/// Like `parse_body` but an empty payload is also an error.
pub(crate) fn parse_required_body<T>(body: &[u8], error_message: &str) -> Result<T, ApiError>
where
    T: serde::de::DeserializeOwned,
{
    serde_json::from_slice(body).map_err(|_| api_invalid_argument(error_message))
}

/// Resolve the request's bearer token (the `key` query parameter, or the
/// `x-api-key` header) to a user.
pub(crate) async fn caller(
    state: &AppState,
    query: &HashMap<String, String>,
    headers: &HeaderMap,
) -> Result<User, ApiError> {
    let key = query
        .get("key")
        .map(String::as_str)
        .or_else(|| headers.get("x-api-key").and_then(|value| value.to_str().ok()));
    Ok(auth::authenticate(state.store.as_ref(), key).await?)
}

pub(crate) async fn lookup_project(state: &AppState, name: &str) -> Result<Project, ApiError> {
    match state.store.project_by_name(name).await {
        Ok(project) => Ok(project),
        Err(StoreError::NotFound(_)) => Err(api_not_found("Project doesn't exist")),
        Err(err) => Err(api_store_failure("project lookup", &err)),
    }
}

pub(crate) async fn lookup_topic(
    state: &AppState,
    project_uuid: &str,
    name: &str,
) -> Result<Topic, ApiError> {
    match state.store.topic(&TopicKey::new(project_uuid, name)).await {
        Ok(topic) => Ok(topic),
        Err(StoreError::NotFound(_)) => Err(api_not_found("Topic doesn't exist")),
        Err(err) => Err(api_store_failure("topic lookup", &err)),
    }
}

pub(crate) async fn lookup_sub(
    state: &AppState,
    project_uuid: &str,
    name: &str,
) -> Result<Subscription, ApiError> {
    match state.store.sub(&SubKey::new(project_uuid, name)).await {
        Ok(sub) => Ok(sub),
        Err(StoreError::NotFound(_)) => Err(api_not_found("Subscription doesn't exist")),
        Err(err) => Err(api_store_failure("subscription lookup", &err)),
    }
}

/// Render an ACL as ordered user names, skipping uuids that no longer
/// resolve to a user.
pub(crate) async fn acl_user_names(
    state: &AppState,
    key: &crate::model::AclKey,
) -> Result<Vec<String>, ApiError> {
    let uuids = state
        .store
        .acl(key)
        .await
        .map_err(|err| api_store_failure("acl lookup", &err))?;
    let mut names = Vec::with_capacity(uuids.len());
    for uuid in uuids {
        let matches = state
            .store
            .users_by_uuid(&uuid)
            .await
            .map_err(|err| api_store_failure("acl user lookup", &err))?;
        if let Some(user) = matches.into_iter().next() {
            names.push(user.name);
        }
    }
    Ok(names)
}

/// Replace an ACL with the given user names; every name must resolve.
pub(crate) async fn set_acl_from_names(
    state: &AppState,
    key: &crate::model::AclKey,
    names: &[String],
) -> Result<(), ApiError> {
    let mut uuids = Vec::with_capacity(names.len());
    let mut missing = Vec::new();
    for name in names {
        match state.store.user_by_name(name).await {
            Ok(user) => uuids.push(user.uuid),
            Err(StoreError::NotFound(_)) => missing.push(name.clone()),
            Err(err) => return Err(api_store_failure("acl user lookup", &err)),
        }
    }
    if !missing.is_empty() {
        return Err(api_not_found(&format!(
            "User(s): {} do not exist",
            missing.join(", ")
        )));
    }
    state
        .store
        .set_acl(key, uuids)
        .await
        .map_err(|err| api_store_failure("acl update", &err))
}

pub(crate) async fn lookup_user(state: &AppState, name: &str) -> Result<User, ApiError> {
    match state.store.user_by_name(name).await {
        Ok(user) => Ok(user),
        Err(StoreError::NotFound(_)) => Err(api_not_found("User doesn't exist")),
        Err(err) => Err(api_store_failure("user lookup", &err)),
    }
}
