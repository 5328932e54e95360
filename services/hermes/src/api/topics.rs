//! Topic handlers: CRUD, publish, ACL views and per-topic metrics.
use super::error::{
    api_already_exists, api_invalid_argument, api_store_failure, ApiError,
};
use super::types::{
    render_topic, AclRequest, AclResponse, PublishRequest, PublishResponse, StoredMessage,
    TopicListResponse, TopicSubscriptionsResponse,
};
use super::{
    acl_user_names, caller, empty_ok, ensure_project_name, ensure_topic_name, json_ok,
    lookup_project, lookup_topic, pagination, parse_required_body, set_acl_from_names, split_verb,
    sub_path,
};
use crate::app::AppState;
use crate::auth;
use crate::model::{AclKey, AclKind, Topic, TopicKey, User};
use crate::store::StoreError;
use axum::body::Bytes as BodyBytes;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use chrono::{SecondsFormat, Utc};
use std::collections::HashMap;

/// Server-side cap on a single publish batch.
const MAX_PUBLISH_BATCH: usize = 1000;

#[utoipa::path(
    get,
    path = "/v1/projects/{project}/topics",
    tag = "topics",
    params(
        ("project" = String, Path, description = "Project name"),
        ("pageSize" = Option<u64>, Query, description = "Page size"),
        ("pageToken" = Option<String>, Query, description = "Listing cursor")
    ),
    responses(
        (status = 200, description = "Topics visible to the caller, newest first", body = TopicListResponse)
    )
)]
pub(crate) async fn list_topics(
    State(state): State<AppState>,
    Path(project_name): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    ensure_project_name(&project_name)?;
    let user = caller(&state, &query, &headers).await?;
    let params = pagination::parse_params(&query)?;
    let project = lookup_project(&state, &project_name).await?;
    if !auth::is_project_admin(&user, &project.uuid) && user.membership(&project.uuid).is_none() {
        return Err(super::error::api_forbidden());
    }

    let topics = state
        .store
        .list_topics(&project.uuid)
        .await
        .map_err(|err| api_store_failure("list topics", &err))?;
    // Visibility filtering happens before pagination so totalSize reflects
    // what the caller can actually see.
    let visible = filter_visible_topics(&state, &user, &project.uuid, topics).await?;
    let page = pagination::paginate(&visible, params)?;

    Ok(json_ok(&TopicListResponse {
        topics: page
            .items
            .iter()
            .map(|topic| render_topic(&project.name, &topic.name))
            .collect(),
        next_page_token: page.next_page_token,
        total_size: page.total_size,
    }))
}

async fn filter_visible_topics(
    state: &AppState,
    user: &User,
    project_uuid: &str,
    topics: Vec<Topic>,
) -> Result<Vec<Topic>, ApiError> {
    if auth::is_project_admin(user, project_uuid) {
        return Ok(topics);
    }
    let mut visible = Vec::with_capacity(topics.len());
    for topic in topics {
        let acl = state
            .store
            .acl(&AclKey::new(project_uuid, AclKind::Topics, topic.name.clone()))
            .await
            .map_err(|err| api_store_failure("topic acl", &err))?;
        if acl.iter().any(|uuid| *uuid == user.uuid) {
            visible.push(topic);
        }
    }
    Ok(visible)
}

/// GET dispatch: `{topic}` fetches, `{topic}:metrics` aggregates,
/// `{topic}:acl` lists authorized users.
pub(crate) async fn get_topic_or_verb(
    State(state): State<AppState>,
    Path((project_name, raw)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    match split_verb(&raw) {
        (name, Some("metrics")) => topic_metrics(state, project_name, name, query, headers).await,
        (name, Some("acl")) => topic_acl(state, project_name, name, query, headers).await,
        _ => get_topic(state, project_name, &raw, query, headers).await,
    }
}

#[utoipa::path(
    get,
    path = "/v1/projects/{project}/topics/{topic}",
    tag = "topics",
    params(
        ("project" = String, Path, description = "Project name"),
        ("topic" = String, Path, description = "Topic name")
    ),
    responses(
        (status = 200, description = "One topic", body = super::types::TopicInfo),
        (status = 404, description = "Unknown topic", body = super::error::ErrorResponse)
    )
)]
async fn get_topic(
    state: AppState,
    project_name: String,
    raw_name: &str,
    query: HashMap<String, String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    ensure_project_name(&project_name)?;
    ensure_topic_name(raw_name)?;
    let user = caller(&state, &query, &headers).await?;
    let project = lookup_project(&state, &project_name).await?;
    auth::require_publisher(
        state.store.as_ref(),
        state.config.per_resource_auth,
        &user,
        &project.uuid,
        raw_name,
    )
    .await?;
    let topic = lookup_topic(&state, &project.uuid, raw_name).await?;
    Ok(json_ok(&render_topic(&project.name, &topic.name)))
}

#[utoipa::path(
    get,
    path = "/v1/projects/{project}/topics/{topic}:metrics",
    tag = "topics",
    params(
        ("project" = String, Path, description = "Project name"),
        ("topic" = String, Path, description = "Topic name")
    ),
    responses(
        (status = 200, description = "Topic metrics", body = crate::metrics::MetricList),
        (status = 404, description = "Unknown topic", body = super::error::ErrorResponse)
    )
)]
async fn topic_metrics(
    state: AppState,
    project_name: String,
    name: &str,
    query: HashMap<String, String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    ensure_project_name(&project_name)?;
    ensure_topic_name(name)?;
    let user = caller(&state, &query, &headers).await?;
    let project = lookup_project(&state, &project_name).await?;
    auth::require_publisher(
        state.store.as_ref(),
        state.config.per_resource_auth,
        &user,
        &project.uuid,
        name,
    )
    .await?;
    let topic = lookup_topic(&state, &project.uuid, name).await?;
    let metrics =
        crate::metrics::topic_metrics(state.store.as_ref(), state.broker.as_ref(), &topic).await?;
    Ok(json_ok(&metrics))
}

#[utoipa::path(
    get,
    path = "/v1/projects/{project}/topics/{topic}:acl",
    tag = "topics",
    params(
        ("project" = String, Path, description = "Project name"),
        ("topic" = String, Path, description = "Topic name")
    ),
    responses(
        (status = 200, description = "Authorized users in ACL order", body = AclResponse)
    )
)]
async fn topic_acl(
    state: AppState,
    project_name: String,
    name: &str,
    query: HashMap<String, String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    ensure_project_name(&project_name)?;
    ensure_topic_name(name)?;
    let user = caller(&state, &query, &headers).await?;
    let project = lookup_project(&state, &project_name).await?;
    auth::require_project_admin(&user, &project.uuid)?;
    lookup_topic(&state, &project.uuid, name).await?;
    let names = acl_user_names(
        &state,
        &AclKey::new(project.uuid.clone(), AclKind::Topics, name),
    )
    .await?;
    Ok(json_ok(&AclResponse {
        authorized_users: names,
    }))
}

#[utoipa::path(
    put,
    path = "/v1/projects/{project}/topics/{topic}",
    tag = "topics",
    params(
        ("project" = String, Path, description = "Project name"),
        ("topic" = String, Path, description = "Topic name")
    ),
    responses(
        (status = 200, description = "Topic created", body = super::types::TopicInfo),
        (status = 409, description = "Name taken", body = super::error::ErrorResponse)
    )
)]
pub(crate) async fn create_topic(
    State(state): State<AppState>,
    Path((project_name, name)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    ensure_project_name(&project_name)?;
    ensure_topic_name(&name)?;
    let user = caller(&state, &query, &headers).await?;
    let project = lookup_project(&state, &project_name).await?;
    auth::require_project_admin(&user, &project.uuid)?;

    let created = match state
        .store
        .insert_topic(Topic {
            project_uuid: project.uuid.clone(),
            name: name.clone(),
        })
        .await
    {
        Ok(created) => created,
        Err(StoreError::Conflict(_)) => return Err(api_already_exists("Topic already exists")),
        Err(err) => return Err(api_store_failure("create topic", &err)),
    };
    Ok(json_ok(&render_topic(&project.name, &created.name)))
}

#[utoipa::path(
    delete,
    path = "/v1/projects/{project}/topics/{topic}",
    tag = "topics",
    params(
        ("project" = String, Path, description = "Project name"),
        ("topic" = String, Path, description = "Topic name")
    ),
    responses(
        (status = 200, description = "Topic deleted"),
        (status = 404, description = "Unknown topic", body = super::error::ErrorResponse)
    )
)]
pub(crate) async fn delete_topic(
    State(state): State<AppState>,
    Path((project_name, name)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    ensure_project_name(&project_name)?;
    ensure_topic_name(&name)?;
    let user = caller(&state, &query, &headers).await?;
    let project = lookup_project(&state, &project_name).await?;
    auth::require_project_admin(&user, &project.uuid)?;

    let topic = lookup_topic(&state, &project.uuid, &name).await?;
    match state.store.remove_topic(&TopicKey::new(project.uuid.clone(), name)).await {
        Ok(()) => {}
        Err(StoreError::NotFound(_)) => {
            return Err(super::error::api_not_found("Topic doesn't exist"))
        }
        Err(err) => return Err(api_store_failure("delete topic", &err)),
    }
    if let Err(err) = state.broker.delete_topic(&topic.log_topic()).await {
        // The metadata row is gone; a dangling log only wastes space.
        tracing::warn!(error = %err, topic = %topic.name, "failed to delete topic log");
    }
    Ok(empty_ok())
}

/// POST dispatch: `{topic}:publish` appends messages, `{topic}:modAcl`
/// replaces the ACL.
pub(crate) async fn post_topic_verb(
    State(state): State<AppState>,
    Path((project_name, raw)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: BodyBytes,
) -> Result<Response, ApiError> {
    match split_verb(&raw) {
        (name, Some("publish")) => publish(state, project_name, name, query, headers, body).await,
        (name, Some("modAcl")) => {
            modify_topic_acl(state, project_name, name, query, headers, body).await
        }
        _ => Err(super::error::api_not_found("Not Found")),
    }
}

#[utoipa::path(
    post,
    path = "/v1/projects/{project}/topics/{topic}:publish",
    tag = "topics",
    request_body = PublishRequest,
    params(
        ("project" = String, Path, description = "Project name"),
        ("topic" = String, Path, description = "Topic name")
    ),
    responses(
        (status = 200, description = "Assigned message ids in input order", body = PublishResponse),
        (status = 400, description = "Malformed message", body = super::error::ErrorResponse),
        (status = 404, description = "Unknown topic", body = super::error::ErrorResponse)
    )
)]
async fn publish(
    state: AppState,
    project_name: String,
    name: &str,
    query: HashMap<String, String>,
    headers: HeaderMap,
    body: BodyBytes,
) -> Result<Response, ApiError> {
    ensure_project_name(&project_name)?;
    ensure_topic_name(name)?;
    let user = caller(&state, &query, &headers).await?;
    let project = lookup_project(&state, &project_name).await?;
    auth::require_publisher(
        state.store.as_ref(),
        state.config.per_resource_auth,
        &user,
        &project.uuid,
        name,
    )
    .await?;
    let topic = lookup_topic(&state, &project.uuid, name).await?;

    let request: PublishRequest = parse_required_body(&body, "Invalid Message Arguments")?;
    if request.messages.is_empty() || request.messages.len() > MAX_PUBLISH_BATCH {
        return Err(api_invalid_argument("Invalid Message Arguments"));
    }
    // One malformed message fails the whole batch before anything is
    // appended.
    let mut payloads = Vec::with_capacity(request.messages.len());
    for message in &request.messages {
        if STANDARD.decode(&message.data).is_err() {
            return Err(api_invalid_argument("Invalid Message Arguments"));
        }
        let stored = StoredMessage {
            attributes: message.attributes.clone(),
            data: message.data.clone(),
        };
        let bytes = serde_json::to_vec(&stored)
            .map_err(|_| api_invalid_argument("Invalid Message Arguments"))?;
        payloads.push(Bytes::from(bytes));
    }

    let appended = state
        .broker
        .append(&topic.log_topic(), payloads)
        .await
        .map_err(|err| super::error::api_broker_failure("publish", &err))?;

    let count = appended.len() as u64;
    if let Err(err) = state
        .store
        .increment_daily(&project.uuid, &topic.name, Utc::now().date_naive(), count)
        .await
    {
        tracing::warn!(error = %err, topic = %topic.name, "daily counter increment failed");
    }
    metrics::counter!("hermes_messages_published_total").increment(count);

    Ok(json_ok(&PublishResponse {
        message_ids: appended
            .iter()
            .map(|record| record.offset.to_string())
            .collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/v1/projects/{project}/topics/{topic}:modAcl",
    tag = "topics",
    request_body = AclRequest,
    params(
        ("project" = String, Path, description = "Project name"),
        ("topic" = String, Path, description = "Topic name")
    ),
    responses(
        (status = 200, description = "ACL replaced"),
        (status = 404, description = "Unknown topic or user", body = super::error::ErrorResponse)
    )
)]
async fn modify_topic_acl(
    state: AppState,
    project_name: String,
    name: &str,
    query: HashMap<String, String>,
    headers: HeaderMap,
    body: BodyBytes,
) -> Result<Response, ApiError> {
    ensure_project_name(&project_name)?;
    ensure_topic_name(name)?;
    let user = caller(&state, &query, &headers).await?;
    let project = lookup_project(&state, &project_name).await?;
    auth::require_project_admin(&user, &project.uuid)?;
    lookup_topic(&state, &project.uuid, name).await?;

    let request: AclRequest = parse_required_body(&body, "Invalid ACL Arguments")?;
    set_acl_from_names(
        &state,
        &AclKey::new(project.uuid.clone(), AclKind::Topics, name),
        &request.authorized_users,
    )
    .await?;
    Ok(empty_ok())
}

#[utoipa::path(
    get,
    path = "/v1/projects/{project}/topics/{topic}/subscriptions",
    tag = "topics",
    params(
        ("project" = String, Path, description = "Project name"),
        ("topic" = String, Path, description = "Topic name")
    ),
    responses(
        (status = 200, description = "Subscriptions attached to the topic", body = TopicSubscriptionsResponse)
    )
)]
pub(crate) async fn list_topic_subscriptions(
    State(state): State<AppState>,
    Path((project_name, name)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    ensure_project_name(&project_name)?;
    ensure_topic_name(&name)?;
    let user = caller(&state, &query, &headers).await?;
    let project = lookup_project(&state, &project_name).await?;
    auth::require_publisher(
        state.store.as_ref(),
        state.config.per_resource_auth,
        &user,
        &project.uuid,
        &name,
    )
    .await?;
    let topic = lookup_topic(&state, &project.uuid, &name).await?;

    let subs = state
        .store
        .subs_for_topic(&TopicKey::new(project.uuid.clone(), topic.name.clone()))
        .await
        .map_err(|err| api_store_failure("subscriptions by topic", &err))?;
    Ok(json_ok(&TopicSubscriptionsResponse {
        subscriptions: subs
            .iter()
            .map(|sub| sub_path(&project.name, &sub.name))
            .collect(),
    }))
}

// Publish timestamps surface with nanosecond precision; the helper lives
// here so pull formatting in the subscriptions module matches publish-side
// expectations exactly.
pub(crate) fn publish_time(stamp: chrono::DateTime<Utc>) -> String {
    stamp.to_rfc3339_opts(SecondsFormat::Nanos, true)
}
