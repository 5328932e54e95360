//! Subscription handlers: CRUD, pull/acknowledge, push lifecycle, ACLs and
//! per-subscription metrics.
use super::error::{
    api_already_exists, api_conflict, api_forbidden, api_internal, api_invalid_argument,
    api_not_found, api_store_failure, api_timeout, ApiError,
};
use super::types::{
    render_subscription, AckRequest, AclRequest, AclResponse, MessageInfo, MessageResponse,
    ModifyAckDeadlineRequest, ModifyPushConfigRequest, ModifyPushStatusRequest, PullRequest,
    PushConfigRequest, ReceivedMessage, PullResponse, SubCreateRequest, StoredMessage,
    SubscriptionListResponse,
};
use super::{
    acl_user_names, caller, empty_ok, ensure_project_name, ensure_sub_name, json_ok,
    lookup_project, lookup_sub, lookup_topic, pagination, parse_body, parse_required_body,
    parse_ack_id, set_acl_from_names, split_verb, sub_path, topics::publish_time,
};
use crate::app::AppState;
use crate::auth;
use crate::model::{
    AclKey, AclKind, Project, PushState, RetryPolicy, ServiceRole, SubKey, Subscription, User,
    MAX_ACK_DEADLINE_SECONDS,
};
use crate::push::PushError;
use crate::store::{PullLease, StoreError};
use axum::body::Bytes as BodyBytes;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use chrono::{Duration, Utc};
use std::collections::HashMap;

/// Server-side cap on messages handed out by one pull.
const MAX_PULL_BATCH: u64 = 500;

const ACK_DEADLINE_MESSAGE: &str =
    "Invalid ackDeadlineSeconds(needs value between 0 and 600) Arguments";

fn is_valid_https(endpoint: &str) -> bool {
    if !endpoint.starts_with("https://") {
        return false;
    }
    match url::Url::parse(endpoint) {
        Ok(parsed) => parsed.scheme() == "https" && parsed.host_str().is_some(),
        Err(_) => false,
    }
}

/// Resolve the configured push-worker identity; without it no push
/// configuration may be persisted.
async fn resolve_push_worker(state: &AppState) -> Result<User, ApiError> {
    match state
        .store
        .user_by_token(&state.config.push_worker_token)
        .await
    {
        Ok(user) => Ok(user),
        Err(StoreError::NotFound(_)) => {
            Err(api_internal("Push functionality is currently unavailable"))
        }
        Err(err) => Err(api_store_failure("push worker lookup", &err)),
    }
}

fn retry_policy_from_request(request: &PushConfigRequest) -> RetryPolicy {
    RetryPolicy {
        kind: request
            .retry_policy
            .kind
            .clone()
            .unwrap_or_else(|| "linear".to_string()),
        period_ms: request.retry_policy.period.unwrap_or(RetryPolicy::default().period_ms),
    }
}

/// Parse a body topic reference (`projects/{p}/topics/{t}`); the embedded
/// project must match the request path.
fn parse_topic_ref(project_name: &str, raw: &str) -> Option<String> {
    let raw = raw.strip_prefix('/').unwrap_or(raw);
    let rest = raw.strip_prefix("projects/")?;
    let (embedded, rest) = rest.split_once('/')?;
    if embedded != project_name {
        return None;
    }
    let topic = rest.strip_prefix("topics/")?;
    if topic.is_empty() || topic.contains('/') {
        return None;
    }
    Some(topic.to_string())
}

#[utoipa::path(
    get,
    path = "/v1/projects/{project}/subscriptions",
    tag = "subscriptions",
    params(
        ("project" = String, Path, description = "Project name"),
        ("pageSize" = Option<u64>, Query, description = "Page size"),
        ("pageToken" = Option<String>, Query, description = "Listing cursor")
    ),
    responses(
        (status = 200, description = "Subscriptions visible to the caller, newest first", body = SubscriptionListResponse)
    )
)]
pub(crate) async fn list_subscriptions(
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
        return Err(api_forbidden());
    }

    let subs = state
        .store
        .list_subs(&project.uuid)
        .await
        .map_err(|err| api_store_failure("list subscriptions", &err))?;
    // Visibility filtering happens before pagination so totalSize reflects
    // what the caller can actually see.
    let visible = filter_visible_subs(&state, &user, &project.uuid, subs).await?;
    let page = pagination::paginate(&visible, params)?;

    Ok(json_ok(&SubscriptionListResponse {
        subscriptions: page
            .items
            .iter()
            .map(|sub| render_subscription(&project.name, sub))
            .collect(),
        next_page_token: page.next_page_token,
        total_size: page.total_size,
    }))
}

async fn filter_visible_subs(
    state: &AppState,
    user: &User,
    project_uuid: &str,
    subs: Vec<Subscription>,
) -> Result<Vec<Subscription>, ApiError> {
    if auth::is_project_admin(user, project_uuid) {
        return Ok(subs);
    }
    let mut visible = Vec::with_capacity(subs.len());
    for sub in subs {
        let acl = state
            .store
            .acl(&AclKey::new(
                project_uuid,
                AclKind::Subscriptions,
                sub.name.clone(),
            ))
            .await
            .map_err(|err| api_store_failure("subscription acl", &err))?;
        if acl.iter().any(|uuid| *uuid == user.uuid) {
            visible.push(sub);
        }
    }
    Ok(visible)
}

/// GET dispatch: `{sub}` fetches, `{sub}:metrics` aggregates, `{sub}:acl`
/// lists authorized users.
pub(crate) async fn get_sub_or_verb(
    State(state): State<AppState>,
    Path((project_name, raw)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    match split_verb(&raw) {
        (name, Some("metrics")) => sub_metrics(state, project_name, name, query, headers).await,
        (name, Some("acl")) => sub_acl(state, project_name, name, query, headers).await,
        _ => get_sub(state, project_name, &raw, query, headers).await,
    }
}

#[utoipa::path(
    get,
    path = "/v1/projects/{project}/subscriptions/{subscription}",
    tag = "subscriptions",
    params(
        ("project" = String, Path, description = "Project name"),
        ("subscription" = String, Path, description = "Subscription name")
    ),
    responses(
        (status = 200, description = "One subscription", body = super::types::SubscriptionInfo),
        (status = 404, description = "Unknown subscription", body = super::error::ErrorResponse)
    )
)]
async fn get_sub(
    state: AppState,
    project_name: String,
    raw_name: &str,
    query: HashMap<String, String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    ensure_project_name(&project_name)?;
    ensure_sub_name(raw_name)?;
    let user = caller(&state, &query, &headers).await?;
    let project = lookup_project(&state, &project_name).await?;
    let sub = lookup_sub(&state, &project.uuid, raw_name).await?;
    auth::require_consumer(
        state.store.as_ref(),
        state.config.per_resource_auth,
        &user,
        &sub,
        false,
    )
    .await?;
    Ok(json_ok(&render_subscription(&project.name, &sub)))
}

#[utoipa::path(
    get,
    path = "/v1/projects/{project}/subscriptions/{subscription}:metrics",
    tag = "subscriptions",
    params(
        ("project" = String, Path, description = "Project name"),
        ("subscription" = String, Path, description = "Subscription name")
    ),
    responses(
        (status = 200, description = "Subscription metrics", body = crate::metrics::MetricList),
        (status = 404, description = "Unknown subscription", body = super::error::ErrorResponse)
    )
)]
async fn sub_metrics(
    state: AppState,
    project_name: String,
    name: &str,
    query: HashMap<String, String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    ensure_project_name(&project_name)?;
    ensure_sub_name(name)?;
    let user = caller(&state, &query, &headers).await?;
    let project = lookup_project(&state, &project_name).await?;
    let sub = lookup_sub(&state, &project.uuid, name).await?;
    auth::require_consumer(
        state.store.as_ref(),
        state.config.per_resource_auth,
        &user,
        &sub,
        false,
    )
    .await?;
    Ok(json_ok(&crate::metrics::sub_metrics(&sub)))
}

#[utoipa::path(
    get,
    path = "/v1/projects/{project}/subscriptions/{subscription}:acl",
    tag = "subscriptions",
    params(
        ("project" = String, Path, description = "Project name"),
        ("subscription" = String, Path, description = "Subscription name")
    ),
    responses(
        (status = 200, description = "Authorized users in ACL order", body = AclResponse)
    )
)]
async fn sub_acl(
    state: AppState,
    project_name: String,
    name: &str,
    query: HashMap<String, String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    ensure_project_name(&project_name)?;
    ensure_sub_name(name)?;
    let user = caller(&state, &query, &headers).await?;
    let project = lookup_project(&state, &project_name).await?;
    auth::require_project_admin(&user, &project.uuid)?;
    lookup_sub(&state, &project.uuid, name).await?;
    let names = acl_user_names(
        &state,
        &AclKey::new(project.uuid.clone(), AclKind::Subscriptions, name),
    )
    .await?;
    Ok(json_ok(&AclResponse {
        authorized_users: names,
    }))
}

#[utoipa::path(
    put,
    path = "/v1/projects/{project}/subscriptions/{subscription}",
    tag = "subscriptions",
    request_body = SubCreateRequest,
    params(
        ("project" = String, Path, description = "Project name"),
        ("subscription" = String, Path, description = "Subscription name")
    ),
    responses(
        (status = 200, description = "Subscription created", body = super::types::SubscriptionInfo),
        (status = 404, description = "Unknown topic", body = super::error::ErrorResponse),
        (status = 409, description = "Name taken or push disabled", body = super::error::ErrorResponse)
    )
)]
pub(crate) async fn create_subscription(
    State(state): State<AppState>,
    Path((project_name, name)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: BodyBytes,
) -> Result<Response, ApiError> {
    ensure_project_name(&project_name)?;
    ensure_sub_name(&name)?;
    let user = caller(&state, &query, &headers).await?;
    let project = lookup_project(&state, &project_name).await?;
    auth::require_project_admin(&user, &project.uuid)?;

    let request: SubCreateRequest = parse_required_body(&body, "Invalid Subscription Arguments")?;
    if request.topic.is_empty() {
        return Err(api_invalid_argument("Invalid Subscription Arguments"));
    }
    let topic_name = parse_topic_ref(&project.name, &request.topic)
        .ok_or_else(|| api_not_found("Topic doesn't exist"))?;
    lookup_topic(&state, &project.uuid, &topic_name).await?;

    let mut sub = Subscription::new(project.uuid.clone(), name.clone(), topic_name);
    if let Some(seconds) = request.ack_deadline_seconds {
        if !(0..=i64::from(MAX_ACK_DEADLINE_SECONDS)).contains(&seconds) {
            return Err(api_invalid_argument(ACK_DEADLINE_MESSAGE));
        }
        sub.ack_deadline_seconds = seconds as u32;
    }

    let push_request = request
        .push_config
        .filter(|config| !config.push_endpoint.is_empty());

    match push_request {
        None => {
            let created = insert_sub(&state, sub).await?;
            Ok(json_ok(&render_subscription(&project.name, &created)))
        }
        Some(config) => {
            // All push preconditions run before the row is persisted: a
            // failed activation must leave no subscription behind.
            if !is_valid_https(&config.push_endpoint) {
                return Err(api_invalid_argument(
                    "Push endpoint should be addressed by a valid https url",
                ));
            }
            if !state.config.push_enabled {
                return Err(api_conflict("Push functionality is currently disabled"));
            }
            let worker = resolve_push_worker(&state).await?;

            sub.push = Some(PushState {
                endpoint: config.push_endpoint.clone(),
                retry: retry_policy_from_request(&config),
            });
            let path = sub_path(&project.name, &name);
            let created = insert_sub(&state, sub).await?;
            state
                .store
                .append_to_acl(
                    &AclKey::new(project.uuid.clone(), AclKind::Subscriptions, name.clone()),
                    &worker.uuid,
                )
                .await
                .map_err(|err| api_store_failure("acl append", &err))?;

            let retry = retry_policy_from_request(&config);
            let status = match state
                .push_client
                .activate(&path, &config.push_endpoint, retry.period_ms)
                .await
            {
                Ok(()) => format!("Subscription {path} activated"),
                Err(PushError::AlreadyActive) => {
                    format!("Subscription {path} is already active")
                }
                Err(err) => {
                    // Roll back: a subscription with a push block that the
                    // remote never accepted must not exist.
                    tracing::error!(error = %err, subscription = %path, "push activation failed");
                    let _ = state
                        .store
                        .remove_sub(&SubKey::new(project.uuid.clone(), name.clone()))
                        .await;
                    return Err(api_internal("Push functionality is currently unavailable"));
                }
            };

            let updated = state
                .store
                .update_sub_push_status(&SubKey::new(project.uuid.clone(), name.clone()), status)
                .await
                .map_err(|err| api_store_failure("push status update", &err))?;
            state.push_manager.add(updated.clone()).await;
            Ok(json_ok(&render_subscription(&project.name, &updated)))
        }
    }
}

async fn insert_sub(state: &AppState, sub: Subscription) -> Result<Subscription, ApiError> {
    match state.store.insert_sub(sub).await {
        Ok(created) => Ok(created),
        Err(StoreError::Conflict(_)) => Err(api_already_exists("Subscription already exists")),
        Err(err) => Err(api_store_failure("create subscription", &err)),
    }
}

#[utoipa::path(
    delete,
    path = "/v1/projects/{project}/subscriptions/{subscription}",
    tag = "subscriptions",
    params(
        ("project" = String, Path, description = "Project name"),
        ("subscription" = String, Path, description = "Subscription name")
    ),
    responses(
        (status = 200, description = "Subscription deleted; push subscriptions report the deactivation"),
        (status = 404, description = "Unknown subscription", body = super::error::ErrorResponse)
    )
)]
pub(crate) async fn delete_subscription(
    State(state): State<AppState>,
    Path((project_name, name)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    ensure_project_name(&project_name)?;
    ensure_sub_name(&name)?;
    let user = caller(&state, &query, &headers).await?;
    let project = lookup_project(&state, &project_name).await?;
    auth::require_project_admin(&user, &project.uuid)?;
    let sub = lookup_sub(&state, &project.uuid, &name).await?;

    let deactivation = if sub.push.is_some() {
        Some(deactivate_remote(&state, &project, &sub).await)
    } else {
        None
    };

    match state
        .store
        .remove_sub(&SubKey::new(project.uuid.clone(), name))
        .await
    {
        Ok(()) => {}
        Err(StoreError::NotFound(_)) => {
            return Err(api_not_found("Subscription doesn't exist"))
        }
        Err(err) => return Err(api_store_failure("delete subscription", &err)),
    }

    match deactivation {
        Some(message) => Ok(json_ok(&MessageResponse { message })),
        None => Ok(empty_ok()),
    }
}

/// Tell the remote to stop pushing, stop the local worker and drop the push
/// worker's ACL entry. Remote failures only shape the status text;
/// deactivation itself always proceeds.
async fn deactivate_remote(state: &AppState, project: &Project, sub: &Subscription) -> String {
    let path = sub_path(&project.name, &sub.name);
    let message = match state.push_client.deactivate(&path).await {
        Ok(()) => format!("Subscription {path} deactivated"),
        Err(PushError::NotActive) => format!("Subscription {path} is not active"),
        Err(err) => {
            tracing::warn!(error = %err, subscription = %path, "push deactivation failed");
            format!("Subscription {path} deactivated")
        }
    };
    state.push_manager.remove(sub.key()).await;

    // Best effort: without a resolvable worker identity the ACL entry stays.
    if let Ok(worker) = state
        .store
        .user_by_token(&state.config.push_worker_token)
        .await
    {
        let _ = state
            .store
            .remove_from_acl(
                &AclKey::new(
                    project.uuid.clone(),
                    AclKind::Subscriptions,
                    sub.name.clone(),
                ),
                &worker.uuid,
            )
            .await;
    }
    message
}

/// POST dispatch for the subscription operation verbs.
pub(crate) async fn post_sub_verb(
    State(state): State<AppState>,
    Path((project_name, raw)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: BodyBytes,
) -> Result<Response, ApiError> {
    match split_verb(&raw) {
        (name, Some("pull")) => pull(state, project_name, name, query, headers, body).await,
        (name, Some("acknowledge")) => {
            acknowledge(state, project_name, name, query, headers, body).await
        }
        (name, Some("modifyAckDeadline")) => {
            modify_ack_deadline(state, project_name, name, query, headers, body).await
        }
        (name, Some("modifyPushConfig")) => {
            modify_push_config(state, project_name, name, query, headers, body).await
        }
        (name, Some("modifyPushStatus")) => {
            modify_push_status(state, project_name, name, query, headers, body).await
        }
        (name, Some("modAcl")) => {
            modify_sub_acl(state, project_name, name, query, headers, body).await
        }
        _ => Err(api_not_found("Not Found")),
    }
}

#[utoipa::path(
    post,
    path = "/v1/projects/{project}/subscriptions/{subscription}:pull",
    tag = "subscriptions",
    request_body = PullRequest,
    params(
        ("project" = String, Path, description = "Project name"),
        ("subscription" = String, Path, description = "Subscription name")
    ),
    responses(
        (status = 200, description = "Messages from the cursor onward", body = PullResponse),
        (status = 409, description = "Backing topic was deleted", body = super::error::ErrorResponse)
    )
)]
async fn pull(
    state: AppState,
    project_name: String,
    name: &str,
    query: HashMap<String, String>,
    headers: HeaderMap,
    body: BodyBytes,
) -> Result<Response, ApiError> {
    ensure_project_name(&project_name)?;
    ensure_sub_name(name)?;
    let user = caller(&state, &query, &headers).await?;
    let project = lookup_project(&state, &project_name).await?;
    let sub = lookup_sub(&state, &project.uuid, name).await?;
    auth::require_consumer(
        state.store.as_ref(),
        state.config.per_resource_auth,
        &user,
        &sub,
        true,
    )
    .await?;

    // A subscription may outlive its topic; consuming one is a conflict.
    if state
        .store
        .topic(&crate::model::TopicKey::new(project.uuid.clone(), sub.topic.clone()))
        .await
        .is_err()
    {
        return Err(api_conflict("Subscription's topic doesn't exist"));
    }

    let request: PullRequest = parse_body(&body, "Invalid Pull Arguments")?;
    let max = request
        .max_messages
        .unwrap_or(MAX_PULL_BATCH)
        .min(MAX_PULL_BATCH) as usize;

    let key = SubKey::new(project.uuid.clone(), name.to_string());
    let leased = match state
        .store
        .begin_pull(&key, Utc::now())
        .await
        .map_err(|err| api_store_failure("pull lease", &err))?
    {
        PullLease::Acquired(sub) => sub,
        // Another consumer owns the outstanding batch; hand back nothing
        // rather than double-deliver.
        PullLease::Held => {
            return Ok(json_ok(&PullResponse {
                received_messages: Vec::new(),
            }))
        }
    };

    let log_topic = format!("{}.{}", project.uuid, leased.topic);
    let records = state
        .broker
        .read(&log_topic, leased.next_offset, max)
        .await
        .map_err(|err| super::error::api_broker_failure("pull", &err))?;

    if records.is_empty() {
        state
            .store
            .abort_pull(&key)
            .await
            .map_err(|err| api_store_failure("pull abort", &err))?;
        return Ok(json_ok(&PullResponse {
            received_messages: Vec::new(),
        }));
    }

    let mut received = Vec::with_capacity(records.len());
    let mut bytes = 0u64;
    for record in &records {
        bytes += record.payload.len() as u64;
        // Log payloads are the service's own serialization; anything else in
        // there renders as an empty message rather than poisoning the batch.
        let stored: StoredMessage =
            serde_json::from_slice(&record.payload).unwrap_or_default();
        received.push(ReceivedMessage {
            ack_id: format!(
                "projects/{}/subscriptions/{}:{}",
                project.name, name, record.offset
            ),
            message: MessageInfo {
                message_id: record.offset.to_string(),
                attributes: stored.attributes,
                data: stored.data,
                publish_time: publish_time(record.published),
            },
        });
    }

    let last_offset = records.last().expect("non-empty batch").offset;
    state
        .store
        .commit_pull(&key, last_offset + 1, bytes)
        .await
        .map_err(|err| api_store_failure("pull commit", &err))?;
    metrics::counter!("hermes_messages_pulled_total").increment(received.len() as u64);

    Ok(json_ok(&PullResponse {
        received_messages: received,
    }))
}

#[utoipa::path(
    post,
    path = "/v1/projects/{project}/subscriptions/{subscription}:acknowledge",
    tag = "subscriptions",
    request_body = AckRequest,
    params(
        ("project" = String, Path, description = "Project name"),
        ("subscription" = String, Path, description = "Subscription name")
    ),
    responses(
        (status = 200, description = "Batch acknowledged"),
        (status = 400, description = "Malformed ack id", body = super::error::ErrorResponse),
        (status = 408, description = "Ack deadline passed", body = super::error::ErrorResponse)
    )
)]
async fn acknowledge(
    state: AppState,
    project_name: String,
    name: &str,
    query: HashMap<String, String>,
    headers: HeaderMap,
    body: BodyBytes,
) -> Result<Response, ApiError> {
    ensure_project_name(&project_name)?;
    ensure_sub_name(name)?;
    let user = caller(&state, &query, &headers).await?;
    let project = lookup_project(&state, &project_name).await?;
    let sub = lookup_sub(&state, &project.uuid, name).await?;
    auth::require_consumer(
        state.store.as_ref(),
        state.config.per_resource_auth,
        &user,
        &sub,
        false,
    )
    .await?;

    let request: AckRequest = parse_required_body(&body, "Invalid ack id")?;
    if request.ack_ids.is_empty() {
        return Err(api_invalid_argument("Invalid ack id"));
    }

    // Every id must name this subscription and an offset inside the
    // outstanding batch; one bad id fails the call.
    let mut max_offset = 0u64;
    for ack_id in &request.ack_ids {
        let offset = parse_ack_id(&project.name, name, ack_id)
            .filter(|offset| *offset < sub.next_offset)
            .ok_or_else(|| api_invalid_argument("Invalid ack id"))?;
        max_offset = max_offset.max(offset);
    }

    let leased_at = sub.pending_ack.ok_or_else(|| api_timeout("ack timeout"))?;
    let deadline = Duration::seconds(i64::from(sub.ack_deadline_seconds));
    if Utc::now() - leased_at > deadline {
        return Err(api_timeout("ack timeout"));
    }

    // Partial acks are accepted without error; only acknowledging the end of
    // the batch releases the lease.
    if max_offset + 1 == sub.next_offset {
        state
            .store
            .clear_pending_ack(&SubKey::new(project.uuid.clone(), name.to_string()))
            .await
            .map_err(|err| api_store_failure("ack", &err))?;
    }
    Ok(json_ok(&serde_json::json!({})))
}

#[utoipa::path(
    post,
    path = "/v1/projects/{project}/subscriptions/{subscription}:modifyAckDeadline",
    tag = "subscriptions",
    request_body = ModifyAckDeadlineRequest,
    params(
        ("project" = String, Path, description = "Project name"),
        ("subscription" = String, Path, description = "Subscription name")
    ),
    responses(
        (status = 200, description = "Deadline updated"),
        (status = 400, description = "Deadline outside 0..600", body = super::error::ErrorResponse)
    )
)]
async fn modify_ack_deadline(
    state: AppState,
    project_name: String,
    name: &str,
    query: HashMap<String, String>,
    headers: HeaderMap,
    body: BodyBytes,
) -> Result<Response, ApiError> {
    ensure_project_name(&project_name)?;
    ensure_sub_name(name)?;
    let user = caller(&state, &query, &headers).await?;
    let project = lookup_project(&state, &project_name).await?;
    let sub = lookup_sub(&state, &project.uuid, name).await?;
    auth::require_consumer(
        state.store.as_ref(),
        state.config.per_resource_auth,
        &user,
        &sub,
        false,
    )
    .await?;

    let request: ModifyAckDeadlineRequest = parse_required_body(&body, ACK_DEADLINE_MESSAGE)?;
    let seconds = request
        .ack_deadline_seconds
        .filter(|seconds| (0..=i64::from(MAX_ACK_DEADLINE_SECONDS)).contains(seconds))
        .ok_or_else(|| api_invalid_argument(ACK_DEADLINE_MESSAGE))?;

    state
        .store
        .update_sub_ack_deadline(
            &SubKey::new(project.uuid.clone(), name.to_string()),
            seconds as u32,
        )
        .await
        .map_err(|err| api_store_failure("ack deadline update", &err))?;
    Ok(empty_ok())
}

#[utoipa::path(
    post,
    path = "/v1/projects/{project}/subscriptions/{subscription}:modifyPushConfig",
    tag = "subscriptions",
    request_body = ModifyPushConfigRequest,
    params(
        ("project" = String, Path, description = "Project name"),
        ("subscription" = String, Path, description = "Subscription name")
    ),
    responses(
        (status = 200, description = "Push configuration applied"),
        (status = 400, description = "Endpoint is not a valid https url", body = super::error::ErrorResponse),
        (status = 409, description = "Push disabled", body = super::error::ErrorResponse)
    )
)]
async fn modify_push_config(
    state: AppState,
    project_name: String,
    name: &str,
    query: HashMap<String, String>,
    headers: HeaderMap,
    body: BodyBytes,
) -> Result<Response, ApiError> {
    ensure_project_name(&project_name)?;
    ensure_sub_name(name)?;
    let user = caller(&state, &query, &headers).await?;
    let project = lookup_project(&state, &project_name).await?;
    let sub = lookup_sub(&state, &project.uuid, name).await?;
    auth::require_project_admin(&user, &project.uuid)?;

    let request: ModifyPushConfigRequest =
        parse_required_body(&body, "Invalid Subscription Arguments")?;
    let config = request.push_config;
    let key = SubKey::new(project.uuid.clone(), name.to_string());
    let path = sub_path(&project.name, name);

    if config.push_endpoint.is_empty() {
        // Switching to pull is always permitted; remote errors and a missing
        // push-worker identity only degrade the cleanup.
        let message = deactivate_remote(&state, &project, &sub).await;
        state
            .store
            .update_sub_push(&key, None, message)
            .await
            .map_err(|err| api_store_failure("push config update", &err))?;
        return Ok(empty_ok());
    }

    if !is_valid_https(&config.push_endpoint) {
        return Err(api_invalid_argument(
            "Push endpoint should be addressed by a valid https url",
        ));
    }
    if !state.config.push_enabled {
        return Err(api_conflict("Push functionality is currently disabled"));
    }
    let worker = resolve_push_worker(&state).await?;

    let retry = retry_policy_from_request(&config);
    let status = match state
        .push_client
        .activate(&path, &config.push_endpoint, retry.period_ms)
        .await
    {
        Ok(()) => format!("Success: Subscription {path} activated"),
        Err(PushError::AlreadyActive) => format!("Subscription {path} is already active"),
        Err(err) => {
            tracing::error!(error = %err, subscription = %path, "push activation failed");
            return Err(api_internal("Push functionality is currently unavailable"));
        }
    };

    let updated = state
        .store
        .update_sub_push(
            &key,
            Some(PushState {
                endpoint: config.push_endpoint.clone(),
                retry,
            }),
            status,
        )
        .await
        .map_err(|err| api_store_failure("push config update", &err))?;
    state
        .store
        .append_to_acl(
            &AclKey::new(project.uuid.clone(), AclKind::Subscriptions, name),
            &worker.uuid,
        )
        .await
        .map_err(|err| api_store_failure("acl append", &err))?;
    state.push_manager.add(updated).await;
    Ok(empty_ok())
}

#[utoipa::path(
    post,
    path = "/v1/projects/{project}/subscriptions/{subscription}:modifyPushStatus",
    tag = "subscriptions",
    request_body = ModifyPushStatusRequest,
    params(
        ("project" = String, Path, description = "Project name"),
        ("subscription" = String, Path, description = "Subscription name")
    ),
    responses(
        (status = 200, description = "Status text replaced"),
        (status = 400, description = "Missing string field", body = super::error::ErrorResponse),
        (status = 404, description = "Unknown subscription", body = super::error::ErrorResponse)
    )
)]
async fn modify_push_status(
    state: AppState,
    project_name: String,
    name: &str,
    query: HashMap<String, String>,
    headers: HeaderMap,
    body: BodyBytes,
) -> Result<Response, ApiError> {
    ensure_project_name(&project_name)?;
    ensure_sub_name(name)?;
    let user = caller(&state, &query, &headers).await?;
    // Body shape is validated before resource existence, so a malformed
    // payload on an unknown subscription reports the payload problem.
    let request: ModifyPushStatusRequest =
        parse_required_body(&body, "Invalid PushStatus Arguments")?;
    let project = lookup_project(&state, &project_name).await?;
    let sub = lookup_sub(&state, &project.uuid, name).await?;
    if !(auth::is_project_admin(&user, &project.uuid)
        || user.has_service_role(ServiceRole::PushWorker))
    {
        return Err(api_forbidden());
    }

    state
        .store
        .update_sub_push_status(&sub.key(), request.push_status)
        .await
        .map_err(|err| api_store_failure("push status update", &err))?;
    Ok(empty_ok())
}

#[utoipa::path(
    post,
    path = "/v1/projects/{project}/subscriptions/{subscription}:modAcl",
    tag = "subscriptions",
    request_body = AclRequest,
    params(
        ("project" = String, Path, description = "Project name"),
        ("subscription" = String, Path, description = "Subscription name")
    ),
    responses(
        (status = 200, description = "ACL replaced"),
        (status = 404, description = "Unknown subscription or user", body = super::error::ErrorResponse)
    )
)]
async fn modify_sub_acl(
    state: AppState,
    project_name: String,
    name: &str,
    query: HashMap<String, String>,
    headers: HeaderMap,
    body: BodyBytes,
) -> Result<Response, ApiError> {
    ensure_project_name(&project_name)?;
    ensure_sub_name(name)?;
    let user = caller(&state, &query, &headers).await?;
    let project = lookup_project(&state, &project_name).await?;
    auth::require_project_admin(&user, &project.uuid)?;
    lookup_sub(&state, &project.uuid, name).await?;

    let request: AclRequest = parse_required_body(&body, "Invalid ACL Arguments")?;
    set_acl_from_names(
        &state,
        &AclKey::new(project.uuid.clone(), AclKind::Subscriptions, name),
        &request.authorized_users,
    )
    .await?;
    Ok(empty_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn https_endpoint_validation() {
        assert!(!is_valid_https("ht"));
        assert!(!is_valid_https("www.example.com"));
        assert!(!is_valid_https("https:www.example.com"));
        assert!(!is_valid_https("http://www.example.com"));
        assert!(is_valid_https("https://www.example.com"));
    }

    #[test]
    fn topic_references_must_match_the_project() {
        assert_eq!(
            parse_topic_ref("ARGO", "projects/ARGO/topics/topic1"),
            Some("topic1".to_string())
        );
        assert_eq!(
            parse_topic_ref("ARGO", "/projects/ARGO/topics/topic1"),
            Some("topic1".to_string())
        );
        assert_eq!(parse_topic_ref("ARGO", "projects/OTHER/topics/topic1"), None);
        assert_eq!(parse_topic_ref("ARGO", "topics/topic1"), None);
        assert_eq!(parse_topic_ref("ARGO", "projects/ARGO/topics/"), None);
        assert_eq!(parse_topic_ref("ARGO", "projects/ARGO/topics/a/b"), None);
    }
}
