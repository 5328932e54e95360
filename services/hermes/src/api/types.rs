//! Wire-shaped request and response types.
//!
//! # Purpose
//! The JSON surface differs from the storage model: resources are addressed
//! by fully qualified paths, optional blocks collapse to empty objects, and
//! users carry ACL-derived topic/subscription lists. All conversions from
//! model records happen here.
use super::{sub_path, topic_path};
use crate::model::{
    AclKey, AclKind, Project, ProjectRole, PushState, ServiceRole, Subscription, User,
};
use crate::store::{MetadataStore, StoreResult};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

fn stamp(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

// ---------------------------------------------------------------------------
// Users

#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct UserProjectInfo {
    pub project: String,
    pub roles: Vec<ProjectRole>,
    pub topics: Vec<String>,
    pub subscriptions: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct UserInfo {
    pub uuid: String,
    pub projects: Vec<UserProjectInfo>,
    pub name: String,
    pub token: String,
    pub email: String,
    pub service_roles: Vec<ServiceRole>,
    pub created_on: String,
    pub modified_on: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserListResponse {
    pub users: Vec<UserInfo>,
    #[serde(rename = "nextPageToken")]
    pub next_page_token: String,
    #[serde(rename = "totalSize")]
    pub total_size: usize,
}

#[derive(Debug, Deserialize, Default, ToSchema)]
pub struct UserProjectRequest {
    pub project_uuid: String,
    #[serde(default)]
    pub roles: Vec<ProjectRole>,
}

#[derive(Debug, Deserialize, Default, ToSchema)]
pub struct UserCreateRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub projects: Vec<UserProjectRequest>,
    #[serde(default)]
    pub service_roles: Vec<ServiceRole>,
}

#[derive(Debug, Deserialize, Default, ToSchema)]
pub struct UserUpdateRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub projects: Option<Vec<UserProjectRequest>>,
    pub service_roles: Option<Vec<ServiceRole>>,
}

/// Render a user the way the API reports it: membership project names
/// resolved, per-project topic/subscription lists derived from ACLs, and
/// `created_by` resolved to the creator's name.
pub async fn render_user(store: &dyn MetadataStore, user: &User) -> StoreResult<UserInfo> {
    let mut projects = Vec::with_capacity(user.projects.len());
    for membership in &user.projects {
        let project = match store.project_by_uuid(&membership.project_uuid).await {
            Ok(project) => project,
            // Stale membership after a project delete renders as absent.
            Err(crate::store::StoreError::NotFound(_)) => continue,
            Err(err) => return Err(err),
        };

        let mut topics = Vec::new();
        for topic in store.list_topics(&project.uuid).await? {
            let acl = store
                .acl(&AclKey::new(project.uuid.clone(), AclKind::Topics, topic.name.clone()))
                .await?;
            if acl.iter().any(|uuid| *uuid == user.uuid) {
                topics.push(topic.name);
            }
        }
        let mut subscriptions = Vec::new();
        for sub in store.list_subs(&project.uuid).await? {
            let acl = store
                .acl(&AclKey::new(
                    project.uuid.clone(),
                    AclKind::Subscriptions,
                    sub.name.clone(),
                ))
                .await?;
            if acl.iter().any(|uuid| *uuid == user.uuid) {
                subscriptions.push(sub.name);
            }
        }

        projects.push(UserProjectInfo {
            project: project.name,
            roles: membership.roles.clone(),
            topics,
            subscriptions,
        });
    }

    let created_by = match &user.created_by {
        Some(uuid) => resolve_user_name(store, uuid).await?,
        None => None,
    };

    Ok(UserInfo {
        uuid: user.uuid.clone(),
        projects,
        name: user.name.clone(),
        token: user.token.clone(),
        email: user.email.clone(),
        service_roles: user.service_roles.clone(),
        created_on: stamp(user.created_on),
        modified_on: stamp(user.modified_on),
        created_by,
    })
}

pub async fn resolve_user_name(
    store: &dyn MetadataStore,
    uuid: &str,
) -> StoreResult<Option<String>> {
    Ok(store
        .users_by_uuid(uuid)
        .await?
        .into_iter()
        .next()
        .map(|user| user.name))
}

// ---------------------------------------------------------------------------
// Projects

#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct ProjectInfo {
    pub name: String,
    pub created_on: String,
    pub modified_on: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    pub description: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProjectListResponse {
    pub projects: Vec<ProjectInfo>,
}

#[derive(Debug, Deserialize, Default, ToSchema)]
pub struct ProjectCreateRequest {
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize, Default, ToSchema)]
pub struct ProjectUpdateRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

pub async fn render_project(
    store: &dyn MetadataStore,
    project: &Project,
) -> StoreResult<ProjectInfo> {
    let created_by = match &project.created_by {
        Some(uuid) => resolve_user_name(store, uuid).await?,
        None => None,
    };
    Ok(ProjectInfo {
        name: project.name.clone(),
        created_on: stamp(project.created_on),
        modified_on: stamp(project.modified_on),
        created_by,
        description: project.description.clone(),
    })
}

// ---------------------------------------------------------------------------
// Topics

#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct TopicInfo {
    pub name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TopicListResponse {
    pub topics: Vec<TopicInfo>,
    #[serde(rename = "nextPageToken")]
    pub next_page_token: String,
    #[serde(rename = "totalSize")]
    pub total_size: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TopicSubscriptionsResponse {
    pub subscriptions: Vec<String>,
}

pub fn render_topic(project_name: &str, topic_name: &str) -> TopicInfo {
    TopicInfo {
        name: topic_path(project_name, topic_name),
    }
}

// ---------------------------------------------------------------------------
// Subscriptions

#[derive(Debug, Serialize, Default, ToSchema, Clone)]
pub struct RetryPolicyInfo {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<u32>,
}

#[derive(Debug, Serialize, Default, ToSchema, Clone)]
pub struct PushConfigInfo {
    #[serde(rename = "pushEndpoint")]
    pub push_endpoint: String,
    #[serde(rename = "retryPolicy")]
    pub retry_policy: RetryPolicyInfo,
}

#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct SubscriptionInfo {
    pub name: String,
    pub topic: String,
    #[serde(rename = "pushConfig")]
    pub push_config: PushConfigInfo,
    #[serde(rename = "ackDeadlineSeconds")]
    pub ack_deadline_seconds: u32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub push_status: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SubscriptionListResponse {
    pub subscriptions: Vec<SubscriptionInfo>,
    #[serde(rename = "nextPageToken")]
    pub next_page_token: String,
    #[serde(rename = "totalSize")]
    pub total_size: usize,
}

#[derive(Debug, Deserialize, Default, ToSchema)]
pub struct RetryPolicyRequest {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub period: Option<u32>,
}

#[derive(Debug, Deserialize, Default, ToSchema)]
pub struct PushConfigRequest {
    #[serde(rename = "pushEndpoint", default)]
    pub push_endpoint: String,
    #[serde(rename = "retryPolicy", default)]
    pub retry_policy: RetryPolicyRequest,
}

#[derive(Debug, Deserialize, Default, ToSchema)]
pub struct SubCreateRequest {
    #[serde(default)]
    pub topic: String,
    #[serde(rename = "pushConfig")]
    pub push_config: Option<PushConfigRequest>,
    #[serde(rename = "ackDeadlineSeconds")]
    pub ack_deadline_seconds: Option<i64>,
}

#[derive(Debug, Deserialize, Default, ToSchema)]
pub struct ModifyPushConfigRequest {
    #[serde(rename = "pushConfig", default)]
    pub push_config: PushConfigRequest,
}

#[derive(Debug, Deserialize, Default, ToSchema)]
pub struct ModifyAckDeadlineRequest {
    #[serde(rename = "ackDeadlineSeconds")]
    pub ack_deadline_seconds: Option<i64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ModifyPushStatusRequest {
    pub push_status: String,
}

#[derive(Debug, Deserialize, Default, ToSchema)]
pub struct AclRequest {
    pub authorized_users: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AclResponse {
    pub authorized_users: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

pub fn render_subscription(project_name: &str, sub: &Subscription) -> SubscriptionInfo {
    let push_config = match &sub.push {
        Some(PushState { endpoint, retry }) => PushConfigInfo {
            push_endpoint: endpoint.clone(),
            retry_policy: RetryPolicyInfo {
                kind: Some(retry.kind.clone()),
                period: Some(retry.period_ms),
            },
        },
        None => PushConfigInfo::default(),
    };
    SubscriptionInfo {
        name: sub_path(project_name, &sub.name),
        topic: topic_path(project_name, &sub.topic),
        push_config,
        ack_deadline_seconds: sub.ack_deadline_seconds,
        push_status: sub.push_status.clone(),
    }
}

// ---------------------------------------------------------------------------
// Publish / pull / acknowledge

/// Payload format stored in the commit log: one JSON document per message.
/// Attributes use a BTreeMap so stored bytes and rendered output are
/// deterministic.
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct StoredMessage {
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub data: String,
}

#[derive(Debug, Deserialize, Default, ToSchema)]
pub struct PublishRequest {
    #[serde(default)]
    pub messages: Vec<PublishMessage>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PublishMessage {
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub data: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PublishResponse {
    #[serde(rename = "messageIds")]
    pub message_ids: Vec<String>,
}

#[derive(Debug, Deserialize, Default, ToSchema)]
pub struct PullRequest {
    #[serde(
        rename = "maxMessages",
        default,
        deserialize_with = "string_or_u64"
    )]
    pub max_messages: Option<u64>,
    #[serde(
        rename = "returnImmediately",
        default,
        deserialize_with = "string_or_bool"
    )]
    pub return_immediately: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageInfo {
    #[serde(rename = "messageId")]
    pub message_id: String,
    pub attributes: BTreeMap<String, String>,
    pub data: String,
    #[serde(rename = "publishTime")]
    pub publish_time: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReceivedMessage {
    #[serde(rename = "ackId")]
    pub ack_id: String,
    pub message: MessageInfo,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PullResponse {
    #[serde(rename = "receivedMessages")]
    pub received_messages: Vec<ReceivedMessage>,
}

#[derive(Debug, Deserialize, Default, ToSchema)]
pub struct AckRequest {
    #[serde(rename = "ackIds", default)]
    pub ack_ids: Vec<String>,
}

/// The original wire format encodes `maxMessages` as a JSON string; accept
/// both spellings.
fn string_or_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }
    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Number(value)) => Ok(Some(value)),
        Some(Raw::Text(text)) => text
            .parse()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

fn string_or_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Flag(bool),
        Text(String),
    }
    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Flag(value)) => Ok(Some(value)),
        Some(Raw::Text(text)) => text
            .parse()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

// ---------------------------------------------------------------------------
// Health

#[derive(Debug, Serialize, ToSchema)]
pub struct PushServerInfo {
    pub endpoint: String,
    pub status: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push_servers: Option<Vec<PushServerInfo>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push_functionality: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RetryPolicy;

    #[test]
    fn inactive_subscription_renders_empty_push_block() {
        let sub = Subscription::new("argo_uuid", "sub1", "topic1");
        let info = render_subscription("ARGO", &sub);
        let json = serde_json::to_value(&info).expect("json");
        assert_eq!(json["name"], "/projects/ARGO/subscriptions/sub1");
        assert_eq!(json["topic"], "/projects/ARGO/topics/topic1");
        assert_eq!(json["pushConfig"]["pushEndpoint"], "");
        assert_eq!(
            json["pushConfig"]["retryPolicy"],
            serde_json::json!({})
        );
        assert_eq!(json["ackDeadlineSeconds"], 10);
        assert!(json.get("push_status").is_none());
    }

    #[test]
    fn active_subscription_renders_retry_policy() {
        let mut sub = Subscription::new("argo_uuid", "sub4", "topic4");
        sub.push = Some(PushState {
            endpoint: "https://www.example.com".to_string(),
            retry: RetryPolicy::default(),
        });
        sub.push_status = "push enabled".to_string();
        let json = serde_json::to_value(render_subscription("ARGO", &sub)).expect("json");
        assert_eq!(json["pushConfig"]["pushEndpoint"], "https://www.example.com");
        assert_eq!(json["pushConfig"]["retryPolicy"]["type"], "linear");
        assert_eq!(json["pushConfig"]["retryPolicy"]["period"], 3000);
        assert_eq!(json["push_status"], "push enabled");
    }

    #[test]
    fn pull_request_accepts_string_and_integer_counts() {
        let from_string: PullRequest =
            serde_json::from_str(r#"{"maxMessages":"1"}"#).expect("string");
        assert_eq!(from_string.max_messages, Some(1));
        let from_number: PullRequest =
            serde_json::from_str(r#"{"maxMessages":3}"#).expect("number");
        assert_eq!(from_number.max_messages, Some(3));
        let empty: PullRequest = serde_json::from_str("{}").expect("empty");
        assert_eq!(empty.max_messages, None);
        assert!(serde_json::from_str::<PullRequest>(r#"{"maxMessages":"abc"}"#).is_err());

        let eager: PullRequest =
            serde_json::from_str(r#"{"returnImmediately":"true"}"#).expect("flag");
        assert_eq!(eager.return_immediately, Some(true));
    }

    #[test]
    fn publish_message_attributes_are_sorted() {
        let message: PublishMessage =
            serde_json::from_str(r#"{"attributes":{"b":"2","a":"1"},"data":"Zm9v"}"#)
                .expect("message");
        let keys: Vec<&String> = message.attributes.keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
        // Array-shaped attributes are a type error, not a silent skip.
        assert!(
            serde_json::from_str::<PublishMessage>(r#"{"attributes":[1],"data":"Zm9v"}"#).is_err()
        );
    }
}
