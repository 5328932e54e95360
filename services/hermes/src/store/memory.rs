//! In-memory implementation of the metadata store.
//!
//! # Purpose
//! Implements `MetadataStore` entirely in memory. It exists for:
//! - local development and tests (no external dependencies)
//! - single-node deployments where durability is not required
//!
//! # Consistency
//! All state lives behind one `tokio::sync::RwLock`. A single lock is
//! deliberate: the pull path performs a check-then-stamp on the subscription
//! lease, and holding the write lock across that read-modify-write is what
//! serializes concurrent pulls on the same subscription. Entity vectors
//! preserve creation order, which the pagination protocol depends on.
use super::{MetadataStore, PullLease, StoreError, StoreResult};
use crate::model::{
    AclKey, AclKind, Project, ProjectMembership, ProjectRole, PushState, RetryPolicy, ServiceRole,
    SubKey, Subscription, Topic, TopicKey, User,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct StoreState {
    projects: Vec<Project>,
    users: Vec<User>,
    topics: Vec<Topic>,
    subs: Vec<Subscription>,
    acls: HashMap<AclKey, Vec<String>>,
    // (project_uuid, topic_name, date) -> published message count
    daily: HashMap<(String, String, NaiveDate), u64>,
}

pub struct InMemoryStore {
    state: RwLock<StoreState>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
        }
    }

    /// Store pre-populated with the development sandbox dataset: projects
    /// ARGO/ARGO2, a cast of users with assorted roles, four topics with
    /// subscriptions and ACLs, and two days of publish counters. Integration
    /// tests and local demos build on this.
    pub fn seeded() -> Self {
        let store = Self::new();
        let created = fixture_time();
        {
            let mut state = store
                .state
                .try_write()
                .expect("fresh store lock is uncontended");

            for (uuid, name) in [("argo_uuid", "ARGO"), ("argo_uuid2", "ARGO2")] {
                state.projects.push(Project {
                    uuid: uuid.to_string(),
                    name: name.to_string(),
                    description: "simple project".to_string(),
                    created_on: created,
                    modified_on: created,
                    created_by: Some("uuid1".to_string()),
                });
            }

            let member = |roles: &[ProjectRole]| ProjectMembership {
                project_uuid: "argo_uuid".to_string(),
                roles: roles.to_vec(),
            };
            let consumer_publisher = [ProjectRole::Consumer, ProjectRole::Publisher];
            let publisher_consumer = [ProjectRole::Publisher, ProjectRole::Consumer];

            let mut push_user = |uuid: &str,
                                 name: &str,
                                 token: &str,
                                 email: &str,
                                 service_roles: Vec<ServiceRole>,
                                 projects: Vec<ProjectMembership>,
                                 created_by: Option<&str>| {
                state.users.push(User {
                    uuid: uuid.to_string(),
                    name: name.to_string(),
                    token: token.to_string(),
                    email: email.to_string(),
                    service_roles,
                    projects,
                    created_on: created,
                    modified_on: created,
                    created_by: created_by.map(|value| value.to_string()),
                });
            };

            push_user(
                "uuid0",
                "Test",
                "S3CR3T",
                "Test@test.com",
                vec![],
                vec![member(&consumer_publisher)],
                None,
            );
            push_user(
                "uuid1",
                "UserA",
                "S3CR3T1",
                "foo-email",
                vec![],
                vec![member(&consumer_publisher)],
                None,
            );
            push_user(
                "uuid2",
                "UserB",
                "S3CR3T2",
                "foo-email",
                vec![],
                vec![member(&consumer_publisher)],
                Some("uuid1"),
            );
            push_user(
                "uuid3",
                "UserX",
                "S3CR3T3",
                "foo-email",
                vec![],
                vec![member(&publisher_consumer)],
                Some("uuid1"),
            );
            push_user(
                "uuid4",
                "UserZ",
                "S3CR3T4",
                "foo-email",
                vec![],
                vec![member(&publisher_consumer)],
                Some("uuid1"),
            );
            push_user(
                "same_uuid",
                "UserSame1",
                "S3CR3T41",
                "foo-email",
                vec![],
                vec![member(&publisher_consumer)],
                Some("uuid1"),
            );
            push_user(
                "same_uuid",
                "UserSame2",
                "S3CR3T42",
                "foo-email",
                vec![],
                vec![member(&publisher_consumer)],
                Some("uuid1"),
            );
            push_user(
                "uuid7",
                "push_worker_0",
                "push_token",
                "foo-email",
                vec![ServiceRole::PushWorker],
                vec![],
                None,
            );
            push_user(
                "uuid8",
                "AdminUser",
                "S3CR3T8",
                "foo-email",
                vec![ServiceRole::ServiceAdmin],
                vec![ProjectMembership {
                    project_uuid: "argo_uuid".to_string(),
                    roles: vec![ProjectRole::ProjectAdmin],
                }],
                Some("uuid1"),
            );

            for name in ["topic1", "topic2", "topic3", "topic4"] {
                state.topics.push(Topic {
                    project_uuid: "argo_uuid".to_string(),
                    name: name.to_string(),
                });
            }

            for (name, topic) in [
                ("sub1", "topic1"),
                ("sub2", "topic2"),
                ("sub3", "topic3"),
            ] {
                state.subs.push(Subscription::new("argo_uuid", name, topic));
            }
            let mut sub4 = Subscription::new("argo_uuid", "sub4", "topic4");
            sub4.push = Some(PushState {
                endpoint: "endpoint.foo".to_string(),
                retry: RetryPolicy {
                    kind: "linear".to_string(),
                    period_ms: 300,
                },
            });
            sub4.push_status = "push enabled".to_string();
            state.subs.push(sub4);

            let topic_acl = |name: &str| AclKey::new("argo_uuid", AclKind::Topics, name);
            let sub_acl = |name: &str| AclKey::new("argo_uuid", AclKind::Subscriptions, name);
            let uuids = |ids: &[&str]| ids.iter().map(|id| id.to_string()).collect::<Vec<_>>();

            state.acls.insert(topic_acl("topic1"), uuids(&["uuid1", "uuid2"]));
            state
                .acls
                .insert(topic_acl("topic2"), uuids(&["uuid1", "uuid2", "uuid4"]));
            state.acls.insert(topic_acl("topic3"), uuids(&["uuid3"]));
            state.acls.insert(topic_acl("topic4"), uuids(&["uuid2", "uuid4"]));
            state.acls.insert(sub_acl("sub1"), uuids(&["uuid1", "uuid2"]));
            state.acls.insert(sub_acl("sub2"), uuids(&["uuid1", "uuid3"]));
            state
                .acls
                .insert(sub_acl("sub3"), uuids(&["uuid4", "uuid2", "uuid1"]));
            state
                .acls
                .insert(sub_acl("sub4"), uuids(&["uuid2", "uuid4", "uuid7"]));

            let day1 = NaiveDate::from_ymd_opt(2018, 10, 1).expect("fixture date");
            let day2 = NaiveDate::from_ymd_opt(2018, 10, 2).expect("fixture date");
            state
                .daily
                .insert(("argo_uuid".to_string(), "topic1".to_string(), day1), 30);
            state
                .daily
                .insert(("argo_uuid".to_string(), "topic1".to_string(), day2), 40);
            state
                .daily
                .insert(("argo_uuid".to_string(), "topic2".to_string(), day2), 70);
        }
        store
    }
}

/// Timestamp every fixture record carries.
pub fn fixture_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2009, 11, 10, 23, 0, 0)
        .single()
        .expect("fixture timestamp")
}

#[async_trait]
impl MetadataStore for InMemoryStore {
    async fn list_projects(&self) -> StoreResult<Vec<Project>> {
        Ok(self.state.read().await.projects.clone())
    }

    async fn project_by_name(&self, name: &str) -> StoreResult<Project> {
        self.state
            .read()
            .await
            .projects
            .iter()
            .find(|project| project.name == name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound("project".into()))
    }

    async fn project_by_uuid(&self, uuid: &str) -> StoreResult<Project> {
        self.state
            .read()
            .await
            .projects
            .iter()
            .find(|project| project.uuid == uuid)
            .cloned()
            .ok_or_else(|| StoreError::NotFound("project".into()))
    }

    async fn insert_project(&self, project: Project) -> StoreResult<Project> {
        let mut state = self.state.write().await;
        if state.projects.iter().any(|existing| existing.name == project.name) {
            return Err(StoreError::Conflict("project exists".into()));
        }
        state.projects.push(project.clone());
        Ok(project)
    }

    async fn update_project(
        &self,
        uuid: &str,
        name: String,
        description: String,
        modified_on: DateTime<Utc>,
    ) -> StoreResult<Project> {
        let mut state = self.state.write().await;
        if state
            .projects
            .iter()
            .any(|existing| existing.name == name && existing.uuid != uuid)
        {
            return Err(StoreError::Conflict("project name taken".into()));
        }
        let project = state
            .projects
            .iter_mut()
            .find(|project| project.uuid == uuid)
            .ok_or_else(|| StoreError::NotFound("project".into()))?;
        project.name = name;
        project.description = description;
        project.modified_on = modified_on;
        Ok(project.clone())
    }

    async fn remove_project(&self, uuid: &str) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let before = state.projects.len();
        state.projects.retain(|project| project.uuid != uuid);
        if state.projects.len() == before {
            return Err(StoreError::NotFound("project".into()));
        }
        // Cascade: topics, subscriptions, ACLs and counters all hang off the
        // project uuid.
        state.topics.retain(|topic| topic.project_uuid != uuid);
        state.subs.retain(|sub| sub.project_uuid != uuid);
        state.acls.retain(|key, _| key.project_uuid != uuid);
        state.daily.retain(|(project_uuid, _, _), _| project_uuid != uuid);
        metrics::gauge!("hermes_topics_total").set(state.topics.len() as f64);
        metrics::gauge!("hermes_subscriptions_total").set(state.subs.len() as f64);
        Ok(())
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        Ok(self.state.read().await.users.clone())
    }

    async fn user_by_name(&self, name: &str) -> StoreResult<User> {
        self.state
            .read()
            .await
            .users
            .iter()
            .find(|user| user.name == name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound("user".into()))
    }

    async fn user_by_token(&self, token: &str) -> StoreResult<User> {
        self.state
            .read()
            .await
            .users
            .iter()
            .find(|user| user.token == token)
            .cloned()
            .ok_or_else(|| StoreError::NotFound("user".into()))
    }

    async fn users_by_uuid(&self, uuid: &str) -> StoreResult<Vec<User>> {
        Ok(self
            .state
            .read()
            .await
            .users
            .iter()
            .filter(|user| user.uuid == uuid)
            .cloned()
            .collect())
    }

    async fn insert_user(&self, user: User) -> StoreResult<User> {
        let mut state = self.state.write().await;
        // Names and tokens are unique keys; uuids deliberately are not.
        if state.users.iter().any(|existing| existing.name == user.name) {
            return Err(StoreError::Conflict("user exists".into()));
        }
        if state.users.iter().any(|existing| existing.token == user.token) {
            return Err(StoreError::Conflict("token taken".into()));
        }
        state.users.push(user.clone());
        Ok(user)
    }

    async fn update_user(&self, name: &str, user: User) -> StoreResult<User> {
        let mut state = self.state.write().await;
        if state
            .users
            .iter()
            .any(|existing| existing.name == user.name && existing.name != name)
        {
            return Err(StoreError::Conflict("user name taken".into()));
        }
        let slot = state
            .users
            .iter_mut()
            .find(|existing| existing.name == name)
            .ok_or_else(|| StoreError::NotFound("user".into()))?;
        *slot = user.clone();
        Ok(user)
    }

    async fn remove_user(&self, name: &str) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let before = state.users.len();
        state.users.retain(|user| user.name != name);
        if state.users.len() == before {
            return Err(StoreError::NotFound("user".into()));
        }
        Ok(())
    }

    async fn list_topics(&self, project_uuid: &str) -> StoreResult<Vec<Topic>> {
        Ok(self
            .state
            .read()
            .await
            .topics
            .iter()
            .filter(|topic| topic.project_uuid == project_uuid)
            .cloned()
            .collect())
    }

    async fn topic(&self, key: &TopicKey) -> StoreResult<Topic> {
        self.state
            .read()
            .await
            .topics
            .iter()
            .find(|topic| topic.project_uuid == key.project_uuid && topic.name == key.name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound("topic".into()))
    }

    async fn insert_topic(&self, topic: Topic) -> StoreResult<Topic> {
        let mut state = self.state.write().await;
        if state
            .topics
            .iter()
            .any(|existing| existing.project_uuid == topic.project_uuid && existing.name == topic.name)
        {
            return Err(StoreError::Conflict("topic exists".into()));
        }
        state.topics.push(topic.clone());
        metrics::gauge!("hermes_topics_total").set(state.topics.len() as f64);
        Ok(topic)
    }

    async fn remove_topic(&self, key: &TopicKey) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let before = state.topics.len();
        state
            .topics
            .retain(|topic| !(topic.project_uuid == key.project_uuid && topic.name == key.name));
        if state.topics.len() == before {
            return Err(StoreError::NotFound("topic".into()));
        }
        state.acls.remove(&AclKey::new(
            key.project_uuid.clone(),
            AclKind::Topics,
            key.name.clone(),
        ));
        metrics::gauge!("hermes_topics_total").set(state.topics.len() as f64);
        Ok(())
    }

    async fn list_subs(&self, project_uuid: &str) -> StoreResult<Vec<Subscription>> {
        Ok(self
            .state
            .read()
            .await
            .subs
            .iter()
            .filter(|sub| sub.project_uuid == project_uuid)
            .cloned()
            .collect())
    }

    async fn subs_for_topic(&self, key: &TopicKey) -> StoreResult<Vec<Subscription>> {
        Ok(self
            .state
            .read()
            .await
            .subs
            .iter()
            .filter(|sub| sub.project_uuid == key.project_uuid && sub.topic == key.name)
            .cloned()
            .collect())
    }

    async fn sub(&self, key: &SubKey) -> StoreResult<Subscription> {
        self.state
            .read()
            .await
            .subs
            .iter()
            .find(|sub| sub.project_uuid == key.project_uuid && sub.name == key.name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound("subscription".into()))
    }

    async fn insert_sub(&self, sub: Subscription) -> StoreResult<Subscription> {
        let mut state = self.state.write().await;
        if state
            .subs
            .iter()
            .any(|existing| existing.project_uuid == sub.project_uuid && existing.name == sub.name)
        {
            return Err(StoreError::Conflict("subscription exists".into()));
        }
        state.subs.push(sub.clone());
        metrics::gauge!("hermes_subscriptions_total").set(state.subs.len() as f64);
        Ok(sub)
    }

    async fn remove_sub(&self, key: &SubKey) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let before = state.subs.len();
        state
            .subs
            .retain(|sub| !(sub.project_uuid == key.project_uuid && sub.name == key.name));
        if state.subs.len() == before {
            return Err(StoreError::NotFound("subscription".into()));
        }
        state.acls.remove(&AclKey::new(
            key.project_uuid.clone(),
            AclKind::Subscriptions,
            key.name.clone(),
        ));
        metrics::gauge!("hermes_subscriptions_total").set(state.subs.len() as f64);
        Ok(())
    }

    async fn update_sub_push(
        &self,
        key: &SubKey,
        push: Option<PushState>,
        push_status: String,
    ) -> StoreResult<Subscription> {
        let mut state = self.state.write().await;
        let sub = find_sub_mut(&mut state, key)?;
        sub.push = push;
        sub.push_status = push_status;
        Ok(sub.clone())
    }

    async fn update_sub_push_status(
        &self,
        key: &SubKey,
        push_status: String,
    ) -> StoreResult<Subscription> {
        let mut state = self.state.write().await;
        let sub = find_sub_mut(&mut state, key)?;
        sub.push_status = push_status;
        Ok(sub.clone())
    }

    async fn update_sub_ack_deadline(&self, key: &SubKey, seconds: u32) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let sub = find_sub_mut(&mut state, key)?;
        sub.ack_deadline_seconds = seconds;
        Ok(())
    }

    async fn begin_pull(&self, key: &SubKey, now: DateTime<Utc>) -> StoreResult<PullLease> {
        let mut state = self.state.write().await;
        let sub = find_sub_mut(&mut state, key)?;
        if let Some(leased_at) = sub.pending_ack {
            let deadline = Duration::seconds(i64::from(sub.ack_deadline_seconds));
            if now - leased_at <= deadline {
                return Ok(PullLease::Held);
            }
        }
        sub.pending_ack = Some(now);
        Ok(PullLease::Acquired(sub.clone()))
    }

    async fn commit_pull(&self, key: &SubKey, next_offset: u64, bytes: u64) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let sub = find_sub_mut(&mut state, key)?;
        // The cursor only moves forward.
        if next_offset > sub.next_offset {
            sub.consumed_messages += next_offset - sub.next_offset;
            sub.consumed_bytes += bytes;
            sub.next_offset = next_offset;
        }
        Ok(())
    }

    async fn abort_pull(&self, key: &SubKey) -> StoreResult<()> {
        self.clear_pending_ack(key).await
    }

    async fn clear_pending_ack(&self, key: &SubKey) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let sub = find_sub_mut(&mut state, key)?;
        sub.pending_ack = None;
        Ok(())
    }

    async fn acl(&self, key: &AclKey) -> StoreResult<Vec<String>> {
        Ok(self
            .state
            .read()
            .await
            .acls
            .get(key)
            .cloned()
            .unwrap_or_default())
    }

    async fn set_acl(&self, key: &AclKey, user_uuids: Vec<String>) -> StoreResult<()> {
        self.state.write().await.acls.insert(key.clone(), user_uuids);
        Ok(())
    }

    async fn append_to_acl(&self, key: &AclKey, user_uuid: &str) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let entries = state.acls.entry(key.clone()).or_default();
        if !entries.iter().any(|entry| entry == user_uuid) {
            entries.push(user_uuid.to_string());
        }
        Ok(())
    }

    async fn remove_from_acl(&self, key: &AclKey, user_uuid: &str) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if let Some(entries) = state.acls.get_mut(key) {
            entries.retain(|entry| entry != user_uuid);
        }
        Ok(())
    }

    async fn increment_daily(
        &self,
        project_uuid: &str,
        topic: &str,
        date: NaiveDate,
        count: u64,
    ) -> StoreResult<()> {
        let mut state = self.state.write().await;
        *state
            .daily
            .entry((project_uuid.to_string(), topic.to_string(), date))
            .or_insert(0) += count;
        Ok(())
    }

    async fn daily_for_topic(&self, key: &TopicKey) -> StoreResult<Vec<(NaiveDate, u64)>> {
        let state = self.state.read().await;
        let mut counts: Vec<(NaiveDate, u64)> = state
            .daily
            .iter()
            .filter(|((project_uuid, topic, _), _)| {
                *project_uuid == key.project_uuid && *topic == key.name
            })
            .map(|((_, _, date), count)| (*date, *count))
            .collect();
        counts.sort_by_key(|(date, _)| *date);
        Ok(counts)
    }

    async fn daily_for_project(&self, project_uuid: &str) -> StoreResult<Vec<(NaiveDate, u64)>> {
        let state = self.state.read().await;
        let mut by_date: HashMap<NaiveDate, u64> = HashMap::new();
        for ((owner, _, date), count) in state.daily.iter() {
            if owner == project_uuid {
                *by_date.entry(*date).or_insert(0) += count;
            }
        }
        let mut counts: Vec<(NaiveDate, u64)> = by_date.into_iter().collect();
        counts.sort_by_key(|(date, _)| *date);
        Ok(counts)
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

fn find_sub_mut<'a>(state: &'a mut StoreState, key: &SubKey) -> StoreResult<&'a mut Subscription> {
    state
        .subs
        .iter_mut()
        .find(|sub| sub.project_uuid == key.project_uuid && sub.name == key.name)
        .ok_or_else(|| StoreError::NotFound("subscription".into()))
}
