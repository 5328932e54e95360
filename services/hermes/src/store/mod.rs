//! Metadata store contract.
//!
//! # Purpose
//! The store is the sole source of truth for configuration state: projects,
//! users, topics, subscriptions, ACLs and daily publish counters. Message
//! bytes never live here; they belong to the commit log.
//!
//! # Notes
//! The live document-database backend is an external collaborator; this crate
//! ships the contract plus the in-memory implementation used by tests, local
//! development and single-node deployments.
use crate::model::{
    AclKey, Project, PushState, SubKey, Subscription, Topic, TopicKey, User,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

pub mod memory;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Outcome of starting a pull on a subscription.
#[derive(Debug)]
pub enum PullLease {
    /// The lease was taken; the caller owns the batch until it commits,
    /// aborts, or the ack deadline passes.
    Acquired(Subscription),
    /// Another consumer holds a non-expired lease on this subscription.
    Held,
}

#[async_trait]
pub trait MetadataStore: Send + Sync {
    // Projects. Listing preserves creation order.
    async fn list_projects(&self) -> StoreResult<Vec<Project>>;
    async fn project_by_name(&self, name: &str) -> StoreResult<Project>;
    async fn project_by_uuid(&self, uuid: &str) -> StoreResult<Project>;
    async fn insert_project(&self, project: Project) -> StoreResult<Project>;
    async fn update_project(
        &self,
        uuid: &str,
        name: String,
        description: String,
        modified_on: DateTime<Utc>,
    ) -> StoreResult<Project>;
    /// Removes the project and cascades to its topics, subscriptions, ACLs
    /// and daily counters.
    async fn remove_project(&self, uuid: &str) -> StoreResult<()>;

    // Users. Listing preserves creation order. Uuids are NOT unique keys:
    // `users_by_uuid` returns every match so callers can detect duplicates.
    async fn list_users(&self) -> StoreResult<Vec<User>>;
    async fn user_by_name(&self, name: &str) -> StoreResult<User>;
    async fn user_by_token(&self, token: &str) -> StoreResult<User>;
    async fn users_by_uuid(&self, uuid: &str) -> StoreResult<Vec<User>>;
    async fn insert_user(&self, user: User) -> StoreResult<User>;
    /// Full-record update keyed by the user's current name; renames permitted.
    async fn update_user(&self, name: &str, user: User) -> StoreResult<User>;
    async fn remove_user(&self, name: &str) -> StoreResult<()>;

    // Topics.
    async fn list_topics(&self, project_uuid: &str) -> StoreResult<Vec<Topic>>;
    async fn topic(&self, key: &TopicKey) -> StoreResult<Topic>;
    async fn insert_topic(&self, topic: Topic) -> StoreResult<Topic>;
    /// Removes the topic and its ACL. Dependent subscriptions are left in
    /// place; their pulls surface the dangling reference as a conflict.
    async fn remove_topic(&self, key: &TopicKey) -> StoreResult<()>;

    // Subscriptions.
    async fn list_subs(&self, project_uuid: &str) -> StoreResult<Vec<Subscription>>;
    async fn subs_for_topic(&self, key: &TopicKey) -> StoreResult<Vec<Subscription>>;
    async fn sub(&self, key: &SubKey) -> StoreResult<Subscription>;
    async fn insert_sub(&self, sub: Subscription) -> StoreResult<Subscription>;
    async fn remove_sub(&self, key: &SubKey) -> StoreResult<()>;
    async fn update_sub_push(
        &self,
        key: &SubKey,
        push: Option<PushState>,
        push_status: String,
    ) -> StoreResult<Subscription>;
    async fn update_sub_push_status(&self, key: &SubKey, push_status: String)
        -> StoreResult<Subscription>;
    async fn update_sub_ack_deadline(&self, key: &SubKey, seconds: u32) -> StoreResult<()>;

    /// Take the per-subscription pull lease. The check of the previous lease
    /// and the stamp of the new one happen under one write lock so
    /// concurrent pulls serialize.
    async fn begin_pull(&self, key: &SubKey, now: DateTime<Utc>) -> StoreResult<PullLease>;
    /// Advance the cursor after messages were handed out, accounting the
    /// delivered payload bytes on the subscription's consumption counters.
    async fn commit_pull(&self, key: &SubKey, next_offset: u64, bytes: u64) -> StoreResult<()>;
    /// Release the lease without advancing (empty batch).
    async fn abort_pull(&self, key: &SubKey) -> StoreResult<()>;
    /// Clear the outstanding lease after a successful acknowledge.
    async fn clear_pending_ack(&self, key: &SubKey) -> StoreResult<()>;

    // ACLs. Entries are ordered user uuids; order is preserved.
    async fn acl(&self, key: &AclKey) -> StoreResult<Vec<String>>;
    async fn set_acl(&self, key: &AclKey, user_uuids: Vec<String>) -> StoreResult<()>;
    async fn append_to_acl(&self, key: &AclKey, user_uuid: &str) -> StoreResult<()>;
    async fn remove_from_acl(&self, key: &AclKey, user_uuid: &str) -> StoreResult<()>;

    // Daily publish counters.
    async fn increment_daily(
        &self,
        project_uuid: &str,
        topic: &str,
        date: NaiveDate,
        count: u64,
    ) -> StoreResult<()>;
    async fn daily_for_topic(&self, key: &TopicKey) -> StoreResult<Vec<(NaiveDate, u64)>>;
    async fn daily_for_project(&self, project_uuid: &str) -> StoreResult<Vec<(NaiveDate, u64)>>;

    async fn health_check(&self) -> StoreResult<()>;
    fn backend_name(&self) -> &'static str;
}
