//! Core data model for projects, users, topics and subscriptions.
//!
//! # Purpose
//! Defines the storage-shaped entity records shared by the store, the auth
//! layer and the HTTP API. Wire-shaped request/response types live in
//! `api::types` and are built from these records.
mod project;
mod subscription;
mod topic;
mod user;

pub use project::Project;
pub use subscription::{
    PushState, RetryPolicy, SubKey, Subscription, DEFAULT_ACK_DEADLINE_SECONDS,
    DEFAULT_RETRY_PERIOD_MS, MAX_ACK_DEADLINE_SECONDS,
};
pub use topic::{Topic, TopicKey};
pub use user::{ProjectMembership, ProjectRole, ServiceRole, User};

use serde::{Deserialize, Serialize};

/// Which resource kind an ACL is attached to.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AclKind {
    Topics,
    Subscriptions,
}

/// Identity of a single ACL entry list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AclKey {
    pub project_uuid: String,
    pub kind: AclKind,
    pub name: String,
}

impl AclKey {
    pub fn new(project_uuid: impl Into<String>, kind: AclKind, name: impl Into<String>) -> Self {
        Self {
            project_uuid: project_uuid.into(),
            kind,
            name: name.into(),
        }
    }
}
