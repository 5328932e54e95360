//! User model definitions: identities, roles and project memberships.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Service-wide roles carried outside any project scope.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ServiceRole {
    ServiceAdmin,
    PushWorker,
}

/// Roles a user can hold inside one project.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProjectRole {
    ProjectAdmin,
    Publisher,
    Consumer,
}

/// Membership of a user in one project. The topics/subscriptions a member
/// can touch are not stored here; they are derived from ACLs at render time.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProjectMembership {
    pub project_uuid: String,
    pub roles: Vec<ProjectRole>,
}

impl ProjectMembership {
    pub fn has_role(&self, role: ProjectRole) -> bool {
        self.roles.contains(&role)
    }
}

/// A user record. The uuid is assigned at creation but deliberately NOT
/// enforced unique by the store; lookups that find more than one match
/// surface the conflict as an internal error.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    pub uuid: String,
    pub name: String,
    pub token: String,
    pub email: String,
    pub service_roles: Vec<ServiceRole>,
    pub projects: Vec<ProjectMembership>,
    pub created_on: DateTime<Utc>,
    pub modified_on: DateTime<Utc>,
    pub created_by: Option<String>,
}

impl User {
    pub fn has_service_role(&self, role: ServiceRole) -> bool {
        self.service_roles.contains(&role)
    }

    pub fn membership(&self, project_uuid: &str) -> Option<&ProjectMembership> {
        self.projects
            .iter()
            .find(|member| member.project_uuid == project_uuid)
    }

    pub fn has_project_role(&self, project_uuid: &str, role: ProjectRole) -> bool {
        self.membership(project_uuid)
            .map(|member| member.has_role(role))
            .unwrap_or(false)
    }
}
