//! Authentication and authorization.
//!
//! # Purpose
//! Resolves bearer tokens to users and enforces the capability matrix:
//! service-level routes need `service_admin`; project-scoped routes need
//! `project_admin` or the specific capability (publish, consume) which pairs
//! a project role with ACL membership on the target resource.
//!
//! # Key invariants
//! - `service_admin` passes every check.
//! - The `per_resource_auth` toggle relaxes ACL membership only, never the
//!   role requirement.
//! - Pulling a push-active subscription is reserved for the push worker and
//!   service admins, regardless of project roles.
use crate::model::{AclKey, AclKind, ProjectRole, ServiceRole, Subscription, User};
use crate::store::{MetadataStore, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Access to this resource is forbidden")]
    Forbidden,
    #[error("store failure during authorization")]
    Backend(#[source] StoreError),
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Resolve the `key` query parameter to a user. Absent, empty or unknown
/// tokens are all reported identically so probing reveals nothing.
pub async fn authenticate(
    store: &dyn MetadataStore,
    key: Option<&str>,
) -> AuthResult<User> {
    let token = match key {
        Some(token) if !token.is_empty() => token,
        _ => return Err(AuthError::Unauthorized),
    };
    match store.user_by_token(token).await {
        Ok(user) => Ok(user),
        Err(StoreError::NotFound(_)) => Err(AuthError::Unauthorized),
        Err(err) => Err(AuthError::Backend(err)),
    }
}

pub fn is_service_admin(user: &User) -> bool {
    user.has_service_role(ServiceRole::ServiceAdmin)
}

pub fn is_project_admin(user: &User, project_uuid: &str) -> bool {
    is_service_admin(user) || user.has_project_role(project_uuid, ProjectRole::ProjectAdmin)
}

/// Service-level routes: health, operational metrics, user management and
/// project CRUD.
pub fn require_service_admin(user: &User) -> AuthResult<()> {
    if is_service_admin(user) {
        Ok(())
    } else {
        Err(AuthError::Forbidden)
    }
}

/// Project-administration routes: topic/subscription create and delete, ACL
/// views and modifications.
pub fn require_project_admin(user: &User, project_uuid: &str) -> AuthResult<()> {
    if is_project_admin(user, project_uuid) {
        Ok(())
    } else {
        Err(AuthError::Forbidden)
    }
}

/// Publish-side capability on one topic.
pub async fn require_publisher(
    store: &dyn MetadataStore,
    per_resource_auth: bool,
    user: &User,
    project_uuid: &str,
    topic_name: &str,
) -> AuthResult<()> {
    if is_project_admin(user, project_uuid) {
        return Ok(());
    }
    if !user.has_project_role(project_uuid, ProjectRole::Publisher) {
        return Err(AuthError::Forbidden);
    }
    if per_resource_auth
        && !in_acl(store, project_uuid, AclKind::Topics, topic_name, &user.uuid).await?
    {
        return Err(AuthError::Forbidden);
    }
    Ok(())
}

/// Consume-side capability on one subscription: pull, acknowledge and
/// deadline changes. `pulling` additionally enforces the push-worker gate on
/// push-active subscriptions.
pub async fn require_consumer(
    store: &dyn MetadataStore,
    per_resource_auth: bool,
    user: &User,
    sub: &Subscription,
    pulling: bool,
) -> AuthResult<()> {
    if pulling && sub.is_push_active() {
        let push_capable = user.has_service_role(ServiceRole::PushWorker) || is_service_admin(user);
        if !push_capable {
            return Err(AuthError::Forbidden);
        }
        return Ok(());
    }
    if is_project_admin(user, &sub.project_uuid) {
        return Ok(());
    }
    if !user.has_project_role(&sub.project_uuid, ProjectRole::Consumer) {
        return Err(AuthError::Forbidden);
    }
    if per_resource_auth
        && !in_acl(
            store,
            &sub.project_uuid,
            AclKind::Subscriptions,
            &sub.name,
            &user.uuid,
        )
        .await?
    {
        return Err(AuthError::Forbidden);
    }
    Ok(())
}

async fn in_acl(
    store: &dyn MetadataStore,
    project_uuid: &str,
    kind: AclKind,
    name: &str,
    user_uuid: &str,
) -> AuthResult<bool> {
    let entries = store
        .acl(&AclKey::new(project_uuid, kind, name))
        .await
        .map_err(AuthError::Backend)?;
    Ok(entries.iter().any(|entry| entry == user_uuid))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PushState, RetryPolicy};
    use crate::store::memory::InMemoryStore;

    #[tokio::test]
    async fn unknown_and_empty_tokens_are_unauthorized() {
        let store = InMemoryStore::seeded();
        assert!(matches!(
            authenticate(&store, None).await,
            Err(AuthError::Unauthorized)
        ));
        assert!(matches!(
            authenticate(&store, Some("")).await,
            Err(AuthError::Unauthorized)
        ));
        assert!(matches!(
            authenticate(&store, Some("bogus")).await,
            Err(AuthError::Unauthorized)
        ));
        let user = authenticate(&store, Some("S3CR3T1")).await.expect("UserA");
        assert_eq!(user.name, "UserA");
    }

    #[tokio::test]
    async fn publisher_needs_role_and_acl() {
        let store = InMemoryStore::seeded();
        let user_a = store.user_by_name("UserA").await.expect("UserA");
        let user_x = store.user_by_name("UserX").await.expect("UserX");

        // UserA is a publisher in topic1's ACL.
        require_publisher(&store, true, &user_a, "argo_uuid", "topic1")
            .await
            .expect("UserA on topic1");
        // UserX is a publisher but not in topic1's ACL.
        assert!(matches!(
            require_publisher(&store, true, &user_x, "argo_uuid", "topic1").await,
            Err(AuthError::Forbidden)
        ));
        // Relaxing per-resource auth keeps only the role check.
        require_publisher(&store, false, &user_x, "argo_uuid", "topic1")
            .await
            .expect("role-only check");
    }

    #[tokio::test]
    async fn service_admin_bypasses_project_checks() {
        let store = InMemoryStore::seeded();
        let admin = store.user_by_name("AdminUser").await.expect("admin");
        require_service_admin(&admin).expect("service admin");
        require_project_admin(&admin, "argo_uuid2").expect("any project");
        require_publisher(&store, true, &admin, "argo_uuid", "topic3")
            .await
            .expect("publish anywhere");
    }

    #[tokio::test]
    async fn push_active_pull_is_gated_on_service_roles() {
        let store = InMemoryStore::seeded();
        let mut sub = Subscription::new("argo_uuid", "sub4", "topic4");
        sub.push = Some(PushState {
            endpoint: "endpoint.foo".to_string(),
            retry: RetryPolicy::default(),
        });

        let consumer = store.user_by_name("UserB").await.expect("UserB");
        assert!(matches!(
            require_consumer(&store, true, &consumer, &sub, true).await,
            Err(AuthError::Forbidden)
        ));

        let worker = store.user_by_name("push_worker_0").await.expect("worker");
        require_consumer(&store, true, &worker, &sub, true)
            .await
            .expect("push worker may pull");

        let admin = store.user_by_name("AdminUser").await.expect("admin");
        require_consumer(&store, true, &admin, &sub, true)
            .await
            .expect("service admin may pull");

        // Non-pull consume operations stay role/ACL based.
        require_consumer(&store, true, &consumer, &sub, false)
            .await
            .expect("ack path unaffected");
    }

    #[tokio::test]
    async fn consumer_needs_role_and_acl() {
        let store = InMemoryStore::seeded();
        let sub2 = store
            .sub(&crate::model::SubKey::new("argo_uuid", "sub2"))
            .await
            .expect("sub2");

        // sub2's ACL holds uuid1 and uuid3.
        let user_a = store.user_by_name("UserA").await.expect("UserA");
        require_consumer(&store, true, &user_a, &sub2, true)
            .await
            .expect("UserA in acl");

        let user_z = store.user_by_name("UserZ").await.expect("UserZ");
        assert!(matches!(
            require_consumer(&store, true, &user_z, &sub2, true).await,
            Err(AuthError::Forbidden)
        ));
        require_consumer(&store, false, &user_z, &sub2, true)
            .await
            .expect("role-only check");
    }
}
