//! Router-level coverage of the resource-management surface: users,
//! projects, topics, subscriptions, ACLs, pagination and name validation.
mod common;

use axum::http::StatusCode;
use common::{empty_request, error_snapshot, json_request, read_json, read_text, seeded};
use hermes::model::{AclKey, AclKind};
use hermes::store::MetadataStore;
use tower::ServiceExt;

const ADMIN: &str = "S3CR3T8";

#[tokio::test]
async fn user_profile_snapshot() {
    let harness = seeded().await;

    let expected = "{\n   \"uuid\": \"uuid1\",\n   \"projects\": [\n      {\n         \"project\": \"ARGO\",\n         \"roles\": [\n            \"consumer\",\n            \"publisher\"\n         ],\n         \"topics\": [\n            \"topic1\",\n            \"topic2\"\n         ],\n         \"subscriptions\": [\n            \"sub1\",\n            \"sub2\",\n            \"sub3\"\n         ]\n      }\n   ],\n   \"name\": \"UserA\",\n   \"token\": \"S3CR3T1\",\n   \"email\": \"foo-email\",\n   \"service_roles\": [],\n   \"created_on\": \"2009-11-10T23:00:00Z\",\n   \"modified_on\": \"2009-11-10T23:00:00Z\"\n}";

    let response = harness
        .app
        .clone()
        .oneshot(empty_request("GET", "/v1/users/profile?key=S3CR3T1"))
        .await
        .expect("profile");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_text(response).await, expected);
}

#[tokio::test]
async fn unknown_and_missing_tokens_are_unauthorized() {
    let harness = seeded().await;

    for uri in ["/v1/users/profile?key=unknown", "/v1/users/profile"] {
        let response = harness
            .app
            .clone()
            .oneshot(empty_request("GET", uri))
            .await
            .expect("profile");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            read_text(response).await,
            error_snapshot(401, "Unauthorized", "UNAUTHORIZED")
        );
    }
}

#[tokio::test]
async fn non_admins_cannot_manage_users() {
    let harness = seeded().await;
    let response = harness
        .app
        .clone()
        .oneshot(empty_request("GET", "/v1/users?key=S3CR3T1"))
        .await
        .expect("list");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        read_text(response).await,
        error_snapshot(403, "Access to this resource is forbidden", "FORBIDDEN")
    );
}

#[tokio::test]
async fn user_listing_pages_newest_first() {
    let harness = seeded().await;

    let response = harness
        .app
        .clone()
        .oneshot(empty_request("GET", "/v1/users?key=S3CR3T8&pageSize=2"))
        .await
        .expect("list");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json(response).await;
    let names: Vec<&str> = payload["users"]
        .as_array()
        .expect("users")
        .iter()
        .map(|user| user["name"].as_str().expect("name"))
        .collect();
    assert_eq!(names, vec!["AdminUser", "push_worker_0"]);
    assert_eq!(payload["nextPageToken"], "Ng==");
    assert_eq!(payload["totalSize"], 9);

    let response = harness
        .app
        .clone()
        .oneshot(empty_request(
            "GET",
            "/v1/users?key=S3CR3T8&pageSize=2&pageToken=NA==",
        ))
        .await
        .expect("list");
    let payload = read_json(response).await;
    let names: Vec<&str> = payload["users"]
        .as_array()
        .expect("users")
        .iter()
        .map(|user| user["name"].as_str().expect("name"))
        .collect();
    assert_eq!(names, vec!["UserZ", "UserX"]);
    assert_eq!(payload["nextPageToken"], "Mg==");

    // Following tokens to the end visits every user exactly once.
    let mut seen = Vec::new();
    let mut token = String::new();
    loop {
        let uri = if token.is_empty() {
            "/v1/users?key=S3CR3T8&pageSize=4".to_string()
        } else {
            format!("/v1/users?key=S3CR3T8&pageSize=4&pageToken={token}")
        };
        let payload = read_json(
            harness
                .app
                .clone()
                .oneshot(empty_request("GET", &uri))
                .await
                .expect("page"),
        )
        .await;
        for user in payload["users"].as_array().expect("users") {
            seen.push(user["name"].as_str().expect("name").to_string());
        }
        token = payload["nextPageToken"].as_str().expect("token").to_string();
        if token.is_empty() {
            break;
        }
    }
    assert_eq!(seen.len(), 9);
    assert_eq!(seen.first().map(String::as_str), Some("AdminUser"));
    assert_eq!(seen.last().map(String::as_str), Some("Test"));
}

#[tokio::test]
async fn listing_rejects_bad_page_parameters() {
    let harness = seeded().await;

    let response = harness
        .app
        .clone()
        .oneshot(empty_request("GET", "/v1/users?key=S3CR3T8&pageSize=invalid"))
        .await
        .expect("bad size");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        read_text(response).await,
        error_snapshot(400, "Invalid page size", "INVALID_ARGUMENT")
    );

    let response = harness
        .app
        .clone()
        .oneshot(empty_request(
            "GET",
            "/v1/users?key=S3CR3T8&pageToken=invalid",
        ))
        .await
        .expect("bad token");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        read_text(response).await,
        error_snapshot(400, "Invalid page token", "INVALID_ARGUMENT")
    );
}

#[tokio::test]
async fn user_lookup_by_token_and_uuid() {
    let harness = seeded().await;

    let response = harness
        .app
        .clone()
        .oneshot(empty_request("GET", "/v1/users:byToken/S3CR3T4?key=S3CR3T8"))
        .await
        .expect("by token");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json(response).await;
    assert_eq!(payload["name"], "UserZ");
    assert_eq!(payload["created_by"], "UserA");

    let response = harness
        .app
        .clone()
        .oneshot(empty_request("GET", "/v1/users:byUUID/uuid4?key=S3CR3T8"))
        .await
        .expect("by uuid");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json(response).await;
    assert_eq!(payload["name"], "UserZ");

    let response = harness
        .app
        .clone()
        .oneshot(empty_request("GET", "/v1/users:byUUID/uuid10?key=S3CR3T8"))
        .await
        .expect("missing uuid");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        read_text(response).await,
        error_snapshot(404, "User doesn't exist", "NOT_FOUND")
    );
}

#[tokio::test]
async fn duplicate_uuid_lookup_is_an_internal_error() {
    let harness = seeded().await;
    let response = harness
        .app
        .clone()
        .oneshot(empty_request(
            "GET",
            "/v1/users:byUUID/same_uuid?key=S3CR3T8",
        ))
        .await
        .expect("duplicate uuid");
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        read_text(response).await,
        error_snapshot(
            500,
            "Multiple users found with the same uuid",
            "INTERNAL_SERVER_ERROR"
        )
    );
}

#[tokio::test]
async fn user_create_update_refresh_delete() {
    let harness = seeded().await;

    let response = harness
        .app
        .clone()
        .oneshot(json_request(
            "POST",
            "/v1/users/USERNEW?key=S3CR3T8",
            serde_json::json!({
                "email": "email@foo.com",
                "projects": [{"project_uuid": "argo_uuid", "roles": ["publisher"]}]
            }),
        ))
        .await
        .expect("create");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json(response).await;
    assert_eq!(payload["name"], "USERNEW");
    assert_eq!(payload["email"], "email@foo.com");
    assert_eq!(payload["created_by"], "AdminUser");
    assert_eq!(payload["projects"][0]["project"], "ARGO");

    // Unknown project uuids and unknown roles are rejected up front.
    let response = harness
        .app
        .clone()
        .oneshot(json_request(
            "POST",
            "/v1/users/USERNEW2?key=S3CR3T8",
            serde_json::json!({
                "projects": [{"project_uuid": "missing_uuid", "roles": []}]
            }),
        ))
        .await
        .expect("bad project");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = harness
        .app
        .clone()
        .oneshot(json_request(
            "POST",
            "/v1/users/USERNEW3?key=S3CR3T8",
            serde_json::json!({
                "projects": [{"project_uuid": "argo_uuid", "roles": ["viewer"]}]
            }),
        ))
        .await
        .expect("bad role");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        read_text(response).await,
        error_snapshot(400, "Invalid User Arguments", "INVALID_ARGUMENT")
    );

    let response = harness
        .app
        .clone()
        .oneshot(json_request(
            "POST",
            "/v1/users/UserA?key=S3CR3T8",
            serde_json::json!({"email": "x"}),
        ))
        .await
        .expect("duplicate");
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(
        read_text(response).await,
        error_snapshot(409, "User already exists", "ALREADY_EXISTS")
    );

    let response = harness
        .app
        .clone()
        .oneshot(json_request(
            "PUT",
            "/v1/users/UserZ?key=S3CR3T8",
            serde_json::json!({"name": "UPDATED_NAME", "service_roles": ["service_admin"]}),
        ))
        .await
        .expect("update");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json(response).await;
    assert_eq!(payload["name"], "UPDATED_NAME");
    assert_eq!(payload["service_roles"], serde_json::json!(["service_admin"]));
    assert_eq!(payload["created_by"], "UserA");

    let response = harness
        .app
        .clone()
        .oneshot(empty_request(
            "POST",
            "/v1/users/UPDATED_NAME:refreshToken?key=S3CR3T8",
        ))
        .await
        .expect("refresh");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json(response).await;
    assert_ne!(payload["token"], "S3CR3T4");

    let response = harness
        .app
        .clone()
        .oneshot(empty_request("DELETE", "/v1/users/UPDATED_NAME?key=S3CR3T8"))
        .await
        .expect("delete");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_text(response).await, "");

    let response = harness
        .app
        .clone()
        .oneshot(empty_request("GET", "/v1/users/UPDATED_NAME?key=S3CR3T8"))
        .await
        .expect("deleted lookup");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        read_text(response).await,
        error_snapshot(404, "User doesn't exist", "NOT_FOUND")
    );
}

#[tokio::test]
async fn project_listing_snapshot() {
    let harness = seeded().await;
    let expected = "{\n   \"projects\": [\n      {\n         \"name\": \"ARGO\",\n         \"created_on\": \"2009-11-10T23:00:00Z\",\n         \"modified_on\": \"2009-11-10T23:00:00Z\",\n         \"created_by\": \"UserA\",\n         \"description\": \"simple project\"\n      },\n      {\n         \"name\": \"ARGO2\",\n         \"created_on\": \"2009-11-10T23:00:00Z\",\n         \"modified_on\": \"2009-11-10T23:00:00Z\",\n         \"created_by\": \"UserA\",\n         \"description\": \"simple project\"\n      }\n   ]\n}";

    let response = harness
        .app
        .clone()
        .oneshot(empty_request("GET", "/v1/projects?key=S3CR3T8"))
        .await
        .expect("list");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_text(response).await, expected);
}

#[tokio::test]
async fn project_crud() {
    let harness = seeded().await;

    let response = harness
        .app
        .clone()
        .oneshot(json_request(
            "POST",
            "/v1/projects/ARGONEW?key=S3CR3T8",
            serde_json::json!({"description": "This is a newly created project"}),
        ))
        .await
        .expect("create");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json(response).await;
    assert_eq!(payload["name"], "ARGONEW");
    assert_eq!(payload["created_by"], "AdminUser");
    assert_eq!(payload["description"], "This is a newly created project");

    let response = harness
        .app
        .clone()
        .oneshot(json_request(
            "POST",
            "/v1/projects/ARGO?key=S3CR3T8",
            serde_json::json!({}),
        ))
        .await
        .expect("duplicate");
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(
        read_text(response).await,
        error_snapshot(409, "Project already exists", "ALREADY_EXISTS")
    );

    let response = harness
        .app
        .clone()
        .oneshot(json_request(
            "PUT",
            "/v1/projects/ARGO?key=S3CR3T8",
            serde_json::json!({
                "name": "NEWARGO",
                "description": "time to change the description mates and the name"
            }),
        ))
        .await
        .expect("update");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json(response).await;
    assert_eq!(payload["name"], "NEWARGO");
    assert_eq!(payload["created_by"], "UserA");
    assert_eq!(
        payload["description"],
        "time to change the description mates and the name"
    );

    let response = harness
        .app
        .clone()
        .oneshot(empty_request("GET", "/v1/projects/ARGONAUFTS?key=S3CR3T8"))
        .await
        .expect("missing");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        read_text(response).await,
        error_snapshot(404, "Project doesn't exist", "NOT_FOUND")
    );

    let response = harness
        .app
        .clone()
        .oneshot(empty_request("DELETE", "/v1/projects/NEWARGO?key=S3CR3T8"))
        .await
        .expect("delete");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_text(response).await, "");

    // The cascade removed the project's topics with it.
    let response = harness
        .app
        .clone()
        .oneshot(empty_request("GET", "/v1/projects/NEWARGO/topics?key=S3CR3T8"))
        .await
        .expect("topics of deleted project");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn topic_create_get_delete_snapshots() {
    let harness = seeded().await;

    let response = harness
        .app
        .clone()
        .oneshot(empty_request(
            "PUT",
            "/v1/projects/ARGO/topics/topicNew?key=S3CR3T8",
        ))
        .await
        .expect("create");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        read_text(response).await,
        "{\n   \"name\": \"/projects/ARGO/topics/topicNew\"\n}"
    );

    let response = harness
        .app
        .clone()
        .oneshot(empty_request(
            "PUT",
            "/v1/projects/ARGO/topics/topic1?key=S3CR3T8",
        ))
        .await
        .expect("duplicate");
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(
        read_text(response).await,
        error_snapshot(409, "Topic already exists", "ALREADY_EXISTS")
    );

    let response = harness
        .app
        .clone()
        .oneshot(empty_request(
            "GET",
            "/v1/projects/ARGO/topics/topic1?key=S3CR3T1",
        ))
        .await
        .expect("get");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        read_text(response).await,
        "{\n   \"name\": \"/projects/ARGO/topics/topic1\"\n}"
    );

    let response = harness
        .app
        .clone()
        .oneshot(empty_request(
            "DELETE",
            "/v1/projects/ARGO/topics/topic1?key=S3CR3T8",
        ))
        .await
        .expect("delete");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_text(response).await, "");

    let response = harness
        .app
        .clone()
        .oneshot(empty_request(
            "DELETE",
            "/v1/projects/ARGO/topics/topicFoo?key=S3CR3T8",
        ))
        .await
        .expect("missing");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        read_text(response).await,
        error_snapshot(404, "Topic doesn't exist", "NOT_FOUND")
    );
}

#[tokio::test]
async fn topic_listing_pages_and_filters() {
    let harness = seeded().await;

    // Admin view, first page of two.
    let response = harness
        .app
        .clone()
        .oneshot(empty_request(
            "GET",
            "/v1/projects/ARGO/topics?key=S3CR3T8&pageSize=2",
        ))
        .await
        .expect("admin page");
    let payload = read_json(response).await;
    let names: Vec<&str> = payload["topics"]
        .as_array()
        .expect("topics")
        .iter()
        .map(|topic| topic["name"].as_str().expect("name"))
        .collect();
    assert_eq!(
        names,
        vec!["/projects/ARGO/topics/topic4", "/projects/ARGO/topics/topic3"]
    );
    assert_eq!(payload["nextPageToken"], "MQ==");
    assert_eq!(payload["totalSize"], 4);

    // Last page.
    let response = harness
        .app
        .clone()
        .oneshot(empty_request(
            "GET",
            "/v1/projects/ARGO/topics?key=S3CR3T8&pageSize=2&pageToken=MA==",
        ))
        .await
        .expect("last page");
    let payload = read_json(response).await;
    assert_eq!(
        payload["topics"][0]["name"],
        "/projects/ARGO/topics/topic1"
    );
    assert_eq!(payload["nextPageToken"], "");
    assert_eq!(payload["totalSize"], 4);

    // Publisher visibility is filtered before the counts are computed.
    let response = harness
        .app
        .clone()
        .oneshot(empty_request("GET", "/v1/projects/ARGO/topics?key=S3CR3T1"))
        .await
        .expect("publisher view");
    let payload = read_json(response).await;
    let names: Vec<&str> = payload["topics"]
        .as_array()
        .expect("topics")
        .iter()
        .map(|topic| topic["name"].as_str().expect("name"))
        .collect();
    assert_eq!(
        names,
        vec!["/projects/ARGO/topics/topic2", "/projects/ARGO/topics/topic1"]
    );
    assert_eq!(payload["totalSize"], 2);

    let response = harness
        .app
        .clone()
        .oneshot(empty_request(
            "GET",
            "/v1/projects/ARGO/topics?key=S3CR3T1&pageSize=1",
        ))
        .await
        .expect("publisher page");
    let payload = read_json(response).await;
    assert_eq!(payload["topics"][0]["name"], "/projects/ARGO/topics/topic2");
    assert_eq!(payload["nextPageToken"], "MA==");
    assert_eq!(payload["totalSize"], 2);
}

#[tokio::test]
async fn subscription_listing_pages_and_filters() {
    let harness = seeded().await;

    let response = harness
        .app
        .clone()
        .oneshot(empty_request(
            "GET",
            "/v1/projects/ARGO/subscriptions?key=S3CR3T8",
        ))
        .await
        .expect("admin list");
    let payload = read_json(response).await;
    let names: Vec<&str> = payload["subscriptions"]
        .as_array()
        .expect("subs")
        .iter()
        .map(|sub| sub["name"].as_str().expect("name"))
        .collect();
    assert_eq!(
        names,
        vec![
            "/projects/ARGO/subscriptions/sub4",
            "/projects/ARGO/subscriptions/sub3",
            "/projects/ARGO/subscriptions/sub2",
            "/projects/ARGO/subscriptions/sub1"
        ]
    );
    assert_eq!(payload["totalSize"], 4);
    // The seeded push subscription renders its full push block.
    assert_eq!(payload["subscriptions"][0]["pushConfig"]["pushEndpoint"], "endpoint.foo");
    assert_eq!(
        payload["subscriptions"][0]["pushConfig"]["retryPolicy"]["period"],
        300
    );
    assert_eq!(payload["subscriptions"][0]["push_status"], "push enabled");

    // Consumer visibility: UserA holds ACL entries on sub1..sub3 only.
    let response = harness
        .app
        .clone()
        .oneshot(empty_request(
            "GET",
            "/v1/projects/ARGO/subscriptions?key=S3CR3T1&pageSize=2",
        ))
        .await
        .expect("consumer list");
    let payload = read_json(response).await;
    let names: Vec<&str> = payload["subscriptions"]
        .as_array()
        .expect("subs")
        .iter()
        .map(|sub| sub["name"].as_str().expect("name"))
        .collect();
    assert_eq!(
        names,
        vec![
            "/projects/ARGO/subscriptions/sub3",
            "/projects/ARGO/subscriptions/sub2"
        ]
    );
    assert_eq!(payload["nextPageToken"], "MA==");
    assert_eq!(payload["totalSize"], 3);
}

#[tokio::test]
async fn subscription_get_snapshot() {
    let harness = seeded().await;
    let response = harness
        .app
        .clone()
        .oneshot(empty_request(
            "GET",
            "/v1/projects/ARGO/subscriptions/sub1?key=S3CR3T1",
        ))
        .await
        .expect("get");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        read_text(response).await,
        "{\n   \"name\": \"/projects/ARGO/subscriptions/sub1\",\n   \"topic\": \"/projects/ARGO/topics/topic1\",\n   \"pushConfig\": {\n      \"pushEndpoint\": \"\",\n      \"retryPolicy\": {}\n   },\n   \"ackDeadlineSeconds\": 10\n}"
    );
}

#[tokio::test]
async fn subscription_create_and_delete() {
    let harness = seeded().await;

    let response = harness
        .app
        .clone()
        .oneshot(json_request(
            "PUT",
            "/v1/projects/ARGO/subscriptions/subNew?key=S3CR3T8",
            serde_json::json!({"topic": "projects/ARGO/topics/topic1"}),
        ))
        .await
        .expect("create");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        read_text(response).await,
        "{\n   \"name\": \"/projects/ARGO/subscriptions/subNew\",\n   \"topic\": \"/projects/ARGO/topics/topic1\",\n   \"pushConfig\": {\n      \"pushEndpoint\": \"\",\n      \"retryPolicy\": {}\n   },\n   \"ackDeadlineSeconds\": 10\n}"
    );

    let response = harness
        .app
        .clone()
        .oneshot(json_request(
            "PUT",
            "/v1/projects/ARGO/subscriptions/sub1?key=S3CR3T8",
            serde_json::json!({"topic": "projects/ARGO/topics/topic1"}),
        ))
        .await
        .expect("duplicate");
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(
        read_text(response).await,
        error_snapshot(409, "Subscription already exists", "ALREADY_EXISTS")
    );

    let response = harness
        .app
        .clone()
        .oneshot(json_request(
            "PUT",
            "/v1/projects/ARGO/subscriptions/subBad?key=S3CR3T8",
            serde_json::json!({"topic": "projects/ARGO/topics/topicFoo"}),
        ))
        .await
        .expect("bad topic");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        read_text(response).await,
        error_snapshot(404, "Topic doesn't exist", "NOT_FOUND")
    );

    let response = harness
        .app
        .clone()
        .oneshot(empty_request(
            "DELETE",
            "/v1/projects/ARGO/subscriptions/subNew?key=S3CR3T8",
        ))
        .await
        .expect("delete");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_text(response).await, "");

    let response = harness
        .app
        .clone()
        .oneshot(empty_request(
            "DELETE",
            "/v1/projects/ARGO/subscriptions/subFoo?key=S3CR3T8",
        ))
        .await
        .expect("missing");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        read_text(response).await,
        error_snapshot(404, "Subscription doesn't exist", "NOT_FOUND")
    );
}

#[tokio::test]
async fn acl_views_and_modification() {
    let harness = seeded().await;

    let response = harness
        .app
        .clone()
        .oneshot(empty_request(
            "GET",
            "/v1/projects/ARGO/topics/topic1:acl?key=S3CR3T8",
        ))
        .await
        .expect("topic acl");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        read_text(response).await,
        "{\n   \"authorized_users\": [\n      \"UserA\",\n      \"UserB\"\n   ]\n}"
    );

    let response = harness
        .app
        .clone()
        .oneshot(empty_request(
            "GET",
            "/v1/projects/ARGO/subscriptions/sub3:acl?key=S3CR3T8",
        ))
        .await
        .expect("sub acl");
    assert_eq!(
        read_text(response).await,
        "{\n   \"authorized_users\": [\n      \"UserZ\",\n      \"UserB\",\n      \"UserA\"\n   ]\n}"
    );

    let response = harness
        .app
        .clone()
        .oneshot(json_request(
            "POST",
            "/v1/projects/ARGO/topics/topic1:modAcl?key=S3CR3T8",
            serde_json::json!({"authorized_users": ["UserX", "UserZ"]}),
        ))
        .await
        .expect("mod acl");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_text(response).await, "");

    let response = harness
        .app
        .clone()
        .oneshot(empty_request(
            "GET",
            "/v1/projects/ARGO/topics/topic1:acl?key=S3CR3T8",
        ))
        .await
        .expect("topic acl after");
    assert_eq!(
        read_text(response).await,
        "{\n   \"authorized_users\": [\n      \"UserX\",\n      \"UserZ\"\n   ]\n}"
    );

    let response = harness
        .app
        .clone()
        .oneshot(json_request(
            "POST",
            "/v1/projects/ARGO/subscriptions/sub1:modAcl?key=S3CR3T8",
            serde_json::json!({"authorized_users": ["UserX", "UserFoo"]}),
        ))
        .await
        .expect("unknown user");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        read_text(response).await,
        error_snapshot(404, "User(s): UserFoo do not exist", "NOT_FOUND")
    );
}

#[tokio::test]
async fn path_name_validation_reports_project_first() {
    let harness = seeded().await;

    let cases = [
        (
            "/v1/projects/AR:GO/subscriptions/sub1?key=S3CR3T8",
            "Invalid project name",
        ),
        (
            "/v1/projects/ARGO/subscriptions/s,ub1?key=S3CR3T8",
            "Invalid subscription name",
        ),
        (
            "/v1/projects/AR,GO/subscriptions/s:ub1?key=S3CR3T8",
            "Invalid project name",
        ),
        (
            "/v1/projects/ARGO/topics/top,ic1?key=S3CR3T8",
            "Invalid topic name",
        ),
        (
            "/v1/projects/AR,GO/topics/top:ic1?key=S3CR3T8",
            "Invalid project name",
        ),
    ];
    for (uri, message) in cases {
        let response = harness
            .app
            .clone()
            .oneshot(empty_request("GET", uri))
            .await
            .expect("validation");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(
            read_text(response).await,
            error_snapshot(400, message, "INVALID_ARGUMENT"),
            "{uri}"
        );
    }
}

#[tokio::test]
async fn list_subscriptions_by_topic() {
    let harness = seeded().await;

    let response = harness
        .app
        .clone()
        .oneshot(empty_request(
            "GET",
            "/v1/projects/ARGO/topics/topic1/subscriptions?key=S3CR3T1",
        ))
        .await
        .expect("by topic");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        read_text(response).await,
        "{\n   \"subscriptions\": [\n      \"/projects/ARGO/subscriptions/sub1\"\n   ]\n}"
    );

    // A freshly created topic has no subscriptions yet.
    harness
        .app
        .clone()
        .oneshot(empty_request(
            "PUT",
            "/v1/projects/ARGO/topics/lonely?key=S3CR3T8",
        ))
        .await
        .expect("create");
    let response = harness
        .app
        .clone()
        .oneshot(empty_request(
            "GET",
            "/v1/projects/ARGO/topics/lonely/subscriptions?key=S3CR3T8",
        ))
        .await
        .expect("empty");
    assert_eq!(
        read_text(response).await,
        "{\n   \"subscriptions\": []\n}"
    );
}

#[tokio::test]
async fn per_resource_auth_toggle_relaxes_acl_checks() {
    // UserX is a publisher without an ACL entry on topic1.
    let harness = seeded().await;
    let response = harness
        .app
        .clone()
        .oneshot(empty_request(
            "GET",
            "/v1/projects/ARGO/topics/topic1?key=S3CR3T3",
        ))
        .await
        .expect("acl enforced");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let mut config = common::test_config();
    config.per_resource_auth = false;
    let relaxed = common::seeded_with(config, hermes::push::memory::MemoryPushClient::new()).await;
    let response = relaxed
        .app
        .clone()
        .oneshot(empty_request(
            "GET",
            "/v1/projects/ARGO/topics/topic1?key=S3CR3T3",
        ))
        .await
        .expect("role only");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn acl_filtering_counts_precede_pagination() {
    let harness = seeded().await;
    // Remove UserA from sub2's ACL; the consumer's totalSize shrinks with it.
    harness
        .store
        .set_acl(
            &AclKey::new("argo_uuid", AclKind::Subscriptions, "sub2"),
            vec!["uuid3".to_string()],
        )
        .await
        .expect("set acl");

    let response = harness
        .app
        .clone()
        .oneshot(empty_request(
            "GET",
            "/v1/projects/ARGO/subscriptions?key=S3CR3T1&pageSize=1",
        ))
        .await
        .expect("filtered");
    let payload = read_json(response).await;
    assert_eq!(payload["totalSize"], 2);
    assert_eq!(
        payload["subscriptions"][0]["name"],
        "/projects/ARGO/subscriptions/sub3"
    );
}

#[tokio::test]
async fn admin_token_reaches_admin_surfaces() {
    let harness = seeded().await;
    for uri in [
        "/v1/users?key=",
        "/v1/projects?key=",
        "/v1/projects/ARGO?key=",
    ] {
        let denied = format!("{uri}S3CR3T1");
        let response = harness
            .app
            .clone()
            .oneshot(empty_request("GET", &denied))
            .await
            .expect("denied");
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{denied}");

        let allowed = format!("{uri}{ADMIN}");
        let response = harness
            .app
            .clone()
            .oneshot(empty_request("GET", &allowed))
            .await
            .expect("allowed");
        assert_eq!(response.status(), StatusCode::OK, "{allowed}");
    }
}
