//! HTTP application wiring.
//!
//! # Purpose
//! Defines the shared application state, builds the router, and hosts the
//! OpenAPI document. Route composition lives here so `main` stays small and
//! tests can drive the exact production router.
use crate::api;
use crate::broker::LogBroker;
use crate::config::ApiConfig;
use crate::push::{PushClient, PushManager};
use crate::store::MetadataStore;
use axum::extract::{Request, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ApiConfig>,
    pub store: Arc<dyn MetadataStore>,
    pub broker: Arc<dyn LogBroker>,
    pub push_client: Arc<dyn PushClient>,
    pub push_manager: PushManager,
}

pub fn build_router(state: AppState) -> Router {
    let trace_layer =
        TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
            tracing::info_span!(
                "http.request",
                method = %request.method(),
                uri = %request.uri(),
                version = ?request.version()
            )
        });

    Router::new()
        .route("/v1/users/profile", get(api::users::profile))
        .route("/v1/users", get(api::users::list_users))
        .route(
            "/v1/users/:user",
            get(api::users::get_user)
                .post(api::users::post_user)
                .put(api::users::update_user)
                .delete(api::users::delete_user),
        )
        .route("/v1/projects", get(api::projects::list_projects))
        .route(
            "/v1/projects/:project",
            get(api::projects::get_project_or_verb)
                .post(api::projects::create_project)
                .put(api::projects::update_project)
                .delete(api::projects::delete_project),
        )
        .route(
            "/v1/projects/:project/topics",
            get(api::topics::list_topics),
        )
        .route(
            "/v1/projects/:project/topics/:topic",
            get(api::topics::get_topic_or_verb)
                .put(api::topics::create_topic)
                .delete(api::topics::delete_topic)
                .post(api::topics::post_topic_verb),
        )
        .route(
            "/v1/projects/:project/topics/:topic/subscriptions",
            get(api::topics::list_topic_subscriptions),
        )
        .route(
            "/v1/projects/:project/subscriptions",
            get(api::subscriptions::list_subscriptions),
        )
        .route(
            "/v1/projects/:project/subscriptions/:subscription",
            get(api::subscriptions::get_sub_or_verb)
                .put(api::subscriptions::create_subscription)
                .delete(api::subscriptions::delete_subscription)
                .post(api::subscriptions::post_sub_verb),
        )
        .route("/v1/metrics", get(api::status::op_metrics))
        .route("/v1/status", get(api::status::health))
        .merge(
            utoipa_swagger_ui::SwaggerUi::new("/docs").url("/v1/openapi.json", ApiDoc::openapi()),
        )
        .fallback(fallback)
        .layer(trace_layer)
        .with_state(state)
}

/// The lookup-by-token/uuid endpoints put the selector inside the `users`
/// path segment (`/v1/users:byToken/{token}`). The router cannot express a
/// mid-segment literal next to `/v1/users/{user}`, so these two paths are
/// matched here.
async fn fallback(State(state): State<AppState>, request: Request) -> Response {
    let path = request.uri().path().to_string();
    let query: HashMap<String, String> = request
        .uri()
        .query()
        .map(|raw| {
            url::form_urlencoded::parse(raw.as_bytes())
                .into_owned()
                .collect()
        })
        .unwrap_or_default();
    let headers = request.headers().clone();

    if request.method() == axum::http::Method::GET {
        if let Some(token) = path.strip_prefix("/v1/users:byToken/") {
            return api::users::get_user_by_token(state, token.to_string(), query, headers)
                .await
                .unwrap_or_else(IntoResponse::into_response);
        }
        if let Some(uuid) = path.strip_prefix("/v1/users:byUUID/") {
            return api::users::get_user_by_uuid(state, uuid.to_string(), query, headers)
                .await
                .unwrap_or_else(IntoResponse::into_response);
        }
    }
    api::error::api_not_found("Not Found").into_response()
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "hermes",
        version = "v1",
        description = "Multi-tenant pub/sub messaging API"
    ),
    paths(
        api::status::health,
        api::status::op_metrics,
        api::users::profile,
        api::users::list_users,
        api::users::get_user,
        api::users::update_user,
        api::users::delete_user,
        api::projects::list_projects,
        api::projects::create_project,
        api::projects::update_project,
        api::projects::delete_project,
        api::topics::list_topics,
        api::topics::create_topic,
        api::topics::delete_topic,
        api::topics::list_topic_subscriptions,
        api::subscriptions::list_subscriptions,
        api::subscriptions::create_subscription,
        api::subscriptions::delete_subscription
    ),
    components(schemas(
        api::error::ErrorBody,
        api::error::ErrorResponse,
        api::types::UserInfo,
        api::types::UserProjectInfo,
        api::types::UserListResponse,
        api::types::ProjectInfo,
        api::types::ProjectListResponse,
        api::types::TopicInfo,
        api::types::TopicListResponse,
        api::types::TopicSubscriptionsResponse,
        api::types::SubscriptionInfo,
        api::types::SubscriptionListResponse,
        api::types::PushConfigInfo,
        api::types::RetryPolicyInfo,
        api::types::PublishResponse,
        api::types::PullResponse,
        api::types::ReceivedMessage,
        api::types::MessageInfo,
        api::types::AclResponse,
        api::types::HealthResponse,
        api::types::PushServerInfo,
        crate::metrics::Metric,
        crate::metrics::MetricList,
        crate::metrics::Timepoint
    )),
    tags(
        (name = "status", description = "Health and operational metrics"),
        (name = "users", description = "User management"),
        (name = "projects", description = "Project management"),
        (name = "topics", description = "Topic management and publishing"),
        (name = "subscriptions", description = "Subscription management and consumption")
    )
)]
struct ApiDoc;
