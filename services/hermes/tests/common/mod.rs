//! Shared harness for router-level tests: seeded state, request builders
//! and body readers.
#![allow(dead_code)]
use axum::body::Body;
use axum::http::Request;
use hermes::app::{build_router, AppState};
use hermes::broker::memory::MemoryLogBroker;
use hermes::broker::LogBroker;
use hermes::config::ApiConfig;
use hermes::push::memory::MemoryPushClient;
use hermes::push::{PushClient, PushManager};
use hermes::store::memory::InMemoryStore;
use hermes::store::MetadataStore;
use std::sync::Arc;

pub type App = axum::routing::RouterIntoService<Body, ()>;

pub struct TestApp {
    pub app: App,
    pub store: Arc<InMemoryStore>,
    pub push_client: Arc<MemoryPushClient>,
}

pub fn test_config() -> ApiConfig {
    ApiConfig::from_json_str(
        r#"{
        "bind_ip": "",
        "port": 8080,
        "zookeeper_hosts": ["localhost"],
        "store_host": "localhost",
        "store_db": "hermes_test",
        "per_resource_auth": "true",
        "push_enabled": "true",
        "push_worker_token": "push_token"
    }"#,
    )
    .expect("test config")
}

pub async fn seeded() -> TestApp {
    seeded_with(test_config(), MemoryPushClient::new()).await
}

pub async fn seeded_with(config: ApiConfig, push_client: MemoryPushClient) -> TestApp {
    let store = Arc::new(InMemoryStore::seeded());
    let push_client = Arc::new(push_client);

    let state_store: Arc<dyn MetadataStore> = Arc::clone(&store) as Arc<dyn MetadataStore>;
    let state_push: Arc<dyn PushClient> = Arc::clone(&push_client) as Arc<dyn PushClient>;
    let broker: Arc<dyn LogBroker> = Arc::new(MemoryLogBroker::new());
    let push_manager = PushManager::start(Arc::clone(&state_store), Arc::clone(&state_push)).await;

    let state = AppState {
        config: Arc::new(config),
        store: state_store,
        broker,
        push_client: state_push,
        push_manager,
    };
    TestApp {
        app: build_router(state).into_service(),
        store,
        push_client,
    }
}

pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

pub fn raw_request(method: &str, uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

pub fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

pub async fn read_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    String::from_utf8(bytes.to_vec()).expect("utf8")
}

pub async fn read_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

/// Error envelope as an exact snapshot string, 3-space indented.
pub fn error_snapshot(code: u16, message: &str, status: &str) -> String {
    format!(
        "{{\n   \"error\": {{\n      \"code\": {code},\n      \"message\": \"{message}\",\n      \"status\": \"{status}\"\n   }}\n}}"
    )
}
