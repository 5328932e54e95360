// Hermes API service
// ------------------
// Multi-tenant pub/sub messaging API. Clients publish to named topics inside
// projects and consume through subscriptions, pulling or having a remote
// worker push to HTTPS endpoints. All message traffic flows through an
// offset-addressed commit log; the metadata store is the source of truth for
// configuration state.
//
// The binary ships with the in-memory collaborator backends. The live
// document-store, Kafka and push-RPC backends plug in through the same
// traits and are deployed as external processes; their connection settings
// (store_host, zookeeper_hosts, push_server_*) are carried in the
// configuration for them.
use anyhow::Context;
use hermes::app::{build_router, AppState};
use hermes::broker::memory::MemoryLogBroker;
use hermes::broker::LogBroker;
use hermes::config::ApiConfig;
use hermes::observability;
use hermes::push::memory::MemoryPushClient;
use hermes::push::{PushClient, PushManager};
use hermes::store::memory::InMemoryStore;
use hermes::store::MetadataStore;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let metrics_handle = observability::init_observability();

    let config = ApiConfig::load().context("load configuration")?;

    let store: Arc<dyn MetadataStore> = Arc::new(InMemoryStore::new());
    let broker: Arc<dyn LogBroker> = Arc::new(MemoryLogBroker::new());
    let push_client: Arc<dyn PushClient> = Arc::new(MemoryPushClient::new());
    tracing::info!(
        store = store.backend_name(),
        push_enabled = config.push_enabled,
        "collaborator backends ready"
    );

    let push_manager = PushManager::start(Arc::clone(&store), Arc::clone(&push_client)).await;

    tokio::spawn(observability::serve_metrics(
        metrics_handle,
        config.metrics_bind,
    ));

    let addr = config.bind_addr()?;
    let state = AppState {
        config: Arc::new(config),
        store,
        broker,
        push_client,
        push_manager,
    };
    let app = build_router(state);

    tracing::info!(%addr, "hermes api listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
