//! Push subscription worker supervision.
//!
//! # Purpose
//! The manager owns one long-lived worker task per active push subscription.
//! HTTP handlers never touch the registry directly: they perform the
//! synchronous activate/deactivate RPC (so the response carries the remote's
//! answer) and then post Add/Remove commands here. The supervisor task is
//! the single owner of the registry, so there is no shared mutable map.
//!
//! Each worker re-probes the remote's serving state at the subscription's
//! retry period and logs failures; stopping a worker flips its watch signal
//! and waits for the in-flight probe to finish, bounded by a grace period.
use super::PushClient;
use crate::model::{SubKey, Subscription, DEFAULT_RETRY_PERIOD_MS};
use crate::store::MetadataStore;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

const COMMAND_BUFFER: usize = 64;
const STOP_GRACE: Duration = Duration::from_secs(5);

enum Command {
    Add(Subscription),
    Remove(SubKey),
}

struct WorkerHandle {
    stop: watch::Sender<bool>,
    join: JoinHandle<()>,
}

/// Handle to the supervisor task. Cloneable; dropping every handle shuts the
/// supervisor down after it has stopped its workers.
#[derive(Clone)]
pub struct PushManager {
    commands: mpsc::Sender<Command>,
}

impl PushManager {
    /// Spawn the supervisor and start workers for every subscription that is
    /// already push-active in the store.
    pub async fn start(store: Arc<dyn MetadataStore>, client: Arc<dyn PushClient>) -> Self {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let manager = Self { commands: tx };

        tokio::spawn(supervise(rx, client));

        match existing_push_subs(store.as_ref()).await {
            Ok(subs) => {
                for sub in subs {
                    manager.add(sub).await;
                }
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to load push subscriptions at startup");
            }
        }
        manager
    }

    /// Register (or refresh) the worker for a push-active subscription.
    pub async fn add(&self, sub: Subscription) {
        if self.commands.send(Command::Add(sub)).await.is_err() {
            tracing::error!("push manager is down; add command dropped");
        }
    }

    /// Stop and forget the worker for a subscription.
    pub async fn remove(&self, key: SubKey) {
        if self.commands.send(Command::Remove(key)).await.is_err() {
            tracing::error!("push manager is down; remove command dropped");
        }
    }
}

async fn existing_push_subs(
    store: &dyn MetadataStore,
) -> crate::store::StoreResult<Vec<Subscription>> {
    let mut push_active = Vec::new();
    for project in store.list_projects().await? {
        for sub in store.list_subs(&project.uuid).await? {
            if sub.is_push_active() {
                push_active.push(sub);
            }
        }
    }
    Ok(push_active)
}

async fn supervise(mut commands: mpsc::Receiver<Command>, client: Arc<dyn PushClient>) {
    let mut workers: HashMap<SubKey, WorkerHandle> = HashMap::new();

    while let Some(command) = commands.recv().await {
        match command {
            Command::Add(sub) => {
                let key = sub.key();
                // A config update replaces the running worker.
                if let Some(existing) = workers.remove(&key) {
                    stop_worker(&key, existing).await;
                }
                let Some(push) = sub.push.clone() else {
                    tracing::warn!(
                        project = %key.project_uuid,
                        subscription = %key.name,
                        "add command for a subscription without push config"
                    );
                    continue;
                };
                let (stop_tx, stop_rx) = watch::channel(false);
                let period = if push.retry.period_ms == 0 {
                    DEFAULT_RETRY_PERIOD_MS
                } else {
                    push.retry.period_ms
                };
                let join = tokio::spawn(run_worker(
                    key.clone(),
                    push.endpoint,
                    u64::from(period),
                    Arc::clone(&client),
                    stop_rx,
                ));
                workers.insert(key, WorkerHandle { stop: stop_tx, join });
            }
            Command::Remove(key) => {
                if let Some(existing) = workers.remove(&key) {
                    stop_worker(&key, existing).await;
                }
            }
        }
    }

    // Channel closed: the service is shutting down. Stop everything.
    for (key, handle) in workers.drain() {
        stop_worker(&key, handle).await;
    }
}

async fn stop_worker(key: &SubKey, handle: WorkerHandle) {
    let _ = handle.stop.send(true);
    if tokio::time::timeout(STOP_GRACE, handle.join).await.is_err() {
        tracing::warn!(
            project = %key.project_uuid,
            subscription = %key.name,
            "push worker did not stop within grace period"
        );
    }
}

async fn run_worker(
    key: SubKey,
    endpoint: String,
    period_ms: u64,
    client: Arc<dyn PushClient>,
    mut stop: watch::Receiver<bool>,
) {
    tracing::info!(
        project = %key.project_uuid,
        subscription = %key.name,
        endpoint = %endpoint,
        period_ms,
        "push worker started"
    );
    loop {
        if *stop.borrow() {
            break;
        }
        // The probe is awaited to completion; the stop signal is only
        // observed between probes, which is what lets an in-flight call
        // finish naturally.
        match client.status(&endpoint).await {
            Ok(status) => {
                tracing::debug!(
                    subscription = %key.name,
                    status = %status,
                    "push endpoint probe"
                );
            }
            Err(err) => {
                metrics::counter!("hermes_push_probe_failures_total").increment(1);
                tracing::warn!(
                    project = %key.project_uuid,
                    subscription = %key.name,
                    error = %err,
                    "push endpoint probe failed"
                );
            }
        }
        tokio::select! {
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    break;
                }
            }
            _ = tokio::time::sleep(Duration::from_millis(period_ms)) => {}
        }
    }
    tracing::info!(
        project = %key.project_uuid,
        subscription = %key.name,
        "push worker stopped"
    );
}
