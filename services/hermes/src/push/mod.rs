//! Push-delivery collaborator contract.
//!
//! # Purpose
//! Push delivery is performed by a separate worker process reachable over
//! RPC. The service only activates/deactivates subscriptions on it and asks
//! for its health; the `PushManager` (see `manager`) supervises a local
//! reconcile worker per active push subscription.
use async_trait::async_trait;
use thiserror::Error;

pub mod manager;
pub mod memory;

pub use manager::PushManager;

#[derive(Debug, Error)]
pub enum PushError {
    /// The remote already runs a worker for this subscription.
    #[error("subscription is already active")]
    AlreadyActive,
    /// The remote has no worker for this subscription.
    #[error("subscription is not active")]
    NotActive,
    #[error("push server unreachable: {0}")]
    Unreachable(String),
}

pub type PushResult<T> = Result<T, PushError>;

#[async_trait]
pub trait PushClient: Send + Sync {
    /// Ask the remote worker process to start pushing `sub_path`
    /// (`/projects/{p}/subscriptions/{s}`) to `endpoint` at the given pace.
    async fn activate(&self, sub_path: &str, endpoint: &str, period_ms: u32) -> PushResult<()>;

    /// Ask the remote worker process to stop pushing `sub_path`.
    async fn deactivate(&self, sub_path: &str) -> PushResult<()>;

    /// Probe the remote's serving state. Returns the remote's status reply,
    /// e.g. "SERVING".
    async fn status(&self, endpoint: &str) -> PushResult<String>;
}
