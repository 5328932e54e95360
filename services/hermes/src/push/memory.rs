//! In-memory push client used by tests and local development.
use super::{PushClient, PushError, PushResult};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;

/// Fake remote push worker. Activation state is tracked in-process; the fake
/// can be scripted with subscriptions the "remote" already runs and with an
/// unreachable serving state.
pub struct MemoryPushClient {
    active: Mutex<HashSet<String>>,
    serving: bool,
    status_calls: Mutex<u64>,
}

impl Default for MemoryPushClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPushClient {
    pub fn new() -> Self {
        Self {
            active: Mutex::new(HashSet::new()),
            serving: true,
            status_calls: Mutex::new(0),
        }
    }

    /// Script subscriptions the remote claims to already be pushing.
    pub fn with_preactivated(self, sub_paths: &[&str]) -> Self {
        {
            let mut active = self.active.lock().expect("active lock");
            for path in sub_paths {
                active.insert((*path).to_string());
            }
        }
        self
    }

    /// Script an unreachable remote.
    pub fn unreachable(mut self) -> Self {
        self.serving = false;
        self
    }

    pub fn is_active(&self, sub_path: &str) -> bool {
        self.active.lock().expect("active lock").contains(sub_path)
    }

    pub fn status_call_count(&self) -> u64 {
        *self.status_calls.lock().expect("status lock")
    }
}

#[async_trait]
impl PushClient for MemoryPushClient {
    async fn activate(&self, sub_path: &str, _endpoint: &str, _period_ms: u32) -> PushResult<()> {
        let mut active = self.active.lock().expect("active lock");
        if !active.insert(sub_path.to_string()) {
            return Err(PushError::AlreadyActive);
        }
        Ok(())
    }

    async fn deactivate(&self, sub_path: &str) -> PushResult<()> {
        let mut active = self.active.lock().expect("active lock");
        if !active.remove(sub_path) {
            return Err(PushError::NotActive);
        }
        Ok(())
    }

    async fn status(&self, _endpoint: &str) -> PushResult<String> {
        *self.status_calls.lock().expect("status lock") += 1;
        if self.serving {
            Ok("SERVING".to_string())
        } else {
            Err(PushError::Unreachable("connection refused".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn activate_deactivate_track_state() {
        let client = MemoryPushClient::new();
        client
            .activate("/projects/ARGO/subscriptions/sub1", "https://example.com", 3000)
            .await
            .expect("activate");
        assert!(client.is_active("/projects/ARGO/subscriptions/sub1"));

        let err = client
            .activate("/projects/ARGO/subscriptions/sub1", "https://example.com", 3000)
            .await
            .expect_err("double activate");
        assert!(matches!(err, PushError::AlreadyActive));

        client
            .deactivate("/projects/ARGO/subscriptions/sub1")
            .await
            .expect("deactivate");
        let err = client
            .deactivate("/projects/ARGO/subscriptions/sub1")
            .await
            .expect_err("double deactivate");
        assert!(matches!(err, PushError::NotActive));
    }

    #[tokio::test]
    async fn scripted_states() {
        let client = MemoryPushClient::new().with_preactivated(&["/projects/ARGO/subscriptions/errorSub"]);
        let err = client
            .activate("/projects/ARGO/subscriptions/errorSub", "https://example.com", 3000)
            .await
            .expect_err("preactivated");
        assert!(matches!(err, PushError::AlreadyActive));

        let down = MemoryPushClient::new().unreachable();
        let err = down.status("localhost:5555").await.expect_err("down");
        assert!(matches!(err, PushError::Unreachable(_)));

        let up = MemoryPushClient::new();
        assert_eq!(up.status("localhost:5555").await.expect("status"), "SERVING");
    }
}
