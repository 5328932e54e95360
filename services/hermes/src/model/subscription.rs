//! Subscription model definitions: cursor state and push configuration.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_ACK_DEADLINE_SECONDS: u32 = 10;
pub const MAX_ACK_DEADLINE_SECONDS: u32 = 600;
pub const DEFAULT_RETRY_PERIOD_MS: u32 = 3000;

/// Stable identifier for a subscription, fully qualified by its project.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Hash)]
pub struct SubKey {
    pub project_uuid: String,
    pub name: String,
}

impl SubKey {
    pub fn new(project_uuid: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            project_uuid: project_uuid.into(),
            name: name.into(),
        }
    }
}

/// Redelivery pacing for push subscriptions. Only linear pacing exists.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub kind: String,
    pub period_ms: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            kind: "linear".to_string(),
            period_ms: DEFAULT_RETRY_PERIOD_MS,
        }
    }
}

/// Push configuration of a push-active subscription. Absent on pull-mode
/// subscriptions.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PushState {
    pub endpoint: String,
    pub retry: RetryPolicy,
}

/// A subscription is a cursor over one topic in the same project.
///
/// `next_offset` is the first offset not yet handed to a consumer;
/// `pending_ack` timestamps the outstanding batch and doubles as the ack
/// lease. `push_status` is free text describing the last push lifecycle
/// transition.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Subscription {
    pub project_uuid: String,
    pub name: String,
    pub topic: String,
    pub push: Option<PushState>,
    pub ack_deadline_seconds: u32,
    pub next_offset: u64,
    pub pending_ack: Option<DateTime<Utc>>,
    pub push_status: String,
    pub consumed_messages: u64,
    pub consumed_bytes: u64,
}

impl Subscription {
    pub fn new(project_uuid: impl Into<String>, name: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            project_uuid: project_uuid.into(),
            name: name.into(),
            topic: topic.into(),
            push: None,
            ack_deadline_seconds: DEFAULT_ACK_DEADLINE_SECONDS,
            next_offset: 0,
            pending_ack: None,
            push_status: String::new(),
            consumed_messages: 0,
            consumed_bytes: 0,
        }
    }

    pub fn key(&self) -> SubKey {
        SubKey::new(self.project_uuid.clone(), self.name.clone())
    }

    /// A subscription with a configured endpoint is push-active.
    pub fn is_push_active(&self) -> bool {
        self.push
            .as_ref()
            .map(|push| !push.endpoint.is_empty())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_active_requires_endpoint() {
        let mut sub = Subscription::new("argo_uuid", "sub1", "topic1");
        assert!(!sub.is_push_active());

        sub.push = Some(PushState {
            endpoint: String::new(),
            retry: RetryPolicy::default(),
        });
        assert!(!sub.is_push_active());

        sub.push = Some(PushState {
            endpoint: "https://www.example.com".to_string(),
            retry: RetryPolicy::default(),
        });
        assert!(sub.is_push_active());
    }

    #[test]
    fn retry_policy_defaults_to_linear_3000() {
        let retry = RetryPolicy::default();
        assert_eq!(retry.kind, "linear");
        assert_eq!(retry.period_ms, 3000);
    }
}
