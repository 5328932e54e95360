//! Commit-log broker contract.
//!
//! # Purpose
//! All message traffic goes through an offset-addressed log. The API layer
//! serializes each message (attributes + data) to bytes; the broker only
//! hands out offsets, replays ranges and reports per-topic counters.
//!
//! # Notes
//! The live Kafka-backed broker is an external collaborator; this crate
//! ships the contract plus the in-memory backend built on `hermes-log`.
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub mod memory;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("broker unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

pub type BrokerResult<T> = Result<T, BrokerError>;

/// One record as stored in (or read back from) the log.
#[derive(Debug, Clone)]
pub struct Record {
    pub offset: u64,
    pub payload: Bytes,
    pub published: DateTime<Utc>,
}

/// Per-topic counters reported by the broker.
#[derive(Debug, Clone, Copy, Default)]
pub struct TopicStats {
    pub message_count: u64,
    pub byte_count: u64,
}

#[async_trait]
pub trait LogBroker: Send + Sync {
    /// Append a batch to `topic`, creating it on first use. Returns the
    /// appended records in input order with their assigned offsets and the
    /// broker's append time.
    async fn append(&self, topic: &str, payloads: Vec<Bytes>) -> BrokerResult<Vec<Record>>;

    /// Read up to `max` records starting at `from_offset`, oldest first.
    async fn read(&self, topic: &str, from_offset: u64, max: usize) -> BrokerResult<Vec<Record>>;

    /// Drop a topic and everything it retained. Unknown topics are a no-op:
    /// a topic that never saw an append has no log to delete.
    async fn delete_topic(&self, topic: &str) -> BrokerResult<()>;

    async fn topic_stats(&self, topic: &str) -> BrokerResult<TopicStats>;
}
