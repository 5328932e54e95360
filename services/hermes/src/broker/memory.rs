//! In-memory broker backend built on the `hermes-log` commit log.
use super::{BrokerResult, LogBroker, Record, TopicStats};
use async_trait::async_trait;
use bytes::Bytes;
use hermes_log::CommitLog;

/// Broker backend for tests, local development and single-node deployments.
/// The commit log itself is synchronous; calls complete without suspension.
#[derive(Default)]
pub struct MemoryLogBroker {
    log: CommitLog,
}

impl MemoryLogBroker {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LogBroker for MemoryLogBroker {
    async fn append(&self, topic: &str, payloads: Vec<Bytes>) -> BrokerResult<Vec<Record>> {
        Ok(self
            .log
            .append(topic, payloads)
            .into_iter()
            .map(|record| Record {
                offset: record.offset,
                payload: record.payload,
                published: record.published,
            })
            .collect())
    }

    async fn read(&self, topic: &str, from_offset: u64, max: usize) -> BrokerResult<Vec<Record>> {
        Ok(self
            .log
            .read(topic, from_offset, max)
            .into_iter()
            .map(|record| Record {
                offset: record.offset,
                payload: record.payload,
                published: record.published,
            })
            .collect())
    }

    async fn delete_topic(&self, topic: &str) -> BrokerResult<()> {
        // Topics materialize on first append, so "not found" here just means
        // nothing was ever published.
        let _ = self.log.delete(topic);
        Ok(())
    }

    async fn topic_stats(&self, topic: &str) -> BrokerResult<TopicStats> {
        let stats = self.log.stats(topic);
        Ok(TopicStats {
            message_count: stats.message_count,
            byte_count: stats.byte_count,
        })
    }
}
