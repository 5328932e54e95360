// In-process commit log with offset-addressed topics.
// Topics are created lazily on first append; the API layer decides which
// topic names are legal, the log only hands out offsets and replays ranges.
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock};

pub type Result<T> = std::result::Result<T, LogError>;

#[derive(thiserror::Error, Debug)]
pub enum LogError {
    #[error("retention capacity must be non-zero")]
    InvalidCapacity,
    #[error("topic not found: {0}")]
    TopicNotFound(String),
}

const DEFAULT_RETENTION: usize = 100_000;

/// A single appended record together with its assigned offset and the
/// wall-clock time the log observed at append.
#[derive(Debug, Clone)]
pub struct Record {
    pub offset: u64,
    pub payload: Bytes,
    pub published: DateTime<Utc>,
}

/// Cumulative per-topic counters. Counters keep growing even after old
/// entries fall out of the retention window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TopicStats {
    pub message_count: u64,
    pub byte_count: u64,
    pub min_offset: u64,
    pub max_offset: u64,
}

#[derive(Debug)]
struct LogState {
    // Bounded log; oldest entries are dropped as new ones arrive.
    entries: VecDeque<Record>,
    // Next offset to assign.
    next_offset: u64,
    message_count: u64,
    byte_count: u64,
}

#[derive(Debug)]
struct TopicLog {
    state: Mutex<LogState>,
}

impl TopicLog {
    fn new() -> Self {
        Self {
            state: Mutex::new(LogState {
                entries: VecDeque::new(),
                next_offset: 0,
                message_count: 0,
                byte_count: 0,
            }),
        }
    }

    fn append(&self, payloads: Vec<Bytes>, retention: usize) -> Vec<Record> {
        let mut state = self.state.lock().expect("log lock");
        let mut appended = Vec::with_capacity(payloads.len());
        for payload in payloads {
            let record = Record {
                offset: state.next_offset,
                published: Utc::now(),
                payload,
            };
            state.next_offset += 1;
            state.message_count += 1;
            state.byte_count += record.payload.len() as u64;
            state.entries.push_back(record.clone());
            appended.push(record);
        }
        // Keep only the newest entries up to the configured retention.
        while state.entries.len() > retention {
            state.entries.pop_front();
        }
        appended
    }

    fn read(&self, from_offset: u64, max: usize) -> Vec<Record> {
        let state = self.state.lock().expect("log lock");
        state
            .entries
            .iter()
            .filter(|record| record.offset >= from_offset)
            .take(max)
            .cloned()
            .collect()
    }

    fn stats(&self) -> TopicStats {
        let state = self.state.lock().expect("log lock");
        TopicStats {
            message_count: state.message_count,
            byte_count: state.byte_count,
            min_offset: state
                .entries
                .front()
                .map(|record| record.offset)
                .unwrap_or(state.next_offset),
            max_offset: state.next_offset,
        }
    }
}

/// Registry of topic logs.
///
/// Offsets are assigned per topic, strictly increasing, starting at zero.
/// `read` replays the retained window; consumers that fall behind the window
/// simply resume from the oldest retained offset.
#[derive(Debug)]
pub struct CommitLog {
    topics: RwLock<HashMap<String, Arc<TopicLog>>>,
    retention: usize,
}

impl Default for CommitLog {
    fn default() -> Self {
        Self::new()
    }
}

impl CommitLog {
    pub fn new() -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            retention: DEFAULT_RETENTION,
        }
    }

    pub fn with_retention(retention: usize) -> Result<Self> {
        if retention == 0 {
            return Err(LogError::InvalidCapacity);
        }
        Ok(Self {
            topics: RwLock::new(HashMap::new()),
            retention,
        })
    }

    /// Append a batch to a topic, creating the topic log on first use.
    /// Returns the appended records in input order with assigned offsets.
    pub fn append(&self, topic: &str, payloads: Vec<Bytes>) -> Vec<Record> {
        let log = self.topic_log(topic);
        log.append(payloads, self.retention)
    }

    /// Read up to `max` records starting at `from_offset`, oldest first.
    /// Unknown topics read as empty, matching a log that has never been
    /// written to.
    pub fn read(&self, topic: &str, from_offset: u64, max: usize) -> Vec<Record> {
        let topics = self.topics.read().expect("topics lock");
        match topics.get(topic) {
            Some(log) => log.read(from_offset, max),
            None => Vec::new(),
        }
    }

    pub fn stats(&self, topic: &str) -> TopicStats {
        let topics = self.topics.read().expect("topics lock");
        topics
            .get(topic)
            .map(|log| log.stats())
            .unwrap_or_default()
    }

    /// Drop a topic log and everything it retained.
    pub fn delete(&self, topic: &str) -> Result<()> {
        let mut topics = self.topics.write().expect("topics lock");
        topics
            .remove(topic)
            .map(|_| ())
            .ok_or_else(|| LogError::TopicNotFound(topic.to_string()))
    }

    fn topic_log(&self, topic: &str) -> Arc<TopicLog> {
        if let Some(log) = self.topics.read().expect("topics lock").get(topic) {
            return Arc::clone(log);
        }
        let mut topics = self.topics.write().expect("topics lock");
        Arc::clone(
            topics
                .entry(topic.to_string())
                .or_insert_with(|| Arc::new(TopicLog::new())),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_start_at_zero_and_increase() {
        let log = CommitLog::new();
        let first = log.append("argo.topic1", vec![Bytes::from_static(b"a")]);
        assert_eq!(first[0].offset, 0);

        let batch = log.append(
            "argo.topic1",
            vec![Bytes::from_static(b"b"), Bytes::from_static(b"c")],
        );
        assert_eq!(batch[0].offset, 1);
        assert_eq!(batch[1].offset, 2);

        // Offsets are per topic, not global.
        let other = log.append("argo.topic2", vec![Bytes::from_static(b"d")]);
        assert_eq!(other[0].offset, 0);
    }

    #[test]
    fn read_replays_from_offset() {
        let log = CommitLog::new();
        log.append(
            "t",
            vec![
                Bytes::from_static(b"m0"),
                Bytes::from_static(b"m1"),
                Bytes::from_static(b"m2"),
            ],
        );

        let all = log.read("t", 0, usize::MAX);
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].payload, Bytes::from_static(b"m0"));

        let tail = log.read("t", 1, usize::MAX);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].offset, 1);

        let capped = log.read("t", 0, 2);
        assert_eq!(capped.len(), 2);

        assert!(log.read("t", 3, usize::MAX).is_empty());
        assert!(log.read("missing", 0, usize::MAX).is_empty());
    }

    #[test]
    fn retention_drops_oldest_but_keeps_offsets() {
        let log = CommitLog::with_retention(2).expect("retention");
        log.append(
            "t",
            vec![
                Bytes::from_static(b"m0"),
                Bytes::from_static(b"m1"),
                Bytes::from_static(b"m2"),
            ],
        );

        let retained = log.read("t", 0, usize::MAX);
        assert_eq!(retained.len(), 2);
        assert_eq!(retained[0].offset, 1);

        let stats = log.stats("t");
        assert_eq!(stats.message_count, 3);
        assert_eq!(stats.min_offset, 1);
        assert_eq!(stats.max_offset, 3);
    }

    #[test]
    fn zero_retention_is_rejected() {
        assert!(matches!(
            CommitLog::with_retention(0),
            Err(LogError::InvalidCapacity)
        ));
    }

    #[test]
    fn stats_track_messages_and_bytes() {
        let log = CommitLog::new();
        log.append(
            "t",
            vec![Bytes::from_static(b"abcd"), Bytes::from_static(b"ef")],
        );
        let stats = log.stats("t");
        assert_eq!(stats.message_count, 2);
        assert_eq!(stats.byte_count, 6);

        // Unknown topics report zeroed counters.
        assert_eq!(log.stats("missing"), TopicStats::default());
    }

    #[test]
    fn delete_removes_topic_state() {
        let log = CommitLog::new();
        log.append("t", vec![Bytes::from_static(b"m0")]);
        log.delete("t").expect("delete");
        assert!(log.read("t", 0, usize::MAX).is_empty());
        // A fresh append restarts offsets from zero.
        let records = log.append("t", vec![Bytes::from_static(b"m1")]);
        assert_eq!(records[0].offset, 0);

        assert!(matches!(
            log.delete("missing"),
            Err(LogError::TopicNotFound(_))
        ));
    }
}
