//! On-demand metric synthesis for topics, subscriptions, projects and the
//! service node.
//!
//! # Purpose
//! Nothing here runs in the background: every metric object is computed from
//! store and broker counters at request time, stamped with the generation
//! instant.
use crate::broker::{BrokerError, LogBroker};
use crate::model::{Project, Subscription, Topic, TopicKey, User};
use crate::store::{MetadataStore, StoreError};
use chrono::{NaiveDate, SecondsFormat, Utc};
use serde::Serialize;
use sysinfo::System;
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Broker(#[from] BrokerError),
}

pub type MetricsResult<T> = Result<T, MetricsError>;

#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct Timepoint {
    pub timestamp: String,
    #[schema(value_type = f64)]
    pub value: serde_json::Value,
}

#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct Metric {
    pub metric: String,
    pub metric_type: String,
    pub value_type: String,
    pub resource_type: String,
    pub resource_name: String,
    pub timeseries: Vec<Timepoint>,
    pub description: String,
}

#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct MetricList {
    pub metrics: Vec<Metric>,
}

fn now_stamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn counter(
    metric: &str,
    resource_type: &str,
    resource_name: &str,
    value: u64,
    description: &str,
) -> Metric {
    Metric {
        metric: metric.to_string(),
        metric_type: "counter".to_string(),
        value_type: "int64".to_string(),
        resource_type: resource_type.to_string(),
        resource_name: resource_name.to_string(),
        timeseries: vec![Timepoint {
            timestamp: now_stamp(),
            value: serde_json::Value::from(value),
        }],
        description: description.to_string(),
    }
}

/// The two most recent days with a non-zero publish count, oldest of the
/// pair first. `counts` arrives sorted by date ascending.
fn daily_series(counts: Vec<(NaiveDate, u64)>) -> Vec<Timepoint> {
    let non_zero: Vec<(NaiveDate, u64)> =
        counts.into_iter().filter(|(_, count)| *count > 0).collect();
    let tail = non_zero.len().saturating_sub(2);
    non_zero[tail..]
        .iter()
        .map(|(date, count)| Timepoint {
            timestamp: date.format("%Y-%m-%d").to_string(),
            value: serde_json::Value::from(*count),
        })
        .collect()
}

fn daily_counter(
    metric: &str,
    resource_type: &str,
    resource_name: &str,
    series: Vec<Timepoint>,
    description: &str,
) -> Metric {
    Metric {
        metric: metric.to_string(),
        metric_type: "counter".to_string(),
        value_type: "int64".to_string(),
        resource_type: resource_type.to_string(),
        resource_name: resource_name.to_string(),
        timeseries: series,
        description: description.to_string(),
    }
}

/// Metrics for one topic: dependent subscription count, broker counters and
/// the daily publish series.
pub async fn topic_metrics(
    store: &dyn MetadataStore,
    broker: &dyn LogBroker,
    topic: &Topic,
) -> MetricsResult<MetricList> {
    let key = TopicKey::new(topic.project_uuid.clone(), topic.name.clone());
    let sub_count = store.subs_for_topic(&key).await?.len() as u64;
    let stats = broker.topic_stats(&topic.log_topic()).await?;
    let daily = store.daily_for_topic(&key).await?;

    Ok(MetricList {
        metrics: vec![
            counter(
                "topic.number_of_subscriptions",
                "topic",
                &topic.name,
                sub_count,
                "Counter that displays the number of subscriptions belonging to a specific topic",
            ),
            counter(
                "topic.number_of_messages",
                "topic",
                &topic.name,
                stats.message_count,
                "Counter that displays the number of messages published to the specific topic",
            ),
            counter(
                "topic.number_of_bytes",
                "topic",
                &topic.name,
                stats.byte_count,
                "Counter that displays the total size of data (in bytes) published to the specific topic",
            ),
            daily_counter(
                "topic.number_of_daily_messages",
                "topic",
                &topic.name,
                daily_series(daily),
                "A collection of counters that represents the total number of messages published each day to a specific topic",
            ),
        ],
    })
}

/// Metrics for one subscription: its consumption counters.
pub fn sub_metrics(sub: &Subscription) -> MetricList {
    MetricList {
        metrics: vec![
            counter(
                "subscription.number_of_messages",
                "subscription",
                &sub.name,
                sub.consumed_messages,
                "Counter that displays the number of messages consumed from the specific subscription",
            ),
            counter(
                "subscription.number_of_bytes",
                "subscription",
                &sub.name,
                sub.consumed_bytes,
                "Counter that displays the total size of data (in bytes) consumed from the specific subscription",
            ),
        ],
    }
}

/// Project metrics: resource counts, per-member ACL counts and the summed
/// daily publish series.
pub async fn project_metrics(
    store: &dyn MetadataStore,
    project: &Project,
) -> MetricsResult<MetricList> {
    let topics = store.list_topics(&project.uuid).await?;
    let subs = store.list_subs(&project.uuid).await?;
    let daily = store.daily_for_project(&project.uuid).await?;

    let mut metrics = vec![
        counter(
            "project.number_of_topics",
            "project",
            &project.name,
            topics.len() as u64,
            "Counter that displays the number of topics belonging to the specific project",
        ),
        counter(
            "project.number_of_subscriptions",
            "project",
            &project.name,
            subs.len() as u64,
            "Counter that displays the number of subscriptions belonging to the specific project",
        ),
    ];

    // Per-user ACL counts within the project, one metric per member with a
    // non-zero count. Members iterate in store order so output is stable.
    let members: Vec<User> = store
        .list_users()
        .await?
        .into_iter()
        .filter(|user| user.membership(&project.uuid).is_some())
        .collect();

    let mut topic_counts = Vec::new();
    let mut sub_counts = Vec::new();
    for member in &members {
        let mut topic_count = 0u64;
        for topic in &topics {
            let acl = store
                .acl(&crate::model::AclKey::new(
                    project.uuid.clone(),
                    crate::model::AclKind::Topics,
                    topic.name.clone(),
                ))
                .await?;
            if acl.iter().any(|uuid| *uuid == member.uuid) {
                topic_count += 1;
            }
        }
        if topic_count > 0 {
            topic_counts.push((member.name.clone(), topic_count));
        }

        let mut sub_count = 0u64;
        for sub in &subs {
            let acl = store
                .acl(&crate::model::AclKey::new(
                    project.uuid.clone(),
                    crate::model::AclKind::Subscriptions,
                    sub.name.clone(),
                ))
                .await?;
            if acl.iter().any(|uuid| *uuid == member.uuid) {
                sub_count += 1;
            }
        }
        if sub_count > 0 {
            sub_counts.push((member.name.clone(), sub_count));
        }
    }

    for (name, count) in topic_counts {
        metrics.push(counter(
            "project.user.number_of_topics",
            "project.user",
            &format!("{}.{}", project.name, name),
            count,
            "Counter that displays the number of topics that a user has access to the specific project",
        ));
    }
    for (name, count) in sub_counts {
        metrics.push(counter(
            "project.user.number_of_subscriptions",
            "project.user",
            &format!("{}.{}", project.name, name),
            count,
            "Counter that displays the number of subscriptions that a user has access to the specific project",
        ));
    }

    metrics.push(daily_counter(
        "project.number_of_daily_messages",
        "project",
        &project.name,
        daily_series(daily),
        "A collection of counters that represents the total number of messages published each day to all of the project's topics",
    ));

    Ok(MetricList { metrics })
}

/// Node metrics: CPU and memory usage of the service host, probed at request
/// time.
pub fn node_metrics() -> MetricList {
    let mut system = System::new();
    system.refresh_cpu();
    system.refresh_memory();

    let cpu = f64::from(system.global_cpu_info().cpu_usage());
    let memory = if system.total_memory() == 0 {
        0.0
    } else {
        system.used_memory() as f64 / system.total_memory() as f64 * 100.0
    };
    let host = System::host_name().unwrap_or_else(|| "unknown".to_string());
    let stamp = now_stamp();

    let percentage = |metric: &str, value: f64, description: &str| Metric {
        metric: metric.to_string(),
        metric_type: "percentage".to_string(),
        value_type: "float64".to_string(),
        resource_type: "ams_node".to_string(),
        resource_name: host.clone(),
        timeseries: vec![Timepoint {
            timestamp: stamp.clone(),
            value: serde_json::Number::from_f64(value)
                .map(serde_json::Value::Number)
                .unwrap_or_else(|| serde_json::Value::from(0)),
        }],
        description: description.to_string(),
    };

    MetricList {
        metrics: vec![
            percentage(
                "ams_node.cpu_usage",
                cpu,
                "Percentage value that displays the CPU usage of ams service in the specific node",
            ),
            percentage(
                "ams_node.memory_usage",
                memory,
                "Percentage value that displays the Memory usage of ams service in the specific node",
            ),
        ],
    }
}
