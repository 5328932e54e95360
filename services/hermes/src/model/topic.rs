//! Topic model definitions.
use serde::{Deserialize, Serialize};

/// Stable identifier for a topic, fully qualified by its project.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Hash)]
pub struct TopicKey {
    pub project_uuid: String,
    pub name: String,
}

impl TopicKey {
    pub fn new(project_uuid: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            project_uuid: project_uuid.into(),
            name: name.into(),
        }
    }
}

/// A topic carries no intrinsic configuration; its messages live in the
/// commit log under `{project_uuid}.{name}`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Topic {
    pub project_uuid: String,
    pub name: String,
}

impl Topic {
    /// Name of the backing commit-log topic.
    pub fn log_topic(&self) -> String {
        format!("{}.{}", self.project_uuid, self.name)
    }
}
