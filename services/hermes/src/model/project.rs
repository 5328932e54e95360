//! Project model definitions.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A project is the top-level tenant grouping users, topics and
/// subscriptions. `created_by` holds the creating user's uuid; the API
/// resolves it to a user name when rendering.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Project {
    pub uuid: String,
    pub name: String,
    pub description: String,
    pub created_on: DateTime<Utc>,
    pub modified_on: DateTime<Utc>,
    pub created_by: Option<String>,
}
