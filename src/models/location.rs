//! Location model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::category::default_published;

/// A place a post can be attached to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub id: i64,
    pub name: String,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateLocationInput {
    pub name: String,
    #[serde(default = "default_published")]
    pub is_published: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateLocationInput {
    pub name: Option<String>,
    pub is_published: Option<bool>,
}
