//! User watches and the alerts they produce.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a watch value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WatchKind {
    /// Value is a source identifier
    Source,
    /// Value is a keyword searched in title and body
    Keyword,
    /// Value is a place name searched in title and body
    #[serde(alias = "zone_geo")]
    GeoZone,
    /// Value is a classifier category tag
    #[serde(alias = "filiere")]
    Category,
    /// Tag this version does not know; never matches
    #[serde(other)]
    Unknown,
}

/// A user-registered interest rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watch {
    pub id: Uuid,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: WatchKind,
    pub value: String,
}

impl Watch {
    pub fn new(user_id: impl Into<String>, kind: WatchKind, value: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            kind,
            value: value.into(),
        }
    }
}

/// Notification raised when content matches a watch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub user_id: String,
    #[serde(default)]
    pub watch_id: Option<Uuid>,
    #[serde(default)]
    pub content_id: Option<Uuid>,
    pub title: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Alert {
    /// The (watch, content) pair alerts are unique on, when both are set.
    pub fn pair(&self) -> Option<(Uuid, Uuid)> {
        Some((self.watch_id?, self.content_id?))
    }
}
