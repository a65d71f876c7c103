use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A subscribed feed. `last_updated` stays `None` until the first successful
/// sync, which is how the UI knows to show "never synced".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feed {
    pub id: i64,
    pub url: String,
    pub title: String,
    pub description: String,
    pub last_updated: Option<DateTime<Utc>>,
}
