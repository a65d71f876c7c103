use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored article. `link` is globally unique and serves as the dedup key
/// across every feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    pub feed_id: i64,
    pub title: String,
    pub link: String,
    pub summary: String,
    pub published: Option<DateTime<Utc>>,
    pub author: String,
    pub read: bool,
}

/// An insert candidate produced by the sync engine. Carries no read flag:
/// new rows always land unread.
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub feed_id: i64,
    pub title: String,
    pub link: String,
    pub summary: String,
    pub published: Option<DateTime<Utc>>,
    pub author: String,
}
