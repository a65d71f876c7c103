use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use crate::error::{AppError, Result};
use crate::models::{Article, Feed, NewArticle};

use super::schema::SCHEMA;

/// Per-candidate outcome tally for a bulk article insert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertReport {
    /// Candidates that became new rows.
    pub inserted: usize,
    /// Candidates whose link already existed; the stored row is untouched.
    pub duplicates: usize,
    /// Candidates that were invalid or failed to insert.
    pub rejected: usize,
}

#[derive(Clone)]
pub struct Store {
    conn: Connection,
}

impl Store {
    pub async fn open(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;
        Self::init(conn).await
    }

    /// In-memory store, used by tests.
    #[allow(dead_code)]
    pub async fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self> {
        conn.call(|conn| {
            conn.execute("PRAGMA foreign_keys = ON", [])?;
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    // Feed operations

    /// Inserts a feed if its URL is new, otherwise leaves the existing row
    /// untouched. Either way the stored row is returned, so callers always
    /// see the real id and any metadata an earlier sync filled in.
    pub async fn add_feed(&self, url: &str, title: &str, description: &str) -> Result<Feed> {
        let owned_url = url.to_string();
        let title = title.to_string();
        let description = description.to_string();
        let feed = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT OR IGNORE INTO feeds (url, title, description) VALUES (?1, ?2, ?3)",
                    params![owned_url, title, description],
                )?;
                let feed = conn
                    .query_row(
                        "SELECT id, url, title, description, last_updated FROM feeds WHERE url = ?1",
                        params![owned_url],
                        feed_from_row,
                    )
                    .optional()?;
                Ok(feed)
            })
            .await?;
        feed.ok_or_else(|| AppError::NotFound(format!("feed {url}")))
    }

    #[allow(dead_code)]
    pub async fn get_feed_by_url(&self, url: &str) -> Result<Feed> {
        let owned_url = url.to_string();
        let feed = self
            .conn
            .call(move |conn| {
                let feed = conn
                    .query_row(
                        "SELECT id, url, title, description, last_updated FROM feeds WHERE url = ?1",
                        params![owned_url],
                        feed_from_row,
                    )
                    .optional()?;
                Ok(feed)
            })
            .await?;
        feed.ok_or_else(|| AppError::NotFound(format!("feed {url}")))
    }

    pub async fn get_feed_by_id(&self, id: i64) -> Result<Feed> {
        let feed = self
            .conn
            .call(move |conn| {
                let feed = conn
                    .query_row(
                        "SELECT id, url, title, description, last_updated FROM feeds WHERE id = ?1",
                        params![id],
                        feed_from_row,
                    )
                    .optional()?;
                Ok(feed)
            })
            .await?;
        feed.ok_or_else(|| AppError::NotFound(format!("feed {id}")))
    }

    pub async fn get_all_feeds(&self) -> Result<Vec<Feed>> {
        let feeds = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, url, title, description, last_updated FROM feeds ORDER BY id",
                )?;
                let feeds = stmt
                    .query_map([], feed_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(feeds)
            })
            .await?;
        Ok(feeds)
    }

    /// Deletes a feed and its articles in one transaction. An id with no
    /// matching row is a no-op, not an error.
    pub async fn delete_feed(&self, id: i64) -> Result<()> {
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM articles WHERE feed_id = ?1", params![id])?;
                tx.execute("DELETE FROM feeds WHERE id = ?1", params![id])?;
                tx.commit()?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn update_feed_meta(
        &self,
        id: i64,
        title: &str,
        description: &str,
        last_updated: DateTime<Utc>,
    ) -> Result<()> {
        let title = title.to_string();
        let description = description.to_string();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE feeds SET title = ?1, description = ?2, last_updated = ?3 WHERE id = ?4",
                    params![title, description, last_updated.to_rfc3339(), id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn update_feed_last_updated(&self, id: i64, last_updated: DateTime<Utc>) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE feeds SET last_updated = ?1 WHERE id = ?2",
                    params![last_updated.to_rfc3339(), id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    // Article operations

    /// Bulk insert with per-candidate outcomes. Links that already exist
    /// anywhere (any feed) count as duplicates and leave the stored row as
    /// it was, read flag included. A bad candidate never aborts the batch.
    pub async fn add_articles(&self, candidates: Vec<NewArticle>) -> Result<InsertReport> {
        let mut report = InsertReport::default();

        let mut valid = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            match validate_candidate(&candidate) {
                Ok(()) => valid.push(candidate),
                Err(e) => {
                    tracing::debug!("skipping article candidate: {e}");
                    report.rejected += 1;
                }
            }
        }

        let tx_report = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let mut partial = InsertReport::default();
                {
                    let mut stmt = tx.prepare(
                        "INSERT OR IGNORE INTO articles (feed_id, title, link, summary, published, author)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    )?;
                    for article in valid {
                        let outcome = stmt.execute(params![
                            article.feed_id,
                            article.title,
                            article.link,
                            article.summary,
                            article.published.map(|dt| dt.to_rfc3339()),
                            article.author,
                        ]);
                        match outcome {
                            Ok(1) => partial.inserted += 1,
                            Ok(_) => partial.duplicates += 1,
                            Err(e) => {
                                tracing::debug!("article insert failed for {}: {e}", article.link);
                                partial.rejected += 1;
                            }
                        }
                    }
                }
                tx.commit()?;
                Ok(partial)
            })
            .await?;

        report.inserted = tx_report.inserted;
        report.duplicates = tx_report.duplicates;
        report.rejected += tx_report.rejected;
        Ok(report)
    }

    /// Articles for one feed, newest first; rows without a publish date sort
    /// last. `limit` caps the page.
    pub async fn get_articles_by_feed(&self, feed_id: i64, limit: usize) -> Result<Vec<Article>> {
        let limit = limit as i64;
        let articles = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, feed_id, title, link, summary, published, author, read
                     FROM articles WHERE feed_id = ?1
                     ORDER BY published DESC NULLS LAST, id DESC LIMIT ?2",
                )?;
                let articles = stmt
                    .query_map(params![feed_id, limit], article_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(articles)
            })
            .await?;
        Ok(articles)
    }

    pub async fn get_unread_articles(&self, limit: usize) -> Result<Vec<Article>> {
        let limit = limit as i64;
        let articles = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, feed_id, title, link, summary, published, author, read
                     FROM articles WHERE read = 0
                     ORDER BY published DESC NULLS LAST, id DESC LIMIT ?1",
                )?;
                let articles = stmt
                    .query_map(params![limit], article_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(articles)
            })
            .await?;
        Ok(articles)
    }

    pub async fn get_article_by_id(&self, id: i64) -> Result<Article> {
        let article = self
            .conn
            .call(move |conn| {
                let article = conn
                    .query_row(
                        "SELECT id, feed_id, title, link, summary, published, author, read
                         FROM articles WHERE id = ?1",
                        params![id],
                        article_from_row,
                    )
                    .optional()?;
                Ok(article)
            })
            .await?;
        article.ok_or_else(|| AppError::NotFound(format!("article {id}")))
    }

    /// Flips an article to read. Already-read rows stay read; an unknown id
    /// reports NotFound.
    pub async fn mark_article_read(&self, id: i64) -> Result<()> {
        let changed = self
            .conn
            .call(move |conn| {
                let changed = conn.execute("UPDATE articles SET read = 1 WHERE id = ?1", params![id])?;
                Ok(changed)
            })
            .await?;
        if changed == 0 {
            return Err(AppError::NotFound(format!("article {id}")));
        }
        Ok(())
    }
}

fn validate_candidate(article: &NewArticle) -> Result<()> {
    if article.link.trim().is_empty() {
        return Err(AppError::Validation(format!(
            "article \"{}\" has no link",
            article.title
        )));
    }
    Ok(())
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    // Try RFC3339 first (e.g., "2026-01-11T12:34:56+00:00")
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Try SQLite datetime format (e.g., "2026-01-11 12:34:56")
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

fn feed_from_row(row: &Row) -> rusqlite::Result<Feed> {
    Ok(Feed {
        id: row.get(0)?,
        url: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        last_updated: row
            .get::<_, Option<String>>(4)?
            .and_then(|s| parse_datetime(&s)),
    })
}

fn article_from_row(row: &Row) -> rusqlite::Result<Article> {
    Ok(Article {
        id: row.get(0)?,
        feed_id: row.get(1)?,
        title: row.get(2)?,
        link: row.get(3)?,
        summary: row.get(4)?,
        published: row
            .get::<_, Option<String>>(5)?
            .and_then(|s| parse_datetime(&s)),
        author: row.get(6)?,
        read: row.get::<_, i64>(7)? != 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tokio_test::assert_ok;

    fn candidate(feed_id: i64, link: &str, published: Option<DateTime<Utc>>) -> NewArticle {
        NewArticle {
            feed_id,
            title: format!("Article at {link}"),
            link: link.to_string(),
            summary: "<p>body</p>".to_string(),
            published,
            author: "tester".to_string(),
        }
    }

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, day, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn add_feed_is_idempotent_by_url() {
        let store = Store::open_in_memory().await.unwrap();

        let first = store
            .add_feed("https://example.com/feed.xml", "Example", "blog")
            .await
            .unwrap();
        let second = store
            .add_feed("https://example.com/feed.xml", "Different title", "other")
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        // The existing row wins; the second call's fields are ignored.
        assert_eq!(second.title, "Example");
        assert_eq!(store.get_all_feeds().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_rows_report_not_found() {
        let store = Store::open_in_memory().await.unwrap();

        let by_url = store.get_feed_by_url("https://nowhere.invalid/feed").await;
        assert!(matches!(by_url, Err(AppError::NotFound(_))));

        let by_id = store.get_feed_by_id(42).await;
        assert!(matches!(by_id, Err(AppError::NotFound(_))));

        let article = store.get_article_by_id(42).await;
        assert!(matches!(article, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn feeds_list_in_insertion_order() {
        let store = Store::open_in_memory().await.unwrap();

        store.add_feed("https://b.example/feed", "B", "").await.unwrap();
        store.add_feed("https://a.example/feed", "A", "").await.unwrap();

        let titles: Vec<String> = store
            .get_all_feeds()
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.title)
            .collect();
        assert_eq!(titles, vec!["B", "A"]);
    }

    #[tokio::test]
    async fn duplicate_links_collapse_to_one_row() {
        let store = Store::open_in_memory().await.unwrap();
        let feed_a = store.add_feed("https://a.example/feed", "A", "").await.unwrap();
        let feed_b = store.add_feed("https://b.example/feed", "B", "").await.unwrap();

        let report = store
            .add_articles(vec![
                candidate(feed_a.id, "https://a.example/post/1", Some(ts(1))),
                candidate(feed_a.id, "https://a.example/post/1", Some(ts(1))),
            ])
            .await
            .unwrap();
        assert_eq!(report.inserted, 1);
        assert_eq!(report.duplicates, 1);

        // The same link arriving through another feed is still a duplicate.
        let report = store
            .add_articles(vec![candidate(feed_b.id, "https://a.example/post/1", Some(ts(2)))])
            .await
            .unwrap();
        assert_eq!(report.inserted, 0);
        assert_eq!(report.duplicates, 1);

        let kept = store.get_articles_by_feed(feed_a.id, 10).await.unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].feed_id, feed_a.id);
        assert!(store
            .get_articles_by_feed(feed_b.id, 10)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn empty_link_candidates_are_rejected_not_fatal() {
        let store = Store::open_in_memory().await.unwrap();
        let feed = store.add_feed("https://a.example/feed", "A", "").await.unwrap();

        let report = store
            .add_articles(vec![
                candidate(feed.id, "", Some(ts(1))),
                candidate(feed.id, "https://a.example/post/1", Some(ts(1))),
                candidate(feed.id, "   ", None),
            ])
            .await
            .unwrap();

        assert_eq!(report.inserted, 1);
        assert_eq!(report.duplicates, 0);
        assert_eq!(report.rejected, 2);
        assert_eq!(store.get_articles_by_feed(feed.id, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_insert_never_resets_read_flag() {
        let store = Store::open_in_memory().await.unwrap();
        let feed = store.add_feed("https://a.example/feed", "A", "").await.unwrap();

        store
            .add_articles(vec![candidate(feed.id, "https://a.example/post/1", Some(ts(1)))])
            .await
            .unwrap();
        let id = store.get_articles_by_feed(feed.id, 10).await.unwrap()[0].id;
        assert_ok!(store.mark_article_read(id).await);

        // Re-sync delivers the same candidate again.
        store
            .add_articles(vec![candidate(feed.id, "https://a.example/post/1", Some(ts(1)))])
            .await
            .unwrap();

        let article = store.get_article_by_id(id).await.unwrap();
        assert!(article.read);
    }

    #[tokio::test]
    async fn mark_read_is_idempotent_but_unknown_id_fails() {
        let store = Store::open_in_memory().await.unwrap();
        let feed = store.add_feed("https://a.example/feed", "A", "").await.unwrap();
        store
            .add_articles(vec![candidate(feed.id, "https://a.example/post/1", None)])
            .await
            .unwrap();
        let id = store.get_articles_by_feed(feed.id, 10).await.unwrap()[0].id;

        assert_ok!(store.mark_article_read(id).await);
        assert_ok!(store.mark_article_read(id).await);

        let missing = store.mark_article_read(9999).await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn delete_feed_takes_its_articles_with_it() {
        let store = Store::open_in_memory().await.unwrap();
        let doomed = store.add_feed("https://a.example/feed", "A", "").await.unwrap();
        let kept = store.add_feed("https://b.example/feed", "B", "").await.unwrap();
        store
            .add_articles(vec![
                candidate(doomed.id, "https://a.example/post/1", Some(ts(1))),
                candidate(kept.id, "https://b.example/post/1", Some(ts(1))),
            ])
            .await
            .unwrap();

        store.delete_feed(doomed.id).await.unwrap();

        assert!(matches!(
            store.get_feed_by_id(doomed.id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(store
            .get_articles_by_feed(doomed.id, 10)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(store.get_articles_by_feed(kept.id, 10).await.unwrap().len(), 1);

        // Deleting a feed that is already gone is a quiet no-op.
        assert_ok!(store.delete_feed(doomed.id).await);
    }

    #[tokio::test]
    async fn articles_order_newest_first_with_undated_last() {
        let store = Store::open_in_memory().await.unwrap();
        let feed = store.add_feed("https://a.example/feed", "A", "").await.unwrap();

        store
            .add_articles(vec![
                candidate(feed.id, "https://a.example/old", Some(ts(1))),
                candidate(feed.id, "https://a.example/undated", None),
                candidate(feed.id, "https://a.example/new", Some(ts(20))),
            ])
            .await
            .unwrap();

        let links: Vec<String> = store
            .get_articles_by_feed(feed.id, 10)
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.link)
            .collect();
        assert_eq!(
            links,
            vec![
                "https://a.example/new",
                "https://a.example/old",
                "https://a.example/undated",
            ]
        );

        let limited = store.get_articles_by_feed(feed.id, 2).await.unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[tokio::test]
    async fn unread_listing_spans_feeds_and_drops_read_rows() {
        let store = Store::open_in_memory().await.unwrap();
        let feed_a = store.add_feed("https://a.example/feed", "A", "").await.unwrap();
        let feed_b = store.add_feed("https://b.example/feed", "B", "").await.unwrap();
        store
            .add_articles(vec![
                candidate(feed_a.id, "https://a.example/post/1", Some(ts(1))),
                candidate(feed_b.id, "https://b.example/post/1", Some(ts(2))),
            ])
            .await
            .unwrap();

        assert_eq!(store.get_unread_articles(10).await.unwrap().len(), 2);

        let newest = store.get_unread_articles(10).await.unwrap()[0].clone();
        assert_eq!(newest.link, "https://b.example/post/1");
        store.mark_article_read(newest.id).await.unwrap();

        let unread = store.get_unread_articles(10).await.unwrap();
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].link, "https://a.example/post/1");
    }

    #[tokio::test]
    async fn feed_metadata_updates_round_trip() {
        let store = Store::open_in_memory().await.unwrap();
        let feed = store
            .add_feed("https://a.example/feed", "https://a.example/feed", "")
            .await
            .unwrap();
        assert!(feed.last_updated.is_none());

        let stamp = ts(5);
        store
            .update_feed_meta(feed.id, "Real Title", "A description", stamp)
            .await
            .unwrap();
        let feed = store.get_feed_by_id(feed.id).await.unwrap();
        assert_eq!(feed.title, "Real Title");
        assert_eq!(feed.description, "A description");
        assert_eq!(feed.last_updated, Some(stamp));

        let later = ts(6);
        store.update_feed_last_updated(feed.id, later).await.unwrap();
        let feed = store.get_feed_by_id(feed.id).await.unwrap();
        // Only the stamp moves; title and description stay.
        assert_eq!(feed.title, "Real Title");
        assert_eq!(feed.last_updated, Some(later));
    }

    #[tokio::test]
    async fn store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("newsdeck.db");
        let path = path.to_str().unwrap();

        {
            let store = Store::open(path).await.unwrap();
            let feed = store.add_feed("https://a.example/feed", "A", "").await.unwrap();
            store
                .add_articles(vec![candidate(feed.id, "https://a.example/post/1", Some(ts(1)))])
                .await
                .unwrap();
        }

        let store = Store::open(path).await.unwrap();
        let feeds = store.get_all_feeds().await.unwrap();
        assert_eq!(feeds.len(), 1);
        assert_eq!(store.get_articles_by_feed(feeds[0].id, 10).await.unwrap().len(), 1);
    }
}
