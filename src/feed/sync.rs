use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};

use crate::db::{InsertReport, Store};
use crate::error::Result;
use crate::models::{Feed, NewArticle};

use super::fetcher::DocumentFetcher;

/// Max feeds fetched concurrently during a sync-all run.
const MAX_CONCURRENT_SYNCS: usize = 4;

/// Drives the fetch, normalize, dedup-insert, re-stamp cycle for feeds.
#[derive(Clone)]
pub struct SyncEngine {
    store: Store,
    fetcher: Arc<dyn DocumentFetcher>,
}

impl SyncEngine {
    pub fn new(store: Store, fetcher: Arc<dyn DocumentFetcher>) -> Self {
        Self { store, fetcher }
    }

    /// Syncs one feed and returns how many articles were newly stored.
    ///
    /// A fetch failure returns immediately and leaves the feed exactly as it
    /// was, freshness stamp included. Metadata and stamp writes after a
    /// successful fetch are best-effort: a failure there is logged and the
    /// sync still counts.
    pub async fn sync_feed(&self, feed: &Feed) -> Result<usize> {
        let document = self.fetcher.fetch(&feed.url).await?;

        if !document.title.is_empty() || !document.description.is_empty() {
            if let Err(e) = self
                .store
                .update_feed_meta(feed.id, &document.title, &document.description, Utc::now())
                .await
            {
                tracing::warn!("feed {}: metadata update failed: {e}", feed.id);
            }
        }

        let candidates: Vec<NewArticle> = document
            .items
            .into_iter()
            .map(|item| NewArticle {
                feed_id: feed.id,
                title: item.title,
                link: item.link,
                summary: item.summary,
                published: item.published,
                author: item.author,
            })
            .collect();

        let report: InsertReport = self.store.add_articles(candidates).await?;
        tracing::debug!(
            "feed {}: {} inserted, {} duplicate, {} rejected",
            feed.id,
            report.inserted,
            report.duplicates,
            report.rejected
        );

        // The stamp moves even when nothing new arrived: it records the last
        // successful sync, not the last change.
        if let Err(e) = self.store.update_feed_last_updated(feed.id, Utc::now()).await {
            tracing::warn!("feed {}: freshness update failed: {e}", feed.id);
        }

        Ok(report.inserted)
    }

    /// Syncs every stored feed with bounded concurrency. Each feed fails or
    /// succeeds on its own: failed feeds are logged and left out of the
    /// result map, the rest keep going.
    pub async fn sync_all(&self) -> Result<HashMap<i64, usize>> {
        let feeds = self.store.get_all_feeds().await?;

        let results: HashMap<i64, usize> = stream::iter(feeds)
            .map(|feed| async move {
                match self.sync_feed(&feed).await {
                    Ok(added) => {
                        tracing::debug!("synced {}: {added} new", feed.url);
                        Some((feed.id, added))
                    }
                    Err(e) => {
                        tracing::warn!("sync failed for {}: {e}", feed.url);
                        None
                    }
                }
            })
            .buffer_unordered(MAX_CONCURRENT_SYNCS)
            .filter_map(|r| async move { r })
            .collect()
            .await;

        Ok(results)
    }
}
