use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use feed_rs::parser;
use reqwest::Client;

use crate::error::Result;

/// A remote feed document, normalized to the handful of fields the rest of
/// the app cares about.
#[derive(Debug, Clone, Default)]
pub struct FetchedFeed {
    pub title: String,
    pub description: String,
    pub items: Vec<FetchedItem>,
}

#[derive(Debug, Clone)]
pub struct FetchedItem {
    pub title: String,
    pub link: String,
    pub summary: String,
    pub published: Option<DateTime<Utc>>,
    pub author: String,
}

/// The remote-document boundary. Implementations turn a feed URL into a
/// normalized document; network, HTTP-status and parse failures all come
/// back as one fetch error.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedFeed>;
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent("newsdeck/0.1")
            .build()
            .expect("Failed to create HTTP client");

        Self { client }
    }
}

#[async_trait]
impl DocumentFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedFeed> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!("feed returned HTTP {}", response.status()).into());
        }

        let bytes = response.bytes().await?;
        let feed = parser::parse(&bytes[..])?;

        let items: Vec<FetchedItem> = feed
            .entries
            .into_iter()
            .map(|entry| {
                // Prefer the summary, fall back to full content
                let summary = entry
                    .summary
                    .map(|s| s.content)
                    .or_else(|| entry.content.and_then(|c| c.body))
                    .unwrap_or_default();

                FetchedItem {
                    title: entry
                        .title
                        .map(|t| t.content)
                        .unwrap_or_else(|| "Untitled".to_string()),
                    link: entry
                        .links
                        .first()
                        .map(|l| l.href.clone())
                        .unwrap_or_default(),
                    summary,
                    published: entry.published.or(entry.updated),
                    author: entry
                        .authors
                        .first()
                        .map(|a| a.name.clone())
                        .unwrap_or_default(),
                }
            })
            .collect();

        Ok(FetchedFeed {
            title: feed.title.map(|t| t.content).unwrap_or_default(),
            description: feed.description.map(|d| d.content).unwrap_or_default(),
            items,
        })
    }
}
